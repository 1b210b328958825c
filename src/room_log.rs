use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Lines, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;
use crate::model::{MAX_ROOM_NUMBER, MIN_ROOM_NUMBER};

/// Text log of rooms freed by discharges, one decimal room number per line.
#[derive(Debug, Clone)]
pub struct RoomUsageLog {
    pub file_path: PathBuf,
}

/// Per-room discharge counts. Rooms never logged are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomUsage {
    pub counts: BTreeMap<u32, u32>,
    /// Non-blank lines read
    pub total_entries: usize,
    pub valid_entries: usize,
}

impl RoomUsageLog {
    pub fn new(path: &Path) -> Self {
        Self { file_path: path.to_path_buf() }
    }

    pub fn append(&self, room: u32) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.file_path)?;
        writeln!(file, "{}", room)?;
        Ok(())
    }

    /// Lazily parses the log. Malformed or out-of-range lines are skipped.
    /// A missing log scans as empty.
    pub fn scan(&self) -> Result<RoomScan> {
        let lines = match File::open(&self.file_path) {
            Ok(file) => Some(BufReader::new(file).lines()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        Ok(RoomScan {
            lines,
            path: self.file_path.clone(),
            line_no: 0,
            total_entries: 0,
            valid_entries: 0,
        })
    }

    /// `Ok(None)` when nothing has been logged yet (no log file).
    pub fn aggregate(&self) -> Result<Option<RoomUsage>> {
        let mut scan = self.scan()?;
        if scan.lines.is_none() {
            return Ok(None);
        }
        let mut counts = BTreeMap::new();
        for room in scan.by_ref() {
            *counts.entry(room).or_insert(0) += 1;
        }
        Ok(Some(RoomUsage {
            counts,
            total_entries: scan.total_entries,
            valid_entries: scan.valid_entries,
        }))
    }
}

pub struct RoomScan {
    lines: Option<Lines<BufReader<File>>>,
    path: PathBuf,
    line_no: usize,
    total_entries: usize,
    valid_entries: usize,
}

impl Iterator for RoomScan {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        loop {
            let line = match self.lines.as_mut()?.next()? {
                Ok(line) => line,
                Err(e) => {
                    warn!("{}: read stopped at line {}: {}", self.path.display(), self.line_no + 1, e);
                    self.lines = None;
                    return None;
                }
            };
            self.line_no += 1;

            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            self.total_entries += 1;

            match text.parse::<u32>() {
                Ok(room) if (MIN_ROOM_NUMBER..=MAX_ROOM_NUMBER).contains(&room) => {
                    self.valid_entries += 1;
                    return Some(room);
                }
                _ => warn!(
                    "{}:{}: skipping invalid room number '{}'",
                    self.path.display(),
                    self.line_no,
                    text
                ),
            }
        }
    }
}
