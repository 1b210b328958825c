use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::codec::{self, DISCHARGED_RECORD_SIZE};
use crate::error::{HospitalError, Result};
use crate::model::DischargedRecord;

/// Append-only log of discharged patients (`discharged_patients.dat`).
#[derive(Debug, Clone)]
pub struct DischargeArchive {
    pub file_path: PathBuf,
    strict_durability: bool,
}

impl DischargeArchive {
    pub fn new(path: &Path, strict_durability: bool) -> Self {
        Self {
            file_path: path.to_path_buf(),
            strict_durability,
        }
    }

    /// Appends one entry and returns the archive length before it, which
    /// `truncate_to` takes to undo the append.
    pub fn append(&self, record: &DischargedRecord) -> Result<u64> {
        let block = codec::encode_discharged(record)?;

        let mut file = OpenOptions::new().create(true).append(true).open(&self.file_path)?;
        let start = file.metadata()?.len();
        let written = file.write_all(&block).and_then(|_| {
            if self.strict_durability {
                file.sync_data()
            } else {
                Ok(())
            }
        });
        if let Err(e) = written {
            if let Err(trunc) = file.set_len(start) {
                warn!("could not truncate partial archive entry: {}", trunc);
            }
            return Err(e.into());
        }
        Ok(start)
    }

    /// Cuts the archive back to `len` bytes, dropping everything appended since.
    pub fn truncate_to(&self, len: u64) -> Result<()> {
        let file = OpenOptions::new().write(true).open(&self.file_path)?;
        file.set_len(len)?;
        if self.strict_durability {
            file.sync_data()?;
        }
        Ok(())
    }

    /// Reads the archive from the start, in file order.
    /// A missing archive scans as empty.
    pub fn scan(&self) -> Result<ArchiveScan> {
        match File::open(&self.file_path) {
            Ok(file) => Ok(ArchiveScan {
                reader: Some(BufReader::new(file)),
                path: self.file_path.clone(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ArchiveScan {
                reader: None,
                path: self.file_path.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self) -> bool {
        self.file_path.exists()
    }

    /// Highest patient id ever archived, if any. Ids are read straight from
    /// the block so entries with unreadable text still count.
    pub fn max_id(&self) -> Result<Option<u32>> {
        let file = match File::open(&self.file_path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut reader = BufReader::new(file);
        let mut max = None;
        loop {
            match codec::read_block::<_, DISCHARGED_RECORD_SIZE>(&mut reader) {
                Ok(Some(block)) => {
                    let id = codec::block_id(&block);
                    max = Some(max.map_or(id, |m: u32| m.max(id)));
                }
                Ok(None) => break,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    warn!("{}: ignoring torn trailing record ({})", self.file_path.display(), e);
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(max)
    }
}

/// Lazy iterator over archived records.
/// A torn trailing block ends the scan with a warning.
pub struct ArchiveScan {
    reader: Option<BufReader<File>>,
    path: PathBuf,
}

impl Iterator for ArchiveScan {
    type Item = Result<DischargedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;
        match codec::read_block::<_, DISCHARGED_RECORD_SIZE>(reader) {
            Ok(Some(block)) => Some(codec::decode_discharged(&block)),
            Ok(None) => {
                self.reader = None;
                None
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!("{}: ignoring torn trailing record ({})", self.path.display(), e);
                self.reader = None;
                None
            }
            Err(e) => {
                self.reader = None;
                Some(Err(HospitalError::Io(e)))
            }
        }
    }
}
