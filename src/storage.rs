use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::codec::{self, PATIENT_RECORD_SIZE};
use crate::error::{HospitalError, Result};
use crate::model::{NewPatient, PatientRecord, FIRST_PATIENT_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Uninitialized,
    /// Populated from the backing file
    Loaded,
    /// Started empty after a fallback
    Default,
}

/// Why `initialize` fell back to an empty store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    Missing,
    Empty,
    SizeMismatch { len: u64 },
    Unreadable(String),
    Corrupt(String),
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fallback::Missing => write!(f, "file not found"),
            Fallback::Empty => write!(f, "file is empty"),
            Fallback::SizeMismatch { len } => write!(
                f,
                "size {} is not a multiple of the {}-byte record",
                len, PATIENT_RECORD_SIZE
            ),
            Fallback::Unreadable(e) => write!(f, "unreadable: {}", e),
            Fallback::Corrupt(e) => write!(f, "corrupt: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { count: usize },
    Default(Fallback),
}

/// Result of `create`: the record always lives in memory, `persisted`
/// says whether it also reached the backing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admitted {
    pub record: PatientRecord,
    pub persisted: bool,
}

/// Result of `remove`: the record is gone from memory, `persisted`
/// says whether the backing file was rewritten without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed {
    pub record: PatientRecord,
    pub persisted: bool,
}

/// Active patients plus their durable mirror (`patients.dat`).
#[derive(Debug)]
pub struct PatientStore {
    pub file_path: PathBuf,
    tmp_path: PathBuf,
    corrupt_path: PathBuf,
    strict_durability: bool,
    patients: Vec<PatientRecord>,
    next_id: u32,
    state: StoreState,
    // backing file is known not to match memory
    needs_rewrite: bool,
    // backing file failed to load; kept aside before it is first replaced
    corrupt_on_disk: bool,
}

impl PatientStore {
    pub fn new(path: &Path, strict_durability: bool) -> Self {
        let mut corrupt_path = path.as_os_str().to_owned();
        corrupt_path.push(".corrupt");
        Self {
            file_path: path.to_path_buf(),
            tmp_path: path.with_extension("tmp"),
            corrupt_path: PathBuf::from(corrupt_path),
            strict_durability,
            patients: Vec::new(),
            next_id: FIRST_PATIENT_ID,
            state: StoreState::Uninitialized,
            needs_rewrite: false,
            corrupt_on_disk: false,
        }
    }

    /// Loads the backing file. Anything short of a clean load falls back to
    /// an empty store; only allocation failure is returned as an error.
    pub fn initialize(&mut self) -> Result<LoadOutcome> {
        self.initialize_default();

        let fallback = match self.load_file()? {
            Ok(records) => {
                let count = records.len();
                self.next_id = records
                    .iter()
                    .map(|p| p.id)
                    .max()
                    .map_or(FIRST_PATIENT_ID, |max| max.saturating_add(1));
                self.patients = records;
                self.state = StoreState::Loaded;
                info!(count, next_id = self.next_id, "patients loaded from {}", self.file_path.display());
                return Ok(LoadOutcome::Loaded { count });
            }
            Err(fallback) => fallback,
        };

        // Left alone until a mutation replaces it; appends never land behind garbage
        self.corrupt_on_disk = matches!(fallback, Fallback::SizeMismatch { .. } | Fallback::Corrupt(_));
        warn!(
            "cannot load {} ({}), starting with an empty patient list",
            self.file_path.display(),
            fallback
        );
        Ok(LoadOutcome::Default(fallback))
    }

    pub fn initialize_default(&mut self) {
        self.patients = Vec::new();
        self.next_id = FIRST_PATIENT_ID;
        self.state = StoreState::Default;
        self.needs_rewrite = false;
        self.corrupt_on_disk = false;
    }

    fn load_file(&self) -> Result<std::result::Result<Vec<PatientRecord>, Fallback>> {
        let file = match File::open(&self.file_path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Err(Fallback::Missing)),
            Err(e) => return Ok(Err(Fallback::Unreadable(e.to_string()))),
        };
        let len = match file.metadata() {
            Ok(m) => m.len(),
            Err(e) => return Ok(Err(Fallback::Unreadable(e.to_string()))),
        };
        if len == 0 {
            return Ok(Err(Fallback::Empty));
        }
        if len % PATIENT_RECORD_SIZE as u64 != 0 {
            return Ok(Err(Fallback::SizeMismatch { len }));
        }

        let count = (len / PATIENT_RECORD_SIZE as u64) as usize;
        let mut records = Vec::new();
        records
            .try_reserve_exact(count)
            .map_err(|e| HospitalError::Allocation(format!("{} patient records: {}", count, e)))?;

        let mut reader = BufReader::new(file);
        loop {
            match codec::read_block::<_, PATIENT_RECORD_SIZE>(&mut reader) {
                Ok(Some(block)) => match codec::decode_patient(&block) {
                    Ok(record) => records.push(record),
                    Err(e) => return Ok(Err(Fallback::Corrupt(e.to_string()))),
                },
                Ok(None) => break,
                Err(e) => return Ok(Err(Fallback::Unreadable(e.to_string()))),
            }
        }
        Ok(Ok(records))
    }

    /// Admits a patient under the next id. `admitted_at` is unix seconds.
    pub fn create(&mut self, fields: NewPatient, admitted_at: i64) -> Result<Admitted> {
        self.ensure_ready()?;
        if self.find_by_room(fields.room).is_some() {
            return Err(HospitalError::RoomOccupied { room: fields.room });
        }

        let id = self.next_id;
        let next_id = id
            .checked_add(1)
            .ok_or_else(|| HospitalError::Invalid("patient id space exhausted".into()))?;
        let record = PatientRecord::admit(id, fields, admitted_at);
        // Structural check before anything is mutated
        let block = codec::encode_patient(&record)?;

        self.patients
            .try_reserve(1)
            .map_err(|e| HospitalError::Allocation(format!("growing patient list: {}", e)))?;
        self.patients.push(record.clone());
        self.next_id = next_id;

        let persisted = if self.needs_rewrite || self.corrupt_on_disk {
            match self.rewrite() {
                Ok(()) => true,
                Err(e) => {
                    warn!(id, "patient kept in memory, full rewrite failed: {}", e);
                    false
                }
            }
        } else {
            match self.append(&block) {
                Ok(()) => true,
                Err(e) => {
                    warn!(id, "patient kept in memory, append to {} failed: {}", self.file_path.display(), e);
                    self.needs_rewrite = true;
                    false
                }
            }
        };

        Ok(Admitted { record, persisted })
    }

    fn append(&self, block: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.file_path)?;
        let start = file.metadata()?.len();

        let written = file.write_all(block).and_then(|_| {
            if self.strict_durability {
                file.sync_data()
            } else {
                Ok(())
            }
        });
        if let Err(e) = written {
            // Cut off the torn tail so the size stays a record multiple
            if let Err(trunc) = file.set_len(start) {
                warn!("could not truncate partial append: {}", trunc);
            }
            return Err(e);
        }
        Ok(())
    }

    pub fn find_by_id(&self, id: u32) -> Option<&PatientRecord> {
        self.patients.iter().find(|p| p.id == id)
    }

    pub fn find_by_room(&self, room: u32) -> Option<&PatientRecord> {
        self.patients.iter().find(|p| p.room == room)
    }

    /// Takes a patient out of the active list and rewrites the backing file.
    /// `Ok(None)` when no such id is active.
    pub fn remove(&mut self, id: u32) -> Result<Option<Removed>> {
        self.ensure_ready()?;
        let Some(index) = self.patients.iter().position(|p| p.id == id) else {
            return Ok(None);
        };
        let record = self.patients.remove(index);

        let persisted = match self.rewrite() {
            Ok(()) => true,
            Err(e) => {
                warn!(id, "patient removed in memory, {} still lists it: {}", self.file_path.display(), e);
                false
            }
        };
        Ok(Some(Removed { record, persisted }))
    }

    /// Replaces the backing file with the full active list.
    /// Written to a temp file first; the backing file is only swapped once
    /// every record and the close succeeded. A file that failed to load is
    /// copied to `<file>.corrupt` before it is replaced.
    pub fn rewrite(&mut self) -> Result<()> {
        if self.corrupt_on_disk {
            self.preserve_corrupt()?;
        }
        if let Err(e) = self.write_temp() {
            if let Err(cleanup) = fs::remove_file(&self.tmp_path) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!("could not discard {}: {}", self.tmp_path.display(), cleanup);
                }
            }
            self.needs_rewrite = true;
            warn!("rewrite aborted, {} left unchanged: {}", self.file_path.display(), e);
            return Err(e);
        }

        if let Err(e) = fs::rename(&self.tmp_path, &self.file_path) {
            let _ = fs::remove_file(&self.tmp_path);
            self.needs_rewrite = true;
            warn!("could not replace {}: {}", self.file_path.display(), e);
            return Err(e.into());
        }

        self.needs_rewrite = false;
        self.corrupt_on_disk = false;
        debug!(count = self.patients.len(), "{} rewritten", self.file_path.display());
        Ok(())
    }

    fn preserve_corrupt(&self) -> Result<()> {
        match fs::copy(&self.file_path, &self.corrupt_path) {
            Ok(bytes) => {
                warn!(bytes, "unloadable {} kept as {}", self.file_path.display(), self.corrupt_path.display());
                Ok(())
            }
            // Gone already, nothing left to keep
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!("refusing to replace {}, copy to {} failed: {}", self.file_path.display(), self.corrupt_path.display(), e);
                Err(e.into())
            }
        }
    }

    fn write_temp(&self) -> Result<()> {
        let file = File::create(&self.tmp_path)?;
        let mut writer = BufWriter::new(file);
        for record in &self.patients {
            codec::write_patient(&mut writer, record)?;
        }
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        if self.strict_durability {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Rewrites only if an earlier write left the file behind memory.
    /// A file that merely failed to load is left as it is.
    pub fn flush_pending(&mut self) -> Result<bool> {
        if !self.needs_rewrite {
            return Ok(false);
        }
        self.rewrite()?;
        Ok(true)
    }

    /// Raises the id generator so it never hands out `id` or anything below it.
    pub fn reserve_ids_through(&mut self, id: u32) {
        if id >= self.next_id {
            self.next_id = id.saturating_add(1);
        }
    }

    pub fn list(&self) -> &[PatientRecord] {
        &self.patients
    }

    pub fn count(&self) -> usize {
        self.patients.len()
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn needs_rewrite(&self) -> bool {
        self.needs_rewrite
    }

    pub fn corrupt_on_disk(&self) -> bool {
        self.corrupt_on_disk
    }

    pub fn corrupt_path(&self) -> &Path {
        &self.corrupt_path
    }

    /// Drops the in-memory list. The store must be initialized again before use.
    pub fn release(&mut self) {
        self.patients = Vec::new();
        self.state = StoreState::Uninitialized;
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.state == StoreState::Uninitialized {
            return Err(HospitalError::Invalid("patient store is not initialized".into()));
        }
        Ok(())
    }
}
