pub mod archive;
pub mod codec;
pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod report;
pub mod room_log;
pub mod shell;
pub mod storage;
pub mod validation;

use std::fmt;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::archive::DischargeArchive;
use crate::config::HospitalConfig;
use crate::error::{HospitalError, Result};
use crate::model::{now_unix, DischargedRecord, NewPatient, PatientRecord, Timeframe};
use crate::report::{Report, ReportGenerator};
use crate::room_log::RoomUsageLog;
use crate::storage::{Admitted, LoadOutcome, PatientStore};

/// What became of a discharge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DischargeOutcome {
    NotFound,
    /// Caller did not confirm; nothing was touched
    Cancelled(PatientRecord),
    /// Archived and logged. `persisted` is false when `patients.dat`
    /// still lists the patient and awaits a rewrite.
    Discharged { record: DischargedRecord, persisted: bool },
}

/// The ward: active store, discharge archive, room log and reports,
/// opened once and handed to the caller.
pub struct Hospital {
    config: HospitalConfig,
    store: PatientStore,
    archive: DischargeArchive,
    room_log: RoomUsageLog,
    reports: ReportGenerator,
}

impl fmt::Debug for Hospital {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hospital")
            .field("data_dir", &self.config.data_dir)
            .field("active", &self.store.count())
            .field("next_id", &self.store.next_id())
            .finish()
    }
}

impl Hospital {
    /// Builds every component and loads `patients.dat`.
    pub fn open(config: HospitalConfig) -> Result<(Self, LoadOutcome)> {
        let store = PatientStore::new(&config.patients_path(), config.strict_durability);
        let archive = DischargeArchive::new(&config.discharged_path(), config.strict_durability);
        let room_log = RoomUsageLog::new(&config.room_log_path());
        let reports = ReportGenerator::new(&config);

        let mut hospital = Self { config, store, archive, room_log, reports };
        let outcome = hospital.initialize()?;
        Ok((hospital, outcome))
    }

    /// (Re)loads the active list from disk and restores the id floor.
    pub fn initialize(&mut self) -> Result<LoadOutcome> {
        let outcome = self.store.initialize()?;

        // Discharged ids stay retired across restarts
        match self.archive.max_id() {
            Ok(Some(max)) => self.store.reserve_ids_through(max),
            Ok(None) => {}
            Err(e) => warn!("could not read discharge archive for id floor: {}", e),
        }
        info!(active = self.store.count(), next_id = self.store.next_id(), "patient system ready");
        Ok(outcome)
    }

    pub fn admit(&mut self, fields: NewPatient) -> Result<Admitted> {
        self.admit_at(fields, now_unix())
    }

    pub fn admit_at(&mut self, fields: NewPatient, admitted_at: i64) -> Result<Admitted> {
        let admitted = self.store.create(fields, admitted_at)?;
        info!(id = admitted.record.id, room = admitted.record.room, "patient admitted");
        Ok(admitted)
    }

    pub fn patients(&self) -> &[PatientRecord] {
        self.store.list()
    }

    pub fn find(&self, id: u32) -> Option<&PatientRecord> {
        self.store.find_by_id(id)
    }

    pub fn find_by_room(&self, room: u32) -> Option<&PatientRecord> {
        self.store.find_by_room(room)
    }

    pub fn count(&self) -> usize {
        self.store.count()
    }

    pub fn discharge(&mut self, id: u32, confirmed: bool) -> Result<DischargeOutcome> {
        self.discharge_at(id, confirmed, now_unix())
    }

    /// Archives the patient, logs the freed room, then removes it from the
    /// active list. If either append fails the patient stays active and
    /// the archive is cut back to its previous length.
    pub fn discharge_at(&mut self, id: u32, confirmed: bool, discharged_at: i64) -> Result<DischargeOutcome> {
        let Some(patient) = self.store.find_by_id(id).cloned() else {
            return Ok(DischargeOutcome::NotFound);
        };
        if !confirmed {
            return Ok(DischargeOutcome::Cancelled(patient));
        }

        let record = DischargedRecord::new(patient, discharged_at);
        let archived_from = self.archive.append(&record).map_err(|e| archive_failure(id, e))?;
        if let Err(e) = self.room_log.append(record.patient.room) {
            if let Err(undo) = self.archive.truncate_to(archived_from) {
                warn!(id, "archive entry left behind after room log failure: {}", undo);
            }
            return Err(archive_failure(id, e));
        }

        let persisted = match self.store.remove(id)? {
            Some(removed) => removed.persisted,
            None => return Ok(DischargeOutcome::NotFound),
        };
        info!(id, room = record.patient.room, persisted, "patient discharged");
        Ok(DischargeOutcome::Discharged { record, persisted })
    }

    /// Writes the full active list to `patients.dat`.
    pub fn backup(&mut self) -> Result<()> {
        self.store.rewrite()
    }

    /// Discards in-memory state and reloads from `patients.dat`.
    /// A pending rewrite is written first; if that fails nothing is reloaded.
    pub fn restore(&mut self) -> Result<LoadOutcome> {
        self.store.flush_pending()?;
        self.initialize()
    }

    pub fn admission_report(&self, timeframe: Timeframe, now: DateTime<Local>) -> Report {
        self.reports.admission_report(self.store.list(), timeframe, now)
    }

    pub fn discharge_report(&self, timeframe: Timeframe, now: DateTime<Local>) -> Result<Report> {
        self.reports.discharge_report(&self.archive, timeframe, now)
    }

    pub fn room_usage_report(&self, now: DateTime<Local>) -> Result<Report> {
        self.reports.room_usage_report(&self.room_log, now)
    }

    /// Prints the report to `console` and appends it to its report file.
    pub fn publish<W: Write>(&self, report: &Report, console: &mut W) -> Result<PathBuf> {
        self.reports.publish(report, console)
    }

    pub fn store(&self) -> &PatientStore {
        &self.store
    }

    pub fn archive(&self) -> &DischargeArchive {
        &self.archive
    }

    pub fn room_log(&self) -> &RoomUsageLog {
        &self.room_log
    }

    /// Flushes any pending rewrite and releases the active list.
    pub fn shutdown(mut self) -> Result<()> {
        let flushed = self.store.flush_pending();
        self.store.release();
        match &flushed {
            Ok(true) => info!("pending changes written to {}", self.store.file_path.display()),
            Ok(false) => {}
            Err(e) => warn!("shutdown with unsaved changes: {}", e),
        }
        flushed.map(|_| ())
    }
}

fn archive_failure(id: u32, err: HospitalError) -> HospitalError {
    match err {
        HospitalError::Io(source) => HospitalError::ArchiveFailed { id, source },
        other => other,
    }
}
