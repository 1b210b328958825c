use std::fmt;

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

// Field bounds (bytes for text, inclusive ranges for numbers)
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_DIAGNOSIS_LEN: usize = 255;
pub const MIN_AGE_YEARS: u32 = 0;
pub const MAX_AGE_YEARS: u32 = 120;
pub const MIN_ROOM_NUMBER: u32 = 1;
pub const MAX_ROOM_NUMBER: u32 = 50;

/// First id handed out by an empty store.
pub const FIRST_PATIENT_ID: u32 = 1;

/// Fields collected by the caller for a new admission.
/// Already validated by the time they reach the store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NewPatient {
    pub name: String,
    pub age: u32,
    pub diagnosis: String,
    pub room: u32,
}

impl NewPatient {
    pub fn new(name: impl Into<String>, age: u32, diagnosis: impl Into<String>, room: u32) -> Self {
        Self {
            name: name.into(),
            age,
            diagnosis: diagnosis.into(),
            room,
        }
    }
}

/// One admitted patient
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatientRecord {
    /// Unique for the lifetime of the store, never reused
    pub id: u32,
    pub name: String,
    pub age: u32,
    pub diagnosis: String,
    /// Unique among active patients only
    pub room: u32,
    /// Unix seconds, fixed at admission
    pub admitted_at: i64,
}

impl PatientRecord {
    pub fn admit(id: u32, fields: NewPatient, admitted_at: i64) -> Self {
        Self {
            id,
            name: fields.name,
            age: fields.age,
            diagnosis: fields.diagnosis,
            room: fields.room,
            admitted_at,
        }
    }

    pub fn admitted_local(&self) -> Option<DateTime<Local>> {
        local_time(self.admitted_at)
    }
}

impl fmt::Display for PatientRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "---------------------------------------")?;
        writeln!(f, "Patient ID: {}", self.id)?;
        writeln!(f, "Patient Name: {}", self.name)?;
        writeln!(f, "Age: {}", self.age)?;
        writeln!(f, "Diagnosis: {}", self.diagnosis)?;
        writeln!(f, "Room Number: {}", self.room)?;
        write!(f, "---------------------------------------")
    }
}

/// Snapshot of a patient at the moment of discharge.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DischargedRecord {
    pub patient: PatientRecord,
    pub discharged_at: i64,
}

impl DischargedRecord {
    pub fn new(patient: PatientRecord, discharged_at: i64) -> Self {
        Self { patient, discharged_at }
    }

    pub fn discharged_local(&self) -> Option<DateTime<Local>> {
        local_time(self.discharged_at)
    }
}

/// Report window, tested against "now".
/// The three windows are independent, a timestamp may fall in several.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    Daily,
    Weekly,
    Monthly,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::Daily, Timeframe::Weekly, Timeframe::Monthly];

    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::Daily => "Daily",
            Timeframe::Weekly => "Weekly",
            Timeframe::Monthly => "Monthly",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn local_time(unix_secs: i64) -> Option<DateTime<Local>> {
    Local.timestamp_opt(unix_secs, 0).single()
}

pub fn now_unix() -> i64 {
    Local::now().timestamp()
}
