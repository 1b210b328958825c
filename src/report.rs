//! Timeframe-bucketed admission/discharge reports and the room occupancy report.
//!
//! Reports are rendered to text once, then published to the console and
//! appended to the matching report file so history accumulates.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Duration, Local};
use tracing::{info, warn};

use crate::archive::DischargeArchive;
use crate::config::HospitalConfig;
use crate::error::{HospitalError, Result};
use crate::model::{local_time, PatientRecord, Timeframe};
use crate::room_log::RoomUsageLog;

const RULE: &str = "---------------------------------------";
const DOUBLE_RULE: &str = "=======================================";
const ROOM_RULE: &str = "-------------------------";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// True if `ts` falls in `timeframe` relative to `now`.
///
/// * Daily: at most 24 hours old.
/// * Weekly: same calendar year, 0..7 days behind by day-of-year.
/// * Monthly: same calendar year and month.
///
/// Timestamps after `now` never match Daily or Weekly.
pub fn in_timeframe(ts: DateTime<Local>, now: DateTime<Local>, timeframe: Timeframe) -> bool {
    match timeframe {
        Timeframe::Daily => {
            let age = now.signed_duration_since(ts);
            age >= Duration::zero() && age <= Duration::hours(24)
        }
        Timeframe::Weekly => {
            let days_back = i64::from(now.ordinal()) - i64::from(ts.ordinal());
            ts.year() == now.year() && (0..7).contains(&days_back)
        }
        Timeframe::Monthly => ts.year() == now.year() && ts.month() == now.month(),
    }
}

fn unix_in_timeframe(unix_secs: i64, now: DateTime<Local>, timeframe: Timeframe) -> bool {
    local_time(unix_secs).map_or(false, |ts| in_timeframe(ts, now, timeframe))
}

fn format_date(unix_secs: i64) -> String {
    local_time(unix_secs)
        .map(|t| t.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Admissions,
    Discharges,
    RoomUsage,
}

/// A rendered report. `body` excludes the generation date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub kind: ReportKind,
    pub title: String,
    pub generated_on: String,
    pub matched: usize,
    pub body: String,
}

impl Report {
    pub fn render(&self) -> String {
        format!("{} - {}\n{}", self.title, self.generated_on, self.body)
    }
}

/// Read-only report builder; owns only the report file locations.
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    admissions_path: PathBuf,
    discharges_path: PathBuf,
    room_usage_path: PathBuf,
}

impl ReportGenerator {
    pub fn new(config: &HospitalConfig) -> Self {
        Self {
            admissions_path: config.admission_reports_path(),
            discharges_path: config.discharge_reports_path(),
            room_usage_path: config.room_reports_path(),
        }
    }

    pub fn output_path(&self, kind: ReportKind) -> &Path {
        match kind {
            ReportKind::Admissions => &self.admissions_path,
            ReportKind::Discharges => &self.discharges_path,
            ReportKind::RoomUsage => &self.room_usage_path,
        }
    }

    pub fn admission_report(
        &self,
        patients: &[PatientRecord],
        timeframe: Timeframe,
        now: DateTime<Local>,
    ) -> Report {
        let rows: Vec<(&PatientRecord, i64)> = patients
            .iter()
            .filter(|p| unix_in_timeframe(p.admitted_at, now, timeframe))
            .map(|p| (p, p.admitted_at))
            .collect();

        Report {
            kind: ReportKind::Admissions,
            title: format!("Patient Admission Report - {}", timeframe),
            generated_on: now.format(DATE_FORMAT).to_string(),
            matched: rows.len(),
            body: render_patient_rows(&rows, "admitted", "Admitted"),
        }
    }

    /// Unreadable archive entries are skipped; I/O failures abort the report.
    pub fn discharge_report(
        &self,
        archive: &DischargeArchive,
        timeframe: Timeframe,
        now: DateTime<Local>,
    ) -> Result<Report> {
        let mut matching = Vec::new();
        for entry in archive.scan()? {
            match entry {
                Ok(record) if unix_in_timeframe(record.discharged_at, now, timeframe) => matching.push(record),
                Ok(_) => {}
                Err(HospitalError::CorruptRecord(e)) => {
                    warn!("{}: skipping unreadable entry: {}", archive.file_path.display(), e)
                }
                Err(e) => return Err(e),
            }
        }
        let rows: Vec<(&PatientRecord, i64)> =
            matching.iter().map(|d| (&d.patient, d.discharged_at)).collect();

        Ok(Report {
            kind: ReportKind::Discharges,
            title: format!("Discharged Patient Report - {}", timeframe),
            generated_on: now.format(DATE_FORMAT).to_string(),
            matched: rows.len(),
            body: render_patient_rows(&rows, "discharged", "Discharged"),
        })
    }

    pub fn room_usage_report(&self, log: &RoomUsageLog, now: DateTime<Local>) -> Result<Report> {
        let mut body = String::new();
        let matched;

        match log.aggregate()? {
            None => {
                matched = 0;
                line(&mut body, ROOM_RULE);
                line(&mut body, "No room usage has been logged yet.");
                line(&mut body, ROOM_RULE);
            }
            Some(usage) => {
                matched = usage.counts.len();
                line(&mut body, "Room | Usage Count");
                line(&mut body, "-----|------------");
                for (room, count) in &usage.counts {
                    line(&mut body, format!("{:<4} | {}", room, count));
                }
                if usage.valid_entries == 0 {
                    line(&mut body, "No valid room usage data found in the log.");
                }
                line(&mut body, ROOM_RULE);
                line(&mut body, format!("Total entries read: {}", usage.total_entries));
                line(&mut body, format!("Valid rooms logged: {}", usage.valid_entries));
                line(&mut body, ROOM_RULE);
            }
        }

        Ok(Report {
            kind: ReportKind::RoomUsage,
            title: "Room Usage Report".to_string(),
            generated_on: now.format(DATE_FORMAT).to_string(),
            matched,
            body,
        })
    }

    /// Writes the report to `console`, then appends it (blank-line separated)
    /// to its report file.
    pub fn publish<W: Write>(&self, report: &Report, console: &mut W) -> Result<PathBuf> {
        let text = report.render();
        console.write_all(text.as_bytes())?;
        console.flush()?;

        let path = self.output_path(report.kind).to_path_buf();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file)?;
        file.write_all(text.as_bytes())?;
        info!(matched = report.matched, "report appended to {}", path.display());
        Ok(path)
    }
}

fn line(body: &mut String, text: impl AsRef<str>) {
    body.push_str(text.as_ref());
    body.push('\n');
}

fn render_patient_rows(rows: &[(&PatientRecord, i64)], verb: &str, column: &str) -> String {
    let mut body = String::new();
    line(&mut body, DOUBLE_RULE);
    line(&mut body, format!("Total patients {}: {}", verb, rows.len()));
    line(&mut body, RULE);

    if rows.is_empty() {
        line(&mut body, format!("| No patients {} in this timeframe |", verb));
        line(&mut body, RULE);
        return body;
    }

    for (p, at) in rows {
        line(
            &mut body,
            format!(
                "| ID: {:<5} Name: {:<15} | Age: {:<3} Room: {:<5} Diagnosis: {:<20} | {}: {:<10} |",
                p.id,
                p.name,
                p.age,
                p.room,
                p.diagnosis,
                column,
                format_date(*at)
            ),
        );
        line(&mut body, RULE);
    }
    body
}
