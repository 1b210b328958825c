//! Interactive menu: reads commands, runs field validation, drives `Hospital`.

use std::io::{BufRead, Write};

use chrono::Local;

use crate::error::{HospitalError, Result};
use crate::model::NewPatient;
use crate::parser::{self, Command, ReportRequest};
use crate::storage::LoadOutcome;
use crate::validation::FieldValidator;
use crate::{DischargeOutcome, Hospital};

enum Flow {
    Continue,
    Exit,
}

pub fn print_banner<W: Write>(out: &mut W) -> Result<()> {
    writeln!(out, "\n==================================================")?;
    writeln!(out, "   Wardlog - Hospital Patient Records")?;
    writeln!(out, "==================================================\n")?;
    writeln!(out, "Type 'HELP' for supported commands or 'EXIT' to quit.\n")?;
    Ok(())
}

fn print_help<W: Write>(out: &mut W) -> Result<()> {
    writeln!(out, "\n--- Available Commands ---")?;
    writeln!(out, "1. ADMIT:      ADMIT \"name\", age, \"diagnosis\", room")?;
    writeln!(out, "2. LIST:       LIST")?;
    writeln!(out, "3. FIND:       FIND id")?;
    writeln!(out, "4. DISCHARGE:  DISCHARGE id   (asks for confirmation)")?;
    writeln!(out, "5. COUNT:      COUNT")?;
    writeln!(out, "6. BACKUP:     BACKUP")?;
    writeln!(out, "7. RESTORE:    RESTORE")?;
    writeln!(out, "8. REPORTS:    REPORT ADMISSIONS daily|weekly|monthly")?;
    writeln!(out, "               REPORT DISCHARGES daily|weekly|monthly")?;
    writeln!(out, "               REPORT ROOMS")?;
    writeln!(out, "9. EXIT:       Quit\n")?;
    Ok(())
}

/// Runs until EXIT or end of input. Only fatal errors end the loop early.
pub fn run_shell<R, W, V>(hospital: &mut Hospital, mut input: R, out: &mut W, validator: &V) -> Result<()>
where
    R: BufRead,
    W: Write,
    V: FieldValidator + ?Sized,
{
    let mut buffer = String::new();

    loop {
        write!(out, "ward> ")?;
        out.flush()?;
        buffer.clear();

        if input.read_line(&mut buffer)? == 0 { break; }
        if buffer.trim().is_empty() { continue; }

        match parser::parse_command(&buffer) {
            Ok(cmd) => match execute_command(hospital, cmd, &mut input, out, validator) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => break,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => writeln!(out, "[\u{26a0}\u{fe0f} Error] {}", e)?,
            },
            Err(e) => {
                writeln!(out, "[\u{2717} Syntax Error] {}", e)?;
                if buffer.trim_start().to_uppercase().starts_with("ADMIT") {
                    writeln!(out, "    \u{2139}\u{fe0f}  Hint: ADMIT \"Jane Doe\", 42, \"Influenza\", 7")?;
                }
            }
        }
    }
    Ok(())
}

fn execute_command<R, W, V>(
    hospital: &mut Hospital,
    cmd: Command,
    input: &mut R,
    out: &mut W,
    validator: &V,
) -> Result<Flow>
where
    R: BufRead,
    W: Write,
    V: FieldValidator + ?Sized,
{
    match cmd {
        Command::Help => print_help(out)?,
        Command::Admit { name, age, diagnosis, room } => {
            perform_admit(hospital, NewPatient::new(name, age, diagnosis, room), out, validator)?
        }
        Command::List => perform_list(hospital, out)?,
        Command::Count => writeln!(out, "Active patients: {}", hospital.count())?,
        Command::Find { id } => match hospital.find(id) {
            Some(patient) => writeln!(out, "{}", patient)?,
            None => writeln!(out, "[\u{2717}] Patient {} doesn't exist.", id)?,
        },
        Command::Discharge { id } => perform_discharge(hospital, id, input, out)?,
        Command::Backup => {
            hospital.backup()?;
            writeln!(out, "[\u{2713} OK] Backup written to {}", hospital.store().file_path.display())?;
        }
        Command::Restore => {
            let outcome = hospital.restore()?;
            report_load(&outcome, hospital.count(), out)?;
        }
        Command::Report(request) => perform_report(hospital, request, out)?,
        Command::Exit => return Ok(Flow::Exit),
    }
    Ok(Flow::Continue)
}

pub fn report_load<W: Write>(outcome: &LoadOutcome, count: usize, out: &mut W) -> Result<()> {
    match outcome {
        LoadOutcome::Loaded { .. } => writeln!(out, "[\u{2713} OK] {} patients loaded from file.", count)?,
        LoadOutcome::Default(reason) => {
            writeln!(out, "[\u{26a0}\u{fe0f}] Patient file not loaded ({}). Started with default settings.", reason)?
        }
    }
    Ok(())
}

fn perform_admit<W, V>(hospital: &mut Hospital, fields: NewPatient, out: &mut W, validator: &V) -> Result<()>
where
    W: Write,
    V: FieldValidator + ?Sized,
{
    if let Err(reason) = validator.validate(&fields) {
        return Err(HospitalError::Invalid(reason));
    }
    let admitted = hospital.admit(fields)?;

    writeln!(out, "--- Patient Added ---")?;
    writeln!(out, "{}", admitted.record)?;
    if !admitted.persisted {
        writeln!(out, "[\u{26a0}\u{fe0f}] Not yet saved to disk; it will be written on the next BACKUP or discharge.")?;
    }
    Ok(())
}

fn perform_list<W: Write>(hospital: &Hospital, out: &mut W) -> Result<()> {
    if hospital.count() == 0 {
        writeln!(out, "No patients admitted!")?;
        return Ok(());
    }
    for patient in hospital.patients() {
        writeln!(out, "{}", patient)?;
    }
    Ok(())
}

fn perform_discharge<R, W>(hospital: &mut Hospital, id: u32, input: &mut R, out: &mut W) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    let Some(patient) = hospital.find(id) else {
        writeln!(out, "[\u{2717}] Patient {} not found.", id)?;
        return Ok(());
    };
    writeln!(out, "Patient ID: {}", patient.id)?;
    writeln!(out, "Patient Name: {}", patient.name)?;
    write!(out, "Are you sure you want to discharge this patient? (y/n) ")?;
    out.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    let confirmed = answer.trim().eq_ignore_ascii_case("y");

    match hospital.discharge(id, confirmed)? {
        DischargeOutcome::NotFound => writeln!(out, "[\u{2717}] Patient {} not found.", id)?,
        DischargeOutcome::Cancelled(_) => writeln!(out, "Patient discharge cancelled.")?,
        DischargeOutcome::Discharged { record, persisted } => {
            writeln!(out, "[\u{2713} OK] Patient {} has been discharged from room {}.", id, record.patient.room)?;
            if !persisted {
                writeln!(out, "[\u{26a0}\u{fe0f}] Patient file not updated; run BACKUP to retry.")?;
            }
        }
    }
    Ok(())
}

fn perform_report<W: Write>(hospital: &Hospital, request: ReportRequest, out: &mut W) -> Result<()> {
    let now = Local::now();
    let report = match request {
        ReportRequest::Admissions(tf) => hospital.admission_report(tf, now),
        ReportRequest::Discharges(tf) => hospital.discharge_report(tf, now)?,
        ReportRequest::Rooms => hospital.room_usage_report(now)?,
    };
    writeln!(out)?;
    let path = hospital.publish(&report, out)?;
    writeln!(out, "\nReport successfully written to {}", path.display())?;
    Ok(())
}
