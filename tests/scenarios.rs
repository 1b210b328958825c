use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};

use chrono::{Local, TimeZone};
use tempfile::TempDir;
use wardlog::codec::PATIENT_RECORD_SIZE;
use wardlog::config::HospitalConfig;
use wardlog::error::HospitalError;
use wardlog::model::{NewPatient, Timeframe};
use wardlog::storage::{Fallback, LoadOutcome};
use wardlog::{DischargeOutcome, Hospital};

fn open(dir: &TempDir) -> (Hospital, LoadOutcome) {
    let mut config = HospitalConfig::in_dir(dir.path());
    config.strict_durability = false;
    Hospital::open(config).unwrap()
}

fn admit(hospital: &mut Hospital, name: &str, room: u32) -> u32 {
    hospital
        .admit(NewPatient::new(name, 45, "Observation", room))
        .unwrap()
        .record
        .id
}

#[test]
fn discharge_moves_patient_to_archive_and_frees_room() {
    let dir = TempDir::new().unwrap();
    let (mut hospital, _) = open(&dir);

    let ids: Vec<u32> = [10, 11, 12]
        .iter()
        .map(|room| admit(&mut hospital, "Patient", *room))
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);

    let outcome = hospital.discharge(2, true).unwrap();
    assert!(matches!(outcome, DischargeOutcome::Discharged { persisted: true, .. }));

    assert!(hospital.find(2).is_none());
    assert!(hospital.find_by_room(11).is_none());

    let archived: Vec<_> = hospital.archive().scan().unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].patient.id, 2);

    let rooms: Vec<u32> = hospital.room_log().scan().unwrap().collect();
    assert_eq!(rooms, vec![11]);
}

#[test]
fn zero_length_file_starts_default() {
    let dir = TempDir::new().unwrap();
    File::create(dir.path().join("patients.dat")).unwrap();

    let (hospital, outcome) = open(&dir);
    assert_eq!(outcome, LoadOutcome::Default(Fallback::Empty));
    assert_eq!(hospital.count(), 0);
    assert_eq!(hospital.store().next_id(), 1);
}

#[test]
fn truncated_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    {
        let (mut hospital, _) = open(&dir);
        admit(&mut hospital, "Ada", 1);
    }
    let path = dir.path().join("patients.dat");
    OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(PATIENT_RECORD_SIZE as u64 - 1)
        .unwrap();

    let (hospital, outcome) = open(&dir);
    assert!(matches!(outcome, LoadOutcome::Default(Fallback::SizeMismatch { .. })));
    assert_eq!(hospital.count(), 0);
}

#[test]
fn empty_daily_report_has_explicit_none_line() {
    let dir = TempDir::new().unwrap();
    let (hospital, _) = open(&dir);

    let report = hospital.admission_report(Timeframe::Daily, Local::now());
    assert_eq!(report.matched, 0);
    assert!(report.body.contains("Total patients admitted: 0"));
    assert!(report.body.contains("No patients admitted in this timeframe"));
}

#[test]
fn discharged_ids_are_not_reissued_after_restart() {
    let dir = TempDir::new().unwrap();
    {
        let (mut hospital, _) = open(&dir);
        admit(&mut hospital, "Ada", 1);
        admit(&mut hospital, "Alan", 2);
        // Highest id leaves before the restart
        hospital.discharge(2, true).unwrap();
        hospital.shutdown().unwrap();
    }

    let (mut hospital, _) = open(&dir);
    assert_eq!(hospital.count(), 1);
    assert_eq!(admit(&mut hospital, "Grace", 3), 3);
}

#[test]
fn unconfirmed_discharge_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let (mut hospital, _) = open(&dir);
    admit(&mut hospital, "Ada", 5);
    let before = fs::read(dir.path().join("patients.dat")).unwrap();

    let outcome = hospital.discharge(1, false).unwrap();
    assert!(matches!(outcome, DischargeOutcome::Cancelled(ref p) if p.id == 1));
    assert!(hospital.find(1).is_some());
    assert!(!hospital.archive().exists());
    assert_eq!(fs::read(dir.path().join("patients.dat")).unwrap(), before);

    assert_eq!(hospital.discharge(99, true).unwrap(), DischargeOutcome::NotFound);
}

#[test]
fn failed_archive_write_keeps_patient_active() {
    let dir = TempDir::new().unwrap();
    // A directory where the archive file should be
    fs::create_dir(dir.path().join("discharged_patients.dat")).unwrap();
    let (mut hospital, _) = open(&dir);
    admit(&mut hospital, "Ada", 5);

    let err = hospital.discharge(1, true).unwrap_err();
    assert!(matches!(err, HospitalError::ArchiveFailed { id: 1, .. }));
    assert!(hospital.find(1).is_some());
    assert!(!dir.path().join("room_usage.txt").exists());

    let (reloaded, _) = open(&dir);
    assert!(reloaded.find(1).is_some());
}

#[test]
fn backup_and_restore_round_trip() {
    let dir = TempDir::new().unwrap();
    let (mut hospital, _) = open(&dir);
    for room in 1..=6 {
        admit(&mut hospital, "Patient", room);
    }
    hospital.discharge(3, true).unwrap();
    hospital.discharge(6, true).unwrap();
    hospital.backup().unwrap();
    let saved: HashSet<_> = hospital.patients().iter().cloned().collect();

    let outcome = hospital.restore().unwrap();
    assert_eq!(outcome, LoadOutcome::Loaded { count: 4 });
    let restored: HashSet<_> = hospital.patients().iter().cloned().collect();
    assert_eq!(saved, restored);
    // Id 6 was discharged, so the generator stays past it
    assert_eq!(hospital.store().next_id(), 7);
}

#[test]
fn active_rooms_stay_unique() {
    let dir = TempDir::new().unwrap();
    let (mut hospital, _) = open(&dir);
    let rooms = [3, 4, 3, 5, 4, 6, 3];

    for (step, room) in rooms.iter().enumerate() {
        let result = hospital.admit(NewPatient::new("Patient", 30, "Observation", *room));
        if step % 3 == 2 {
            // Free the oldest occupant now and then
            let oldest = hospital.patients()[0].id;
            hospital.discharge(oldest, true).unwrap();
        }
        if let Err(e) = result {
            assert!(matches!(e, HospitalError::RoomOccupied { .. }));
        }
        let active: Vec<u32> = hospital.patients().iter().map(|p| p.room).collect();
        let distinct: HashSet<u32> = active.iter().copied().collect();
        assert_eq!(active.len(), distinct.len());
    }
}

#[test]
fn repeated_reports_have_identical_bodies() {
    let dir = TempDir::new().unwrap();
    let (mut hospital, _) = open(&dir);
    admit(&mut hospital, "Ada", 1);
    admit(&mut hospital, "Alan", 2);
    hospital.discharge(1, true).unwrap();

    let now = Local::now();
    for tf in Timeframe::ALL {
        assert_eq!(
            hospital.admission_report(tf, now).body,
            hospital.admission_report(tf, now).body
        );
        assert_eq!(
            hospital.discharge_report(tf, now).unwrap().body,
            hospital.discharge_report(tf, now).unwrap().body
        );
    }
    let first = hospital.room_usage_report(now).unwrap();
    let mut console = Vec::new();
    hospital.publish(&first, &mut console).unwrap();
    assert_eq!(first.body, hospital.room_usage_report(now).unwrap().body);
}

#[test]
fn discharge_report_uses_discharge_time() {
    let dir = TempDir::new().unwrap();
    let (mut hospital, _) = open(&dir);
    let now = Local.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).single().unwrap();
    let long_ago = Local.with_ymd_and_hms(2025, 1, 3, 9, 0, 0).single().unwrap();

    hospital
        .admit_at(NewPatient::new("Ada", 36, "Fatigue", 8), long_ago.timestamp())
        .unwrap();
    hospital.discharge_at(1, true, now.timestamp() - 3_600).unwrap();

    let report = hospital.discharge_report(Timeframe::Daily, now).unwrap();
    assert_eq!(report.matched, 1);
    assert!(report.body.contains("Discharged: 2025-06-15"));
}

#[test]
fn shutdown_flushes_pending_rewrite() {
    let dir = TempDir::new().unwrap();
    let tmp = dir.path().join("patients.tmp");
    let (mut hospital, _) = open(&dir);
    admit(&mut hospital, "Ada", 1);
    admit(&mut hospital, "Alan", 2);

    fs::create_dir(&tmp).unwrap();
    let outcome = hospital.discharge(1, true).unwrap();
    assert!(matches!(outcome, DischargeOutcome::Discharged { persisted: false, .. }));
    fs::remove_dir(&tmp).unwrap();

    hospital.shutdown().unwrap();
    let (reloaded, _) = open(&dir);
    assert!(reloaded.find(1).is_none());
    assert_eq!(reloaded.count(), 1);
}

#[test]
fn unloadable_file_survives_open_and_shutdown() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("patients.dat");
    {
        let (mut hospital, _) = open(&dir);
        admit(&mut hospital, "Ada", 1);
        admit(&mut hospital, "Alan", 2);
    }
    OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(2 * PATIENT_RECORD_SIZE as u64 - 10)
        .unwrap();
    let damaged = fs::read(&path).unwrap();

    let (hospital, outcome) = open(&dir);
    assert!(matches!(outcome, LoadOutcome::Default(Fallback::SizeMismatch { .. })));
    hospital.shutdown().unwrap();
    assert_eq!(fs::read(&path).unwrap(), damaged);

    // The first real change keeps a copy of the damaged file
    let (mut hospital, _) = open(&dir);
    admit(&mut hospital, "Grace", 3);
    assert_eq!(fs::read(dir.path().join("patients.dat.corrupt")).unwrap(), damaged);
    assert_eq!(fs::metadata(&path).unwrap().len(), PATIENT_RECORD_SIZE as u64);
}

#[test]
fn failed_room_log_write_rolls_back_archive() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("room_usage.txt")).unwrap();
    let (mut hospital, _) = open(&dir);
    admit(&mut hospital, "Ada", 5);

    let err = hospital.discharge(1, true).unwrap_err();
    assert!(matches!(err, HospitalError::ArchiveFailed { id: 1, .. }));
    assert!(hospital.find(1).is_some());
    assert_eq!(hospital.archive().scan().unwrap().count(), 0);

    let report = hospital.discharge_report(Timeframe::Daily, Local::now()).unwrap();
    assert_eq!(report.matched, 0);
}

#[test]
fn restore_writes_pending_discharge_first() {
    let dir = TempDir::new().unwrap();
    let tmp = dir.path().join("patients.tmp");
    let (mut hospital, _) = open(&dir);
    admit(&mut hospital, "Ada", 1);
    admit(&mut hospital, "Alan", 2);

    fs::create_dir(&tmp).unwrap();
    let outcome = hospital.discharge(1, true).unwrap();
    assert!(matches!(outcome, DischargeOutcome::Discharged { persisted: false, .. }));

    // The stale file still lists Ada, so reloading it is refused
    assert!(hospital.restore().is_err());
    assert!(hospital.find(1).is_none());
    assert_eq!(hospital.count(), 1);

    fs::remove_dir(&tmp).unwrap();
    assert_eq!(hospital.restore().unwrap(), LoadOutcome::Loaded { count: 1 });
    assert!(hospital.find(1).is_none());
    assert!(hospital.find(2).is_some());
}

#[test]
fn unreadable_archive_entry_still_retires_its_id() {
    let dir = TempDir::new().unwrap();
    let archive_path = dir.path().join("discharged_patients.dat");
    {
        let (mut hospital, _) = open(&dir);
        admit(&mut hospital, "Ada", 1);
        admit(&mut hospital, "Alan", 2);
        admit(&mut hospital, "Grace", 3);
        hospital.discharge(3, true).unwrap();
        hospital.shutdown().unwrap();
    }
    // Invalid UTF-8 in the archived name
    let mut bytes = fs::read(&archive_path).unwrap();
    bytes[4] = 0xFF;
    fs::write(&archive_path, bytes).unwrap();

    let (mut hospital, _) = open(&dir);
    assert_eq!(hospital.store().next_id(), 4);
    assert_eq!(admit(&mut hospital, "Barbara", 4), 4);
}
