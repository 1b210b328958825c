//! Fixed-width binary layout shared by `patients.dat` and `discharged_patients.dat`.
//!
//! Patient block: `[id u32][name 100b][age u32][diagnosis 255b][room u32][admitted i64]`
//! Discharged block: patient block followed by `[discharged i64]`.
//! Integers are little-endian; text is UTF-8, NUL padded.

use std::io::{self, Read, Write};

use crate::error::{HospitalError, Result};
use crate::model::{DischargedRecord, PatientRecord, MAX_DIAGNOSIS_LEN, MAX_NAME_LEN};

pub const PATIENT_RECORD_SIZE: usize = 4 + MAX_NAME_LEN + 4 + MAX_DIAGNOSIS_LEN + 4 + 8;
pub const DISCHARGED_RECORD_SIZE: usize = PATIENT_RECORD_SIZE + 8;

pub fn encode_patient(record: &PatientRecord) -> Result<[u8; PATIENT_RECORD_SIZE]> {
    let mut buf = [0u8; PATIENT_RECORD_SIZE];
    let mut pos = 0;

    put(&mut buf, &mut pos, &record.id.to_le_bytes());
    put_text(&mut buf, &mut pos, &record.name, MAX_NAME_LEN, "name")?;
    put(&mut buf, &mut pos, &record.age.to_le_bytes());
    put_text(&mut buf, &mut pos, &record.diagnosis, MAX_DIAGNOSIS_LEN, "diagnosis")?;
    put(&mut buf, &mut pos, &record.room.to_le_bytes());
    put(&mut buf, &mut pos, &record.admitted_at.to_le_bytes());

    debug_assert_eq!(pos, PATIENT_RECORD_SIZE);
    Ok(buf)
}

pub fn decode_patient(buf: &[u8; PATIENT_RECORD_SIZE]) -> Result<PatientRecord> {
    let mut pos = 0;

    let id = u32::from_le_bytes(take(buf, &mut pos));
    let name = take_text(buf, &mut pos, MAX_NAME_LEN, "name")?;
    let age = u32::from_le_bytes(take(buf, &mut pos));
    let diagnosis = take_text(buf, &mut pos, MAX_DIAGNOSIS_LEN, "diagnosis")?;
    let room = u32::from_le_bytes(take(buf, &mut pos));
    let admitted_at = i64::from_le_bytes(take(buf, &mut pos));

    Ok(PatientRecord { id, name, age, diagnosis, room, admitted_at })
}

pub fn encode_discharged(record: &DischargedRecord) -> Result<[u8; DISCHARGED_RECORD_SIZE]> {
    let mut buf = [0u8; DISCHARGED_RECORD_SIZE];
    buf[..PATIENT_RECORD_SIZE].copy_from_slice(&encode_patient(&record.patient)?);
    buf[PATIENT_RECORD_SIZE..].copy_from_slice(&record.discharged_at.to_le_bytes());
    Ok(buf)
}

pub fn decode_discharged(buf: &[u8; DISCHARGED_RECORD_SIZE]) -> Result<DischargedRecord> {
    let mut patient_buf = [0u8; PATIENT_RECORD_SIZE];
    patient_buf.copy_from_slice(&buf[..PATIENT_RECORD_SIZE]);
    let patient = decode_patient(&patient_buf)?;

    let mut pos = PATIENT_RECORD_SIZE;
    let discharged_at = i64::from_le_bytes(take(buf, &mut pos));
    Ok(DischargedRecord { patient, discharged_at })
}

/// Patient id of an encoded block, readable even when the text fields are not.
pub fn block_id<const N: usize>(buf: &[u8; N]) -> u32 {
    let mut pos = 0;
    u32::from_le_bytes(take(buf, &mut pos))
}

pub fn write_patient<W: Write>(writer: &mut W, record: &PatientRecord) -> Result<()> {
    writer.write_all(&encode_patient(record)?)?;
    Ok(())
}

/// Reads one block. `Ok(None)` on a clean end of stream; a partial
/// trailing block is reported as `UnexpectedEof`.
pub fn read_block<R: Read, const N: usize>(reader: &mut R) -> io::Result<Option<[u8; N]>> {
    let mut buf = [0u8; N];
    let mut filled = 0;
    while filled < N {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    match filled {
        0 => Ok(None),
        n if n == N => Ok(Some(buf)),
        n => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("partial record: {} of {} bytes", n, N),
        )),
    }
}

// --- HELPERS ---

fn put(buf: &mut [u8], pos: &mut usize, bytes: &[u8]) {
    buf[*pos..*pos + bytes.len()].copy_from_slice(bytes);
    *pos += bytes.len();
}

fn put_text(buf: &mut [u8], pos: &mut usize, text: &str, width: usize, field: &'static str) -> Result<()> {
    let bytes = text.as_bytes();
    if bytes.len() > width {
        return Err(HospitalError::FieldTooLong { field, max: width });
    }
    // would be indistinguishable from padding
    if bytes.contains(&0) {
        return Err(HospitalError::Invalid(format!("{} contains a NUL byte", field)));
    }
    buf[*pos..*pos + bytes.len()].copy_from_slice(bytes);
    *pos += width;
    Ok(())
}

fn take<const N: usize>(buf: &[u8], pos: &mut usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[*pos..*pos + N]);
    *pos += N;
    out
}

fn take_text(buf: &[u8], pos: &mut usize, width: usize, field: &str) -> Result<String> {
    let raw = &buf[*pos..*pos + width];
    *pos += width;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(width);
    String::from_utf8(raw[..end].to_vec())
        .map_err(|_| HospitalError::CorruptRecord(format!("{} is not valid UTF-8", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> PatientRecord {
        PatientRecord {
            id: 42,
            name: "Grace Hopper".into(),
            age: 85,
            diagnosis: "Pneumonia".into(),
            room: 17,
            admitted_at: 1_735_689_600,
        }
    }

    #[test]
    fn layout_sizes_are_fixed() {
        assert_eq!(PATIENT_RECORD_SIZE, 375);
        assert_eq!(DISCHARGED_RECORD_SIZE, 383);
    }

    #[test]
    fn patient_block_decodes_to_same_record() {
        let rec = sample();
        let block = encode_patient(&rec).unwrap();
        assert_eq!(&block[..4], &42u32.to_le_bytes());
        assert_eq!(decode_patient(&block).unwrap(), rec);
    }

    #[test]
    fn name_at_full_width_fits() {
        let mut rec = sample();
        rec.name = "a".repeat(MAX_NAME_LEN);
        let block = encode_patient(&rec).unwrap();
        assert_eq!(decode_patient(&block).unwrap().name.len(), MAX_NAME_LEN);
    }

    #[test]
    fn oversized_text_is_rejected() {
        let mut rec = sample();
        rec.diagnosis = "x".repeat(MAX_DIAGNOSIS_LEN + 1);
        assert!(matches!(
            encode_patient(&rec),
            Err(HospitalError::FieldTooLong { field: "diagnosis", .. })
        ));
    }

    #[test]
    fn invalid_utf8_is_corrupt() {
        let mut block = encode_patient(&sample()).unwrap();
        block[4] = 0xFF;
        assert!(matches!(decode_patient(&block), Err(HospitalError::CorruptRecord(_))));
    }

    #[test]
    fn discharged_block_carries_timestamp() {
        let rec = DischargedRecord::new(sample(), 1_736_000_000);
        let block = encode_discharged(&rec).unwrap();
        assert_eq!(decode_discharged(&block).unwrap(), rec);
    }

    #[test]
    fn read_block_distinguishes_clean_end_from_partial() {
        let mut empty = Cursor::new(Vec::new());
        assert!(read_block::<_, 8>(&mut empty).unwrap().is_none());

        let mut partial = Cursor::new(vec![1u8; 5]);
        let err = read_block::<_, 8>(&mut partial).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
