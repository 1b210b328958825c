use crate::model::{
    NewPatient, MAX_AGE_YEARS, MAX_DIAGNOSIS_LEN, MAX_NAME_LEN, MAX_ROOM_NUMBER, MIN_AGE_YEARS, MIN_ROOM_NUMBER,
};

/// Field-level checks run by the caller before anything reaches the store.
/// Room occupancy is not a field rule; the store enforces it.
pub trait FieldValidator {
    fn name(&self, name: &str) -> Result<(), String>;
    fn age(&self, age: u32) -> Result<(), String>;
    fn diagnosis(&self, diagnosis: &str) -> Result<(), String>;
    fn room(&self, room: u32) -> Result<(), String>;

    fn validate(&self, fields: &NewPatient) -> Result<(), String> {
        self.name(&fields.name)?;
        self.age(fields.age)?;
        self.diagnosis(&fields.diagnosis)?;
        self.room(fields.room)
    }
}

/// The ward's admission rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct WardRules;

impl FieldValidator for WardRules {
    fn name(&self, name: &str) -> Result<(), String> {
        check_text("name", name, MAX_NAME_LEN)
    }

    fn age(&self, age: u32) -> Result<(), String> {
        if !(MIN_AGE_YEARS..=MAX_AGE_YEARS).contains(&age) {
            return Err(format!("age must be between {} and {}", MIN_AGE_YEARS, MAX_AGE_YEARS));
        }
        Ok(())
    }

    fn diagnosis(&self, diagnosis: &str) -> Result<(), String> {
        check_text("diagnosis", diagnosis, MAX_DIAGNOSIS_LEN)
    }

    fn room(&self, room: u32) -> Result<(), String> {
        if !(MIN_ROOM_NUMBER..=MAX_ROOM_NUMBER).contains(&room) {
            return Err(format!("room must be between {} and {}", MIN_ROOM_NUMBER, MAX_ROOM_NUMBER));
        }
        Ok(())
    }
}

// Non-empty, bounded, at least one letter, no digits
fn check_text(field: &str, text: &str, max_len: usize) -> Result<(), String> {
    if text.is_empty() || text.len() > max_len {
        return Err(format!("{} must be 1 to {} bytes", field, max_len));
    }
    if text.chars().any(|c| c.is_ascii_digit()) {
        return Err(format!("{} must not contain digits", field));
    }
    if !text.chars().any(char::is_alphabetic) {
        return Err(format!("{} must contain at least one letter", field));
    }
    Ok(())
}
