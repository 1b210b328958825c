use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HospitalError>;

#[derive(Error, Debug)]
pub enum HospitalError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("room {room} is already occupied")]
    RoomOccupied { room: u32 },

    #[error("{field} exceeds {max} bytes")]
    FieldTooLong { field: &'static str, max: usize },

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    /// Growing the active collection failed. Not recoverable.
    #[error("allocation failed: {0}")]
    Allocation(String),

    /// Archive or room log write failed; the patient is still active.
    #[error("discharge of patient {id} not recorded: {source}")]
    ArchiveFailed {
        id: u32,
        #[source]
        source: io::Error,
    },

    #[error("config error: {0}")]
    Config(String),
}

impl HospitalError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, HospitalError::Allocation(_))
    }
}
