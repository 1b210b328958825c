use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HospitalError, Result};

/// File locations and durability mode.
/// Relative file names are resolved against `data_dir`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HospitalConfig {
    pub data_dir: PathBuf,
    pub patients_file: PathBuf,
    pub discharged_file: PathBuf,
    pub room_log_file: PathBuf,
    pub admission_reports_file: PathBuf,
    pub discharge_reports_file: PathBuf,
    pub room_reports_file: PathBuf,
    /// true = fsync the temp file before it replaces the backing file
    pub strict_durability: bool,
}

impl Default for HospitalConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            patients_file: PathBuf::from("patients.dat"),
            discharged_file: PathBuf::from("discharged_patients.dat"),
            room_log_file: PathBuf::from("room_usage.txt"),
            admission_reports_file: PathBuf::from("patient_reports.txt"),
            discharge_reports_file: PathBuf::from("discharged_reports.txt"),
            room_reports_file: PathBuf::from("room_usage_reports.txt"),
            strict_durability: true,
        }
    }
}

impl HospitalConfig {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: dir.into(), ..Self::default() }
    }

    /// Reads a JSON config. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| HospitalError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| HospitalError::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    pub fn patients_path(&self) -> PathBuf {
        self.resolve(&self.patients_file)
    }

    pub fn discharged_path(&self) -> PathBuf {
        self.resolve(&self.discharged_file)
    }

    pub fn room_log_path(&self) -> PathBuf {
        self.resolve(&self.room_log_file)
    }

    pub fn admission_reports_path(&self) -> PathBuf {
        self.resolve(&self.admission_reports_file)
    }

    pub fn discharge_reports_path(&self) -> PathBuf {
        self.resolve(&self.discharge_reports_file)
    }

    pub fn room_reports_path(&self) -> PathBuf {
        self.resolve(&self.room_reports_file)
    }

    fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.data_dir.join(file)
        }
    }
}
