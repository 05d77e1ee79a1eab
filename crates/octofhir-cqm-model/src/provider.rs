//! Record loading traits

use async_trait::async_trait;
use std::path::PathBuf;

use crate::patient::PatientRecord;

/// Source of patient snapshots.
///
/// One call models one read transaction on the host: the returned record is
/// a consistent view that evaluation borrows from and never mutates.
#[async_trait]
pub trait RecordLoader: Send + Sync {
    /// Load the snapshot for `patient_id`; `Ok(None)` when the patient is unknown
    async fn load(&self, patient_id: &str) -> Result<Option<PatientRecord>, LoaderError>;
}

/// Record loader error
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid record {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Record for '{requested}' belongs to patient '{found}'")]
    PatientMismatch { requested: String, found: String },
}
