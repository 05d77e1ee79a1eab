//! Record loader implementations

use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::patient::PatientRecord;
use crate::provider::{LoaderError, RecordLoader};

/// Loader backed by an in-memory map; useful for tests and embedding hosts
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordLoader {
    records: Arc<RwLock<HashMap<String, PatientRecord>>>,
}

impl InMemoryRecordLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a patient's snapshot
    pub fn insert(&self, record: PatientRecord) {
        self.records.write().insert(record.patient.id.clone(), record);
    }

    pub fn remove(&self, patient_id: &str) -> Option<PatientRecord> {
        self.records.write().remove(patient_id)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl FromIterator<PatientRecord> for InMemoryRecordLoader {
    fn from_iter<T: IntoIterator<Item = PatientRecord>>(iter: T) -> Self {
        let loader = Self::new();
        for record in iter {
            loader.insert(record);
        }
        loader
    }
}

#[async_trait]
impl RecordLoader for InMemoryRecordLoader {
    async fn load(&self, patient_id: &str) -> Result<Option<PatientRecord>, LoaderError> {
        Ok(self.records.read().get(patient_id).cloned())
    }
}

/// Loader reading `<root>/<patient-id>.json` snapshots
#[derive(Debug, Clone)]
pub struct JsonDirectoryLoader {
    root: PathBuf,
}

impl JsonDirectoryLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, patient_id: &str) -> Option<PathBuf> {
        let is_plain = !patient_id.is_empty()
            && patient_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !patient_id.starts_with('.');
        is_plain.then(|| self.root.join(format!("{patient_id}.json")))
    }
}

#[async_trait]
impl RecordLoader for JsonDirectoryLoader {
    async fn load(&self, patient_id: &str) -> Result<Option<PatientRecord>, LoaderError> {
        let Some(path) = self.path_for(patient_id) else {
            warn!("Refusing to load record for malformed patient id '{}'", patient_id);
            return Ok(None);
        };

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No record at {}", path.display());
                return Ok(None);
            }
            Err(source) => return Err(LoaderError::Io { path, source }),
        };

        let record = PatientRecord::from_json(&contents).map_err(|source| LoaderError::Parse {
            path: path.clone(),
            source,
        })?;

        if record.patient.id != patient_id {
            return Err(LoaderError::PatientMismatch {
                requested: patient_id.to_string(),
                found: record.patient.id,
            });
        }

        Ok(Some(record))
    }
}
