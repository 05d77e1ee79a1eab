//! Shared fixtures for runner tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use octofhir_cqm::model::{ClinicalFact, LabReport, LabValue, LoaderError, Patient};
use octofhir_cqm::types::{CodeSystem, Coding};
use octofhir_cqm::{EvaluationContext, InMemoryRecordLoader, MeasurementPeriod, PatientRecord, RecordLoader};
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn ctx() -> EvaluationContext {
    EvaluationContext::new(date(2024, 10, 1), MeasurementPeriod::calendar_year(2024).unwrap())
}

/// 62-year-old with a FOBT three months before `ctx().now`
pub fn screened_patient(id: &str) -> PatientRecord {
    PatientRecord::new(Patient::new(id, "Ada").born(date(1962, 1, 1))).with_fact(ClinicalFact::LabReport(LabReport {
        id: "fobt".into(),
        original_date: Some(date(2024, 7, 1)),
        junked: false,
        values: vec![LabValue {
            value: Some(json!("negative")),
            units: None,
            codings: [Coding::new(CodeSystem::Loinc, "12503-9")].into_iter().collect(),
        }],
    }))
}

/// In-memory loader that counts calls
#[derive(Default)]
pub struct CountingLoader {
    pub inner: InMemoryRecordLoader,
    calls: AtomicUsize,
}

impl CountingLoader {
    pub fn with(records: impl IntoIterator<Item = PatientRecord>) -> Self {
        Self {
            inner: records.into_iter().collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordLoader for CountingLoader {
    async fn load(&self, patient_id: &str) -> Result<Option<PatientRecord>, LoaderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.load(patient_id).await
    }
}

/// Loader whose every read fails
pub struct BrokenLoader;

#[async_trait]
impl RecordLoader for BrokenLoader {
    async fn load(&self, patient_id: &str) -> Result<Option<PatientRecord>, LoaderError> {
        Err(LoaderError::Io {
            path: PathBuf::from(format!("{patient_id}.json")),
            source: std::io::Error::other("disk unavailable"),
        })
    }
}
