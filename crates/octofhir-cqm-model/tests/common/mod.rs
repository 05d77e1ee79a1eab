//! Shared helpers for loader tests

use chrono::NaiveDate;
use octofhir_cqm_model::{Patient, PatientRecord};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn record(id: &str, first_name: &str) -> PatientRecord {
    PatientRecord::new(Patient::new(id, first_name).born(date(1962, 4, 12)))
}

pub fn record_json(id: &str) -> String {
    format!(
        r#"{{
            "patient": {{"id": "{id}", "first_name": "Ada", "birth_date": "1962-04-12"}},
            "facts": [
                {{"kind": "referral_report", "id": "r1", "original_date": "2020-03-01",
                  "codings": [{{"system": "SNOMEDCT", "code": "73761001"}}]}}
            ]
        }}"#
    )
}
