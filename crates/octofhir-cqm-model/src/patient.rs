//! Patient snapshot

use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::date;
use crate::fact::{ClinicalFact, Fact, FactKind};

/// Demographics needed by measure evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "date::deserialize")]
    pub birth_date: Option<NaiveDate>,
}

impl Patient {
    pub fn new(id: impl Into<String>, first_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: None,
            birth_date: None,
        }
    }

    pub fn born(mut self, birth_date: NaiveDate) -> Self {
        self.birth_date = Some(birth_date);
        self
    }

    /// Name used in card narratives
    pub fn display_name(&self) -> &str {
        if self.first_name.trim().is_empty() {
            "Patient"
        } else {
            self.first_name.trim()
        }
    }
}

/// A read-only snapshot of one patient's longitudinal record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub patient: Patient,
    #[serde(default, deserialize_with = "deserialize_facts")]
    pub facts: Vec<ClinicalFact>,
}

/// Facts that cannot be read (unknown kinds, wrong field types) are skipped
/// so one bad entry does not hide the rest of the record.
fn deserialize_facts<'de, D>(deserializer: D) -> Result<Vec<ClinicalFact>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|value| {
            let id = value.get("id").and_then(Value::as_str).unwrap_or("?").to_string();
            match serde_json::from_value::<ClinicalFact>(value) {
                Ok(fact) => Some(fact),
                Err(e) => {
                    warn!("Skipping unreadable fact '{}': {}", id, e);
                    None
                }
            }
        })
        .collect())
}

impl PatientRecord {
    pub fn new(patient: Patient) -> Self {
        Self {
            patient,
            facts: Vec::new(),
        }
    }

    /// Builder-style fact insertion
    pub fn with_fact(mut self, fact: ClinicalFact) -> Self {
        self.facts.push(fact);
        self
    }

    pub fn push(&mut self, fact: ClinicalFact) {
        self.facts.push(fact);
    }

    /// Facts of one kind, in record order
    pub fn facts_of(&self, kind: FactKind) -> impl Iterator<Item = &ClinicalFact> {
        self.facts.iter().filter(move |f| f.kind() == kind)
    }

    pub fn find_fact(&self, id: &str) -> Option<&ClinicalFact> {
        self.facts.iter().find(|f| f.id() == id)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_json() {
        let json = r#"{
            "patient": {"id": "p1", "first_name": "Ada", "birth_date": "1962-04-12"},
            "facts": [
                {"kind": "lab_report", "id": "l1", "original_date": "2024-09-01"},
                {"kind": "condition", "id": "c1", "onset_date": "2020-01-01"}
            ]
        }"#;
        let record = PatientRecord::from_json(json).unwrap();
        assert_eq!(record.patient.display_name(), "Ada");
        assert_eq!(record.facts_of(FactKind::Condition).count(), 1);
        assert!(record.find_fact("l1").is_some());
    }

    #[test]
    fn test_unreadable_facts_are_skipped() {
        let json = r#"{
            "patient": {"id": "p1", "first_name": "Ada", "birth_date": 19620412},
            "facts": [
                {"kind": "lab_report", "id": "l1", "original_date": "2024-09-01"},
                {"kind": "condition", "id": "c1", "onset_date": 20010101},
                {"kind": "vital_sign", "id": "v1"},
                {"kind": "encounter", "id": "e1", "codings": "99213"},
                "not a fact"
            ]
        }"#;
        let record = PatientRecord::from_json(json).unwrap();
        assert_eq!(record.patient.birth_date, None);
        let ids: Vec<&str> = record.facts.iter().map(|f| f.id()).collect();
        assert_eq!(ids, vec!["l1", "c1"]);
        assert_eq!(record.find_fact("c1").and_then(|f| f.relevant_date()), None);

        let empty = PatientRecord::from_json(r#"{"patient": {"id": "p2"}, "facts": null}"#).unwrap();
        assert!(empty.facts.is_empty());
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(Patient::new("p", "  ").display_name(), "Patient");
    }
}
