//! Inbound clinical events

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What happened in the host system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    PatientCreated,
    PatientUpdated,
    ConditionCreated,
    ConditionUpdated,
    ConditionResolved,
    LabReportCreated,
    LabReportUpdated,
    ImagingReportCreated,
    ImagingReportUpdated,
    ReferralReportCreated,
    ReferralReportUpdated,
    EncounterCreated,
    EncounterUpdated,
    ClaimCreated,
    ClaimUpdated,
    DeviceCreated,
    DeviceUpdated,
    ObservationCreated,
    ObservationUpdated,
    MedicationStatementCreated,
    MedicationStatementUpdated,
}

impl EventKind {
    pub const ALL: [EventKind; 21] = [
        EventKind::PatientCreated,
        EventKind::PatientUpdated,
        EventKind::ConditionCreated,
        EventKind::ConditionUpdated,
        EventKind::ConditionResolved,
        EventKind::LabReportCreated,
        EventKind::LabReportUpdated,
        EventKind::ImagingReportCreated,
        EventKind::ImagingReportUpdated,
        EventKind::ReferralReportCreated,
        EventKind::ReferralReportUpdated,
        EventKind::EncounterCreated,
        EventKind::EncounterUpdated,
        EventKind::ClaimCreated,
        EventKind::ClaimUpdated,
        EventKind::DeviceCreated,
        EventKind::DeviceUpdated,
        EventKind::ObservationCreated,
        EventKind::ObservationUpdated,
        EventKind::MedicationStatementCreated,
        EventKind::MedicationStatementUpdated,
    ];
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::String(name)) => f.write_str(&name),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        serde_json::from_value(serde_json::Value::String(normalized))
            .map_err(|_| format!("Unknown event kind: {}", s))
    }
}

/// An event delivered to the evaluator; the patient id may be absent for
/// events not tied to one patient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalEvent {
    pub kind: EventKind,
    #[serde(default)]
    pub patient_id: Option<String>,
    /// Identifier of the record that changed, if any
    #[serde(default)]
    pub target_id: Option<String>,
}

impl ClinicalEvent {
    pub fn new(kind: EventKind, patient_id: impl Into<String>) -> Self {
        Self {
            kind,
            patient_id: Some(patient_id.into()),
            target_id: None,
        }
    }

    pub fn without_patient(kind: EventKind) -> Self {
        Self {
            kind,
            patient_id: None,
            target_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_names() {
        assert_eq!(EventKind::LabReportCreated.to_string(), "LAB_REPORT_CREATED");
        assert_eq!("patient-updated".parse::<EventKind>().unwrap(), EventKind::PatientUpdated);
        assert!("TASK_CREATED".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_event_json() {
        let event: ClinicalEvent = serde_json::from_str(r#"{"kind": "CONDITION_RESOLVED"}"#).unwrap();
        assert_eq!(event, ClinicalEvent::without_patient(EventKind::ConditionResolved));
    }
}
