//! Record builders shared by the measure scenario tests

#![allow(dead_code)]

use chrono::NaiveDate;
use octofhir_cqm_eval::{EvaluationContext, MeasureDefinition, MeasureEngine, measures};
use octofhir_cqm_model::fact::{
    ClaimLineItem, ClaimStatus, ClinicalStatus, Condition, Encounter, EncounterState, LabReport, LabValue,
    MedicationStatement, MedicationStatus, Observation, PlaceOfService, ProcedureReport,
};
use octofhir_cqm_model::{ClinicalFact, Patient, PatientRecord};
use octofhir_cqm_types::{CodeSystem, Coding, MeasurementPeriod};
use serde_json::Value;
use std::sync::Arc;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Calendar year 2024, evaluated on 2024-10-01
pub fn ctx() -> EvaluationContext {
    EvaluationContext::new(date(2024, 10, 1), MeasurementPeriod::calendar_year(2024).unwrap())
}

pub fn engine(definition: MeasureDefinition) -> MeasureEngine {
    let library = Arc::new(measures::bundled_value_sets().unwrap());
    MeasureEngine::new(definition, library).unwrap()
}

pub fn colorectal() -> MeasureEngine {
    engine(measures::colorectal_screening())
}

pub fn glycemic() -> MeasureEngine {
    engine(measures::glycemic_poor_control())
}

/// A patient named Ada who is `age` on 2024-01-01
pub fn patient_aged(age: i32) -> PatientRecord {
    PatientRecord::new(Patient::new("patient-1", "Ada").born(date(2024 - age, 1, 1)))
}

pub fn lab(id: &str, on: NaiveDate, loinc: &str, value: Option<Value>) -> ClinicalFact {
    ClinicalFact::LabReport(LabReport {
        id: id.into(),
        original_date: Some(on),
        junked: false,
        values: vec![LabValue {
            value,
            units: Some("%".into()),
            codings: [Coding::new(CodeSystem::Loinc, loinc)].into_iter().collect(),
        }],
    })
}

pub fn imaging(id: &str, on: NaiveDate, system: CodeSystem, code: &str) -> ClinicalFact {
    ClinicalFact::ImagingReport(ProcedureReport {
        id: id.into(),
        codings: [Coding::new(system, code)].into_iter().collect(),
        original_date: Some(on),
        junked: false,
    })
}

pub fn referral(id: &str, on: NaiveDate, system: CodeSystem, code: &str) -> ClinicalFact {
    ClinicalFact::ReferralReport(ProcedureReport {
        id: id.into(),
        codings: [Coding::new(system, code)].into_iter().collect(),
        original_date: Some(on),
        junked: false,
    })
}

pub fn condition(id: &str, system: CodeSystem, code: &str, onset: NaiveDate) -> ClinicalFact {
    ClinicalFact::Condition(Condition {
        id: id.into(),
        codings: [Coding::new(system, code)].into_iter().collect(),
        onset_date: Some(onset),
        resolution_date: None,
        clinical_status: ClinicalStatus::Active,
        entered_in_error: false,
    })
}

/// Active diagnosis recorded without an onset date
pub fn undated_condition(id: &str, system: CodeSystem, code: &str) -> ClinicalFact {
    ClinicalFact::Condition(Condition {
        id: id.into(),
        codings: [Coding::new(system, code)].into_iter().collect(),
        onset_date: None,
        resolution_date: None,
        clinical_status: ClinicalStatus::Active,
        entered_in_error: false,
    })
}

pub fn resolved_condition(
    id: &str,
    system: CodeSystem,
    code: &str,
    onset: NaiveDate,
    resolved: NaiveDate,
) -> ClinicalFact {
    ClinicalFact::Condition(Condition {
        id: id.into(),
        codings: [Coding::new(system, code)].into_iter().collect(),
        onset_date: Some(onset),
        resolution_date: Some(resolved),
        clinical_status: ClinicalStatus::Resolved,
        entered_in_error: false,
    })
}

pub fn encounter(id: &str, on: NaiveDate, note_type: Option<Coding>, place: Option<PlaceOfService>) -> ClinicalFact {
    ClinicalFact::Encounter(Encounter {
        id: id.into(),
        note_id: Some(format!("note-{id}")),
        note_type,
        place_of_service: place,
        state: EncounterState::Concluded,
        start_date: Some(on),
        end_date: Some(on),
    })
}

pub fn observation(id: &str, note_id: Option<&str>, on: NaiveDate, question: Coding, answer: Coding) -> ClinicalFact {
    ClinicalFact::Observation(Observation {
        id: id.into(),
        note_id: note_id.map(str::to_string),
        codings: [question].into_iter().collect(),
        value_codings: [answer].into_iter().collect(),
        effective_date: Some(on),
    })
}

pub fn claim(id: &str, on: NaiveDate, code: &str) -> ClinicalFact {
    ClinicalFact::ClaimLineItem(ClaimLineItem {
        id: id.into(),
        proc_code: code.into(),
        system: None,
        from_date: Some(on),
        status: ClaimStatus::Active,
    })
}

pub fn medication(id: &str, rxnorm: &str, start: NaiveDate) -> ClinicalFact {
    ClinicalFact::MedicationStatement(MedicationStatement {
        id: id.into(),
        codings: [Coding::new(CodeSystem::RxNorm, rxnorm)].into_iter().collect(),
        start_date: Some(start),
        end_date: None,
        status: MedicationStatus::Active,
    })
}

/// Diabetic patient with an office visit in 2024, ready for glycemic scenarios
pub fn diabetic_aged(age: i32) -> PatientRecord {
    patient_aged(age)
        .with_fact(condition("dm", CodeSystem::Icd10Cm, "E11.9", date(2015, 3, 1)))
        .with_fact(claim("visit", date(2024, 2, 12), "99213"))
}
