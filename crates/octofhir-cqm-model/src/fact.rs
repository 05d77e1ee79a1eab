//! Clinical facts
//!
//! A patient record is a flat list of [`ClinicalFact`]s. The set of variants is
//! closed; the engine queries them through the [`Fact`] capability trait so it
//! never needs to know which variant it is looking at.

use chrono::NaiveDate;
use octofhir_cqm_types::{CodeSet, CodeSystem, Coding};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::date;

/// Codings attached to a single fact; almost always one or two
pub type Codings = SmallVec<[Coding; 2]>;

/// An inclusive date span; `end == None` means ongoing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

impl DateSpan {
    pub fn point(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: Some(date),
        }
    }

    pub fn open(start: NaiveDate) -> Self {
        Self { start, end: None }
    }

    /// A span with no known start, in effect through `end` (or ongoing)
    pub fn until(end: Option<NaiveDate>) -> Self {
        Self {
            start: NaiveDate::MIN,
            end,
        }
    }

    /// Inclusive overlap with `[start, end]`, treating an open end as unbounded
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start <= end && self.end.is_none_or(|e| start <= e)
    }
}

/// Capability interface shared by every fact variant
pub trait Fact {
    /// Stable identifier within the record
    fn id(&self) -> &str;

    /// The date the fact is anchored to (service, report or effective date)
    fn relevant_date(&self) -> Option<NaiveDate>;

    /// Interval over which the fact was in effect
    fn active_span(&self) -> Option<DateSpan> {
        self.relevant_date().map(DateSpan::point)
    }

    /// Whether any coding on the fact is a member of `codes`
    fn matches(&self, codes: &CodeSet) -> bool;

    /// Junked, entered-in-error, cancelled and removed facts never count
    fn is_countable(&self) -> bool {
        true
    }
}

/// Discriminant of [`ClinicalFact`], used to select facts by kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    Condition,
    LabReport,
    ImagingReport,
    ReferralReport,
    Encounter,
    ClaimLineItem,
    Device,
    Observation,
    MedicationStatement,
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FactKind::Condition => "condition",
            FactKind::LabReport => "lab_report",
            FactKind::ImagingReport => "imaging_report",
            FactKind::ReferralReport => "referral_report",
            FactKind::Encounter => "encounter",
            FactKind::ClaimLineItem => "claim_line_item",
            FactKind::Device => "device",
            FactKind::Observation => "observation",
            FactKind::MedicationStatement => "medication_statement",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinicalStatus {
    #[default]
    Active,
    Resolved,
    #[serde(other)]
    Inactive,
}

/// A diagnosis on the patient's problem list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: String,
    #[serde(default)]
    pub codings: Codings,
    #[serde(default, deserialize_with = "date::deserialize")]
    pub onset_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "date::deserialize")]
    pub resolution_date: Option<NaiveDate>,
    #[serde(default)]
    pub clinical_status: ClinicalStatus,
    #[serde(default)]
    pub entered_in_error: bool,
}

impl Fact for Condition {
    fn id(&self) -> &str {
        &self.id
    }

    fn relevant_date(&self) -> Option<NaiveDate> {
        self.onset_date
    }

    // A resolved condition with no resolution date is only known to have
    // existed at onset. Without an onset the condition reaches back
    // indefinitely.
    fn active_span(&self) -> Option<DateSpan> {
        let Some(start) = self.onset_date else {
            return match (self.resolution_date, self.clinical_status) {
                (Some(end), _) => Some(DateSpan::until(Some(end))),
                (None, ClinicalStatus::Active) => Some(DateSpan::until(None)),
                (None, _) => None,
            };
        };
        match (self.resolution_date, self.clinical_status) {
            (Some(end), _) => Some(DateSpan {
                start,
                end: Some(end.max(start)),
            }),
            (None, ClinicalStatus::Active) => Some(DateSpan::open(start)),
            (None, _) => Some(DateSpan::point(start)),
        }
    }

    fn matches(&self, codes: &CodeSet) -> bool {
        codes.contains_any(&self.codings)
    }

    fn is_countable(&self) -> bool {
        !self.entered_in_error
    }
}

/// One result line of a lab report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabValue {
    /// Raw value as recorded: a number, a string, or null
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub codings: Codings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabReport {
    pub id: String,
    #[serde(default, deserialize_with = "date::deserialize")]
    pub original_date: Option<NaiveDate>,
    #[serde(default)]
    pub junked: bool,
    #[serde(default)]
    pub values: Vec<LabValue>,
}

impl LabReport {
    /// Result lines whose codings belong to `codes`
    pub fn values_matching<'a>(&'a self, codes: &CodeSet) -> impl Iterator<Item = &'a LabValue> {
        self.values.iter().filter(move |v| codes.contains_any(&v.codings))
    }
}

impl Fact for LabReport {
    fn id(&self) -> &str {
        &self.id
    }

    fn relevant_date(&self) -> Option<NaiveDate> {
        self.original_date
    }

    fn matches(&self, codes: &CodeSet) -> bool {
        self.values.iter().any(|v| codes.contains_any(&v.codings))
    }

    fn is_countable(&self) -> bool {
        !self.junked
    }
}

/// An imaging or referral report (colonoscopy, CT colonography, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureReport {
    pub id: String,
    #[serde(default)]
    pub codings: Codings,
    #[serde(default, deserialize_with = "date::deserialize")]
    pub original_date: Option<NaiveDate>,
    #[serde(default)]
    pub junked: bool,
}

impl Fact for ProcedureReport {
    fn id(&self) -> &str {
        &self.id
    }

    fn relevant_date(&self) -> Option<NaiveDate> {
        self.original_date
    }

    fn matches(&self, codes: &CodeSet) -> bool {
        codes.contains_any(&self.codings)
    }

    fn is_countable(&self) -> bool {
        !self.junked
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceOfService {
    Office,
    Home,
    Telehealth,
    Hospice,
    NursingFacility,
    SkilledNursingFacility,
    InpatientHospital,
    #[serde(other)]
    Other,
}

/// Lifecycle state of an encounter note
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncounterState {
    #[serde(rename = "STA", alias = "started")]
    Started,
    #[default]
    #[serde(rename = "CON", alias = "concluded")]
    Concluded,
    #[serde(rename = "CAN", alias = "cancelled")]
    Cancelled,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub id: String,
    /// Note that owns the encounter; joins to observations recorded on it
    #[serde(default)]
    pub note_id: Option<String>,
    #[serde(default)]
    pub note_type: Option<Coding>,
    #[serde(default)]
    pub place_of_service: Option<PlaceOfService>,
    #[serde(default)]
    pub state: EncounterState,
    #[serde(default, deserialize_with = "date::deserialize")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "date::deserialize")]
    pub end_date: Option<NaiveDate>,
}

impl Fact for Encounter {
    fn id(&self) -> &str {
        &self.id
    }

    fn relevant_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    fn active_span(&self) -> Option<DateSpan> {
        let start = self.start_date?;
        Some(DateSpan {
            start,
            end: Some(self.end_date.unwrap_or(start).max(start)),
        })
    }

    fn matches(&self, codes: &CodeSet) -> bool {
        self.note_type.as_ref().is_some_and(|c| codes.contains(c))
    }

    fn is_countable(&self) -> bool {
        matches!(self.state, EncounterState::Started | EncounterState::Concluded)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    #[default]
    Active,
    #[serde(other)]
    Removed,
}

/// A billed procedure line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimLineItem {
    pub id: String,
    pub proc_code: String,
    /// Coding system of `proc_code`; when absent the code is tried as CPT,
    /// HCPCS and SNOMED
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default, deserialize_with = "date::deserialize")]
    pub from_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: ClaimStatus,
}

impl ClaimLineItem {
    const DEFAULT_SYSTEMS: [CodeSystem; 3] = [CodeSystem::Cpt, CodeSystem::HcpcsLevelII, CodeSystem::SnomedCt];
}

impl Fact for ClaimLineItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn relevant_date(&self) -> Option<NaiveDate> {
        self.from_date
    }

    fn matches(&self, codes: &CodeSet) -> bool {
        match self.system.as_deref() {
            Some(raw) => CodeSystem::from_identifier(raw).is_some_and(|s| codes.contains_code(s, &self.proc_code)),
            None => Self::DEFAULT_SYSTEMS
                .iter()
                .any(|s| codes.contains_code(*s, &self.proc_code)),
        }
    }

    fn is_countable(&self) -> bool {
        self.status == ClaimStatus::Active
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    #[default]
    Ordered,
    Active,
    Inactive,
    #[serde(other)]
    EnteredInError,
}

/// Durable medical equipment (walkers, wheelchairs, hospital beds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    #[serde(default)]
    pub codings: Codings,
    #[serde(default)]
    pub status: DeviceStatus,
    #[serde(default, deserialize_with = "date::deserialize")]
    pub ordered_date: Option<NaiveDate>,
    #[serde(default)]
    pub note_id: Option<String>,
}

impl Fact for Device {
    fn id(&self) -> &str {
        &self.id
    }

    fn relevant_date(&self) -> Option<NaiveDate> {
        self.ordered_date
    }

    fn matches(&self, codes: &CodeSet) -> bool {
        codes.contains_any(&self.codings)
    }

    fn is_countable(&self) -> bool {
        self.status != DeviceStatus::EnteredInError
    }
}

/// A coded question/answer pair recorded on a note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    #[serde(default)]
    pub note_id: Option<String>,
    /// What was observed (e.g. LOINC 71802-3 housing status)
    #[serde(default)]
    pub codings: Codings,
    /// Coded answer (e.g. SNOMED 160734000 lives in nursing home)
    #[serde(default)]
    pub value_codings: Codings,
    #[serde(default, deserialize_with = "date::deserialize")]
    pub effective_date: Option<NaiveDate>,
}

impl Observation {
    /// Whether the coded answer is a member of `codes`
    pub fn answer_matches(&self, codes: &CodeSet) -> bool {
        codes.contains_any(&self.value_codings)
    }
}

impl Fact for Observation {
    fn id(&self) -> &str {
        &self.id
    }

    fn relevant_date(&self) -> Option<NaiveDate> {
        self.effective_date
    }

    fn matches(&self, codes: &CodeSet) -> bool {
        codes.contains_any(&self.codings)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicationStatus {
    #[default]
    Active,
    Stopped,
    #[serde(other)]
    EnteredInError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationStatement {
    pub id: String,
    #[serde(default)]
    pub codings: Codings,
    #[serde(default, deserialize_with = "date::deserialize")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "date::deserialize")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: MedicationStatus,
}

impl Fact for MedicationStatement {
    fn id(&self) -> &str {
        &self.id
    }

    fn relevant_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    fn active_span(&self) -> Option<DateSpan> {
        let start = self.start_date?;
        Some(DateSpan {
            start,
            end: self.end_date.map(|e| e.max(start)),
        })
    }

    fn matches(&self, codes: &CodeSet) -> bool {
        codes.contains_any(&self.codings)
    }

    fn is_countable(&self) -> bool {
        self.status != MedicationStatus::EnteredInError
    }
}

/// Every kind of fact a patient record can hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClinicalFact {
    Condition(Condition),
    LabReport(LabReport),
    ImagingReport(ProcedureReport),
    ReferralReport(ProcedureReport),
    Encounter(Encounter),
    ClaimLineItem(ClaimLineItem),
    Device(Device),
    Observation(Observation),
    MedicationStatement(MedicationStatement),
}

macro_rules! dispatch {
    ($self:ident, $fact:ident => $body:expr) => {
        match $self {
            ClinicalFact::Condition($fact) => $body,
            ClinicalFact::LabReport($fact) => $body,
            ClinicalFact::ImagingReport($fact) => $body,
            ClinicalFact::ReferralReport($fact) => $body,
            ClinicalFact::Encounter($fact) => $body,
            ClinicalFact::ClaimLineItem($fact) => $body,
            ClinicalFact::Device($fact) => $body,
            ClinicalFact::Observation($fact) => $body,
            ClinicalFact::MedicationStatement($fact) => $body,
        }
    };
}

impl ClinicalFact {
    pub fn kind(&self) -> FactKind {
        match self {
            ClinicalFact::Condition(_) => FactKind::Condition,
            ClinicalFact::LabReport(_) => FactKind::LabReport,
            ClinicalFact::ImagingReport(_) => FactKind::ImagingReport,
            ClinicalFact::ReferralReport(_) => FactKind::ReferralReport,
            ClinicalFact::Encounter(_) => FactKind::Encounter,
            ClinicalFact::ClaimLineItem(_) => FactKind::ClaimLineItem,
            ClinicalFact::Device(_) => FactKind::Device,
            ClinicalFact::Observation(_) => FactKind::Observation,
            ClinicalFact::MedicationStatement(_) => FactKind::MedicationStatement,
        }
    }

    pub fn as_condition(&self) -> Option<&Condition> {
        match self {
            ClinicalFact::Condition(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_lab_report(&self) -> Option<&LabReport> {
        match self {
            ClinicalFact::LabReport(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_encounter(&self) -> Option<&Encounter> {
        match self {
            ClinicalFact::Encounter(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_observation(&self) -> Option<&Observation> {
        match self {
            ClinicalFact::Observation(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_device(&self) -> Option<&Device> {
        match self {
            ClinicalFact::Device(d) => Some(d),
            _ => None,
        }
    }
}

impl Fact for ClinicalFact {
    fn id(&self) -> &str {
        dispatch!(self, f => f.id())
    }

    fn relevant_date(&self) -> Option<NaiveDate> {
        dispatch!(self, f => f.relevant_date())
    }

    fn active_span(&self) -> Option<DateSpan> {
        dispatch!(self, f => f.active_span())
    }

    fn matches(&self, codes: &CodeSet) -> bool {
        dispatch!(self, f => f.matches(codes))
    }

    fn is_countable(&self) -> bool {
        dispatch!(self, f => f.is_countable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_fact_json_is_tagged_by_kind() {
        let json = r#"{
            "kind": "condition",
            "id": "c1",
            "codings": [{"system": "ICD-10", "code": "C18.0"}],
            "onset_date": "2019-05-01T00:00:00Z",
            "clinical_status": "resolved",
            "resolution_date": "2020-01-10"
        }"#;
        let fact: ClinicalFact = serde_json::from_str(json).unwrap();
        assert_eq!(fact.kind(), FactKind::Condition);
        assert_eq!(
            fact.active_span(),
            Some(DateSpan {
                start: date(2019, 5, 1),
                end: Some(date(2020, 1, 10))
            })
        );
        let codes = CodeSet::from_pairs([(CodeSystem::Icd10Cm, "C180")]);
        assert!(fact.matches(&codes));
    }

    #[test]
    fn test_bad_dates_become_absent() {
        let json = r#"{"kind": "lab_report", "id": "l1", "original_date": "not a date"}"#;
        let fact: ClinicalFact = serde_json::from_str(json).unwrap();
        assert_eq!(fact.relevant_date(), None);
        assert_eq!(fact.active_span(), None);
    }

    #[test]
    fn test_active_condition_is_open_ended() {
        let condition = Condition {
            id: "c".into(),
            codings: Codings::new(),
            onset_date: Some(date(2010, 1, 1)),
            resolution_date: None,
            clinical_status: ClinicalStatus::Active,
            entered_in_error: false,
        };
        let span = condition.active_span().unwrap();
        assert!(span.overlaps(date(2024, 1, 1), date(2024, 12, 31)));
    }

    #[test]
    fn test_undated_condition_reaches_back_indefinitely() {
        let year = (date(2024, 1, 1), date(2024, 12, 31));
        let active = Condition {
            id: "c".into(),
            codings: Codings::new(),
            onset_date: None,
            resolution_date: None,
            clinical_status: ClinicalStatus::Active,
            entered_in_error: false,
        };
        assert!(active.active_span().unwrap().overlaps(year.0, year.1));

        let resolved_before = Condition {
            resolution_date: Some(date(2020, 6, 1)),
            clinical_status: ClinicalStatus::Resolved,
            ..active.clone()
        };
        assert!(!resolved_before.active_span().unwrap().overlaps(year.0, year.1));

        let inactive = Condition {
            clinical_status: ClinicalStatus::Inactive,
            ..active
        };
        assert_eq!(inactive.active_span(), None);
    }

    #[test]
    fn test_countability() {
        let cancelled: ClinicalFact = serde_json::from_str(
            r#"{"kind": "encounter", "id": "e1", "state": "CAN", "start_date": "2024-01-01"}"#,
        )
        .unwrap();
        assert!(!cancelled.is_countable());

        let removed: ClinicalFact = serde_json::from_str(
            r#"{"kind": "claim_line_item", "id": "cl1", "proc_code": "99377", "status": "deleted"}"#,
        )
        .unwrap();
        assert!(!removed.is_countable());

        let junked: ClinicalFact =
            serde_json::from_str(r#"{"kind": "imaging_report", "id": "i1", "junked": true}"#).unwrap();
        assert!(!junked.is_countable());
    }

    #[test]
    fn test_claim_without_system_tries_procedure_systems() {
        let claim = ClaimLineItem {
            id: "cl".into(),
            proc_code: "G0105".into(),
            system: None,
            from_date: Some(date(2024, 2, 1)),
            status: ClaimStatus::Active,
        };
        let hcpcs = CodeSet::from_pairs([(CodeSystem::HcpcsLevelII, "G0105")]);
        let loinc = CodeSet::from_pairs([(CodeSystem::Loinc, "G0105")]);
        assert!(claim.matches(&hcpcs));
        assert!(!claim.matches(&loinc));
    }

    #[test]
    fn test_medication_span_intersection() {
        let med = MedicationStatement {
            id: "m".into(),
            codings: Codings::new(),
            start_date: Some(date(2023, 6, 1)),
            end_date: None,
            status: MedicationStatus::Active,
        };
        assert!(med.active_span().unwrap().overlaps(date(2024, 1, 1), date(2024, 12, 31)));

        let stopped = MedicationStatement {
            end_date: Some(date(2023, 8, 1)),
            ..med
        };
        assert!(!stopped.active_span().unwrap().overlaps(date(2024, 1, 1), date(2024, 12, 31)));
    }
}
