//! Denominator exclusions
//!
//! Exclusions are an ordered list of [`ExclusionRule`]s evaluated after the
//! population classifier. The first rule that matches removes the patient
//! from the measure; later rules are not evaluated. A rule that fails (for
//! example on date overflow) is logged and treated as not matching.

use log::{debug, info, warn};
use octofhir_cqm_model::{ClinicalFact, Fact, FactKind, PatientRecord, PlaceOfService};
use octofhir_cqm_types::{CodeSet, CodeSystem};
use serde::{Deserialize, Serialize};

use crate::context::EvaluationContext;
use crate::error::EvalResult;
use crate::locator;
use crate::temporal::{DateInterval, Lookback, Window, age_in_years};
use crate::terminology::TerminologyResolver;

/// SNOMED discharge dispositions meaning "discharged to hospice"
pub const DISCHARGE_TO_HOSPICE: [&str; 2] = ["428361000124107", "428371000124100"];
/// LOINC: hospice care in the last 14 days (MDS)
pub const HOSPICE_ASSESSMENT: &str = "45755-6";
/// SNOMED: yes
pub const ANSWER_YES: &str = "373066001";
/// LOINC: housing status
pub const HOUSING_STATUS: &str = "71802-3";
/// SNOMED: lives in a nursing home
pub const LIVES_IN_NURSING_HOME: &str = "160734000";
/// LOINC: FACIT-Pal functional assessment of palliative care
pub const PALLIATIVE_ASSESSMENT: &str = "71007-9";

const DIAGNOSIS_SYSTEMS: &[CodeSystem] = &[CodeSystem::Icd10Cm, CodeSystem::SnomedCt];
const VISIT_SYSTEMS: &[CodeSystem] = &[CodeSystem::SnomedCt, CodeSystem::Cpt, CodeSystem::HcpcsLevelII];
const DEVICE_SYSTEMS: &[CodeSystem] = &[CodeSystem::SnomedCt, CodeSystem::HcpcsLevelII];
const MEDICATION_SYSTEMS: &[CodeSystem] = &[CodeSystem::RxNorm];

const VISITS: &[FactKind] = &[FactKind::Encounter, FactKind::ClaimLineItem];

/// Value sets that together signal frailty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrailtySignals {
    pub diagnosis: String,
    pub symptom: String,
    pub device: String,
    pub encounter: String,
}

fn discharge_dispositions() -> Vec<String> {
    DISCHARGE_TO_HOSPICE.iter().map(|c| (*c).to_string()).collect()
}

fn one_year() -> Lookback {
    Lookback::years(1)
}

/// One exclusion criterion, configured by value-set names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ExclusionRule {
    /// Hospice diagnosis active at any point in the period
    HospiceDiagnosis { value_set: String },
    /// Hospice place of service, hospice note type or hospice claim in the period
    HospiceEncounter { value_sets: Vec<String> },
    /// Inpatient stay ending in the period with a discharge-to-hospice disposition
    /// recorded on the same note
    HospiceDischarge {
        inpatient_value_set: String,
        #[serde(default = "discharge_dispositions")]
        dispositions: Vec<String>,
    },
    /// Hospice MDS assessment answered yes, or a hospice intervention claim, in the period
    HospiceAssessment {
        #[serde(default)]
        intervention_value_set: Option<String>,
    },
    /// Long-term nursing facility residence on or before period end
    NursingHome {
        value_sets: Vec<String>,
        #[serde(default)]
        min_age: Option<u32>,
    },
    /// Frailty in the period together with advanced illness or dementia
    /// medication in the lookback before period end
    FrailtyWithAdvancedIllness {
        frailty: FrailtySignals,
        advanced_illness: String,
        dementia_medications: String,
        #[serde(default = "one_year")]
        lookback: Lookback,
        #[serde(default)]
        min_age: Option<u32>,
    },
    /// Condition that makes the measure moot (total colectomy, colorectal cancer)
    StructuralHistory { value_sets: Vec<String>, label: String },
    /// Palliative diagnosis, encounter, intervention or FACIT-Pal assessment
    PalliativeCare {
        diagnosis: String,
        encounter: String,
        #[serde(default)]
        intervention: Option<String>,
    },
}

/// Which kind of hospice evidence excluded the patient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HospiceEvidence {
    Diagnosis,
    Encounter,
    Discharge,
    Assessment,
}

/// Why a patient was excluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    Hospice(HospiceEvidence),
    NursingHome,
    FrailtyWithAdvancedIllness { min_age: Option<u32> },
    StructuralHistory { label: String },
    PalliativeCare,
}

/// A matched exclusion and the fact that triggered it
#[derive(Debug, Clone, PartialEq)]
pub struct Exclusion<'r> {
    pub reason: ExclusionReason,
    pub evidence: &'r ClinicalFact,
}

impl ExclusionRule {
    pub fn name(&self) -> &'static str {
        match self {
            ExclusionRule::HospiceDiagnosis { .. } => "hospice_diagnosis",
            ExclusionRule::HospiceEncounter { .. } => "hospice_encounter",
            ExclusionRule::HospiceDischarge { .. } => "hospice_discharge",
            ExclusionRule::HospiceAssessment { .. } => "hospice_assessment",
            ExclusionRule::NursingHome { .. } => "nursing_home",
            ExclusionRule::FrailtyWithAdvancedIllness { .. } => "frailty_with_advanced_illness",
            ExclusionRule::StructuralHistory { .. } => "structural_history",
            ExclusionRule::PalliativeCare { .. } => "palliative_care",
        }
    }

    pub fn reason(&self) -> ExclusionReason {
        match self {
            ExclusionRule::HospiceDiagnosis { .. } => ExclusionReason::Hospice(HospiceEvidence::Diagnosis),
            ExclusionRule::HospiceEncounter { .. } => ExclusionReason::Hospice(HospiceEvidence::Encounter),
            ExclusionRule::HospiceDischarge { .. } => ExclusionReason::Hospice(HospiceEvidence::Discharge),
            ExclusionRule::HospiceAssessment { .. } => ExclusionReason::Hospice(HospiceEvidence::Assessment),
            ExclusionRule::NursingHome { .. } => ExclusionReason::NursingHome,
            ExclusionRule::FrailtyWithAdvancedIllness { min_age, .. } => {
                ExclusionReason::FrailtyWithAdvancedIllness { min_age: *min_age }
            }
            ExclusionRule::StructuralHistory { label, .. } => ExclusionReason::StructuralHistory {
                label: label.clone(),
            },
            ExclusionRule::PalliativeCare { .. } => ExclusionReason::PalliativeCare,
        }
    }

    /// Every value set the rule resolves
    pub fn value_set_names(&self) -> Vec<&str> {
        match self {
            ExclusionRule::HospiceDiagnosis { value_set } => vec![value_set.as_str()],
            ExclusionRule::HospiceEncounter { value_sets }
            | ExclusionRule::NursingHome { value_sets, .. }
            | ExclusionRule::StructuralHistory { value_sets, .. } => {
                value_sets.iter().map(String::as_str).collect()
            }
            ExclusionRule::HospiceDischarge { inpatient_value_set, .. } => vec![inpatient_value_set.as_str()],
            ExclusionRule::HospiceAssessment { intervention_value_set } => {
                intervention_value_set.iter().map(String::as_str).collect()
            }
            ExclusionRule::FrailtyWithAdvancedIllness {
                frailty,
                advanced_illness,
                dementia_medications,
                ..
            } => vec![
                frailty.diagnosis.as_str(),
                frailty.symptom.as_str(),
                frailty.device.as_str(),
                frailty.encounter.as_str(),
                advanced_illness.as_str(),
                dementia_medications.as_str(),
            ],
            ExclusionRule::PalliativeCare {
                diagnosis,
                encounter,
                intervention,
            } => {
                let mut names = vec![diagnosis.as_str(), encounter.as_str()];
                names.extend(intervention.as_deref());
                names
            }
        }
    }

    /// The fact that satisfies this rule, if any
    pub fn evidence<'r>(
        &self,
        record: &'r PatientRecord,
        ctx: &EvaluationContext,
        terminology: &TerminologyResolver,
    ) -> EvalResult<Option<&'r ClinicalFact>> {
        let period = DateInterval::from(ctx.period);
        match self {
            ExclusionRule::HospiceDiagnosis { value_set } => {
                let codes = terminology.codes(value_set, DIAGNOSIS_SYSTEMS);
                locator::latest(record, &[FactKind::Condition], &codes, &Window::Overlaps(period))
            }
            ExclusionRule::HospiceEncounter { value_sets } => {
                let codes = terminology.codes_for_all(value_sets, VISIT_SYSTEMS);
                let found = locator::find_where(record, VISITS, &Window::During(period), |fact| {
                    fact.matches(&codes)
                        || fact
                            .as_encounter()
                            .is_some_and(|e| e.place_of_service == Some(PlaceOfService::Hospice))
                })?;
                Ok(found.into_iter().next())
            }
            ExclusionRule::HospiceDischarge {
                inpatient_value_set,
                dispositions,
            } => {
                let codes = terminology.codes(inpatient_value_set, VISIT_SYSTEMS);
                let stays = locator::find(record, &[FactKind::Encounter], &codes, &Window::EndsDuring(period))?;
                let notes = locator::notes_with(&stays);
                if notes.is_empty() {
                    return Ok(None);
                }
                let answers = CodeSet::from_pairs(dispositions.iter().map(|c| (CodeSystem::SnomedCt, c.as_str())));
                let found = locator::find_where(record, &[FactKind::Observation], &Window::Any, |fact| {
                    fact.as_observation().is_some_and(|o| {
                        o.note_id.as_deref().is_some_and(|n| notes.contains(n)) && o.answer_matches(&answers)
                    })
                })?;
                Ok(found.into_iter().next())
            }
            ExclusionRule::HospiceAssessment { intervention_value_set } => {
                let question = CodeSet::from_pairs([(CodeSystem::Loinc, HOSPICE_ASSESSMENT)]);
                let yes = CodeSet::from_pairs([(CodeSystem::SnomedCt, ANSWER_YES)]);
                if let Some(found) = answered(record, &question, &yes, &Window::During(period))? {
                    return Ok(Some(found));
                }
                match intervention_value_set {
                    Some(name) => {
                        let codes = terminology.codes(name, VISIT_SYSTEMS);
                        locator::latest(record, &[FactKind::ClaimLineItem], &codes, &Window::During(period))
                    }
                    None => Ok(None),
                }
            }
            ExclusionRule::NursingHome { value_sets, min_age } => {
                if !meets_min_age(record, ctx, *min_age) {
                    return Ok(None);
                }
                let through_end = Window::OnOrBefore(ctx.period_end());
                let codes = terminology.codes_for_all(value_sets, VISIT_SYSTEMS);
                let visits = locator::find_where(record, VISITS, &through_end, |fact| {
                    fact.matches(&codes)
                        || fact
                            .as_encounter()
                            .is_some_and(|e| e.place_of_service == Some(PlaceOfService::NursingFacility))
                })?;
                if let Some(found) = visits.into_iter().next() {
                    return Ok(Some(found));
                }
                // Only the most recent housing status counts.
                let housing = CodeSet::from_pairs([(CodeSystem::Loinc, HOUSING_STATUS)]);
                let nursing_home = CodeSet::from_pairs([(CodeSystem::SnomedCt, LIVES_IN_NURSING_HOME)]);
                let latest = locator::latest(record, &[FactKind::Observation], &housing, &through_end)?;
                Ok(latest.filter(|fact| fact.as_observation().is_some_and(|o| o.answer_matches(&nursing_home))))
            }
            ExclusionRule::FrailtyWithAdvancedIllness {
                frailty,
                advanced_illness,
                dementia_medications,
                lookback,
                min_age,
            } => {
                if !meets_min_age(record, ctx, *min_age) {
                    return Ok(None);
                }
                let Some(frail) = frailty_signal(record, period, frailty, terminology)? else {
                    debug!("No frailty signal for patient {}", record.patient.id);
                    return Ok(None);
                };

                let illness_codes = terminology.codes(advanced_illness, DIAGNOSIS_SYSTEMS);
                let illness = locator::latest(
                    record,
                    &[FactKind::Condition],
                    &illness_codes,
                    &Window::Lookback {
                        end: ctx.period_end(),
                        lookback: *lookback,
                    },
                )?;
                let medication = match illness {
                    Some(_) => None,
                    None => {
                        let window = lookback.window_ending(ctx.period_end())?;
                        let codes = terminology.codes(dementia_medications, MEDICATION_SYSTEMS);
                        locator::latest(record, &[FactKind::MedicationStatement], &codes, &Window::Overlaps(window))?
                    }
                };

                if illness.is_none() && medication.is_none() {
                    debug!(
                        "Patient {} is frail but has no advanced illness or dementia medication",
                        record.patient.id
                    );
                    return Ok(None);
                }
                Ok(Some(frail))
            }
            ExclusionRule::StructuralHistory { value_sets, .. } => {
                let codes = terminology.codes_for_all(value_sets, DIAGNOSIS_SYSTEMS);
                locator::latest(record, &[FactKind::Condition], &codes, &Window::Overlaps(period))
            }
            ExclusionRule::PalliativeCare {
                diagnosis,
                encounter,
                intervention,
            } => {
                let dx = terminology.codes(diagnosis, DIAGNOSIS_SYSTEMS);
                if let Some(found) = locator::latest(record, &[FactKind::Condition], &dx, &Window::Overlaps(period))? {
                    return Ok(Some(found));
                }
                let mut visit_codes = terminology.codes(encounter, VISIT_SYSTEMS);
                if let Some(name) = intervention {
                    visit_codes = visit_codes.union(&terminology.codes(name, VISIT_SYSTEMS));
                }
                if let Some(found) = locator::latest(record, VISITS, &visit_codes, &Window::During(period))? {
                    return Ok(Some(found));
                }
                let assessment = CodeSet::from_pairs([(CodeSystem::Loinc, PALLIATIVE_ASSESSMENT)]);
                locator::latest(record, &[FactKind::Observation], &assessment, &Window::During(period))
            }
        }
    }
}

/// Run the rules in order and return the first match
pub fn first_exclusion<'r>(
    rules: &[ExclusionRule],
    record: &'r PatientRecord,
    ctx: &EvaluationContext,
    terminology: &TerminologyResolver,
) -> Option<Exclusion<'r>> {
    for rule in rules {
        match rule.evidence(record, ctx, terminology) {
            Ok(Some(evidence)) => {
                info!(
                    "Patient {} excluded by {} (fact {})",
                    record.patient.id,
                    rule.name(),
                    evidence.id()
                );
                return Some(Exclusion {
                    reason: rule.reason(),
                    evidence,
                });
            }
            Ok(None) => debug!("Exclusion {} not met for patient {}", rule.name(), record.patient.id),
            Err(e) => warn!(
                "Exclusion {} failed for patient {}: {}; treating as not met",
                rule.name(),
                record.patient.id,
                e
            ),
        }
    }
    None
}

fn meets_min_age(record: &PatientRecord, ctx: &EvaluationContext, min_age: Option<u32>) -> bool {
    let Some(min_age) = min_age else {
        return true;
    };
    record
        .patient
        .birth_date
        .is_some_and(|birth| i64::from(age_in_years(birth, ctx.period_end())) >= i64::from(min_age))
}

fn answered<'r>(
    record: &'r PatientRecord,
    question: &CodeSet,
    answer: &CodeSet,
    window: &Window,
) -> EvalResult<Option<&'r ClinicalFact>> {
    let found = locator::find_where(record, &[FactKind::Observation], window, |fact| {
        fact.as_observation()
            .is_some_and(|o| o.matches(question) && o.answer_matches(answer))
    })?;
    Ok(found.into_iter().next())
}

fn frailty_signal<'r>(
    record: &'r PatientRecord,
    period: DateInterval,
    frailty: &FrailtySignals,
    terminology: &TerminologyResolver,
) -> EvalResult<Option<&'r ClinicalFact>> {
    let conditions = terminology.codes_for_all(&[&frailty.diagnosis, &frailty.symptom], DIAGNOSIS_SYSTEMS);
    if let Some(found) = locator::latest(record, &[FactKind::Condition], &conditions, &Window::Overlaps(period))? {
        return Ok(Some(found));
    }

    let devices = terminology.codes(&frailty.device, DEVICE_SYSTEMS);
    let during = Window::During(period);
    let found = locator::find_where(
        record,
        &[FactKind::Device, FactKind::ClaimLineItem, FactKind::Observation],
        &during,
        |fact| match fact {
            ClinicalFact::Observation(o) => o.answer_matches(&devices),
            other => other.matches(&devices),
        },
    )?;
    if let Some(found) = found.into_iter().next() {
        return Ok(Some(found));
    }

    let encounters = terminology.codes(&frailty.encounter, VISIT_SYSTEMS);
    locator::latest(record, VISITS, &encounters, &during)
}
