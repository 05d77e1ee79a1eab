//! Population classification
//!
//! Decides initial-population membership from age alone, then applies the
//! measure's denominator constraints.

use log::{debug, info};
use octofhir_cqm_model::{FactKind, PatientRecord};
use octofhir_cqm_types::CodeSystem;
use serde::{Deserialize, Serialize};

use crate::context::EvaluationContext;
use crate::error::EvalResult;
use crate::locator;
use crate::temporal::{DateInterval, Window, age_in_years};
use crate::terminology::TerminologyResolver;

/// Date at which age is measured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeReference {
    #[default]
    PeriodStart,
    PeriodEnd,
}

/// Age bounds of the initial population
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeCriterion {
    pub min: u32,
    pub max: u32,
    #[serde(default = "inclusive")]
    pub min_inclusive: bool,
    #[serde(default = "inclusive")]
    pub max_inclusive: bool,
    #[serde(default)]
    pub reference: AgeReference,
}

fn inclusive() -> bool {
    true
}

impl AgeCriterion {
    /// Inclusive `[min, max]` measured at period start
    pub fn between(min: u32, max: u32) -> Self {
        Self {
            min,
            max,
            min_inclusive: true,
            max_inclusive: true,
            reference: AgeReference::PeriodStart,
        }
    }

    pub fn measured_at(mut self, reference: AgeReference) -> Self {
        self.reference = reference;
        self
    }

    /// Classify a patient
    pub fn classify(&self, record: &PatientRecord, ctx: &EvaluationContext) -> PopulationState {
        let Some(birth) = record.patient.birth_date else {
            return PopulationState::NotInPopulation(NotInPopulationReason::MissingBirthDate);
        };
        let reference = match self.reference {
            AgeReference::PeriodStart => ctx.period_start(),
            AgeReference::PeriodEnd => ctx.period_end(),
        };
        let age = i64::from(age_in_years(birth, reference));
        let (min, max) = (i64::from(self.min), i64::from(self.max));

        let too_young = if self.min_inclusive { age < min } else { age <= min };
        let too_old = if self.max_inclusive { age > max } else { age >= max };

        if too_young {
            PopulationState::NotInPopulation(NotInPopulationReason::UnderAge { min: self.min })
        } else if too_old {
            PopulationState::NotInPopulation(NotInPopulationReason::OverAge { max: self.max })
        } else {
            PopulationState::InPopulation
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulationState {
    InPopulation,
    NotInPopulation(NotInPopulationReason),
}

impl PopulationState {
    pub fn is_in(&self) -> bool {
        matches!(self, PopulationState::InPopulation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotInPopulationReason {
    MissingBirthDate,
    UnderAge { min: u32 },
    OverAge { max: u32 },
}

/// Constraint a patient in the initial population must also meet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "constraint", rename_all = "snake_case")]
pub enum DenominatorCriterion {
    /// An encounter or claim coded in any of the value sets during the period.
    /// When `optimistic`, absence is logged and the patient stays in.
    QualifyingEncounter {
        value_sets: Vec<String>,
        #[serde(default)]
        optimistic: bool,
    },
    /// A condition coded in the value set overlapping the period
    RequiredDiagnosis { value_set: String, label: String },
}

impl DenominatorCriterion {
    pub fn value_set_names(&self) -> Vec<&str> {
        match self {
            DenominatorCriterion::QualifyingEncounter { value_sets, .. } => {
                value_sets.iter().map(String::as_str).collect()
            }
            DenominatorCriterion::RequiredDiagnosis { value_set, .. } => vec![value_set.as_str()],
        }
    }

    /// The reason reported when this criterion is not met
    pub fn miss(&self) -> DenominatorMiss {
        match self {
            DenominatorCriterion::QualifyingEncounter { .. } => DenominatorMiss::NoQualifyingEncounter,
            DenominatorCriterion::RequiredDiagnosis { label, .. } => DenominatorMiss::MissingDiagnosis {
                label: label.clone(),
            },
        }
    }

    /// `Ok(None)` when met; otherwise the reason the patient is outside the denominator
    pub fn evaluate(
        &self,
        record: &PatientRecord,
        ctx: &EvaluationContext,
        terminology: &TerminologyResolver,
    ) -> EvalResult<Option<DenominatorMiss>> {
        let period = DateInterval::from(ctx.period);
        match self {
            DenominatorCriterion::QualifyingEncounter { value_sets, optimistic } => {
                let codes = terminology.codes_for_all(value_sets, &[]);
                let found = locator::exists(
                    record,
                    &[FactKind::Encounter, FactKind::ClaimLineItem],
                    &codes,
                    &Window::During(period),
                )?;
                if found {
                    return Ok(None);
                }
                if *optimistic {
                    debug!(
                        "No qualifying encounter for patient {}; keeping in denominator",
                        record.patient.id
                    );
                    return Ok(None);
                }
                Ok(Some(self.miss()))
            }
            DenominatorCriterion::RequiredDiagnosis { value_set, label } => {
                let codes = terminology.codes(value_set, &[CodeSystem::Icd10Cm, CodeSystem::SnomedCt]);
                let found = locator::exists(record, &[FactKind::Condition], &codes, &Window::Overlaps(period))?;
                if found {
                    Ok(None)
                } else {
                    info!("Patient {} has no active {}", record.patient.id, label);
                    Ok(Some(self.miss()))
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenominatorMiss {
    NoQualifyingEncounter,
    MissingDiagnosis { label: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use octofhir_cqm_model::Patient;
    use octofhir_cqm_types::MeasurementPeriod;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ctx() -> EvaluationContext {
        EvaluationContext::new(date(2024, 10, 1), MeasurementPeriod::calendar_year(2024).unwrap())
    }

    fn born(birth: NaiveDate) -> PatientRecord {
        PatientRecord::new(Patient::new("p", "Ada").born(birth))
    }

    #[rstest]
    #[case(date(1978, 1, 1), PopulationState::InPopulation)]
    #[case(date(1978, 1, 2), PopulationState::NotInPopulation(NotInPopulationReason::UnderAge { min: 46 }))]
    #[case(date(1948, 1, 1), PopulationState::NotInPopulation(NotInPopulationReason::OverAge { max: 75 }))]
    #[case(date(1948, 1, 2), PopulationState::InPopulation)]
    fn test_inclusive_bounds_at_period_start(#[case] birth: NaiveDate, #[case] expected: PopulationState) {
        assert_eq!(AgeCriterion::between(46, 75).classify(&born(birth), &ctx()), expected);
    }

    #[test]
    fn test_strict_bounds() {
        let criterion = AgeCriterion {
            min_inclusive: false,
            ..AgeCriterion::between(46, 75)
        };
        assert!(!criterion.classify(&born(date(1978, 1, 1)), &ctx()).is_in());
        assert!(criterion.classify(&born(date(1977, 1, 1)), &ctx()).is_in());
    }

    #[test]
    fn test_reference_at_period_end() {
        let criterion = AgeCriterion::between(66, 120).measured_at(AgeReference::PeriodEnd);
        assert!(criterion.classify(&born(date(1958, 12, 31)), &ctx()).is_in());
        assert!(!criterion.classify(&born(date(1959, 1, 1)), &ctx()).is_in());
    }

    #[test]
    fn test_missing_birth_date() {
        let record = PatientRecord::new(Patient::new("p", "Ada"));
        assert_eq!(
            AgeCriterion::between(18, 75).classify(&record, &ctx()),
            PopulationState::NotInPopulation(NotInPopulationReason::MissingBirthDate)
        );
    }
}
