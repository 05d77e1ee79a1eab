//! Measure definitions
//!
//! A measure is data: population bounds, denominator constraints, an ordered
//! exclusion chain, a numerator criterion and the recommendations shown when
//! the patient is due. Definitions deserialize from JSON so hosts can add
//! measures without code.

use octofhir_cqm_model::EventKind;
use octofhir_cqm_types::ValueSetLibrary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::composer::{OrderCodes, RecommendationTemplate};
use crate::error::{EvalError, EvalResult};
use crate::exclusion::ExclusionRule;
use crate::numerator::NumeratorCriterion;
use crate::population::{AgeCriterion, DenominatorCriterion};

/// How numerator membership maps onto card status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Numerator met is good: met ⇒ satisfied, unmet ⇒ due
    #[default]
    Positive,
    /// Numerator met is bad (e.g. poor control): met ⇒ due, unmet ⇒ satisfied
    Inverse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasureDefinition {
    /// Card key, e.g. `CMS130v14`
    pub key: String,
    pub title: String,
    /// Lower-case phrase used in narratives ("colorectal cancer screening")
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Events that trigger re-evaluation
    #[serde(default)]
    pub responds_to: Vec<EventKind>,
    #[serde(default)]
    pub polarity: Polarity,
    pub age: AgeCriterion,
    #[serde(default)]
    pub denominator: Vec<DenominatorCriterion>,
    /// Evaluated in order; the first match excludes
    #[serde(default)]
    pub exclusions: Vec<ExclusionRule>,
    pub numerator: NumeratorCriterion,
    #[serde(default)]
    pub recommendations: Vec<RecommendationTemplate>,
    /// Interval quoted on due cards ("Current screening interval 10 years.")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_interval_days: Option<u32>,
    #[serde(default)]
    pub can_be_snoozed: bool,
}

impl MeasureDefinition {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn responds_to(&self, kind: EventKind) -> bool {
        self.responds_to.contains(&kind)
    }

    /// Every value set the measure references, deduplicated and sorted
    pub fn value_set_names(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        for criterion in &self.denominator {
            names.extend(criterion.value_set_names());
        }
        for rule in &self.exclusions {
            names.extend(rule.value_set_names());
        }
        names.extend(self.numerator.value_set_names());
        for recommendation in &self.recommendations {
            if let Some(command) = &recommendation.command {
                if let Some(OrderCodes::FirstOf { value_set, .. }) = &command.order_codes {
                    names.insert(value_set.as_str());
                }
                if let Some(value_set) = &command.patient_diagnoses {
                    names.insert(value_set.as_str());
                }
            }
        }
        names
    }

    /// Check the definition is internally consistent and that every value
    /// set it names exists in `library`
    pub fn validate(&self, library: &ValueSetLibrary) -> EvalResult<()> {
        if self.key.trim().is_empty() {
            return Err(EvalError::invalid_definition(&self.title, "measure key is empty"));
        }
        if self.age.min > self.age.max {
            return Err(EvalError::invalid_definition(
                &self.key,
                format!("age range {}..{} is inverted", self.age.min, self.age.max),
            ));
        }
        if let NumeratorCriterion::MostRecentScreening { screenings } = &self.numerator {
            if screenings.is_empty() {
                return Err(EvalError::invalid_definition(&self.key, "no screening types configured"));
            }
            if let Some(s) = screenings.iter().find(|s| s.kinds.is_empty()) {
                return Err(EvalError::invalid_definition(
                    &self.key,
                    format!("screening '{}' names no fact kinds", s.label),
                ));
            }
        }
        for name in self.value_set_names() {
            if !library.contains(name) {
                return Err(EvalError::value_set_not_found(name));
            }
        }
        Ok(())
    }
}
