//! Measure engine
//!
//! Runs one [`MeasureDefinition`] against a patient record:
//! population, denominator, exclusions, numerator, then card composition.
//! Evaluation is pure. Given the same record and context the engine always
//! produces the same card.

use log::{debug, warn};
use octofhir_cqm_model::PatientRecord;
use octofhir_cqm_types::{Card, ProtocolCardEffect, ValueSetLibrary};
use std::sync::Arc;

use crate::composer;
use crate::context::EvaluationContext;
use crate::error::EvalResult;
use crate::exclusion::first_exclusion;
use crate::measure::MeasureDefinition;
use crate::outcome::PopulationOutcome;
use crate::terminology::TerminologyResolver;

/// A validated measure bound to its value-set library
#[derive(Debug, Clone)]
pub struct MeasureEngine {
    definition: MeasureDefinition,
    terminology: TerminologyResolver,
}

impl MeasureEngine {
    /// Validate `definition` against `library` and build the engine
    pub fn new(definition: MeasureDefinition, library: Arc<ValueSetLibrary>) -> EvalResult<Self> {
        definition.validate(&library)?;
        Ok(Self {
            definition,
            terminology: TerminologyResolver::new(library),
        })
    }

    pub fn definition(&self) -> &MeasureDefinition {
        &self.definition
    }

    pub fn key(&self) -> &str {
        &self.definition.key
    }

    pub fn terminology(&self) -> &TerminologyResolver {
        &self.terminology
    }

    /// Place the patient in the measure's populations
    pub fn outcome<'r>(&self, record: &'r PatientRecord, ctx: &EvaluationContext) -> PopulationOutcome<'r> {
        let patient_id = &record.patient.id;
        let population = self.definition.age.classify(record, ctx);
        if !population.is_in() {
            debug!("{}: patient {} not in initial population ({:?})", self.key(), patient_id, population);
            return PopulationOutcome::not_in_population(population);
        }

        let mut outcome = PopulationOutcome::not_in_population(population);

        for criterion in &self.definition.denominator {
            let miss = criterion
                .evaluate(record, ctx, &self.terminology)
                .unwrap_or_else(|e| {
                    warn!("{}: denominator check failed for patient {}: {}", self.key(), patient_id, e);
                    Some(criterion.miss())
                });
            if miss.is_some() {
                outcome.denominator_miss = miss;
                return outcome;
            }
        }

        outcome.exclusion = first_exclusion(&self.definition.exclusions, record, ctx, &self.terminology);
        if outcome.excluded() {
            return outcome;
        }

        match self.definition.numerator.resolve(record, ctx, &self.terminology) {
            Ok(result) => {
                outcome.numerator_met = result.met;
                outcome.qualifying_fact = result.qualifying;
            }
            Err(e) => warn!("{}: numerator failed for patient {}: {}", self.key(), patient_id, e),
        }
        debug!(
            "{}: patient {} numerator met = {}",
            self.key(),
            patient_id,
            outcome.numerator_met
        );
        outcome
    }

    /// Evaluate and compose the card
    pub fn evaluate(&self, record: &PatientRecord, ctx: &EvaluationContext) -> Card {
        let outcome = self.outcome(record, ctx);
        composer::compose(&self.definition, &outcome, record, ctx, &self.terminology)
    }

    /// Evaluate and wrap the card in the effect sent to the host
    pub fn effect(&self, record: &PatientRecord, ctx: &EvaluationContext) -> ProtocolCardEffect {
        ProtocolCardEffect::new(&record.patient.id, self.key(), self.evaluate(record, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use crate::measures;

    #[test]
    fn test_rejects_unknown_value_set() {
        let mut definition = measures::colorectal_screening();
        definition.exclusions.push(crate::exclusion::ExclusionRule::HospiceDiagnosis {
            value_set: "Not A Value Set".to_string(),
        });
        let library = Arc::new(measures::bundled_value_sets().unwrap());
        let err = MeasureEngine::new(definition, library).unwrap_err();
        assert!(matches!(err, EvalError::ValueSetNotFound { name } if name == "Not A Value Set"));
    }

    #[test]
    fn test_bundled_definitions_validate() {
        let library = Arc::new(measures::bundled_value_sets().unwrap());
        for definition in measures::bundled_definitions() {
            let key = definition.key.clone();
            let engine = MeasureEngine::new(definition, Arc::clone(&library)).unwrap();
            assert_eq!(engine.key(), key);
        }
    }
}
