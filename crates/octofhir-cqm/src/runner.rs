//! Inbound event handling
//!
//! [`MeasureRunner`] turns a [`ClinicalEvent`] into the protocol card effects
//! of every measure that responds to it: load the patient snapshot once, then
//! evaluate each responding engine against it.

use log::{debug, info, warn};
use octofhir_cqm_eval::{EvalError, EvaluationContext, MeasureDefinition, MeasureEngine, measures};
use octofhir_cqm_model::{ClinicalEvent, LoaderError, RecordLoader};
use octofhir_cqm_types::{ProtocolCardEffect, TypesError, ValueSetLibrary};
use std::sync::Arc;
use thiserror::Error;

/// Result type for runner operations
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors raised while building a runner or handling an event
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The patient snapshot could not be loaded
    #[error("Failed to load patient '{patient_id}': {source}")]
    Load {
        patient_id: String,
        #[source]
        source: LoaderError,
    },

    /// A measure definition failed validation
    #[error(transparent)]
    Eval(#[from] EvalError),

    /// The value-set library could not be read
    #[error(transparent)]
    Types(#[from] TypesError),
}

/// Dispatches clinical events to measure engines
pub struct MeasureRunner {
    engines: Vec<MeasureEngine>,
    loader: Arc<dyn RecordLoader>,
}

impl MeasureRunner {
    pub fn new(engines: Vec<MeasureEngine>, loader: Arc<dyn RecordLoader>) -> Self {
        Self { engines, loader }
    }

    /// Runner over the bundled measures and value sets
    pub fn bundled(loader: Arc<dyn RecordLoader>) -> RunnerResult<Self> {
        let library = Arc::new(measures::bundled_value_sets()?);
        Self::from_definitions(measures::bundled_definitions(), library, loader)
    }

    /// Validate each definition against `library` and build a runner
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = MeasureDefinition>,
        library: Arc<ValueSetLibrary>,
        loader: Arc<dyn RecordLoader>,
    ) -> RunnerResult<Self> {
        let engines = definitions
            .into_iter()
            .map(|definition| MeasureEngine::new(definition, Arc::clone(&library)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(engines, loader))
    }

    pub fn engines(&self) -> &[MeasureEngine] {
        &self.engines
    }

    /// Effects for one event: one per responding measure, none when the event
    /// carries no patient, no measure responds, or the patient is unknown
    pub async fn handle(&self, event: &ClinicalEvent, ctx: &EvaluationContext) -> RunnerResult<Vec<ProtocolCardEffect>> {
        let Some(patient_id) = event.patient_id.as_deref() else {
            debug!("Ignoring {} event without a patient", event.kind);
            return Ok(Vec::new());
        };

        let responding: Vec<&MeasureEngine> = self
            .engines
            .iter()
            .filter(|engine| engine.definition().responds_to(event.kind))
            .collect();
        if responding.is_empty() {
            debug!("No measure responds to {}", event.kind);
            return Ok(Vec::new());
        }

        let record = self
            .loader
            .load(patient_id)
            .await
            .map_err(|source| RunnerError::Load {
                patient_id: patient_id.to_string(),
                source,
            })?;
        let Some(record) = record else {
            warn!("Patient {} not found; skipping {} event", patient_id, event.kind);
            return Ok(Vec::new());
        };

        let effects: Vec<ProtocolCardEffect> = responding
            .into_iter()
            .map(|engine| engine.effect(&record, ctx))
            .collect();
        info!(
            "Evaluated {} measure(s) for patient {} on {}",
            effects.len(),
            patient_id,
            event.kind
        );
        Ok(effects)
    }
}

impl std::fmt::Debug for MeasureRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasureRunner")
            .field("measures", &self.engines.iter().map(MeasureEngine::key).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
