//! Clinical Quality Measure Evaluation Engine
//!
//! This crate decides whether a single patient satisfies a clinical quality
//! measure over a measurement period and produces the card shown to the
//! clinician. A measure is configuration ([`MeasureDefinition`]) over one
//! engine:
//!
//! - **Population**: age bounds measured at a reference date
//! - **Denominator**: qualifying encounters and required diagnoses
//! - **Exclusions**: an ordered chain of rules; the first match wins
//! - **Numerator**: most recent screening across types, or a lab value
//!   compared against a threshold
//! - **Card**: status, narrative and recommendations
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use octofhir_cqm_eval::{EvaluationContext, MeasureEngine, measures};
//!
//! let library = Arc::new(measures::bundled_value_sets()?);
//! let engine = MeasureEngine::new(measures::colorectal_screening(), library)?;
//! let ctx = EvaluationContext::trailing_year(today)?;
//! let card = engine.evaluate(&record, &ctx);
//! ```
//!
//! # Architecture
//!
//! - `terminology`: value-set names resolved to code sets per system
//! - `temporal`: overlap, lookback and on-or-before predicates, age arithmetic
//! - `locator`: filters a record's facts by kind, code and window, most recent first
//! - `population`, `exclusion`, `numerator`: the population stages
//! - `composer`: maps a [`PopulationOutcome`] to a [`Card`](octofhir_cqm_types::Card)
//! - `engine`: [`MeasureEngine`] ties the stages together
//!
//! Evaluation never reads a clock. `now` and the period come in through
//! [`EvaluationContext`].

pub mod composer;
pub mod context;
pub mod engine;
pub mod error;
pub mod exclusion;
pub mod locator;
pub mod measure;
pub mod measures;
pub mod numerator;
pub mod outcome;
pub mod population;
pub mod temporal;
pub mod terminology;

pub use composer::{CommandTemplate, OrderCodes, RecommendationTemplate, RecommendationTrigger};
pub use context::EvaluationContext;
pub use engine::MeasureEngine;
pub use error::{EvalError, EvalResult};
pub use exclusion::{Exclusion, ExclusionReason, ExclusionRule, FrailtySignals, HospiceEvidence};
pub use measure::{MeasureDefinition, Polarity};
pub use numerator::{Comparison, LabThreshold, NumeratorCriterion, QualifyingFact, ScreeningType, TestType};
pub use outcome::PopulationOutcome;
pub use population::{AgeCriterion, AgeReference, DenominatorCriterion, DenominatorMiss, NotInPopulationReason, PopulationState};
pub use temporal::{DateInterval, Lookback, Window};
pub use terminology::TerminologyResolver;
