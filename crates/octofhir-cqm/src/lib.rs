//! Clinical quality measure evaluation for Rust
//!
//! This crate bundles the measure workspace behind one dependency:
//! - Terminology, periods and cards ([`types`])
//! - The patient record model and record loaders ([`model`])
//! - The measure engine and the bundled CMS130 / CMS122 measures ([`eval`])
//! - Inbound event handling ([`MeasureRunner`])
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use octofhir_cqm::{ClinicalEvent, EvaluationContext, EventKind, InMemoryRecordLoader, MeasureRunner};
//!
//! let loader = Arc::new(InMemoryRecordLoader::from_iter([record]));
//! let runner = MeasureRunner::bundled(loader)?;
//! let ctx = EvaluationContext::trailing_year(today)?;
//! let effects = runner
//!     .handle(&ClinicalEvent::new(EventKind::LabReportCreated, "patient-1"), &ctx)
//!     .await?;
//! ```

// Re-export all public APIs from internal crates
pub use octofhir_cqm_eval as eval;
pub use octofhir_cqm_model as model;
pub use octofhir_cqm_types as types;

pub mod runner;

// Convenience re-exports
pub use octofhir_cqm_eval::{EvalError, EvaluationContext, MeasureDefinition, MeasureEngine, measures};
pub use octofhir_cqm_model::{
    ClinicalEvent, EventKind, InMemoryRecordLoader, JsonDirectoryLoader, PatientRecord, RecordLoader,
};
pub use octofhir_cqm_types::{Card, CardStatus, MeasurementPeriod, ProtocolCardEffect, ValueSetLibrary};
pub use runner::{MeasureRunner, RunnerError, RunnerResult};

// CLI module (only available with cli feature)
#[cfg(feature = "cli")]
pub mod cli;
