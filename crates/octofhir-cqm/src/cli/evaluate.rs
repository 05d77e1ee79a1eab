//! Evaluate command implementation

use super::output::{self, OutputFormat};
use super::resolver::{self, MeasureSelection, PeriodArgs};
use anyhow::{Context, Result};
use octofhir_cqm_model::PatientRecord;
use octofhir_cqm_types::ProtocolCardEffect;
use std::fs;
use std::path::PathBuf;

/// Configuration for evaluate command
pub struct EvaluateConfig {
    pub record: PathBuf,
    pub selection: MeasureSelection,
    pub period: PeriodArgs,
    pub verbose: bool,
    pub output_format: OutputFormat,
    pub output_file: Option<PathBuf>,
}

/// Evaluate a patient snapshot file against the selected measures
pub fn evaluate(config: EvaluateConfig) -> Result<()> {
    let content = fs::read_to_string(&config.record)
        .with_context(|| format!("Failed to read patient record: {}", config.record.display()))?;
    let record = PatientRecord::from_json(&content)
        .with_context(|| format!("Failed to parse patient record: {}", config.record.display()))?;

    let ctx = resolver::resolve_context(&config.period)?;
    let engines = resolver::resolve_engines(&config.selection)?;

    if config.verbose {
        eprintln!(
            "Evaluating patient {} ({} facts) over {} as of {}",
            record.patient.id,
            record.facts.len(),
            ctx.period,
            ctx.now
        );
    }

    let effects: Vec<ProtocolCardEffect> = engines.iter().map(|engine| engine.effect(&record, &ctx)).collect();

    output::print_output(
        &effects,
        || output::effects_table(&effects),
        config.output_format,
        config.output_file.as_deref(),
    )
}
