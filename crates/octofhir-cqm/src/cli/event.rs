//! Event command implementation

use super::output::{self, OutputFormat};
use super::resolver::{self, MeasureSelection, PeriodArgs};
use crate::runner::MeasureRunner;
use anyhow::{Context, Result};
use octofhir_cqm_model::{ClinicalEvent, EventKind, JsonDirectoryLoader};
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for event command
pub struct EventConfig {
    pub kind: String,
    pub patient: Option<String>,
    pub records: PathBuf,
    pub selection: MeasureSelection,
    pub period: PeriodArgs,
    pub verbose: bool,
    pub output_format: OutputFormat,
    pub output_file: Option<PathBuf>,
}

/// Replay one clinical event against a directory of patient snapshots
pub async fn handle_event(config: EventConfig) -> Result<()> {
    let kind: EventKind = config.kind.parse().map_err(anyhow::Error::msg)?;
    let event = match config.patient {
        Some(patient) => ClinicalEvent::new(kind, patient),
        None => ClinicalEvent::without_patient(kind),
    };

    let ctx = resolver::resolve_context(&config.period)?;
    let engines = resolver::resolve_engines(&config.selection)?;
    let loader = Arc::new(JsonDirectoryLoader::new(&config.records));
    let runner = MeasureRunner::new(engines, loader);

    if config.verbose {
        eprintln!("Dispatching {} to {:?} (records in {})", event.kind, runner, config.records.display());
    }

    let effects = runner
        .handle(&event, &ctx)
        .await
        .with_context(|| format!("Failed to handle {} event", event.kind))?;

    if effects.is_empty() {
        eprintln!("{}", output::format_warning("No measure produced an effect for this event"));
    }

    output::print_output(
        &effects,
        || output::effects_table(&effects),
        config.output_format,
        config.output_file.as_deref(),
    )
}
