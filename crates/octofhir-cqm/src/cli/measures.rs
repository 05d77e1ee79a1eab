//! Measures command implementation

use super::output::{self, OutputFormat};
use anyhow::Result;
use octofhir_cqm_eval::measures;
use serde_json::{Value, json};
use std::path::PathBuf;

/// Configuration for measures command
pub struct MeasuresConfig {
    pub output_format: OutputFormat,
    pub output_file: Option<PathBuf>,
}

/// List the bundled measures
pub fn list(config: MeasuresConfig) -> Result<()> {
    let definitions = measures::bundled_definitions();
    let summary: Vec<Value> = definitions
        .iter()
        .map(|d| {
            json!({
                "key": d.key,
                "title": d.title,
                "description": d.description,
                "responds_to": d.responds_to,
                "value_sets": d.value_set_names(),
            })
        })
        .collect();

    output::print_output(
        &summary,
        || output::measures_table(&definitions),
        config.output_format,
        config.output_file.as_deref(),
    )
}
