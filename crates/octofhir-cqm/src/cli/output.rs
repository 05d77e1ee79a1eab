//! Output formatting utilities

use anyhow::{Context, Result};
use colored::Colorize;
use octofhir_cqm_eval::MeasureDefinition;
use octofhir_cqm_types::{CardStatus, ProtocolCardEffect};
use serde::Serialize;
use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use tabled::{Table, Tabled, settings::Style};

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    #[default]
    JsonPretty,
    Table,
}

impl OutputFormat {
    /// Parse a `--format` value; unknown values fall back to pretty JSON
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" | "json-pretty" => Self::JsonPretty,
            "table" => Self::Table,
            _ => Self::JsonPretty,
        }
    }
}

/// Set up color output based on user preference
pub fn setup_colors(mode: &str) {
    match mode.to_lowercase().as_str() {
        "always" => colored::control::set_override(true),
        "never" => colored::control::set_override(false),
        _ => colored::control::set_override(io::stdout().is_terminal()),
    }
}

/// Format an error for display, including its chain of causes
pub fn format_error(error: &anyhow::Error) -> String {
    format!("{} {:#}", "Error:".red().bold(), error)
}

pub fn format_warning(warning: &str) -> String {
    format!("{} {}", "Warning:".yellow().bold(), warning)
}

pub fn format_success(message: &str) -> String {
    format!("{} {}", "Success:".green().bold(), message)
}

/// Colored status label for tables
pub fn format_status(status: CardStatus) -> String {
    match status {
        CardStatus::Satisfied => status.as_str().green().to_string(),
        CardStatus::Due => status.as_str().red().bold().to_string(),
        CardStatus::NotApplicable | CardStatus::NotRelevant => status.as_str().dimmed().to_string(),
        CardStatus::Pending => status.as_str().yellow().to_string(),
    }
}

/// Write output to a file or stdout
pub fn write_output(content: &str, output_file: Option<&Path>) -> Result<()> {
    if let Some(path) = output_file {
        let mut file =
            File::create(path).with_context(|| format!("Failed to create output file: {}", path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write to output file: {}", path.display()))?;
        eprintln!("{}", format_success(&format!("Output written to {}", path.display())));
    } else {
        println!("{}", content);
    }
    Ok(())
}

pub fn format_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    if pretty {
        serde_json::to_string_pretty(value).context("Failed to serialize JSON")
    } else {
        serde_json::to_string(value).context("Failed to serialize JSON")
    }
}

#[derive(Tabled)]
struct EffectRow {
    #[tabled(rename = "Patient")]
    patient: String,
    #[tabled(rename = "Measure")]
    key: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Due in")]
    due_in: String,
    #[tabled(rename = "Narrative")]
    narrative: String,
    #[tabled(rename = "Recommendations")]
    recommendations: String,
}

/// Render effects as a table, one row per card
pub fn effects_table(effects: &[ProtocolCardEffect]) -> String {
    if effects.is_empty() {
        return "(no effects)".to_string();
    }
    let rows = effects.iter().map(|effect| EffectRow {
        patient: effect.patient.clone(),
        key: effect.key.clone(),
        status: format_status(effect.data.status),
        due_in: match effect.data.due_in {
            days if days < 0 => "-".to_string(),
            days => format!("{days} days"),
        },
        narrative: effect.data.narrative.clone(),
        recommendations: effect
            .data
            .recommendations
            .iter()
            .map(|r| r.title.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
    });
    Table::new(rows).with(Style::modern()).to_string()
}

#[derive(Tabled)]
struct MeasureRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Exclusions")]
    exclusions: usize,
    #[tabled(rename = "Value sets")]
    value_sets: usize,
}

pub fn measures_table(definitions: &[MeasureDefinition]) -> String {
    let rows = definitions.iter().map(|d| MeasureRow {
        key: d.key.clone(),
        title: d.title.clone(),
        exclusions: d.exclusions.len(),
        value_sets: d.value_set_names().len(),
    });
    Table::new(rows).with(Style::modern()).to_string()
}

/// Print `value` as JSON, or the pre-rendered `table` for table output
pub fn print_output<T: Serialize + ?Sized>(
    value: &T,
    table: impl FnOnce() -> String,
    format: OutputFormat,
    output_file: Option<&Path>,
) -> Result<()> {
    let content = match format {
        OutputFormat::Json => format_json(value, false)?,
        OutputFormat::JsonPretty => format_json(value, true)?,
        OutputFormat::Table => table(),
    };
    write_output(&content, output_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_cqm_types::Card;
    use rstest::rstest;

    #[rstest]
    #[case("json", OutputFormat::Json)]
    #[case("PRETTY", OutputFormat::JsonPretty)]
    #[case("table", OutputFormat::Table)]
    #[case("yaml", OutputFormat::JsonPretty)]
    fn test_output_format_parse(#[case] raw: &str, #[case] expected: OutputFormat) {
        assert_eq!(OutputFormat::parse(raw), expected);
    }

    #[test]
    fn test_effects_table_lists_each_card() {
        colored::control::set_override(false);
        let effects = vec![
            ProtocolCardEffect::new("p1", "CMS130v14", Card::new("Colorectal", CardStatus::Due)),
            ProtocolCardEffect::new("p2", "CMS130v14", Card::new("Colorectal", CardStatus::Satisfied).with_due_in(30)),
        ];
        let table = effects_table(&effects);
        assert!(table.contains("p1"));
        assert!(table.contains("30 days"));
        assert!(table.contains("satisfied"));
        assert_eq!(effects_table(&[]), "(no effects)");
    }
}
