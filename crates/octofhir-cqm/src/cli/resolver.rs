//! Measure, value-set and period resolution from command-line flags

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Local, NaiveDate};
use octofhir_cqm_eval::{EvaluationContext, MeasureDefinition, MeasureEngine, measures};
use octofhir_cqm_types::{MeasurementPeriod, ValueSetLibrary};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where the measures to run come from
#[derive(Debug, Clone, Default)]
pub struct MeasureSelection {
    /// Bundled measure keys; empty means every bundled measure
    pub keys: Vec<String>,
    /// Measure definition JSON files
    pub definitions: Vec<PathBuf>,
    /// Extra value sets, merged over the bundled library
    pub value_sets: Option<PathBuf>,
}

/// Evaluation date and measurement period flags
#[derive(Debug, Clone, Default)]
pub struct PeriodArgs {
    pub now: Option<String>,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}': expected YYYY-MM-DD", value))
}

/// Build the evaluation context. `now` defaults to today and the period to
/// the year ending on `now`; both period bounds must be given together.
pub fn resolve_context(args: &PeriodArgs) -> Result<EvaluationContext> {
    let now = match &args.now {
        Some(now) => parse_date(now)?,
        None => Local::now().date_naive(),
    };

    let period = match (&args.period_start, &args.period_end) {
        (Some(start), Some(end)) => MeasurementPeriod::new(parse_date(start)?, parse_date(end)?)?,
        (None, None) => MeasurementPeriod::trailing_year(now)?,
        _ => bail!("--period-start and --period-end must be given together"),
    };

    Ok(EvaluationContext::new(now, period))
}

/// Bundled library, with the user's value sets merged over it
pub fn resolve_library(value_sets: Option<&Path>) -> Result<ValueSetLibrary> {
    let mut library = measures::bundled_value_sets().context("Failed to load bundled value sets")?;
    if let Some(path) = value_sets {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read value set file: {}", path.display()))?;
        let extra = ValueSetLibrary::from_json(&content)
            .with_context(|| format!("Failed to parse value set file: {}", path.display()))?;
        log::debug!("Loaded {} value sets from {}", extra.len(), path.display());
        library.merge(extra);
    }
    Ok(library)
}

pub fn load_definition(path: &Path) -> Result<MeasureDefinition> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read measure definition: {}", path.display()))?;
    MeasureDefinition::from_json(&content)
        .with_context(|| format!("Failed to parse measure definition: {}", path.display()))
}

/// The definitions a selection names
pub fn resolve_definitions(selection: &MeasureSelection) -> Result<Vec<MeasureDefinition>> {
    let mut definitions = selection
        .keys
        .iter()
        .map(|key| measures::bundled_definition(key).ok_or_else(|| anyhow!("Unknown measure: {}", key)))
        .collect::<Result<Vec<_>>>()?;

    for path in &selection.definitions {
        definitions.push(load_definition(path)?);
    }

    if definitions.is_empty() {
        definitions = measures::bundled_definitions();
    }
    Ok(definitions)
}

/// Validated engines for a selection, sharing one library
pub fn resolve_engines(selection: &MeasureSelection) -> Result<Vec<MeasureEngine>> {
    let library = Arc::new(resolve_library(selection.value_sets.as_deref())?);
    resolve_definitions(selection)?
        .into_iter()
        .map(|definition| {
            let key = definition.key.clone();
            MeasureEngine::new(definition, Arc::clone(&library))
                .with_context(|| format!("Measure {} is invalid", key))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_explicit_period() {
        let ctx = resolve_context(&PeriodArgs {
            now: Some("2024-10-01".into()),
            period_start: Some("2024-01-01".into()),
            period_end: Some("2024-12-31".into()),
        })
        .unwrap();
        assert_eq!(ctx.now, parse_date("2024-10-01").unwrap());
        assert_eq!(ctx.period, MeasurementPeriod::calendar_year(2024).unwrap());
    }

    #[test]
    fn test_default_period_trails_now() {
        let ctx = resolve_context(&PeriodArgs {
            now: Some("2024-10-01".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(ctx.period_end(), parse_date("2024-10-01").unwrap());
    }

    #[test]
    fn test_half_open_period_is_rejected() {
        let err = resolve_context(&PeriodArgs {
            now: None,
            period_start: Some("2024-01-01".into()),
            period_end: None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("--period-start"));
        assert!(parse_date("01/02/2024").is_err());
    }

    #[test]
    fn test_selection_defaults_to_bundled() {
        let keys: Vec<String> = resolve_definitions(&MeasureSelection::default())
            .unwrap()
            .into_iter()
            .map(|d| d.key)
            .collect();
        assert_eq!(keys, vec!["CMS130v14", "CMS122v14"]);

        let err = resolve_definitions(&MeasureSelection {
            keys: vec!["CMS1".into()],
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "Unknown measure: CMS1");
    }

    #[test]
    fn test_definition_file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&measures::glycemic_poor_control()).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let engines = resolve_engines(&MeasureSelection {
            definitions: vec![file.path().to_path_buf()],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(engines.len(), 1);
        assert_eq!(engines[0].key(), "CMS122v14");
    }
}
