//! Numerator resolution
//!
//! Two shapes of numerator are supported:
//! - most recent screening: any of several screening types inside its own
//!   lookback before period end
//! - lab threshold: the most recent lab result in the period compared
//!   against a threshold

use chrono::NaiveDate;
use log::{debug, info};
use octofhir_cqm_model::{ClinicalFact, Fact, FactKind, LabValue, PatientRecord};
use octofhir_cqm_types::{CodeSet, CodeSystem, Coding};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::context::EvaluationContext;
use crate::error::EvalResult;
use crate::locator;
use crate::temporal::{DateInterval, Lookback, Window};
use crate::terminology::TerminologyResolver;

/// One way of satisfying a screening measure (FOBT, colonoscopy, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningType {
    /// Name used in narratives
    pub label: String,
    pub kinds: Vec<FactKind>,
    pub value_sets: Vec<String>,
    /// Systems to resolve the value sets in; empty means all
    #[serde(default)]
    pub systems: Vec<CodeSystem>,
    pub lookback: Lookback,
    /// Days a result of this type stays current
    pub interval_days: u32,
}

impl ScreeningType {
    fn codes(&self, terminology: &TerminologyResolver) -> CodeSet {
        terminology.codes_for_all(&self.value_sets, &self.systems)
    }
}

/// A classification of lab results by the coding on the value (HbA1c vs GMI)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestType {
    pub label: String,
    pub system: CodeSystem,
    pub codes: Vec<String>,
}

impl TestType {
    fn code_set(&self) -> CodeSet {
        CodeSet::from_pairs(self.codes.iter().map(|c| (self.system, c.as_str())))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    #[default]
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl Comparison {
    pub fn holds(self, value: Decimal, threshold: Decimal) -> bool {
        match self {
            Comparison::Greater => value > threshold,
            Comparison::GreaterOrEqual => value >= threshold,
            Comparison::Less => value < threshold,
            Comparison::LessOrEqual => value <= threshold,
        }
    }
}

/// Most recent lab result in the period compared against a threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabThreshold {
    pub value_sets: Vec<String>,
    #[serde(default)]
    pub systems: Vec<CodeSystem>,
    /// Specific result types recognised by their value coding
    #[serde(default)]
    pub test_types: Vec<TestType>,
    /// Label used when no test type matches
    pub default_test_type: String,
    pub threshold: Decimal,
    #[serde(default)]
    pub comparison: Comparison,
    /// A missing result, or a result without a usable value, meets the numerator
    #[serde(default)]
    pub missing_counts_as_met: bool,
    /// Noun phrase for the assessment, used when none was found
    pub result_label: String,
}

impl LabThreshold {
    fn codes(&self, terminology: &TerminologyResolver) -> CodeSet {
        self.test_types.iter().fold(
            terminology.codes_for_all(&self.value_sets, &self.systems),
            |acc, t| acc.union(&t.code_set()),
        )
    }

    /// Classify a value by its codings, falling back to the default type
    pub fn detect_test_type(&self, codings: &[Coding]) -> &str {
        self.test_types
            .iter()
            .find(|t| t.code_set().contains_any(codings))
            .map_or(self.default_test_type.as_str(), |t| t.label.as_str())
    }
}

/// Numerator criterion of a measure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NumeratorCriterion {
    MostRecentScreening { screenings: Vec<ScreeningType> },
    LabThreshold(LabThreshold),
}

/// The fact that decided the numerator
#[derive(Debug, Clone, PartialEq)]
pub struct QualifyingFact<'r> {
    pub fact: &'r ClinicalFact,
    pub label: String,
    pub date: Option<NaiveDate>,
    pub value: Option<Decimal>,
    pub interval_days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumeratorResult<'r> {
    pub met: bool,
    pub qualifying: Option<QualifyingFact<'r>>,
}

impl NumeratorCriterion {
    pub fn value_set_names(&self) -> Vec<&str> {
        match self {
            NumeratorCriterion::MostRecentScreening { screenings } => screenings
                .iter()
                .flat_map(|s| s.value_sets.iter().map(String::as_str))
                .collect(),
            NumeratorCriterion::LabThreshold(lab) => lab.value_sets.iter().map(String::as_str).collect(),
        }
    }

    pub fn resolve<'r>(
        &self,
        record: &'r PatientRecord,
        ctx: &EvaluationContext,
        terminology: &TerminologyResolver,
    ) -> EvalResult<NumeratorResult<'r>> {
        match self {
            NumeratorCriterion::MostRecentScreening { screenings } => {
                let mut best: Option<QualifyingFact<'r>> = None;
                for screening in screenings {
                    let window = Window::Lookback {
                        end: ctx.period_end(),
                        lookback: screening.lookback,
                    };
                    let Some(fact) = locator::latest(record, &screening.kinds, &screening.codes(terminology), &window)?
                    else {
                        continue;
                    };
                    debug!("Latest {} for patient {} is {}", screening.label, record.patient.id, fact.id());
                    // Strictly newer only, so ties keep the earlier-configured type.
                    if best.as_ref().is_none_or(|b| fact.relevant_date() > b.date) {
                        best = Some(QualifyingFact {
                            fact,
                            label: screening.label.clone(),
                            date: fact.relevant_date(),
                            value: None,
                            interval_days: Some(screening.interval_days),
                        });
                    }
                }
                if let Some(found) = &best {
                    info!("Patient {} has a qualifying {} ({})", record.patient.id, found.label, found.fact.id());
                }
                Ok(NumeratorResult {
                    met: best.is_some(),
                    qualifying: best,
                })
            }
            NumeratorCriterion::LabThreshold(lab) => resolve_lab(lab, record, ctx, terminology),
        }
    }

    /// Most recent screening of any type on or before period end, ignoring
    /// lookbacks; used to tell a patient when they were last screened
    pub fn history<'r>(
        &self,
        record: &'r PatientRecord,
        ctx: &EvaluationContext,
        terminology: &TerminologyResolver,
    ) -> EvalResult<Option<QualifyingFact<'r>>> {
        let NumeratorCriterion::MostRecentScreening { screenings } = self else {
            return Ok(None);
        };
        let mut best: Option<QualifyingFact<'r>> = None;
        for screening in screenings {
            let window = Window::OnOrBefore(ctx.period_end());
            if let Some(fact) = locator::latest(record, &screening.kinds, &screening.codes(terminology), &window)? {
                if best.as_ref().is_none_or(|b| fact.relevant_date() > b.date) {
                    best = Some(QualifyingFact {
                        fact,
                        label: screening.label.clone(),
                        date: fact.relevant_date(),
                        value: None,
                        interval_days: Some(screening.interval_days),
                    });
                }
            }
        }
        Ok(best)
    }
}

fn resolve_lab<'r>(
    lab: &LabThreshold,
    record: &'r PatientRecord,
    ctx: &EvaluationContext,
    terminology: &TerminologyResolver,
) -> EvalResult<NumeratorResult<'r>> {
    let codes = lab.codes(terminology);
    let reports = locator::find(
        record,
        &[FactKind::LabReport],
        &codes,
        &Window::During(DateInterval::from(ctx.period)),
    )?;

    let Some(&most_recent) = reports.first() else {
        debug!("No {} for patient {}", lab.result_label, record.patient.id);
        return Ok(NumeratorResult {
            met: lab.missing_counts_as_met,
            qualifying: None,
        });
    };
    let latest_date = most_recent.relevant_date();

    // Several reports on the latest day: the lowest value counts.
    let mut chosen: Option<(&'r ClinicalFact, &'r LabValue, Decimal)> = None;
    for report in reports.iter().copied().take_while(|r| r.relevant_date() == latest_date) {
        let Some(lab_report) = report.as_lab_report() else {
            continue;
        };
        for value in lab_report.values_matching(&codes) {
            if let Some(number) = value.value.as_ref().and_then(extract_value) {
                if chosen.is_none_or(|(_, _, lowest)| number < lowest) {
                    chosen = Some((report, value, number));
                }
            }
        }
    }

    let qualifying = match chosen {
        Some((fact, value, number)) => QualifyingFact {
            fact,
            label: lab.detect_test_type(&value.codings).to_string(),
            date: fact.relevant_date(),
            value: Some(number),
            interval_days: None,
        },
        None => {
            let label = most_recent
                .as_lab_report()
                .and_then(|r| r.values_matching(&codes).next())
                .map_or(lab.default_test_type.as_str(), |v| lab.detect_test_type(&v.codings))
                .to_string();
            QualifyingFact {
                fact: most_recent,
                label,
                date: latest_date,
                value: None,
                interval_days: None,
            }
        }
    };

    let met = match qualifying.value {
        Some(value) => lab.comparison.holds(value, lab.threshold),
        None => lab.missing_counts_as_met,
    };
    info!(
        "Patient {} latest {} on {:?}: {:?} (numerator met: {})",
        record.patient.id, qualifying.label, qualifying.date, qualifying.value, met
    );

    Ok(NumeratorResult {
        met,
        qualifying: Some(qualifying),
    })
}

static NUMERIC: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\s*(?:<=|>=|≤|≥|<|>|=)?\s*([+-]?(?:\d+(?:\.\d*)?|\.\d+))\s*%?\s*$").ok());

/// Extract a numeric result. Null, empty and non-numeric values yield `None`;
/// comparator prefixes and a trailing percent sign are tolerated.
pub fn extract_value(raw: &serde_json::Value) -> Option<Decimal> {
    match raw {
        serde_json::Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        serde_json::Value::String(s) => {
            let captures = NUMERIC.as_ref()?.captures(s)?;
            Decimal::from_str(captures.get(1)?.as_str()).ok()
        }
        _ => None,
    }
}
