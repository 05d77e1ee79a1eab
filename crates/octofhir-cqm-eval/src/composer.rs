//! Card composition
//!
//! Turns a [`PopulationOutcome`] into the single [`Card`] an evaluation
//! produces: status, narrative, `due_in` and, for due cards, the configured
//! recommendations.

use chrono::{Days, NaiveDate};
use log::debug;
use octofhir_cqm_model::{FactKind, PatientRecord};
use octofhir_cqm_types::{Card, CardStatus, CodeSystem, CommandKind, CommandRef, Recommendation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::EvaluationContext;
use crate::exclusion::ExclusionReason;
use crate::locator;
use crate::measure::{MeasureDefinition, Polarity};
use crate::numerator::{NumeratorCriterion, QualifyingFact};
use crate::outcome::PopulationOutcome;
use crate::population::{DenominatorMiss, NotInPopulationReason, PopulationState};
use crate::temporal::{DateInterval, Window};
use crate::terminology::TerminologyResolver;

/// When a recommendation is shown on a due card
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationTrigger {
    #[default]
    Always,
    /// No qualifying result, or a result without a value
    MissingResult,
    /// A qualifying result with a value
    ResultPresent,
}

/// Codes a command should be pre-populated with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum OrderCodes {
    Literal { codes: Vec<String> },
    /// The lexicographically smallest code of a value set in one system
    FirstOf { value_set: String, system: CodeSystem },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub kind: CommandKind,
    #[serde(default)]
    pub order_codes: Option<OrderCodes>,
    #[serde(default)]
    pub diagnosis_codes: Vec<String>,
    /// Add the codes of the patient's active conditions in this value set
    /// to the diagnosis codes
    #[serde(default)]
    pub patient_diagnoses: Option<String>,
    /// Static context passed through to the host (specialties, notes)
    #[serde(default)]
    pub context: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationTemplate {
    pub title: String,
    #[serde(default = "default_button")]
    pub button: String,
    #[serde(default)]
    pub trigger: RecommendationTrigger,
    #[serde(default)]
    pub command: Option<CommandTemplate>,
}

fn default_button() -> String {
    "Order".to_string()
}

/// Map an outcome onto a card status
pub fn status_for(outcome: &PopulationOutcome<'_>, polarity: Polarity) -> CardStatus {
    if !outcome.in_scope() {
        return CardStatus::NotApplicable;
    }
    match (polarity, outcome.numerator_met) {
        (Polarity::Positive, true) | (Polarity::Inverse, false) => CardStatus::Satisfied,
        (Polarity::Positive, false) | (Polarity::Inverse, true) => CardStatus::Due,
    }
}

/// Build the card for an outcome
pub fn compose(
    definition: &MeasureDefinition,
    outcome: &PopulationOutcome<'_>,
    record: &PatientRecord,
    ctx: &EvaluationContext,
    terminology: &TerminologyResolver,
) -> Card {
    let status = status_for(outcome, definition.polarity);
    let name = record.patient.display_name();

    let narrative = if let PopulationState::NotInPopulation(reason) = outcome.population {
        not_in_population_narrative(name, reason, definition)
    } else if let Some(miss) = &outcome.denominator_miss {
        denominator_narrative(name, miss, definition)
    } else if let Some(reason) = outcome.exclusion_reason() {
        exclusion_narrative(name, reason, definition)
    } else {
        in_scope_narrative(name, status, outcome, record, ctx, definition, terminology)
    };

    let mut card = Card::new(&definition.title, status).with_narrative(narrative);
    card.can_be_snoozed = definition.can_be_snoozed;

    if status == CardStatus::Satisfied {
        if let Some(due_in) = outcome.qualifying_fact.as_ref().and_then(|q| due_in(q, ctx.now)) {
            card.due_in = due_in;
        }
    }

    if status == CardStatus::Due {
        let has_result = outcome.qualifying_fact.as_ref().is_some_and(|q| q.value.is_some());
        for template in &definition.recommendations {
            let shown = match template.trigger {
                RecommendationTrigger::Always => true,
                RecommendationTrigger::MissingResult => !has_result,
                RecommendationTrigger::ResultPresent => has_result,
            };
            if !shown {
                continue;
            }
            if let Some(recommendation) = build_recommendation(template, record, ctx, terminology) {
                card.push_recommendation(recommendation);
            }
        }
    }

    card
}

fn not_in_population_narrative(name: &str, reason: NotInPopulationReason, def: &MeasureDefinition) -> String {
    match reason {
        NotInPopulationReason::UnderAge { min } => format!(
            "{name} is under {min} years of age and does not meet the criteria for {}.",
            def.subject
        ),
        NotInPopulationReason::OverAge { max } => format!(
            "{name} is over {max} years of age and does not meet the criteria for {}.",
            def.subject
        ),
        NotInPopulationReason::MissingBirthDate => format!(
            "{name} has no recorded date of birth and does not meet the criteria for {}.",
            def.subject
        ),
    }
}

fn denominator_narrative(name: &str, miss: &DenominatorMiss, def: &MeasureDefinition) -> String {
    match miss {
        DenominatorMiss::NoQualifyingEncounter => {
            format!("{name} has no qualifying encounter in the measurement period.")
        }
        DenominatorMiss::MissingDiagnosis { label } => {
            format!("{name} does not have {label} and is not eligible for {}.", def.subject)
        }
    }
}

fn exclusion_narrative(name: &str, reason: &ExclusionReason, def: &MeasureDefinition) -> String {
    let subject = &def.subject;
    match reason {
        ExclusionReason::Hospice(_) => format!("{name} is receiving hospice care and is excluded from {subject}."),
        ExclusionReason::NursingHome => {
            format!("{name} lives long term in a nursing home and is excluded from {subject}.")
        }
        ExclusionReason::FrailtyWithAdvancedIllness { min_age: Some(age) } => format!(
            "{name} is {age} or older with frailty and advanced illness or dementia medication and is excluded from {subject}."
        ),
        ExclusionReason::FrailtyWithAdvancedIllness { min_age: None } => format!(
            "{name} has frailty and advanced illness or dementia medication and is excluded from {subject}."
        ),
        ExclusionReason::StructuralHistory { label } => {
            format!("{name} has a history of {label} and is excluded from {subject}.")
        }
        ExclusionReason::PalliativeCare => format!("{name} is receiving palliative care and is excluded from {subject}."),
    }
}

fn in_scope_narrative(
    name: &str,
    status: CardStatus,
    outcome: &PopulationOutcome<'_>,
    record: &PatientRecord,
    ctx: &EvaluationContext,
    def: &MeasureDefinition,
    terminology: &TerminologyResolver,
) -> String {
    match &def.numerator {
        NumeratorCriterion::LabThreshold(lab) => match &outcome.qualifying_fact {
            Some(QualifyingFact {
                label,
                date: Some(date),
                value: Some(value),
                ..
            }) => format!("{name}'s last {label} done {} was {value:.1}%.", long_date(*date)),
            Some(QualifyingFact {
                label, date: Some(date), ..
            }) => format!("{name}'s last {label} done {} has no recorded value.", long_date(*date)),
            _ => format!("{name} has no {} in the measurement period.", lab.result_label),
        },
        NumeratorCriterion::MostRecentScreening { .. } if status == CardStatus::Satisfied => {
            match &outcome.qualifying_fact {
                Some(QualifyingFact {
                    label, date: Some(date), ..
                }) => format!("{name} had a {label} {}.", relative_with_date(*date, ctx.now)),
                _ => format!("{name} has had appropriate {}.", def.subject),
            }
        }
        NumeratorCriterion::MostRecentScreening { .. } => {
            let mut lines = vec![format!("{name} is due for a {}.", def.title)];
            let history = def.numerator.history(record, ctx, terminology).unwrap_or_else(|e| {
                debug!("Could not look up screening history: {}", e);
                None
            });
            lines.push(match history {
                Some(QualifyingFact {
                    label, date: Some(date), ..
                }) => format!("Last {label} done {}.", long_date(date)),
                _ => "No relevant exams found.".to_string(),
            });
            if let Some(days) = def.display_interval_days {
                lines.push(format!("Current screening interval {}.", friendly_duration(days)));
            }
            lines.join("\n")
        }
    }
}

fn build_recommendation(
    template: &RecommendationTemplate,
    record: &PatientRecord,
    ctx: &EvaluationContext,
    terminology: &TerminologyResolver,
) -> Option<Recommendation> {
    let recommendation = Recommendation::new(&template.title, &template.button);
    let Some(command) = &template.command else {
        return Some(recommendation);
    };

    let mut command_ref = CommandRef::new(command.kind);
    command_ref.context = command.context.clone();

    if let Some(order_codes) = &command.order_codes {
        let codes = match order_codes {
            OrderCodes::Literal { codes } => codes.clone(),
            OrderCodes::FirstOf { value_set, system } => terminology.first_code(value_set, *system).into_iter().collect(),
        };
        if codes.is_empty() {
            debug!("Omitting '{}': no order codes resolved", template.title);
            return None;
        }
        command_ref.context.insert("order_codes".into(), Value::from(codes));
    }

    let mut diagnosis_codes = command.diagnosis_codes.clone();
    if let Some(value_set) = &command.patient_diagnoses {
        let codes = terminology.codes(value_set, &[CodeSystem::Icd10Cm, CodeSystem::SnomedCt]);
        let window = Window::Overlaps(DateInterval::from(ctx.period));
        let conditions = locator::find(record, &[FactKind::Condition], &codes, &window).unwrap_or_default();
        for condition in conditions.iter().filter_map(|f| f.as_condition()) {
            for coding in condition.codings.iter().filter(|c| codes.contains(c)) {
                if !diagnosis_codes.contains(&coding.code) {
                    diagnosis_codes.push(coding.code.clone());
                }
            }
        }
    }
    if !diagnosis_codes.is_empty() {
        command_ref.context.insert("diagnosis_codes".into(), Value::from(diagnosis_codes));
    }

    Some(recommendation.with_command(command_ref))
}

/// Days from `now` until the qualifying result lapses
pub fn due_in(qualifying: &QualifyingFact<'_>, now: NaiveDate) -> Option<i64> {
    let date = qualifying.date?;
    let lapses = date.checked_add_days(Days::new(u64::from(qualifying.interval_days?)))?;
    Some((lapses - now).num_days())
}

/// "3 months ago on 7/1/24"
pub fn relative_with_date(date: NaiveDate, now: NaiveDate) -> String {
    format!("{} on {}", relative_time(date, now), date.format("%-m/%-d/%y"))
}

/// Coarse "N units ago" phrase: days under a week, weeks under 30 days,
/// 30-day months under a year, then 365-day years
pub fn relative_time(date: NaiveDate, now: NaiveDate) -> String {
    let days = (now - date).num_days().max(0);
    let (count, unit) = if days < 7 {
        (days, "day")
    } else if days < 30 {
        (days / 7, "week")
    } else if days < 365 {
        (days / 30, "month")
    } else {
        (days / 365, "year")
    };
    format!("{count} {unit}{} ago", plural(count))
}

/// "March 1, 2012"
pub fn long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// Friendly rendering of a day count: "10 years", "1 year, 6 months",
/// "2 months, 5 days", "12 days"
pub fn friendly_duration(days: u32) -> String {
    let days = i64::from(days);
    if days < 1 {
        return "invalid duration".to_string();
    }
    if days >= 365 {
        let (years, rest) = (days / 365, days % 365);
        let mut text = format!("{years} year{}", plural(years));
        if rest >= 30 {
            let months = rest / 30;
            text.push_str(&format!(", {months} month{}", plural(months)));
        }
        text
    } else if days >= 30 {
        let (months, rest) = (days / 30, days % 30);
        let mut text = format!("{months} month{}", plural(months));
        if rest > 0 {
            text.push_str(&format!(", {rest} day{}", plural(rest)));
        }
        text
    } else {
        format!("{days} day{}", plural(days))
    }
}

fn plural(count: i64) -> &'static str {
    if count == 1 { "" } else { "s" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(date(2024, 10, 1), "0 days ago")]
    #[case(date(2024, 9, 30), "1 day ago")]
    #[case(date(2024, 9, 24), "1 week ago")]
    #[case(date(2024, 9, 2), "4 weeks ago")]
    #[case(date(2024, 7, 1), "3 months ago")]
    #[case(date(2023, 10, 3), "12 months ago")]
    #[case(date(2023, 10, 1), "1 year ago")]
    #[case(date(2014, 10, 1), "10 years ago")]
    fn test_relative_time(#[case] when: NaiveDate, #[case] expected: &str) {
        assert_eq!(relative_time(when, date(2024, 10, 1)), expected);
    }

    #[test]
    fn test_relative_with_date() {
        assert_eq!(relative_with_date(date(2024, 7, 1), date(2024, 10, 1)), "3 months ago on 7/1/24");
        assert_eq!(long_date(date(2012, 3, 1)), "March 1, 2012");
    }

    #[rstest]
    #[case(3650, "10 years")]
    #[case(365, "1 year")]
    #[case(1825, "5 years")]
    #[case(550, "1 year, 6 months")]
    #[case(65, "2 months, 5 days")]
    #[case(30, "1 month")]
    #[case(12, "12 days")]
    #[case(1, "1 day")]
    #[case(0, "invalid duration")]
    fn test_friendly_duration(#[case] days: u32, #[case] expected: &str) {
        assert_eq!(friendly_duration(days), expected);
    }
}
