//! Evaluation context

use chrono::NaiveDate;
use octofhir_cqm_types::{MeasurementPeriod, TypesResult};

/// Per-evaluation inputs supplied by the host.
///
/// `now` anchors relative phrasing and `due_in`; `period` bounds every
/// criterion. Neither is read from a clock inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationContext {
    pub now: NaiveDate,
    pub period: MeasurementPeriod,
}

impl EvaluationContext {
    pub fn new(now: NaiveDate, period: MeasurementPeriod) -> Self {
        Self { now, period }
    }

    /// Evaluate over the year ending on `now`
    pub fn trailing_year(now: NaiveDate) -> TypesResult<Self> {
        Ok(Self::new(now, MeasurementPeriod::trailing_year(now)?))
    }

    pub fn period_start(&self) -> NaiveDate {
        self.period.start()
    }

    pub fn period_end(&self) -> NaiveDate {
        self.period.end()
    }
}
