//! Temporal window calculations
//!
//! All intervals are inclusive on both ends and all arithmetic is on calendar
//! dates. Subtracting a year from February 29 lands on February 28.

use chrono::{Datelike, Days, Months, NaiveDate};
use octofhir_cqm_model::DateSpan;
use octofhir_cqm_types::MeasurementPeriod;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EvalError, EvalResult};

/// Inclusive overlap test: `a_start <= b_end && b_start <= a_end`
pub fn period_overlap(a_start: NaiveDate, a_end: NaiveDate, b_start: NaiveDate, b_end: NaiveDate) -> bool {
    a_start <= b_end && b_start <= a_end
}

/// Non-strict `candidate <= boundary`
pub fn on_or_before(candidate: NaiveDate, boundary: NaiveDate) -> bool {
    candidate <= boundary
}

/// `candidate` lies in `[period_end - lookback, period_end]`
pub fn within_lookback(candidate: NaiveDate, period_end: NaiveDate, lookback: Lookback) -> EvalResult<bool> {
    let floor = lookback.before(period_end)?;
    Ok(floor <= candidate && candidate <= period_end)
}

/// Whole years between `birth` and `reference`, floored
pub fn age_in_years(birth: NaiveDate, reference: NaiveDate) -> i32 {
    let mut years = reference.year() - birth.year();
    if (reference.month(), reference.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    years
}

/// A calendar duration counted back from a date
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Lookback {
    #[serde(default)]
    pub years: u32,
    #[serde(default)]
    pub months: u32,
    #[serde(default)]
    pub days: u64,
}

impl Lookback {
    pub const fn years(years: u32) -> Self {
        Self {
            years,
            months: 0,
            days: 0,
        }
    }

    pub const fn months(months: u32) -> Self {
        Self {
            years: 0,
            months,
            days: 0,
        }
    }

    pub const fn days(days: u64) -> Self {
        Self {
            years: 0,
            months: 0,
            days,
        }
    }

    /// The earliest date the lookback reaches from `end`
    pub fn before(&self, end: NaiveDate) -> EvalResult<NaiveDate> {
        let total_months = self
            .years
            .checked_mul(12)
            .and_then(|m| m.checked_add(self.months))
            .ok_or_else(|| self.overflow(end))?;
        end.checked_sub_months(Months::new(total_months))
            .and_then(|d| d.checked_sub_days(Days::new(self.days)))
            .ok_or_else(|| self.overflow(end))
    }

    /// `[end - self, end]`
    pub fn window_ending(&self, end: NaiveDate) -> EvalResult<DateInterval> {
        Ok(DateInterval::new(self.before(end)?, end))
    }

    fn overflow(&self, date: NaiveDate) -> EvalError {
        EvalError::DateOverflow {
            date,
            lookback: self.to_string(),
        }
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}y{}m{}d", self.years, self.months, self.days)
    }
}

/// An inclusive date interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateInterval {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn overlaps_span(&self, span: &DateSpan) -> bool {
        span.overlaps(self.start, self.end)
    }
}

impl From<MeasurementPeriod> for DateInterval {
    fn from(period: MeasurementPeriod) -> Self {
        let (start, end) = period.as_interval();
        Self { start, end }
    }
}

/// Which dates of a fact a query accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Relevant date inside the interval
    During(DateInterval),
    /// Active span intersects the interval; ongoing facts are open-ended
    Overlaps(DateInterval),
    /// Span end (or relevant date for point facts) inside the interval
    EndsDuring(DateInterval),
    /// Relevant date in `[end - lookback, end]`
    Lookback { end: NaiveDate, lookback: Lookback },
    /// Relevant date on or before the boundary, unbounded below
    OnOrBefore(NaiveDate),
    Any,
}

impl Window {
    /// Check a fact's dates against the window. Facts without the needed
    /// date never match a bounded window.
    pub fn admits(&self, relevant: Option<NaiveDate>, span: Option<DateSpan>) -> EvalResult<bool> {
        Ok(match self {
            Window::Any => true,
            Window::During(interval) => relevant.is_some_and(|d| interval.contains(d)),
            Window::Overlaps(interval) => span.is_some_and(|s| interval.overlaps_span(&s)),
            Window::EndsDuring(interval) => span
                .and_then(|s| s.end)
                .or(relevant)
                .is_some_and(|d| interval.contains(d)),
            Window::Lookback { end, lookback } => match relevant {
                Some(d) => within_lookback(d, *end, *lookback)?,
                None => false,
            },
            Window::OnOrBefore(boundary) => relevant.is_some_and(|d| on_or_before(d, *boundary)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(date(1962, 4, 12), date(2024, 4, 11), 61)]
    #[case(date(1962, 4, 12), date(2024, 4, 12), 62)]
    #[case(date(2000, 2, 29), date(2024, 2, 28), 23)]
    #[case(date(2000, 2, 29), date(2024, 2, 29), 24)]
    #[case(date(2000, 2, 29), date(2023, 3, 1), 23)]
    fn test_age_in_years(#[case] birth: NaiveDate, #[case] reference: NaiveDate, #[case] expected: i32) {
        assert_eq!(age_in_years(birth, reference), expected);
    }

    #[test]
    fn test_lookback_from_leap_day() {
        assert_eq!(Lookback::years(1).before(date(2024, 2, 29)).unwrap(), date(2023, 2, 28));
        assert_eq!(Lookback::months(18).before(date(2024, 12, 31)).unwrap(), date(2023, 6, 30));
    }

    #[test]
    fn test_within_lookback_bounds_inclusive() {
        let end = date(2024, 12, 31);
        let ten = Lookback::years(10);
        assert!(within_lookback(date(2014, 12, 31), end, ten).unwrap());
        assert!(!within_lookback(date(2014, 12, 30), end, ten).unwrap());
        assert!(within_lookback(end, end, ten).unwrap());
        assert!(!within_lookback(date(2025, 1, 1), end, ten).unwrap());
    }

    #[test]
    fn test_lookback_overflow() {
        let err = Lookback::years(u32::MAX / 2).before(date(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, EvalError::DateOverflow { .. }));
    }

    #[test]
    fn test_window_admits() {
        let year = DateInterval::new(date(2024, 1, 1), date(2024, 12, 31));
        let ongoing = DateSpan::open(date(2015, 1, 1));
        assert!(Window::Overlaps(year).admits(Some(date(2015, 1, 1)), Some(ongoing)).unwrap());
        assert!(!Window::During(year).admits(Some(date(2015, 1, 1)), Some(ongoing)).unwrap());
        assert!(Window::OnOrBefore(year.end).admits(Some(date(1999, 1, 1)), None).unwrap());
        assert!(!Window::During(year).admits(None, None).unwrap());
        assert!(Window::Any.admits(None, None).unwrap());

        let stay = DateSpan {
            start: date(2023, 12, 20),
            end: Some(date(2024, 1, 3)),
        };
        assert!(Window::EndsDuring(year).admits(Some(stay.start), Some(stay)).unwrap());
    }

    fn arb_date() -> impl Strategy<Value = NaiveDate> {
        (1900i32..2100, 1u32..=12, 1u32..=28).prop_map(|(y, m, d)| date(y, m, d))
    }

    proptest! {
        #[test]
        fn prop_overlap_is_symmetric(a in arb_date(), b in arb_date(), c in arb_date(), d in arb_date()) {
            let (a1, a2) = (a.min(b), a.max(b));
            let (b1, b2) = (c.min(d), c.max(d));
            prop_assert_eq!(period_overlap(a1, a2, b1, b2), period_overlap(b1, b2, a1, a2));
        }

        #[test]
        fn prop_age_is_monotonic(birth in arb_date(), days in 0u64..40_000, extra in 0u64..400) {
            let earlier = birth + Days::new(days);
            let later = earlier + Days::new(extra);
            prop_assert!(age_in_years(birth, later) >= age_in_years(birth, earlier));
            prop_assert!(age_in_years(birth, earlier) >= 0);
        }

        #[test]
        fn prop_lookback_floor_never_after_end(end in arb_date(), years in 0u32..20, months in 0u32..24) {
            let lookback = Lookback { years, months, days: 0 };
            let floor = lookback.before(end).unwrap();
            prop_assert!(floor <= end);
            prop_assert!(within_lookback(floor, end, lookback).unwrap());
        }
    }
}
