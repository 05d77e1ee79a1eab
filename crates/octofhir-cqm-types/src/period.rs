//! Measurement period

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{TypesError, TypesResult};

/// The inclusive date interval a measure is evaluated over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPeriod")]
pub struct MeasurementPeriod {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawPeriod {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawPeriod> for MeasurementPeriod {
    type Error = TypesError;

    fn try_from(raw: RawPeriod) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl MeasurementPeriod {
    /// Create a period, rejecting a start after the end
    pub fn new(start: NaiveDate, end: NaiveDate) -> TypesResult<Self> {
        if start > end {
            return Err(TypesError::InvalidPeriod { start, end });
        }
        Ok(Self { start, end })
    }

    /// January 1 through December 31 of `year`
    pub fn calendar_year(year: i32) -> TypesResult<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| TypesError::date_out_of_range(format!("year {year}")))?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31)
            .ok_or_else(|| TypesError::date_out_of_range(format!("year {year}")))?;
        Self::new(start, end)
    }

    /// The year ending on `now`: one calendar year back through `now`
    pub fn trailing_year(now: NaiveDate) -> TypesResult<Self> {
        let start = now
            .checked_sub_months(Months::new(12))
            .ok_or_else(|| TypesError::date_out_of_range(format!("one year before {now}")))?;
        Self::new(start, now)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// `(start, end)` pair
    pub fn as_interval(&self) -> (NaiveDate, NaiveDate) {
        (self.start, self.end)
    }

    /// Inclusive containment
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Calendar year of the period end, used when reporting
    pub fn reporting_year(&self) -> i32 {
        self.end.year()
    }
}

impl fmt::Display for MeasurementPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_rejects_inverted_period() {
        let err = MeasurementPeriod::new(date(2024, 12, 31), date(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, TypesError::InvalidPeriod { .. }));
    }

    #[test]
    fn test_single_day_period() {
        let period = MeasurementPeriod::new(date(2024, 6, 1), date(2024, 6, 1)).unwrap();
        assert!(period.contains(date(2024, 6, 1)));
        assert!(!period.contains(date(2024, 6, 2)));
    }

    #[test]
    fn test_calendar_year() {
        let period = MeasurementPeriod::calendar_year(2024).unwrap();
        assert_eq!(period.as_interval(), (date(2024, 1, 1), date(2024, 12, 31)));
        assert_eq!(period.to_string(), "[2024-01-01, 2024-12-31]");
    }

    #[test]
    fn test_trailing_year_from_leap_day() {
        let period = MeasurementPeriod::trailing_year(date(2024, 2, 29)).unwrap();
        assert_eq!(period.start(), date(2023, 2, 28));
        assert_eq!(period.end(), date(2024, 2, 29));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: MeasurementPeriod = serde_json::from_str(r#"{"start":"2024-01-01","end":"2024-12-31"}"#).unwrap();
        assert_eq!(ok.reporting_year(), 2024);
        let bad = serde_json::from_str::<MeasurementPeriod>(r#"{"start":"2025-01-01","end":"2024-12-31"}"#);
        assert!(bad.is_err());
    }
}
