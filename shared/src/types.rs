//! Common types used across the platform

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a stored or submitted enum value is not recognised
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Activation state shared by products, categories and users
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActiveStatus {
    #[default]
    Active,
    Inactive,
}

impl ActiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActiveStatus::Active => "active",
            ActiveStatus::Inactive => "inactive",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ActiveStatus::Active)
    }
}

impl FromStr for ActiveStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ActiveStatus::Active),
            "inactive" => Ok(ActiveStatus::Inactive),
            other => Err(ParseEnumError::new("status", other)),
        }
    }
}

impl fmt::Display for ActiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive date range for queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }
}

/// Converts between UTC instants and the calendar day of the business.
///
/// The store operates in a single fixed-offset zone (Lima, UTC-5, no DST), so
/// day boundaries never shift during the year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessClock {
    offset: FixedOffset,
}

impl BusinessClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Build a clock from a whole-hour offset, e.g. `-5` for Lima.
    pub fn from_hours(hours: i32) -> Option<Self> {
        FixedOffset::east_opt(hours * 3600).map(Self::new)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar day of `instant` in business time
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }

    /// The `days` business days ending today, today included
    pub fn last_days(&self, days: i64) -> DateRange {
        let end = self.today();
        DateRange {
            start: end - chrono::Duration::days((days - 1).max(0)),
            end,
        }
    }

    /// First and last instant (UTC) of a business-local day
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        self.range_bounds(DateRange { start: date, end: date })
    }

    /// `[start of range.start, end of range.end]` in UTC
    pub fn range_bounds(&self, range: DateRange) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.at_local(range.start, NaiveTime::MIN);
        let end = self.at_local(range.end, end_of_day());
        (start, end)
    }

    fn at_local(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        // A fixed offset has exactly one mapping for every local time.
        match self.offset.from_local_datetime(&date.and_time(time)) {
            chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
            chrono::LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
            chrono::LocalResult::None => date.and_time(time).and_utc(),
        }
    }
}

impl Default for BusinessClock {
    fn default() -> Self {
        Self {
            offset: FixedOffset::west_opt(5 * 3600).unwrap_or_else(|| Utc.fix()),
        }
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN)
}

/// Number of events on a business-local day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: i64,
}

/// Monetary total on a business-local day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: Decimal,
}

/// Group instants per business-local day, counting them, sorted by date
pub fn count_per_day<I>(clock: &BusinessClock, instants: I) -> Vec<DailyCount>
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let mut counts = std::collections::BTreeMap::new();
    for instant in instants {
        *counts.entry(clock.local_date(instant)).or_insert(0i64) += 1;
    }
    counts
        .into_iter()
        .map(|(date, count)| DailyCount { date, count })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lima() -> BusinessClock {
        BusinessClock::from_hours(-5).unwrap()
    }

    #[test]
    fn test_local_date_crosses_midnight() {
        // 03:00 UTC is still the previous evening in Lima
        let instant = Utc.with_ymd_and_hms(2024, 3, 10, 3, 0, 0).unwrap();
        assert_eq!(
            lima().local_date(instant),
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
        );
    }

    #[test]
    fn test_day_bounds_are_shifted() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let (start, end) = lima().day_bounds(date);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 9, 5, 0, 0).unwrap());
        assert!(end > Utc.with_ymd_and_hms(2024, 3, 10, 4, 59, 59).unwrap());
        assert!(end < Utc.with_ymd_and_hms(2024, 3, 10, 5, 0, 0).unwrap());
    }

    #[test]
    fn test_count_per_day_sorted() {
        let instants = vec![
            Utc.with_ymd_and_hms(2024, 3, 11, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 11, 3, 0, 0).unwrap(), // 10th in Lima
        ];
        let counts = count_per_day(&lima(), instants);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].count, 2);
        assert_eq!(counts[1].count, 1);
    }

    #[test]
    fn test_last_days_includes_today() {
        let clock = BusinessClock::default();
        let range = clock.last_days(30);
        assert_eq!(range.end, clock.today());
        assert_eq!((range.end - range.start).num_days(), 29);
    }

    #[test]
    fn test_date_range_rejects_inverted() {
        let a = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(DateRange::new(a, b).is_none());
        assert!(DateRange::new(b, a).is_some());
    }

    #[test]
    fn test_active_status_roundtrip_strings() {
        assert_eq!("inactive".parse::<ActiveStatus>().unwrap(), ActiveStatus::Inactive);
        assert!("Activado".parse::<ActiveStatus>().is_err());
    }
}
