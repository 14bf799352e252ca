//! Date types with variable precision.
//!
//! Catalog dates are frequently known only to the year or month. `PartialDate`
//! keeps that precision intact and renders in a form accepted by the
//! `date_optional_time` format, so `1987`, `1987-05` and `1987-05-03` are all
//! valid range bounds in the search index. Bounds read back with a time of day
//! are truncated to their date.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A calendar date known to year, month or day precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartialDate {
    /// Year only, e.g. `1987`.
    Year(i32),
    /// Year and month, e.g. `1987-05`.
    YearMonth(i32, u32),
    /// A full calendar day.
    Day(NaiveDate),
}

impl PartialDate {
    /// The first calendar day covered by this date.
    pub fn first_day(&self) -> Option<NaiveDate> {
        match *self {
            PartialDate::Year(year) => NaiveDate::from_ymd_opt(year, 1, 1),
            PartialDate::YearMonth(year, month) => NaiveDate::from_ymd_opt(year, month, 1),
            PartialDate::Day(day) => Some(day),
        }
    }

    /// The last calendar day covered by this date.
    pub fn last_day(&self) -> Option<NaiveDate> {
        match *self {
            PartialDate::Year(year) => NaiveDate::from_ymd_opt(year, 12, 31),
            PartialDate::YearMonth(year, month) => {
                let (next_year, next_month) = if month == 12 {
                    (year + 1, 1)
                } else {
                    (year, month + 1)
                };
                NaiveDate::from_ymd_opt(next_year, next_month, 1).and_then(|d| d.pred_opt())
            }
            PartialDate::Day(day) => Some(day),
        }
    }
}

/// Four-digit year, with a leading `-` before the zero padding when negative.
fn write_year(f: &mut fmt::Formatter<'_>, year: i32) -> fmt::Result {
    if year < 0 {
        write!(f, "-{:04}", year.unsigned_abs())
    } else {
        write!(f, "{:04}", year)
    }
}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartialDate::Year(year) => write_year(f, *year),
            PartialDate::YearMonth(year, month) => {
                write_year(f, *year)?;
                write!(f, "-{:02}", month)
            }
            PartialDate::Day(day) => {
                write_year(f, day.year())?;
                write!(f, "-{:02}-{:02}", day.month(), day.day())
            }
        }
    }
}

/// Error returned when a string is not a valid partial date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePartialDateError(pub String);

impl fmt::Display for ParsePartialDateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid partial date: {}", self.0)
    }
}

impl std::error::Error for ParsePartialDateError {}

impl FromStr for PartialDate {
    type Err = ParsePartialDateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || ParsePartialDateError(trimmed.to_string());

        // `1922-01-01T00:00:00Z` keeps only its date
        let (date, has_time) = match trimmed.split_once(['T', ' ']) {
            Some((date, _)) => (date, true),
            None => (trimmed, false),
        };
        let (negative, unsigned) = match date.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, date),
        };

        let number = |raw: &str| -> Result<u32, ParsePartialDateError> {
            if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            raw.parse::<u32>().map_err(|_| invalid())
        };
        let year = |raw: &str| -> Result<i32, ParsePartialDateError> {
            let year = i32::try_from(number(raw)?).map_err(|_| invalid())?;
            Ok(if negative { -year } else { year })
        };

        let parts: Vec<&str> = unsigned.split('-').collect();

        match parts.as_slice() {
            [y] if !has_time => Ok(PartialDate::Year(year(y)?)),
            [y, m] if !has_time => {
                let month = number(m)?;
                if !(1..=12).contains(&month) {
                    return Err(invalid());
                }
                Ok(PartialDate::YearMonth(year(y)?, month))
            }
            [y, m, d] => NaiveDate::from_ymd_opt(year(y)?, number(m)?, number(d)?)
                .map(PartialDate::Day)
                .ok_or_else(invalid),
            _ => Err(invalid()),
        }
    }
}

impl Serialize for PartialDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PartialDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A closed or half-open date interval as stored in the search index.
///
/// Serializes to the `{"gte": .., "lte": ..}` shape of a `date_range` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub gte: Option<PartialDate>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub lte: Option<PartialDate>,
}

impl DateRange {
    /// Create a range from its bounds.
    pub fn new(gte: Option<PartialDate>, lte: Option<PartialDate>) -> Self {
        Self { gte, lte }
    }

    /// A range covering a single value, lower and upper both equal to it.
    pub fn single(date: PartialDate) -> Self {
        Self {
            gte: Some(date),
            lte: Some(date),
        }
    }

    /// Whether both bounds are open.
    pub fn is_unbounded(&self) -> bool {
        self.gte.is_none() && self.lte.is_none()
    }

    /// Whether the lower bound starts after the upper bound ends.
    pub fn is_inverted(&self) -> bool {
        match (
            self.gte.and_then(|d| d.first_day()),
            self.lte.and_then(|d| d.last_day()),
        ) {
            (Some(lower), Some(upper)) => lower > upper,
            _ => false,
        }
    }
}
