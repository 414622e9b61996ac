//! Timeframe selection for analytics runs.
//!
//! A [`Timeframe`] is the user-facing description of a window ("2024",
//! "last_6_months", "2024-01-01..2024-03-31"). Resolving it against a reference
//! instant yields a half-open [`TimeRange`] that the store is queried with.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use crate::error::ValidationError;

/// Half-open `[start, end)` range of decision timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    /// Inclusive lower bound.
    pub start: DateTime<Utc>,
    /// Exclusive upper bound.
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvalidTimeframe {
                input: format!("{}..{}", start.to_rfc3339(), end.to_rfc3339()),
                reason: "start is after end".to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Whether a timestamp falls inside the range.
    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        self.start <= *ts && *ts < self.end
    }
}

/// A window of decision history to analyze.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timeframe {
    /// The whole journal.
    All,
    /// One calendar year.
    Year(i32),
    /// One calendar quarter (1-4).
    Quarter {
        /// Calendar year
        year: i32,
        /// Quarter number
        quarter: u32,
    },
    /// The last N days up to the end of the reference day.
    LastDays(u32),
    /// The last N weeks up to the end of the reference day.
    LastWeeks(u32),
    /// The last N calendar months up to the end of the reference day.
    LastMonths(u32),
    /// Explicit dates, both inclusive.
    Between {
        /// First day of the window
        start: NaiveDate,
        /// Last day of the window
        end: NaiveDate,
    },
}

const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9998;

impl Timeframe {
    /// Resolve into a concrete range relative to `now`.
    ///
    /// Relative windows end at the UTC midnight after `now`, so every call made
    /// during the same day resolves to the same range.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<TimeRange, ValidationError> {
        let overflow = || ValidationError::InvalidTimeframe {
            input: self.to_string(),
            reason: "window falls outside the supported date range".to_string(),
        };

        match self {
            Timeframe::All => TimeRange::new(
                midnight(date(MIN_YEAR, 1, 1).ok_or_else(overflow)?),
                midnight(date(MAX_YEAR + 1, 1, 1).ok_or_else(overflow)?),
            ),
            Timeframe::Year(year) => TimeRange::new(
                midnight(date(*year, 1, 1).ok_or_else(overflow)?),
                midnight(date(year + 1, 1, 1).ok_or_else(overflow)?),
            ),
            Timeframe::Quarter { year, quarter } => {
                if !(1..=4).contains(quarter) {
                    return Err(ValidationError::InvalidTimeframe {
                        input: self.to_string(),
                        reason: "quarter must be 1-4".to_string(),
                    });
                }
                let first_month = (quarter - 1) * 3 + 1;
                let start = date(*year, first_month, 1).ok_or_else(overflow)?;
                let end = start
                    .checked_add_months(Months::new(3))
                    .ok_or_else(overflow)?;
                TimeRange::new(midnight(start), midnight(end))
            }
            Timeframe::LastDays(n) => {
                let end = anchor(now).ok_or_else(overflow)?;
                let start = end
                    .checked_sub_signed(Duration::days(i64::from(*n)))
                    .ok_or_else(overflow)?;
                TimeRange::new(start, end)
            }
            Timeframe::LastWeeks(n) => {
                let end = anchor(now).ok_or_else(overflow)?;
                let start = end
                    .checked_sub_signed(Duration::weeks(i64::from(*n)))
                    .ok_or_else(overflow)?;
                TimeRange::new(start, end)
            }
            Timeframe::LastMonths(n) => {
                let end = anchor(now).ok_or_else(overflow)?;
                let start = end
                    .checked_sub_months(Months::new(*n))
                    .ok_or_else(overflow)?;
                TimeRange::new(start, end)
            }
            Timeframe::Between { start, end } => {
                let after_end = end.succ_opt().ok_or_else(overflow)?;
                TimeRange::new(midnight(*start), midnight(after_end))
            }
        }
    }
}

fn date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    if !(MIN_YEAR..=MAX_YEAR + 1).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

fn midnight(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(chrono::NaiveTime::MIN))
}

fn anchor(now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    now.date_naive().succ_opt().map(midnight)
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::All => write!(f, "all"),
            Timeframe::Year(year) => write!(f, "{}", year),
            Timeframe::Quarter { year, quarter } => write!(f, "{}-Q{}", year, quarter),
            Timeframe::LastDays(n) => write!(f, "last_{}_days", n),
            Timeframe::LastWeeks(n) => write!(f, "last_{}_weeks", n),
            Timeframe::LastMonths(12) => write!(f, "last_year"),
            Timeframe::LastMonths(n) => write!(f, "last_{}_months", n),
            Timeframe::Between { start, end } => write!(f, "{}..{}", start, end),
        }
    }
}

impl FromStr for Timeframe {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim().to_lowercase();
        let invalid = |reason: &str| ValidationError::InvalidTimeframe {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        if input == "all" {
            return Ok(Timeframe::All);
        }
        if input == "last_year" {
            return Ok(Timeframe::LastMonths(12));
        }

        if let Some(rest) = input.strip_prefix("last_") {
            let (count, unit) = rest
                .split_once('_')
                .ok_or_else(|| invalid("expected last_<n>_<days|weeks|months>"))?;
            let count: u32 = count
                .parse()
                .map_err(|_| invalid("window length is not a number"))?;
            if count == 0 {
                return Err(invalid("window length must be at least 1"));
            }
            return match unit {
                "day" | "days" => Ok(Timeframe::LastDays(count)),
                "week" | "weeks" => Ok(Timeframe::LastWeeks(count)),
                "month" | "months" => Ok(Timeframe::LastMonths(count)),
                _ => Err(invalid("unit must be days, weeks or months")),
            };
        }

        if let Some((start, end)) = input.split_once("..") {
            let start = NaiveDate::parse_from_str(start.trim(), "%Y-%m-%d")
                .map_err(|_| invalid("start is not a YYYY-MM-DD date"))?;
            let end = NaiveDate::parse_from_str(end.trim(), "%Y-%m-%d")
                .map_err(|_| invalid("end is not a YYYY-MM-DD date"))?;
            if start > end {
                return Err(invalid("start is after end"));
            }
            if !(MIN_YEAR..=MAX_YEAR).contains(&start.year())
                || !(MIN_YEAR..=MAX_YEAR).contains(&end.year())
            {
                return Err(invalid("year is out of range"));
            }
            return Ok(Timeframe::Between { start, end });
        }

        if let Some((year, quarter)) = input.split_once("-q") {
            let year = parse_year(year).ok_or_else(|| invalid("year is out of range"))?;
            let quarter: u32 = quarter
                .parse()
                .map_err(|_| invalid("quarter is not a number"))?;
            if !(1..=4).contains(&quarter) {
                return Err(invalid("quarter must be 1-4"));
            }
            return Ok(Timeframe::Quarter { year, quarter });
        }

        if input.len() == 4 && input.chars().all(|c| c.is_ascii_digit()) {
            let year = parse_year(&input).ok_or_else(|| invalid("year is out of range"))?;
            return Ok(Timeframe::Year(year));
        }

        Err(invalid("unrecognized timeframe"))
    }
}

fn parse_year(s: &str) -> Option<i32> {
    if s.len() != 4 {
        return None;
    }
    s.parse::<i32>()
        .ok()
        .filter(|y| (MIN_YEAR..=MAX_YEAR).contains(y))
}
