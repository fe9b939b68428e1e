use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A Telegram account that has talked to the bot at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Last observed username; empty until the first name update.
    pub name: String,
    pub registered_at: DateTime<Utc>,
}

/// A single submitted note. Highlights are never edited or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    /// Highlights from everyone.
    pub total: i64,
    /// Highlights from the requesting user.
    pub user_total: i64,
}

/// A calendar month in some viewer time zone.
///
/// Ordering is chronological: year first, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Month {
    pub year: i32,
    /// 1..=12
    pub month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// The month containing `time`, read in `time`'s own zone.
    pub fn of<Tz: TimeZone>(time: &DateTime<Tz>) -> Self {
        Self {
            year: time.year(),
            month: time.month(),
        }
    }

    pub fn next(self) -> Self {
        if self.month < 12 {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        } else {
            Self {
                year: self.year + 1,
                month: 1,
            }
        }
    }

    /// Midnight of the 1st in `tz`, as UTC. `None` if that local time does
    /// not exist in the zone.
    pub fn start_in<Tz: TimeZone>(self, tz: &Tz) -> Option<DateTime<Utc>> {
        tz.with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0)
            .earliest()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Half-open UTC interval `[first of this month, first of next month)`
    /// with both ends computed in `tz`.
    pub fn utc_range_in<Tz: TimeZone>(self, tz: &Tz) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.start_in(tz)?, self.next().start_in(tz)?))
    }

    /// Short label used on grid buttons, e.g. `11.23`.
    pub fn short_label(&self) -> String {
        format!("{}.{:02}", self.month, self.year.rem_euclid(100))
    }
}

/// Callback payload form: `month.year`, e.g. `11.2023`.
impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.month, self.year)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMonthError(pub String);

impl fmt::Display for ParseMonthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid month selector: {:?}", self.0)
    }
}

impl std::error::Error for ParseMonthError {}

impl FromStr for Month {
    type Err = ParseMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseMonthError(s.to_string());
        let (month, year) = s.split_once('.').ok_or_else(err)?;
        let month: u32 = month.parse().map_err(|_| err())?;
        let year: i32 = year.parse().map_err(|_| err())?;
        Month::new(year, month).ok_or_else(err)
    }
}
