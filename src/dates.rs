use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateKeyError {
    #[error("invalid date '{input}', expected YYYY-MM-DD")]
    InvalidDay { input: String },
    #[error("invalid month '{input}', expected YYYY-MM")]
    InvalidMonth { input: String },
}

/// A calendar day in its canonical `YYYY-MM-DD` key form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(Date);

impl DateKey {
    pub fn new(date: Date) -> Self {
        Self(date)
    }

    pub fn today() -> Self {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        Self(now.date())
    }

    pub fn date(self) -> Date {
        self.0
    }

    pub fn parse(input: &str) -> Result<Self, DateKeyError> {
        let trimmed = input.trim();
        Date::parse(trimmed, format_description!("[year]-[month]-[day]"))
            .map(Self)
            .map_err(|_| DateKeyError::InvalidDay {
                input: trimmed.to_string(),
            })
    }

    /// Short chart label, e.g. `Oct 7`.
    pub fn label(self) -> String {
        let month = self.0.month().to_string();
        let short: String = month.chars().take(3).collect();
        format!("{short} {}", self.0.day())
    }

    pub fn offset_days(self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl FromStr for DateKey {
    type Err = DateKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Date> for DateKey {
    fn from(date: Date) -> Self {
        Self(date)
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Inclusive `[first day, last day]` span of one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRange {
    start: DateKey,
    end: DateKey,
}

impl MonthRange {
    pub fn containing(day: DateKey) -> Self {
        let date = day.date();
        let start = date - Duration::days(i64::from(date.day()) - 1);
        let len = time::util::days_in_year_month(date.year(), date.month());
        let end = start + Duration::days(i64::from(len) - 1);
        Self {
            start: DateKey(start),
            end: DateKey(end),
        }
    }

    /// Parses `YYYY-MM`.
    pub fn parse(input: &str) -> Result<Self, DateKeyError> {
        let trimmed = input.trim();
        let day = DateKey::parse(&format!("{trimmed}-01")).map_err(|_| {
            DateKeyError::InvalidMonth {
                input: trimmed.to_string(),
            }
        })?;
        Ok(Self::containing(day))
    }

    pub fn start(&self) -> DateKey {
        self.start
    }

    pub fn end(&self) -> DateKey {
        self.end
    }

    pub fn contains(&self, day: DateKey) -> bool {
        self.start <= day && day <= self.end
    }

    pub fn next(&self) -> Self {
        Self::containing(self.end.offset_days(1))
    }

    pub fn previous(&self) -> Self {
        Self::containing(self.start.offset_days(-1))
    }

    pub fn days(&self) -> impl Iterator<Item = DateKey> {
        let start = self.start;
        let len = (self.end.date() - self.start.date()).whole_days() + 1;
        (0..len).map(move |offset| start.offset_days(offset))
    }

    /// `October 2026`
    pub fn title(&self) -> String {
        let date = self.start.date();
        format!("{} {}", date.month(), date.year())
    }
}

impl fmt::Display for MonthRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self.start.date();
        write!(f, "{:04}-{:02}", date.year(), u8::from(date.month()))
    }
}

impl FromStr for MonthRange {
    type Err = DateKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
