use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dates::DateKey;

pub const MAX_PAIN_LEVEL: u8 = 10;

/// Wire value for "no level logged for the selected day".
pub const UNSET_PAIN_LEVEL: i64 = -1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PainLevelError {
    #[error("pain level {0} is out of range (expected 0-{MAX_PAIN_LEVEL})")]
    OutOfRange(i64),
}

/// A logged pain level in `0..=10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct PainLevel(u8);

impl PainLevel {
    pub fn new(level: u8) -> Result<Self, PainLevelError> {
        if level > MAX_PAIN_LEVEL {
            return Err(PainLevelError::OutOfRange(i64::from(level)));
        }
        Ok(Self(level))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for PainLevel {
    type Error = PainLevelError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        u8::try_from(raw)
            .map_err(|_| PainLevelError::OutOfRange(raw))
            .and_then(|level| {
                Self::new(level).map_err(|_| PainLevelError::OutOfRange(raw))
            })
    }
}

impl From<PainLevel> for i64 {
    fn from(level: PainLevel) -> Self {
        i64::from(level.0)
    }
}

impl fmt::Display for PainLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Identity supplied by the session; scopes every store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    /// Blank ids count as "no identity".
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One user's log for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub date: DateKey,
    #[serde(default)]
    pub notes: String,
    pub pain_level: PainLevel,
}

impl Entry {
    pub fn new(date: DateKey, pain_level: PainLevel, notes: impl Into<String>) -> Self {
        Self {
            date,
            notes: notes.into(),
            pain_level,
        }
    }
}

/// Entries for the subscribed month, keyed by day.
pub type MonthEntryCache = BTreeMap<DateKey, Entry>;
