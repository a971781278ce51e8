//! Zero-padded `HH:MM:SS` durations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A whole-second duration split into hour, minute and second parts.
///
/// Serialized as its `HH:MM:SS` string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Hms {
    total_secs: u64,
}

impl Hms {
    pub const ZERO: Hms = Hms { total_secs: 0 };

    pub fn from_secs(total_secs: u64) -> Self {
        Self { total_secs }
    }

    pub fn total_secs(&self) -> u64 {
        self.total_secs
    }

    pub fn hours(&self) -> u64 {
        self.total_secs / 3600
    }

    /// Minutes within the hour (0..60).
    pub fn minutes(&self) -> u64 {
        (self.total_secs % 3600) / 60
    }

    /// Seconds within the minute (0..60).
    pub fn seconds(&self) -> u64 {
        self.total_secs % 60
    }

    pub fn hours_padded(&self) -> String {
        format!("{:02}", self.hours())
    }

    pub fn minutes_padded(&self) -> String {
        format!("{:02}", self.minutes())
    }

    pub fn seconds_padded(&self) -> String {
        format!("{:02}", self.seconds())
    }
}

impl fmt::Display for Hms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hours(),
            self.minutes(),
            self.seconds()
        )
    }
}

impl FromStr for Hms {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |message: &str| ValidationError::InvalidValue {
            field: "duration".into(),
            message: format!("'{s}': {message}"),
        };

        let parts: Vec<&str> = s.split(':').collect();
        let [h, m, sec] = parts.as_slice() else {
            return Err(invalid("expected HH:MM:SS"));
        };
        let h: u64 = h.parse().map_err(|_| invalid("hours are not a number"))?;
        let m: u64 = m.parse().map_err(|_| invalid("minutes are not a number"))?;
        let sec: u64 = sec.parse().map_err(|_| invalid("seconds are not a number"))?;
        if m >= 60 || sec >= 60 {
            return Err(invalid("minutes and seconds must be below 60"));
        }
        h.checked_mul(3600)
            .and_then(|total| total.checked_add(m * 60 + sec))
            .map(Hms::from_secs)
            .ok_or_else(|| invalid("hours out of range"))
    }
}

impl From<Hms> for String {
    fn from(value: Hms) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Hms {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
