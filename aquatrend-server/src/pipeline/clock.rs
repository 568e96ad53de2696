use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wall clock used to decide which hour, day, week and month an instant
/// belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockZone {
    /// The host's local time zone.
    #[default]
    Local,
    Utc,
}

impl ClockZone {
    /// Current wall-clock time.
    pub fn now(self) -> NaiveDateTime {
        self.wall_clock(Utc::now())
    }

    /// Convert an instant into wall-clock time.
    pub fn wall_clock(self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Local => instant.with_timezone(&Local).naive_local(),
            Self::Utc => instant.naive_utc(),
        }
    }
}

impl fmt::Display for ClockZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Utc => f.write_str("utc"),
        }
    }
}

impl FromStr for ClockZone {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "utc" => Ok(Self::Utc),
            other => Err(format!("invalid clock '{other}', expected 'local' or 'utc'")),
        }
    }
}
