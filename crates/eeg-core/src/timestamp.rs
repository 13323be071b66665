//! Window completion timestamps

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use core::fmt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Text format used for every persisted timestamp
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Wall-clock time at which a window completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowTimestamp(DateTime<Local>);

impl WindowTimestamp {
    /// Current local time
    pub fn now() -> Self {
        WindowTimestamp(Local::now())
    }

    /// Wrap an existing time
    pub fn from_datetime(datetime: DateTime<Local>) -> Self {
        WindowTimestamp(datetime)
    }

    /// Parse the persisted text form
    pub fn parse(text: &str) -> Option<Self> {
        let naive = NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).ok()?;
        Local.from_local_datetime(&naive).earliest().map(WindowTimestamp)
    }

    /// Underlying date-time
    pub fn datetime(&self) -> DateTime<Local> {
        self.0
    }
}

impl fmt::Display for WindowTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl Serialize for WindowTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WindowTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        WindowTimestamp::parse(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", text)))
    }
}
