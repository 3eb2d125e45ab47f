//! UTC timestamps recorded on event stream entries.
//!
//! Merged histories are ordered by these timestamps. Within one peer's own
//! stream, [`EntryTimestamp::tick`] keeps them strictly increasing even when
//! the wall clock stalls or steps backwards.

use crate::{Error, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A UTC timestamp with microsecond-or-better resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryTimestamp(DateTime<Utc>);

impl EntryTimestamp {
    /// Creates a timestamp at the current time.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Wraps an existing UTC date-time.
    #[must_use]
    pub const fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Creates a timestamp from milliseconds since the Unix epoch.
    pub fn from_millis(millis: i64) -> Result<Self> {
        DateTime::from_timestamp_millis(millis)
            .map(Self)
            .ok_or_else(|| Error::InvalidTimestamp(millis.to_string()))
    }

    /// Returns the underlying date-time.
    #[must_use]
    pub const fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Generates the next timestamp for a local append.
    ///
    /// The result is the current time when that is later than `self`,
    /// otherwise `self` advanced by one microsecond.
    #[must_use]
    pub fn tick(&self) -> Self {
        let now = Utc::now();
        if now > self.0 {
            Self(now)
        } else {
            Self(self.0 + TimeDelta::microseconds(1))
        }
    }
}

impl Default for EntryTimestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for EntryTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl FromStr for EntryTimestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DateTime::parse_from_rfc3339(s)
            .map(|at| Self(at.with_timezone(&Utc)))
            .map_err(|_| Error::InvalidTimestamp(s.to_string()))
    }
}
