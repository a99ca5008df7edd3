//! Wall-clock timestamps for event schedules.
//!
//! Every open/close instant is stored, accepted and printed as
//! `DD/MM/YYYY HH:MM:SS` with no timezone attached.

use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use time::{
    format_description::FormatItem, macros::format_description, Date, Duration,
    PrimitiveDateTime,
};

const EVENT_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[day]/[month]/[year] [hour]:[minute]:[second]");

#[derive(Debug, thiserror::Error)]
#[error("invalid event time {input:?}: expected DD/MM/YYYY HH:MM:SS")]
pub struct EventTimeError {
    input: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventTime(PrimitiveDateTime);

impl EventTime {
    pub fn new(at: PrimitiveDateTime) -> Self {
        Self(at)
    }

    pub fn parse(input: &str) -> Result<Self, EventTimeError> {
        PrimitiveDateTime::parse(input.trim(), EVENT_TIME_FORMAT)
            .map(Self)
            .map_err(|_| EventTimeError {
                input: input.to_string(),
            })
    }

    pub fn as_datetime(&self) -> PrimitiveDateTime {
        self.0
    }

    pub fn date(&self) -> Date {
        self.0.date()
    }

    /// Rounds half-up to the nearest whole minute.
    pub fn rounded_to_minute(&self) -> Self {
        Self(round_to_minute(self.0))
    }

    pub fn hours_before(&self, hours: i64) -> Self {
        Self(self.0 - Duration::hours(hours))
    }
}

/// Half-up minute rounding shared with the scheduler's view of "now".
pub fn round_to_minute(at: PrimitiveDateTime) -> PrimitiveDateTime {
    let into_minute =
        Duration::seconds(at.second() as i64) + Duration::nanoseconds(at.nanosecond() as i64);
    let truncated = at - into_minute;
    if into_minute >= Duration::seconds(30) {
        truncated + Duration::minutes(1)
    } else {
        truncated
    }
}

impl From<PrimitiveDateTime> for EventTime {
    fn from(at: PrimitiveDateTime) -> Self {
        Self(at)
    }
}

impl FromStr for EventTime {
    type Err = EventTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = self.0.format(EVENT_TIME_FORMAT).map_err(|_| fmt::Error)?;
        f.write_str(&formatted)
    }
}

impl Serialize for EventTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EventTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        EventTime::parse(&raw).map_err(de::Error::custom)
    }
}
