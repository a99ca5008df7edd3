use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::event_time::{EventTime, EventTimeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[repr(i32)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Scheduled = 0,
    Closed = 1,
}

impl Default for EventStatus {
    fn default() -> Self {
        Self::Scheduled
    }
}

/// Raw `events` row; schedule columns are still text.
#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub event_id: i64,
    pub event_location: String,
    pub event_date: String,
    pub meet_location: String,
    pub meet_time: String,
    pub total_seats: i64,
    pub seats_taken: i64,
    pub require_member: bool,
    pub open_datetime: String,
    pub close_datetime: String,
    pub event_status: EventStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    #[serde(rename = "event_id")]
    pub id: i64,
    #[serde(rename = "session_location")]
    pub location: String,
    #[serde(rename = "session_date")]
    pub date: String,
    #[serde(rename = "meet_point")]
    pub meet_location: String,
    pub meet_time: String,
    pub total_seats: i64,
    pub seats_taken: i64,
    pub require_member: bool,
    #[serde(rename = "open_date")]
    pub opens: EventTime,
    #[serde(rename = "close_date")]
    pub closes: EventTime,
    #[serde(rename = "event_status")]
    pub status: EventStatus,
}

impl Event {
    pub fn remaining_seats(&self) -> i64 {
        (self.total_seats - self.seats_taken).max(0)
    }

    pub fn is_full(&self) -> bool {
        self.remaining_seats() == 0
    }

    /// Registration window is `[opens, closes)`.
    pub fn is_open_at(&self, now: PrimitiveDateTime) -> bool {
        self.opens.as_datetime() <= now && now < self.closes.as_datetime()
    }

    pub fn is_closed(&self) -> bool {
        self.status == EventStatus::Closed
    }

    pub fn registration_link(&self, public_url: &str) -> String {
        format!("{}/register?event={}", public_url, self.id)
    }
}

impl TryFrom<EventRow> for Event {
    type Error = EventTimeError;

    fn try_from(r: EventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.event_id,
            location: r.event_location,
            date: r.event_date,
            meet_location: r.meet_location,
            meet_time: r.meet_time,
            total_seats: r.total_seats,
            seats_taken: r.seats_taken,
            require_member: r.require_member,
            opens: EventTime::parse(&r.open_datetime)?,
            closes: EventTime::parse(&r.close_datetime)?,
            status: r.event_status,
        })
    }
}

/// Admin-supplied event fields for create and full-replace update.
#[derive(Debug, Clone, Deserialize)]
pub struct EventDraft {
    #[serde(rename = "session_location")]
    pub location: String,
    #[serde(rename = "session_date")]
    pub date: String,
    #[serde(rename = "meet_point")]
    pub meet_location: String,
    pub meet_time: String,
    pub total_seats: i64,
    #[serde(default)]
    pub require_member: bool,
    #[serde(rename = "open_date")]
    pub opens: EventTime,
    #[serde(rename = "close_date")]
    pub closes: EventTime,
    #[serde(rename = "event_status", default)]
    pub status: Option<EventStatus>,
}

impl EventDraft {
    pub fn validate(&self) -> Result<(), String> {
        if self.total_seats < 0 {
            return Err("Total seats cannot be negative".into());
        }
        if self.opens >= self.closes {
            return Err("Registration must open before it closes".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Participant {
    pub participant_id: i64,
    pub event_id: i64,
    pub first_name: String,
    #[serde(rename = "last_name")]
    pub surname: String,
    pub member: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParticipant {
    pub first_name: String,
    pub surname: String,
    pub member: bool,
}
