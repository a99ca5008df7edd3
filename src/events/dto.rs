use serde::{Deserialize, Serialize};

use crate::{error::ApiError, event_time::EventTime};

use super::repo_types::Event;

/// What an anonymous visitor sees of an event.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicEventView {
    pub event_id: i64,
    pub session_location: String,
    pub session_date: String,
    pub meet_time: String,
    pub meet_point: String,
    /// Seats still available.
    pub current_seats: i64,
    pub total_seats: i64,
    pub require_member: bool,
    pub open_date: EventTime,
    pub close_date: EventTime,
}

impl From<Event> for PublicEventView {
    fn from(e: Event) -> Self {
        Self {
            event_id: e.id,
            current_seats: e.remaining_seats(),
            session_location: e.location,
            session_date: e.date,
            meet_time: e.meet_time,
            meet_point: e.meet_location,
            total_seats: e.total_seats,
            require_member: e.require_member,
            open_date: e.opens,
            close_date: e.closes,
        }
    }
}

/// `?event=ID`
#[derive(Debug, Deserialize)]
pub struct EventQuery {
    #[serde(default)]
    pub event: String,
}

/// `?participant=ID`
#[derive(Debug, Deserialize)]
pub struct ParticipantQuery {
    #[serde(default)]
    pub participant: String,
}

pub fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id > 0)
}

/// Admin routes reject a malformed id as bad input.
pub fn require_id(raw: &str, what: &str) -> Result<i64, ApiError> {
    parse_id(raw).ok_or_else(|| ApiError::BadRequest(format!("Invalid {what} id")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::repo_types::{EventRow, EventStatus};

    #[test]
    fn ids_must_be_positive_integers() {
        assert_eq!(parse_id("12"), Some(12));
        assert_eq!(parse_id(" 7 "), Some(7));
        assert_eq!(parse_id("0"), None);
        assert_eq!(parse_id("-3"), None);
        assert_eq!(parse_id("abc"), None);
        assert_eq!(parse_id(""), None);
        assert!(matches!(require_id("x", "event"), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn public_view_reports_remaining_seats() {
        let event = Event::try_from(EventRow {
            event_id: 9,
            event_location: "Depot".into(),
            event_date: "12/04/2025".into(),
            meet_location: "Library steps".into(),
            meet_time: "17:30".into(),
            total_seats: 12,
            seats_taken: 5,
            require_member: false,
            open_datetime: "01/04/2025 09:00:00".into(),
            close_datetime: "10/04/2025 18:00:00".into(),
            event_status: EventStatus::Scheduled,
        })
        .unwrap();

        let json = serde_json::to_value(PublicEventView::from(event)).unwrap();
        assert_eq!(json["current_seats"], 7);
        assert_eq!(json["total_seats"], 12);
        assert_eq!(json["meet_point"], "Library steps");
        assert_eq!(json["close_date"], "10/04/2025 18:00:00");
        assert!(json.get("seats_taken").is_none());
        assert!(json.get("event_status").is_none());
    }
}
