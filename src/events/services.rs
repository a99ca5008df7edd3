use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use super::{
    repo::{EventStore, StoreError},
    repo_types::{NewParticipant, Participant},
};
use crate::{clock::Clock, error::ApiError};

/// Public registration form body.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationRequest {
    pub name: String,
    #[serde(default)]
    pub member: bool,
    #[serde(rename = "event")]
    pub event_id: i64,
}

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Invalid name, please enter your first and last name")]
    InvalidName,
    #[error("Event not found")]
    EventNotFound,
    #[error("The event is not currently open for registration")]
    NotOpen,
    #[error("This event requires you to have paid membership fees")]
    MembershipRequired,
    #[error("There are no seats available for this event")]
    NoSeats,
    #[error("Someone with this name is already registered for this event")]
    DuplicateName,
    #[error("Registration for this event has closed")]
    EventClosed,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for RegistrationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EventNotFound(_) => Self::EventNotFound,
            StoreError::NoSeats => Self::NoSeats,
            StoreError::DuplicateName => Self::DuplicateName,
            StoreError::EventClosed => Self::EventClosed,
            other => Self::Store(other),
        }
    }
}

impl From<RegistrationError> for ApiError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::InvalidName => ApiError::BadRequest(err.to_string()),
            RegistrationError::EventNotFound => ApiError::NotFound(err.to_string()),
            RegistrationError::Store(inner) => ApiError::internal(inner),
            RegistrationError::NotOpen
            | RegistrationError::MembershipRequired
            | RegistrationError::NoSeats
            | RegistrationError::DuplicateName
            | RegistrationError::EventClosed => ApiError::Forbidden(err.to_string()),
        }
    }
}

/// Two or more words; each word may be hyphen-compound and carry inner apostrophes.
pub fn is_valid_name(name: &str) -> bool {
    lazy_static! {
        static ref NAME_RE: Regex =
            Regex::new(r"^[a-z]+('[a-z]+)*(-[a-z]+('[a-z]+)*)*( [a-z]+('[a-z]+)*(-[a-z]+('[a-z]+)*)*)+$")
                .unwrap();
    }
    NAME_RE.is_match(&name.trim().to_lowercase())
}

/// Upper-cases the first letter of each space-separated word and lowers the rest.
/// "o'BRIEN-smith" becomes "O'brien-smith".
pub fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// First word is the first name; the rest is the surname.
pub fn split_name(name: &str) -> (String, String) {
    let mut words = name.split_whitespace();
    let first = words.next().unwrap_or_default().to_string();
    let surname = words.collect::<Vec<_>>().join(" ");
    (first, surname)
}

pub async fn register(
    store: &dyn EventStore,
    clock: &dyn Clock,
    req: &RegistrationRequest,
) -> Result<Participant, RegistrationError> {
    if !is_valid_name(&req.name) {
        return Err(RegistrationError::InvalidName);
    }

    let event = store.get(req.event_id).await?;

    if !event.is_open_at(clock.now()) {
        return Err(RegistrationError::NotOpen);
    }
    if event.require_member && !req.member {
        return Err(RegistrationError::MembershipRequired);
    }
    if event.is_full() {
        return Err(RegistrationError::NoSeats);
    }

    let (first_name, surname) = split_name(&title_case(&req.name));
    debug!(event_id = event.id, %first_name, %surname, "registering");

    let participant = store
        .add_participant(
            event.id,
            &NewParticipant {
                first_name,
                surname,
                member: req.member,
            },
        )
        .await?;

    info!(
        event_id = event.id,
        participant_id = participant.participant_id,
        "participant registered"
    );
    Ok(participant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::FixedClock,
        db::scratch_pool,
        events::{repo::tests::draft, repo::SqliteEventStore},
    };
    use time::macros::datetime;

    #[test]
    fn name_rules() {
        assert!(is_valid_name("John Smith"));
        assert!(is_valid_name("john smith-jones"));
        assert!(is_valid_name("Mary Ann Smith"));
        assert!(is_valid_name("John O'Brien-Smith"));
        assert!(is_valid_name("  Ada Lovelace "));
        assert!(!is_valid_name("john"));
        assert!(!is_valid_name("John  Smith"));
        assert!(!is_valid_name("John Smith3"));
        assert!(!is_valid_name("John -Smith"));
        assert!(!is_valid_name("John 'Smith"));
        assert!(!is_valid_name(""));
    }

    #[test]
    fn normalizes_and_splits() {
        let (first, last) = split_name(&title_case("John O'Brien-Smith"));
        assert_eq!(first, "John");
        assert_eq!(last, "O'brien-smith");

        let (first, last) = split_name(&title_case("mary ANN smith"));
        assert_eq!(first, "Mary");
        assert_eq!(last, "Ann Smith");
    }

    fn request(name: &str, member: bool, event_id: i64) -> RegistrationRequest {
        RegistrationRequest {
            name: name.into(),
            member,
            event_id,
        }
    }

    const DURING: FixedClock = FixedClock(datetime!(2025-01-01 12:00));

    #[tokio::test]
    async fn registers_and_normalizes() {
        let (_dir, db) = scratch_pool().await;
        let store = SqliteEventStore::new(db);
        let event = store.create(&draft(10)).await.unwrap();

        let p = register(&store, &DURING, &request("ada lovelace", false, event.id))
            .await
            .unwrap();
        assert_eq!(p.first_name, "Ada");
        assert_eq!(p.surname, "Lovelace");
        assert_eq!(store.get(event.id).await.unwrap().seats_taken, 1);
    }

    #[tokio::test]
    async fn gates_run_in_order() {
        let (_dir, db) = scratch_pool().await;
        let store = SqliteEventStore::new(db);
        let mut members_only = draft(10);
        members_only.require_member = true;
        let event = store.create(&members_only).await.unwrap();

        let err = register(&store, &DURING, &request("john", true, 999)).await.unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidName));

        let err = register(&store, &DURING, &request("John Smith", true, 999))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::EventNotFound));

        let before = FixedClock(datetime!(2024-12-31 23:59:59));
        let err = register(&store, &before, &request("John Smith", true, event.id))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::NotOpen));

        let at_close = FixedClock(datetime!(2025-01-01 23:59:59));
        let err = register(&store, &at_close, &request("John Smith", true, event.id))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::NotOpen));

        let err = register(&store, &DURING, &request("John Smith", false, event.id))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::MembershipRequired));

        assert_eq!(store.get(event.id).await.unwrap().seats_taken, 0);
    }

    #[tokio::test]
    async fn full_event_is_refused_without_mutation() {
        let (_dir, db) = scratch_pool().await;
        let store = SqliteEventStore::new(db);
        let event = store.create(&draft(1)).await.unwrap();
        register(&store, &DURING, &request("Ada Lovelace", true, event.id))
            .await
            .unwrap();

        let err = register(&store, &DURING, &request("Alan Turing", true, event.id))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::NoSeats));
        assert_eq!(store.participants(event.id).await.unwrap().len(), 1);
        assert_eq!(store.get(event.id).await.unwrap().seats_taken, 1);
    }

    #[tokio::test]
    async fn same_name_twice_is_refused() {
        let (_dir, db) = scratch_pool().await;
        let store = SqliteEventStore::new(db);
        let event = store.create(&draft(5)).await.unwrap();
        register(&store, &DURING, &request("Ada Lovelace", true, event.id))
            .await
            .unwrap();

        let err = register(&store, &DURING, &request("ADA LOVELACE", true, event.id))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateName));
    }

    #[tokio::test]
    async fn closed_event_refuses_even_inside_window() {
        let (_dir, db) = scratch_pool().await;
        let store = SqliteEventStore::new(db);
        let event = store.create(&draft(5)).await.unwrap();
        store.close_event(event.id).await.unwrap();

        let err = register(&store, &DURING, &request("Ada Lovelace", true, event.id))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::EventClosed));
    }

    #[test]
    fn maps_to_http_classes() {
        use axum::{http::StatusCode, response::IntoResponse};
        let status = |e: RegistrationError| ApiError::from(e).into_response().status();
        assert_eq!(status(RegistrationError::InvalidName), StatusCode::BAD_REQUEST);
        assert_eq!(status(RegistrationError::EventNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status(RegistrationError::NoSeats), StatusCode::FORBIDDEN);
        assert_eq!(status(RegistrationError::MembershipRequired), StatusCode::FORBIDDEN);
        assert_eq!(status(RegistrationError::EventClosed), StatusCode::FORBIDDEN);
        assert_eq!(
            status(RegistrationError::Store(StoreError::Invalid("x".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
