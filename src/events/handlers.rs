use axum::{
    extract::{rejection::JsonRejection, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::AdminSession,
    error::{ApiError, StatusMessage},
    state::AppState,
};

use super::{
    dto::{parse_id, require_id, EventQuery, ParticipantQuery, PublicEventView},
    repo::StoreError,
    repo_types::{Event, EventDraft, Participant},
    services::{register, RegistrationRequest},
};

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EventNotFound(_) => ApiError::NotFound("Event not found".into()),
            StoreError::ParticipantNotFound(_) => {
                ApiError::NotFound("Participant not found".into())
            }
            StoreError::NoSeats | StoreError::DuplicateName | StoreError::EventClosed => {
                ApiError::Forbidden(err.to_string())
            }
            StoreError::SeatsBelowTaken { .. } | StoreError::Invalid(_) => {
                ApiError::BadRequest(err.to_string())
            }
            StoreError::CorruptRow { .. } | StoreError::Database(_) => ApiError::internal(err),
        }
    }
}

/// `GET /event` and `POST /register` are public; everything else needs an admin session.
pub fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/event", get(get_public_event).delete(delete_event))
        .route("/events", get(list_events).post(create_event).put(update_event))
        .route("/participants", get(list_participants))
        .route("/participant", delete(delete_participant))
        .route("/register", post(register_participant))
}

#[instrument(skip(state))]
pub async fn get_public_event(
    State(state): State<AppState>,
    Query(q): Query<EventQuery>,
) -> Result<Json<PublicEventView>, ApiError> {
    let Some(id) = parse_id(&q.event) else {
        warn!(raw = %q.event, "malformed event id");
        return Err(ApiError::NotFound("Event not found".into()));
    };
    let event = state.events.get(id).await?;
    Ok(Json(event.into()))
}

#[instrument(skip(state, payload))]
pub async fn register_participant(
    State(state): State<AppState>,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> Result<Json<StatusMessage>, ApiError> {
    let Json(req) = payload?;
    match register(state.events.as_ref(), state.clock.as_ref(), &req).await {
        Ok(_) => Ok(StatusMessage::ok("Registration successful")),
        Err(e) => {
            warn!(event_id = req.event_id, error = %e, "registration refused");
            Err(e.into())
        }
    }
}

#[instrument(skip(state, _admin))]
pub async fn list_events(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Result<Json<Vec<Event>>, ApiError> {
    Ok(Json(state.events.list().await?))
}

#[instrument(skip(state, admin, payload))]
pub async fn create_event(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    payload: Result<Json<EventDraft>, JsonRejection>,
) -> Result<Json<StatusMessage>, ApiError> {
    let Json(draft) = payload?;
    let event = state.events.create(&draft).await?;
    info!(event_id = event.id, %admin, "event created");
    Ok(StatusMessage::ok(format!("Event {} created", event.id)))
}

#[instrument(skip(state, admin, payload))]
pub async fn update_event(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Query(q): Query<EventQuery>,
    payload: Result<Json<EventDraft>, JsonRejection>,
) -> Result<Json<StatusMessage>, ApiError> {
    let id = require_id(&q.event, "event")?;
    let Json(draft) = payload?;
    state.events.update(id, &draft).await?;
    info!(event_id = id, %admin, "event updated");
    Ok(StatusMessage::ok(format!("Event {id} updated")))
}

#[instrument(skip(state, admin))]
pub async fn delete_event(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Query(q): Query<EventQuery>,
) -> Result<Json<StatusMessage>, ApiError> {
    let id = require_id(&q.event, "event")?;
    state.events.delete(id).await?;
    info!(event_id = id, %admin, "event deleted");
    Ok(StatusMessage::ok(format!("Event {id} deleted")))
}

#[instrument(skip(state, _admin))]
pub async fn list_participants(
    State(state): State<AppState>,
    _admin: AdminSession,
    Query(q): Query<EventQuery>,
) -> Result<Json<Vec<Participant>>, ApiError> {
    let id = require_id(&q.event, "event")?;
    // 404 for an unknown event rather than an empty roster.
    state.events.get(id).await?;
    Ok(Json(state.events.participants(id).await?))
}

#[instrument(skip(state, admin))]
pub async fn delete_participant(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Query(q): Query<ParticipantQuery>,
) -> Result<Json<StatusMessage>, ApiError> {
    let id = require_id(&q.participant, "participant")?;
    let removed = state.events.delete_participant(id).await?;
    info!(
        participant_id = id,
        event_id = removed.event_id,
        %admin,
        "participant removed"
    );
    Ok(StatusMessage::ok(format!(
        "Removed {} {}",
        removed.first_name, removed.surname
    )))
}
