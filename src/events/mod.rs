mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub use repo::{EventStore, SqliteEventStore, StoreError};
pub use repo_types::{Event, EventDraft, EventStatus, NewParticipant, Participant};

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::event_routes())
}
