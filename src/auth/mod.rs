use crate::state::AppState;
use axum::Router;

mod claims;
mod dto;
pub mod extractors;
pub mod handlers;
mod keystore;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod session;

pub use extractors::AdminSession;
pub use session::{SessionError, SessionService};

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
