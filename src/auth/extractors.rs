use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::CookieJar;
use tracing::{error, warn};

use super::session::{SessionError, SessionService};
use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "token";

/// Username of the admin behind the `token` cookie.
///
/// Any authentication failure is rejected as a plain 404.
pub struct AdminSession(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
    Arc<SessionService>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = Arc::<SessionService>::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);

        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            warn!(path = %parts.uri.path(), "no session cookie");
            return Err(ApiError::Hidden);
        };

        match sessions.check(cookie.value()).await {
            Ok(claims) => Ok(AdminSession(claims.sub)),
            Err(SessionError::InvalidToken(e)) => {
                warn!(error = %e, path = %parts.uri.path(), "rejected session token");
                Err(ApiError::Hidden)
            }
            Err(e) => {
                error!(error = %e, "[ERR] session key configuration");
                Err(ApiError::internal(e))
            }
        }
    }
}
