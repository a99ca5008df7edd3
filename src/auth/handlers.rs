use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{dto::LoginRequest, extractors::SESSION_COOKIE, password::verify_password, repo_types::User},
    error::{ApiError, StatusMessage},
    state::AppState,
};

const BAD_CREDENTIALS: &str = "Invalid username or password";

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(StatusCode, CookieJar, Json<StatusMessage>), ApiError> {
    let Json(payload) = payload?;
    let username = payload.username.trim();

    let user = match User::find_by_username(&state.db, username).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(%username, "login unknown username");
            return Err(ApiError::Forbidden(BAD_CREDENTIALS.into()));
        }
        Err(e) => {
            error!(error = %e, "find_by_username failed");
            return Err(ApiError::internal(e));
        }
    };

    let ok = match verify_password(&payload.password, &user.password_hash) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, user_id = user.id, "verify_password failed");
            return Err(ApiError::internal(e));
        }
    };
    if !ok {
        warn!(user_id = user.id, "login invalid password");
        return Err(ApiError::Forbidden(BAD_CREDENTIALS.into()));
    }

    let token = state.sessions.issue_for(&user.username).await?;
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(state.config.session.cookie_max_age_secs));

    info!(user_id = user.id, username = %user.username, "admin logged in");
    Ok((
        StatusCode::ACCEPTED,
        jar.add(cookie),
        StatusMessage::ok("Logged in"),
    ))
}
