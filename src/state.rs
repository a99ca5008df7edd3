use std::{sync::Arc, time::Duration};

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::{
    auth::SessionService,
    clock::{Clock, SystemClock},
    config::AppConfig,
    db,
    events::{EventStore, SqliteEventStore},
};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub events: Arc<dyn EventStore>,
    pub sessions: Arc<SessionService>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Connects the database and generates this process's session key.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let db = db::connect(
            &config.database_url,
            Duration::from_secs(config.db_busy_timeout_secs),
        )
        .await?;
        let sessions = Arc::new(SessionService::initialize(&config.session)?);
        let clock = Arc::new(SystemClock::new(config.scheduler.utc_offset)) as Arc<dyn Clock>;
        Ok(Self::from_parts(db, config, sessions, clock))
    }

    pub fn from_parts(
        db: SqlitePool,
        config: Arc<AppConfig>,
        sessions: Arc<SessionService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let events = Arc::new(SqliteEventStore::new(db.clone())) as Arc<dyn EventStore>;
        Self {
            db,
            config,
            events,
            sessions,
            clock,
        }
    }
}

impl FromRef<AppState> for Arc<SessionService> {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}
