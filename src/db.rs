use std::{str::FromStr, time::Duration};

use anyhow::Context;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use tracing::info;

/// Opens the SQLite pool and brings the schema up to date.
pub async fn connect(database_url: &str, busy_timeout: Duration) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("parse DATABASE_URL {database_url:?}"))?
        .create_if_missing(true)
        .busy_timeout(busy_timeout);

    let db = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(busy_timeout * 2)
        .connect_with(options)
        .await
        .context("connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("run migrations")?;

    info!(url = %database_url, "database ready");
    Ok(db)
}

#[cfg(test)]
pub(crate) async fn scratch_pool() -> (tempfile::TempDir, SqlitePool) {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("test.db").display());
    let db = connect(&url, Duration::from_secs(5))
        .await
        .expect("scratch database");
    (dir, db)
}
