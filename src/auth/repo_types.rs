use serde::Serialize;
use sqlx::FromRow;

/// Admin account allowed to manage events.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string
}
