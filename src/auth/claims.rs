use serde::{Deserialize, Serialize};

/// Payload of an admin session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    /// Admin username.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}
