use std::{path::PathBuf, sync::Arc};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

use super::{claims::Claims, keystore};
use crate::{config::SessionConfig, error::ApiError};

#[derive(Error, Debug)]
pub enum SessionError {
    /// The key blob is missing, unreadable or will not decrypt.
    #[error("session key material unavailable: {0}")]
    KeyMaterial(String),
    #[error("could not sign session token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("invalid session token: {0}")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),
    #[error("session task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidToken(_) => ApiError::Hidden,
            other => ApiError::internal(other),
        }
    }
}

/// Issues and checks admin session tokens.
///
/// The signing key exists only as an encrypted blob on disk; the passphrase
/// that opens it lives in this process. Every restart generates a fresh pair,
/// so earlier tokens stop validating.
pub struct SessionService {
    key_file: PathBuf,
    passphrase: String,
    issuer: String,
    ttl: Duration,
}

impl SessionService {
    pub fn initialize(config: &SessionConfig) -> Result<Self, SessionError> {
        let passphrase = keystore::generate_passphrase();
        let blob = keystore::seal(&passphrase, &keystore::generate_signing_key())?;
        keystore::write_blob(&config.key_file, &blob)?;
        info!(key_file = %config.key_file.display(), "session key generated");

        Ok(Self {
            key_file: config.key_file.clone(),
            passphrase,
            issuer: config.issuer.clone(),
            ttl: Duration::hours(config.ttl_hours),
        })
    }

    fn signing_key(&self) -> Result<Vec<u8>, SessionError> {
        let blob = keystore::read_blob(&self.key_file)?;
        keystore::open(&self.passphrase, &blob)
    }

    pub fn issue(&self, username: &str) -> Result<String, SessionError> {
        self.issue_at(username, OffsetDateTime::now_utc())
    }

    pub fn issue_at(&self, username: &str, at: OffsetDateTime) -> Result<String, SessionError> {
        let key = self.signing_key()?;
        let claims = Claims {
            iss: self.issuer.clone(),
            sub: username.to_string(),
            iat: at.unix_timestamp(),
            exp: (at + self.ttl).unix_timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&key),
        )
        .map_err(SessionError::Signing)?;
        debug!(username, "session token issued");
        Ok(token)
    }

    pub fn validate(&self, token: &str) -> Result<Claims, SessionError> {
        let key = self.signing_key()?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let data = decode::<Claims>(token, &DecodingKey::from_secret(&key), &validation)
            .map_err(SessionError::InvalidToken)?;
        Ok(data.claims)
    }

    /// `issue` on the blocking pool, for async callers. Reads the key file.
    pub async fn issue_for(self: &Arc<Self>, username: &str) -> Result<String, SessionError> {
        let sessions = Arc::clone(self);
        let username = username.to_string();
        tokio::task::spawn_blocking(move || sessions.issue(&username)).await?
    }

    /// `validate` on the blocking pool.
    pub async fn check(self: &Arc<Self>, token: &str) -> Result<Claims, SessionError> {
        let sessions = Arc::clone(self);
        let token = token.to_string();
        tokio::task::spawn_blocking(move || sessions.validate(&token)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(dir: &tempfile::TempDir) -> SessionService {
        SessionService::initialize(&SessionConfig {
            key_file: dir.path().join("token.dat"),
            issuer: "climbing-seats".into(),
            ttl_hours: 6,
            cookie_max_age_secs: 3600,
        })
        .unwrap()
    }

    #[test]
    fn issued_token_validates() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = service(&dir);
        let token = sessions.issue("admin").unwrap();
        let claims = sessions.validate(&token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.iss, "climbing-seats");
        assert_eq!(claims.exp - claims.iat, 6 * 3600);
    }

    #[test]
    fn expiry_is_six_hours() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = service(&dir);
        let now = OffsetDateTime::now_utc();

        let fresh = sessions
            .issue_at("admin", now - Duration::hours(5) - Duration::minutes(59))
            .unwrap();
        assert!(sessions.validate(&fresh).is_ok());

        let stale = sessions
            .issue_at("admin", now - Duration::hours(6) - Duration::minutes(1))
            .unwrap();
        assert!(matches!(
            sessions.validate(&stale),
            Err(SessionError::InvalidToken(_))
        ));
    }

    #[test]
    fn restart_invalidates_old_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let before = service(&dir);
        let token = before.issue("admin").unwrap();

        let after = service(&dir);
        assert!(matches!(after.validate(&token), Err(SessionError::InvalidToken(_))));
        // The old process can no longer open the replaced blob.
        assert!(matches!(before.validate(&token), Err(SessionError::KeyMaterial(_))));
    }

    #[test]
    fn other_algorithms_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = service(&dir);
        let key = sessions.signing_key().unwrap();
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            iss: "climbing-seats".into(),
            sub: "admin".into(),
            iat: now.unix_timestamp(),
            exp: (now + Duration::hours(1)).unix_timestamp(),
        };
        let hs512 = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(&key),
        )
        .unwrap();
        assert!(matches!(
            sessions.validate(&hs512),
            Err(SessionError::InvalidToken(_))
        ));
    }

    #[test]
    fn wrong_issuer_and_garbage_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = service(&dir);
        let key = sessions.signing_key().unwrap();
        let now = OffsetDateTime::now_utc();
        let foreign = encode(
            &Header::new(Algorithm::HS256),
            &Claims {
                iss: "someone-else".into(),
                sub: "admin".into(),
                iat: now.unix_timestamp(),
                exp: (now + Duration::hours(1)).unix_timestamp(),
            },
            &EncodingKey::from_secret(&key),
        )
        .unwrap();
        assert!(sessions.validate(&foreign).is_err());
        assert!(sessions.validate("not.a.token").is_err());
    }

    #[tokio::test]
    async fn blocking_pool_variants_match_sync_ones() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = Arc::new(service(&dir));
        let token = sessions.issue_for("admin").await.unwrap();
        assert_eq!(sessions.check(&token).await.unwrap().sub, "admin");
        assert!(matches!(
            sessions.check("not.a.token").await,
            Err(SessionError::InvalidToken(_))
        ));

        std::fs::remove_file(dir.path().join("token.dat")).unwrap();
        assert!(matches!(
            sessions.check(&token).await,
            Err(SessionError::KeyMaterial(_))
        ));
    }

    #[test]
    fn missing_blob_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = service(&dir);
        std::fs::remove_file(dir.path().join("token.dat")).unwrap();
        assert!(matches!(sessions.issue("admin"), Err(SessionError::KeyMaterial(_))));
    }
}
