use std::path::PathBuf;

use anyhow::Context;
use time::{macros::format_description, UtcOffset};

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub key_file: PathBuf,
    pub issuer: String,
    pub ttl_hours: i64,
    pub cookie_max_age_secs: i64,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub reminder_hour: u8,
    pub closure_check_secs: u64,
    pub utc_offset: UtcOffset,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub sender_email: Option<String>,
    pub sender_password: Option<String>,
    pub event_posts_address: Option<String>,
    pub event_closure_address: Option<String>,
}

impl MailConfig {
    pub fn is_configured(&self) -> bool {
        self.smtp_host.is_some() && self.sender_email.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_busy_timeout_secs: u64,
    pub public_url: String,
    pub http: HttpConfig,
    pub session: SessionConfig,
    pub scheduler: SchedulerConfig,
    pub mail: MailConfig,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

pub fn parse_utc_offset(raw: &str) -> anyhow::Result<UtcOffset> {
    UtcOffset::parse(
        raw.trim(),
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .with_context(|| format!("invalid UTC offset {raw:?}, expected e.g. +01:00"))
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let port = var_or("APP_PORT", "8080");
        let http = HttpConfig {
            host: var_or("APP_HOST", "0.0.0.0"),
            port: port.parse().with_context(|| format!("APP_PORT {port:?}"))?,
        };
        let session = SessionConfig {
            key_file: PathBuf::from(var_or("KEY_FILE", "token.dat")),
            issuer: var_or("JWT_ISSUER", "climbing-seats"),
            ttl_hours: parsed_or("SESSION_TTL_HOURS", 6),
            cookie_max_age_secs: parsed_or("COOKIE_MAX_AGE_SECS", 3600),
        };
        let reminder_hour: u8 = parsed_or("REMINDER_HOUR", 8);
        anyhow::ensure!(reminder_hour < 24, "REMINDER_HOUR must be 0-23");
        let scheduler = SchedulerConfig {
            reminder_hour,
            closure_check_secs: parsed_or("CLOSURE_CHECK_SECS", 60),
            utc_offset: parse_utc_offset(&var_or("APP_UTC_OFFSET", "+00:00"))?,
        };
        let mail = MailConfig {
            smtp_host: std::env::var("SMTP_HOST").ok(),
            smtp_port: parsed_or("SMTP_PORT", 587),
            sender_email: std::env::var("SENDER_EMAIL").ok(),
            sender_password: std::env::var("SENDER_PASSWORD").ok(),
            event_posts_address: std::env::var("EVENT_POSTS_EMAIL_ADDRESS").ok(),
            event_closure_address: std::env::var("EVENT_CLOSURE_EMAIL_ADDRESS").ok(),
        };
        let public_url = var_or("PUBLIC_URL", &format!("http://localhost:{}", http.port));

        Ok(Self {
            database_url: var_or("DATABASE_URL", "sqlite://database.db?mode=rwc"),
            db_busy_timeout_secs: parsed_or("DB_BUSY_TIMEOUT_SECS", 5),
            public_url: public_url.trim_end_matches('/').to_string(),
            http,
            session,
            scheduler,
            mail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_signed_offsets() {
        assert_eq!(parse_utc_offset("+01:00").unwrap().whole_hours(), 1);
        assert_eq!(parse_utc_offset("-05:30").unwrap().whole_minutes(), -330);
        assert!(parse_utc_offset("01:00").is_err());
        assert!(parse_utc_offset("BST").is_err());
    }

    #[test]
    fn mail_requires_host_and_sender() {
        let mut mail = MailConfig {
            smtp_host: Some("smtp.example.org".into()),
            smtp_port: 587,
            sender_email: None,
            sender_password: None,
            event_posts_address: None,
            event_closure_address: None,
        };
        assert!(!mail.is_configured());
        mail.sender_email = Some("club@example.org".into());
        assert!(mail.is_configured());
    }
}
