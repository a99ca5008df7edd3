//! Outgoing e-mail: closure summaries and daily event-post digests.

mod smtp;

use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use tera::{Context, Tera};
use tracing::{info, warn};

pub use smtp::SmtpMailer;

use crate::{
    config::AppConfig,
    events::{Event, Participant},
    scheduler::EventPost,
};

const CLOSURE_SUMMARY: &str = "closure_summary.txt";
const EVENT_POSTS: &str = "event_posts.txt";

pub const EVENT_POSTS_SUBJECT: &str = "Society Session Event Posts to Send Today!";

pub fn closure_subject(event_id: i64) -> String {
    format!("Society Session Event {event_id} Closed Today!")
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Used when SMTP is not configured: the message is logged instead of sent.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        info!(%to, %subject, %body, "mail not configured; message logged only");
        Ok(())
    }
}

pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    templates: Tera,
    posts_address: Option<String>,
    closure_address: Option<String>,
}

impl Notifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        posts_address: Option<String>,
        closure_address: Option<String>,
    ) -> anyhow::Result<Self> {
        let mut templates = Tera::default();
        templates
            .add_raw_templates(vec![
                (
                    CLOSURE_SUMMARY,
                    include_str!("../../templates/closure_summary.txt"),
                ),
                (EVENT_POSTS, include_str!("../../templates/event_posts.txt")),
            ])
            .context("load mail templates")?;
        Ok(Self {
            mailer,
            templates,
            posts_address,
            closure_address,
        })
    }

    /// Picks SMTP when it is configured, the log mailer otherwise.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let mailer: Arc<dyn Mailer> = if config.mail.is_configured() {
            Arc::new(SmtpMailer::new(&config.mail)?)
        } else {
            warn!("SMTP_HOST or SENDER_EMAIL unset; notifications will only be logged");
            Arc::new(LogMailer)
        };
        Self::new(
            mailer,
            config.mail.event_posts_address.clone(),
            config.mail.event_closure_address.clone(),
        )
    }

    pub fn render_closure_summary(
        &self,
        event: &Event,
        participants: &[Participant],
    ) -> anyhow::Result<String> {
        let mut ctx = Context::new();
        ctx.insert("event", event);
        ctx.insert("participants", participants);
        self.templates
            .render(CLOSURE_SUMMARY, &ctx)
            .with_context(|| format!("render closure summary for event {}", event.id))
    }

    pub fn render_event_posts(&self, posts: &[EventPost]) -> anyhow::Result<String> {
        let mut ctx = Context::new();
        ctx.insert("posts", posts);
        self.templates
            .render(EVENT_POSTS, &ctx)
            .context("render event posts")
    }

    pub async fn send_closure_summary(
        &self,
        event: &Event,
        participants: &[Participant],
    ) -> anyhow::Result<()> {
        let body = self.render_closure_summary(event, participants)?;
        let Some(to) = self.closure_address.as_deref() else {
            warn!(event_id = event.id, "EVENT_CLOSURE_EMAIL_ADDRESS unset; summary not sent");
            return Ok(());
        };
        self.mailer.send(to, &closure_subject(event.id), &body).await
    }

    /// Nothing is sent for an empty day.
    pub async fn send_event_posts(&self, posts: &[EventPost]) -> anyhow::Result<()> {
        if posts.is_empty() {
            return Ok(());
        }
        let body = self.render_event_posts(posts)?;
        let Some(to) = self.posts_address.as_deref() else {
            warn!(posts = posts.len(), "EVENT_POSTS_EMAIL_ADDRESS unset; digest not sent");
            return Ok(());
        };
        self.mailer.send(to, EVENT_POSTS_SUBJECT, &body).await
    }
}
