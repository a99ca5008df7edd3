use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use super::Mailer;
use crate::config::MailConfig;

/// STARTTLS relay authenticated as the sender account.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> anyhow::Result<Self> {
        let host = config.smtp_host.as_deref().context("SMTP_HOST not set")?;
        let sender = config.sender_email.as_deref().context("SENDER_EMAIL not set")?;
        let from: Mailbox = sender
            .parse()
            .with_context(|| format!("SENDER_EMAIL {sender:?} is not an address"))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .with_context(|| format!("SMTP relay {host}"))?
            .port(config.smtp_port);
        if let Some(password) = &config.sender_password {
            builder = builder.credentials(Credentials::new(sender.to_string(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let to_mailbox: Mailbox = to
            .parse()
            .with_context(|| format!("recipient {to:?} is not an address"))?;
        let email = Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        self.transport.send(email).await.context("smtp send")?;
        info!(%to, %subject, "email sent");
        Ok(())
    }
}
