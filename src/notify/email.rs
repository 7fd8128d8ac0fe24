// src/notify/email.rs
use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{format_message, format_subject, Notifier, IDLE_MESSAGE};
use crate::error::DeliveryError;
use crate::ingest::types::Posting;

pub const ENV_SMTP_HOST: &str = "SMTP_HOST";
pub const ENV_SMTP_USER: &str = "SMTP_USER";
pub const ENV_SMTP_PASS: &str = "SMTP_PASS";
pub const ENV_FROM: &str = "NOTIFY_EMAIL_FROM";
pub const ENV_TO: &str = "NOTIFY_EMAIL_TO";

pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    pub fn new(host: &str, user: String, pass: String, from: &str, to: &str) -> Result<Self> {
        let creds = Credentials::new(user, pass);
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .with_context(|| format!("invalid SMTP host {host}"))?
            .credentials(creds)
            .build();

        let from: Mailbox = from.parse().context("invalid sender address")?;
        let to: Mailbox = to.parse().context("invalid recipient address")?;

        Ok(Self { mailer, from, to })
    }

    async fn send(&self, subject: String, body: String) -> Result<(), DeliveryError> {
        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| DeliveryError::Transport(format!("build email: {e}")))?;

        self.mailer
            .send(msg)
            .await
            .map_err(|e| DeliveryError::Transport(format!("send email: {e}")))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, posting: &Posting) -> Result<(), DeliveryError> {
        self.send(format_subject(posting), format_message(posting))
            .await
    }

    async fn notify_idle(&self) -> Result<(), DeliveryError> {
        self.send("No new internships".to_string(), IDLE_MESSAGE.to_string())
            .await
    }

    fn name(&self) -> &'static str {
        "email"
    }
}
