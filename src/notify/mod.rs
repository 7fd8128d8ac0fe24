// src/notify/mod.rs
pub mod discord;
pub mod email;
pub mod telegram;

use std::time::Duration;

use anyhow::Result;

use crate::config::{resolve_secret, NotifierConfig};
use crate::error::DeliveryError;
use crate::ingest::types::Posting;

pub use discord::DiscordNotifier;
pub use email::EmailNotifier;
pub use telegram::TelegramNotifier;

pub const IDLE_MESSAGE: &str = "📅 No new IT internships found this run. Check back soon!";

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one posting. Transport rate limits are handled here, not by callers.
    async fn notify(&self, posting: &Posting) -> Result<(), DeliveryError>;

    /// "Nothing new" message; no-op unless the transport supports it.
    async fn notify_idle(&self) -> Result<(), DeliveryError> {
        Ok(())
    }

    /// Worst-case wall time of one `notify` call, counting the transport's own
    /// pacing, retries and backoff. `None` means a single attempt.
    fn delivery_budget(&self) -> Option<Duration> {
        None
    }

    fn name(&self) -> &'static str;
}

fn display_company(p: &Posting) -> &str {
    if p.company.is_empty() {
        "Unknown"
    } else {
        &p.company
    }
}

fn display_title(p: &Posting) -> &str {
    if p.title.is_empty() {
        "Untitled posting"
    } else {
        &p.title
    }
}

/// Plain-text message body shared by all transports.
pub fn format_message(p: &Posting) -> String {
    let mut lines = vec![
        "🎯 New IT internship".to_string(),
        display_title(p).to_string(),
        format!("🏢 Company: {}", display_company(p)),
    ];
    if let Some(loc) = &p.location {
        lines.push(format!("📍 Location: {loc}"));
    }
    if let Some(posted) = p.posted_at {
        lines.push(format!("📅 Posted: {}", posted.format("%Y-%m-%d")));
    }
    lines.push(format!("🔎 Source: {}", p.source_name));
    if let Some(url) = &p.url {
        lines.push(format!("🔗 {url}"));
    }
    lines.join("\n")
}

pub fn format_subject(p: &Posting) -> String {
    format!(
        "New internship: {} at {}",
        display_title(p),
        display_company(p)
    )
}

/// Writes postings to the log only. Used when no transport is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, posting: &Posting) -> Result<(), DeliveryError> {
        tracing::info!(
            target: "notify",
            key = %posting.identity_key,
            title = %posting.title,
            company = %posting.company,
            source = %posting.source_name,
            "new posting"
        );
        Ok(())
    }

    async fn notify_idle(&self) -> Result<(), DeliveryError> {
        tracing::info!(target: "notify", "{IDLE_MESSAGE}");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Build the configured transport. `Auto` picks Telegram when its env vars are present.
pub fn build_notifier(cfg: &NotifierConfig, timeout: Duration) -> Result<Box<dyn Notifier>> {
    let notifier: Box<dyn Notifier> = match cfg {
        NotifierConfig::Auto => {
            match (
                resolve_secret("ENV", telegram::ENV_BOT_TOKEN),
                resolve_secret("ENV", telegram::ENV_CHAT_ID),
            ) {
                (Ok(token), Ok(chat)) => {
                    Box::new(TelegramNotifier::new(token, chat).with_timeout(timeout))
                }
                _ => {
                    tracing::warn!(
                        "TELEGRAM_BOT_TOKEN or TELEGRAM_CHAT_ID missing; postings will only be logged"
                    );
                    Box::new(LogNotifier)
                }
            }
        }
        NotifierConfig::Telegram {
            bot_token,
            chat_id,
            min_interval_ms,
        } => Box::new(
            TelegramNotifier::new(
                resolve_secret(bot_token, telegram::ENV_BOT_TOKEN)?,
                resolve_secret(chat_id, telegram::ENV_CHAT_ID)?,
            )
            .with_timeout(timeout)
            .with_min_interval(Duration::from_millis(*min_interval_ms)),
        ),
        NotifierConfig::Discord { webhook } => Box::new(
            DiscordNotifier::new(resolve_secret(webhook, discord::ENV_WEBHOOK)?)
                .with_timeout(timeout),
        ),
        NotifierConfig::Email {
            smtp_host,
            smtp_user,
            smtp_pass,
            from,
            to,
        } => Box::new(EmailNotifier::new(
            &resolve_secret(smtp_host, email::ENV_SMTP_HOST)?,
            resolve_secret(smtp_user, email::ENV_SMTP_USER)?,
            resolve_secret(smtp_pass, email::ENV_SMTP_PASS)?,
            &resolve_secret(from, email::ENV_FROM)?,
            &resolve_secret(to, email::ENV_TO)?,
        )?),
        NotifierConfig::Log => Box::new(LogNotifier),
    };
    tracing::info!(target: "notify", notifier = notifier.name(), "notifier ready");
    Ok(notifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn posting() -> Posting {
        Posting {
            identity_key: "https://acme.com/jobs/1".into(),
            title: "SWE Intern".into(),
            company: "Acme".into(),
            url: Some("https://acme.com/jobs/1".into()),
            source_name: "RemoteOK".into(),
            location: Some("Remote".into()),
            description: None,
            posted_at: Some(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()),
            discovered_at: Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn message_carries_required_fields() {
        let msg = format_message(&posting());
        assert!(msg.contains("SWE Intern"));
        assert!(msg.contains("Company: Acme"));
        assert!(msg.contains("Source: RemoteOK"));
        assert!(msg.contains("https://acme.com/jobs/1"));
        assert!(msg.contains("Posted: 2025-03-01"));
    }

    #[test]
    fn missing_fields_get_placeholders() {
        let mut p = posting();
        p.title.clear();
        p.company.clear();
        p.url = None;
        p.location = None;
        let msg = format_message(&p);
        assert!(msg.contains("Untitled posting"));
        assert!(msg.contains("Company: Unknown"));
        assert!(!msg.contains("🔗"));
        assert!(!msg.contains("Location"));
        assert_eq!(
            format_subject(&p),
            "New internship: Untitled posting at Unknown"
        );
    }
}
