// src/notify/discord.rs
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{display_company, display_title, Notifier, IDLE_MESSAGE};
use crate::error::DeliveryError;
use crate::ingest::types::Posting;

pub const ENV_WEBHOOK: &str = "DISCORD_WEBHOOK_URL";

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    async fn post(&self, payload: &DiscordWebhookPayload) -> Result<(), DeliveryError> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    Err(e) => {
                        let status = e.status().map(|s| s.as_u16()).unwrap_or_default();
                        // 4xx other than rate limiting will not get better on retry
                        if (400..500).contains(&status) && status != 429 {
                            return Err(DeliveryError::Rejected {
                                status,
                                body: String::new(),
                            });
                        }
                        DeliveryError::Rejected {
                            status,
                            body: String::new(),
                        }
                    }
                },
                // The webhook url is a credential.
                Err(e) => DeliveryError::Transport(e.without_url().to_string()),
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            tokio::time::sleep(backoff(attempt)).await;
        }
    }
}

fn backoff(attempt: u8) -> Duration {
    Duration::from_millis(500u64 << attempt.saturating_sub(1).min(6))
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, posting: &Posting) -> Result<(), DeliveryError> {
        let title = format!("{} at {}", display_title(posting), display_company(posting));

        let mut description = String::new();
        if let Some(loc) = &posting.location {
            description.push_str(&format!("**Location:** {loc}\n"));
        }
        if let Some(posted) = posting.posted_at {
            description.push_str(&format!("**Posted:** {}\n", posted.format("%Y-%m-%d")));
        }
        description.push_str(&format!("**Source:** {}", posting.source_name));

        let payload = DiscordWebhookPayload::embed(&title, &description, posting.url.as_deref());
        self.post(&payload).await
    }

    async fn notify_idle(&self) -> Result<(), DeliveryError> {
        self.post(&DiscordWebhookPayload::text(IDLE_MESSAGE)).await
    }

    fn delivery_budget(&self) -> Option<Duration> {
        let waits: Duration = (1..self.max_retries).map(backoff).sum();
        Some(self.timeout * u32::from(self.max_retries) + waits)
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn embed(title: &str, description: &str, url: Option<&str>) -> Self {
        Self {
            content: None,
            embeds: vec![DiscordEmbed {
                // Discord caps embed titles at 256 chars
                title: title.chars().take(256).collect(),
                description: description.to_string(),
                url: url.map(str::to_string),
            }],
        }
    }

    fn text(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
            embeds: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_capped_for_large_retry_budgets() {
        assert_eq!(backoff(1), Duration::from_millis(500));
        assert_eq!(backoff(3), Duration::from_millis(2_000));
        assert_eq!(backoff(u8::MAX), Duration::from_millis(500 << 6));
    }

    #[test]
    fn budget_counts_every_attempt_and_backoff() {
        let n = DiscordNotifier::new("https://discord.test/hook".into())
            .with_timeout(Duration::from_secs(30))
            .with_retries(3);
        assert_eq!(
            n.delivery_budget(),
            Some(Duration::from_secs(90) + Duration::from_millis(500 + 1_000))
        );
    }

    #[test]
    fn embed_payload_shape() {
        let p = DiscordWebhookPayload::embed("SWE Intern at Acme", "**Source:** X", Some("https://acme.com/1"));
        let v = serde_json::to_value(&p).unwrap();
        assert!(v["content"].is_null());
        assert_eq!(v["embeds"][0]["title"], "SWE Intern at Acme");
        assert_eq!(v["embeds"][0]["url"], "https://acme.com/1");
    }
}
