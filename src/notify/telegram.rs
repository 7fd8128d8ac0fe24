// src/notify/telegram.rs
use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use serde::Serialize;
use tokio::sync::Mutex;

use super::{format_message, Notifier, IDLE_MESSAGE};
use crate::error::DeliveryError;
use crate::ingest::types::Posting;

pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
const API_BASE: &str = "https://api.telegram.org";
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Bot API `sendMessage`. Messages to one chat are paced by `min_interval`
/// and a 429 honours the server's `retry_after`.
pub struct TelegramNotifier {
    api_base: String,
    token: String,
    chat_id: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
    min_interval: Duration,
    last_sent: Mutex<Option<Instant>>,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(serde::Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    parameters: Option<ErrorParameters>,
}

#[derive(serde::Deserialize)]
struct ErrorParameters {
    retry_after: Option<u64>,
}

impl TelegramNotifier {
    pub fn new(token: String, chat_id: String) -> Self {
        Self {
            api_base: API_BASE.to_string(),
            token,
            chat_id,
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
            min_interval: Duration::from_millis(1_100),
            last_sent: Mutex::new(None),
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

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Point at a different Bot API host (self-hosted server or test double).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    async fn send_text(&self, text: &str) -> Result<(), DeliveryError> {
        let mut last_sent = self.last_sent.lock().await;
        if let Some(prev) = *last_sent {
            let since = prev.elapsed();
            if since < self.min_interval {
                tokio::time::sleep(self.min_interval - since).await;
            }
        }

        let endpoint = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
            disable_web_page_preview: true,
        };

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&endpoint)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let (err, wait) = match res {
                Ok(rsp) if rsp.status().is_success() => {
                    *last_sent = Some(Instant::now());
                    return Ok(());
                }
                Ok(rsp) => {
                    let status = rsp.status();
                    let body = rsp.text().await.unwrap_or_default();
                    let err = DeliveryError::Rejected {
                        status: status.as_u16(),
                        body: body.chars().take(300).collect(),
                    };
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let secs = serde_json::from_str::<ErrorBody>(&body)
                            .ok()
                            .and_then(|b| b.parameters)
                            .and_then(|p| p.retry_after)
                            .unwrap_or(1);
                        (err, Duration::from_secs(secs).min(MAX_RETRY_AFTER))
                    } else if status.is_server_error() {
                        (err, backoff(attempt))
                    } else {
                        return Err(err);
                    }
                }
                // The request url embeds the bot token; keep it out of errors and logs.
                Err(e) => (
                    DeliveryError::Transport(e.without_url().to_string()),
                    backoff(attempt),
                ),
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            tracing::debug!(target: "notify", attempt, error = %err, ?wait, "telegram retry");
            tokio::time::sleep(wait).await;
        }
    }
}

fn backoff(attempt: u8) -> Duration {
    Duration::from_millis(500u64 << (attempt.saturating_sub(1)).min(6))
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, posting: &Posting) -> Result<(), DeliveryError> {
        self.send_text(&format_message(posting)).await
    }

    async fn notify_idle(&self) -> Result<(), DeliveryError> {
        self.send_text(IDLE_MESSAGE).await
    }

    fn delivery_budget(&self) -> Option<Duration> {
        // Each wait between attempts is a backoff or a capped retry_after.
        let waits: Duration = (1..self.max_retries)
            .map(|a| backoff(a).max(MAX_RETRY_AFTER))
            .sum();
        Some(self.min_interval + self.timeout * u32::from(self.max_retries) + waits)
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        assert_eq!(backoff(1), Duration::from_millis(500));
        assert_eq!(backoff(2), Duration::from_millis(1_000));
        assert_eq!(backoff(200), Duration::from_millis(500 << 6));
    }

    #[test]
    fn budget_covers_pacing_and_a_full_retry_after() {
        let n = TelegramNotifier::new("t".into(), "c".into())
            .with_timeout(Duration::from_secs(30))
            .with_retries(3);
        let budget = n.delivery_budget().unwrap();
        // pacing + 429 at the first attempt + 30s retry_after + a slow second attempt
        assert!(budget >= Duration::from_millis(1_100) + MAX_RETRY_AFTER + Duration::from_secs(60));
        assert_eq!(
            budget,
            Duration::from_millis(1_100) + Duration::from_secs(90) + MAX_RETRY_AFTER * 2
        );
    }

    #[test]
    fn retry_after_is_read_from_error_body() {
        let body = r#"{"ok":false,"error_code":429,"parameters":{"retry_after":7}}"#;
        let secs = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.parameters)
            .and_then(|p| p.retry_after);
        assert_eq!(secs, Some(7));
    }
}
