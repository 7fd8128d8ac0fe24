// src/ingest/providers/remoteok.rs
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::error::FetchError;
use crate::ingest::providers::get_text_with_retry;
use crate::ingest::types::{RawRecord, SourceFetcher};

pub const REMOTEOK_API: &str = "https://remoteok.com/api";
const SOURCE_NAME: &str = "RemoteOK";

/// RemoteOK JSON API. The payload is an array whose first element is a legal
/// notice rather than a job; field types drift between ids, so entries are
/// read as loose JSON.
pub struct RemoteOkFetcher {
    mode: Mode,
    max_retries: u8,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: Client },
}

impl RemoteOkFetcher {
    pub fn from_fixture(json: &str) -> Self {
        Self {
            mode: Mode::Fixture(json.to_string()),
            max_retries: 0,
        }
    }

    pub fn from_url(client: Client) -> Self {
        Self {
            mode: Mode::Http {
                url: REMOTEOK_API.to_string(),
                client,
            },
            max_retries: 3,
        }
    }

    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        if let Mode::Http { url, .. } = &mut self.mode {
            *url = endpoint;
        }
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    fn parse_jobs(s: &str) -> Result<Vec<RawRecord>, FetchError> {
        let entries: Vec<Value> =
            serde_json::from_str(s).map_err(|e| FetchError::Parse(format!("remoteok json: {e}")))?;

        let out = entries
            .iter()
            .filter(|v| v.get("legal").is_none())
            .filter(|v| str_field(v, "position").is_some() || str_field(v, "url").is_some())
            .map(|v| RawRecord {
                title: str_field(v, "position"),
                company: str_field(v, "company"),
                url: str_field(v, "url").or_else(|| str_field(v, "apply_url")),
                description: str_field(v, "description"),
                posted_at: str_field(v, "date"),
                location: str_field(v, "location").or_else(|| Some("Remote".to_string())),
            })
            .collect();
        Ok(out)
    }
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl SourceFetcher for RemoteOkFetcher {
    async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_jobs(s),
            Mode::Http { url, client } => {
                let body =
                    get_text_with_retry(client, url, &[], self.max_retries, SOURCE_NAME).await?;
                Self::parse_jobs(&body)
            }
        }
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_notice_and_empty_entries_are_skipped() {
        let json = r#"[
            {"legal": "API terms"},
            {"id": 1, "position": "Rust Intern", "company": "Ferris", "url": "https://remoteok.com/remote-jobs/1", "date": "2025-03-01T10:00:00+00:00"},
            {"id": "2", "tags": []}
        ]"#;
        let jobs = RemoteOkFetcher::parse_jobs(json).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].title.as_deref(), Some("Rust Intern"));
        assert_eq!(jobs[0].location.as_deref(), Some("Remote"));
    }

    #[test]
    fn non_array_payload_is_a_parse_error() {
        assert!(matches!(
            RemoteOkFetcher::parse_jobs(r#"{"error":"blocked"}"#),
            Err(FetchError::Parse(_))
        ));
    }
}
