// src/ingest/providers/remotive.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::FetchError;
use crate::ingest::providers::get_text_with_retry;
use crate::ingest::types::{RawRecord, SourceFetcher};

pub const REMOTIVE_API: &str = "https://remotive.com/api/remote-jobs";
const SOURCE_NAME: &str = "Remotive";

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    jobs: Vec<Job>,
}

#[derive(Debug, Deserialize)]
struct Job {
    title: Option<String>,
    company_name: Option<String>,
    url: Option<String>,
    publication_date: Option<String>,
    candidate_required_location: Option<String>,
    description: Option<String>,
}

pub struct RemotiveFetcher {
    mode: Mode,
    category: String,
    search: Option<String>,
    max_retries: u8,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: Client },
}

impl RemotiveFetcher {
    pub fn from_fixture(json: &str) -> Self {
        Self {
            mode: Mode::Fixture(json.to_string()),
            category: "software-dev".to_string(),
            search: None,
            max_retries: 0,
        }
    }

    pub fn from_url(client: Client) -> Self {
        Self {
            mode: Mode::Http {
                url: REMOTIVE_API.to_string(),
                client,
            },
            category: "software-dev".to_string(),
            search: None,
            max_retries: 3,
        }
    }

    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        if let Mode::Http { url, .. } = &mut self.mode {
            *url = endpoint;
        }
        self
    }

    pub fn with_category(mut self, category: String) -> Self {
        self.category = category;
        self
    }

    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    fn parse_jobs(s: &str) -> Result<Vec<RawRecord>, FetchError> {
        let rsp: Response =
            serde_json::from_str(s).map_err(|e| FetchError::Parse(format!("remotive json: {e}")))?;

        Ok(rsp
            .jobs
            .into_iter()
            .map(|j| RawRecord {
                title: j.title,
                company: j.company_name,
                url: j.url,
                description: j.description,
                posted_at: j.publication_date,
                location: Some(remote_location(j.candidate_required_location.as_deref())),
            })
            .collect())
    }
}

fn remote_location(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        None | Some("") => "Remote".to_string(),
        Some(l) if l.eq_ignore_ascii_case("anywhere") || l.eq_ignore_ascii_case("worldwide") => {
            "Remote".to_string()
        }
        Some(l) => l.to_string(),
    }
}

#[async_trait]
impl SourceFetcher for RemotiveFetcher {
    async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_jobs(s),
            Mode::Http { url, client } => {
                let mut query: Vec<(&str, &str)> =
                    vec![("category", self.category.as_str()), ("limit", "100")];
                if let Some(s) = &self.search {
                    query.push(("search", s.as_str()));
                }
                let body =
                    get_text_with_retry(client, url, &query, self.max_retries, SOURCE_NAME).await?;
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
    fn anywhere_maps_to_remote() {
        assert_eq!(remote_location(Some("Anywhere")), "Remote");
        assert_eq!(remote_location(None), "Remote");
        assert_eq!(remote_location(Some("India")), "India");
    }

    #[test]
    fn missing_jobs_key_yields_nothing() {
        let jobs = RemotiveFetcher::parse_jobs(r#"{"job-count": 0}"#).unwrap();
        assert!(jobs.is_empty());
    }
}
