// src/ingest/providers/mod.rs
pub mod remoteok;
pub mod remotive;
pub mod rss;

use std::time::Duration;

use reqwest::{Client, StatusCode};

use crate::config::FetcherConfig;
use crate::error::FetchError;
use crate::ingest::types::{RawRecord, SourceFetcher};

pub use remoteok::RemoteOkFetcher;
pub use remotive::RemotiveFetcher;
pub use rss::RssFetcher;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

pub(crate) fn http_client() -> Client {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "http client builder failed, using defaults");
            Client::new()
        })
}

/// GET with exponential backoff on transport errors, 5xx and 429.
/// Other 4xx responses fail immediately.
pub(crate) async fn get_text_with_retry(
    client: &Client,
    url: &str,
    query: &[(&str, &str)],
    max_retries: u8,
    source: &str,
) -> Result<String, FetchError> {
    let mut attempt: u8 = 0;
    loop {
        let err = match client.get(url).query(query).send().await {
            Ok(rsp) => {
                let status = rsp.status();
                if status.is_success() {
                    return rsp.text().await.map_err(FetchError::from);
                }
                if status == StatusCode::TOO_MANY_REQUESTS {
                    FetchError::RateLimited
                } else if status.is_server_error() {
                    FetchError::Status {
                        status: status.as_u16(),
                    }
                } else {
                    return Err(FetchError::Status {
                        status: status.as_u16(),
                    });
                }
            }
            Err(e) => FetchError::Http(e),
        };

        if attempt >= max_retries {
            return Err(err);
        }
        let wait = Duration::from_secs(1u64 << attempt.min(5));
        tracing::debug!(target: "ingest", source, attempt, error = %err, ?wait, "retrying fetch");
        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}

/// Serves a fixed set of records. Used for fixtures and dry runs.
pub struct StaticFetcher {
    name: String,
    records: Vec<RawRecord>,
}

impl StaticFetcher {
    pub fn new(name: impl Into<String>, records: Vec<RawRecord>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }
}

#[async_trait::async_trait]
impl SourceFetcher for StaticFetcher {
    async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
        Ok(self.records.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Instantiate every enabled fetcher, in configuration order.
pub fn build_fetchers(configs: &[FetcherConfig]) -> Vec<Box<dyn SourceFetcher>> {
    let client = http_client();
    let mut out: Vec<Box<dyn SourceFetcher>> = Vec::new();

    for cfg in configs.iter().filter(|c| c.enabled()) {
        match cfg {
            FetcherConfig::Rss {
                name,
                url,
                max_retries,
                ..
            } => out.push(Box::new(
                RssFetcher::from_url(name.clone(), url.clone(), client.clone())
                    .with_retries(*max_retries),
            )),
            FetcherConfig::RemoteOk {
                url, max_retries, ..
            } => {
                let mut f = RemoteOkFetcher::from_url(client.clone()).with_retries(*max_retries);
                if let Some(u) = url {
                    f = f.with_endpoint(u.clone());
                }
                out.push(Box::new(f));
            }
            FetcherConfig::Remotive {
                url,
                category,
                search,
                max_retries,
                ..
            } => {
                let mut f = RemotiveFetcher::from_url(client.clone())
                    .with_category(category.clone())
                    .with_search(search.clone())
                    .with_retries(*max_retries);
                if let Some(u) = url {
                    f = f.with_endpoint(u.clone());
                }
                out.push(Box::new(f));
            }
        }
    }

    tracing::info!(target: "ingest", count = out.len(), "fetchers prepared");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_fetchers_are_not_built() {
        let cfgs = vec![
            FetcherConfig::Rss {
                name: "Feed".into(),
                url: "https://example.test/feed.rss".into(),
                enabled: true,
                max_retries: 0,
            },
            FetcherConfig::RemoteOk {
                url: None,
                enabled: false,
                max_retries: 0,
            },
        ];
        let built = build_fetchers(&cfgs);
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].name(), "Feed");
    }
}
