// src/ingest/providers/rss.rs
use async_trait::async_trait;
use quick_xml::de::from_str;
use reqwest::Client;
use serde::Deserialize;

use crate::error::FetchError;
use crate::ingest::providers::get_text_with_retry;
use crate::ingest::types::{RawRecord, SourceFetcher};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    author: Option<String>,
}

pub struct RssFetcher {
    name: String,
    mode: Mode,
    max_retries: u8,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: Client },
}

impl RssFetcher {
    pub fn from_fixture(name: impl Into<String>, xml: &str) -> Self {
        Self {
            name: name.into(),
            mode: Mode::Fixture(xml.to_string()),
            max_retries: 0,
        }
    }

    pub fn from_url(name: impl Into<String>, url: impl Into<String>, client: Client) -> Self {
        Self {
            name: name.into(),
            mode: Mode::Http {
                url: url.into(),
                client,
            },
            max_retries: 3,
        }
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    fn parse_items_from_str(s: &str) -> Result<Vec<RawRecord>, FetchError> {
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).map_err(|e| FetchError::Parse(e.to_string()))?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let (title, company) = split_title_company(it.title.as_deref(), it.author.as_deref());
            out.push(RawRecord {
                title,
                company,
                url: it.link.map(|l| l.trim().to_string()),
                description: it.description,
                posted_at: it.pub_date,
                // job-board feeds in this family list remote roles
                location: Some("Remote".to_string()),
            });
        }
        Ok(out)
    }
}

/// Company from `<author>`, otherwise from the feed's title convention:
/// "Title at Company" or "Company: Title".
fn split_title_company(
    title: Option<&str>,
    author: Option<&str>,
) -> (Option<String>, Option<String>) {
    let title = title.map(str::trim).filter(|t| !t.is_empty());
    if let Some(a) = author.map(str::trim).filter(|a| !a.is_empty()) {
        return (title.map(str::to_string), Some(a.to_string()));
    }
    let Some(t) = title else {
        return (None, None);
    };
    if let Some((role, company)) = t.rsplit_once(" at ") {
        return (Some(role.trim().to_string()), Some(company.trim().to_string()));
    }
    if let Some((company, role)) = t.split_once(": ") {
        return (Some(role.trim().to_string()), Some(company.trim().to_string()));
    }
    (Some(t.to_string()), None)
}

#[async_trait]
impl SourceFetcher for RssFetcher {
    async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_items_from_str(s),
            Mode::Http { url, client } => {
                let body = get_text_with_retry(client, url, &[], self.max_retries, &self.name).await?;
                Self::parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn company_comes_from_author_first() {
        let (t, c) = split_title_company(Some("Backend Intern at Foo"), Some("Bar Inc"));
        assert_eq!(t.as_deref(), Some("Backend Intern at Foo"));
        assert_eq!(c.as_deref(), Some("Bar Inc"));
    }

    #[test]
    fn company_from_title_conventions() {
        let (t, c) = split_title_company(Some("Data Intern at Globex"), None);
        assert_eq!((t.as_deref(), c.as_deref()), (Some("Data Intern"), Some("Globex")));

        let (t, c) = split_title_company(Some("Initech: QA Intern"), None);
        assert_eq!((t.as_deref(), c.as_deref()), (Some("QA Intern"), Some("Initech")));

        let (t, c) = split_title_company(Some("Intern"), None);
        assert_eq!((t.as_deref(), c), (Some("Intern"), None));
    }

    #[test]
    fn empty_channel_is_not_an_error() {
        let xml = r#"<rss version="2.0"><channel><title>x</title></channel></rss>"#;
        let items = RssFetcher::parse_items_from_str(xml).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = RssFetcher::parse_items_from_str("not xml at all").unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }
}
