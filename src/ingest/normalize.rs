// src/ingest/normalize.rs
//! Raw record → canonical [`Posting`].
//!
//! The identity key is a pure function of the normalized fields: the canonical
//! URL when one is available, otherwise a SHA-256 over title, company and
//! source. Two records that differ only in tracking parameters, fragment or
//! scheme/host case always map to the same key.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use sha2::{Digest, Sha256};
use time::{format_description::well_known::Rfc2822, OffsetDateTime};
use url::Url;

use crate::error::NormalizationError;
use crate::ingest::types::{Posting, RawRecord};

const DESCRIPTION_CAP: usize = 1500;

/// Query parameter names stripped from URLs before key derivation.
/// An entry ending in `*` matches by prefix; all matching is ASCII case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct TrackingParams {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl TrackingParams {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        let mut exact = Vec::new();
        let mut prefixes = Vec::new();
        for n in names {
            let n = n.as_ref().trim().to_ascii_lowercase();
            if n.is_empty() {
                continue;
            }
            match n.strip_suffix('*') {
                Some(p) if !p.is_empty() => prefixes.push(p.to_string()),
                Some(_) => {}
                None => exact.push(n),
            }
        }
        exact.sort();
        exact.dedup();
        prefixes.sort();
        prefixes.dedup();
        Self { exact, prefixes }
    }

    pub fn matches(&self, name: &str) -> bool {
        let n = name.to_ascii_lowercase();
        self.exact.iter().any(|e| *e == n) || self.prefixes.iter().any(|p| n.starts_with(p))
    }
}

/// Canonicalize a link. Returns `None` for blank, relative or non-http(s) input.
pub fn normalize_url(raw: &str, tracking: &TrackingParams) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    // The parser lowercases scheme and host and drops default ports.
    let mut url = Url::parse(trimmed).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !tracking.matches(k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            for (k, v) in &kept {
                pairs.append_pair(k, v);
            }
        }
    }

    Some(url.to_string())
}

/// Key for records without a usable URL.
pub fn fallback_key(title: &str, company: &str, source_name: &str) -> String {
    let material = format!(
        "{}|{}|{}",
        title.to_lowercase(),
        company.to_lowercase(),
        source_name
    );
    let digest = Sha256::digest(material.as_bytes());
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

pub fn derive_identity_key(
    normalized_url: Option<&str>,
    title: &str,
    company: &str,
    source_name: &str,
) -> String {
    match normalized_url {
        Some(u) => u.to_string(),
        None => fallback_key(title, company, source_name),
    }
}

/// Decode entities, strip tags, collapse whitespace, trim.
pub fn clean_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    let stripped = re_tags.replace_all(&decoded, " ");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    let collapsed = re_ws.replace_all(&stripped, " ");

    collapsed
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Parse the date formats job boards actually send. Relative forms
/// ("3 days ago", "yesterday") are resolved against `now`.
pub fn parse_posted_at(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        return DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), 0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
    }

    parse_relative(&s.to_lowercase(), now)
}

fn parse_relative(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let start_of = |t: DateTime<Utc>| t.date_naive().and_hms_opt(0, 0, 0).map(|n| n.and_utc());

    if s.contains("today") || s == "just now" {
        return start_of(now);
    }
    if s.contains("yesterday") {
        return start_of(now.checked_sub_signed(Duration::try_days(1)?)?);
    }

    static RE_AGO: OnceCell<Regex> = OnceCell::new();
    let re = RE_AGO.get_or_init(|| {
        Regex::new(r"(\d+)\s+(minute|hour|day|week|month)s?\s+ago").expect("relative date regex")
    });
    let caps = re.captures(s)?;
    let n: i64 = caps.get(1)?.as_str().parse().ok()?;
    // Out-of-range counts leave the date unparsed.
    let delta = match caps.get(2)?.as_str() {
        "minute" => Duration::try_minutes(n)?,
        "hour" => Duration::try_hours(n)?,
        "day" => Duration::try_days(n)?,
        "week" => Duration::try_weeks(n)?,
        // months approximated as 30 days
        "month" => Duration::try_days(n.checked_mul(30)?)?,
        _ => return None,
    };
    now.checked_sub_signed(delta)
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    tracking: TrackingParams,
}

impl Normalizer {
    pub fn new(tracking: TrackingParams) -> Self {
        Self { tracking }
    }

    pub fn from_param_names<S: AsRef<str>>(names: &[S]) -> Self {
        Self::new(TrackingParams::new(names))
    }

    pub fn normalize(
        &self,
        raw: &RawRecord,
        source_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Posting, NormalizationError> {
        let title = raw.title.as_deref().map(clean_text).unwrap_or_default();
        let company = raw.company.as_deref().map(clean_text).unwrap_or_default();

        let url = raw.url.as_deref().and_then(|u| {
            let n = normalize_url(u, &self.tracking);
            if n.is_none() && !u.trim().is_empty() {
                tracing::debug!(target: "ingest", source = source_name, url = u, "unusable url, falling back to content key");
            }
            n
        });

        if url.is_none() && title.is_empty() {
            return Err(NormalizationError::MissingUrlAndTitle {
                source_name: source_name.to_string(),
            });
        }

        let identity_key = derive_identity_key(url.as_deref(), &title, &company, source_name);

        let description = raw
            .description
            .as_deref()
            .map(clean_text)
            .map(|d| {
                if d.chars().count() > DESCRIPTION_CAP {
                    d.chars().take(DESCRIPTION_CAP).collect()
                } else {
                    d
                }
            })
            .and_then(non_empty);

        Ok(Posting {
            identity_key,
            title,
            company,
            url,
            source_name: source_name.to_string(),
            location: raw.location.as_deref().map(clean_text).and_then(non_empty),
            description,
            posted_at: raw
                .posted_at
                .as_deref()
                .and_then(|p| parse_posted_at(p, now)),
            discovered_at: now,
        })
    }
}
