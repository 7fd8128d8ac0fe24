// src/config/mod.rs
//! Application configuration.
//!
//! Lookup order for the config file:
//! 1) `$FINDER_CONFIG_PATH` (must exist)
//! 2) `config/finder.toml`
//! 3) `config/finder.json`
//! 4) built-in defaults
//!
//! Credentials may be given literally or as `"ENV"`, which reads the
//! conventional environment variable for that field.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

pub const ENV_CONFIG_PATH: &str = "FINDER_CONFIG_PATH";
pub const ENV_TIMEOUT_SECS: &str = "FINDER_TIMEOUT_SECS";
pub const ENV_STORE_PATH: &str = "FINDER_STORE_PATH";
pub const ENV_INTERVAL_SECS: &str = "FINDER_INTERVAL_SECS";

pub const DEFAULT_TOML_PATH: &str = "config/finder.toml";
pub const DEFAULT_JSON_PATH: &str = "config/finder.json";
pub const DEFAULT_STORE_PATH: &str = "state/seen_urls.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_true() -> bool {
    true
}
fn default_retries() -> u8 {
    3
}
fn default_env() -> String {
    "ENV".to_string()
}
fn default_category() -> String {
    "software-dev".to_string()
}
fn default_min_interval_ms() -> u64 {
    1_100
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub timeout_secs: u64,
    pub tracking_params: Vec<String>,
    pub store: StoreConfig,
    pub fetchers: Vec<FetcherConfig>,
    pub notifier: NotifierConfig,
    pub notify: NotifyConfig,
    pub schedule: ScheduleConfig,
    pub metrics_textfile: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            tracking_params: default_tracking_params(),
            store: StoreConfig::default(),
            fetchers: default_fetchers(),
            notifier: NotifierConfig::default(),
            notify: NotifyConfig::default(),
            schedule: ScheduleConfig::default(),
            metrics_textfile: None,
        }
    }
}

impl AppConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// `None` means run once and exit.
    pub fn interval(&self) -> Option<Duration> {
        (self.schedule.interval_secs > 0).then(|| Duration::from_secs(self.schedule.interval_secs))
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = parse_env_u64(ENV_TIMEOUT_SECS) {
            self.timeout_secs = v;
        }
        if let Some(v) = parse_env_u64(ENV_INTERVAL_SECS) {
            self.schedule.interval_secs = v;
        }
        if let Ok(p) = env::var(ENV_STORE_PATH) {
            if !p.trim().is_empty() {
                self.store.path = PathBuf::from(p);
            }
        }
    }
}

fn parse_env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FetcherConfig {
    Rss {
        name: String,
        url: String,
        #[serde(default = "default_true")]
        enabled: bool,
        #[serde(default = "default_retries")]
        max_retries: u8,
    },
    RemoteOk {
        #[serde(default)]
        url: Option<String>,
        #[serde(default = "default_true")]
        enabled: bool,
        #[serde(default = "default_retries")]
        max_retries: u8,
    },
    Remotive {
        #[serde(default)]
        url: Option<String>,
        #[serde(default = "default_category")]
        category: String,
        #[serde(default)]
        search: Option<String>,
        #[serde(default = "default_true")]
        enabled: bool,
        #[serde(default = "default_retries")]
        max_retries: u8,
    },
}

impl FetcherConfig {
    pub fn enabled(&self) -> bool {
        match self {
            FetcherConfig::Rss { enabled, .. }
            | FetcherConfig::RemoteOk { enabled, .. }
            | FetcherConfig::Remotive { enabled, .. } => *enabled,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NotifierConfig {
    /// Telegram when `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID` are set, log otherwise.
    Auto,
    Telegram {
        #[serde(default = "default_env")]
        bot_token: String,
        #[serde(default = "default_env")]
        chat_id: String,
        #[serde(default = "default_min_interval_ms")]
        min_interval_ms: u64,
    },
    Discord {
        #[serde(default = "default_env")]
        webhook: String,
    },
    Email {
        #[serde(default = "default_env")]
        smtp_host: String,
        #[serde(default = "default_env")]
        smtp_user: String,
        #[serde(default = "default_env")]
        smtp_pass: String,
        #[serde(default = "default_env")]
        from: String,
        #[serde(default = "default_env")]
        to: String,
    },
    Log,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        NotifierConfig::Auto
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Send a "nothing new" message when a run finds no new postings.
    pub idle_summary: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
}

pub fn default_tracking_params() -> Vec<String> {
    [
        "utm_*", "fbclid", "gclid", "dclid", "msclkid", "yclid", "igshid", "mc_cid", "mc_eid",
        "_hsenc", "_hsmi", "ref", "ref_src", "trk", "trackingid", "refid",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_fetchers() -> Vec<FetcherConfig> {
    vec![
        FetcherConfig::Rss {
            name: "We Work Remotely".to_string(),
            url: "https://weworkremotely.com/categories/remote-programming-jobs.rss".to_string(),
            enabled: true,
            max_retries: default_retries(),
        },
        FetcherConfig::Rss {
            name: "EuroTechJobs".to_string(),
            url: "https://www.eurotechjobs.com/jobs/rss/internship".to_string(),
            enabled: true,
            max_retries: default_retries(),
        },
        FetcherConfig::RemoteOk {
            url: None,
            enabled: true,
            max_retries: default_retries(),
        },
        FetcherConfig::Remotive {
            url: None,
            category: default_category(),
            search: None,
            enabled: true,
            max_retries: default_retries(),
        },
    ]
}

/// Resolve a credential: `"ENV"` (any case) reads `env_key`, anything else is literal.
pub fn resolve_secret(value: &str, env_key: &str) -> Result<String> {
    if value.trim().eq_ignore_ascii_case("env") {
        let v = env::var(env_key).map_err(|_| anyhow!("Missing {env_key} env var"))?;
        if v.trim().is_empty() {
            bail!("{env_key} is empty");
        }
        Ok(v)
    } else {
        Ok(value.to_string())
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let mut cfg = parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing config {}", path.display()))?;
    cfg.apply_env_overrides();
    Ok(cfg)
}

/// Load config using env var + fallbacks (see module docs).
pub fn load_default() -> Result<AppConfig> {
    if let Ok(p) = env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
    }
    for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_from(&p);
        }
    }
    tracing::info!("no config file found, using built-in defaults");
    let mut cfg = AppConfig::default();
    cfg.apply_env_overrides();
    Ok(cfg)
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        _ => {
            if let Ok(v) = serde_json::from_str(s) {
                return Ok(v);
            }
            toml::from_str(s).map_err(|e| anyhow!("unsupported config format: {e}"))
        }
    }
}
