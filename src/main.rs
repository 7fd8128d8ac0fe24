//! internship-finder: binary entrypoint.
//! Loads config, wires fetchers, seen store and notifier, then runs one pass
//! (or loops when `schedule.interval_secs` is set).

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;

use internship_finder::config::{self, AppConfig};
use internship_finder::ingest::providers::build_fetchers;
use internship_finder::ingest::scheduler::run_scheduled;
use internship_finder::metrics::Metrics;
use internship_finder::notify::{build_notifier, Notifier};
use internship_finder::store::JsonFileBackend;
use internship_finder::{
    run_once, telemetry, Normalizer, RunSettings, RunSummary, SeenStore, SourceFetcher,
};

struct Pipeline {
    fetchers: Vec<Box<dyn SourceFetcher>>,
    seen: SeenStore,
    notifier: Box<dyn Notifier>,
    settings: RunSettings,
    metrics: Option<Metrics>,
    textfile: Option<std::path::PathBuf>,
}

impl Pipeline {
    fn build(cfg: &AppConfig) -> Result<Self> {
        let metrics = match Metrics::init() {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!(error = ?e, "metrics recorder not installed");
                None
            }
        };

        let normalizer = Normalizer::from_param_names(&cfg.tracking_params);
        Ok(Self {
            fetchers: build_fetchers(&cfg.fetchers),
            seen: SeenStore::new(JsonFileBackend::new(cfg.store.path.clone())),
            notifier: build_notifier(&cfg.notifier, cfg.timeout())?,
            settings: RunSettings::new(normalizer, cfg.timeout())
                .with_idle_summary(cfg.notify.idle_summary),
            metrics,
            textfile: cfg.metrics_textfile.clone(),
        })
    }

    async fn pass(&mut self) -> Result<RunSummary> {
        let summary = run_once(
            &self.fetchers,
            &mut self.seen,
            self.notifier.as_ref(),
            &self.settings,
        )
        .await?;

        if let (Some(m), Some(path)) = (&self.metrics, &self.textfile) {
            if let Err(e) = m.write_textfile(path) {
                tracing::warn!(error = ?e, path = %path.display(), "metrics textfile not written");
            }
        }
        Ok(summary)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    match run().await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = ?e, "internship-finder failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cfg = config::load_default()?;
    let mut pipeline = Pipeline::build(&cfg)?;

    let Some(interval) = cfg.interval() else {
        let summary = pipeline.pass().await?;
        // Source and delivery hiccups are retried by the next run; only an
        // unrecorded commit is worth a failing exit code.
        return Ok(if summary.commit_error.is_some() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        });
    };

    tracing::info!(?interval, "scheduled mode");
    let pipeline = Arc::new(Mutex::new(pipeline));
    let scheduled = run_scheduled(interval, move || {
        let pipeline = pipeline.clone();
        async move {
            let mut p = pipeline.lock().await;
            p.pass().await.map(|_| ())
        }
    });

    tokio::select! {
        _ = scheduled => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
        }
    }
    Ok(ExitCode::SUCCESS)
}
