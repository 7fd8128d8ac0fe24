// tests/metrics_run.rs
mod common;

use common::{fixed, raw, settings, FailingFetcher, RecordingNotifier};
use internship_finder::metrics::Metrics;
use internship_finder::store::MemoryBackend;
use internship_finder::{run_once, SeenStore, SourceFetcher};

#[tokio::test]
async fn run_exposes_finder_series_and_writes_textfile() {
    // Only test in this binary that installs the global recorder.
    let metrics = Metrics::init().expect("recorder");

    let fetchers: Vec<Box<dyn SourceFetcher>> = vec![
        Box::new(FailingFetcher("Broken")),
        fixed("Board", vec![raw("A", "Acme", "https://acme.com/a")]),
    ];
    let mut seen = SeenStore::new(MemoryBackend::new());
    let notifier = RecordingNotifier::new();
    run_once(&fetchers, &mut seen, &notifier, &settings())
        .await
        .unwrap();

    let out = metrics.render();
    for needle in [
        "finder_records_total",
        "finder_new_total",
        "finder_fetch_errors_total",
        "finder_notified_total",
        "finder_fetch_ms",
        "finder_last_run_ts",
    ] {
        assert!(out.contains(needle), "missing {needle} in:\n{out}");
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("textfile").join("finder.prom");
    metrics.write_textfile(&path).unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("finder_new_total"));
    assert!(!path.with_extension("prom.tmp").exists());
}
