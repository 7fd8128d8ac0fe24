// src/ingest/scheduler.rs
use std::future::Future;
use std::time::Duration;

use metrics::counter;
use tokio::time::MissedTickBehavior;

/// Run `pass` every `interval`, first tick immediately. A failed pass is
/// logged and the loop keeps going. Never returns; drop or abort the task
/// (or race it against a shutdown signal) to stop.
pub async fn run_scheduled<F, Fut>(interval: Duration, mut pass: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let mut ticker = tokio::time::interval(interval);
    // A pass that overruns the interval should not cause a burst of catch-up runs.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        counter!("finder_scheduled_runs_total").increment(1);
        if let Err(e) = pass().await {
            tracing::error!(target: "runner", error = ?e, "scheduled pass failed");
        }
        tracing::debug!(target: "runner", next_in = ?interval, "waiting for next pass");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn failing_pass_does_not_stop_the_loop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let handle = tokio::spawn(run_scheduled(Duration::from_secs(60), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(anyhow::anyhow!("boom"))
            }
        }));

        tokio::time::sleep(Duration::from_secs(125)).await;
        handle.abort();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
