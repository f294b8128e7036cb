use petwalk_core::CoreResult;
use petwalk_notify::{NotificationScheduler, SweepReport};
use prometheus::IntCounterVec;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

fn record(counter: &IntCounterVec, sweep: &str, report: &SweepReport) {
    counter.with_label_values(&[sweep, "sent"]).inc_by(report.sent as u64);
    counter.with_label_values(&[sweep, "skipped"]).inc_by(report.skipped as u64);
    counter.with_label_values(&[sweep, "failed"]).inc_by(report.failed as u64);
}

/// One periodic sweep on its own task. A failed pass is logged and the next
/// tick retries.
fn spawn_sweep<F, Fut>(sweep: &'static str, period: Duration, counter: IntCounterVec, run: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = CoreResult<SweepReport>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match run().await {
                Ok(report) => record(&counter, sweep, &report),
                Err(e) => error!(sweep, "Sweep failed: {}", e),
            }
        }
    })
}

/// Starts the progress and stationary sweeps as independent tasks, so a slow
/// pass of one never delays the other.
pub fn start_notification_worker(scheduler: Arc<NotificationScheduler>, counter: IntCounterVec) -> [JoinHandle<()>; 2] {
    let rules = scheduler.rules().clone();
    scheduler.set_enabled(true);
    info!(
        progress_secs = rules.progress_interval_seconds,
        stationary_secs = rules.stationary_interval_seconds,
        "Notification worker started"
    );

    let progress_scheduler = scheduler.clone();
    let progress = spawn_sweep(
        "progress",
        Duration::from_secs(rules.progress_interval_seconds.max(1)),
        counter.clone(),
        move || {
            let scheduler = progress_scheduler.clone();
            async move { scheduler.progress_sweep().await }
        },
    );
    let stationary = spawn_sweep(
        "stationary",
        Duration::from_secs(rules.stationary_interval_seconds.max(1)),
        counter,
        move || {
            let scheduler = scheduler.clone();
            async move { scheduler.stationary_sweep().await }
        },
    );
    [progress, stationary]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Opts;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> IntCounterVec {
        IntCounterVec::new(Opts::new("sweeps_total", "sweep outcomes"), &["sweep", "outcome"]).unwrap()
    }

    #[tokio::test]
    async fn test_stuck_sweep_does_not_block_the_other() {
        let counter = counter();
        let stuck = spawn_sweep("progress", Duration::from_millis(10), counter.clone(), || {
            std::future::pending::<CoreResult<SweepReport>>()
        });

        let passes = Arc::new(AtomicUsize::new(0));
        let seen = passes.clone();
        let live = spawn_sweep("stationary", Duration::from_millis(10), counter.clone(), move || {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(SweepReport {
                    sent: 1,
                    ..Default::default()
                })
            }
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        stuck.abort();
        live.abort();

        assert!(passes.load(Ordering::SeqCst) >= 2);
        assert!(counter.with_label_values(&["stationary", "sent"]).get() >= 2);
        assert_eq!(counter.with_label_values(&["progress", "sent"]).get(), 0);
    }
}
