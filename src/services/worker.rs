use crate::models::CleanupTask;
use crate::services::cleanup::sweep_directory;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};

/// Periodic sweep of the scratch directory.
///
/// Constructed once at startup. The first pass runs immediately so files
/// orphaned by a previous process are reclaimed without waiting a full
/// interval. A failing pass is logged and the schedule carries on.
pub struct CleanupScheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl CleanupScheduler {
    pub fn start(task: CleanupTask, every: Duration) -> Self {
        tracing::info!(
            "🚀 Cleanup scheduler started: {} every {:?}, max age {} min",
            task.directory.display(),
            every,
            task.max_age_minutes
        );
        let task = Arc::new(task);
        Self::start_with(every, move || sweep_pass(task.clone()))
    }

    /// Runs `pass` on the schedule. A pass that panics is logged and the
    /// next tick runs as usual.
    pub fn start_with<F, Fut>(every: Duration, pass: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(every, pass, shutdown_rx));
        Self { shutdown, handle }
    }

    /// Signals the loop and waits for an in-progress pass to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!("Cleanup scheduler ended abnormally: {}", e);
        }
    }
}

async fn run<F, Fut>(every: Duration, pass: F, mut shutdown: watch::Receiver<bool>)
where
    F: Fn() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("🛑 Cleanup scheduler shutting down");
                break;
            }
            _ = ticker.tick() => {
                if AssertUnwindSafe(pass()).catch_unwind().await.is_err() {
                    tracing::error!("Cleanup pass panicked; continuing on schedule");
                }
            }
        }
    }
}

async fn sweep_pass(task: Arc<CleanupTask>) {
    let report = sweep_directory(&task).await;
    tracing::debug!(
        "Sweep of {} done: scanned={} removed={} failed={}",
        task.directory.display(),
        report.scanned,
        report.removed,
        report.failed
    );
}
