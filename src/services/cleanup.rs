//! Reclamation of scratch files.
//!
//! Nothing in this module returns an error to its caller. Deletion failures
//! are logged and the next sweep gets another chance at the file.

use crate::models::CleanupTask;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

/// Deletes each path. Already-missing files count as reclaimed.
pub async fn reclaim_files(paths: &[PathBuf]) -> usize {
    let mut reclaimed = 0;
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                reclaimed += 1;
                tracing::info!("🧹 Cleaned up: {}", display_name(path));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                reclaimed += 1;
            }
            Err(e) => {
                tracing::error!("Error cleaning up {}: {}", path.display(), e);
            }
        }
    }
    reclaimed
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Removes regular files in `task.directory` last modified more than
/// `task.max_age_minutes` ago.
pub async fn sweep_directory(task: &CleanupTask) -> SweepReport {
    sweep_directory_at(task, SystemTime::now()).await
}

/// [`sweep_directory`] against an explicit clock.
pub async fn sweep_directory_at(task: &CleanupTask, now: SystemTime) -> SweepReport {
    let mut report = SweepReport::default();
    let threshold = Duration::from_secs(task.max_age_minutes.saturating_mul(60));

    let mut entries = match tokio::fs::read_dir(&task.directory).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return report,
        Err(e) => {
            tracing::error!(
                "Error cleaning temp files in {}: {}",
                task.directory.display(),
                e
            );
            return report;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Error reading {}: {}", task.directory.display(), e);
                report.failed += 1;
                break;
            }
        };
        report.scanned += 1;

        let path = entry.path();
        let modified = match entry.metadata().await {
            Ok(meta) if meta.is_file() => meta.modified(),
            Ok(_) => continue,
            // Reclaimed by its request between listing and stat
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => Err(e),
        };

        let age = match modified {
            Ok(modified) => now.duration_since(modified).unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Cannot read mtime of {}: {}", path.display(), e);
                report.failed += 1;
                continue;
            }
        };

        if age <= threshold {
            continue;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => report.removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::error!("Failed to sweep {}: {}", path.display(), e);
                report.failed += 1;
            }
        }
    }

    if report.removed > 0 {
        tracing::info!("🧹 Cleaned up {} old temp files", report.removed);
    }
    report
}

#[derive(Debug)]
pub enum CleanupJob {
    Reclaim(Vec<PathBuf>),
    Sweep(CleanupTask),
}

/// Handle to the supervised executor that runs cleanup off the request path.
///
/// Jobs run as independent tasks; a panicking job is logged and does not
/// affect the others. The supervisor exits once every handle is dropped and
/// the jobs already submitted have finished.
#[derive(Clone)]
pub struct BackgroundCleanup {
    tx: mpsc::UnboundedSender<CleanupJob>,
}

impl BackgroundCleanup {
    pub fn start() -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let supervisor = tokio::spawn(supervise(rx));
        (Self { tx }, supervisor)
    }

    pub fn submit(&self, job: CleanupJob) {
        if let Err(e) = self.tx.send(job) {
            tracing::error!("Cleanup executor is gone, dropping job: {:?}", e.0);
        }
    }

    pub fn reclaim(&self, paths: Vec<PathBuf>) {
        if !paths.is_empty() {
            self.submit(CleanupJob::Reclaim(paths));
        }
    }
}

/// Queues its paths for background reclamation when dropped.
///
/// Covers the exits a caller cannot observe, such as a request future being
/// dropped at a deadline. Call [`ReclaimGuard::disarm`] once the paths are
/// someone else's responsibility.
pub struct ReclaimGuard {
    paths: Vec<PathBuf>,
    cleanup: BackgroundCleanup,
}

impl ReclaimGuard {
    pub fn new(cleanup: BackgroundCleanup, paths: Vec<PathBuf>) -> Self {
        Self { paths, cleanup }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn disarm(mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.paths)
    }
}

impl Drop for ReclaimGuard {
    fn drop(&mut self) {
        self.cleanup.reclaim(std::mem::take(&mut self.paths));
    }
}

async fn supervise(mut rx: mpsc::UnboundedReceiver<CleanupJob>) {
    let mut running = JoinSet::new();

    loop {
        tokio::select! {
            job = rx.recv() => match job {
                Some(job) => {
                    running.spawn(run_job(job));
                }
                None => break,
            },
            Some(done) = running.join_next(), if !running.is_empty() => {
                log_job_outcome(done);
            }
        }
    }

    while let Some(done) = running.join_next().await {
        log_job_outcome(done);
    }
    tracing::info!("🛑 Cleanup executor stopped");
}

async fn run_job(job: CleanupJob) {
    match job {
        CleanupJob::Reclaim(paths) => {
            reclaim_files(&paths).await;
        }
        CleanupJob::Sweep(task) => {
            sweep_directory(&task).await;
        }
    }
}

fn log_job_outcome(done: Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        tracing::error!("Background cleanup task failed: {}", e);
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
