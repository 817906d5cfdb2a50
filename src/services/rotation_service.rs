use crate::api::error::AppError;
use crate::models::{CleanupTask, PublishedObject, StagedAsset, TranscodeResult};
use crate::services::cleanup::{BackgroundCleanup, CleanupJob, ReclaimGuard, reclaim_files};
use crate::services::probe::MetadataInspector;
use crate::services::publisher::Publisher;
use crate::services::rotation::resolve;
use crate::services::staging::StagingArea;
use crate::services::transcoder::Transcoder;
use std::path::PathBuf;
use std::sync::Arc;

/// A published rotation plus the scratch files the caller must hand back
/// to cleanup once the response is out.
#[derive(Debug)]
pub struct RotationOutcome {
    pub published: PublishedObject,
    pub transcode: TranscodeResult,
    pub scratch_files: Vec<PathBuf>,
}

/// Runs inspect → resolve → transcode → publish for one staged upload.
pub struct RotationService {
    staging: Arc<StagingArea>,
    inspector: Arc<dyn MetadataInspector>,
    transcoder: Arc<dyn Transcoder>,
    publisher: Publisher,
    cleanup: BackgroundCleanup,
    sweep: Option<CleanupTask>,
}

impl RotationService {
    pub fn new(
        staging: Arc<StagingArea>,
        inspector: Arc<dyn MetadataInspector>,
        transcoder: Arc<dyn Transcoder>,
        publisher: Publisher,
        cleanup: BackgroundCleanup,
    ) -> Self {
        Self {
            staging,
            inspector,
            transcoder,
            publisher,
            cleanup,
            sweep: None,
        }
    }

    /// Queue a sweep of the staging directory at the start of each request.
    pub fn with_request_sweep(mut self, max_age_minutes: u64) -> Self {
        self.sweep = Some(CleanupTask::new(self.staging.dir(), max_age_minutes));
        self
    }

    pub fn staging(&self) -> &Arc<StagingArea> {
        &self.staging
    }

    pub fn cleanup(&self) -> &BackgroundCleanup {
        &self.cleanup
    }

    /// On error every file this request created has already been removed. If
    /// the future is dropped midway, the files are queued for background
    /// reclamation instead.
    pub async fn rotate(&self, staged: StagedAsset) -> Result<RotationOutcome, AppError> {
        if let Some(task) = &self.sweep {
            self.cleanup.submit(CleanupJob::Sweep(task.clone()));
        }

        let output_path = self.staging.output_path_for(&staged);
        // Fires only if this future is dropped before either arm below runs
        let guard = ReclaimGuard::new(
            self.cleanup.clone(),
            vec![staged.path.clone(), output_path.clone()],
        );

        tracing::info!("🔄 Rotating video: {}", staged.path.display());

        match self.run_stages(&staged, output_path).await {
            Ok((transcode, published)) => Ok(RotationOutcome {
                published,
                transcode,
                scratch_files: guard.disarm(),
            }),
            Err(e) => {
                if e.is_processing() {
                    tracing::warn!("Rotation of {} failed: {}", staged.original_name, e);
                } else {
                    tracing::error!("Rotation of {} aborted: {}", staged.original_name, e);
                }
                reclaim_files(guard.paths()).await;
                guard.disarm();
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        staged: &StagedAsset,
        output_path: PathBuf,
    ) -> Result<(TranscodeResult, PublishedObject), AppError> {
        let metadata = self.inspector.inspect(&staged.path).await?;
        tracing::info!(
            "Video metadata: {}x{} rotation={}",
            metadata.width_px,
            metadata.height_px,
            metadata.rotation_degrees
        );

        let plan = resolve(metadata.rotation_degrees);
        let transcode = self
            .transcoder
            .transcode(&staged.path, &output_path, &metadata, &plan)
            .await?;

        let published = self.publisher.publish(&transcode).await?;
        Ok((transcode, published))
    }
}
