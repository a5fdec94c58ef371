mod error;
mod types;

pub use error::{JobError, JobResult};
pub use types::{JobParams, JobReport, JobStatus, StagingPaths};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::VodpackConfig;
use crate::encode::{EncodeOutcome, EncodePool, RenditionEncoder};
use crate::exec::{CommandExecutor, SystemCommandExecutor};
use crate::ladder::select_ladder;
use crate::manifest::{MasterManifest, MASTER_PLAYLIST_NAME};
use crate::notify::WebhookNotifier;
use crate::probe::MediaProber;
use crate::publish::Publisher;
use crate::storage::ObjectStore;

/// Drives one job end to end: fetch, probe, ladder, encode, manifest,
/// publish, report. Owns the stage components; the store and the
/// executor are injected so tests can script them.
pub struct JobRunner {
    config: Arc<VodpackConfig>,
    prober: MediaProber,
    pool: EncodePool,
    publisher: Publisher,
    store: Arc<dyn ObjectStore>,
    notifier: Option<WebhookNotifier>,
}

impl JobRunner {
    pub fn new(
        config: VodpackConfig,
        store: Arc<dyn ObjectStore>,
        executor: Option<Arc<dyn CommandExecutor>>,
    ) -> Self {
        let executor =
            executor.unwrap_or_else(|| Arc::new(SystemCommandExecutor) as Arc<dyn CommandExecutor>);
        let prober = MediaProber::new(
            PathBuf::from(&config.paths.ffprobe),
            Some(Arc::clone(&executor)),
        );
        let encoder = RenditionEncoder::new(
            PathBuf::from(&config.paths.ffmpeg),
            config.encoder.clone(),
            Some(Arc::clone(&executor)),
        );
        let pool = EncodePool::new(encoder, config.encoder.max_parallel);
        let publisher = Publisher::new(Arc::clone(&store), config.publish.max_concurrent_uploads);
        let notifier = WebhookNotifier::from_config(&config.webhook);
        Self {
            config: Arc::new(config),
            prober,
            pool,
            publisher,
            store,
            notifier,
        }
    }

    pub fn with_notifier(mut self, notifier: Option<WebhookNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Runs the job and delivers the terminal report to the webhook,
    /// success or failure, before returning. The returned error is the
    /// fatal cause, already reported.
    pub async fn run(&self, params: &JobParams) -> JobResult<JobReport> {
        info!(job_id = %params.job_id, key = %params.source_key, "job started");
        let staging = StagingPaths::new(Path::new(&self.config.paths.work_dir), &params.job_id);
        let result = self.execute(params, &staging).await;
        let report = match &result {
            Ok(report) => report.clone(),
            Err(err) => {
                warn!(job_id = %params.job_id, error = %err, "job failed");
                JobReport::failure(params, err.to_string())
            }
        };
        if let Some(notifier) = &self.notifier {
            notifier.deliver(&report).await;
        }
        self.cleanup_staging(&staging).await;
        result
    }

    async fn execute(&self, params: &JobParams, staging: &StagingPaths) -> JobResult<JobReport> {
        tokio::fs::create_dir_all(&staging.output)
            .await
            .map_err(|source| JobError::Io {
                path: staging.output.clone(),
                source,
            })?;

        let source_file = staging.source_file(params.source_extension().as_deref());
        info!(key = %params.source_key, "fetching source");
        self.store.get(&params.source_key, &source_file).await?;

        let asset = self.prober.probe(&source_file).await?;
        let ladder = select_ladder(asset.height);
        if ladder.is_empty() {
            return Err(JobError::NoEligibleRendition {
                width: asset.width,
                height: asset.height,
            });
        }
        info!(
            source = %asset.resolution_label(),
            renditions = ladder.len(),
            "selected rendition ladder"
        );

        let outcomes = self
            .pool
            .encode_all(&source_file, &staging.output, &ladder)
            .await;
        for outcome in outcomes.iter().filter(|outcome| !outcome.success) {
            warn!(
                rendition = outcome.rendition(),
                reason = outcome.error.as_deref().unwrap_or("unknown"),
                "rendition failed"
            );
        }
        let succeeded: Vec<EncodeOutcome> = outcomes
            .iter()
            .filter(|outcome| outcome.success)
            .cloned()
            .collect();
        if succeeded.is_empty() {
            return Err(JobError::AllRenditionsFailed {
                attempted: ladder.len(),
            });
        }

        let remote_base = params.remote_base();
        let public_base = format!(
            "{}/{}",
            self.config.publish.public_base_url.trim_end_matches('/'),
            remote_base
        );
        let manifest = MasterManifest::assemble(&succeeded, &public_base);
        manifest
            .write(&staging.output)
            .await
            .map_err(|source| JobError::Io {
                path: staging.output.join(MASTER_PLAYLIST_NAME),
                source,
            })?;

        // Upload failures are counted, not reconciled against the
        // manifest entries.
        let publish = self.publisher.publish_tree(&staging.output, &remote_base).await;
        info!(
            attempted = publish.attempted,
            uploaded = publish.uploaded,
            "publish phase finished"
        );

        let manifest_url = format!("{public_base}/{MASTER_PLAYLIST_NAME}");
        let renditions = manifest
            .entries()
            .iter()
            .map(|entry| entry.rendition.clone())
            .collect();
        info!(job_id = %params.job_id, manifest = %manifest_url, "job completed");
        Ok(JobReport::success(params, manifest_url, renditions))
    }

    async fn cleanup_staging(&self, staging: &StagingPaths) {
        if let Err(err) = tokio::fs::remove_dir_all(&staging.root).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %staging.root.display(), error = %err, "failed to clean staging directory");
            }
        }
    }
}
