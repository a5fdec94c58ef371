mod command;

pub use command::{EncodeCommand, RENDITION_PLAYLIST};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::EncoderSection;
use crate::exec::{CommandExecutor, SystemCommandExecutor};
use crate::ladder::RenditionProfile;

/// Failure reason recorded when an encode exceeds its wall-clock budget.
pub const TIMEOUT_REASON: &str = "timeout";

/// Terminal record of one rendition encode. Produced exactly once per
/// attempted profile; the encoder folds every failure mode into it
/// instead of returning an error.
#[derive(Debug, Clone)]
pub struct EncodeOutcome {
    pub profile: RenditionProfile,
    pub success: bool,
    pub error: Option<String>,
    pub artifacts: Vec<PathBuf>,
}

impl EncodeOutcome {
    fn completed(profile: RenditionProfile, artifacts: Vec<PathBuf>) -> Self {
        Self {
            profile,
            success: true,
            error: None,
            artifacts,
        }
    }

    fn failed(profile: RenditionProfile, reason: impl Into<String>) -> Self {
        Self {
            profile,
            success: false,
            error: Some(reason.into()),
            artifacts: Vec::new(),
        }
    }

    pub fn rendition(&self) -> &str {
        self.profile.name
    }
}

pub struct RenditionEncoder {
    ffmpeg: PathBuf,
    settings: EncoderSection,
    executor: Arc<dyn CommandExecutor>,
}

impl RenditionEncoder {
    pub fn new(
        ffmpeg: PathBuf,
        settings: EncoderSection,
        executor: Option<Arc<dyn CommandExecutor>>,
    ) -> Self {
        let executor = executor.unwrap_or_else(|| Arc::new(SystemCommandExecutor));
        Self {
            ffmpeg,
            settings,
            executor,
        }
    }

    /// Encodes one rendition into `<output_root>/<profile name>/`. Never
    /// returns an error; whatever goes wrong ends up in the outcome so
    /// sibling encodes keep running.
    pub async fn encode(
        &self,
        input: &Path,
        output_root: &Path,
        profile: RenditionProfile,
        threads: usize,
    ) -> EncodeOutcome {
        let rendition_dir = output_root.join(profile.name);
        if let Err(err) = tokio::fs::create_dir_all(&rendition_dir).await {
            return EncodeOutcome::failed(
                profile,
                format!("create {}: {err}", rendition_dir.display()),
            );
        }

        let plan = EncodeCommand::new(input, &rendition_dir, profile, threads, &self.settings);
        let mut command = Command::new(&self.ffmpeg);
        for arg in plan.build_args() {
            command.arg(arg);
        }
        // Dropping the in-flight future on timeout must reap the encoder
        // process with it.
        command.kill_on_drop(true);

        info!(rendition = profile.name, "starting encode");
        let budget = Duration::from_secs(self.settings.timeout_seconds);
        let output = match timeout(budget, self.executor.run(&mut command)).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return EncodeOutcome::failed(profile, format!("failed to run encoder: {err}"))
            }
            Err(_) => {
                warn!(
                    rendition = profile.name,
                    seconds = self.settings.timeout_seconds,
                    "encode timed out"
                );
                return EncodeOutcome::failed(profile, TIMEOUT_REASON);
            }
        };

        if !output.status.success() {
            let detail = stderr_excerpt(&String::from_utf8_lossy(&output.stderr));
            warn!(
                rendition = profile.name,
                status = ?output.status.code(),
                "encoder exited with failure"
            );
            return EncodeOutcome::failed(profile, detail);
        }

        // The external tool can exit zero and still leave nothing behind.
        if !plan.playlist_path().exists() {
            return EncodeOutcome::failed(profile, "no output files");
        }
        let artifacts = match collect_artifacts(&rendition_dir).await {
            Ok(artifacts) => artifacts,
            Err(err) => {
                return EncodeOutcome::failed(
                    profile,
                    format!("list {}: {err}", rendition_dir.display()),
                )
            }
        };
        info!(
            rendition = profile.name,
            files = artifacts.len(),
            "encode completed"
        );
        EncodeOutcome::completed(profile, artifacts)
    }
}

/// Runs the ladder under a pool bounded to `min(ladder length,
/// max_parallel)` concurrent encoder processes, collecting outcomes in
/// completion order.
pub struct EncodePool {
    encoder: Arc<RenditionEncoder>,
    max_parallel: usize,
}

impl EncodePool {
    pub fn new(encoder: RenditionEncoder, max_parallel: usize) -> Self {
        Self {
            encoder: Arc::new(encoder),
            max_parallel: max_parallel.max(1),
        }
    }

    pub async fn encode_all(
        &self,
        input: &Path,
        output_root: &Path,
        ladder: &[RenditionProfile],
    ) -> Vec<EncodeOutcome> {
        let workers = ladder.len().min(self.max_parallel).max(1);
        let threads = threads_per_worker(workers);
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();
        for profile in ladder.iter().copied() {
            let encoder = Arc::clone(&self.encoder);
            let semaphore = Arc::clone(&semaphore);
            let input = input.to_path_buf();
            let output_root = output_root.to_path_buf();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                encoder.encode(&input, &output_root, profile, threads).await
            });
        }

        let mut outcomes = Vec::with_capacity(ladder.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => warn!(error = %err, "encode task aborted"),
            }
        }
        outcomes
    }
}

/// Splits the machine's cores across the pool so parallel encoder
/// processes do not each claim all of them.
fn threads_per_worker(workers: usize) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    (cores / workers.max(1)).max(1)
}

fn stderr_excerpt(stderr: &str) -> String {
    const LIMIT: usize = 500;
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return "unknown encoder error".to_string();
    }
    let mut start = trimmed.len().saturating_sub(LIMIT);
    while start > 0 && !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}

async fn collect_artifacts(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[cfg(unix)]
    use std::os::unix::process::ExitStatusExt;
    #[cfg(windows)]
    use std::os::windows::process::ExitStatusExt;

    fn exit_status(raw: i32) -> std::process::ExitStatus {
        std::process::ExitStatus::from_raw(raw)
    }

    fn output(raw: i32, stderr: &str) -> std::process::Output {
        std::process::Output {
            status: exit_status(raw),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    fn settings(timeout_seconds: u64) -> EncoderSection {
        EncoderSection {
            video_codec: "libx264".into(),
            preset: "veryfast".into(),
            crf: 23,
            audio_codec: "aac".into(),
            audio_bitrate: "128k".into(),
            audio_channels: 2,
            audio_sample_rate: 48000,
            segment_seconds: 6,
            timeout_seconds,
            max_parallel: 4,
        }
    }

    /// Drives the encode like a real ffmpeg would: writes the playlist
    /// and two segments on success, exits nonzero for listed renditions,
    /// sleeps forever for hanging ones.
    #[derive(Default)]
    struct FakeEncoder {
        fail: HashSet<&'static str>,
        hang: HashSet<&'static str>,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FakeEncoder {
        fn playlist_of(command: &Command) -> PathBuf {
            let last = command
                .as_std()
                .get_args()
                .last()
                .expect("ffmpeg invocation has arguments");
            PathBuf::from(last)
        }

        fn rendition_of(playlist: &Path) -> String {
            playlist
                .parent()
                .and_then(|dir| dir.file_name())
                .unwrap()
                .to_string_lossy()
                .to_string()
        }
    }

    #[async_trait]
    impl CommandExecutor for FakeEncoder {
        async fn run(&self, command: &mut Command) -> std::io::Result<std::process::Output> {
            let playlist = Self::playlist_of(command);
            let rendition = Self::rendition_of(&playlist);
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(running, Ordering::SeqCst);
            let result = if self.hang.contains(rendition.as_str()) {
                tokio::time::sleep(Duration::from_secs(86_400)).await;
                Ok(output(0, ""))
            } else if self.fail.contains(rendition.as_str()) {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(output(1, "Error while opening encoder for output stream"))
            } else {
                tokio::time::sleep(Duration::from_millis(10)).await;
                std::fs::write(&playlist, "#EXTM3U\n").unwrap();
                let dir = playlist.parent().unwrap();
                std::fs::write(dir.join("segment_000.ts"), b"ts").unwrap();
                std::fs::write(dir.join("segment_001.ts"), b"ts").unwrap();
                Ok(output(0, ""))
            };
            self.running.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    fn encoder_with(executor: Arc<FakeEncoder>, timeout_seconds: u64) -> RenditionEncoder {
        RenditionEncoder::new(
            PathBuf::from("ffmpeg"),
            settings(timeout_seconds),
            Some(executor),
        )
    }

    fn profile(name: &'static str) -> RenditionProfile {
        crate::ladder::RENDITION_CATALOG
            .iter()
            .copied()
            .find(|p| p.name == name)
            .unwrap()
    }

    #[tokio::test]
    async fn successful_encode_collects_artifacts() {
        let temp = TempDir::new().unwrap();
        let encoder = encoder_with(Arc::new(FakeEncoder::default()), 1800);
        let outcome = encoder
            .encode(Path::new("in.mp4"), temp.path(), profile("480p"), 2)
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.error, None);
        assert_eq!(outcome.artifacts.len(), 3);
        assert!(outcome
            .artifacts
            .iter()
            .any(|path| path.ends_with("480p/playlist.m3u8")));
    }

    #[tokio::test]
    async fn nonzero_exit_is_captured_not_raised() {
        let temp = TempDir::new().unwrap();
        let executor = Arc::new(FakeEncoder {
            fail: HashSet::from(["720p"]),
            ..FakeEncoder::default()
        });
        let encoder = encoder_with(executor, 1800);
        let outcome = encoder
            .encode(Path::new("in.mp4"), temp.path(), profile("720p"), 2)
            .await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("opening encoder"));
    }

    #[tokio::test]
    async fn clean_exit_without_playlist_is_a_failure() {
        let temp = TempDir::new().unwrap();
        // Exits zero without writing anything.
        struct SilentExecutor;
        #[async_trait]
        impl CommandExecutor for SilentExecutor {
            async fn run(
                &self,
                _command: &mut Command,
            ) -> std::io::Result<std::process::Output> {
                Ok(output(0, ""))
            }
        }
        let encoder = RenditionEncoder::new(
            PathBuf::from("ffmpeg"),
            settings(1800),
            Some(Arc::new(SilentExecutor)),
        );
        let outcome = encoder
            .encode(Path::new("in.mp4"), temp.path(), profile("480p"), 2)
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("no output files"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_reported_with_fixed_reason() {
        let temp = TempDir::new().unwrap();
        let executor = Arc::new(FakeEncoder {
            hang: HashSet::from(["1080p"]),
            ..FakeEncoder::default()
        });
        let encoder = encoder_with(executor, 5);
        let outcome = encoder
            .encode(Path::new("in.mp4"), temp.path(), profile("1080p"), 2)
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some(TIMEOUT_REASON));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_encode_does_not_block_siblings() {
        let temp = TempDir::new().unwrap();
        let executor = Arc::new(FakeEncoder {
            hang: HashSet::from(["720p"]),
            ..FakeEncoder::default()
        });
        let pool = EncodePool::new(encoder_with(Arc::clone(&executor), 5), 4);
        let ladder = crate::ladder::select_ladder(1080);
        let outcomes = pool
            .encode_all(Path::new("in.mp4"), temp.path(), &ladder)
            .await;
        assert_eq!(outcomes.len(), 3);
        let succeeded: Vec<&str> = outcomes
            .iter()
            .filter(|o| o.success)
            .map(|o| o.rendition())
            .collect();
        assert_eq!(succeeded.len(), 2);
        assert!(succeeded.contains(&"480p"));
        assert!(succeeded.contains(&"1080p"));
        let timed_out = outcomes.iter().find(|o| o.rendition() == "720p").unwrap();
        assert_eq!(timed_out.error.as_deref(), Some(TIMEOUT_REASON));
    }

    #[tokio::test]
    async fn pool_never_exceeds_its_bound() {
        let temp = TempDir::new().unwrap();
        let executor = Arc::new(FakeEncoder::default());
        let pool = EncodePool::new(encoder_with(Arc::clone(&executor), 1800), 2);
        let ladder = crate::ladder::select_ladder(1080);
        let outcomes = pool
            .encode_all(Path::new("in.mp4"), temp.path(), &ladder)
            .await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.success));
        assert!(executor.peak.load(Ordering::SeqCst) <= 2);
        assert!(executor.peak.load(Ordering::SeqCst) >= 1);
    }
}
