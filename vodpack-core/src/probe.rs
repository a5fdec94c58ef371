use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::exec::{CommandExecutor, SystemCommandExecutor};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("inspector failed ({command}): {stderr}")]
    CommandFailure {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("could not read stream dimensions of {input} from {output:?}")]
    UnreadableDimensions { input: PathBuf, output: String },
    #[error("source reports a zero dimension ({width}x{height})")]
    ZeroDimension { width: u32, height: u32 },
}

/// A probed source video. Immutable after the probe; later stages only
/// ever read it.
#[derive(Debug, Clone)]
pub struct SourceAsset {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl SourceAsset {
    pub fn resolution_label(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

pub struct MediaProber {
    ffprobe: PathBuf,
    executor: Arc<dyn CommandExecutor>,
}

impl MediaProber {
    pub fn new(ffprobe: PathBuf, executor: Option<Arc<dyn CommandExecutor>>) -> Self {
        let executor = executor.unwrap_or_else(|| Arc::new(SystemCommandExecutor));
        Self { ffprobe, executor }
    }

    pub async fn probe(&self, input: &Path) -> Result<SourceAsset, ProbeError> {
        let args = probe_args(input);
        let mut command = Command::new(&self.ffprobe);
        for arg in &args {
            command.arg(arg);
        }
        let output = self.executor.run(&mut command).await?;
        if !output.status.success() {
            return Err(ProbeError::CommandFailure {
                command: format!("{} {}", self.ffprobe.display(), args.join(" ")),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout.lines().next().unwrap_or_default().trim();
        let (width, height) =
            parse_dimensions(line).ok_or_else(|| ProbeError::UnreadableDimensions {
                input: input.to_path_buf(),
                output: line.to_string(),
            })?;
        if width == 0 || height == 0 {
            return Err(ProbeError::ZeroDimension { width, height });
        }
        debug!(width, height, input = %input.display(), "probed source resolution");
        Ok(SourceAsset {
            path: input.to_path_buf(),
            width,
            height,
        })
    }
}

fn probe_args(input: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-select_streams".to_string(),
        "v:0".to_string(),
        "-show_entries".to_string(),
        "stream=width,height".to_string(),
        "-of".to_string(),
        "csv=s=x:p=0".to_string(),
        input.to_string_lossy().to_string(),
    ]
}

fn parse_dimensions(line: &str) -> Option<(u32, u32)> {
    let (width, height) = line.split_once('x')?;
    Some((width.trim().parse().ok()?, height.trim().parse().ok()?))
}
