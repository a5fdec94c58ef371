use std::path::PathBuf;

use thiserror::Error;

use crate::probe::ProbeError;
use crate::storage::StorageError;

/// Fatal causes only. Per-rendition and per-file failures are folded
/// into outcomes and counts instead of surfacing here.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("probe failed: {0}")]
    Probe(#[from] ProbeError),
    #[error("storage transfer failed: {0}")]
    Storage(#[from] StorageError),
    #[error("no rendition fits a {width}x{height} source")]
    NoEligibleRendition { width: u32, height: u32 },
    #[error("all {attempted} rendition encodes failed")]
    AllRenditionsFailed { attempted: usize },
    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
}

pub type JobResult<T> = Result<T, JobError>;
