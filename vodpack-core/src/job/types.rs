use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Parameters handed in by the dispatch layer for one job.
#[derive(Debug, Clone)]
pub struct JobParams {
    pub job_id: String,
    pub source_key: String,
    pub bucket: String,
    pub output_prefix: String,
}

impl JobParams {
    pub fn new(
        source_key: impl Into<String>,
        bucket: impl Into<String>,
        output_prefix: impl Into<String>,
        job_id: Option<String>,
    ) -> Self {
        Self {
            job_id: job_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            source_key: source_key.into(),
            bucket: bucket.into(),
            output_prefix: output_prefix.into(),
        }
    }

    /// Remote directory that receives the whole package:
    /// `<source dir>/<output prefix>/<source stem>`.
    pub fn remote_base(&self) -> String {
        let key = Path::new(&self.source_key);
        let stem = key
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.job_id.clone());
        let dir = key
            .parent()
            .map(|parent| parent.to_string_lossy().into_owned())
            .unwrap_or_default();
        if dir.is_empty() {
            format!("{}/{}", self.output_prefix, stem)
        } else {
            format!("{}/{}/{}", dir, self.output_prefix, stem)
        }
    }

    /// Extension of the source key, kept on the local copy so the
    /// inspector sees the original container hint.
    pub fn source_extension(&self) -> Option<String> {
        Path::new(&self.source_key)
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    Failed,
}

/// Terminal report for one job, also the webhook payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job_id: String,
    pub source_key: String,
    pub status: JobStatus,
    pub manifest_url: Option<String>,
    pub renditions: Vec<String>,
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl JobReport {
    pub fn success(params: &JobParams, manifest_url: String, renditions: Vec<String>) -> Self {
        Self {
            job_id: params.job_id.clone(),
            source_key: params.source_key.clone(),
            status: JobStatus::Success,
            manifest_url: Some(manifest_url),
            renditions,
            error: None,
            completed_at: Utc::now(),
        }
    }

    pub fn failure(params: &JobParams, error: String) -> Self {
        Self {
            job_id: params.job_id.clone(),
            source_key: params.source_key.clone(),
            status: JobStatus::Failed,
            manifest_url: None,
            renditions: Vec::new(),
            error: Some(error),
            completed_at: Utc::now(),
        }
    }
}

/// Scratch layout for one job under the configured work dir. The whole
/// root is removed when the job ends, success or not.
#[derive(Debug, Clone)]
pub struct StagingPaths {
    pub root: PathBuf,
    pub output: PathBuf,
}

impl StagingPaths {
    pub fn new(work_dir: &Path, job_id: &str) -> Self {
        let root = work_dir.join(job_id);
        let output = root.join("hls");
        Self { root, output }
    }

    pub fn source_file(&self, extension: Option<&str>) -> PathBuf {
        match extension {
            Some(ext) => self.root.join(format!("source.{ext}")),
            None => self.root.join("source"),
        }
    }
}
