use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::exec::{CommandExecutor, SystemCommandExecutor};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transfer failed ({command}): {stderr}")]
    CommandFailure {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
}

/// Durable object storage as the pipeline sees it: a reliable get/put
/// keyed by string. Implementations carry the bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str, dest: &Path) -> Result<(), StorageError>;
    async fn put(&self, source: &Path, key: &str) -> Result<(), StorageError>;
}

/// rclone-backed store; `remote_root` is the configured remote plus
/// bucket, e.g. `s3:course-media`.
pub struct RcloneStore {
    rclone: PathBuf,
    remote_root: String,
    executor: Arc<dyn CommandExecutor>,
}

impl fmt::Debug for RcloneStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RcloneStore")
            .field("rclone", &self.rclone)
            .field("remote_root", &self.remote_root)
            .finish()
    }
}

impl RcloneStore {
    pub fn new(
        rclone: PathBuf,
        remote_root: impl Into<String>,
        executor: Option<Arc<dyn CommandExecutor>>,
    ) -> Self {
        let executor = executor.unwrap_or_else(|| Arc::new(SystemCommandExecutor));
        Self {
            rclone,
            remote_root: remote_root.into(),
            executor,
        }
    }

    fn remote_path(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.remote_root.trim_end_matches('/'),
            key.trim_start_matches('/')
        )
    }

    async fn transfer(&self, args: Vec<String>) -> Result<(), StorageError> {
        let mut command = Command::new(&self.rclone);
        for arg in &args {
            command.arg(arg);
        }
        let output = self
            .executor
            .run(&mut command)
            .await
            .map_err(StorageError::Io)?;
        if !output.status.success() {
            return Err(StorageError::CommandFailure {
                command: format!("{} {}", self.rclone.display(), args.join(" ")),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for RcloneStore {
    async fn get(&self, key: &str, dest: &Path) -> Result<(), StorageError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.transfer(vec![
            "copyto".to_string(),
            self.remote_path(key),
            dest.to_string_lossy().to_string(),
        ])
        .await
    }

    async fn put(&self, source: &Path, key: &str) -> Result<(), StorageError> {
        self.transfer(vec![
            "copyto".to_string(),
            source.to_string_lossy().to_string(),
            self.remote_path(key),
        ])
        .await
    }
}
