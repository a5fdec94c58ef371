use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::storage::ObjectStore;

/// Tally of the publish phase. Lives only long enough to be logged and
/// folded into the job report.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PublishResult {
    pub attempted: usize,
    pub uploaded: usize,
}

impl PublishResult {
    pub fn is_complete(&self) -> bool {
        self.uploaded == self.attempted
    }
}

/// Uploads every file under a local tree, bounded to a fixed number of
/// concurrent transfers. Individual upload failures are counted, never
/// propagated.
pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    max_concurrent: usize,
}

impl Publisher {
    pub fn new(store: Arc<dyn ObjectStore>, max_concurrent: usize) -> Self {
        Self {
            store,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub async fn publish_tree(&self, local_root: &Path, remote_prefix: &str) -> PublishResult {
        let prefix = remote_prefix.trim_matches('/');
        let uploads: Vec<(PathBuf, String)> = collect_files(local_root)
            .into_iter()
            .filter_map(|path| {
                let key = destination_key(prefix, local_root, &path)?;
                Some((path, key))
            })
            .collect();
        let attempted = uploads.len();
        info!(files = attempted, prefix, "publishing output tree");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();
        for (path, key) in uploads {
            let store = Arc::clone(&self.store);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                match store.put(&path, &key).await {
                    Ok(()) => {
                        debug!(key = %key, "uploaded");
                        true
                    }
                    Err(err) => {
                        warn!(key = %key, error = %err, "upload failed");
                        false
                    }
                }
            });
        }

        let mut uploaded = 0;
        while let Some(joined) = tasks.join_next().await {
            if matches!(joined, Ok(true)) {
                uploaded += 1;
            }
        }
        let result = PublishResult {
            attempted,
            uploaded,
        };
        if result.is_complete() {
            info!(uploaded, "publish complete");
        } else {
            warn!(attempted, uploaded, "publish finished with missing artifacts");
        }
        result
    }
}

fn collect_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

fn destination_key(prefix: &str, root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let relative = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if prefix.is_empty() {
        Some(relative)
    } else {
        Some(format!("{prefix}/{relative}"))
    }
}
