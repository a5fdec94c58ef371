use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::encode::{EncodeOutcome, RENDITION_PLAYLIST};

/// File name of the top-level playlist, written once at the root of the
/// output tree after the encode phase settles.
pub const MASTER_PLAYLIST_NAME: &str = "master.m3u8";

#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub rendition: String,
    pub bandwidth: u64,
    pub resolution: String,
    pub playlist_url: String,
}

/// Top-level playlist referencing only the renditions that encoded
/// successfully, ordered by ascending bandwidth.
#[derive(Debug, Clone, Serialize)]
pub struct MasterManifest {
    entries: Vec<ManifestEntry>,
}

impl MasterManifest {
    /// `base_url` is the fully-qualified public location of the package
    /// root; each entry points at `<base_url>/<rendition>/playlist.m3u8`.
    pub fn assemble(outcomes: &[EncodeOutcome], base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let mut entries: Vec<ManifestEntry> = outcomes
            .iter()
            .filter(|outcome| outcome.success)
            .map(|outcome| ManifestEntry {
                rendition: outcome.profile.name.to_string(),
                bandwidth: outcome.profile.bandwidth_bps(),
                resolution: outcome.profile.resolution(),
                playlist_url: format!("{base}/{}/{RENDITION_PLAYLIST}", outcome.profile.name),
            })
            .collect();
        entries.sort_by_key(|entry| entry.bandwidth);
        Self { entries }
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn render(&self) -> String {
        let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
        for entry in &self.entries {
            playlist.push_str(&format!(
                "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}\n",
                entry.bandwidth, entry.resolution
            ));
            playlist.push_str(&format!("{}\n", entry.playlist_url));
        }
        playlist
    }

    pub async fn write(&self, output_root: &Path) -> std::io::Result<PathBuf> {
        let path = output_root.join(MASTER_PLAYLIST_NAME);
        tokio::fs::write(&path, self.render()).await?;
        Ok(path)
    }
}
