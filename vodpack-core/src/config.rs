use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VodpackConfig {
    pub paths: PathsSection,
    pub encoder: EncoderSection,
    pub publish: PublishSection,
    pub webhook: WebhookSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    pub work_dir: String,
    pub ffmpeg: String,
    pub ffprobe: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncoderSection {
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub audio_channels: u8,
    pub audio_sample_rate: u32,
    pub segment_seconds: u32,
    pub timeout_seconds: u64,
    pub max_parallel: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishSection {
    pub rclone: String,
    pub remote: String,
    pub public_base_url: String,
    pub max_concurrent_uploads: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSection {
    pub url: Option<String>,
    pub attempts: u32,
    pub timeout_seconds: u64,
    pub retry_pause_seconds: u64,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<VodpackConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_fixture_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/vodpack.toml");
        let config = load_config(path).expect("config should parse");
        assert_eq!(config.encoder.video_codec, "libx264");
        assert_eq!(config.encoder.segment_seconds, 6);
        assert_eq!(config.encoder.max_parallel, 4);
        assert_eq!(config.publish.max_concurrent_uploads, 10);
        assert_eq!(config.webhook.attempts, 3);
        assert!(config.webhook.url.is_some());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_config("does/not/exist.toml").unwrap_err();
        assert!(err.to_string().contains("does/not/exist.toml"));
    }
}
