use std::path::{Path, PathBuf};

use crate::config::EncoderSection;
use crate::ladder::RenditionProfile;

/// File name of the per-rendition media playlist the encoder must leave
/// behind in the rendition directory.
pub const RENDITION_PLAYLIST: &str = "playlist.m3u8";

/// Typed builder for one ffmpeg invocation. The argument list is fixed
/// per profile so it can be reviewed by tests instead of assembled ad hoc
/// at the call site.
#[derive(Debug, Clone)]
pub struct EncodeCommand {
    input: PathBuf,
    playlist: PathBuf,
    profile: RenditionProfile,
    threads: usize,
    settings: EncoderSection,
}

impl EncodeCommand {
    pub fn new(
        input: &Path,
        rendition_dir: &Path,
        profile: RenditionProfile,
        threads: usize,
        settings: &EncoderSection,
    ) -> Self {
        Self {
            input: input.to_path_buf(),
            playlist: rendition_dir.join(RENDITION_PLAYLIST),
            profile,
            threads: threads.max(1),
            settings: settings.clone(),
        }
    }

    pub fn playlist_path(&self) -> &Path {
        &self.playlist
    }

    pub fn build_args(&self) -> Vec<String> {
        let profile = &self.profile;
        let settings = &self.settings;
        vec![
            "-i".to_string(),
            self.input.to_string_lossy().to_string(),
            "-threads".to_string(),
            self.threads.to_string(),
            "-vf".to_string(),
            format!("scale={}:{}", profile.width, profile.height),
            "-c:v".to_string(),
            settings.video_codec.clone(),
            "-preset".to_string(),
            settings.preset.clone(),
            "-crf".to_string(),
            settings.crf.to_string(),
            "-b:v".to_string(),
            format!("{}k", profile.bitrate_kbps),
            "-maxrate".to_string(),
            format!("{}k", profile.bitrate_kbps),
            "-bufsize".to_string(),
            format!("{}k", profile.bitrate_kbps * 2),
            "-c:a".to_string(),
            settings.audio_codec.clone(),
            "-b:a".to_string(),
            settings.audio_bitrate.clone(),
            "-ac".to_string(),
            settings.audio_channels.to_string(),
            "-ar".to_string(),
            settings.audio_sample_rate.to_string(),
            "-hls_time".to_string(),
            settings.segment_seconds.to_string(),
            "-hls_list_size".to_string(),
            "0".to_string(),
            "-hls_flags".to_string(),
            "independent_segments".to_string(),
            "-f".to_string(),
            "hls".to_string(),
            self.playlist.to_string_lossy().to_string(),
        ]
    }
}
