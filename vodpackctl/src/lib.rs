use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use thiserror::Error;
use vodpack_core::config::load_config;
use vodpack_core::job::{JobParams, JobReport, JobRunner};
use vodpack_core::ladder::{select_ladder, RenditionProfile};
use vodpack_core::probe::{MediaProber, SourceAsset};
use vodpack_core::storage::RcloneStore;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] vodpack_core::ConfigError),
    #[error("probe error: {0}")]
    Probe(#[from] vodpack_core::ProbeError),
    #[error("job failed: {0}")]
    Job(#[from] vodpack_core::JobError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Adaptive-bitrate packaging pipeline", long_about = None)]
pub struct Cli {
    /// Path to the pipeline config
    #[arg(long, default_value = "configs/vodpack.toml")]
    pub config: PathBuf,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcode one source object into a published HLS package
    Run(RunArgs),
    /// Print the native resolution of a local media file
    Probe(ProbeArgs),
    /// Print the rendition ladder selected for a source height
    Ladder(LadderArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Object key of the source video
    #[arg(long)]
    pub source_key: String,
    /// Bucket holding the source and receiving the package
    #[arg(long)]
    pub bucket: String,
    /// Prefix inserted between the source directory and the package
    #[arg(long, default_value = "hls-output")]
    pub output_prefix: String,
    /// Job identifier reported to the callback (generated when omitted)
    #[arg(long)]
    pub job_id: Option<String>,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Local media file
    pub input: PathBuf,
}

#[derive(Args, Debug)]
pub struct LadderArgs {
    /// Native height in pixels
    pub height: u32,
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;

    match &cli.command {
        Commands::Run(args) => {
            let params = JobParams::new(
                args.source_key.clone(),
                args.bucket.clone(),
                args.output_prefix.clone(),
                args.job_id.clone(),
            );
            let store = Arc::new(RcloneStore::new(
                PathBuf::from(&config.publish.rclone),
                format!("{}:{}", config.publish.remote, args.bucket),
                None,
            ));
            let runner = JobRunner::new(config, store, None);
            let report = runner.run(&params).await?;
            render(&report, cli.format)?;
        }
        Commands::Probe(args) => {
            let prober = MediaProber::new(PathBuf::from(&config.paths.ffprobe), None);
            let asset = prober.probe(&args.input).await?;
            render(&ProbeOutput::from(&asset), cli.format)?;
        }
        Commands::Ladder(args) => {
            render(&LadderOutput::for_height(args.height), cli.format)?;
        }
    }

    Ok(())
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

impl DisplayFallback for JobReport {
    fn display(&self) -> String {
        match &self.manifest_url {
            Some(url) => format!(
                "job {}: success, {} renditions, manifest at {}",
                self.job_id,
                self.renditions.len(),
                url
            ),
            None => format!(
                "job {}: failed ({})",
                self.job_id,
                self.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProbeOutput {
    pub width: u32,
    pub height: u32,
    pub resolution: String,
}

impl From<&SourceAsset> for ProbeOutput {
    fn from(asset: &SourceAsset) -> Self {
        Self {
            width: asset.width,
            height: asset.height,
            resolution: asset.resolution_label(),
        }
    }
}

impl DisplayFallback for ProbeOutput {
    fn display(&self) -> String {
        self.resolution.clone()
    }
}

#[derive(Debug, Serialize)]
pub struct LadderOutput {
    pub source_height: u32,
    pub renditions: Vec<LadderRow>,
}

#[derive(Debug, Serialize)]
pub struct LadderRow {
    pub name: String,
    pub resolution: String,
    pub bitrate_kbps: u32,
    pub bandwidth: u64,
}

impl LadderOutput {
    pub fn for_height(height: u32) -> Self {
        Self {
            source_height: height,
            renditions: select_ladder(height)
                .into_iter()
                .map(LadderRow::from)
                .collect(),
        }
    }
}

impl From<RenditionProfile> for LadderRow {
    fn from(profile: RenditionProfile) -> Self {
        Self {
            name: profile.name.to_string(),
            resolution: profile.resolution(),
            bitrate_kbps: profile.bitrate_kbps,
            bandwidth: profile.bandwidth_bps(),
        }
    }
}

impl DisplayFallback for LadderOutput {
    fn display(&self) -> String {
        if self.renditions.is_empty() {
            return format!("no rendition fits a source of height {}", self.source_height);
        }
        self.renditions
            .iter()
            .map(|row| {
                format!(
                    "{}  {}  {}k",
                    row.name, row.resolution, row.bitrate_kbps
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
