pub mod config;
pub mod encode;
pub mod error;
pub mod exec;
pub mod job;
pub mod ladder;
pub mod manifest;
pub mod notify;
pub mod probe;
pub mod publish;
pub mod storage;

pub use config::{
    load_config, EncoderSection, PathsSection, PublishSection, VodpackConfig, WebhookSection,
};
pub use error::{ConfigError, Result};
pub use exec::{CommandExecutor, SystemCommandExecutor};
pub use job::{JobError, JobParams, JobReport, JobResult, JobRunner, JobStatus};
pub use ladder::{select_ladder, RenditionProfile, RENDITION_CATALOG};
pub use probe::{MediaProber, ProbeError, SourceAsset};
pub use storage::{ObjectStore, RcloneStore, StorageError};
