use std::io;

use brokerkb_core::config::ConfigError;
use brokerkb_core::index::IndexError;
use brokerkb_core::sync::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] brokerkb_core::Error),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Case ID cannot be empty")]
    EmptyCaseId,
    #[error("Case not found for id/prefix: {0}")]
    CaseNotFound(String),
    #[error("{0}")]
    AmbiguousCaseId(String),
    #[error("{failed} of {total} case(s) failed to sync")]
    SyncIncomplete { failed: usize, total: usize },
    #[error("Sync is not configured. Set DIFY_API_KEY and DIFY_DATASET_ID to enable `brokerkb sync`.")]
    SyncNotConfigured,
}
