//! Executors run the actual training steps. The supervisor only tells them
//! how many steps to take and where to put snapshots.

pub mod bigram;
pub mod command;

pub use bigram::BigramExecutor;
pub use command::CommandExecutor;

use crate::dataset::DatasetHandle;
use crate::job::TrainingDevice;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("executor failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// One epoch of work.
#[derive(Debug, Clone, Copy)]
pub struct EpochRequest<'a> {
    pub output_dir: &'a Path,
    pub dataset: &'a DatasetHandle,
    pub steps: u64,
    pub sample_interval: u64,
    pub device: TrainingDevice,
}

/// Blocking training backend. Called from a single worker thread.
pub trait EpochExecutor: Send {
    fn id(&self) -> &'static str;

    /// Train for exactly `request.steps` steps.
    fn run_epoch(&mut self, request: &EpochRequest<'_>) -> Result<(), ExecutorError>;

    /// Write the full model state into `destination`, which already exists.
    fn save_snapshot(&self, destination: &Path) -> Result<(), ExecutorError>;
}
