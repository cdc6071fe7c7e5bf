use crate::executor::ExecutorError;
use crate::worker::RunOutcome;
use std::path::PathBuf;
use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error("no training progress recorded at {}", .0.display())]
    ProgressNotFound(PathBuf),

    #[error("training progress at {} is corrupt: {reason}", path.display())]
    ProgressCorrupt { path: PathBuf, reason: String },

    #[error("tokenizer index error: {0}")]
    TokenizerConfig(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("checkpoint {} could not be written: {reason}", dir.display())]
    Checkpoint { dir: PathBuf, reason: String },

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// The epoch loop stopped on a fatal error. Progress was flushed before
    /// this was returned and `outcome` holds the summary at that point.
    #[error("training failed after {} epoch(s): {source}", outcome.epochs_completed)]
    RunFailed {
        outcome: RunOutcome,
        #[source]
        source: Box<TrainingError>,
    },

    #[error("supervised task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl TrainingError {
    /// Summary of a run that stopped on a fatal error, if this is one.
    #[must_use]
    pub fn outcome(&self) -> Option<&RunOutcome> {
        match self {
            Self::RunFailed { outcome, .. } => Some(outcome),
            _ => None,
        }
    }
}
