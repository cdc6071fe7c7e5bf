use crate::dataset::DatasetHandle;
use crate::error::{TrainingError, TrainingResult};
use crate::layout::ModelLayout;
use crate::schedule::CheckpointCadence;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How many epochs a run may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpochLimit {
    /// Stop after this many epochs in the current process.
    Bounded(u64),
    /// Train until the operator asks to stop.
    Continuous,
}

impl EpochLimit {
    /// Maps the command-line convention (negative means "forever").
    #[must_use]
    pub fn from_target(target_epochs: i64) -> Self {
        u64::try_from(target_epochs).map_or(Self::Continuous, Self::Bounded)
    }

    #[must_use]
    pub fn allows(self, epochs_completed: u64) -> bool {
        match self {
            Self::Bounded(max) => epochs_completed < max,
            Self::Continuous => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingDevice {
    Cpu,
    Gpu,
}

impl TrainingDevice {
    #[must_use]
    pub fn from_gpu_flag(gpu: bool) -> Self {
        if gpu { Self::Gpu } else { Self::Cpu }
    }
}

/// Everything the supervisor needs to run one training session.
#[derive(Debug, Clone)]
pub struct TrainingRunSpec {
    pub layout: ModelLayout,
    /// Project-relative path of the tokenizer index used by this invocation.
    pub tokenizer_index: PathBuf,
    pub dataset: DatasetHandle,
    pub epoch_limit: EpochLimit,
    pub steps_per_epoch: u64,
    pub sample_interval: u64,
    pub checkpoint_every_epochs: i64,
    pub device: TrainingDevice,
}

impl TrainingRunSpec {
    pub fn validate(&self) -> TrainingResult<()> {
        if self.steps_per_epoch == 0 {
            return Err(TrainingError::InvalidConfig(
                "steps per epoch must be >= 1".to_string(),
            ));
        }
        if self.sample_interval == 0 {
            return Err(TrainingError::InvalidConfig(
                "sample interval must be >= 1".to_string(),
            ));
        }
        self.cadence()?;
        Ok(())
    }

    pub fn cadence(&self) -> TrainingResult<CheckpointCadence> {
        CheckpointCadence::new(self.checkpoint_every_epochs)
    }
}
