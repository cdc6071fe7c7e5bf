//! The epoch loop.
//!
//! ```text
//! Idle ──> Running ──┬──> Stopping   (shutdown requested)
//!                    ├──> Completed  (epoch limit reached)
//!                    └──> Failed     (executor or progress save failed)
//! ```
//!
//! The shutdown signal is only looked at between epochs. Every completed
//! epoch is persisted before the next one is considered, and progress is
//! persisted once more on every exit path.

use crate::error::{TrainingError, TrainingResult};
use crate::executor::{EpochExecutor, EpochRequest};
use crate::job::TrainingRunSpec;
use crate::layout::METADATA_FILE_NAME;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::schedule::{CheckpointCadence, should_checkpoint};
use crate::shutdown::ShutdownSignal;
use crate::store::{ProgressStore, TrainingProgress};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Running,
    Stopping,
    Completed,
    Failed,
}

/// Summary of a run, reported on every exit path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub state: WorkerState,
    /// Epochs completed by this process.
    pub epochs_completed: u64,
    /// Steps completed by this process.
    pub steps_completed: u64,
    /// Cumulative steps for the model, including earlier runs.
    pub training_iterations: u64,
}

pub struct TrainingWorker {
    spec: TrainingRunSpec,
    executor: Box<dyn EpochExecutor>,
    signal: ShutdownSignal,
    sink: Arc<dyn ProgressSink>,
    store: ProgressStore,
    state: WorkerState,
    epochs_completed: u64,
    epochs_since_checkpoint: u32,
}

impl TrainingWorker {
    #[must_use]
    pub fn new(
        spec: TrainingRunSpec,
        executor: Box<dyn EpochExecutor>,
        signal: ShutdownSignal,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        let store = ProgressStore::new(spec.layout.metadata_path());
        Self {
            spec,
            executor,
            signal,
            sink,
            store,
            state: WorkerState::Idle,
            epochs_completed: 0,
            epochs_since_checkpoint: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Run epochs until the limit is reached, shutdown is requested, or an
    /// epoch fails.
    ///
    /// Errors raised before the first epoch (bad configuration, corrupt
    /// progress) are returned as is. Errors from inside the loop are wrapped
    /// in [`TrainingError::RunFailed`] after progress has been flushed.
    pub fn run(&mut self) -> TrainingResult<RunOutcome> {
        let cadence = self.spec.cadence()?;
        self.spec.layout.ensure_output_dir()?;
        let (mut progress, resumed) = self
            .store
            .resume(&self.spec.tokenizer_index, self.sink.as_ref())?;

        self.state = WorkerState::Running;
        self.sink.on_event(ProgressEvent::RunStarted {
            output_dir: self.spec.layout.output_dir().to_path_buf(),
            training_iterations: progress.training_iterations,
            resumed,
        });

        let result = self.run_epochs(&mut progress, cadence);
        self.state = match &result {
            Ok(state) => *state,
            Err(_) => WorkerState::Failed,
        };

        if self.state == WorkerState::Stopping {
            self.sink.on_event(ProgressEvent::GracefulShutdown);
        }
        // A failure here has already been reported and must not hide the
        // loop's own result.
        let _ = self.persist(&progress);

        let outcome = RunOutcome {
            state: self.state,
            epochs_completed: self.epochs_completed,
            steps_completed: self.epochs_completed * self.spec.steps_per_epoch,
            training_iterations: progress.training_iterations,
        };
        self.sink.on_event(ProgressEvent::RunFinished {
            output_dir: self.spec.layout.output_dir().to_path_buf(),
            outcome: outcome.clone(),
        });

        match result {
            Ok(_) => Ok(outcome),
            Err(e) => Err(TrainingError::RunFailed {
                outcome,
                source: Box::new(e),
            }),
        }
    }

    fn run_epochs(
        &mut self,
        progress: &mut TrainingProgress,
        cadence: CheckpointCadence,
    ) -> TrainingResult<WorkerState> {
        loop {
            if self.signal.is_set() {
                return Ok(WorkerState::Stopping);
            }
            if !self.spec.epoch_limit.allows(self.epochs_completed) {
                return Ok(WorkerState::Completed);
            }

            let request = EpochRequest {
                output_dir: self.spec.layout.output_dir(),
                dataset: &self.spec.dataset,
                steps: self.spec.steps_per_epoch,
                sample_interval: self.spec.sample_interval,
                device: self.spec.device,
            };
            self.executor.run_epoch(&request)?;

            self.epochs_completed += 1;
            self.epochs_since_checkpoint += 1;
            progress.training_iterations += self.spec.steps_per_epoch;
            self.sink.on_event(ProgressEvent::EpochCompleted {
                epoch: self.epochs_completed,
                steps: self.spec.steps_per_epoch,
                training_iterations: progress.training_iterations,
            });

            self.persist(progress)?;

            if should_checkpoint(self.epochs_since_checkpoint, cadence) {
                match self.write_checkpoint(progress) {
                    Ok(dir) => {
                        self.sink.on_event(ProgressEvent::CheckpointSaved { dir });
                        self.epochs_since_checkpoint = 0;
                    }
                    Err(TrainingError::Checkpoint { dir, reason }) => {
                        self.sink.on_event(ProgressEvent::CheckpointFailed {
                            dir,
                            error: reason,
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }

    /// Save progress to the model directory, reporting the result either way.
    fn persist(&self, progress: &TrainingProgress) -> TrainingResult<()> {
        if let Err(e) = self.store.save(progress) {
            self.sink.on_event(ProgressEvent::ProgressSaveFailed {
                path: self.store.path().to_path_buf(),
                error: e.to_string(),
            });
            return Err(e);
        }
        self.sink.on_event(ProgressEvent::ProgressSaved {
            path: self.store.path().to_path_buf(),
            training_iterations: progress.training_iterations,
        });
        Ok(())
    }

    fn write_checkpoint(&self, progress: &TrainingProgress) -> TrainingResult<PathBuf> {
        let dir = self.spec.layout.checkpoint_dir(progress.training_iterations);
        let fail = |reason: String| TrainingError::Checkpoint {
            dir: dir.clone(),
            reason,
        };

        std::fs::create_dir_all(&dir).map_err(|e| fail(e.to_string()))?;
        self.executor
            .save_snapshot(&dir)
            .map_err(|e| fail(e.to_string()))?;
        progress
            .save(&dir.join(METADATA_FILE_NAME))
            .map_err(|e| fail(e.to_string()))?;
        Ok(dir)
    }
}
