use crate::layout::ProjectRoot;
use crate::worker::{RunOutcome, WorkerState};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Something worth telling the operator about while a run is supervised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    RunStarted {
        output_dir: PathBuf,
        training_iterations: u64,
        resumed: bool,
    },
    TokenizerMismatch {
        recorded: PathBuf,
        current: PathBuf,
    },
    Sample {
        step: u64,
        text: String,
    },
    EpochCompleted {
        epoch: u64,
        steps: u64,
        training_iterations: u64,
    },
    ProgressSaved {
        path: PathBuf,
        training_iterations: u64,
    },
    CheckpointSaved {
        dir: PathBuf,
    },
    CheckpointFailed {
        dir: PathBuf,
        error: String,
    },
    ProgressSaveFailed {
        path: PathBuf,
        error: String,
    },
    ConsoleReady,
    CommandHelp,
    UnrecognizedCommand {
        input: String,
    },
    ShutdownRequested,
    GracefulShutdown,
    RunFinished {
        output_dir: PathBuf,
        outcome: RunOutcome,
    },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

/// Forwards events to `tracing`. This is what the binary uses.
///
/// Paths are shown relative to the project root when one is set.
#[derive(Debug, Default)]
pub struct TracingProgressSink {
    project: Option<ProjectRoot>,
}

impl TracingProgressSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_project_root(project: ProjectRoot) -> Self {
        Self {
            project: Some(project),
        }
    }

    fn show(&self, path: &Path) -> String {
        match &self.project {
            Some(project) => project.relative(path).display().to_string(),
            None => path.display().to_string(),
        }
    }
}

impl ProgressSink for TracingProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::RunStarted {
                output_dir,
                training_iterations,
                resumed,
            } => {
                info!(
                    training_iterations,
                    resumed,
                    "Saving model into '{}' directory",
                    self.show(&output_dir)
                );
            }
            ProgressEvent::TokenizerMismatch { recorded, current } => {
                warn!(
                    "Training metadata specified a different tokenizer index file than invocation, stored value='{}', current value='{}'",
                    recorded.display(),
                    current.display()
                );
            }
            ProgressEvent::Sample { step, text } => info!(step, "sample: {text}"),
            ProgressEvent::EpochCompleted {
                epoch,
                steps,
                training_iterations,
            } => {
                info!(
                    "Completed training epoch {epoch} resulting in {steps} steps of training, total steps {training_iterations}"
                );
            }
            ProgressEvent::ProgressSaved {
                path,
                training_iterations,
            } => {
                debug!(path = %self.show(&path), training_iterations, "training metadata saved");
            }
            ProgressEvent::CheckpointSaved { dir } => {
                info!("Model checkpoint saved into '{}' directory", self.show(&dir));
            }
            ProgressEvent::CheckpointFailed { dir, error } => {
                error!(dir = %self.show(&dir), "Failed to save model checkpoint: {error}");
            }
            ProgressEvent::ProgressSaveFailed { path, error } => {
                error!(path = %self.show(&path), "Failed to save training metadata: {error}");
            }
            ProgressEvent::ConsoleReady => info!("Type 'quit' to stop training"),
            ProgressEvent::CommandHelp => {
                info!("While the model is training the following management commands are available");
                info!("- quit: At the end of the next training epoch gracefully end training");
                info!("- help: Show this list");
            }
            ProgressEvent::UnrecognizedCommand { input } => {
                info!("Unrecognized user input command '{input}', type 'help' to see valid commands");
            }
            ProgressEvent::ShutdownRequested => info!("Attempting a graceful shutdown"),
            ProgressEvent::GracefulShutdown => info!("Training gracefully shut down"),
            ProgressEvent::RunFinished {
                output_dir,
                outcome,
            } => {
                let line = format!(
                    "Completed {} epochs of training resulting in {} steps of training, total steps {}",
                    outcome.epochs_completed, outcome.steps_completed, outcome.training_iterations
                );
                if outcome.state == WorkerState::Failed {
                    error!("{line}");
                } else {
                    info!("{line}");
                }
                info!("Model saved into '{}' directory", self.show(&output_dir));
                debug!(state = ?outcome.state, "worker finished");
            }
        }
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_event(&self, _event: ProgressEvent) {}
}

/// Keeps every event in memory, in order.
#[derive(Debug, Default)]
pub struct MemoryProgressSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl MemoryProgressSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of recorded events matching `pred`.
    pub fn count(&self, pred: impl Fn(&ProgressEvent) -> bool) -> usize {
        self.events
            .lock()
            .map(|e| e.iter().filter(|ev| pred(*ev)).count())
            .unwrap_or(0)
    }
}

impl ProgressSink for MemoryProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemoryProgressSink::new();
        sink.on_event(ProgressEvent::ConsoleReady);
        sink.on_event(ProgressEvent::ShutdownRequested);

        assert_eq!(
            sink.events(),
            vec![ProgressEvent::ConsoleReady, ProgressEvent::ShutdownRequested]
        );
        assert_eq!(
            sink.count(|e| matches!(e, ProgressEvent::ShutdownRequested)),
            1
        );
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = ProgressEvent::UnrecognizedCommand {
            input: "stop".to_string(),
        };

        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["type"], "unrecognized_command");
        assert_eq!(json["input"], "stop");
    }

    #[test]
    fn test_tracing_sink_shows_project_relative_paths() {
        let project = ProjectRoot::new(PathBuf::from("/srv/bot"));
        let sink = TracingProgressSink::with_project_root(project);
        assert_eq!(sink.show(Path::new("/srv/bot/models/model")), "models/model");
        assert_eq!(sink.show(Path::new("/tmp/elsewhere")), "/tmp/elsewhere");

        let bare = TracingProgressSink::new();
        assert_eq!(
            bare.show(Path::new("/srv/bot/models/model")),
            "/srv/bot/models/model"
        );
    }
}
