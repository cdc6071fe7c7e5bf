use crate::console::OperatorConsole;
use crate::error::{TrainingError, TrainingResult};
use crate::executor::EpochExecutor;
use crate::job::TrainingRunSpec;
use crate::progress::ProgressSink;
use crate::shutdown::ShutdownSignal;
use crate::worker::{RunOutcome, TrainingWorker};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Runs a training worker alongside the operator console.
pub struct Supervisor {
    spec: TrainingRunSpec,
    executor: Box<dyn EpochExecutor>,
    sink: Arc<dyn ProgressSink>,
}

impl Supervisor {
    #[must_use]
    pub fn new(
        spec: TrainingRunSpec,
        executor: Box<dyn EpochExecutor>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            spec,
            executor,
            sink,
        }
    }

    /// Train until done, reading operator commands from `commands`.
    ///
    /// Commands already queued in `commands` are handled before the first
    /// epoch starts. Returns once both the worker and the console have
    /// finished.
    pub async fn run(self, mut commands: mpsc::Receiver<String>) -> TrainingResult<RunOutcome> {
        self.spec.validate()?;
        debug!(
            executor = self.executor.id(),
            output_dir = %self.spec.layout.output_dir().display(),
            "starting supervised run"
        );

        let signal = ShutdownSignal::new();
        let finished = CancellationToken::new();

        let console = OperatorConsole::new(signal.clone(), self.sink.clone());
        let console_task = match console.open(&mut commands) {
            Some(exit) => {
                debug!(?exit, "operator console finished before training started");
                None
            }
            None => Some(tokio::spawn(console.listen(commands, finished.clone()))),
        };

        let mut worker = TrainingWorker::new(self.spec, self.executor, signal, self.sink);
        let worker_result = tokio::task::spawn_blocking(move || worker.run()).await;

        finished.cancel();
        if let Some(task) = console_task {
            match task.await {
                Ok(exit) => debug!(?exit, "operator console finished"),
                Err(e) => warn!("operator console task failed: {e}"),
            }
        }

        worker_result.map_err(|e| TrainingError::Task(e.to_string()))?
    }
}
