//! Keel Training
//!
//! Resumable, operator-controlled training runs:
//! - Persisting cumulative progress (`ProgressStore`)
//! - Driving epochs and periodic checkpoints (`TrainingWorker`)
//! - Plugging in the code that trains (`EpochExecutor`)
//! - Accepting `quit`/`help` while training runs (`OperatorConsole`, `Supervisor`)

pub mod console;
pub mod dataset;
pub mod error;
pub mod executor;
pub mod job;
pub mod layout;
pub mod progress;
pub mod registry;
pub mod schedule;
pub mod shutdown;
pub mod store;
pub mod supervisor;
pub mod tokenizer;
pub mod worker;

pub use console::{ConsoleExit, OperatorCommand, OperatorConsole, stdin_lines};
pub use dataset::{DatasetHandle, ModelConfig, load_dataset};
pub use error::{TrainingError, TrainingResult};
pub use executor::{
    BigramExecutor, CommandExecutor, EpochExecutor, EpochRequest, ExecutorError,
};
pub use job::{EpochLimit, TrainingDevice, TrainingRunSpec};
pub use layout::{ModelLayout, ProjectRoot};
pub use progress::{
    MemoryProgressSink, NullProgressSink, ProgressEvent, ProgressSink, TracingProgressSink,
};
pub use registry::{CheckpointEntry, ModelStatus, discover_checkpoints, model_status};
pub use schedule::{CheckpointCadence, should_checkpoint};
pub use shutdown::ShutdownSignal;
pub use store::{ProgressStore, TrainingProgress};
pub use supervisor::Supervisor;
pub use tokenizer::TokenizerConfig;
pub use worker::{RunOutcome, TrainingWorker, WorkerState};
