//! `keel train`: supervised, resumable training.

use crate::config::{Backend, CliConfig};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use keel_training::console::QUIT_COMMAND;
use keel_training::{
    BigramExecutor, CommandExecutor, EpochExecutor, EpochLimit, ModelLayout, ProgressSink,
    ProjectRoot, RunOutcome, Supervisor, TokenizerConfig, TracingProgressSink, TrainingDevice,
    TrainingRunSpec, WorkerState, load_dataset, stdin_lines,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const DEFAULT_TOKENIZER_INDEX: &str = "training-data/tokenizer-index.json";
const DEFAULT_DATASET: &str = "training-data/discord-messages.txt";
const DEFAULT_MODELS_DIR: &str = "models";
const DEFAULT_MODEL_NAME: &str = "model";
const DEFAULT_SAMPLE_EVERY: u64 = 100;
const DEFAULT_TARGET_EPOCHS: i64 = -1;
const DEFAULT_TRAIN_EPOCH_STEPS: u64 = 100;
const DEFAULT_CHECKPOINT_EVERY_EPOCHS: i64 = 5;

/// Type `quit` (or press Ctrl-C) to stop after the current epoch, `help` for
/// the command list. A second Ctrl-C exits immediately.
#[derive(Args, Debug, Default)]
pub struct TrainArgs {
    /// Train on the GPU
    #[arg(long)]
    pub gpu: bool,

    /// Tokenizer index JSON [default: training-data/tokenizer-index.json]
    #[arg(long)]
    pub tokenizer_index: Option<PathBuf>,

    /// Training text [default: training-data/discord-messages.txt]
    #[arg(long)]
    pub dataset: Option<PathBuf>,

    /// Directory holding model directories [default: models]
    #[arg(long)]
    pub models_dir: Option<PathBuf>,

    /// Model directory name under --models-dir [default: model]
    #[arg(long)]
    pub model_name: Option<String>,

    /// Emit a text sample every N steps [default: 100]
    #[arg(long)]
    pub sample_every: Option<u64>,

    /// Epochs to run in this invocation, negative for no limit [default: -1]
    #[arg(long, allow_negative_numbers = true)]
    pub target_epochs: Option<i64>,

    /// Steps per epoch [default: 100]
    #[arg(long)]
    pub train_epoch_steps: Option<u64>,

    /// Write a checkpoint every N epochs [default: 5]
    #[arg(long, allow_negative_numbers = true)]
    pub checkpoint_every_epochs: Option<i64>,

    /// Directory relative paths are resolved against [default: current directory]
    #[arg(long)]
    pub project_root: Option<PathBuf>,

    /// Training backend [default: bigram]
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// External training program for --backend command, e.g. "python3 train.py"
    #[arg(long)]
    pub executor_cmd: Option<String>,
}

/// Flags merged over config, with defaults filled in.
#[derive(Debug)]
struct Resolved {
    project: ProjectRoot,
    tokenizer_index: PathBuf,
    dataset: PathBuf,
    layout: ModelLayout,
    sample_every: u64,
    target_epochs: i64,
    train_epoch_steps: u64,
    checkpoint_every_epochs: i64,
    device: TrainingDevice,
    backend: Backend,
    executor_cmd: Option<String>,
}

impl Resolved {
    /// Tokenizer index as recorded in training metadata.
    fn recorded_tokenizer_index(&self) -> PathBuf {
        self.project
            .relative(&self.project.resolve(&self.tokenizer_index))
    }
}

pub fn project_root(flag: Option<PathBuf>, config: &CliConfig) -> Result<ProjectRoot> {
    let root = match flag.or_else(|| config.project_root.clone()) {
        Some(root) => root,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    Ok(ProjectRoot::new(root))
}

fn resolve(args: TrainArgs, config: &CliConfig) -> Result<Resolved> {
    let defaults = &config.training;
    let project = project_root(args.project_root, config)?;

    let tokenizer_index = args
        .tokenizer_index
        .or_else(|| defaults.tokenizer_index.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKENIZER_INDEX));
    let dataset = args
        .dataset
        .or_else(|| defaults.dataset.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET));
    let models_dir = args
        .models_dir
        .or_else(|| defaults.models_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODELS_DIR));
    let model_name = args
        .model_name
        .or_else(|| defaults.model_name.clone())
        .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string());

    Ok(Resolved {
        layout: ModelLayout::for_model(&project.resolve(&models_dir), &model_name),
        tokenizer_index,
        dataset: project.resolve(&dataset),
        sample_every: args
            .sample_every
            .or(defaults.sample_every)
            .unwrap_or(DEFAULT_SAMPLE_EVERY),
        target_epochs: args
            .target_epochs
            .or(defaults.target_epochs)
            .unwrap_or(DEFAULT_TARGET_EPOCHS),
        train_epoch_steps: args
            .train_epoch_steps
            .or(defaults.train_epoch_steps)
            .unwrap_or(DEFAULT_TRAIN_EPOCH_STEPS),
        checkpoint_every_epochs: args
            .checkpoint_every_epochs
            .or(defaults.checkpoint_every_epochs)
            .unwrap_or(DEFAULT_CHECKPOINT_EVERY_EPOCHS),
        device: TrainingDevice::from_gpu_flag(args.gpu || defaults.gpu.unwrap_or(false)),
        backend: args.backend.or(defaults.backend).unwrap_or(Backend::Bigram),
        executor_cmd: args.executor_cmd.or_else(|| defaults.executor_cmd.clone()),
        project,
    })
}

fn build_executor(
    resolved: &Resolved,
    sink: &Arc<dyn ProgressSink>,
) -> Result<Box<dyn EpochExecutor>> {
    match resolved.backend {
        Backend::Bigram => {
            let executor = BigramExecutor::resume(resolved.layout.output_dir(), sink.clone())
                .context("Failed to load existing bigram model")?;
            Ok(Box::new(executor))
        }
        Backend::Command => {
            let cmd = resolved
                .executor_cmd
                .as_deref()
                .context("--executor-cmd is required with --backend command")?;
            let mut parts = cmd.split_whitespace().map(str::to_string);
            let program = parts.next().context("--executor-cmd is empty")?;
            Ok(Box::new(CommandExecutor::new(
                PathBuf::from(program),
                parts.collect(),
            )))
        }
    }
}

/// Turn interrupts into console commands.
///
/// The first interrupt queues `quit`. Returns `Ok(())` when the process
/// should exit right away: on a second interrupt, or when the console is no
/// longer listening. Returns `Err` when interrupts cannot be received.
async fn relay_interrupts<F, Fut>(
    mut next_interrupt: F,
    injector: mpsc::Sender<String>,
) -> std::io::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    next_interrupt().await?;
    if injector.send(QUIT_COMMAND.to_string()).await.is_err() {
        return Ok(());
    }
    info!("Press Ctrl-C again to exit without waiting for the current epoch");
    next_interrupt().await
}

pub async fn execute(args: TrainArgs, config: &CliConfig) -> Result<()> {
    let resolved = resolve(args, config)?;
    debug!(?resolved, "resolved training options");

    let tokenizer = TokenizerConfig::load(&resolved.project, &resolved.tokenizer_index)
        .context("Failed to load tokenizer index")?;
    let (dataset, model_config) =
        load_dataset(&tokenizer, &resolved.dataset).context("Failed to load dataset")?;
    info!(
        vocab_size = model_config.vocab_size,
        n_embd = model_config.n_embd,
        n_layer = model_config.n_layer,
        n_head = model_config.n_head,
        encoded_cache = dataset.encoded_cache.is_some(),
        "dataset ready"
    );

    let sink: Arc<dyn ProgressSink> =
        Arc::new(TracingProgressSink::with_project_root(resolved.project.clone()));
    let executor = build_executor(&resolved, &sink)?;

    let spec = TrainingRunSpec {
        tokenizer_index: resolved.recorded_tokenizer_index(),
        layout: resolved.layout,
        dataset,
        epoch_limit: EpochLimit::from_target(resolved.target_epochs),
        steps_per_epoch: resolved.train_epoch_steps,
        sample_interval: resolved.sample_every,
        checkpoint_every_epochs: resolved.checkpoint_every_epochs,
        device: resolved.device,
    };

    let (injector, commands) = stdin_lines(16).context("Failed to start operator console")?;
    tokio::spawn(async move {
        match relay_interrupts(tokio::signal::ctrl_c, injector).await {
            Ok(()) => {
                warn!("Interrupted, exiting without finishing the current epoch");
                std::process::exit(130);
            }
            Err(e) => warn!(error = %e, "Ctrl-C handling is unavailable"),
        }
    });

    match Supervisor::new(spec, executor, sink).run(commands).await {
        Ok(outcome) => {
            print_summary(&outcome);
            Ok(())
        }
        Err(e) => {
            if let Some(outcome) = e.outcome() {
                print_summary(outcome);
            }
            Err(anyhow::Error::new(e).context("Training failed"))
        }
    }
}

fn print_summary(outcome: &RunOutcome) {
    let state = match outcome.state {
        WorkerState::Completed => "completed".green(),
        WorkerState::Stopping => "stopped".yellow(),
        WorkerState::Failed => "failed".red(),
        WorkerState::Idle | WorkerState::Running => {
            format!("{:?}", outcome.state).normal()
        }
    };

    println!();
    println!("{} {}", "Training".bold().cyan(), state.bold());
    println!("  Epochs this run:  {}", outcome.epochs_completed);
    println!("  Steps this run:   {}", outcome.steps_completed);
    println!(
        "  Total iterations: {}",
        outcome.training_iterations.to_string().cyan()
    );
    println!();
}
