//! Keel CLI - resumable training runs you can stop from the keyboard
//!
//! This CLI provides a `keel` command that trains a model in epochs,
//! checkpoints it periodically, and stops cleanly when asked.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use commands::{status, train};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Keel - supervised, resumable model training
#[derive(Parser, Debug)]
#[command(
    name = "keel",
    author,
    version,
    about = "Keel - supervised, resumable model training"
)]
struct Args {
    /// Log level (trace, debug, info, warn, error) [default: info]
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a model, resuming from its recorded progress
    ///
    /// Runs epochs until --target-epochs is reached or the operator types
    /// `quit`. Progress is saved after every epoch.
    Train(train::TrainArgs),

    /// Show recorded progress and checkpoints of a model
    Status(status::StatusArgs),
}

fn parse_level(name: &str) -> Level {
    match name {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let cli_config = config::load_config();

    // Initialize tracing
    let level = parse_level(
        args.log_level
            .as_deref()
            .or(cli_config.log_level.as_deref())
            .unwrap_or("info"),
    );
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Train(cmd) => train::execute(cmd, &cli_config).await?,
        Command::Status(cmd) => status::execute(cmd, &cli_config)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_negative_target_epochs_parses() {
        let args =
            Args::try_parse_from(["keel", "train", "--target-epochs", "-1", "--gpu"]).unwrap();
        let Command::Train(train) = args.command else {
            panic!("expected train")
        };
        assert_eq!(train.target_epochs, Some(-1));
        assert!(train.gpu);
    }

    #[test]
    fn test_parse_level_falls_back_to_info() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("loud"), Level::INFO);
    }
}
