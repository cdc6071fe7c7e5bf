//! Status command implementation.

use crate::commands::train::project_root;
use crate::config::CliConfig;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use keel_training::{ModelLayout, ModelStatus, model_status};
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// Directory holding model directories [default: models]
    #[arg(long)]
    pub models_dir: Option<PathBuf>,

    /// Model directory name under --models-dir [default: model]
    #[arg(long)]
    pub model_name: Option<String>,

    /// Directory relative paths are resolved against [default: current directory]
    #[arg(long)]
    pub project_root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Shows recorded progress and checkpoints of one model.
pub fn execute(args: StatusArgs, config: &CliConfig) -> Result<()> {
    let project = project_root(args.project_root, config)?;
    let models_dir = args
        .models_dir
        .or_else(|| config.training.models_dir.clone())
        .unwrap_or_else(|| PathBuf::from("models"));
    let model_name = args
        .model_name
        .or_else(|| config.training.model_name.clone())
        .unwrap_or_else(|| "model".to_string());
    let layout = ModelLayout::for_model(&project.resolve(&models_dir), &model_name);

    let status = model_status(&layout).context("Failed to read model status")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }
    print_human(&status);
    Ok(())
}

fn print_human(status: &ModelStatus) {
    println!();
    println!("{}", "Model Status".bold().cyan());
    println!(
        "  Location: {}",
        status.output_dir.display().to_string().dimmed()
    );

    match &status.progress {
        Some(progress) => {
            println!(
                "  Training iterations: {}",
                progress.training_iterations.to_string().green()
            );
            println!("  Tokenizer index: {}", progress.tokenizer_index.display());
        }
        None => {
            println!("  {}", "No training progress recorded yet.".yellow());
            println!();
            println!("  {}", "Tip: start training with `keel train`.".dimmed());
            println!();
            return;
        }
    }
    println!();

    println!(
        "{}",
        format!("Checkpoints ({})", status.checkpoints.len()).bold()
    );
    if status.checkpoints.is_empty() {
        println!("  {}", "None yet.".dimmed());
        println!();
        return;
    }

    println!("  {:<12} {:<10} {}", "Iterations", "Complete", "Directory");
    println!("  {}", "─".repeat(70));
    for checkpoint in &status.checkpoints {
        let complete = if checkpoint.complete {
            "✓".green()
        } else {
            "✗".red()
        };
        println!(
            "  {:<12} {:<10} {}",
            checkpoint.training_iterations.to_string().cyan(),
            complete,
            checkpoint.dir.display().to_string().dimmed()
        );
    }
    println!();
}
