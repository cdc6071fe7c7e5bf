use super::{EpochExecutor, EpochRequest, ExecutorError};
use crate::job::TrainingDevice;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Runs an external training program once per epoch.
///
/// ```text
/// <program> <args..> train --output-dir D --dataset F [--dataset-cache C]
///     --steps N --sample-every M [--gpu]
/// <program> <args..> save --output-dir D --destination C
/// ```
///
/// The program's stdin is closed since the operator console owns it; stdout
/// and stderr are inherited.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    program: PathBuf,
    args: Vec<String>,
    output_dir: Option<PathBuf>,
}

impl CommandExecutor {
    #[must_use]
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self {
            program,
            args,
            output_dir: None,
        }
    }

    fn base(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::null());
        cmd
    }

    fn run(&self, mut cmd: Command, what: &str) -> Result<(), ExecutorError> {
        debug!(program = %self.program.display(), ?cmd, "running external {what}");
        let status = cmd.status()?;
        if status.success() {
            Ok(())
        } else {
            Err(ExecutorError::Failed(format!(
                "{} {what} exited with {status}",
                self.program.display()
            )))
        }
    }
}

impl EpochExecutor for CommandExecutor {
    fn id(&self) -> &'static str {
        "command"
    }

    fn run_epoch(&mut self, request: &EpochRequest<'_>) -> Result<(), ExecutorError> {
        let mut cmd = self.base();
        cmd.arg("train")
            .arg("--output-dir")
            .arg(request.output_dir)
            .arg("--dataset")
            .arg(&request.dataset.text_path);
        if let Some(cache) = &request.dataset.encoded_cache {
            cmd.arg("--dataset-cache").arg(cache);
        }
        cmd.arg("--steps")
            .arg(request.steps.to_string())
            .arg("--sample-every")
            .arg(request.sample_interval.to_string());
        if request.device == TrainingDevice::Gpu {
            cmd.arg("--gpu");
        }

        self.run(cmd, "train")?;
        self.output_dir = Some(request.output_dir.to_path_buf());
        Ok(())
    }

    fn save_snapshot(&self, destination: &Path) -> Result<(), ExecutorError> {
        let output_dir = self.output_dir.as_deref().ok_or_else(|| {
            ExecutorError::Failed("no epoch has run yet, nothing to snapshot".to_string())
        })?;

        let mut cmd = self.base();
        cmd.arg("save")
            .arg("--output-dir")
            .arg(output_dir)
            .arg("--destination")
            .arg(destination);
        self.run(cmd, "save")
    }
}
