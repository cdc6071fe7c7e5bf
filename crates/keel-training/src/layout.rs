use crate::error::TrainingResult;
use std::path::{Component, Path, PathBuf};

pub const METADATA_FILE_NAME: &str = "training-metadata.json";
pub const CHECKPOINT_PREFIX: &str = "checkpoint-";

/// Root that relative paths on the command line and in metadata files are
/// resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRoot {
    root: PathBuf,
}

impl ProjectRoot {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Absolute (root-joined) form of `path`. Absolute inputs are returned unchanged.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Root-relative form of `path` without `.` components, or the cleaned
    /// `path` itself when it lies outside the root.
    #[must_use]
    pub fn relative(&self, path: &Path) -> PathBuf {
        let path = without_cur_dir(path);
        let root = without_cur_dir(&self.root);
        if root.as_os_str().is_empty() || path.is_absolute() != root.is_absolute() {
            return path;
        }
        path.strip_prefix(&root)
            .map_or_else(|_| path.clone(), Path::to_path_buf)
    }
}

fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Filesystem layout of a single model.
///
/// ```text
/// <models_dir>/<model_name>/
///     training-metadata.json
///     checkpoint-<iterations>/
///         training-metadata.json
/// ```
#[derive(Debug, Clone)]
pub struct ModelLayout {
    output_dir: PathBuf,
}

impl ModelLayout {
    #[must_use]
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    #[must_use]
    pub fn for_model(models_dir: &Path, model_name: &str) -> Self {
        Self::new(models_dir.join(model_name))
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        self.output_dir.join(METADATA_FILE_NAME)
    }

    #[must_use]
    pub fn checkpoint_dir(&self, training_iterations: u64) -> PathBuf {
        self.output_dir
            .join(format!("{CHECKPOINT_PREFIX}{training_iterations}"))
    }

    pub fn ensure_output_dir(&self) -> TrainingResult<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }
}

/// Iteration count encoded in a checkpoint directory name, if it is one.
#[must_use]
pub fn parse_checkpoint_name(name: &str) -> Option<u64> {
    name.strip_prefix(CHECKPOINT_PREFIX)?.parse().ok()
}
