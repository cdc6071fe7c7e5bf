use crate::error::{TrainingError, TrainingResult};
use crate::layout::{METADATA_FILE_NAME, ModelLayout, parse_checkpoint_name};
use crate::store::TrainingProgress;
use serde::Serialize;
use std::path::PathBuf;

/// A `checkpoint-<n>` directory found under a model directory.
#[derive(Debug, Clone, Serialize)]
pub struct CheckpointEntry {
    pub training_iterations: u64,
    pub dir: PathBuf,
    /// `false` when the progress copy is missing or unreadable, which
    /// happens when writing the checkpoint failed part way.
    pub complete: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub output_dir: PathBuf,
    pub progress: Option<TrainingProgress>,
    pub checkpoints: Vec<CheckpointEntry>,
}

/// Checkpoints of a model, oldest first.
pub fn discover_checkpoints(layout: &ModelLayout) -> TrainingResult<Vec<CheckpointEntry>> {
    let mut out = Vec::new();

    let dir = match std::fs::read_dir(layout.output_dir()) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
        Err(e) => return Err(e.into()),
    };

    for entry in dir {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str());
        let Some(training_iterations) = name.and_then(parse_checkpoint_name) else {
            continue;
        };
        let complete = TrainingProgress::load(&path.join(METADATA_FILE_NAME)).is_ok();
        out.push(CheckpointEntry {
            training_iterations,
            dir: path,
            complete,
        });
    }

    out.sort_by_key(|c| c.training_iterations);
    Ok(out)
}

/// Recorded progress and checkpoints of a model. A model that never trained
/// has no progress; corrupt progress is an error.
pub fn model_status(layout: &ModelLayout) -> TrainingResult<ModelStatus> {
    let progress = match TrainingProgress::load(&layout.metadata_path()) {
        Ok(p) => Some(p),
        Err(TrainingError::ProgressNotFound(_)) => None,
        Err(e) => return Err(e),
    };

    Ok(ModelStatus {
        output_dir: layout.output_dir().to_path_buf(),
        progress,
        checkpoints: discover_checkpoints(layout)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discover_sorts_numerically_and_flags_incomplete() {
        let temp = TempDir::new().unwrap();
        let layout = ModelLayout::new(temp.path().join("model"));
        for n in [1000, 500, 1500] {
            std::fs::create_dir_all(layout.checkpoint_dir(n)).unwrap();
        }
        let progress = TrainingProgress {
            training_iterations: 500,
            tokenizer_index: PathBuf::from("t.json"),
        };
        progress
            .save(&layout.checkpoint_dir(500).join(METADATA_FILE_NAME))
            .unwrap();
        std::fs::create_dir_all(layout.output_dir().join("not-a-checkpoint")).unwrap();

        let found = discover_checkpoints(&layout).unwrap();

        let iterations: Vec<u64> = found.iter().map(|c| c.training_iterations).collect();
        assert_eq!(iterations, vec![500, 1000, 1500]);
        assert!(found[0].complete);
        assert!(!found[1].complete);
    }

    #[test]
    fn test_status_of_untrained_model() {
        let temp = TempDir::new().unwrap();
        let status = model_status(&ModelLayout::new(temp.path().join("missing"))).unwrap();
        assert!(status.progress.is_none());
        assert!(status.checkpoints.is_empty());
    }
}
