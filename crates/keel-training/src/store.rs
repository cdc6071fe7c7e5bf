//! Durable training progress.
//!
//! Progress is a small JSON document kept next to the model:
//!
//! ```json
//! {
//!     "training_iterations": 1200,
//!     "tokenizer_index": "training-data/tokenizer-index.json"
//! }
//! ```
//!
//! Writes go to a sibling temp file which is then renamed over the target, so
//! a reader sees either the previous document or the new one.

use crate::error::{TrainingError, TrainingResult};
use crate::progress::{ProgressEvent, ProgressSink};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Cumulative training progress of one model directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingProgress {
    /// Steps completed across all epochs and all restarts.
    pub training_iterations: u64,
    /// Project-relative path of the tokenizer index the data was encoded with.
    pub tokenizer_index: PathBuf,
}

impl TrainingProgress {
    #[must_use]
    pub fn new(tokenizer_index: PathBuf) -> Self {
        Self {
            training_iterations: 0,
            tokenizer_index,
        }
    }

    pub fn load(path: &Path) -> TrainingResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TrainingError::ProgressNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&contents).map_err(|e| TrainingError::ProgressCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> TrainingResult<()> {
        write_atomic(path, &self.to_json_bytes()?)?;

        debug!(
            path = %path.display(),
            training_iterations = self.training_iterations,
            "saved training progress"
        );
        Ok(())
    }

    fn to_json_bytes(&self) -> TrainingResult<Vec<u8>> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut ser)?;
        out.push(b'\n');
        Ok(out)
    }
}

/// Replace `path` with `bytes` through a `<name>.tmp` sibling and a rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut temp_name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    std::fs::write(&temp_path, bytes)?;
    std::fs::rename(&temp_path, path)
}

/// Progress file at a fixed location.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> TrainingResult<TrainingProgress> {
        TrainingProgress::load(&self.path)
    }

    pub fn save(&self, progress: &TrainingProgress) -> TrainingResult<()> {
        progress.save(&self.path)
    }

    /// Load recorded progress for a run that uses `tokenizer_index`.
    ///
    /// A missing file starts fresh. A recorded tokenizer that differs from
    /// `tokenizer_index` is replaced and reported as
    /// [`ProgressEvent::TokenizerMismatch`]. The returned flag is `true` when
    /// progress was loaded from disk.
    pub fn resume(
        &self,
        tokenizer_index: &Path,
        sink: &dyn ProgressSink,
    ) -> TrainingResult<(TrainingProgress, bool)> {
        let mut progress = match self.load() {
            Ok(p) => p,
            Err(TrainingError::ProgressNotFound(_)) => {
                return Ok((TrainingProgress::new(tokenizer_index.to_path_buf()), false));
            }
            Err(e) => return Err(e),
        };

        if progress.tokenizer_index != tokenizer_index {
            sink.on_event(ProgressEvent::TokenizerMismatch {
                recorded: progress.tokenizer_index.clone(),
                current: tokenizer_index.to_path_buf(),
            });
            progress.tokenizer_index = tokenizer_index.to_path_buf();
        }

        Ok((progress, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::MemoryProgressSink;
    use tempfile::TempDir;

    fn progress(iterations: u64, tokenizer: &str) -> TrainingProgress {
        TrainingProgress {
            training_iterations: iterations,
            tokenizer_index: PathBuf::from(tokenizer),
        }
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("training-metadata.json");

        let err = TrainingProgress::load(&path).unwrap_err();
        assert!(matches!(err, TrainingError::ProgressNotFound(_)));
    }

    #[test]
    fn test_load_rejects_missing_field() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("training-metadata.json");
        std::fs::write(&path, r#"{"training_iterations": 10}"#).unwrap();

        let err = TrainingProgress::load(&path).unwrap_err();
        assert!(matches!(err, TrainingError::ProgressCorrupt { .. }));
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("training-metadata.json");
        std::fs::write(&path, "{\"training_iterations\": ").unwrap();

        let err = TrainingProgress::load(&path).unwrap_err();
        assert!(matches!(err, TrainingError::ProgressCorrupt { .. }));
    }

    #[test]
    fn test_save_is_byte_identical_and_round_trips() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("training-metadata.json");
        let p = progress(1200, "training-data/tokenizer-index.json");

        p.save(&path).unwrap();
        let first = std::fs::read(&path).unwrap();
        p.save(&path).unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(TrainingProgress::load(&path).unwrap(), p);
        assert!(!temp.path().join("training-metadata.json.tmp").exists());
    }

    #[test]
    fn test_saved_document_uses_expected_field_names() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("training-metadata.json");
        progress(300, "tok/index.json").save(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["training_iterations"], 300);
        assert_eq!(value["tokenizer_index"], "tok/index.json");
    }

    #[test]
    fn test_save_into_missing_directory_is_io_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing/training-metadata.json");

        let err = progress(1, "t.json").save(&path).unwrap_err();
        assert!(matches!(err, TrainingError::Io(_)));
    }

    #[test]
    fn test_write_atomic_replaces_stale_temp_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("model.json");
        std::fs::write(temp.path().join("model.json.tmp"), "{\"trunc").unwrap();
        std::fs::write(&path, "old").unwrap();

        write_atomic(&path, b"new").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert!(!temp.path().join("model.json.tmp").exists());
    }

    #[test]
    fn test_resume_without_file_starts_fresh() {
        let temp = TempDir::new().unwrap();
        let store = ProgressStore::new(temp.path().join("training-metadata.json"));
        let sink = MemoryProgressSink::new();

        let (p, resumed) = store.resume(Path::new("tok.json"), &sink).unwrap();
        assert!(!resumed);
        assert_eq!(p, progress(0, "tok.json"));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_resume_prefers_current_tokenizer_and_warns_once() {
        let temp = TempDir::new().unwrap();
        let store = ProgressStore::new(temp.path().join("training-metadata.json"));
        store.save(&progress(500, "a.json")).unwrap();
        let sink = MemoryProgressSink::new();

        let (p, resumed) = store.resume(Path::new("b.json"), &sink).unwrap();
        assert!(resumed);
        assert_eq!(p, progress(500, "b.json"));
        assert_eq!(
            sink.count(|e| matches!(e, ProgressEvent::TokenizerMismatch { .. })),
            1
        );
    }

    #[test]
    fn test_resume_surfaces_corruption() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("training-metadata.json");
        std::fs::write(&path, "not json").unwrap();
        let store = ProgressStore::new(path);

        let err = store
            .resume(Path::new("t.json"), &MemoryProgressSink::new())
            .unwrap_err();
        assert!(matches!(err, TrainingError::ProgressCorrupt { .. }));
    }
}
