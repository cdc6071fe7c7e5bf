//! Character-level bigram model.
//!
//! Small enough to train anywhere, which makes it useful for trying out the
//! supervisor without a real model backend.

use super::{EpochExecutor, EpochRequest, ExecutorError};
use crate::job::TrainingDevice;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::store::write_atomic;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub const MODEL_FILE_NAME: &str = "bigram-model.json";

const DEFAULT_WINDOW: usize = 64;
const SAMPLE_LENGTH: usize = 32;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct BigramModel {
    /// Characters in first-seen order.
    vocab: Vec<String>,
    /// `transitions[a][b]` counts how often `vocab[b]` followed `vocab[a]`.
    transitions: Vec<Vec<u64>>,
    /// Position in the corpus the next step starts at.
    cursor: usize,
    steps_trained: u64,
}

impl BigramModel {
    fn read(path: &Path) -> Result<Self, ExecutorError> {
        let model: Self = serde_json::from_slice(&std::fs::read(path)?)?;
        let n = model.vocab.len();
        if model.transitions.len() != n || model.transitions.iter().any(|row| row.len() != n) {
            return Err(ExecutorError::Failed(format!(
                "{}: transition table is not {n}x{n}",
                path.display()
            )));
        }
        Ok(model)
    }

    fn index_of(&mut self, index: &mut HashMap<char, usize>, ch: char) -> usize {
        if let Some(&i) = index.get(&ch) {
            return i;
        }
        let i = self.vocab.len();
        self.vocab.push(ch.to_string());
        for row in &mut self.transitions {
            row.push(0);
        }
        self.transitions.push(vec![0; i + 1]);
        index.insert(ch, i);
        i
    }

    /// Greedy continuation of `seed`. Ties go to the earlier vocab entry.
    fn sample(&self, index: &HashMap<char, usize>, seed: char) -> String {
        let mut out = String::from(seed);
        let Some(&start) = index.get(&seed) else {
            return out;
        };
        let mut cur = start;
        for _ in 1..SAMPLE_LENGTH {
            let row = &self.transitions[cur];
            let best = row
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)));
            let Some((next, &count)) = best else {
                break;
            };
            if count == 0 {
                break;
            }
            out.push_str(&self.vocab[next]);
            cur = next;
        }
        out
    }

    fn write(&self, path: &Path) -> Result<(), ExecutorError> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &json)?;
        Ok(())
    }
}

pub struct BigramExecutor {
    model: BigramModel,
    index: HashMap<char, usize>,
    corpus: Vec<char>,
    corpus_path: Option<PathBuf>,
    window: usize,
    sink: Arc<dyn ProgressSink>,
    warned_device: bool,
}

impl BigramExecutor {
    #[must_use]
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            model: BigramModel::default(),
            index: HashMap::new(),
            corpus: Vec::new(),
            corpus_path: None,
            window: DEFAULT_WINDOW,
            sink,
            warned_device: false,
        }
    }

    /// Continue from the model stored in `output_dir`, if any.
    pub fn resume(output_dir: &Path, sink: Arc<dyn ProgressSink>) -> Result<Self, ExecutorError> {
        let mut executor = Self::new(sink);
        let path = output_dir.join(MODEL_FILE_NAME);
        if path.is_file() {
            let model = BigramModel::read(&path)?;
            for (i, s) in model.vocab.iter().enumerate() {
                let mut chars = s.chars();
                let (Some(ch), None) = (chars.next(), chars.next()) else {
                    return Err(ExecutorError::Failed(format!(
                        "{}: vocab entry {i} is not a single character",
                        path.display()
                    )));
                };
                executor.index.insert(ch, i);
            }
            debug!(path = %path.display(), steps = model.steps_trained, "resumed bigram model");
            executor.model = model;
        }
        Ok(executor)
    }

    /// Characters consumed per step.
    #[must_use]
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(2);
        self
    }

    #[must_use]
    pub fn steps_trained(&self) -> u64 {
        self.model.steps_trained
    }

    fn ensure_corpus(&mut self, path: &Path) -> Result<(), ExecutorError> {
        if self.corpus_path.as_deref() == Some(path) {
            return Ok(());
        }
        let text = std::fs::read_to_string(path)?;
        if text.is_empty() {
            return Err(ExecutorError::Failed("training text is empty".to_string()));
        }
        self.corpus = text.chars().collect();
        self.corpus_path = Some(path.to_path_buf());
        Ok(())
    }

    fn step(&mut self) {
        let len = self.corpus.len();
        let start = self.model.cursor % len;
        let mut prev: Option<usize> = None;
        for offset in 0..self.window {
            let ch = self.corpus[(start + offset) % len];
            let cur = self.model.index_of(&mut self.index, ch);
            if let Some(p) = prev {
                self.model.transitions[p][cur] += 1;
            }
            prev = Some(cur);
        }
        // Overlap by one so the pair spanning two windows is counted.
        self.model.cursor = (start + self.window - 1) % len;
        self.model.steps_trained += 1;
    }
}

impl EpochExecutor for BigramExecutor {
    fn id(&self) -> &'static str {
        "bigram"
    }

    fn run_epoch(&mut self, request: &EpochRequest<'_>) -> Result<(), ExecutorError> {
        if request.device == TrainingDevice::Gpu && !self.warned_device {
            warn!("bigram executor has no GPU support, training on CPU");
            self.warned_device = true;
        }
        self.ensure_corpus(&request.dataset.text_path)?;

        for _ in 0..request.steps {
            self.step();
            if self.model.steps_trained % request.sample_interval.max(1) == 0 {
                let seed = self.corpus[self.model.cursor % self.corpus.len()];
                self.sink.on_event(ProgressEvent::Sample {
                    step: self.model.steps_trained,
                    text: self.model.sample(&self.index, seed),
                });
            }
        }

        self.model.write(&request.output_dir.join(MODEL_FILE_NAME))
    }

    fn save_snapshot(&self, destination: &Path) -> Result<(), ExecutorError> {
        self.model.write(&destination.join(MODEL_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetHandle;
    use crate::progress::{MemoryProgressSink, NullProgressSink};
    use tempfile::TempDir;

    fn dataset(temp: &TempDir, text: &str) -> DatasetHandle {
        let path = temp.path().join("data.txt");
        std::fs::write(&path, text).unwrap();
        DatasetHandle {
            text_path: path,
            encoded_cache: None,
        }
    }

    fn request<'a>(
        out: &'a Path,
        data: &'a DatasetHandle,
        steps: u64,
        sample: u64,
    ) -> EpochRequest<'a> {
        EpochRequest {
            output_dir: out,
            dataset: data,
            steps,
            sample_interval: sample,
            device: TrainingDevice::Cpu,
        }
    }

    #[test]
    fn test_epoch_writes_model_and_samples() {
        let temp = TempDir::new().unwrap();
        let data = dataset(&temp, &"hello world\n".repeat(20));
        let sink = Arc::new(MemoryProgressSink::new());
        let mut exec = BigramExecutor::new(sink.clone()).with_window(16);

        exec.run_epoch(&request(temp.path(), &data, 10, 5)).unwrap();

        assert_eq!(exec.steps_trained(), 10);
        assert!(temp.path().join(MODEL_FILE_NAME).exists());
        assert!(!temp.path().join("bigram-model.json.tmp").exists());
        assert_eq!(
            sink.count(|e| matches!(e, ProgressEvent::Sample { .. })),
            2
        );
    }

    #[test]
    fn test_resume_continues_step_count() {
        let temp = TempDir::new().unwrap();
        let data = dataset(&temp, "abababababab");
        let mut exec = BigramExecutor::new(Arc::new(NullProgressSink));
        exec.run_epoch(&request(temp.path(), &data, 3, 100)).unwrap();

        let resumed = BigramExecutor::resume(temp.path(), Arc::new(NullProgressSink)).unwrap();
        assert_eq!(resumed.steps_trained(), 3);
    }

    #[test]
    fn test_resume_rejects_ragged_transition_table() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(MODEL_FILE_NAME),
            r#"{"vocab": ["a", "b"], "transitions": [[0], [0]], "cursor": 0, "steps_trained": 4}"#,
        )
        .unwrap();

        let err = BigramExecutor::resume(temp.path(), Arc::new(NullProgressSink))
            .err()
            .unwrap();
        assert!(matches!(err, ExecutorError::Failed(_)));
    }

    #[test]
    fn test_resume_rejects_truncated_model() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(MODEL_FILE_NAME),
            r#"{"vocab": ["a", "b"], "transi"#,
        )
        .unwrap();

        let result = BigramExecutor::resume(temp.path(), Arc::new(NullProgressSink));
        assert!(matches!(result, Err(ExecutorError::Json(_))));
    }

    #[test]
    fn test_interrupted_write_leaves_previous_model_loadable() {
        let temp = TempDir::new().unwrap();
        let data = dataset(&temp, "abcabcabc");
        let mut exec = BigramExecutor::new(Arc::new(NullProgressSink));
        exec.run_epoch(&request(temp.path(), &data, 2, 100)).unwrap();
        // A kill mid-write leaves only a partial temp file behind.
        std::fs::write(temp.path().join("bigram-model.json.tmp"), "{\"vocab\": [").unwrap();

        let resumed = BigramExecutor::resume(temp.path(), Arc::new(NullProgressSink)).unwrap();
        assert_eq!(resumed.steps_trained(), 2);
    }

    #[test]
    fn test_sample_follows_most_frequent_transition() {
        let temp = TempDir::new().unwrap();
        let data = dataset(&temp, "ab");
        let sink = Arc::new(MemoryProgressSink::new());
        let mut exec = BigramExecutor::new(sink.clone()).with_window(8);
        exec.run_epoch(&request(temp.path(), &data, 1, 1)).unwrap();

        let sample = sink.events().into_iter().find_map(|e| match e {
            ProgressEvent::Sample { text, .. } => Some(text),
            _ => None,
        });
        let sample = sample.unwrap();
        assert!(
            sample.starts_with("abab") || sample.starts_with("baba"),
            "{sample}"
        );
    }

    #[test]
    fn test_empty_corpus_fails() {
        let temp = TempDir::new().unwrap();
        let data = dataset(&temp, "");
        let mut exec = BigramExecutor::new(Arc::new(NullProgressSink));
        assert!(exec.run_epoch(&request(temp.path(), &data, 1, 1)).is_err());
    }

    #[test]
    fn test_snapshot_writes_into_destination() {
        let temp = TempDir::new().unwrap();
        let data = dataset(&temp, "xyzxyz");
        let mut exec = BigramExecutor::new(Arc::new(NullProgressSink));
        exec.run_epoch(&request(temp.path(), &data, 2, 10)).unwrap();

        let dest = temp.path().join("checkpoint-2");
        std::fs::create_dir_all(&dest).unwrap();
        exec.save_snapshot(&dest).unwrap();
        assert!(dest.join(MODEL_FILE_NAME).exists());
    }
}
