use crate::error::{TrainingError, TrainingResult};
use crate::tokenizer::TokenizerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Extension of a pre-encoded copy of a dataset, stored next to the text.
pub const ENCODED_CACHE_EXTENSION: &str = "tar.gz";

/// Training data as handed to an executor. The supervisor never reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetHandle {
    pub text_path: PathBuf,
    /// `<stem>.tar.gz` next to the text file, when one exists.
    pub encoded_cache: Option<PathBuf>,
}

/// GPT-2 style model shape sized for a tokenizer vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub vocab_size: u32,
    pub max_length: u32,
    pub n_embd: u32,
    pub n_layer: u32,
    pub n_head: u32,
    pub dropout: f32,
}

impl ModelConfig {
    #[must_use]
    pub fn sized_for(vocab_size: u32) -> Self {
        Self {
            vocab_size,
            max_length: 32,
            n_embd: 256,
            n_layer: 8,
            n_head: 8,
            dropout: 0.0,
        }
    }
}

pub fn load_dataset(
    tokenizer: &TokenizerConfig,
    text_path: &Path,
) -> TrainingResult<(DatasetHandle, ModelConfig)> {
    if !text_path.is_file() {
        return Err(TrainingError::Dataset(format!(
            "dataset file does not exist: {}",
            text_path.display()
        )));
    }

    let cache = text_path.with_extension(ENCODED_CACHE_EXTENSION);
    let handle = DatasetHandle {
        text_path: text_path.to_path_buf(),
        encoded_cache: cache.is_file().then_some(cache),
    };

    Ok((handle, ModelConfig::sized_for(tokenizer.vocab_size)))
}
