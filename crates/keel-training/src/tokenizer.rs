use crate::error::{TrainingError, TrainingResult};
use crate::layout::ProjectRoot;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// On-disk shape of a tokenizer index. Paths are project-relative.
#[derive(Debug, Deserialize)]
struct TokenizerIndexFile {
    vocab_file: PathBuf,
    merges_file: PathBuf,
    tokenizer_file: PathBuf,
    vocab_size: u32,
}

/// Files and vocabulary size of a trained tokenizer, resolved against the
/// project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizerConfig {
    pub vocab_file: PathBuf,
    pub merges_file: PathBuf,
    pub tokenizer_file: PathBuf,
    pub vocab_size: u32,
}

impl TokenizerConfig {
    pub fn load(project: &ProjectRoot, index_path: &Path) -> TrainingResult<Self> {
        let path = project.resolve(index_path);
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            TrainingError::TokenizerConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        let index: TokenizerIndexFile = serde_json::from_str(&contents).map_err(|e| {
            TrainingError::TokenizerConfig(format!("failed to parse {}: {e}", path.display()))
        })?;

        if index.vocab_size == 0 {
            return Err(TrainingError::TokenizerConfig(format!(
                "{}: vocab_size must be >= 1",
                path.display()
            )));
        }

        Ok(Self {
            vocab_file: project.resolve(&index.vocab_file),
            merges_file: project.resolve(&index.merges_file),
            tokenizer_file: project.resolve(&index.tokenizer_file),
            vocab_size: index.vocab_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_resolves_paths_against_project() {
        let temp = TempDir::new().unwrap();
        let project = ProjectRoot::new(temp.path().to_path_buf());
        std::fs::create_dir_all(temp.path().join("training-data")).unwrap();
        std::fs::write(
            temp.path().join("training-data/tokenizer-index.json"),
            r#"{
                "vocab_file": "training-data/tokenizer/vocab.json",
                "merges_file": "training-data/tokenizer/merges.txt",
                "tokenizer_file": "training-data/tokenizer/tokenizer.json",
                "vocab_size": 5000
            }"#,
        )
        .unwrap();

        let index = Path::new("training-data/tokenizer-index.json");
        let config = TokenizerConfig::load(&project, index).unwrap();
        let tokenizer_dir = temp.path().join("training-data/tokenizer");
        assert_eq!(config.vocab_size, 5000);
        assert_eq!(config.vocab_file, tokenizer_dir.join("vocab.json"));
        assert_eq!(config.merges_file, tokenizer_dir.join("merges.txt"));
        assert_eq!(config.tokenizer_file, tokenizer_dir.join("tokenizer.json"));
    }

    #[test]
    fn test_load_requires_vocab_size() {
        let temp = TempDir::new().unwrap();
        let project = ProjectRoot::new(temp.path().to_path_buf());
        std::fs::write(
            temp.path().join("index.json"),
            r#"{"vocab_file": "v", "merges_file": "m", "tokenizer_file": "t"}"#,
        )
        .unwrap();

        let err = TokenizerConfig::load(&project, Path::new("index.json")).unwrap_err();
        assert!(matches!(err, TrainingError::TokenizerConfig(_)));
    }

    #[test]
    fn test_load_missing_index() {
        let temp = TempDir::new().unwrap();
        let project = ProjectRoot::new(temp.path().to_path_buf());
        assert!(TokenizerConfig::load(&project, Path::new("nope.json")).is_err());
    }
}
