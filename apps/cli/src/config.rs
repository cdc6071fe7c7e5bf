//! CLI configuration file support.
//!
//! Configuration precedence:
//! 1. CLI arguments (handled by clap)
//! 2. Local config file (./.keelrc)
//! 3. Global config file (~/.keel/config.toml)
//! 4. Defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Training backend selectable from the command line or config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Built-in character bigram model.
    Bigram,
    /// External training program (see `--executor-cmd`).
    Command,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default)]
    pub log_level: Option<String>,

    /// Directory relative paths are resolved against
    #[serde(default)]
    pub project_root: Option<PathBuf>,

    #[serde(default)]
    pub training: TrainingDefaults,
}

/// `[training]` table. Every field mirrors a `keel train` flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingDefaults {
    #[serde(default)]
    pub tokenizer_index: Option<PathBuf>,
    #[serde(default)]
    pub dataset: Option<PathBuf>,
    #[serde(default)]
    pub models_dir: Option<PathBuf>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub sample_every: Option<u64>,
    #[serde(default)]
    pub target_epochs: Option<i64>,
    #[serde(default)]
    pub train_epoch_steps: Option<u64>,
    #[serde(default)]
    pub checkpoint_every_epochs: Option<i64>,
    #[serde(default)]
    pub gpu: Option<bool>,
    #[serde(default)]
    pub backend: Option<Backend>,
    /// Program and arguments, split on whitespace
    #[serde(default)]
    pub executor_cmd: Option<String>,
}

fn take<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
    if let Some(v) = src {
        *dst = Some(v.clone());
    }
}

impl CliConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read configuration file {}: {}",
                path.display(),
                e
            )
        })?;
        toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!(
                "Failed to parse configuration file {}: {}",
                path.display(),
                e
            )
        })
    }

    pub fn default_global_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".keel").join("config.toml"))
    }

    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".keelrc")
    }

    /// Load the global config, then the local one on top of it.
    ///
    /// A file that is missing is skipped. A file that exists but cannot be
    /// parsed is reported and skipped.
    pub fn discover_and_load() -> Self {
        let mut config = Self::default();

        let candidates = Self::default_global_path()
            .into_iter()
            .chain(std::iter::once(Self::default_local_path()));
        for path in candidates {
            if !path.is_file() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(found) => config.merge(&found),
                Err(e) => eprintln!("warning: {e}"),
            }
        }

        config
    }

    /// Values set in `other` override values in `self`.
    pub fn merge(&mut self, other: &Self) {
        take(&mut self.log_level, &other.log_level);
        take(&mut self.project_root, &other.project_root);

        let (dst, src) = (&mut self.training, &other.training);
        take(&mut dst.tokenizer_index, &src.tokenizer_index);
        take(&mut dst.dataset, &src.dataset);
        take(&mut dst.models_dir, &src.models_dir);
        take(&mut dst.model_name, &src.model_name);
        take(&mut dst.sample_every, &src.sample_every);
        take(&mut dst.target_epochs, &src.target_epochs);
        take(&mut dst.train_epoch_steps, &src.train_epoch_steps);
        take(&mut dst.checkpoint_every_epochs, &src.checkpoint_every_epochs);
        take(&mut dst.gpu, &src.gpu);
        take(&mut dst.backend, &src.backend);
        take(&mut dst.executor_cmd, &src.executor_cmd);
    }
}

/// Load and merge CLI configuration.
pub fn load_config() -> CliConfig {
    CliConfig::discover_and_load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config_content = r#"
log_level = "debug"
project_root = "/srv/chatbot"

[training]
models_dir = "runs"
target_epochs = -1
checkpoint_every_epochs = 10
gpu = true
backend = "command"
executor_cmd = "python3 train.py"
"#;
        std::fs::write(&config_path, config_content).unwrap();

        let config = CliConfig::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, Some("debug".to_string()));
        assert_eq!(config.project_root, Some(PathBuf::from("/srv/chatbot")));
        assert_eq!(config.training.models_dir, Some(PathBuf::from("runs")));
        assert_eq!(config.training.target_epochs, Some(-1));
        assert_eq!(config.training.checkpoint_every_epochs, Some(10));
        assert_eq!(config.training.gpu, Some(true));
        assert_eq!(config.training.backend, Some(Backend::Command));
        assert_eq!(config.training.dataset, None);
    }

    #[test]
    fn test_merge_prefers_other_when_set() {
        let mut global = CliConfig {
            log_level: Some("warn".to_string()),
            training: TrainingDefaults {
                model_name: Some("global".to_string()),
                sample_every: Some(50),
                ..TrainingDefaults::default()
            },
            ..CliConfig::default()
        };
        let local = CliConfig {
            training: TrainingDefaults {
                model_name: Some("local".to_string()),
                ..TrainingDefaults::default()
            },
            ..CliConfig::default()
        };

        global.merge(&local);

        assert_eq!(global.log_level, Some("warn".to_string()));
        assert_eq!(global.training.model_name, Some("local".to_string()));
        assert_eq!(global.training.sample_every, Some(50));
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "[training\nmodel_name = ").unwrap();

        assert!(CliConfig::load_from_file(&config_path).is_err());
    }

    #[test]
    fn test_unknown_backend_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "[training]\nbackend = \"burn\"\n").unwrap();

        assert!(CliConfig::load_from_file(&config_path).is_err());
    }
}
