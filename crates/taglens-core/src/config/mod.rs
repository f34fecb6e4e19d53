//! Configuration management for taglens.
//!
//! Two layers live here:
//! - [`Config`]: static engine settings loaded from `config.toml`
//!   (model locations, limits, caption endpoint, logging).
//! - [`ConfigStore`]: the small persisted tagger record (backend selection,
//!   local model paths, per-group overrides) that changes at runtime through
//!   `configure`.

mod store;
mod types;
mod validate;

pub use store::{ConfigPatch, ConfigStore, LocalModelPaths, TaggerConfig};
pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root engine settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Zero-shot backend settings
    pub zero_shot: ZeroShotConfig,

    /// Local classifier settings
    pub local: LocalClassifierConfig,

    /// Caption generation settings
    pub caption: CaptionConfig,

    /// Group routing settings
    pub routing: RoutingConfig,

    /// Persisted tagger record location
    pub store: StoreConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.zero_shot.image_size = ZeroShotConfig::image_size_for_model(&config.zero_shot.model);
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.taglens.taglens/config.toml
    /// - Linux: ~/.config/taglens/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\taglens\config\config.toml
    ///
    /// Falls back to ~/.taglens/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    fn config_dir() -> PathBuf {
        directories::ProjectDirs::from("com", "taglens", "taglens")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".taglens")
            })
    }

    /// Get the resolved model directory path (with ~ expansion).
    pub fn model_dir(&self) -> PathBuf {
        let path_str = self.general.model_dir.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Directory holding the zero-shot encoder files.
    pub fn zero_shot_model_dir(&self) -> PathBuf {
        self.model_dir().join(&self.zero_shot.model)
    }

    /// Directory for the cached taxonomy prompt bank.
    ///
    /// Co-located with the models directory: if `model_dir` is `~/.taglens/models`,
    /// the cache lands at `~/.taglens/taxonomy`.
    pub fn taxonomy_dir(&self) -> PathBuf {
        let model_dir = self.model_dir();
        model_dir.parent().unwrap_or(&model_dir).join("taxonomy")
    }

    /// Path of the persisted tagger record (with ~ expansion).
    pub fn store_path(&self) -> PathBuf {
        match &self.store.path {
            Some(path) => PathBuf::from(shellexpand::tilde(path).into_owned()),
            None => Self::config_dir().join("tagger.toml"),
        }
    }

    /// Resolved local-model autodetection directory, if configured.
    pub fn autoconfigure_dir(&self) -> Option<PathBuf> {
        self.local
            .autoconfigure_dir
            .as_deref()
            .map(|dir| PathBuf::from(shellexpand::tilde(dir).into_owned()))
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.zero_shot.image_size, 224);
        assert_eq!(config.local.image_size, 448);
        assert_eq!(config.local.layout, TensorLayout::Nhwc);
        assert_eq!(config.routing.uploads_marker, "uploads");
        assert!(config.caption.request_timeout_ms.is_none());
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[zero_shot]"));
        assert!(toml.contains("[caption]"));
    }

    #[test]
    fn test_load_from_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[zero_shot]\nmodel = \"siglip-base-patch16-384\"\n\n[local]\nlayout = \"nchw\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.zero_shot.image_size, 384);
        assert_eq!(config.local.layout, TensorLayout::Nchw);
        assert_eq!(config.caption.deterministic_captions, 4);
    }

    #[test]
    fn test_prompt_template() {
        let config = ZeroShotConfig::default();
        assert_eq!(config.prompt_for("sunset"), "a photo of sunset");
    }

    #[test]
    fn test_store_path_override() {
        let mut config = Config::default();
        config.store.path = Some("/tmp/taglens/tagger.toml".to_string());
        assert_eq!(config.store_path(), PathBuf::from("/tmp/taglens/tagger.toml"));
    }
}
