//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where the zero-shot models are stored
    pub model_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("~/.taglens/models"),
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 10000,
        }
    }
}

/// Zero-shot backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZeroShotConfig {
    /// Model directory name under `general.model_dir`
    pub model: String,

    /// Vision encoder input size (224 for base, 384 for the 384 variant)
    pub image_size: u32,

    /// Template each taxonomy tag is wrapped in before text encoding.
    /// `{}` is replaced by the tag.
    pub prompt_template: String,

    /// Multiplier applied to cosine similarities before the softmax
    pub logit_scale: f32,

    /// Prompts per text encoder call when building the prompt bank
    pub batch_size: usize,
}

impl Default for ZeroShotConfig {
    fn default() -> Self {
        Self {
            model: "siglip-base-patch16".to_string(),
            image_size: 224,
            prompt_template: "a photo of {}".to_string(),
            logit_scale: 100.0,
            batch_size: 64,
        }
    }
}

impl ZeroShotConfig {
    /// Resolve image size from model name.
    pub fn image_size_for_model(model: &str) -> u32 {
        if model.contains("384") {
            384
        } else {
            224
        }
    }

    /// Render the text prompt for one taxonomy tag.
    pub fn prompt_for(&self, tag: &str) -> String {
        self.prompt_template.replace("{}", tag)
    }
}

/// Memory layout of the classifier input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// [batch, height, width, channels]
    #[default]
    Nhwc,
    /// [batch, channels, height, width]
    Nchw,
}

/// Local multi-label classifier settings.
///
/// The model and label paths themselves live in the persisted tagger record,
/// not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalClassifierConfig {
    /// Square input size the model expects
    pub image_size: u32,

    /// Input tensor layout
    pub layout: TensorLayout,

    /// Directory scanned at startup for a model and label file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoconfigure_dir: Option<String>,
}

impl Default for LocalClassifierConfig {
    fn default() -> Self {
        Self {
            image_size: 448,
            layout: TensorLayout::Nhwc,
            autoconfigure_dir: None,
        }
    }
}

/// Caption generation settings (Ollama vision model).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    /// Ollama API endpoint
    pub endpoint: String,

    /// Vision model name
    pub model: String,

    /// Captions from the deterministic pass (temperature 0, fixed seed)
    pub deterministic_captions: usize,

    /// Captions from the stochastic sampling pass
    pub sampled_captions: usize,

    /// Sampling temperature for the stochastic pass
    pub temperature: f32,

    /// Top-k cutoff for the stochastic pass
    pub top_k: u32,

    /// Nucleus (top-p) cutoff for the stochastic pass
    pub top_p: f32,

    /// Maximum tokens per caption
    pub max_tokens: u32,

    /// Retries per caption request on transient failures
    pub retry_attempts: u32,

    /// Base delay between retries in milliseconds
    pub retry_delay_ms: u64,

    /// Per-request deadline. Unset means requests wait indefinitely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llava".to_string(),
            deterministic_captions: 4,
            sampled_captions: 2,
            temperature: 1.0,
            top_k: 50,
            top_p: 0.92,
            max_tokens: 60,
            retry_attempts: 2,
            retry_delay_ms: 500,
            request_timeout_ms: None,
        }
    }
}

/// Group routing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Path segment after which the image group name appears
    /// (`.../uploads/<group>/<file>`)
    pub uploads_marker: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            uploads_marker: "uploads".to_string(),
        }
    }
}

/// Location of the persisted tagger record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Override for the record path (defaults to `tagger.toml` in the config dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
