//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.zero_shot.image_size == 0 || self.local.image_size == 0 {
            return Err(ConfigError::ValidationError(
                "zero_shot.image_size and local.image_size must be > 0".into(),
            ));
        }
        if !self.zero_shot.prompt_template.contains("{}") {
            return Err(ConfigError::ValidationError(
                "zero_shot.prompt_template must contain a {} placeholder".into(),
            ));
        }
        if !(self.zero_shot.logit_scale.is_finite() && self.zero_shot.logit_scale > 0.0) {
            return Err(ConfigError::ValidationError(
                "zero_shot.logit_scale must be a positive number".into(),
            ));
        }
        if self.zero_shot.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "zero_shot.batch_size must be > 0".into(),
            ));
        }
        if self.caption.deterministic_captions + self.caption.sampled_captions == 0 {
            return Err(ConfigError::ValidationError(
                "caption.deterministic_captions + caption.sampled_captions must be > 0".into(),
            ));
        }
        if self.caption.top_p <= 0.0 || self.caption.top_p > 1.0 {
            return Err(ConfigError::ValidationError(
                "caption.top_p must be in (0.0, 1.0]".into(),
            ));
        }
        if self.caption.temperature < 0.0 {
            return Err(ConfigError::ValidationError(
                "caption.temperature must be >= 0.0".into(),
            ));
        }
        if self.caption.request_timeout_ms == Some(0) {
            return Err(ConfigError::ValidationError(
                "caption.request_timeout_ms must be > 0 when set".into(),
            ));
        }
        if self.routing.uploads_marker.trim_matches(['/', '\\']).is_empty() {
            return Err(ConfigError::ValidationError(
                "routing.uploads_marker must not be empty".into(),
            ));
        }
        Ok(())
    }
}
