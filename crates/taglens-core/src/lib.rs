//! Taglens Core - embeddable image annotation engine.
//!
//! Taglens takes an image path and returns a ranked list of
//! `(tag, confidence)` pairs produced by one of three interchangeable
//! backends:
//!
//! - **Zero-shot**: SigLIP image/text similarity against a built-in taxonomy
//! - **Local classifier**: a user-supplied ONNX multi-label model and label file
//! - **Caption heuristic**: captions from a vision-language model, mined for tags
//!
//! # Architecture
//!
//! ```text
//! path → resolve backend (global / group override / fallback) → backend → filter → tags
//! ```
//!
//! Backend selection lives in a small persisted record changed through
//! [`Tagger::configure`]; static engine settings come from `config.toml`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use taglens_core::{BackendKind, ConfigPatch, Tagger};
//!
//! #[tokio::main]
//! async fn main() -> taglens_core::Result<()> {
//!     let tagger = Tagger::with_defaults()?;
//!     tagger.configure(ConfigPatch::backend(BackendKind::CaptionHeuristic));
//!
//!     for tag in tagger.annotate("./image.jpg", 10, 0.2).await {
//!         println!("{} {:.2}", tag.tag, tag.confidence);
//!     }
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod autoconfig;
pub mod backend;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod image_io;
pub mod math;
pub(crate) mod onnx;
pub mod routing;
pub mod tagging;
pub mod types;

// Re-exports for convenient access
pub use backend::{BackendContext, BackendFactory, ModelBackendFactory, TagBackend};
pub use config::{Config, ConfigPatch, ConfigStore, LocalModelPaths, TaggerConfig};
pub use engine::{Tagger, PRIMARY_TAG_THRESHOLD};
pub use error::{ConfigError, PipelineError, PipelineResult, Result, TaglensError};
pub use types::{BackendKind, TagResult};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_tagger_new_with_isolated_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.store.path = Some(dir.path().join("tagger.toml").to_string_lossy().into_owned());
        let tagger = Tagger::new(config);
        assert_eq!(tagger.config().backend, BackendKind::ZeroShot);
        assert_eq!(tagger.resolve("/uploads/ai/x.png"), BackendKind::ZeroShot);
    }
}
