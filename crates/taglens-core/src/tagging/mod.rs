//! Tagging backends and the shared result filter.
//!
//! - [`zero_shot`]: SigLIP image/text similarity against a built-in taxonomy
//! - [`classifier`]: user-supplied ONNX multi-label classifier with a label file
//! - [`caption`]: vision-language captions mined for tags
//!
//! Every backend's output goes through [`filter::assemble`] at the engine
//! boundary.

pub mod caption;
pub mod classifier;
pub mod filter;
pub mod labels;
pub mod prompt_bank;
pub mod taxonomy;
pub mod text_encoder;
pub mod zero_shot;

pub use caption::CaptionBackend;
pub use classifier::{LocalClassifier, LocalClassifierBackend};
pub use labels::LabelTable;
pub use taxonomy::Taxonomy;
pub use zero_shot::ZeroShotBackend;

use crate::error::{PipelineError, PipelineResult};

/// Run CPU-bound model work off the async runtime.
pub(crate) async fn run_blocking<T, F>(stage: &str, f: F) -> PipelineResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> PipelineResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::Model {
            message: format!("{stage} task failed: {e}"),
        })?
}
