//! SigLIP image embedding.
//!
//! Converts images into L2-normalized vectors in the space shared with the
//! SigLIP text encoder, which is what zero-shot scoring compares against.
//!
//! ```rust,ignore
//! use taglens_core::embedding::EmbeddingEngine;
//! use taglens_core::Config;
//!
//! let config = Config::default();
//! let engine = EmbeddingEngine::load(&config.zero_shot, &config.zero_shot_model_dir())?;
//! let embedding = engine.embed(&image, path)?;
//! ```

pub mod preprocess;
pub(crate) mod siglip;

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::DynamicImage;

use crate::config::{TensorLayout, ZeroShotConfig};
use crate::error::PipelineError;

use self::preprocess::preprocess;
use self::siglip::SigLipSession;

const VISUAL_MODEL_FILENAME: &str = "visual.onnx";

/// SigLIP vision encoder plus its input geometry.
pub struct EmbeddingEngine {
    session: SigLipSession,
    image_size: u32,
}

impl EmbeddingEngine {
    /// Load `visual.onnx` from `model_dir`.
    pub fn load(config: &ZeroShotConfig, model_dir: &Path) -> Result<Self, PipelineError> {
        let model_path = Self::model_path(model_dir);
        if !model_path.exists() {
            return Err(PipelineError::Model {
                message: format!("Vision encoder not found at {:?}", model_path),
            });
        }

        let start = std::time::Instant::now();
        let session = SigLipSession::load(&model_path)?;
        tracing::info!(
            "Loaded SigLIP vision encoder ({}px) in {:.1}s",
            config.image_size,
            start.elapsed().as_secs_f64()
        );

        Ok(Self {
            session,
            image_size: config.image_size,
        })
    }

    /// Embed one image. Blocking; run it on a blocking thread.
    pub fn embed(&self, image: &DynamicImage, path: &Path) -> Result<Vec<f32>, PipelineError> {
        let tensor = preprocess(
            image,
            self.image_size,
            TensorLayout::Nchw,
            FilterType::Lanczos3,
        );
        self.session.embed(&tensor, path)
    }

    /// Where the vision encoder is expected inside `model_dir`.
    pub fn model_path(model_dir: &Path) -> PathBuf {
        model_dir.join(VISUAL_MODEL_FILENAME)
    }
}
