//! Caption-heuristic backend.
//!
//! Generates a [`CaptionSet`] with a vision-language model, then mines the
//! captions for tags with [`miner::mine_captions`]. Needs no local model
//! files, only a reachable caption model.

pub mod generator;
pub mod miner;
pub mod ollama;
pub mod retry;

pub use generator::{CaptionModel, CaptionRequest, CaptionSet, ImageInput, Sampling};
pub use ollama::OllamaCaptioner;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::TagBackend;
use crate::config::{CaptionConfig, Config};
use crate::error::PipelineResult;
use crate::image_io::{format_to_string, ImageLoader};
use crate::types::{BackendKind, TagResult};

/// Tags mined from generated captions.
pub struct CaptionBackend {
    config: CaptionConfig,
    loader: ImageLoader,
    model: Arc<dyn CaptionModel>,
}

impl CaptionBackend {
    pub fn new(settings: &Config, model: Arc<dyn CaptionModel>) -> Self {
        Self {
            config: settings.caption.clone(),
            loader: ImageLoader::new(settings.limits.clone()),
            model,
        }
    }

    /// Backend talking to the Ollama endpoint from `[caption]`.
    pub fn ollama(settings: &Config) -> Self {
        Self::new(settings, Arc::new(OllamaCaptioner::from_config(&settings.caption)))
    }
}

#[async_trait]
impl TagBackend for CaptionBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::CaptionHeuristic
    }

    async fn annotate(
        &self,
        image: &Path,
        top_k: usize,
        threshold: f32,
    ) -> PipelineResult<Vec<TagResult>> {
        let read = self.loader.read(image).await?;
        let input = ImageInput::from_bytes(&read.bytes, format_to_string(read.format));

        let start = std::time::Instant::now();
        let set =
            generator::generate_caption_set(self.model.as_ref(), input, &self.config, image).await?;
        tracing::debug!(
            "Captioned {:?} with {} in {}ms",
            image,
            self.model.name(),
            start.elapsed().as_millis()
        );

        let captions: Vec<String> = set.into_iter().collect();
        Ok(miner::mine_captions(&captions, top_k, threshold))
    }
}
