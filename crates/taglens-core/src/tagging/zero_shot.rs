//! Zero-shot backend: SigLIP image embedding scored against the taxonomy.
//!
//! The vision encoder, text encoder and prompt bank are loaded together on
//! first use and shared by every later call on the same backend instance.
//! Confidences are a softmax over the whole taxonomy, so they sum to 1.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::backend::TagBackend;
use crate::config::Config;
use crate::embedding::EmbeddingEngine;
use crate::error::{PipelineError, PipelineResult};
use crate::image_io::ImageLoader;
use crate::math::softmax;
use crate::types::{BackendKind, TagResult};

use super::filter::rank;
use super::prompt_bank::PromptBank;
use super::taxonomy::Taxonomy;
use super::text_encoder::SigLipTextEncoder;

/// Everything the zero-shot backend needs once loaded.
struct ZeroShotModels {
    engine: EmbeddingEngine,
    taxonomy: Taxonomy,
    bank: PromptBank,
}

/// Zero-shot classifier over the built-in taxonomy.
pub struct ZeroShotBackend {
    settings: Arc<Config>,
    loader: ImageLoader,
    models: OnceCell<Arc<ZeroShotModels>>,
}

impl ZeroShotBackend {
    pub fn new(settings: Arc<Config>) -> Self {
        let loader = ImageLoader::new(settings.limits.clone());
        Self {
            settings,
            loader,
            models: OnceCell::new(),
        }
    }

    async fn models(&self) -> PipelineResult<Arc<ZeroShotModels>> {
        let models = self
            .models
            .get_or_try_init(|| {
                let settings = Arc::clone(&self.settings);
                super::run_blocking("zero-shot model load", move || {
                    load_models(&settings).map(Arc::new)
                })
            })
            .await?;
        Ok(Arc::clone(models))
    }
}

#[async_trait]
impl TagBackend for ZeroShotBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ZeroShot
    }

    async fn annotate(
        &self,
        image: &Path,
        top_k: usize,
        threshold: f32,
    ) -> PipelineResult<Vec<TagResult>> {
        let models = self.models().await?;
        let decoded = self.loader.load(image).await?;

        let path = image.to_path_buf();
        let scale = self.settings.zero_shot.logit_scale;
        super::run_blocking("zero-shot inference", move || {
            let embedding = models.engine.embed(&decoded, &path)?;
            let similarities = models.bank.similarities(&embedding);
            if similarities.len() != models.taxonomy.len() {
                return Err(PipelineError::Embedding {
                    path,
                    message: format!(
                        "Image embedding has {} dims, prompt bank expects {}",
                        embedding.len(),
                        models.bank.embedding_dim()
                    ),
                });
            }
            Ok(score(&models.taxonomy, &similarities, scale, top_k, threshold))
        })
        .await
    }
}

/// Turn cosine similarities (one per taxonomy term, in order) into ranked
/// results.
pub fn score(
    taxonomy: &Taxonomy,
    similarities: &[f32],
    logit_scale: f32,
    top_k: usize,
    threshold: f32,
) -> Vec<TagResult> {
    let logits: Vec<f32> = similarities.iter().map(|s| s * logit_scale).collect();
    let results = taxonomy
        .terms()
        .iter()
        .zip(softmax(&logits))
        .map(|(term, confidence)| TagResult::new(term.name, confidence))
        .collect();
    rank(results, top_k, threshold)
}

/// Load the encoders and the prompt bank, reusing the on-disk bank when the
/// model and prompts match.
fn load_models(settings: &Config) -> PipelineResult<ZeroShotModels> {
    let model_dir = settings.zero_shot_model_dir();
    let engine = EmbeddingEngine::load(&settings.zero_shot, &model_dir)?;

    let taxonomy = Taxonomy::builtin();
    let prompts = taxonomy.prompts(&settings.zero_shot.prompt_template);
    let cache_key = PromptBank::cache_key(&settings.zero_shot.model, &prompts);
    let cache_path = settings
        .taxonomy_dir()
        .join(format!("{}.bin", settings.zero_shot.model));

    let bank = match PromptBank::load_cached(&cache_path, &cache_key, prompts.len()) {
        Some(bank) => {
            tracing::info!("Using cached prompt bank ({} terms)", bank.term_count());
            bank
        }
        None => {
            let start = std::time::Instant::now();
            let encoder = SigLipTextEncoder::new(&model_dir)?;
            let bank = PromptBank::encode_all(&prompts, &encoder, settings.zero_shot.batch_size)?;
            tracing::info!(
                "Encoded {} taxonomy prompts in {:.1}s",
                bank.term_count(),
                start.elapsed().as_secs_f64()
            );
            if let Err(e) = bank.save(&cache_path, &cache_key) {
                tracing::warn!("Could not cache prompt bank: {e}");
            }
            bank
        }
    };

    Ok(ZeroShotModels {
        engine,
        taxonomy,
        bank,
    })
}
