//! Local multi-label classifier backend (WD14-style taggers).
//!
//! Runs a user-supplied ONNX model whose output vector is index-aligned with
//! a user-supplied label file. Each output is an independent logit; a sigmoid
//! turns it into a confidence.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::imageops::FilterType;
use image::DynamicImage;
use ort::session::Session;
use tokio::sync::OnceCell;

use crate::backend::TagBackend;
use crate::config::{Config, LocalClassifierConfig, LocalModelPaths};
use crate::embedding::preprocess::preprocess;
use crate::error::{PipelineError, PipelineResult};
use crate::image_io::ImageLoader;
use crate::math::sigmoid;
use crate::onnx;
use crate::types::{BackendKind, TagResult};

use super::filter::rank;
use super::labels::LabelTable;

/// A loaded classifier model and its label table.
pub struct LocalClassifier {
    session: Mutex<Session>,
    input_name: String,
    labels: LabelTable,
    config: LocalClassifierConfig,
}

impl LocalClassifier {
    /// Load the model and parse the label file.
    pub fn load(paths: &LocalModelPaths, config: LocalClassifierConfig) -> PipelineResult<Self> {
        tracing::info!(
            "Loading local classifier from {:?} (labels: {:?})",
            paths.model,
            paths.labels
        );
        let session = onnx::load_session(&paths.model)?;
        let input_name = onnx::first_input_name(&session, "input_1:0");
        let labels = LabelTable::load(&paths.labels)?;
        tracing::info!("Local classifier loaded with {} labels", labels.len());

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            labels,
            config,
        })
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Per-label confidences, in label order.
    ///
    /// Blocking; call from `spawn_blocking` when on the async runtime.
    pub fn predict(&self, image: &DynamicImage, path: &Path) -> PipelineResult<Vec<f32>> {
        let tensor = preprocess(
            image,
            self.config.image_size,
            self.config.layout,
            FilterType::CatmullRom,
        );
        let input_value = onnx::tensor_value(&tensor, path)?;

        let mut session = self.session.lock().map_err(|e| PipelineError::Inference {
            path: path.to_path_buf(),
            message: format!("Session lock poisoned: {e}"),
        })?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .map_err(|e| PipelineError::Inference {
                path: path.to_path_buf(),
                message: format!("ONNX inference failed: {e}"),
            })?;

        let (_name, output) = outputs.iter().next().ok_or_else(|| PipelineError::Inference {
            path: path.to_path_buf(),
            message: "Model produced no outputs".to_string(),
        })?;

        let (_shape, logits) =
            output
                .try_extract_tensor::<f32>()
                .map_err(|e| PipelineError::Inference {
                    path: path.to_path_buf(),
                    message: format!("Failed to extract output tensor: {e}"),
                })?;

        if logits.len() != self.labels.len() {
            tracing::warn!(
                "Classifier produced {} outputs but label file has {} labels",
                logits.len(),
                self.labels.len()
            );
        }

        Ok(logits.iter().map(|&x| sigmoid(x)).collect())
    }
}

/// Pair confidences with labels by index and keep the best `limit` entries
/// at or above `threshold`.
pub fn label_predictions(
    labels: &LabelTable,
    confidences: &[f32],
    limit: usize,
    threshold: f32,
) -> Vec<TagResult> {
    let results = confidences
        .iter()
        .enumerate()
        .filter_map(|(idx, &confidence)| {
            labels
                .get(idx)
                .filter(|label| !label.is_empty())
                .map(|label| TagResult::new(label, confidence))
        })
        .collect();
    rank(results, limit, threshold)
}

/// Local classifier backend bound to one model/label pair.
pub struct LocalClassifierBackend {
    paths: LocalModelPaths,
    config: LocalClassifierConfig,
    loader: ImageLoader,
    classifier: OnceCell<Arc<LocalClassifier>>,
}

impl LocalClassifierBackend {
    pub fn new(paths: LocalModelPaths, settings: &Config) -> Self {
        Self {
            paths,
            config: settings.local.clone(),
            loader: ImageLoader::new(settings.limits.clone()),
            classifier: OnceCell::new(),
        }
    }

    pub fn paths(&self) -> &LocalModelPaths {
        &self.paths
    }

    async fn classifier(&self) -> PipelineResult<Arc<LocalClassifier>> {
        let classifier = self
            .classifier
            .get_or_try_init(|| {
                let paths = self.paths.clone();
                let config = self.config.clone();
                super::run_blocking("local classifier load", move || {
                    LocalClassifier::load(&paths, config).map(Arc::new)
                })
            })
            .await?;
        Ok(Arc::clone(classifier))
    }
}

#[async_trait]
impl TagBackend for LocalClassifierBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::LocalClassifier
    }

    /// Returns up to `2 × top_k` candidates so junk removal downstream still
    /// leaves `top_k`.
    async fn annotate(
        &self,
        image: &Path,
        top_k: usize,
        threshold: f32,
    ) -> PipelineResult<Vec<TagResult>> {
        let classifier = self.classifier().await?;
        let decoded = self.loader.load(image).await?;

        let path = image.to_path_buf();
        super::run_blocking("local classifier inference", move || {
            let confidences = classifier.predict(&decoded, &path)?;
            Ok(label_predictions(
                classifier.labels(),
                &confidences,
                top_k.saturating_mul(2),
                threshold,
            ))
        })
        .await
    }
}
