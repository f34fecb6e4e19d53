//! Backend contract and the per-configuration backend context.
//!
//! A [`BackendContext`] holds one instance of each backend for one tagger
//! record. The engine swaps in a fresh context on every `configure`, which
//! drops the old backends and everything they lazily loaded.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, LocalModelPaths, TaggerConfig};
use crate::error::PipelineResult;
use crate::tagging::{CaptionBackend, LocalClassifierBackend, ZeroShotBackend};
use crate::types::{BackendKind, TagResult};

/// One annotation strategy.
///
/// Implementations return raw candidates; junk filtering and final
/// truncation happen in the engine.
#[async_trait]
pub trait TagBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn annotate(
        &self,
        image: &Path,
        top_k: usize,
        threshold: f32,
    ) -> PipelineResult<Vec<TagResult>>;
}

/// Builds the backends a context is made of.
pub trait BackendFactory: Send + Sync {
    fn zero_shot(&self) -> Arc<dyn TagBackend>;

    fn local_classifier(&self, paths: &LocalModelPaths) -> Arc<dyn TagBackend>;

    fn caption(&self) -> Arc<dyn TagBackend>;
}

/// Factory for the real model-backed backends.
pub struct ModelBackendFactory {
    settings: Arc<Config>,
}

impl ModelBackendFactory {
    pub fn new(settings: Arc<Config>) -> Self {
        Self { settings }
    }
}

impl BackendFactory for ModelBackendFactory {
    fn zero_shot(&self) -> Arc<dyn TagBackend> {
        Arc::new(ZeroShotBackend::new(Arc::clone(&self.settings)))
    }

    fn local_classifier(&self, paths: &LocalModelPaths) -> Arc<dyn TagBackend> {
        Arc::new(LocalClassifierBackend::new(paths.clone(), &self.settings))
    }

    fn caption(&self) -> Arc<dyn TagBackend> {
        Arc::new(CaptionBackend::ollama(&self.settings))
    }
}

/// The backends for one tagger record.
pub struct BackendContext {
    zero_shot: Arc<dyn TagBackend>,
    local: Option<Arc<dyn TagBackend>>,
    caption: Arc<dyn TagBackend>,
}

impl BackendContext {
    /// Build a context for `record`. The local classifier is only created
    /// when both of its paths are configured.
    pub fn new(factory: &dyn BackendFactory, record: &TaggerConfig) -> Self {
        let local = match (&record.model_path, &record.labels_path) {
            (Some(model), Some(labels)) => Some(factory.local_classifier(&LocalModelPaths {
                model: model.clone(),
                labels: labels.clone(),
            })),
            _ => None,
        };
        Self {
            zero_shot: factory.zero_shot(),
            local,
            caption: factory.caption(),
        }
    }

    /// Backend for `kind`. A missing local classifier yields the zero-shot
    /// backend.
    pub fn backend(&self, kind: BackendKind) -> Arc<dyn TagBackend> {
        match kind {
            BackendKind::ZeroShot => Arc::clone(&self.zero_shot),
            BackendKind::LocalClassifier => self
                .local
                .as_ref()
                .map_or_else(|| Arc::clone(&self.zero_shot), Arc::clone),
            BackendKind::CaptionHeuristic => Arc::clone(&self.caption),
        }
    }
}
