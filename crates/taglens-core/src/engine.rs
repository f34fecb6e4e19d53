//! The annotation engine.
//!
//! [`Tagger`] owns the tagger record and the current [`BackendContext`].
//! Each call resolves a backend for the image, runs it, and passes the raw
//! candidates through the result filter. Backend errors are logged and turn
//! into an empty result; nothing here returns an error to the caller.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::autoconfig;
use crate::backend::{BackendContext, BackendFactory, ModelBackendFactory};
use crate::config::{Config, ConfigPatch, ConfigStore, LocalModelPaths, TaggerConfig};
use crate::error::Result;
use crate::routing;
use crate::tagging::filter;
use crate::types::{BackendKind, TagResult};

/// Threshold used by [`Tagger::primary_tags`].
pub const PRIMARY_TAG_THRESHOLD: f32 = 0.2;

struct EngineState {
    store: ConfigStore,
    context: Arc<BackendContext>,
}

/// Image annotation engine.
pub struct Tagger {
    settings: Arc<Config>,
    factory: Arc<dyn BackendFactory>,
    state: RwLock<EngineState>,
}

impl Tagger {
    /// Create an engine with the model-backed backends and the persisted
    /// record at `settings.store_path()`.
    ///
    /// If `[local].autoconfigure_dir` is set, it is scanned for a local
    /// classifier before the first call.
    pub fn new(settings: Config) -> Self {
        let settings = Arc::new(settings);
        let store = ConfigStore::open(settings.store_path());
        let factory = Arc::new(ModelBackendFactory::new(Arc::clone(&settings)));
        let tagger = Self::from_parts(settings, store, factory);
        if let Some(dir) = tagger.settings.autoconfigure_dir() {
            tagger.autoconfigure_local(&dir);
        }
        tagger
    }

    /// Create an engine from the settings file at the default location.
    pub fn with_defaults() -> Result<Self> {
        let settings = Config::load()?;
        Ok(Self::new(settings))
    }

    /// Create an engine with an explicit store and backend factory.
    pub fn with_factory(
        settings: Config,
        store: ConfigStore,
        factory: Arc<dyn BackendFactory>,
    ) -> Self {
        Self::from_parts(Arc::new(settings), store, factory)
    }

    fn from_parts(
        settings: Arc<Config>,
        store: ConfigStore,
        factory: Arc<dyn BackendFactory>,
    ) -> Self {
        let context = Arc::new(BackendContext::new(factory.as_ref(), store.current()));
        tracing::debug!(
            "Tagger ready (backend: {}, store: {:?})",
            store.current().backend,
            store.path()
        );
        Self {
            settings,
            factory,
            state: RwLock::new(EngineState { store, context }),
        }
    }

    /// Engine settings.
    pub fn settings(&self) -> &Config {
        &self.settings
    }

    /// Snapshot of the current tagger record.
    pub fn config(&self) -> TaggerConfig {
        self.read_state().store.current().clone()
    }

    /// Annotate one image.
    ///
    /// Returns at most `top_k` tags, each with confidence ≥ `threshold`,
    /// sorted by descending confidence. Any failure yields an empty list.
    pub async fn annotate(
        &self,
        image: impl AsRef<Path>,
        top_k: usize,
        threshold: f32,
    ) -> Vec<TagResult> {
        let image = image.as_ref();
        if top_k == 0 {
            return Vec::new();
        }
        let threshold = sanitize_threshold(threshold);

        let (record, context) = {
            let state = self.read_state();
            (state.store.current().clone(), Arc::clone(&state.context))
        };
        let kind = self.backend_for(image, &record);
        let backend = context.backend(kind);

        let start = std::time::Instant::now();
        match backend.annotate(image, top_k, threshold).await {
            Ok(candidates) => {
                let tags = filter::assemble(candidates, top_k, threshold);
                tracing::debug!(
                    "Tagged {:?} with {} in {:?}: {} tags",
                    image,
                    backend.kind(),
                    start.elapsed(),
                    tags.len()
                );
                tags
            }
            Err(e) => {
                tracing::warn!("{} backend failed for {:?}: {e}", backend.kind(), image);
                Vec::new()
            }
        }
    }

    /// Tag names only, at the default threshold of 0.2.
    pub async fn primary_tags(&self, image: impl AsRef<Path>, max_tags: usize) -> Vec<String> {
        self.annotate(image, max_tags, PRIMARY_TAG_THRESHOLD)
            .await
            .into_iter()
            .map(|r| r.tag)
            .collect()
    }

    /// The backend that would run for `image` under the current record.
    pub fn resolve(&self, image: impl AsRef<Path>) -> BackendKind {
        let record = self.config();
        self.backend_for(image.as_ref(), &record)
    }

    /// Merge `patch` into the record, persist it, and drop all loaded
    /// backend state.
    ///
    /// Backend state is dropped even when the patch changes nothing.
    pub fn configure(&self, patch: ConfigPatch) -> TaggerConfig {
        let mut state = self.write_state();
        state.store.configure(patch);
        self.rebuild_context(&mut state, "configure")
    }

    /// Restore the default record.
    pub fn reset_config(&self) -> TaggerConfig {
        let mut state = self.write_state();
        state.store.reset();
        self.rebuild_context(&mut state, "reset")
    }

    /// Re-read the persisted record.
    pub fn reload_config(&self) -> TaggerConfig {
        let mut state = self.write_state();
        state.store.reload();
        self.rebuild_context(&mut state, "reload")
    }

    /// Select a local classifier found in `dir`, if the current record allows it.
    ///
    /// Returns the detected paths when the record was changed.
    pub fn autoconfigure_local(&self, dir: &Path) -> Option<LocalModelPaths> {
        let mut state = self.write_state();
        if !autoconfig::should_autoconfigure(state.store.current()) {
            tracing::debug!("Skipping local model autodetection in {:?}", dir);
            return None;
        }
        let Some(paths) = autoconfig::detect_local_model(dir) else {
            tracing::debug!("No local model found in {:?}", dir);
            return None;
        };
        state.store.configure(ConfigPatch::local_classifier(
            paths.model.clone(),
            paths.labels.clone(),
        ));
        self.rebuild_context(&mut state, "autoconfigure");
        tracing::info!(
            "Auto-configured local classifier: model={:?}, labels={:?}",
            paths.model,
            paths.labels
        );
        Some(paths)
    }

    fn backend_for(&self, image: &Path, record: &TaggerConfig) -> BackendKind {
        let requested =
            routing::resolve_backend(image, record, &self.settings.routing.uploads_marker);
        routing::effective_backend(requested, record)
    }

    fn rebuild_context(&self, state: &mut EngineState, reason: &str) -> TaggerConfig {
        let record = state.store.current().clone();
        state.context = Arc::new(BackendContext::new(self.factory.as_ref(), &record));
        tracing::info!(
            "Tagger config updated ({reason}): backend={}, model={:?}, labels={:?}, overrides={}",
            record.backend,
            record.model_path,
            record.labels_path,
            record.group_overrides.len()
        );
        record
    }

    fn read_state(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn sanitize_threshold(threshold: f32) -> f32 {
    if threshold.is_nan() {
        0.0
    } else {
        threshold.clamp(0.0, 1.0)
    }
}
