//! Backend resolution: global selection, per-group overrides, local fallback.
//!
//! Images uploaded under `.../<marker>/<group>/<file>` belong to `<group>`.
//! A group listed in `group_overrides` (case-insensitive) uses its own
//! backend; everything else uses the global one. Resolution never fails:
//! anything unparseable falls back to the global backend.

use std::path::Path;

use crate::config::TaggerConfig;
use crate::types::BackendKind;

/// Extract the group segment following `marker` in `path`.
///
/// Both `/` and `\` separators are accepted and matching is
/// case-insensitive. The group is returned lowercased.
pub fn group_from_path(path: &Path, marker: &str) -> Option<String> {
    let marker = marker.trim_matches(['/', '\\']).to_lowercase();
    if marker.is_empty() {
        return None;
    }
    let normalized = path.to_string_lossy().replace('\\', "/").to_lowercase();
    let mut segments = normalized.split('/').filter(|s| !s.is_empty());
    segments.find(|segment| *segment == marker)?;
    segments.next().map(str::to_string)
}

/// The backend requested for `path`, honoring group overrides.
pub fn resolve_backend(path: &Path, config: &TaggerConfig, marker: &str) -> BackendKind {
    let Some(group) = group_from_path(path, marker) else {
        return config.backend;
    };
    match config.override_for(&group) {
        Some(kind) => {
            tracing::debug!("Group {:?} overrides backend to {}", group, kind);
            kind
        }
        None => config.backend,
    }
}

/// The backend that will actually run.
///
/// A local classifier whose model or label file is missing defers to the
/// zero-shot backend.
pub fn effective_backend(requested: BackendKind, config: &TaggerConfig) -> BackendKind {
    if requested == BackendKind::LocalClassifier && config.local_model_paths().is_none() {
        tracing::info!(
            "Local classifier model/labels not configured or missing; falling back to {}",
            BackendKind::ZeroShot
        );
        return BackendKind::ZeroShot;
    }
    requested
}
