//! The persisted tagger record and its store.
//!
//! The record is a flat TOML document with exactly four keys:
//!
//! ```toml
//! backend = "local_classifier"
//! model_path = "/models/wd14/model.onnx"
//! labels_path = "/models/wd14/selected_tags.csv"
//!
//! [group_overrides]
//! real = "caption_heuristic"
//! ```
//!
//! Loading tolerates a missing or corrupt file by keeping defaults. A single
//! unusable value (an unknown backend name, a path that isn't a string) falls
//! back to its default on its own, and a bad override entry is skipped, so the
//! rest of the record survives. Persistence failures are logged and swallowed:
//! the in-memory record stays authoritative for the process.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::BackendKind;

/// Runtime backend selection, persisted across restarts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggerConfig {
    /// Globally selected backend
    #[serde(deserialize_with = "lenient_backend")]
    pub backend: BackendKind,

    /// Local classifier ONNX model
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_path")]
    pub model_path: Option<PathBuf>,

    /// Label file aligned with the local classifier's outputs
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_path")]
    pub labels_path: Option<PathBuf>,

    /// Per-group backend overrides, keyed by group name
    #[serde(deserialize_with = "lenient_overrides")]
    pub group_overrides: BTreeMap<String, BackendKind>,
}

impl TaggerConfig {
    /// Local model paths, if both are configured and exist on disk.
    pub fn local_model_paths(&self) -> Option<LocalModelPaths> {
        let paths = LocalModelPaths {
            model: self.model_path.clone()?,
            labels: self.labels_path.clone()?,
        };
        paths.exists().then_some(paths)
    }

    /// Override for a group name, matched case-insensitively (full Unicode
    /// lowercasing, same as the group extracted from a path).
    pub fn override_for(&self, group: &str) -> Option<BackendKind> {
        if group.is_empty() {
            return None;
        }
        let group = group.to_lowercase();
        self.group_overrides
            .iter()
            .find(|(name, _)| name.to_lowercase() == group)
            .map(|(_, kind)| *kind)
    }

    fn apply(&mut self, patch: ConfigPatch) {
        if let Some(backend) = patch.backend {
            self.backend = backend;
        }
        if let Some(model_path) = patch.model_path {
            self.model_path = model_path;
        }
        if let Some(labels_path) = patch.labels_path {
            self.labels_path = labels_path;
        }
        if let Some(overrides) = patch.group_overrides {
            self.group_overrides = overrides;
        }
    }
}

fn parse_backend(value: &toml::Value) -> Option<BackendKind> {
    value.as_str().and_then(|name| name.parse().ok())
}

fn lenient_backend<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BackendKind, D::Error> {
    let value = toml::Value::deserialize(deserializer)?;
    Ok(parse_backend(&value).unwrap_or_else(|| {
        tracing::warn!("Unknown backend {value} in tagger config; using {}", BackendKind::default());
        BackendKind::default()
    }))
}

fn lenient_path<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<PathBuf>, D::Error> {
    let value = toml::Value::deserialize(deserializer)?;
    match value.as_str() {
        Some(path) => Ok(Some(PathBuf::from(path))),
        None => {
            tracing::warn!("Ignoring non-string path {value} in tagger config");
            Ok(None)
        }
    }
}

fn lenient_overrides<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, BackendKind>, D::Error> {
    let value = toml::Value::deserialize(deserializer)?;
    let Some(table) = value.as_table() else {
        tracing::warn!("Ignoring group_overrides: expected a table, got {value}");
        return Ok(BTreeMap::new());
    };
    let overrides = table
        .iter()
        .filter_map(|(group, backend)| match parse_backend(backend) {
            Some(kind) => Some((group.clone(), kind)),
            None => {
                tracing::warn!("Skipping override {group:?}: unknown backend {backend}");
                None
            }
        })
        .collect();
    Ok(overrides)
}

/// The model/label pair a local classifier is built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalModelPaths {
    pub model: PathBuf,
    pub labels: PathBuf,
}

impl LocalModelPaths {
    /// Whether both files currently exist.
    pub fn exists(&self) -> bool {
        self.model.is_file() && self.labels.is_file()
    }
}

/// A partial update to [`TaggerConfig`]. Unset fields are left untouched.
///
/// Path fields are doubly optional so a patch can clear a path
/// (`Some(None)`) as well as set it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigPatch {
    pub backend: Option<BackendKind>,
    pub model_path: Option<Option<PathBuf>>,
    pub labels_path: Option<Option<PathBuf>>,
    pub group_overrides: Option<BTreeMap<String, BackendKind>>,
}

impl ConfigPatch {
    /// A patch that only selects the global backend.
    pub fn backend(kind: BackendKind) -> Self {
        Self {
            backend: Some(kind),
            ..Self::default()
        }
    }

    /// A patch selecting the local classifier with the given files.
    pub fn local_classifier(model: impl Into<PathBuf>, labels: impl Into<PathBuf>) -> Self {
        Self {
            backend: Some(BackendKind::LocalClassifier),
            model_path: Some(Some(model.into())),
            labels_path: Some(Some(labels.into())),
            group_overrides: None,
        }
    }

    pub fn with_model_path(mut self, path: Option<PathBuf>) -> Self {
        self.model_path = Some(path);
        self
    }

    pub fn with_labels_path(mut self, path: Option<PathBuf>) -> Self {
        self.labels_path = Some(path);
        self
    }

    pub fn with_group_overrides(mut self, overrides: BTreeMap<String, BackendKind>) -> Self {
        self.group_overrides = Some(overrides);
        self
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Holds the current [`TaggerConfig`] and mirrors it to disk.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    current: TaggerConfig,
}

impl ConfigStore {
    /// Open the store at `path`, loading any persisted record over the defaults.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = Self::read_record(&path);
        Self {
            path: Some(path),
            current,
        }
    }

    /// A store that never touches disk.
    pub fn in_memory(initial: TaggerConfig) -> Self {
        Self {
            path: None,
            current: initial,
        }
    }

    /// The current record.
    pub fn current(&self) -> &TaggerConfig {
        &self.current
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Merge a patch into the record and persist the full result.
    pub fn configure(&mut self, patch: ConfigPatch) -> &TaggerConfig {
        self.current.apply(patch);
        self.persist();
        &self.current
    }

    /// Re-read the persisted record over the defaults.
    pub fn reload(&mut self) -> &TaggerConfig {
        if let Some(path) = &self.path {
            self.current = Self::read_record(path);
        }
        &self.current
    }

    /// Restore defaults and persist them.
    pub fn reset(&mut self) -> &TaggerConfig {
        self.current = TaggerConfig::default();
        self.persist();
        &self.current
    }

    fn read_record(path: &Path) -> TaggerConfig {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return TaggerConfig::default();
            }
            Err(e) => {
                tracing::warn!("Cannot read tagger config {:?}: {e}; using defaults", path);
                return TaggerConfig::default();
            }
        };
        match toml::from_str::<TaggerConfig>(&content) {
            Ok(record) => {
                tracing::debug!("Loaded tagger config from {:?}: {:?}", path, record);
                record
            }
            Err(e) => {
                tracing::warn!("Ignoring corrupt tagger config {:?}: {e}", path);
                TaggerConfig::default()
            }
        }
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = Self::write_record(path, &self.current) {
            tracing::warn!("Failed to persist tagger config to {:?}: {e}", path);
        }
    }

    fn write_record(path: &Path, record: &TaggerConfig) -> std::io::Result<()> {
        let content = toml::to_string_pretty(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path().join("tagger.toml"));
        assert_eq!(store.current(), &TaggerConfig::default());
        assert_eq!(store.current().backend, BackendKind::ZeroShot);
    }

    #[test]
    fn test_open_corrupt_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tagger.toml");
        std::fs::write(&path, "backend = [[[not toml").unwrap();
        let store = ConfigStore::open(&path);
        assert_eq!(store.current(), &TaggerConfig::default());
    }

    #[test]
    fn test_configure_persists_full_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tagger.toml");
        let mut store = ConfigStore::open(&path);

        let mut overrides = BTreeMap::new();
        overrides.insert("AI".to_string(), BackendKind::LocalClassifier);
        store.configure(
            ConfigPatch::local_classifier("/models/model.onnx", "/models/tags.csv")
                .with_group_overrides(overrides),
        );

        let reopened = ConfigStore::open(&path);
        assert_eq!(reopened.current(), store.current());
        assert_eq!(reopened.current().backend, BackendKind::LocalClassifier);
        assert_eq!(
            reopened.current().model_path.as_deref(),
            Some(Path::new("/models/model.onnx"))
        );
    }

    #[test]
    fn test_configure_merges_partial_patch() {
        let mut store = ConfigStore::in_memory(TaggerConfig {
            model_path: Some(PathBuf::from("/m.onnx")),
            ..TaggerConfig::default()
        });
        store.configure(ConfigPatch::backend(BackendKind::CaptionHeuristic));
        assert_eq!(store.current().backend, BackendKind::CaptionHeuristic);
        assert_eq!(store.current().model_path, Some(PathBuf::from("/m.onnx")));

        store.configure(ConfigPatch::default().with_model_path(None));
        assert!(store.current().model_path.is_none());
    }

    #[test]
    fn test_load_ignores_unknown_keys_and_accepts_legacy_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tagger.toml");
        std::fs::write(
            &path,
            "backend = \"wd14\"\ntheme = \"dark\"\n\n[group_overrides]\nReal = \"blip\"\n",
        )
        .unwrap();

        let store = ConfigStore::open(&path);
        assert_eq!(store.current().backend, BackendKind::LocalClassifier);
        assert_eq!(
            store.current().override_for("real"),
            Some(BackendKind::CaptionHeuristic)
        );
    }

    #[test]
    fn test_one_bad_value_keeps_the_rest_of_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tagger.toml");
        std::fs::write(
            &path,
            "backend = \"WD14\"\n\
             model_path = \"/models/model.onnx\"\n\
             labels_path = 7\n\n\
             [group_overrides]\n\
             ai = \"Local\"\n\
             real = \"dall-e\"\n",
        )
        .unwrap();

        let record = ConfigStore::open(&path).current().clone();
        assert_eq!(record.backend, BackendKind::LocalClassifier);
        assert_eq!(record.model_path, Some(PathBuf::from("/models/model.onnx")));
        assert_eq!(record.labels_path, None);
        assert_eq!(record.group_overrides.len(), 1);
        assert_eq!(record.override_for("ai"), Some(BackendKind::LocalClassifier));
        assert_eq!(record.override_for("real"), None);
    }

    #[test]
    fn test_unknown_global_backend_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tagger.toml");
        std::fs::write(&path, "backend = \"dall-e\"\nmodel_path = \"/m.onnx\"\n").unwrap();

        let record = ConfigStore::open(&path).current().clone();
        assert_eq!(record.backend, BackendKind::ZeroShot);
        assert_eq!(record.model_path, Some(PathBuf::from("/m.onnx")));
    }

    #[test]
    fn test_override_matching_lowercases_unicode() {
        let mut overrides = BTreeMap::new();
        overrides.insert("ÄRZTE".to_string(), BackendKind::CaptionHeuristic);
        overrides.insert(String::new(), BackendKind::LocalClassifier);
        let record = TaggerConfig {
            group_overrides: overrides,
            ..TaggerConfig::default()
        };
        assert_eq!(record.override_for("ärzte"), Some(BackendKind::CaptionHeuristic));
        assert_eq!(record.override_for("Ärzte"), Some(BackendKind::CaptionHeuristic));
        assert_eq!(record.override_for(""), None);
    }

    #[test]
    fn test_persist_failure_keeps_in_memory_record() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the write fail.
        let path = dir.path().join("tagger.toml");
        std::fs::create_dir(&path).unwrap();

        let mut store = ConfigStore::open(&path);
        store.configure(ConfigPatch::backend(BackendKind::CaptionHeuristic));
        assert_eq!(store.current().backend, BackendKind::CaptionHeuristic);
    }

    #[test]
    fn test_reset_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tagger.toml");
        let mut store = ConfigStore::open(&path);
        store.configure(ConfigPatch::backend(BackendKind::CaptionHeuristic));

        std::fs::write(&path, "backend = \"zero_shot\"\n").unwrap();
        assert_eq!(store.reload().backend, BackendKind::ZeroShot);

        store.configure(ConfigPatch::backend(BackendKind::CaptionHeuristic));
        assert_eq!(store.reset(), &TaggerConfig::default());
        assert_eq!(ConfigStore::open(&path).current(), &TaggerConfig::default());
    }

    #[test]
    fn test_local_model_paths_require_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.onnx");
        let labels = dir.path().join("tags.csv");
        std::fs::write(&model, b"onnx").unwrap();

        let config = TaggerConfig {
            backend: BackendKind::LocalClassifier,
            model_path: Some(model.clone()),
            labels_path: Some(labels.clone()),
            ..TaggerConfig::default()
        };
        assert!(config.local_model_paths().is_none());

        std::fs::write(&labels, b"name\ncat\n").unwrap();
        let paths = config.local_model_paths().unwrap();
        assert_eq!(paths.model, model);
        assert_eq!(paths.labels, labels);
    }
}
