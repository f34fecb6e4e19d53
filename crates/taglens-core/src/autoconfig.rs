//! Local classifier autodetection.
//!
//! Looks in a directory for a classifier model and its label file, preferring
//! well-known file names and falling back to the first file with a matching
//! extension (in name order).

use std::path::{Path, PathBuf};

use crate::config::{LocalModelPaths, TaggerConfig};
use crate::types::BackendKind;

const MODEL_NAMES: &[&str] = &["model.onnx", "wd14_tagger.onnx", "wd14.onnx"];
const MODEL_EXTENSIONS: &[&str] = &["onnx"];

const LABEL_NAMES: &[&str] = &[
    "selected_tags.csv",
    "tags.csv",
    "labels.csv",
    "taglist.txt",
    "class_list.txt",
];
const LABEL_EXTENSIONS: &[&str] = &["csv", "txt"];

/// Find a model/label pair in `dir`. Both must be present.
pub fn detect_local_model(dir: &Path) -> Option<LocalModelPaths> {
    if !dir.is_dir() {
        return None;
    }
    let files = list_files(dir);
    let model = pick(dir, &files, MODEL_NAMES, MODEL_EXTENSIONS)?;
    let labels = pick(dir, &files, LABEL_NAMES, LABEL_EXTENSIONS)?;
    Some(LocalModelPaths { model, labels })
}

/// Whether autodetection may change `record`.
///
/// A caption-heuristic selection is never overridden, and a record whose
/// local paths already resolve is left alone.
pub fn should_autoconfigure(record: &TaggerConfig) -> bool {
    matches!(
        record.backend,
        BackendKind::ZeroShot | BackendKind::LocalClassifier
    ) && record.local_model_paths().is_none()
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Cannot scan {:?} for a local model: {e}", dir);
            return Vec::new();
        }
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}

fn pick(dir: &Path, files: &[PathBuf], names: &[&str], extensions: &[&str]) -> Option<PathBuf> {
    names
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
        .or_else(|| {
            files
                .iter()
                .find(|path| has_extension(path, extensions))
                .cloned()
        })
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn test_preferred_names_win() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a_other.onnx");
        let model = touch(dir.path(), "wd14.onnx");
        touch(dir.path(), "a_notes.txt");
        let labels = touch(dir.path(), "selected_tags.csv");

        let found = detect_local_model(dir.path()).unwrap();
        assert_eq!(found.model, model);
        assert_eq!(found.labels, labels);
    }

    #[test]
    fn test_falls_back_to_first_matching_extension() {
        let dir = tempfile::tempdir().unwrap();
        let model = touch(dir.path(), "b_tagger.ONNX");
        touch(dir.path(), "c_tagger.onnx");
        let labels = touch(dir.path(), "a_vocab.txt");
        touch(dir.path(), "readme.md");

        let found = detect_local_model(dir.path()).unwrap();
        assert_eq!(found.model, model);
        assert_eq!(found.labels, labels);
    }

    #[test]
    fn test_requires_both_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "model.onnx");
        assert!(detect_local_model(dir.path()).is_none());
        assert!(detect_local_model(&dir.path().join("missing")).is_none());
    }

    #[test]
    fn test_caption_selection_is_never_overridden() {
        let record = TaggerConfig {
            backend: BackendKind::CaptionHeuristic,
            ..TaggerConfig::default()
        };
        assert!(!should_autoconfigure(&record));
        assert!(should_autoconfigure(&TaggerConfig::default()));
    }

    #[test]
    fn test_valid_local_record_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let record = TaggerConfig {
            backend: BackendKind::LocalClassifier,
            model_path: Some(touch(dir.path(), "model.onnx")),
            labels_path: Some(touch(dir.path(), "tags.csv")),
            ..TaggerConfig::default()
        };
        assert!(!should_autoconfigure(&record));
    }
}
