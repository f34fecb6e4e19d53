//! Core data types shared by every annotation backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A descriptive tag with a confidence score.
///
/// Produced fresh per call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagResult {
    /// The tag label (e.g., "woman", "white background", "sunset")
    pub tag: String,

    /// Confidence score from 0.0 to 1.0
    pub confidence: f32,
}

impl TagResult {
    /// Create a new tag result.
    pub fn new(tag: impl Into<String>, confidence: f32) -> Self {
        Self {
            tag: tag.into(),
            confidence,
        }
    }
}

/// The inference strategy used to annotate an image.
///
/// Serialized in snake_case; the legacy names `clip`, `wd14` and `blip` are
/// accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Zero-shot similarity against a fixed taxonomy
    #[default]
    #[serde(alias = "clip", alias = "zeroshot")]
    ZeroShot,

    /// Local multi-label classifier with an external model and label file
    #[serde(alias = "wd14", alias = "local")]
    LocalClassifier,

    /// Tags mined from generated captions
    #[serde(alias = "blip", alias = "caption")]
    CaptionHeuristic,
}

impl BackendKind {
    /// All backend variants, in declaration order.
    pub const ALL: [BackendKind; 3] = [
        BackendKind::ZeroShot,
        BackendKind::LocalClassifier,
        BackendKind::CaptionHeuristic,
    ];

    /// Canonical snake_case name, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::ZeroShot => "zero_shot",
            BackendKind::LocalClassifier => "local_classifier",
            BackendKind::CaptionHeuristic => "caption_heuristic",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "zero_shot" | "zeroshot" | "clip" => Ok(BackendKind::ZeroShot),
            "local_classifier" | "local" | "wd14" => Ok(BackendKind::LocalClassifier),
            "caption_heuristic" | "caption" | "blip" => Ok(BackendKind::CaptionHeuristic),
            other => Err(format!(
                "unknown backend '{other}' (expected zero_shot, local_classifier or caption_heuristic)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_result_serialization() {
        let tag = TagResult::new("sunset", 0.8);
        let json = serde_json::to_string(&tag).unwrap();
        assert!(json.contains("\"tag\":\"sunset\""));
        assert!(json.contains("\"confidence\":0.8"));
    }

    #[test]
    fn test_backend_kind_from_str_accepts_legacy_names() {
        assert_eq!("clip".parse::<BackendKind>().unwrap(), BackendKind::ZeroShot);
        assert_eq!("WD14".parse::<BackendKind>().unwrap(), BackendKind::LocalClassifier);
        assert_eq!("blip".parse::<BackendKind>().unwrap(), BackendKind::CaptionHeuristic);
        assert_eq!(
            "local-classifier".parse::<BackendKind>().unwrap(),
            BackendKind::LocalClassifier
        );
        assert!("yolo".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_backend_kind_display_round_trips() {
        for kind in BackendKind::ALL {
            assert_eq!(kind.to_string().parse::<BackendKind>().unwrap(), kind);
        }
    }
}
