//! Result filtering and assembly.
//!
//! Every backend's raw candidates pass through [`assemble`] before reaching
//! the caller. The returned list is sorted by descending confidence (stable,
//! so ties keep the backend's discovery order), holds at most `top_k` entries
//! and every entry meets `threshold`.

use std::collections::HashSet;
use std::sync::LazyLock;

use crate::types::TagResult;

/// Rating labels, generic descriptors and formatting artifacts that carry no
/// information for callers.
#[rustfmt::skip]
const JUNK_TAGS: &[&str] = &[
    "general", "sensitive", "questionable", "explicit",
    "comic", "silent_comic", "3koma", "4koma", "6koma",
    "negative_space", "spot_color", "high_contrast", "still_life",
    "no_humans", "solo",
];

static JUNK_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| JUNK_TAGS.iter().copied().collect());

/// Whether `tag` is in the junk set.
pub fn is_junk(tag: &str) -> bool {
    JUNK_SET.contains(tag)
}

/// Drop junk and invalid entries, then threshold, sort and truncate.
///
/// Confidences are clamped to [0, 1]; NaN and blank-tag entries are dropped.
pub fn assemble(candidates: Vec<TagResult>, top_k: usize, threshold: f32) -> Vec<TagResult> {
    let cleaned = candidates
        .into_iter()
        .filter(|r| !r.confidence.is_nan() && !r.tag.trim().is_empty())
        .filter(|r| !is_junk(&r.tag))
        .map(|r| TagResult {
            confidence: r.confidence.clamp(0.0, 1.0),
            ..r
        })
        .collect();
    rank(cleaned, top_k, threshold)
}

/// Keep entries at or above `threshold`, stable-sort descending, truncate.
pub(crate) fn rank(mut results: Vec<TagResult>, top_k: usize, threshold: f32) -> Vec<TagResult> {
    results.retain(|r| r.confidence >= threshold);
    results.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    results.truncate(top_k);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(items: &[(&str, f32)]) -> Vec<TagResult> {
        items.iter().map(|(t, c)| TagResult::new(*t, *c)).collect()
    }

    #[test]
    fn test_junk_tags_are_removed() {
        let raw = results(&[("general", 0.99), ("1girl", 0.9), ("solo", 0.8), ("smile", 0.7)]);
        let out = assemble(raw, 10, 0.0);
        let tags: Vec<_> = out.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["1girl", "smile"]);
    }

    #[test]
    fn test_blank_tags_are_removed() {
        let out = assemble(results(&[("", 0.9), ("  ", 0.8), ("hat", 0.5)]), 10, 0.0);
        let tags: Vec<_> = out.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["hat"]);
    }

    #[test]
    fn test_over_fetch_still_yields_top_k_after_junk_removal() {
        let raw = results(&[
            ("general", 0.99),
            ("sensitive", 0.95),
            ("cat", 0.9),
            ("tree", 0.8),
            ("sky", 0.7),
            ("grass", 0.6),
        ]);
        let out = assemble(raw, 3, 0.0);
        let tags: Vec<_> = out.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["cat", "tree", "sky"]);
    }

    #[test]
    fn test_sorted_descending_with_stable_ties() {
        let raw = results(&[("a", 0.5), ("b", 0.9), ("c", 0.5), ("d", 0.7)]);
        let out = assemble(raw, 10, 0.0);
        let tags: Vec<_> = out.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_threshold_is_reapplied() {
        let raw = results(&[("a", 0.5), ("b", 0.19), ("c", 0.2)]);
        let out = assemble(raw, 10, 0.2);
        let tags: Vec<_> = out.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["a", "c"]);
    }

    #[test]
    fn test_invalid_confidences_are_sanitized() {
        let raw = results(&[("nan", f32::NAN), ("high", 1.7), ("neg", -0.3)]);
        let out = assemble(raw, 10, 0.0);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], TagResult::new("high", 1.0));
        assert_eq!(out[1], TagResult::new("neg", 0.0));
    }

    #[test]
    fn test_zero_top_k_is_empty() {
        assert!(assemble(results(&[("a", 0.9)]), 0, 0.0).is_empty());
    }
}
