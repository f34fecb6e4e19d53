//! Caption mining: free-text captions in, weighted tag candidates out.
//!
//! Pure and I/O free. Each caption is lowercased and tokenized, then scanned
//! in a fixed order:
//!
//! | Step | Source | Weight |
//! |---|---|---|
//! | actions / poses | fixed vocabulary | 4 |
//! | appearance | clothing, hair, eye patterns | 5 |
//! | setting | fixed vocabulary | 3 |
//! | color | fixed palette | 2 |
//! | fragments | text between connectives | 1 to 3 |
//! | human presence | whole caption set | 5 per caption |
//!
//! Weights become confidences via `min(0.95, weight / max * 0.7 + 0.25)`.
//! These numbers are empirically tuned and kept exactly as they are.
//!
//! The human bonus is not a single +5 for the whole set. The dominant gender
//! is decided once across all captions, then every caption that mentions a
//! person adds another 5. Two captions naming a woman give "woman" 10 from
//! this step alone, so a person seen in every caption outranks details that
//! only one caption mentions.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::types::TagResult;

use crate::tagging::filter::rank;

const ACTION_WEIGHT: u32 = 4;
const APPEARANCE_WEIGHT: u32 = 5;
const SETTING_WEIGHT: u32 = 3;
const COLOR_WEIGHT: u32 = 2;
const HUMAN_WEIGHT: u32 = 5;

#[rustfmt::skip]
const ACTIONS: &[&str] = &[
    "sitting", "standing", "lying", "leaning", "posing", "smiling", "looking",
    "holding", "wearing", "showing", "facing", "kneeling", "bending",
];

#[rustfmt::skip]
const SETTINGS: &[&str] = &[
    "background", "wall", "floor", "room", "outdoor", "indoor", "studio",
    "bedroom", "bathroom", "kitchen", "office", "beach", "forest", "park", "street",
];

#[rustfmt::skip]
const COLORS: &[&str] = &[
    "white", "black", "red", "blue", "green", "yellow",
    "pink", "purple", "grey", "gray", "brown", "orange",
];

/// Leading phrases stripped before fragment extraction, longest first.
const LEADING_FILLER: &[&[&str]] = &[
    &["a", "photo", "of"],
    &["there", "is"],
    &["there", "are"],
    &["this", "is"],
    &["image", "shows"],
    &["photo", "of"],
    &["picture", "of"],
    &["a"],
    &["an"],
    &["the"],
    &["this"],
    &["that"],
];

/// Words removed from appearance matches.
const APPEARANCE_FILLER: &[&str] = &["a", "an", "the", "in", "wearing"];

/// Words that split the remaining text into fragments.
const CONNECTIVES: &[&str] = &[
    "with", "and", "in", "on", "at", "wearing", "has", "having", "behind",
];

/// Two-word connectives.
const CONNECTIVE_PAIRS: &[[&str; 2]] = &[["next", "to"], ["front", "of"]];

/// Articles and copulas dropped from fragments.
const FRAGMENT_STOPWORDS: &[&str] = &["a", "an", "the", "is", "are", "was", "were"];

/// Size/tone adjectives that make a fragment's first two words a tag.
const LEADING_ADJECTIVES: &[&str] = &[
    "long", "short", "dark", "light", "large", "small", "big", "tiny", "bright", "pale",
];

const HUMAN_INDICATORS: &[&str] = &[
    "woman", "women", "man", "men", "person", "people", "girl", "boy", "child", "lady",
    "gentleman",
];
const FEMALE_WORDS: &[&str] = &["woman", "women", "lady", "girl"];
const MALE_WORDS: &[&str] = &["man", "men", "gentleman", "boy"];

/// Sentence punctuation that ends a fragment.
const CLAUSE_BREAKS: &[char] = &[',', '.', ';', ':', '!', '?'];

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:['\-][\p{L}\p{N}]+)*").expect("valid token pattern")
});

static APPEARANCE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b(?:wearing|in)\s+(?:a\s+)?(?:\w+\s+)?(?:dress|shirt|top|bottom|pants|jeans|skirt|jacket|coat|swimsuit|bikini|lingerie|underwear)\b",
        r"\b(?:\w+\s+)?(?:hair|eyes|skin|lips|nails)\b",
        r"\b(?:long|short|curly|straight|blonde|brunette|black|red|brown)\s+hair\b",
        r"\b(?:blue|green|brown|hazel|dark)\s+eyes\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid appearance pattern"))
    .collect()
});

/// Tag candidates with integer weights, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagAccumulator {
    entries: Vec<(String, u32)>,
    index: HashMap<String, usize>,
}

impl TagAccumulator {
    pub fn add(&mut self, tag: &str, weight: u32) {
        match self.index.get(tag) {
            Some(&i) => self.entries[i].1 += weight,
            None => {
                self.index.insert(tag.to_string(), self.entries.len());
                self.entries.push((tag.to_string(), weight));
            }
        }
    }

    pub fn weight(&self, tag: &str) -> u32 {
        self.index.get(tag).map_or(0, |&i| self.entries[i].1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(tag, w)| (tag.as_str(), *w))
    }

    fn max_weight(&self) -> u32 {
        self.entries.iter().map(|(_, w)| *w).max().unwrap_or(0)
    }
}

/// Mine captions into ranked tags.
pub fn mine_captions(captions: &[String], top_k: usize, threshold: f32) -> Vec<TagResult> {
    let weights = candidate_weights(captions, top_k);
    rank(weighted_confidences(&weights), top_k, threshold)
}

/// Accumulate candidate weights over every caption.
///
/// When nothing is found, falls back to up to `fallback_limit` words of four
/// or more letters from the first caption, each at weight 1.
pub fn candidate_weights(captions: &[String], fallback_limit: usize) -> TagAccumulator {
    let mut acc = TagAccumulator::default();
    for caption in captions {
        mine_caption(caption, &mut acc);
    }
    add_human_presence(captions, &mut acc);

    if acc.is_empty() {
        if let Some(first) = captions.first() {
            for word in fallback_words(first, fallback_limit) {
                acc.add(&word, 1);
            }
        }
    }
    acc
}

/// Convert weights to confidences, dropping malformed tags.
pub fn weighted_confidences(acc: &TagAccumulator) -> Vec<TagResult> {
    let max = acc.max_weight();
    if max == 0 {
        return vec![];
    }
    acc.iter()
        .filter(|(tag, _)| is_acceptable_tag(tag))
        .map(|(tag, weight)| {
            let confidence = (weight as f32 / max as f32 * 0.7 + 0.25).min(0.95);
            TagResult::new(tag, confidence)
        })
        .collect()
}

/// Rejects tags with more than two of either quote character or fewer than
/// three characters.
pub fn is_acceptable_tag(tag: &str) -> bool {
    tag.matches('\'').count() <= 2 && tag.matches('"').count() <= 2 && tag.chars().count() >= 3
}

struct Token<'a> {
    text: &'a str,
    start: usize,
    end: usize,
    /// Sentence punctuation sits between this token and the previous one.
    clause_start: bool,
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens: Vec<Token<'_>> = Vec::new();
    let mut prev_end = 0;
    for m in TOKEN.find_iter(text) {
        let clause_start = !tokens.is_empty() && text[prev_end..m.start()].contains(CLAUSE_BREAKS);
        tokens.push(Token {
            text: m.as_str(),
            start: m.start(),
            end: m.end(),
            clause_start,
        });
        prev_end = m.end();
    }
    tokens
}

fn mine_caption(caption: &str, acc: &mut TagAccumulator) {
    let text = caption.trim().to_lowercase();
    let tokens = tokenize(&text);
    let mut consumed = vec![false; tokens.len()];

    add_vocabulary_hits(&tokens, ACTIONS, ACTION_WEIGHT, &mut consumed, acc);

    for pattern in APPEARANCE.iter() {
        for m in pattern.find_iter(&text) {
            let phrase = m
                .as_str()
                .split_whitespace()
                .filter(|w| !APPEARANCE_FILLER.contains(w))
                .collect::<Vec<_>>()
                .join(" ");
            if phrase.chars().count() >= 4 {
                acc.add(&phrase, APPEARANCE_WEIGHT);
            }
            for (i, token) in tokens.iter().enumerate() {
                if token.start >= m.start() && token.end <= m.end() {
                    consumed[i] = true;
                }
            }
        }
    }

    add_vocabulary_hits(&tokens, SETTINGS, SETTING_WEIGHT, &mut consumed, acc);
    add_vocabulary_hits(&tokens, COLORS, COLOR_WEIGHT, &mut consumed, acc);

    let skip = leading_filler_len(&tokens);
    add_fragments(&tokens[skip..], &consumed[skip..], acc);
}

/// Each vocabulary word present in the caption adds `weight` once.
fn add_vocabulary_hits(
    tokens: &[Token<'_>],
    vocabulary: &[&str],
    weight: u32,
    consumed: &mut [bool],
    acc: &mut TagAccumulator,
) {
    let mut seen = HashSet::new();
    for (i, token) in tokens.iter().enumerate() {
        if vocabulary.contains(&token.text) {
            consumed[i] = true;
            if seen.insert(token.text) {
                acc.add(token.text, weight);
            }
        }
    }
}

/// Number of leading tokens that are filler phrases.
fn leading_filler_len(tokens: &[Token<'_>]) -> usize {
    let mut skip = 0;
    'strip: loop {
        for phrase in LEADING_FILLER {
            let end = skip + phrase.len();
            if end <= tokens.len()
                && tokens[skip..end]
                    .iter()
                    .zip(phrase.iter())
                    .all(|(t, p)| t.text == *p)
            {
                skip = end;
                continue 'strip;
            }
        }
        return skip;
    }
}

fn add_fragments(tokens: &[Token<'_>], consumed: &[bool], acc: &mut TagAccumulator) {
    let mut fragment: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if token.clause_start {
            flush_fragment(&mut fragment, acc);
        }

        let pair = CONNECTIVE_PAIRS.iter().any(|[a, b]| {
            token.text == *a && tokens.get(i + 1).is_some_and(|next| next.text == *b)
        });
        if pair {
            flush_fragment(&mut fragment, acc);
            i += 2;
            continue;
        }

        if consumed[i] || CONNECTIVES.contains(&token.text) {
            flush_fragment(&mut fragment, acc);
        } else {
            fragment.push(token.text);
        }
        i += 1;
    }
    flush_fragment(&mut fragment, acc);
}

fn flush_fragment(fragment: &mut Vec<&str>, acc: &mut TagAccumulator) {
    let words: Vec<&str> = fragment
        .drain(..)
        .filter(|w| !FRAGMENT_STOPWORDS.contains(w))
        .collect();

    match words.len() {
        0 => {}
        1 => {
            if words[0].chars().count() >= 4 {
                acc.add(words[0], 2);
            }
        }
        2 => {
            let phrase = words.join(" ");
            if acc.weight(&phrase) < 5 {
                acc.add(&phrase, 3);
            }
        }
        n => {
            let tail = words[n - 2..].join(" ");
            if tail.chars().count() >= 6 {
                acc.add(&tail, 1);
            }
            let head = words[..2].join(" ");
            if head.chars().count() >= 6 && LEADING_ADJECTIVES.contains(&words[0]) {
                acc.add(&head, 2);
            }
        }
    }
}

/// Adds weight to "woman" or "man" for every caption mentioning a person,
/// depending on which gender the caption set mentions more. Ties add nothing.
fn add_human_presence(captions: &[String], acc: &mut TagAccumulator) {
    let lowered: Vec<String> = captions.iter().map(|c| c.to_lowercase()).collect();
    let words = |text: &str| -> Vec<String> {
        TOKEN
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    };

    let all_words: Vec<String> = lowered.iter().flat_map(|c| words(c)).collect();
    let count = |vocab: &[&str]| all_words.iter().filter(|w| vocab.contains(&w.as_str())).count();
    let dominant = match count(FEMALE_WORDS).cmp(&count(MALE_WORDS)) {
        std::cmp::Ordering::Greater => "woman",
        std::cmp::Ordering::Less => "man",
        std::cmp::Ordering::Equal => return,
    };

    for caption in &lowered {
        if words(caption)
            .iter()
            .any(|w| HUMAN_INDICATORS.contains(&w.as_str()))
        {
            acc.add(dominant, HUMAN_WEIGHT);
        }
    }
}

/// Words of four or more characters from `caption`, in order.
pub fn fallback_words(caption: &str, limit: usize) -> Vec<String> {
    caption
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| w.chars().count() >= 4)
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captions(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn confidence(weight: u32, max: u32) -> f32 {
        (weight as f32 / max as f32 * 0.7 + 0.25).min(0.95)
    }

    #[test]
    fn test_studio_portrait_weights() {
        let set = captions(&["a woman sitting on a white background", "woman smiling in studio"]);
        let acc = candidate_weights(&set, 10);

        assert_eq!(acc.weight("sitting"), 4);
        assert_eq!(acc.weight("smiling"), 4);
        assert_eq!(acc.weight("background"), 3);
        assert_eq!(acc.weight("studio"), 3);
        assert_eq!(acc.weight("white"), 2);
        assert!(acc.weight("woman") >= 10);
        assert_eq!(acc.len(), 6);

        let results = mine_captions(&set, 10, 0.0);
        assert_eq!(results[0].tag, "woman");
        assert!((results[0].confidence - 0.95).abs() < 1e-6);
        let max = acc.weight("woman");
        let sitting = results.iter().find(|r| r.tag == "sitting").unwrap();
        assert!((sitting.confidence - confidence(4, max)).abs() < 1e-6);
        let white = results.iter().find(|r| r.tag == "white").unwrap();
        assert!((white.confidence - confidence(2, max)).abs() < 1e-6);
    }

    #[test]
    fn test_ties_keep_discovery_order() {
        let set = captions(&["a woman sitting on a white background", "woman smiling in studio"]);
        let tags: Vec<String> = mine_captions(&set, 10, 0.0)
            .into_iter()
            .map(|r| r.tag)
            .collect();
        assert_eq!(
            tags,
            vec!["woman", "sitting", "smiling", "background", "studio", "white"]
        );
    }

    #[test]
    fn test_top_k_and_threshold() {
        let set = captions(&["a woman sitting on a white background", "woman smiling in studio"]);
        let top = mine_captions(&set, 2, 0.0);
        assert_eq!(top.len(), 2);

        let strict = mine_captions(&set, 10, 0.42);
        let tags: Vec<_> = strict.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["woman", "sitting", "smiling"]);
    }

    #[test]
    fn test_appearance_phrases() {
        let set = captions(&["a woman with long hair wearing a red dress"]);
        let acc = candidate_weights(&set, 10);
        assert_eq!(acc.weight("red dress"), 5);
        // Matched by both the generic and the hair-specific pattern.
        assert_eq!(acc.weight("long hair"), 10);
        assert_eq!(acc.weight("wearing"), 4);
        assert_eq!(acc.weight("red"), 2);
        assert_eq!(acc.weight("woman"), 2 + 5);
    }

    #[test]
    fn test_vocabulary_counts_once_per_caption() {
        let set = captions(&["a white cat on a white sofa"]);
        let acc = candidate_weights(&set, 10);
        assert_eq!(acc.weight("white"), 2);
    }

    #[test]
    fn test_whole_words_only() {
        // "parking" must not count as "park", nor "showings" as "showing".
        let set = captions(&["parking lot showings"]);
        let acc = candidate_weights(&set, 10);
        assert_eq!(acc.weight("park"), 0);
        assert_eq!(acc.weight("showing"), 0);
    }

    #[test]
    fn test_leading_filler_is_stripped() {
        let set = captions(&["this is a photo of a golden retriever"]);
        let acc = candidate_weights(&set, 10);
        assert_eq!(acc.weight("golden retriever"), 3);
        assert_eq!(acc.weight("photo"), 0);
    }

    #[test]
    fn test_long_fragment_tail_and_adjective_head() {
        let set = captions(&["small wooden fishing boat"]);
        let acc = candidate_weights(&set, 10);
        assert_eq!(acc.weight("fishing boat"), 1);
        assert_eq!(acc.weight("small wooden"), 2);
    }

    #[test]
    fn test_connective_pairs_split_fragments() {
        let set = captions(&["old lamp next to wooden chair"]);
        let acc = candidate_weights(&set, 10);
        assert_eq!(acc.weight("old lamp"), 3);
        assert_eq!(acc.weight("wooden chair"), 3);
    }

    #[test]
    fn test_punctuation_splits_fragments() {
        let set = captions(&["mountains, lake"]);
        let acc = candidate_weights(&set, 10);
        assert_eq!(acc.weight("mountains"), 2);
        assert_eq!(acc.weight("lake"), 2);
        assert_eq!(acc.weight("mountains lake"), 0);
    }

    #[test]
    fn test_two_word_fragment_does_not_override_strong_weight() {
        let mut acc = TagAccumulator::default();
        acc.add("long hair", 5);
        let mut fragment = vec!["long", "hair"];
        flush_fragment(&mut fragment, &mut acc);
        assert_eq!(acc.weight("long hair"), 5);
    }

    #[test]
    fn test_male_dominant_caption_set() {
        let set = captions(&["a man riding a bike", "a boy and a man"]);
        let acc = candidate_weights(&set, 10);
        assert_eq!(acc.weight("man"), 10);
        assert_eq!(acc.weight("woman"), 0);
    }

    #[test]
    fn test_human_bonus_counts_each_caption_mentioning_a_person() {
        // No caption says "woman", so its whole weight is the bonus.
        let one = captions(&["the lady"]);
        let three = captions(&["the lady", "a girl", "a lady"]);
        let mixed = captions(&["the lady", "an empty street"]);
        assert_eq!(candidate_weights(&one, 10).weight("woman"), 5);
        assert_eq!(candidate_weights(&three, 10).weight("woman"), 15);
        assert_eq!(candidate_weights(&mixed, 10).weight("woman"), 5);
    }

    #[test]
    fn test_ambiguous_gender_adds_neither() {
        let set = captions(&["a man and a woman"]);
        let acc = candidate_weights(&set, 10);
        assert_eq!(acc.weight("woman"), 2);
        assert_eq!(acc.weight("man"), 0);
    }

    #[test]
    fn test_human_words_are_whole_tokens() {
        // "manhole" and "womanly" are not people.
        let set = captions(&["manhole cover", "womanly figure"]);
        let acc = candidate_weights(&set, 10);
        assert_eq!(acc.weight("woman"), 0);
        assert_eq!(acc.weight("man"), 0);
    }

    #[test]
    fn test_fallback_words() {
        assert_eq!(
            fallback_words("A Sunny morning, at sea", 2),
            vec!["sunny", "morning"]
        );
    }

    #[test]
    fn test_fallback_when_nothing_is_mined() {
        // Every fragment is too short to score; "with" is a connective.
        let set = captions(&["it is a go to, with"]);
        let acc = candidate_weights(&set, 5);
        assert_eq!(acc.iter().collect::<Vec<_>>(), vec![("with", 1)]);
    }

    #[test]
    fn test_tag_acceptance() {
        assert!(is_acceptable_tag("long hair"));
        assert!(!is_acceptable_tag("ox"));
        assert!(!is_acceptable_tag("rock'n'roll's"));
        assert!(is_acceptable_tag("rock'n'roll"));
    }

    #[test]
    fn test_empty_input() {
        assert!(mine_captions(&[], 10, 0.0).is_empty());
    }
}
