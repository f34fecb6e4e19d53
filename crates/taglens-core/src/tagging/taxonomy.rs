//! The fixed zero-shot taxonomy.
//!
//! A flat, ordered list of candidate tags drawn from four categories. Order
//! is significant: it fixes the row order of the prompt bank and breaks ties
//! between equally scored tags.

/// Category a taxonomy term belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermCategory {
    Subject,
    Style,
    Mood,
    Provenance,
}

#[rustfmt::skip]
const SUBJECTS: &[&str] = &[
    "person", "people", "group", "portrait", "selfie",
    "animal", "pet", "dog", "cat", "bird", "wildlife",
    "nature", "landscape", "mountain", "ocean", "forest", "sky", "sunset", "sunrise",
    "building", "architecture", "city", "urban", "street",
    "food", "meal", "dessert", "drink",
    "vehicle", "car", "motorcycle", "bicycle", "airplane",
    "indoor", "outdoor", "room", "office", "home",
    "technology", "computer", "phone", "device",
    "art", "painting", "drawing", "sculpture",
    "sport", "game", "activity",
    "flower", "plant", "garden",
    "water", "beach", "lake", "river",
];

#[rustfmt::skip]
const STYLES: &[&str] = &[
    "photo", "realistic", "illustration", "cartoon", "anime",
    "abstract", "minimalist", "vintage", "modern",
    "black and white", "colorful", "vibrant", "muted",
    "close-up", "wide angle", "aerial view", "macro",
];

#[rustfmt::skip]
const MOODS: &[&str] = &[
    "happy", "peaceful", "dramatic", "romantic", "mysterious",
    "energetic", "calm", "dark", "bright", "warm", "cool",
];

#[rustfmt::skip]
const PROVENANCE: &[&str] = &[
    "AI generated", "digital art", "computer graphics",
    "real photo", "authentic photograph",
];

/// One candidate tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyTerm {
    pub name: &'static str,
    pub category: TermCategory,
}

/// The ordered candidate tag list.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    terms: Vec<TaxonomyTerm>,
}

impl Taxonomy {
    /// The built-in taxonomy.
    pub fn builtin() -> Self {
        let groups = [
            (SUBJECTS, TermCategory::Subject),
            (STYLES, TermCategory::Style),
            (MOODS, TermCategory::Mood),
            (PROVENANCE, TermCategory::Provenance),
        ];
        let terms = groups
            .iter()
            .flat_map(|(names, category)| {
                names.iter().map(|&name| TaxonomyTerm {
                    name,
                    category: *category,
                })
            })
            .collect();
        Self { terms }
    }

    pub fn terms(&self) -> &[TaxonomyTerm] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Text prompts for every term, in taxonomy order.
    pub fn prompts(&self, template: &str) -> Vec<String> {
        self.terms
            .iter()
            .map(|t| template.replace("{}", t.name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_taxonomy_is_flat_and_ordered() {
        let taxonomy = Taxonomy::builtin();
        assert_eq!(
            taxonomy.len(),
            SUBJECTS.len() + STYLES.len() + MOODS.len() + PROVENANCE.len()
        );
        assert_eq!(taxonomy.terms()[0].name, "person");
        assert_eq!(taxonomy.terms()[0].category, TermCategory::Subject);
        let last = taxonomy.terms().last().unwrap();
        assert_eq!(last.name, "authentic photograph");
        assert_eq!(last.category, TermCategory::Provenance);
    }

    #[test]
    fn test_builtin_terms_are_unique() {
        let taxonomy = Taxonomy::builtin();
        let unique: HashSet<_> = taxonomy.terms().iter().map(|t| t.name).collect();
        assert_eq!(unique.len(), taxonomy.len());
    }

    #[test]
    fn test_prompts_follow_template() {
        let prompts = Taxonomy::builtin().prompts("a photo of {}");
        assert_eq!(prompts[0], "a photo of person");
        assert!(prompts.contains(&"a photo of black and white".to_string()));
    }
}
