//! Similarity Scorer
//!
//! Pure name-comparison functions: normalization, Levenshtein-based
//! similarity and keyword overlap. No state beyond the configured keyword
//! dictionary.

use brewid_common::config::{ResolverConfig, Thresholds};
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize a name for comparison
///
/// Lower-cases, strips diacritics and punctuation, collapses whitespace.
/// Abbreviation marks (`.` and apostrophes) are removed so "S.r.l." becomes
/// "srl"; any other punctuation separates tokens.
///
/// ```
/// use brewid_resolver::services::similarity::normalize;
///
/// assert_eq!(normalize("Birrificio Viana S.r.l."), "birrificio viana srl");
/// assert_eq!(normalize("  Brasserie d'Achouffe "), "brasserie dachouffe");
/// assert_eq!(normalize("Bière-Blonde"), "biere blonde");
/// ```
pub fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.nfd() {
        if is_combining_mark(c) {
            continue;
        }
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !matches!(c, '.' | '\'' | '\u{2019}' | '`') {
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity of two raw names in [0, 1]
///
/// 0.0 if either side is blank, 1.0 for identical input or identical
/// normalized forms, otherwise `(longer - levenshtein) / longer` over the
/// normalized strings (lengths in chars). Symmetric and reflexive.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    if a.trim().is_empty() || b.trim().is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    normalized_similarity(&normalize(a), &normalize(b))
}

/// [`name_similarity`] for strings that are already normalized
pub fn normalized_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let longer = a.chars().count().max(b.chars().count());
    let distance = strsim::levenshtein(a, b);
    (longer - distance) as f64 / longer as f64
}

/// Keyword-overlap detector
///
/// Recovers signal that edit distance loses when a short distinctive word is
/// embedded in a longer name dominated by a legal-entity suffix.
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    /// Normalized dictionary entries (may contain spaces)
    keywords: HashSet<String>,
    token_similarity: f64,
    min_token_len: usize,
}

impl SimilarityScorer {
    pub fn new<I, S>(keywords: I, token_similarity: f64, min_token_len: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| normalize(k.as_ref()))
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            keywords,
            token_similarity,
            min_token_len,
        }
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        let Thresholds {
            token_similarity,
            min_token_len,
            ..
        } = config.thresholds;
        Self::new(&config.keywords, token_similarity, min_token_len)
    }

    pub fn name_similarity(&self, a: &str, b: &str) -> f64 {
        name_similarity(a, b)
    }

    /// True if both names contain a dictionary keyword, or if at least two
    /// sufficiently long tokens of one name each closely match a token of
    /// the other.
    pub fn has_common_keyword(&self, a: &str, b: &str) -> bool {
        let (a, b) = (normalize(a), normalize(b));
        if a.is_empty() || b.is_empty() {
            return false;
        }

        if self
            .keywords
            .iter()
            .any(|k| contains_phrase(&a, k) && contains_phrase(&b, k))
        {
            return true;
        }

        let a_tokens: Vec<&str> = a.split_whitespace().collect();
        let b_tokens: Vec<&str> = b.split_whitespace().collect();
        self.fuzzy_token_overlap(&a_tokens, &b_tokens) || self.fuzzy_token_overlap(&b_tokens, &a_tokens)
    }

    fn fuzzy_token_overlap(&self, from: &[&str], to: &[&str]) -> bool {
        let distinct: HashSet<&str> = from
            .iter()
            .copied()
            .filter(|t| t.chars().count() >= self.min_token_len)
            .collect();

        distinct
            .into_iter()
            .filter(|t| {
                to.iter()
                    .any(|o| normalized_similarity(t, o) > self.token_similarity)
            })
            .count()
            >= 2
    }
}

/// Whole-token phrase containment over normalized text
fn contains_phrase(text: &str, phrase: &str) -> bool {
    format!(" {} ", text).contains(&format!(" {} ", phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> SimilarityScorer {
        SimilarityScorer::new(["peroni", "nastro azzurro", "moretti"], 0.8, 4)
    }

    #[test]
    fn normalize_is_total() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("!!!"), "");
        assert_eq!(normalize("Ünïcödé  Brau"), "unicode brau");
        assert_eq!(normalize("BIRRA\tMORETTI\n"), "birra moretti");
    }

    #[test]
    fn similarity_reflexive_and_symmetric() {
        for name in ["Heineken", "Birrificio Viana S.r.l.", "???", "a"] {
            assert_eq!(name_similarity(name, name), 1.0, "{}", name);
        }

        let pairs = [
            ("Heineken", "Heiniken"),
            ("Birrificio Viana", "Birrificio Viana S.r.l."),
            ("Peroni", "Peroni Nastro Azzurro"),
        ];
        for (a, b) in pairs {
            assert_eq!(name_similarity(a, b), name_similarity(b, a));
        }
    }

    #[test]
    fn similarity_empty_is_zero() {
        assert_eq!(name_similarity("", "Heineken"), 0.0);
        assert_eq!(name_similarity("Heineken", ""), 0.0);
        assert_eq!(name_similarity("", ""), 0.0);
        assert_eq!(name_similarity("  ", "x"), 0.0);
    }

    #[test]
    fn similarity_ignores_case_and_punctuation() {
        assert_eq!(name_similarity("BIRRA MORETTI", "birra moretti"), 1.0);
        assert_eq!(name_similarity("Birra Moretti!", "birra-moretti"), 1.0);
    }

    #[test]
    fn similarity_values() {
        // One substitution in eight chars
        assert!((name_similarity("Heineken", "Heiniken") - 0.875).abs() < 1e-9);
        // Suffix " srl" costs four insertions over twenty chars
        assert!((name_similarity("Birrificio Viana", "Birrificio Viana S.r.l.") - 0.8).abs() < 1e-9);
    }

    #[test]
    fn similarity_decreases_as_strings_diverge() {
        let base = "punk ipa";
        let near = name_similarity(base, "punk ipz");
        let far = name_similarity(base, "punk xyz");
        assert!(near > far);
        assert!((0.0..=1.0).contains(&far));
    }

    #[test]
    fn dictionary_keyword_overlap() {
        let s = scorer();
        assert!(s.has_common_keyword("Peroni Gran Riserva", "Birra Peroni S.p.A."));
        assert!(s.has_common_keyword("Nastro Azzurro", "Peroni Nastro Azzurro"));
        assert!(!s.has_common_keyword("Nastro", "Azzurro"));
    }

    #[test]
    fn fuzzy_token_overlap_needs_two_tokens() {
        let s = scorer();
        assert!(s.has_common_keyword("Birrificio Indipendente Viana", "Birrificio Viana S.r.l."));
        // Only the generic word overlaps
        assert!(!s.has_common_keyword("Birrificio Lambrate", "Birrificio Italiano"));
        // Short tokens are ignored
        assert!(!s.has_common_keyword("Ale Bar", "Ale Bar Co"));
    }

    #[test]
    fn keyword_overlap_is_symmetric() {
        let s = scorer();
        let pairs = [
            ("Birrificio Indipendente Viana", "Birrificio Viana S.r.l."),
            ("Peroni", "Heineken"),
            ("Zzyzx Brewing Experimental", "Birrificio Viana S.r.l."),
        ];
        for (a, b) in pairs {
            assert_eq!(s.has_common_keyword(a, b), s.has_common_keyword(b, a));
        }
    }

    #[test]
    fn keyword_tolerates_ocr_noise() {
        let s = scorer();
        assert!(s.has_common_keyword("Birrificio Vianna", "Birrificio Viana"));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Label-like text: accented letters, abbreviation marks and separators
    fn arb_label() -> impl Strategy<Value = String> {
        prop_oneof![
            "[A-Za-zàèéìòùÄÖÜßçñ0-9 .'&-]{0,30}",
            "\\PC{0,24}",
        ]
    }

    proptest! {
        #[test]
        fn similarity_is_reflexive(x in arb_label()) {
            prop_assume!(!x.trim().is_empty());
            prop_assert_eq!(name_similarity(&x, &x), 1.0);
        }

        #[test]
        fn similarity_is_symmetric_and_bounded(a in arb_label(), b in arb_label()) {
            let ab = name_similarity(&a, &b);
            prop_assert_eq!(ab, name_similarity(&b, &a));
            prop_assert!((0.0..=1.0).contains(&ab), "{} out of range", ab);
        }

        #[test]
        fn keyword_overlap_is_symmetric(a in arb_label(), b in arb_label()) {
            let scorer = SimilarityScorer::new(["peroni", "nastro azzurro", "baladin"], 0.8, 4);
            prop_assert_eq!(scorer.has_common_keyword(&a, &b), scorer.has_common_keyword(&b, &a));
        }
    }
}
