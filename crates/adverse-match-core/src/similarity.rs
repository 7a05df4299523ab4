//! String similarity metrics.
//!
//! All metrics take two normalized strings (see [`normalize`]) and return a
//! score in `[0.0, 1.0]`. Arguments are put in a canonical order before
//! scoring so every metric is exactly symmetric.
//!
//! Combined weights:
//! - Normalized edit distance: 40%
//! - Jaro-Winkler: 40%
//! - Bigram Jaccard: 20%

use std::collections::HashSet;

use strsim::{jaro_winkler, normalized_levenshtein};

const EDIT_WEIGHT: f64 = 0.4;
const JARO_WINKLER_WEIGHT: f64 = 0.4;
const NGRAM_WEIGHT: f64 = 0.2;

/// Minimum token length counted by [`word_overlap`].
const MIN_WORD_LEN: usize = 3;

/// Lower-case, trim, and strip punctuation (hyphens are kept).
///
/// Runs of whitespace collapse to a single space.
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Per-metric breakdown for one pair of strings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricScores {
    pub edit: f64,
    pub jaro_winkler: f64,
    pub ngram: f64,
    pub combined: f64,
}

impl MetricScores {
    /// Score a pair of normalized strings with every metric.
    pub fn compute(a: &str, b: &str) -> Self {
        let edit = edit_similarity(a, b);
        let jaro_winkler = jaro_winkler_similarity(a, b);
        let ngram = ngram_similarity(a, b);
        let combined = if a == b {
            1.0
        } else {
            clamp_unit(edit * EDIT_WEIGHT + jaro_winkler * JARO_WINKLER_WEIGHT + ngram * NGRAM_WEIGHT)
        };

        Self {
            edit,
            jaro_winkler,
            ngram,
            combined,
        }
    }
}

/// `1 - levenshtein(a, b) / max(len(a), len(b))`, counted in characters.
pub fn edit_similarity(a: &str, b: &str) -> f64 {
    let (a, b) = ordered(a, b);
    clamp_unit(normalized_levenshtein(a, b))
}

/// Jaro-Winkler similarity (rewards common prefixes).
pub fn jaro_winkler_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (a, b) = ordered(a, b);
    clamp_unit(jaro_winkler(a, b))
}

/// Jaccard similarity over 2-character shingles.
///
/// Strings shorter than two characters are treated as a single shingle.
pub fn ngram_similarity(a: &str, b: &str) -> f64 {
    let grams_a = bigrams(a);
    let grams_b = bigrams(b);

    if grams_a.is_empty() && grams_b.is_empty() {
        return 1.0;
    }
    if grams_a.is_empty() || grams_b.is_empty() {
        return 0.0;
    }

    let intersection = grams_a.intersection(&grams_b).count();
    let union = grams_a.union(&grams_b).count();
    intersection as f64 / union as f64
}

/// `0.4 * edit + 0.4 * jaro_winkler + 0.2 * ngram`.
pub fn combined_similarity(a: &str, b: &str) -> f64 {
    MetricScores::compute(a, b).combined
}

/// Jaccard overlap of the words (longer than two characters) in two texts.
///
/// Case-insensitive. Texts with no qualifying words overlap nothing.
pub fn word_overlap(a: &str, b: &str) -> f64 {
    let words_a = significant_words(a);
    let words_b = significant_words(b);

    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    intersection as f64 / union as f64
}

fn bigrams(s: &str) -> HashSet<String> {
    let chars: Vec<char> = s.chars().collect();
    match chars.len() {
        0 => HashSet::new(),
        1 => std::iter::once(s.to_string()).collect(),
        _ => chars.windows(2).map(|w| w.iter().collect()).collect(),
    }
}

fn significant_words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= MIN_WORD_LEN)
        .map(str::to_lowercase)
        .collect()
}

fn ordered<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
