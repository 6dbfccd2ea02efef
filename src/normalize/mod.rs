//! Text normalization and similarity for part names and vehicle segments
//!
//! Everything the matchers compare goes through here first: a fixed
//! normalization pipeline (lowercase, synonym expansion, punctuation
//! stripping, whitespace collapse) and a fixed combined similarity metric
//! (token Jaccard + character-bigram Jaccard + length-normalized
//! Levenshtein). The tables are closed; there is no per-call tuning.

use std::collections::HashSet;

/// Levenshtein is computed on at most this many characters; longer strings
/// are truncated for the distance contribution only.
const LEVENSHTEIN_CAP: usize = 64;

/// Weight of the token-set Jaccard term in the combined similarity.
const WEIGHT_TOKEN_JACCARD: f64 = 0.5;
/// Weight of the character-bigram Jaccard term.
const WEIGHT_BIGRAM_JACCARD: f64 = 0.3;
/// Weight of the length-normalized Levenshtein term.
const WEIGHT_LEVENSHTEIN: f64 = 0.2;

/// Default minimum token length for `tokenize`.
pub const MIN_TOKEN_LEN: usize = 3;

/// Synonym keys that carry punctuation. These are expanded token-wise
/// before punctuation stripping would destroy them.
const PUNCTUATED_SYNONYMS: &[(&str, &str)] = &[
    ("a/c", "air conditioning"),
    ("hyd.", "hydraulic"),
    ("filter-hyd", "hydraulic filter"),
    ("filter-fuel", "fuel filter"),
    ("filter-air", "air filter"),
    ("filter-oil", "engine oil filter"),
];

/// Plain token-level abbreviation expansions.
const TOKEN_SYNONYMS: &[(&str, &str)] = &[
    ("hyd", "hydraulic"),
    ("hydr", "hydraulic"),
    ("ac", "air conditioning"),
    ("trans", "transmission"),
    ("diff", "differential"),
    ("alt", "alternator"),
    ("gen", "generator"),
    ("batt", "battery"),
    ("elec", "electrical"),
    ("mech", "mechanical"),
    ("fltr", "filter"),
];

/// Line items that are services or fees, never catalog parts.
const SERVICE_ITEMS: &[&str] = &[
    "freight",
    "shipping",
    "inbound",
    "outbound",
    "labor",
    "service",
    "inspection",
    "diagnostic",
    "disposal",
    "environmental fee",
    "shop supplies",
    "misc",
    "miscellaneous",
    "tax",
    "discount",
    "credit",
    "core charge",
];

/// Names too generic to match against the catalog.
const GENERIC_TERMS: &[&str] = &[
    "part", "parts", "item", "items", "component", "components", "unknown", "other", "various",
];

/// Text normalizer with the closed synonym tables baked in.
///
/// Construction is cheap; the engine builds one and shares it between the
/// loader, the indexes, and both matchers.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    service_items: HashSet<&'static str>,
    generic_terms: HashSet<&'static str>,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextNormalizer {
    pub fn new() -> Self {
        Self {
            service_items: SERVICE_ITEMS.iter().copied().collect(),
            generic_terms: GENERIC_TERMS.iter().copied().collect(),
        }
    }

    /// Normalize a free-form part name into the spaced compare form.
    ///
    /// Pipeline order is fixed: lowercase, punctuated-synonym expansion,
    /// punctuation stripping, token-level abbreviation expansion,
    /// whitespace collapse. Whole-name canonical rewrites (`oil filter ->
    /// engine oil filter`) are NOT applied here; they live in the parts
    /// index mapping table and carry a lower confidence ceiling.
    pub fn normalize(&self, name: &str) -> String {
        let lowered = name.to_lowercase();

        // Expand punctuation-bearing synonym tokens before stripping.
        let mut expanded = String::with_capacity(lowered.len());
        for token in lowered.split_whitespace() {
            if !expanded.is_empty() {
                expanded.push(' ');
            }
            match PUNCTUATED_SYNONYMS.iter().find(|(k, _)| *k == token) {
                Some((_, replacement)) => expanded.push_str(replacement),
                None => expanded.push_str(token),
            }
        }

        // Strip everything outside [a-z0-9 _], replacing with a space so
        // punctuation still separates tokens.
        let stripped: String = expanded
            .chars()
            .map(|c| {
                if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == ' ' {
                    c
                } else {
                    ' '
                }
            })
            .collect();

        // Token-level abbreviation expansion, then collapse whitespace.
        let mut out = String::with_capacity(stripped.len());
        for token in stripped.split_whitespace() {
            if !out.is_empty() {
                out.push(' ');
            }
            match TOKEN_SYNONYMS.iter().find(|(k, _)| *k == token) {
                Some((_, replacement)) => out.push_str(replacement),
                None => out.push_str(token),
            }
        }
        out
    }

    /// Compact compare key used by the parts exact index: `normalize` with
    /// all spaces removed.
    pub fn normalize_part_key(&self, name: &str) -> String {
        self.normalize(name).replace(' ', "")
    }

    /// Normalize one segment of the vehicle key (`make`, `model`, or
    /// `year`). Keeps hyphens so `F-150` and `F150` stay distinct; the
    /// variant key strips them (see `normalize_vehicle_segment_no_dash`).
    pub fn normalize_vehicle_segment(&self, text: &str) -> String {
        text.to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
            .collect()
    }

    /// Vehicle segment variant with hyphens stripped as well.
    pub fn normalize_vehicle_segment_no_dash(&self, text: &str) -> String {
        text.to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            .collect()
    }

    /// Ordered, deduplicated tokens of at least `min_len` characters from
    /// the normalized form of `text`.
    pub fn tokenize(&self, text: &str, min_len: usize) -> Vec<String> {
        let normalized = self.normalize(text);
        let mut seen = HashSet::new();
        let mut tokens = Vec::new();
        for token in normalized.split_whitespace() {
            if token.len() >= min_len && seen.insert(token.to_string()) {
                tokens.push(token.to_string());
            }
        }
        tokens
    }

    /// Combined similarity in `[0, 1]` between two normalized strings.
    ///
    /// 0.5 token-set Jaccard + 0.3 padded character-bigram Jaccard +
    /// 0.2 length-normalized Levenshtein. Identical inputs short-circuit
    /// to 1.0; an empty input scores 0.
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        if a == b {
            return 1.0;
        }

        let token_sim = token_jaccard(a, b);
        let bigram_sim = bigram_jaccard(a, b);
        let lev_sim = levenshtein_similarity(a, b);

        WEIGHT_TOKEN_JACCARD * token_sim
            + WEIGHT_BIGRAM_JACCARD * bigram_sim
            + WEIGHT_LEVENSHTEIN * lev_sim
    }

    /// True when the normalized text equals an entry in the closed
    /// service/fee exclusion set.
    pub fn is_service_item(&self, normalized: &str) -> bool {
        self.service_items.contains(normalized)
    }

    /// True when the normalized text is a generic stop-word that cannot
    /// identify a part.
    pub fn is_generic_term(&self, normalized: &str) -> bool {
        self.generic_terms.contains(normalized)
    }

    /// Case-insensitive: does `text` contain any of `keywords`?
    pub fn contains_any(&self, text: &str, keywords: &[&str]) -> bool {
        let lowered = text.to_lowercase();
        keywords.iter().any(|k| lowered.contains(&k.to_lowercase()))
    }

    /// Case-insensitive: does `text` contain all of `keywords`?
    pub fn contains_all(&self, text: &str, keywords: &[&str]) -> bool {
        let lowered = text.to_lowercase();
        keywords.iter().all(|k| lowered.contains(&k.to_lowercase()))
    }

    /// Expansion candidates for a token, used by the token-recall strategy
    /// to widen queries (`trans` also queries `transmission`).
    pub fn expand_token(&self, token: &str) -> Vec<String> {
        let mut out = vec![token.to_string()];
        for (key, replacement) in TOKEN_SYNONYMS {
            if *key == token {
                for word in replacement.split_whitespace() {
                    if word.len() >= MIN_TOKEN_LEN {
                        out.push(word.to_string());
                    }
                }
            }
        }
        out
    }
}

fn token_jaccard(a: &str, b: &str) -> f64 {
    let set_a: HashSet<&str> = a.split_whitespace().collect();
    let set_b: HashSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

/// Character bigrams of the string padded with one leading and one
/// trailing space, so single-character edges still contribute.
fn bigrams(s: &str) -> HashSet<(char, char)> {
    let padded: Vec<char> = std::iter::once(' ')
        .chain(s.chars())
        .chain(std::iter::once(' '))
        .collect();
    padded.windows(2).map(|w| (w[0], w[1])).collect()
}

fn bigram_jaccard(a: &str, b: &str) -> f64 {
    let set_a = bigrams(a);
    let set_b = bigrams(b);
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    let chars_a: Vec<char> = a.chars().take(LEVENSHTEIN_CAP).collect();
    let chars_b: Vec<char> = b.chars().take(LEVENSHTEIN_CAP).collect();
    let max_len = chars_a.len().max(chars_b.len());
    if max_len == 0 {
        return 0.0;
    }
    let distance = levenshtein(&chars_a, &chars_b);
    1.0 - distance as f64 / max_len as f64
}

/// Classic two-row Levenshtein distance.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
