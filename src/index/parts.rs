//! Parts index
//!
//! Three lookup structures built once over the parts catalog: an exact map
//! on the compact normalized key, 3-character prefix buckets for fuzzy
//! shortlisting, and a token inverted index for keyword recall. A closed
//! mapping table of common free-form names and an interchange index over
//! brand part numbers sit alongside. Everything is read-only after build.

use std::collections::HashMap;

use crate::catalog::PartCatalog;
use crate::normalize::{TextNormalizer, MIN_TOKEN_LEN};
use crate::types::{Part, PartTerminologyId};

/// Closed table of common free-form names that rewrite to one or more
/// canonical names. Applied by the matcher only when the whole normalized
/// input equals a key; contributes a 0.95 confidence ceiling.
const MAPPING_TABLE: &[(&str, &[&str])] = &[
    ("oil filter", &["engine oil filter", "turbocharger oil filter"]),
    ("oil", &["engine oil"]),
    ("wiper blade", &["windshield wiper blade"]),
    ("wipers", &["windshield wiper blade"]),
    ("wiper blades", &["windshield wiper blade"]),
    ("spark plugs", &["spark plug"]),
    ("brake pads", &["disc brake pad"]),
    ("brake pad", &["disc brake pad"]),
    ("shock", &["shock absorber"]),
    ("shocks", &["shock absorber"]),
    ("muffler", &["exhaust muffler"]),
    ("serpentine belt", &["accessory drive belt"]),
];

/// Length of the fuzzy shortlist prefix.
const PREFIX_LEN: usize = 3;

pub struct PartsIndex {
    catalog: PartCatalog,
    /// Compact normalized key -> part id. Collisions resolve to the
    /// lowest part id.
    exact_by_key: HashMap<String, PartTerminologyId>,
    /// First three characters of the compact key -> candidate part ids,
    /// ordered by (canonical name length, id).
    fuzzy_by_prefix: HashMap<String, Vec<PartTerminologyId>>,
    /// Token (>= 3 chars, from name + descriptions + aliases + string
    /// attribute values) -> sorted part ids.
    token_inverted: HashMap<String, Vec<PartTerminologyId>>,
    /// Normalized brand part number -> part ids.
    interchange_by_number: HashMap<String, Vec<PartTerminologyId>>,
    /// Normalized free-form name -> canonical rewrite targets.
    mapping_table: HashMap<&'static str, &'static [&'static str]>,
    /// Spaced normalized name per part, precomputed for similarity scoring.
    normalized_names: HashMap<PartTerminologyId, String>,
}

impl PartsIndex {
    pub fn build(catalog: PartCatalog, normalizer: &TextNormalizer) -> Self {
        let mut exact_by_key: HashMap<String, PartTerminologyId> = HashMap::new();
        let mut fuzzy_by_prefix: HashMap<String, Vec<PartTerminologyId>> = HashMap::new();
        let mut token_inverted: HashMap<String, Vec<PartTerminologyId>> = HashMap::new();
        let mut normalized_names: HashMap<PartTerminologyId, String> = HashMap::new();

        // Deterministic build order: ascending part id, so first-wins
        // collisions always resolve to the lowest id.
        let mut parts: Vec<&Part> = catalog.parts().collect();
        parts.sort_by_key(|p| p.part_terminology_id);

        for part in &parts {
            let id = part.part_terminology_id;
            let normalized = normalizer.normalize(&part.name);
            let key = normalized.replace(' ', "");
            if key.is_empty() {
                continue;
            }

            exact_by_key.entry(key.clone()).or_insert(id);
            normalized_names.insert(id, normalized.clone());

            let prefix: String = key.chars().take(PREFIX_LEN).collect();
            fuzzy_by_prefix.entry(prefix).or_default().push(id);

            for token in tokens_for_part(part, normalizer) {
                let ids = token_inverted.entry(token).or_default();
                if ids.last() != Some(&id) {
                    ids.push(id);
                }
            }

            // Aliases join the exact map too; the canonical name keeps
            // priority through the ascending-id, name-first insert order.
            for alias in &part.aliases {
                let alias_key = normalizer.normalize_part_key(alias);
                if !alias_key.is_empty() {
                    exact_by_key.entry(alias_key).or_insert(id);
                }
            }
        }

        // Order prefix buckets by (name length, id) so fuzzy tiebreaks are
        // deterministic before similarity is even computed.
        for bucket in fuzzy_by_prefix.values_mut() {
            bucket.sort_by_key(|id| {
                let len = catalog.get(*id).map_or(usize::MAX, |p| p.name.len());
                (len, *id)
            });
        }

        let mut interchange_by_number: HashMap<String, Vec<PartTerminologyId>> = HashMap::new();
        for row in &catalog.interchange {
            let number = normalize_part_number(&row.part_number);
            if number.is_empty() {
                continue;
            }
            let ids = interchange_by_number.entry(number).or_default();
            if !ids.contains(&row.part_id) {
                ids.push(row.part_id);
            }
        }
        for ids in interchange_by_number.values_mut() {
            ids.sort_unstable();
        }

        let index = Self {
            catalog,
            exact_by_key,
            fuzzy_by_prefix,
            token_inverted,
            interchange_by_number,
            mapping_table: MAPPING_TABLE.iter().copied().collect(),
            normalized_names,
        };

        tracing::info!(
            parts = index.catalog.len(),
            exact_keys = index.exact_by_key.len(),
            prefixes = index.fuzzy_by_prefix.len(),
            tokens = index.token_inverted.len(),
            interchange = index.interchange_by_number.len(),
            "built parts index"
        );
        index
    }

    /// Exact lookup on a compact normalized key.
    pub fn exact(&self, key: &str) -> Option<&Part> {
        self.exact_by_key.get(key).and_then(|id| self.catalog.get(*id))
    }

    /// Canonical rewrite targets when the whole normalized input equals a
    /// mapping key.
    pub fn mapping_targets(&self, normalized: &str) -> Option<&'static [&'static str]> {
        self.mapping_table.get(normalized).copied()
    }

    /// Fuzzy shortlist: candidates sharing the input key's 3-char prefix.
    pub fn prefix_candidates(&self, key: &str) -> &[PartTerminologyId] {
        if key.len() < PREFIX_LEN {
            return &[];
        }
        let prefix: String = key.chars().take(PREFIX_LEN).collect();
        self.fuzzy_by_prefix
            .get(&prefix)
            .map_or(&[], |ids| ids.as_slice())
    }

    /// Part ids containing the token.
    pub fn token_lookup(&self, token: &str) -> &[PartTerminologyId] {
        self.token_inverted
            .get(token)
            .map_or(&[], |ids| ids.as_slice())
    }

    /// Part ids for a brand part number (interchange).
    pub fn interchange_lookup(&self, number: &str) -> &[PartTerminologyId] {
        self.interchange_by_number
            .get(&normalize_part_number(number))
            .map_or(&[], |ids| ids.as_slice())
    }

    pub fn part(&self, id: PartTerminologyId) -> Option<&Part> {
        self.catalog.get(id)
    }

    /// Precomputed spaced normalized name for similarity scoring.
    pub fn normalized_name(&self, id: PartTerminologyId) -> Option<&str> {
        self.normalized_names.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }
}

fn tokens_for_part(part: &Part, normalizer: &TextNormalizer) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();

    let mut push_tokens = |text: &str| {
        for token in normalizer.tokenize(text, MIN_TOKEN_LEN) {
            if seen.insert(token.clone()) {
                out.push(token);
            }
        }
    };

    push_tokens(&part.name);
    for description in &part.descriptions {
        push_tokens(description);
    }
    for alias in &part.aliases {
        push_tokens(alias);
    }
    if let Some(attributes) = &part.bundles.attributes {
        collect_string_values(attributes, &mut |s| push_tokens(s));
    }

    out
}

/// Walk a bundle payload and visit every string value.
fn collect_string_values(value: &serde_json::Value, visit: &mut impl FnMut(&str)) {
    match value {
        serde_json::Value::String(s) => visit(s),
        serde_json::Value::Array(items) => {
            for item in items {
                collect_string_values(item, visit);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                collect_string_values(item, visit);
            }
        }
        _ => {}
    }
}

fn normalize_part_number(number: &str) -> String {
    number
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}
