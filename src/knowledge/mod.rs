//! Per-entity knowledge base
//!
//! Every successful parts match records which canonical part a shop's
//! free-form name resolved to. The aggregate is a frequency table per
//! entity, queryable as a ranked knowledge base.

use dashmap::DashMap;

use crate::types::{EntityId, KnowledgeBase, KnowledgeBaseEntry, Part, PartTerminologyId};

/// Distinct original spellings kept per (entity, part).
const MAX_VARIANTS: usize = 10;

#[derive(Debug, Clone)]
struct FrequencyEntry {
    count: u64,
    variants: Vec<String>,
    canonical: Part,
}

/// Concurrent frequency table keyed by (entity, canonical part).
#[derive(Default)]
pub struct KnowledgeBaseAggregator {
    records: DashMap<(EntityId, PartTerminologyId), FrequencyEntry>,
}

impl KnowledgeBaseAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successful match. Counts are monotone; variants are
    /// bounded and deduplicated.
    pub fn record(&self, entity_id: &str, part: &Part, original_name: &str) {
        let key = (entity_id.to_string(), part.part_terminology_id);
        let mut entry = self.records.entry(key).or_insert_with(|| FrequencyEntry {
            count: 0,
            variants: Vec::new(),
            canonical: part.clone(),
        });
        entry.count += 1;
        let original_name = original_name.trim();
        if !original_name.is_empty()
            && entry.variants.len() < MAX_VARIANTS
            && !entry.variants.iter().any(|v| v == original_name)
        {
            entry.variants.push(original_name.to_string());
        }
    }

    /// Ranked knowledge base for one entity: frequency descending, ties by
    /// part name.
    pub fn knowledge_base(&self, entity_id: &str) -> KnowledgeBase {
        let mut entries: Vec<KnowledgeBaseEntry> = self
            .records
            .iter()
            .filter(|record| record.key().0 == entity_id)
            .map(|record| KnowledgeBaseEntry {
                part_id: record.key().1,
                part_name: record.value().canonical.name.clone(),
                frequency: record.value().count,
                canonical_part: record.value().canonical.clone(),
                variants: record.value().variants.clone(),
            })
            .collect();

        entries.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then_with(|| a.part_name.cmp(&b.part_name))
        });

        KnowledgeBase {
            entity_id: entity_id.to_string(),
            total_unique_parts: entries.len(),
            most_frequent_parts: entries,
        }
    }

    pub fn clear(&self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
