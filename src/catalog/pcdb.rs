//! PCdb record types and canonical part materialization

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::types::{Part, PartBundles, PartRelation, PartTerminologyId};

/// One row of `parts.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartRecord {
    pub id: PartTerminologyId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_id: Option<u32>,
}

/// One row of `descriptions.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionRecord {
    pub id: u32,
    pub text: String,
}

/// One row of `aliases.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasRecord {
    pub part_id: PartTerminologyId,
    pub alias_id: u32,
    pub alias_name: String,
}

/// One row of `relationships.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub part_id: PartTerminologyId,
    pub related_part_id: PartTerminologyId,
    pub relation_type: String,
}

/// One row of `supersessions.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupersessionRecord {
    pub old_part_id: PartTerminologyId,
    pub new_part_id: PartTerminologyId,
}

/// One row of `interchange.json`: a brand part number that resolves to a
/// canonical part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterchangeRecord {
    pub part_id: PartTerminologyId,
    pub part_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

/// One row of any opaque PIES bundle file (`attributes.json`,
/// `pricing.json`, ...): a part id plus an uninterpreted payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleRecord {
    pub part_id: PartTerminologyId,
    #[serde(flatten)]
    pub payload: serde_json::Value,
}

/// Everything read from a PCdb artifact directory, before indexing.
#[derive(Debug, Clone, Default)]
pub struct PcdbRecords {
    pub parts: Vec<PartRecord>,
    pub descriptions: Vec<DescriptionRecord>,
    pub aliases: Vec<AliasRecord>,
    pub relationships: Vec<RelationshipRecord>,
    pub supersessions: Vec<SupersessionRecord>,
    pub interchange: Vec<InterchangeRecord>,
    /// Opaque bundle rows keyed by bundle name (`attributes`, `assets`,
    /// `packaging`, `pricing`, `availability`, `hazmat`, `digital_assets`,
    /// `category`).
    pub bundles: HashMap<String, Vec<BundleRecord>>,
}

/// Canonical, validated parts catalog. Sealed after construction.
#[derive(Debug, Clone)]
pub struct PartCatalog {
    parts: HashMap<PartTerminologyId, Part>,
    pub interchange: Vec<InterchangeRecord>,
    dropped_references: usize,
}

impl PartCatalog {
    /// Materialize canonical parts from raw records.
    ///
    /// Dangling references (aliases, relationships, or supersessions
    /// naming unknown part ids) are counted and dropped.
    pub fn from_records(records: PcdbRecords) -> Self {
        let known: HashSet<PartTerminologyId> = records.parts.iter().map(|p| p.id).collect();
        let descriptions: HashMap<u32, &str> = records
            .descriptions
            .iter()
            .map(|d| (d.id, d.text.as_str()))
            .collect();

        let mut dropped = 0usize;

        let mut parts: HashMap<PartTerminologyId, Part> = records
            .parts
            .iter()
            .map(|record| {
                let mut part = Part::named(record.id, record.name.clone());
                if let Some(text) = record.description_id.and_then(|id| descriptions.get(&id)) {
                    part.descriptions.push((*text).to_string());
                }
                (record.id, part)
            })
            .collect();

        for alias in &records.aliases {
            match parts.get_mut(&alias.part_id) {
                Some(part) => part.aliases.push(alias.alias_name.clone()),
                None => dropped += 1,
            }
        }

        for relation in &records.relationships {
            if !known.contains(&relation.related_part_id) {
                dropped += 1;
                continue;
            }
            match parts.get_mut(&relation.part_id) {
                Some(part) => part.relations.push(PartRelation {
                    related_part_id: relation.related_part_id,
                    relation_type: relation.relation_type.clone(),
                }),
                None => dropped += 1,
            }
        }

        for supersession in &records.supersessions {
            if !known.contains(&supersession.old_part_id)
                || !known.contains(&supersession.new_part_id)
            {
                dropped += 1;
                continue;
            }
            if let Some(old) = parts.get_mut(&supersession.old_part_id) {
                old.superseded_by.push(supersession.new_part_id);
            }
            if let Some(new) = parts.get_mut(&supersession.new_part_id) {
                new.supersedes.push(supersession.old_part_id);
            }
        }

        for interchange in &records.interchange {
            if !known.contains(&interchange.part_id) {
                dropped += 1;
            }
        }

        for (bundle_name, rows) in &records.bundles {
            for row in rows {
                match parts.get_mut(&row.part_id) {
                    Some(part) => {
                        attach_bundle(&mut part.bundles, bundle_name, &row.payload);
                    }
                    None => dropped += 1,
                }
            }
        }

        if dropped > 0 {
            tracing::warn!(dropped, "dropped dangling PCdb references");
        }

        let interchange = records
            .interchange
            .into_iter()
            .filter(|row| known.contains(&row.part_id))
            .collect();

        Self {
            parts,
            interchange,
            dropped_references: dropped,
        }
    }

    pub fn get(&self, id: PartTerminologyId) -> Option<&Part> {
        self.parts.get(&id)
    }

    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.values()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn dropped_references(&self) -> usize {
        self.dropped_references
    }
}

fn attach_bundle(bundles: &mut PartBundles, name: &str, payload: &serde_json::Value) {
    let slot = match name {
        "category" => &mut bundles.category,
        "attributes" => &mut bundles.attributes,
        "interchange" => &mut bundles.interchange,
        "assets" => &mut bundles.assets,
        "packaging" => &mut bundles.packaging,
        "pricing" => &mut bundles.pricing,
        "availability" => &mut bundles.availability,
        "hazmat" => &mut bundles.hazmat,
        "digital_assets" => &mut bundles.digital_assets,
        other => {
            tracing::debug!(bundle = other, "ignoring unrecognized PIES bundle");
            return;
        }
    };
    // Multiple rows per part accumulate into an array.
    let updated = match slot.take() {
        Some(serde_json::Value::Array(mut items)) => {
            items.push(payload.clone());
            serde_json::Value::Array(items)
        }
        Some(existing) => serde_json::Value::Array(vec![existing, payload.clone()]),
        None => payload.clone(),
    };
    *slot = Some(updated);
}
