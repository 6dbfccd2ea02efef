//! Vehicle index
//!
//! Lookup structures over the VCdb catalog: the three-segment
//! `make|model|year` key map, its hyphen-stripped variant, the sub-model
//! fallback index, and the per-(make, model) year-range index. Vehicles
//! live in arenas and the maps hold integer offsets into them.

use std::collections::{BTreeSet, HashMap};

use crate::catalog::VehicleCatalog;
use crate::normalize::TextNormalizer;
use crate::types::Vehicle;

/// A make as stored in the name lookup.
#[derive(Debug, Clone)]
pub struct MakeEntry {
    pub make_id: u32,
    pub name: String,
}

/// A model as stored in the name lookup.
#[derive(Debug, Clone)]
pub struct ModelEntry {
    pub model_id: u32,
    pub name: String,
}

pub struct VehicleIndex {
    catalog: VehicleCatalog,
    /// Normalized make name -> make
    makes_by_name: HashMap<String, MakeEntry>,
    /// Normalized model name -> models (several makes can share a name)
    models_by_name: HashMap<String, Vec<ModelEntry>>,
    /// `make|model|year` -> offset into the base-vehicle arena
    vehicle_by_key3: HashMap<String, usize>,
    /// Same with hyphens stripped from the model segment
    vehicle_by_variant_key: HashMap<String, usize>,
    /// `make|submodel|year` (and per-token variants for multi-word
    /// sub-models) -> offsets into the sub-model arena
    submodel_index: HashMap<String, Vec<usize>>,
    /// (make segment, model segment) -> years present in the catalog
    year_range_index: HashMap<(String, String), BTreeSet<i32>>,
}

impl VehicleIndex {
    pub fn build(catalog: VehicleCatalog, normalizer: &TextNormalizer) -> Self {
        let mut makes_by_name = HashMap::new();
        let mut models_by_name: HashMap<String, Vec<ModelEntry>> = HashMap::new();
        let mut vehicle_by_key3 = HashMap::new();
        let mut vehicle_by_variant_key = HashMap::new();
        let mut submodel_index: HashMap<String, Vec<usize>> = HashMap::new();
        let mut year_range_index: HashMap<(String, String), BTreeSet<i32>> = HashMap::new();

        // Deterministic arena order: the catalog's base-vehicle order is
        // the load order; collisions resolve to the first (lowest offset).
        for (offset, vehicle) in catalog.base_vehicles().iter().enumerate() {
            let make_seg = normalizer.normalize_vehicle_segment(&vehicle.make_name);
            let model_seg = normalizer.normalize_vehicle_segment(&vehicle.model_name);
            let model_seg_no_dash =
                normalizer.normalize_vehicle_segment_no_dash(&vehicle.model_name);

            makes_by_name.entry(make_seg.clone()).or_insert(MakeEntry {
                make_id: vehicle.make_id,
                name: vehicle.make_name.clone(),
            });
            let models = models_by_name.entry(model_seg.clone()).or_default();
            if !models.iter().any(|m| m.model_id == vehicle.model_id) {
                models.push(ModelEntry {
                    model_id: vehicle.model_id,
                    name: vehicle.model_name.clone(),
                });
            }

            vehicle_by_key3
                .entry(key3(&make_seg, &model_seg, vehicle.year))
                .or_insert(offset);
            vehicle_by_variant_key
                .entry(key3(&make_seg, &model_seg_no_dash, vehicle.year))
                .or_insert(offset);

            year_range_index
                .entry((make_seg, model_seg))
                .or_default()
                .insert(vehicle.year);
        }

        for (offset, vehicle) in catalog.submodel_vehicles().iter().enumerate() {
            let make_seg = normalizer.normalize_vehicle_segment(&vehicle.make_name);
            let Some(submodel_name) = vehicle.sub_model_name.as_deref() else {
                continue;
            };

            let submodel_seg = normalizer.normalize_vehicle_segment(submodel_name);
            let mut keys = vec![key3(&make_seg, &submodel_seg, vehicle.year)];
            // Multi-word sub-models are findable by each word.
            let words: Vec<&str> = submodel_name.split_whitespace().collect();
            if words.len() > 1 {
                for word in words {
                    let word_seg = normalizer.normalize_vehicle_segment(word);
                    if !word_seg.is_empty() {
                        keys.push(key3(&make_seg, &word_seg, vehicle.year));
                    }
                }
            }

            for key in keys {
                let offsets = submodel_index.entry(key).or_default();
                if !offsets.contains(&offset) {
                    offsets.push(offset);
                }
            }
        }

        let index = Self {
            catalog,
            makes_by_name,
            models_by_name,
            vehicle_by_key3,
            vehicle_by_variant_key,
            submodel_index,
            year_range_index,
        };

        tracing::info!(
            base_vehicles = index.catalog.base_vehicles().len(),
            submodel_vehicles = index.catalog.submodel_vehicles().len(),
            makes = index.makes_by_name.len(),
            models = index.models_by_name.len(),
            "built vehicle index"
        );
        index
    }

    /// Exact three-segment lookup; segments are already normalized.
    pub fn lookup_key3(&self, make_seg: &str, model_seg: &str, year: i32) -> Option<&Vehicle> {
        self.vehicle_by_key3
            .get(&key3(make_seg, model_seg, year))
            .map(|offset| &self.catalog.base_vehicles()[*offset])
    }

    /// Variant lookup with hyphens stripped from the model segment.
    pub fn lookup_variant(&self, make_seg: &str, model_seg: &str, year: i32) -> Option<&Vehicle> {
        self.vehicle_by_variant_key
            .get(&key3(make_seg, model_seg, year))
            .map(|offset| &self.catalog.base_vehicles()[*offset])
    }

    /// Sub-model fallback: full vehicles whose sub-model matches the
    /// caller's model field.
    pub fn submodel_lookup(&self, make_seg: &str, submodel_seg: &str, year: i32) -> Vec<&Vehicle> {
        self.submodel_index
            .get(&key3(make_seg, submodel_seg, year))
            .map(|offsets| {
                offsets
                    .iter()
                    .map(|offset| &self.catalog.submodel_vehicles()[*offset])
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Years present for a (make, model) pair.
    pub fn years_for(&self, make_seg: &str, model_seg: &str) -> Option<&BTreeSet<i32>> {
        self.year_range_index
            .get(&(make_seg.to_string(), model_seg.to_string()))
    }

    pub fn make(&self, make_seg: &str) -> Option<&MakeEntry> {
        self.makes_by_name.get(make_seg)
    }

    pub fn models_named(&self, model_seg: &str) -> &[ModelEntry] {
        self.models_by_name
            .get(model_seg)
            .map_or(&[], |models| models.as_slice())
    }

    /// All (make segment, model segment) pairs with their year sets, for
    /// the fuzzy strategies.
    pub fn make_model_pairs(
        &self,
    ) -> impl Iterator<Item = (&(String, String), &BTreeSet<i32>)> {
        self.year_range_index.iter()
    }

    /// Best-effort enrichment with the first configuration bundle attached
    /// to the vehicle's resolved `vehicle_id`. Never affects matching.
    pub fn enrich(&self, vehicle: &mut Vehicle) {
        if !self.catalog.has_configs() {
            return;
        }
        let id = vehicle.vehicle_id;
        if vehicle.engine.is_none() {
            vehicle.engine = self.catalog.config("engine", id).cloned();
        }
        if vehicle.transmission.is_none() {
            vehicle.transmission = self.catalog.config("transmission", id).cloned();
        }
        if vehicle.body.is_none() {
            vehicle.body = self.catalog.config("body", id).cloned();
        }
        if vehicle.brakes.is_none() {
            vehicle.brakes = self.catalog.config("brake", id).cloned();
        }
    }

    pub fn len(&self) -> usize {
        self.catalog.base_vehicles().len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.base_vehicles().is_empty()
    }
}

fn key3(make_seg: &str, model_seg: &str, year: i32) -> String {
    format!("{}|{}|{}", make_seg, model_seg, year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::vcdb::{
        BaseVehicleRecord, MakeRecord, ModelRecord, SubModelRecord, VcdbRecords, VehicleRecord,
    };

    fn sample_index() -> VehicleIndex {
        let records = VcdbRecords {
            makes: vec![MakeRecord {
                id: 1,
                name: "Ford".to_string(),
            }],
            models: vec![
                ModelRecord {
                    id: 11,
                    name: "F-150".to_string(),
                    vehicle_type_id: None,
                },
                ModelRecord {
                    id: 12,
                    name: "Escape".to_string(),
                    vehicle_type_id: None,
                },
            ],
            years: vec![],
            base_vehicles: vec![
                BaseVehicleRecord {
                    id: 100,
                    make_id: 1,
                    model_id: 11,
                    year_id: 2020,
                },
                BaseVehicleRecord {
                    id: 101,
                    make_id: 1,
                    model_id: 11,
                    year_id: 2021,
                },
                BaseVehicleRecord {
                    id: 102,
                    make_id: 1,
                    model_id: 12,
                    year_id: 2020,
                },
            ],
            vehicles: vec![VehicleRecord {
                id: 1000,
                base_vehicle_id: 100,
                submodel_id: Some(7),
            }],
            submodels: vec![SubModelRecord {
                id: 7,
                name: "King Ranch".to_string(),
            }],
            configs: std::collections::HashMap::new(),
        };
        VehicleIndex::build(VehicleCatalog::from_records(records), &TextNormalizer::new())
    }

    #[test]
    fn test_key3_lookup() {
        let index = sample_index();
        let vehicle = index.lookup_key3("ford", "f-150", 2020).unwrap();
        assert_eq!(vehicle.base_vehicle_id, 100);
        assert!(index.lookup_key3("ford", "f150", 2020).is_none());
        assert!(index.lookup_key3("ford", "f-150", 1999).is_none());
    }

    #[test]
    fn test_variant_lookup() {
        let index = sample_index();
        let vehicle = index.lookup_variant("ford", "f150", 2020).unwrap();
        assert_eq!(vehicle.base_vehicle_id, 100);
    }

    #[test]
    fn test_submodel_lookup_whole_and_tokens() {
        let index = sample_index();
        let whole = index.submodel_lookup("ford", "kingranch", 2020);
        assert_eq!(whole.len(), 1);
        assert_eq!(whole[0].sub_model_name.as_deref(), Some("King Ranch"));

        // Individual words of a multi-word sub-model are indexed too.
        let by_token = index.submodel_lookup("ford", "king", 2020);
        assert_eq!(by_token.len(), 1);
        assert!(index.submodel_lookup("ford", "king", 2021).is_empty());
    }

    #[test]
    fn test_year_range() {
        let index = sample_index();
        let years = index.years_for("ford", "f-150").unwrap();
        assert!(years.contains(&2020));
        assert!(years.contains(&2021));
        assert_eq!(years.len(), 2);
        assert!(index.years_for("ford", "mustang").is_none());
    }

    #[test]
    fn test_name_lookups() {
        let index = sample_index();
        assert_eq!(index.make("ford").unwrap().make_id, 1);
        assert!(index.make("toyota").is_none());
        assert_eq!(index.models_named("escape").len(), 1);
    }
}
