//! VCdb record types and canonical vehicle materialization

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{BaseVehicleId, Vehicle, VehicleId};

/// One row of `makes.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MakeRecord {
    pub id: u32,
    pub name: String,
}

/// One row of `models.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRecord {
    pub id: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_type_id: Option<u32>,
}

/// One row of `years.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearRecord {
    pub id: u32,
    pub year: i32,
}

/// One row of `base_vehicles.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseVehicleRecord {
    pub id: BaseVehicleId,
    pub make_id: u32,
    pub model_id: u32,
    pub year_id: u32,
}

/// One row of `vehicles.json`: a concrete configuration of a base vehicle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub id: VehicleId,
    pub base_vehicle_id: BaseVehicleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submodel_id: Option<u32>,
}

/// One row of `submodels.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubModelRecord {
    pub id: u32,
    pub name: String,
}

/// One row of any configuration table (`engine_configs.json`,
/// `transmission_configs.json`, ...): a vehicle id plus an uninterpreted
/// payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub vehicle_id: VehicleId,
    #[serde(flatten)]
    pub payload: serde_json::Value,
}

/// Everything read from a VCdb artifact directory, before indexing.
#[derive(Debug, Clone, Default)]
pub struct VcdbRecords {
    pub makes: Vec<MakeRecord>,
    pub models: Vec<ModelRecord>,
    /// Optional indirection table; when empty, `year_id` is taken as the
    /// literal year.
    pub years: Vec<YearRecord>,
    pub base_vehicles: Vec<BaseVehicleRecord>,
    pub vehicles: Vec<VehicleRecord>,
    pub submodels: Vec<SubModelRecord>,
    /// Configuration rows keyed by table name (`engine`, `transmission`,
    /// `body`, `brake`, `drive`, `bed`, `steering`, `spring`).
    pub configs: HashMap<String, Vec<ConfigRecord>>,
}

/// Canonical, validated vehicle catalog. Sealed after construction.
#[derive(Debug, Clone)]
pub struct VehicleCatalog {
    /// One vehicle per base vehicle (the matcher's primary granularity)
    base_vehicles: Vec<Vehicle>,
    /// One vehicle per concrete configuration carrying a sub-model
    submodel_vehicles: Vec<Vehicle>,
    /// First configuration payload per vehicle id, per table
    configs: HashMap<String, HashMap<VehicleId, serde_json::Value>>,
    dropped_references: usize,
}

impl VehicleCatalog {
    pub fn from_records(records: VcdbRecords) -> Self {
        let makes: HashMap<u32, &MakeRecord> = records.makes.iter().map(|m| (m.id, m)).collect();
        let models: HashMap<u32, &ModelRecord> = records.models.iter().map(|m| (m.id, m)).collect();
        let submodels: HashMap<u32, &SubModelRecord> =
            records.submodels.iter().map(|s| (s.id, s)).collect();
        let years: HashMap<u32, i32> = records.years.iter().map(|y| (y.id, y.year)).collect();

        let mut dropped = 0usize;

        // Group concrete configurations by base vehicle; first record (by
        // lowest vehicle id) supplies the resolved vehicle_id.
        let mut by_base: HashMap<BaseVehicleId, Vec<&VehicleRecord>> = HashMap::new();
        for vehicle in &records.vehicles {
            by_base.entry(vehicle.base_vehicle_id).or_default().push(vehicle);
        }
        for group in by_base.values_mut() {
            group.sort_by_key(|v| v.id);
        }

        let mut base_vehicles = Vec::with_capacity(records.base_vehicles.len());
        let mut submodel_vehicles = Vec::new();

        for base in &records.base_vehicles {
            let (make, model) = match (makes.get(&base.make_id), models.get(&base.model_id)) {
                (Some(make), Some(model)) => (make, model),
                _ => {
                    dropped += 1;
                    continue;
                }
            };
            // Identity mapping when no years table was provided.
            let year = years
                .get(&base.year_id)
                .copied()
                .unwrap_or(base.year_id as i32);

            let configured = by_base.get(&base.id);
            let first = configured.and_then(|group| group.first());

            let template = Vehicle {
                base_vehicle_id: base.id,
                vehicle_id: first.map_or(base.id, |v| v.id),
                make_id: make.id,
                make_name: make.name.clone(),
                model_id: model.id,
                model_name: model.name.clone(),
                year,
                sub_model_id: None,
                sub_model_name: None,
                vehicle_type_id: model.vehicle_type_id,
                engine: None,
                transmission: None,
                body: None,
                brakes: None,
            };

            // Every configuration that names a sub-model becomes a
            // sub-model-level vehicle for the fallback index.
            if let Some(group) = configured {
                for record in group {
                    let Some(submodel_id) = record.submodel_id else {
                        continue;
                    };
                    match submodels.get(&submodel_id) {
                        Some(submodel) => submodel_vehicles.push(Vehicle {
                            vehicle_id: record.id,
                            sub_model_id: Some(submodel.id),
                            sub_model_name: Some(submodel.name.clone()),
                            ..template.clone()
                        }),
                        None => dropped += 1,
                    }
                }
            }

            base_vehicles.push(template);
        }

        let known_vehicle_ids: std::collections::HashSet<VehicleId> =
            records.vehicles.iter().map(|v| v.id).collect();

        let mut configs: HashMap<String, HashMap<VehicleId, serde_json::Value>> = HashMap::new();
        for (table, rows) in &records.configs {
            let entry = configs.entry(table.clone()).or_default();
            for row in rows {
                if !known_vehicle_ids.contains(&row.vehicle_id) {
                    dropped += 1;
                    continue;
                }
                // First record per vehicle wins.
                entry.entry(row.vehicle_id).or_insert_with(|| row.payload.clone());
            }
        }

        if dropped > 0 {
            tracing::warn!(dropped, "dropped dangling VCdb references");
        }

        Self {
            base_vehicles,
            submodel_vehicles,
            configs,
            dropped_references: dropped,
        }
    }

    pub fn base_vehicles(&self) -> &[Vehicle] {
        &self.base_vehicles
    }

    pub fn submodel_vehicles(&self) -> &[Vehicle] {
        &self.submodel_vehicles
    }

    /// First configuration payload for a vehicle in the named table.
    pub fn config(&self, table: &str, vehicle_id: VehicleId) -> Option<&serde_json::Value> {
        self.configs.get(table)?.get(&vehicle_id)
    }

    pub fn has_configs(&self) -> bool {
        self.configs.values().any(|table| !table.is_empty())
    }

    pub fn dropped_references(&self) -> usize {
        self.dropped_references
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> VcdbRecords {
        VcdbRecords {
            makes: vec![MakeRecord {
                id: 1,
                name: "Ford".to_string(),
            }],
            models: vec![ModelRecord {
                id: 11,
                name: "F-150".to_string(),
                vehicle_type_id: Some(5),
            }],
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
                    make_id: 9,
                    model_id: 11,
                    year_id: 2020,
                },
            ],
            vehicles: vec![
                VehicleRecord {
                    id: 1000,
                    base_vehicle_id: 100,
                    submodel_id: Some(7),
                },
                VehicleRecord {
                    id: 1001,
                    base_vehicle_id: 100,
                    submodel_id: None,
                },
            ],
            submodels: vec![SubModelRecord {
                id: 7,
                name: "Lariat".to_string(),
            }],
            configs: HashMap::new(),
        }
    }

    #[test]
    fn test_materialize_base_vehicles() {
        let catalog = VehicleCatalog::from_records(sample_records());
        assert_eq!(catalog.base_vehicles().len(), 1);

        let vehicle = &catalog.base_vehicles()[0];
        assert_eq!(vehicle.base_vehicle_id, 100);
        assert_eq!(vehicle.vehicle_id, 1000); // lowest concrete config
        assert_eq!(vehicle.make_name, "Ford");
        assert_eq!(vehicle.model_name, "F-150");
        assert_eq!(vehicle.year, 2020);
        assert_eq!(vehicle.sub_model_name, None);
    }

    #[test]
    fn test_dangling_base_vehicle_dropped() {
        let catalog = VehicleCatalog::from_records(sample_records());
        // Base vehicle 101 references make 9 which does not exist.
        assert_eq!(catalog.dropped_references(), 1);
    }

    #[test]
    fn test_submodel_vehicles() {
        let catalog = VehicleCatalog::from_records(sample_records());
        assert_eq!(catalog.submodel_vehicles().len(), 1);

        let vehicle = &catalog.submodel_vehicles()[0];
        assert_eq!(vehicle.vehicle_id, 1000);
        assert_eq!(vehicle.sub_model_name.as_deref(), Some("Lariat"));
    }

    #[test]
    fn test_year_indirection() {
        let mut records = sample_records();
        records.years = vec![YearRecord { id: 2020, year: 1999 }];
        let catalog = VehicleCatalog::from_records(records);
        assert_eq!(catalog.base_vehicles()[0].year, 1999);
    }

    #[test]
    fn test_config_first_record_wins() {
        let mut records = sample_records();
        records.configs.insert(
            "engine".to_string(),
            vec![
                ConfigRecord {
                    vehicle_id: 1000,
                    payload: serde_json::json!({"liters": 5.0}),
                },
                ConfigRecord {
                    vehicle_id: 1000,
                    payload: serde_json::json!({"liters": 3.5}),
                },
            ],
        );
        let catalog = VehicleCatalog::from_records(records);
        assert_eq!(
            catalog.config("engine", 1000).unwrap()["liters"],
            serde_json::json!(5.0)
        );
        assert!(catalog.config("engine", 1001).is_none());
    }
}
