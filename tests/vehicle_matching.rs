//! End-to-end vehicle matching scenarios
//!
//! Exercises the confidence ladder against a VCdb fixture with several
//! makes, model years, and sub-models: exact keys, format variants, year
//! tolerance, VIN decoding, and the deterministic failure taxonomy.

use autocat::catalog::pcdb::{PartRecord, PcdbRecords};
use autocat::catalog::vcdb::{
    BaseVehicleRecord, ConfigRecord, MakeRecord, ModelRecord, SubModelRecord, VcdbRecords,
    VehicleRecord,
};
use autocat::config::MatcherConfig;
use autocat::types::{VehicleFailureReason, VehicleMatchMethod, VehicleQuery};
use autocat::MatchingEngine;

fn fixture_pcdb() -> PcdbRecords {
    PcdbRecords {
        parts: vec![PartRecord {
            id: 1,
            name: "Engine Oil Filter".to_string(),
            description_id: None,
        }],
        ..PcdbRecords::default()
    }
}

/// Ford F-150 2018-2022 (sub-model XLT on the 2020), Ford Escape 2020,
/// Toyota Camry 2019-2021.
fn fixture_vcdb() -> VcdbRecords {
    let mut base_vehicles = Vec::new();
    for (offset, year) in (2018..=2022).enumerate() {
        base_vehicles.push(BaseVehicleRecord {
            id: 100 + offset as u32,
            make_id: 1,
            model_id: 11,
            year_id: year as u32,
        });
    }
    base_vehicles.push(BaseVehicleRecord {
        id: 200,
        make_id: 1,
        model_id: 12,
        year_id: 2020,
    });
    for (offset, year) in (2019..=2021).enumerate() {
        base_vehicles.push(BaseVehicleRecord {
            id: 300 + offset as u32,
            make_id: 2,
            model_id: 21,
            year_id: year as u32,
        });
    }

    VcdbRecords {
        makes: vec![
            MakeRecord {
                id: 1,
                name: "Ford".to_string(),
            },
            MakeRecord {
                id: 2,
                name: "Toyota".to_string(),
            },
        ],
        models: vec![
            ModelRecord {
                id: 11,
                name: "F-150".to_string(),
                vehicle_type_id: Some(5),
            },
            ModelRecord {
                id: 12,
                name: "Escape".to_string(),
                vehicle_type_id: Some(6),
            },
            ModelRecord {
                id: 21,
                name: "Camry".to_string(),
                vehicle_type_id: Some(6),
            },
        ],
        base_vehicles,
        vehicles: vec![VehicleRecord {
            id: 1000,
            base_vehicle_id: 102, // 2020 F-150
            submodel_id: Some(7),
        }],
        submodels: vec![SubModelRecord {
            id: 7,
            name: "XLT".to_string(),
        }],
        configs: [(
            "engine".to_string(),
            vec![ConfigRecord {
                vehicle_id: 1000,
                payload: serde_json::json!({"liters": 3.5, "cylinders": 6}),
            }],
        )]
        .into_iter()
        .collect(),
        ..VcdbRecords::default()
    }
}

fn engine() -> MatchingEngine {
    MatchingEngine::from_records(fixture_pcdb(), fixture_vcdb(), MatcherConfig::default()).unwrap()
}

/// Every catalog (make, model, year) triple resolves to its stored base
/// vehicle at 0.98.
#[test]
fn test_vehicle_identity() {
    let engine = engine();
    let expectations = [
        ("Ford", "F-150", 2018, 100),
        ("Ford", "F-150", 2022, 104),
        ("Ford", "Escape", 2020, 200),
        ("Toyota", "Camry", 2019, 300),
    ];
    for (make, model, year, base_id) in expectations {
        let result = engine.match_vehicle(&VehicleQuery::mmy(make, model, year));
        assert!(result.matched, "{} {} {} did not match", make, model, year);
        assert_eq!(result.confidence, 0.98);
        assert_eq!(result.method, Some(VehicleMatchMethod::Exact));
        assert_eq!(
            result.primary.unwrap().vehicle.base_vehicle_id,
            base_id,
            "{} {} {} resolved wrong",
            make,
            model,
            year
        );
    }
}

/// "F150" finds the catalog's "F-150" through a format variant.
#[test]
fn test_format_variant_scenario() {
    let engine = engine();
    let result = engine.match_vehicle(&VehicleQuery::mmy("Ford", "F150", 2020));
    assert!(result.matched);
    assert!(matches!(
        result.method,
        Some(VehicleMatchMethod::FormatVariant)
            | Some(VehicleMatchMethod::ModelInsertDash)
            | Some(VehicleMatchMethod::ModelNoDash)
    ));
    assert!(result.confidence >= 0.95 && result.confidence <= 0.96);
    assert_eq!(result.primary.unwrap().vehicle.base_vehicle_id, 102);
}

/// A year one past coverage matches through the tolerance ladder.
#[test]
fn test_year_tolerance() {
    let engine = engine();
    let result = engine.match_vehicle(&VehicleQuery::mmy("Toyota", "Camry", 2022));
    assert!(result.matched);
    assert_eq!(result.method, Some(VehicleMatchMethod::YearOffset(-1)));
    assert!((result.confidence - 0.75).abs() < 1e-9);
    assert_eq!(result.primary.unwrap().vehicle.year, 2021);
}

/// Sub-model in the model field falls back to the sub-model index and
/// carries the resolved sub-model name.
#[test]
fn test_submodel_fallback() {
    let engine = engine();
    let result = engine.match_vehicle(&VehicleQuery::mmy("Ford", "XLT", 2020));
    assert!(result.matched);
    assert_eq!(result.method, Some(VehicleMatchMethod::SubmodelFallback));
    assert_eq!(result.confidence, 0.85);
    let vehicle = result.primary.unwrap().vehicle;
    assert_eq!(vehicle.sub_model_name.as_deref(), Some("XLT"));
    assert_eq!(vehicle.base_vehicle_id, 102);
}

/// VIN position 10 = 'L' decodes to 2020 and retries the exact key.
#[test]
fn test_vin_decode_scenario() {
    let engine = engine();
    let query = VehicleQuery {
        make: Some("Ford".to_string()),
        model: Some("F-150".to_string()),
        vin: Some("1FTFW1E50LFA00000".to_string()),
        ..VehicleQuery::default()
    };
    let result = engine.match_vehicle(&query);
    assert!(result.matched);
    assert_eq!(result.method, Some(VehicleMatchMethod::VinDecodeStandard));
    assert_eq!(result.confidence, 0.75);
    let vehicle = result.primary.unwrap().vehicle;
    assert_eq!(vehicle.year, 2020);
    assert_eq!(vehicle.base_vehicle_id, 102);
}

/// A year far outside coverage fails deterministically with
/// YEAR_NOT_SUPPORTED.
#[test]
fn test_year_not_supported_scenario() {
    let engine = engine();
    let result = engine.match_vehicle(&VehicleQuery::mmy("Ford", "F-150", 1990));
    assert!(!result.matched);
    assert_eq!(
        result.failure_reason,
        Some(VehicleFailureReason::YearNotSupported)
    );
    assert!(result
        .failure_details
        .as_deref()
        .unwrap_or_default()
        .contains("2018-2022"));
}

/// An explicit sub-model refines the resolved configuration without
/// changing the method or confidence.
#[test]
fn test_explicit_submodel_refines_match() {
    let engine = engine();
    let query = VehicleQuery {
        sub_model: Some("XLT".to_string()),
        ..VehicleQuery::mmy("Ford", "F-150", 2020)
    };
    let result = engine.match_vehicle(&query);
    assert!(result.matched);
    assert_eq!(result.method, Some(VehicleMatchMethod::Exact));
    assert_eq!(result.confidence, 0.98);
    let vehicle = result.primary.unwrap().vehicle;
    assert_eq!(vehicle.sub_model_name.as_deref(), Some("XLT"));
    assert_eq!(vehicle.vehicle_id, 1000);
}

/// The matched vehicle is enriched with the first engine configuration of
/// its resolved vehicle id.
#[test]
fn test_configuration_enrichment() {
    let engine = engine();
    let result = engine.match_vehicle(&VehicleQuery::mmy("Ford", "F-150", 2020));
    let vehicle = result.primary.unwrap().vehicle;
    assert_eq!(vehicle.vehicle_id, 1000);
    let engine_config = vehicle.engine.expect("engine bundle attached");
    assert_eq!(engine_config["cylinders"], serde_json::json!(6));
}

/// Failure taxonomy is complete over malformed and uncovered inputs.
#[test]
fn test_failure_coverage() {
    let engine = engine();
    let cases: Vec<(VehicleQuery, VehicleFailureReason)> = vec![
        (VehicleQuery::default(), VehicleFailureReason::NoInputData),
        (
            VehicleQuery {
                model: Some("F-150".to_string()),
                year: Some(2020),
                ..VehicleQuery::default()
            },
            VehicleFailureReason::MissingMake,
        ),
        (
            VehicleQuery {
                make: Some("Ford".to_string()),
                year: Some(2020),
                ..VehicleQuery::default()
            },
            VehicleFailureReason::MissingModel,
        ),
        (
            VehicleQuery {
                make: Some("Ford".to_string()),
                model: Some("F-150".to_string()),
                ..VehicleQuery::default()
            },
            VehicleFailureReason::MissingYear,
        ),
        (
            VehicleQuery::mmy("Ford", "F-150", 1776),
            VehicleFailureReason::InvalidYear,
        ),
        (
            VehicleQuery::mmy("Packard", "Clipper", 2020),
            VehicleFailureReason::MakeNotInAutocare,
        ),
        (
            VehicleQuery::mmy("Ford", "Quasar900", 2020),
            VehicleFailureReason::ModelNotInAutocare,
        ),
    ];

    for (query, expected) in cases {
        let result = engine.match_vehicle(&query);
        assert!(!result.matched);
        assert_eq!(
            result.failure_reason,
            Some(expected),
            "wrong reason for {:?}",
            query
        );
    }
}

/// A malformed VIN with no year and no catalog match reports
/// VIN_DECODE_FAILED.
#[test]
fn test_vin_decode_failed() {
    let engine = engine();
    let query = VehicleQuery {
        make: Some("Ford".to_string()),
        model: Some("Quasar900".to_string()),
        vin: Some("NOT A REAL VIN".to_string()),
        ..VehicleQuery::default()
    };
    let result = engine.match_vehicle(&query);
    assert!(!result.matched);
    assert_eq!(
        result.failure_reason,
        Some(VehicleFailureReason::VinDecodeFailed)
    );
}

/// A failed VIN decode on a known (make, model) still matches through the
/// no-year fallback, anchored at the latest catalog year.
#[test]
fn test_vin_failure_falls_back_to_no_year() {
    let engine = engine();
    let query = VehicleQuery {
        make: Some("Ford".to_string()),
        model: Some("F-150".to_string()),
        vin: Some("NOT A REAL VIN".to_string()),
        ..VehicleQuery::default()
    };
    let result = engine.match_vehicle(&query);
    assert!(result.matched);
    assert_eq!(result.method, Some(VehicleMatchMethod::FuzzyNoYear));
    assert_eq!(result.confidence, 0.50);
    assert_eq!(result.primary.unwrap().vehicle.year, 2022);
}

/// Fuzzy similarity rescues a misspelled model.
#[test]
fn test_fuzzy_similarity() {
    let engine = engine();
    let result = engine.match_vehicle(&VehicleQuery::mmy("Toyota", "Camrey", 2020));
    assert!(result.matched, "expected fuzzy match: {:?}", result);
    assert_eq!(result.method, Some(VehicleMatchMethod::FuzzySimilarity));
    assert!(result.confidence >= 0.6);
    assert_eq!(result.primary.unwrap().vehicle.model_name, "Camry");
}

/// Attempted methods accumulate in ladder order.
#[test]
fn test_attempted_methods_populated() {
    let engine = engine();
    let result = engine.match_vehicle(&VehicleQuery::mmy("Ford", "F-150", 1990));
    let attempted = result.attempted_methods;
    assert!(attempted.contains(&"exact".to_string()));
    assert!(attempted.contains(&"year_tolerance".to_string()));
    assert!(attempted.contains(&"fuzzy_similarity".to_string()));
    let exact_pos = attempted.iter().position(|m| m == "exact").unwrap();
    let fuzzy_pos = attempted
        .iter()
        .position(|m| m == "fuzzy_similarity")
        .unwrap();
    assert!(exact_pos < fuzzy_pos);
}
