//! End-to-end parts matching scenarios
//!
//! Exercises the full engine against a small but realistic PCdb fixture:
//! exact identity, mapping-table rewrites, the failure taxonomy, ranked
//! alternatives, and the arbitrary-input no-crash guarantee.

use autocat::catalog::pcdb::{AliasRecord, DescriptionRecord, PartRecord, PcdbRecords};
use autocat::catalog::vcdb::{BaseVehicleRecord, MakeRecord, ModelRecord, VcdbRecords};
use autocat::config::MatcherConfig;
use autocat::types::{PartFailureReason, PartMatchMethod, PartQuery};
use autocat::MatchingEngine;

fn fixture_pcdb() -> PcdbRecords {
    PcdbRecords {
        parts: vec![
            PartRecord {
                id: 1,
                name: "Engine Oil Filter".to_string(),
                description_id: Some(10),
            },
            PartRecord {
                id: 2,
                name: "Turbocharger Oil Filter".to_string(),
                description_id: None,
            },
            PartRecord {
                id: 3,
                name: "Fuel Filter".to_string(),
                description_id: None,
            },
            PartRecord {
                id: 4,
                name: "Air Filter".to_string(),
                description_id: None,
            },
            PartRecord {
                id: 5,
                name: "Disc Brake Pad".to_string(),
                description_id: None,
            },
            PartRecord {
                id: 6,
                name: "Alternator".to_string(),
                description_id: None,
            },
            PartRecord {
                id: 7,
                name: "Battery Cable".to_string(),
                description_id: None,
            },
            PartRecord {
                id: 8,
                name: "Hydraulic Filter".to_string(),
                description_id: None,
            },
        ],
        descriptions: vec![DescriptionRecord {
            id: 10,
            text: "Spin-on canister filter for engine lubrication oil".to_string(),
        }],
        aliases: vec![AliasRecord {
            part_id: 6,
            alias_id: 100,
            alias_name: "Generator Assembly".to_string(),
        }],
        ..PcdbRecords::default()
    }
}

fn fixture_vcdb() -> VcdbRecords {
    VcdbRecords {
        makes: vec![MakeRecord {
            id: 1,
            name: "Ford".to_string(),
        }],
        models: vec![ModelRecord {
            id: 11,
            name: "F-150".to_string(),
            vehicle_type_id: None,
        }],
        base_vehicles: vec![BaseVehicleRecord {
            id: 100,
            make_id: 1,
            model_id: 11,
            year_id: 2020,
        }],
        ..VcdbRecords::default()
    }
}

fn engine() -> MatchingEngine {
    MatchingEngine::from_records(fixture_pcdb(), fixture_vcdb(), MatcherConfig::default()).unwrap()
}

/// Every canonical part matches itself exactly with confidence 1.0.
#[test]
fn test_exact_identity_for_every_part() {
    let engine = engine();
    for record in fixture_pcdb().parts {
        let result = engine.match_part(&PartQuery::titled(record.name.clone()));
        assert!(result.matched, "{} did not match", record.name);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.method, Some(PartMatchMethod::Exact));
        assert_eq!(
            result.primary.unwrap().part.part_terminology_id,
            record.id,
            "{} resolved to the wrong part",
            record.name
        );
    }
}

/// "Oil Filter" rewrites through the mapping table at 0.95.
#[test]
fn test_mapping_table_scenario() {
    let engine = engine();
    let result = engine.match_part(&PartQuery::titled("Oil Filter"));
    assert!(result.matched);
    assert_eq!(result.method, Some(PartMatchMethod::ExactMapped));
    assert_eq!(result.confidence, 0.95);
    assert_eq!(result.primary.unwrap().part.part_terminology_id, 1);
}

/// "OIL FLTR" normalizes (FLTR -> FILTER) and then maps like scenario 1.
#[test]
fn test_abbreviation_then_mapping_scenario() {
    let engine = engine();
    let result = engine.match_part(&PartQuery::titled("OIL FLTR"));
    assert!(result.matched);
    assert_eq!(result.method, Some(PartMatchMethod::ExactMapped));
    assert_eq!(result.confidence, 0.95);
    assert_eq!(result.primary.unwrap().part.part_terminology_id, 1);
}

/// Synonym expansion reaches the exact index directly.
#[test]
fn test_abbreviation_exact() {
    let engine = engine();
    let result = engine.match_part(&PartQuery::titled("FILTER-HYD"));
    assert!(result.matched);
    assert_eq!(result.method, Some(PartMatchMethod::Exact));
    assert_eq!(result.primary.unwrap().part.part_terminology_id, 8);
}

/// Alias names resolve to their canonical part.
#[test]
fn test_alias_resolution() {
    let engine = engine();
    let result = engine.match_part(&PartQuery::titled("Generator Assembly"));
    assert!(result.matched);
    assert_eq!(result.primary.unwrap().part.part_terminology_id, 6);
}

/// Service lines short-circuit with SERVICE_ITEM.
#[test]
fn test_service_item_scenario() {
    let engine = engine();
    for service in ["labor", "Freight", "SHOP SUPPLIES", "core charge"] {
        let result = engine.match_part(&PartQuery::titled(service));
        assert!(!result.matched, "{} should not match", service);
        assert_eq!(
            result.failure_reason,
            Some(PartFailureReason::ServiceItem),
            "{} got wrong reason",
            service
        );
    }
}

/// Every non-match carries a typed failure reason.
#[test]
fn test_failure_coverage() {
    let engine = engine();
    let inputs = [
        "",
        "x",
        "part",
        "zzzyyqq widget",
        "labor",
        "unobtainium manifold",
    ];
    for input in inputs {
        let result = engine.match_part(&PartQuery::titled(input));
        if !result.matched {
            assert!(
                result.failure_reason.is_some(),
                "{:?} lacks a failure reason",
                input
            );
        }
    }
}

/// Alternatives never duplicate the primary or each other.
#[test]
fn test_alternative_distinctness() {
    let engine = engine();
    for input in ["Oil Filter", "Engine Filter", "filter engine oil"] {
        let result = engine.match_part(&PartQuery::titled(input));
        if !result.matched {
            continue;
        }
        let primary = result.primary.as_ref().unwrap();
        let mut seen = vec![(
            primary.part.part_terminology_id,
            primary.part.name.clone(),
        )];
        for alternative in &result.alternatives {
            let key = (
                alternative.part.part_terminology_id,
                alternative.part.name.clone(),
            );
            assert!(!seen.contains(&key), "duplicate candidate {:?}", key);
            assert!(alternative.is_alternative);
            seen.push(key);
        }
    }
}

/// Method-specific confidence ceilings hold for whatever matches.
#[test]
fn test_confidence_ceilings() {
    let engine = engine();
    let inputs = [
        "Engine Oil Filter",
        "Oil Filter",
        "Engine Filter",
        "filter engine oil",
        "battery cables",
    ];
    for input in inputs {
        let result = engine.match_part(&PartQuery::titled(input));
        if !result.matched {
            continue;
        }
        match result.method.unwrap() {
            PartMatchMethod::Exact => assert_eq!(result.confidence, 1.0),
            PartMatchMethod::ExactMapped => assert!(result.confidence <= 0.95),
            PartMatchMethod::Interchange => assert!(result.confidence <= 0.95),
            PartMatchMethod::Fuzzy => assert!(result.confidence <= 0.9),
            PartMatchMethod::Keyword => {
                assert!(result.confidence >= 0.6 && result.confidence <= 0.9)
            }
            PartMatchMethod::Attribute => {}
        }
    }
}

/// Arbitrary unicode inputs produce results without aborting.
#[test]
fn test_no_crash_on_arbitrary_input() {
    let engine = engine();
    fastrand::seed(42);

    let mut results = 0usize;
    for _ in 0..10_000 {
        let len = fastrand::usize(0..40);
        let input: String = (0..len)
            .map(|_| char::from_u32(fastrand::u32(1..0x10FFF)).unwrap_or('\u{FFFD}'))
            .collect();
        let result = engine.match_part(&PartQuery::titled(input));
        if !result.matched {
            assert!(result.failure_reason.is_some());
        }
        results += 1;
    }
    assert_eq!(results, 10_000);
}
