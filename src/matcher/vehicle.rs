//! Vehicle matcher
//!
//! Layered strategies over the vehicle index with a fixed confidence
//! ladder: exact three-segment key, model format variants, year
//! tolerance, sub-model fallback, VIN year decode, fuzzy no-year, and
//! fuzzy make/model similarity. Pre-checks reject missing or invalid
//! fields before any strategy runs.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use chrono::Datelike;

use crate::cache::MatchCache;
use crate::config::MatcherConfig;
use crate::index::VehicleIndex;
use crate::matcher::vin::{self, VinDecoder};
use crate::normalize::TextNormalizer;
use crate::types::{
    Vehicle, VehicleCandidate, VehicleFailureReason, VehicleMatchMethod, VehicleMatchResult,
    VehicleQuery,
};

const CONFIDENCE_EXACT: f64 = 0.98;
const CONFIDENCE_FORMAT_VARIANT: f64 = 0.96;
const CONFIDENCE_MODEL_DASH: f64 = 0.95;
const CONFIDENCE_SUBMODEL: f64 = 0.85;
const CONFIDENCE_VIN_STANDARD: f64 = 0.75;
const CONFIDENCE_VIN_SUBMODEL: f64 = 0.70;
const CONFIDENCE_NO_YEAR: f64 = 0.50;
/// Floor of the year-tolerance ladder.
const CONFIDENCE_YEAR_FLOOR: f64 = 0.3;
/// Minimum score a fuzzy-similarity candidate must reach.
const MIN_FUZZY_VEHICLE_CONFIDENCE: f64 = 0.6;
/// Model segments below this similarity are unrelated, not typos. Without
/// it an exact make and an in-range year alone clear the 0.6 score floor.
const MIN_MODEL_SEGMENT_SIMILARITY: f64 = 0.25;
/// Two similarity candidates whose scores differ by less than this are an
/// exact tie and cannot be broken honestly.
const SCORE_TIE_EPSILON: f64 = 1e-9;

/// Accepted input year window.
const MIN_YEAR: i32 = 1900;

pub struct VehicleMatcher {
    index: Arc<VehicleIndex>,
    normalizer: TextNormalizer,
    config: MatcherConfig,
    cache: MatchCache<VehicleMatchResult>,
    vin_decoder: Arc<dyn VinDecoder>,
}

impl VehicleMatcher {
    pub fn new(
        index: Arc<VehicleIndex>,
        normalizer: TextNormalizer,
        config: MatcherConfig,
        vin_decoder: Arc<dyn VinDecoder>,
    ) -> Self {
        let cache = if config.enable_cache {
            MatchCache::new(config.cache_size)
        } else {
            MatchCache::disabled()
        };
        Self {
            index,
            normalizer,
            config,
            cache,
            vin_decoder,
        }
    }

    pub fn cache(&self) -> &MatchCache<VehicleMatchResult> {
        &self.cache
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Match one vehicle identification against the catalog.
    pub fn match_vehicle(&self, query: &VehicleQuery) -> VehicleMatchResult {
        if query.is_empty() {
            return VehicleMatchResult::failure(
                query.clone(),
                VehicleFailureReason::NoInputData,
                "no vehicle fields supplied",
                Vec::new(),
            );
        }

        let cache_key = self.cache_key(query);
        if let Some(mut cached) = self.cache.get(&cache_key) {
            cached.original_input = query.clone();
            return cached;
        }

        let attempted = Arc::new(Mutex::new(Vec::<String>::new()));
        let attempted_inner = Arc::clone(&attempted);
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.run_ladder(query, &attempted_inner)
        }));

        let result = match outcome {
            Ok(result) => result,
            Err(panic) => {
                let details = super::panic_message(&panic);
                tracing::error!(%details, "vehicle strategy panicked");
                VehicleMatchResult::failure(
                    query.clone(),
                    VehicleFailureReason::ExceptionError,
                    details,
                    attempted.lock().map(|a| a.clone()).unwrap_or_default(),
                )
            }
        };

        self.cache.put(cache_key, result.clone());
        result
    }

    fn cache_key(&self, query: &VehicleQuery) -> String {
        MatchCache::<VehicleMatchResult>::key(&format!(
            "{}|{}|{}|{}|{}",
            query
                .make
                .as_deref()
                .map(|m| self.normalizer.normalize_vehicle_segment(m))
                .unwrap_or_default(),
            query
                .model
                .as_deref()
                .map(|m| self.normalizer.normalize_vehicle_segment(m))
                .unwrap_or_default(),
            query.year.map(|y| y.to_string()).unwrap_or_default(),
            query
                .sub_model
                .as_deref()
                .map(|s| self.normalizer.normalize_vehicle_segment(s))
                .unwrap_or_default(),
            query.vin.as_deref().unwrap_or_default(),
        ))
    }

    fn run_ladder(&self, query: &VehicleQuery, attempted: &Mutex<Vec<String>>) -> VehicleMatchResult {
        // VIN decode can backfill a missing year (and, with an external
        // decoder, make/model) before the pre-checks reject the input.
        let mut make = non_blank(&query.make).map(str::to_string);
        let mut model = non_blank(&query.model).map(str::to_string);
        let mut year = query.year;
        let mut year_from_vin = false;
        let mut vin_failure: Option<String> = None;

        let needs_vin = make.is_none() || model.is_none() || year.is_none();
        if needs_vin {
            if let Some(vin_raw) = non_blank(&query.vin) {
                push_attempt(attempted, "vin_decode");
                if vin::is_valid_vin(vin_raw) {
                    match self.vin_decoder.decode(vin_raw) {
                        Ok(decoded) => {
                            if year.is_none() {
                                year = decoded.year;
                                year_from_vin = year.is_some();
                                if year.is_none() {
                                    vin_failure =
                                        Some("VIN year code not decodable".to_string());
                                }
                            }
                            if make.is_none() {
                                make = decoded.make;
                            }
                            if model.is_none() {
                                model = decoded.model;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, "VIN decoder failed");
                            vin_failure = Some(e.to_string());
                        }
                    }
                } else {
                    vin_failure = Some(format!("malformed VIN: {:?}", vin_raw));
                }
            }
        }

        // Pre-checks: missing fields fail hard, no fallback.
        let Some(make) = make else {
            return VehicleMatchResult::failure(
                query.clone(),
                VehicleFailureReason::MissingMake,
                "make not supplied",
                snapshot(attempted),
            );
        };
        let Some(model) = model else {
            return VehicleMatchResult::failure(
                query.clone(),
                VehicleFailureReason::MissingModel,
                "model not supplied",
                snapshot(attempted),
            );
        };
        if year.is_none() && vin_failure.is_none() {
            return VehicleMatchResult::failure(
                query.clone(),
                VehicleFailureReason::MissingYear,
                "year not supplied and no VIN to decode",
                snapshot(attempted),
            );
        }

        let max_year = chrono::Utc::now().year() + 2;
        if let Some(year) = year {
            if !(MIN_YEAR..=max_year).contains(&year) {
                return VehicleMatchResult::failure(
                    query.clone(),
                    VehicleFailureReason::InvalidYear,
                    format!("year {} outside [{}, {}]", year, MIN_YEAR, max_year),
                    snapshot(attempted),
                );
            }
        }

        let make_seg = self.normalizer.normalize_vehicle_segment(&make);
        let model_seg = self.normalizer.normalize_vehicle_segment(&model);

        let result = if let Some(year) = year {
            if year_from_vin {
                self.match_with_vin_year(query, &make_seg, &model_seg, year, attempted)
            } else {
                self.match_with_year(query, &make_seg, &model_seg, year, attempted)
            }
        } else {
            // VIN was provided but did not decode; continue year-less.
            self.match_without_year(query, &make_seg, &model_seg, attempted)
        };

        // A strategy can also settle the outcome with a typed failure
        // (ambiguous tie); only an empty ladder falls through to the
        // coverage classification.
        match result {
            Some(mut result) => {
                result.attempted_methods = snapshot(attempted);
                result
            }
            None => self.build_failure(query, &make_seg, &model_seg, year, vin_failure, attempted),
        }
    }

    /// Full ladder when the caller supplied a usable year.
    fn match_with_year(
        &self,
        query: &VehicleQuery,
        make_seg: &str,
        model_seg: &str,
        year: i32,
        attempted: &Mutex<Vec<String>>,
    ) -> Option<VehicleMatchResult> {
        push_attempt(attempted, "exact");
        if let Some(vehicle) = self.index.lookup_key3(make_seg, model_seg, year) {
            return Some(self.success(
                query,
                vehicle.clone(),
                Vec::new(),
                VehicleMatchMethod::Exact,
                CONFIDENCE_EXACT,
            ));
        }

        push_attempt(attempted, "format_variant");
        if let Some(result) = self.try_format_variants(query, make_seg, model_seg, year) {
            return Some(result);
        }

        push_attempt(attempted, "year_tolerance");
        if let Some(result) = self.try_year_tolerance(query, make_seg, model_seg, year) {
            return Some(result);
        }

        push_attempt(attempted, "submodel_fallback");
        if let Some(result) = self.try_submodel(
            query,
            make_seg,
            model_seg,
            year,
            VehicleMatchMethod::SubmodelFallback,
            CONFIDENCE_SUBMODEL,
        ) {
            return Some(result);
        }

        push_attempt(attempted, "fuzzy_similarity");
        self.try_fuzzy_similarity(query, make_seg, model_seg, Some(year))
    }

    /// Restricted retry ladder once the year came from the VIN: exact and
    /// sub-model only, with VIN confidences.
    fn match_with_vin_year(
        &self,
        query: &VehicleQuery,
        make_seg: &str,
        model_seg: &str,
        year: i32,
        attempted: &Mutex<Vec<String>>,
    ) -> Option<VehicleMatchResult> {
        push_attempt(attempted, "vin_decode_standard");
        if let Some(vehicle) = self.index.lookup_key3(make_seg, model_seg, year) {
            return Some(self.success(
                query,
                vehicle.clone(),
                Vec::new(),
                VehicleMatchMethod::VinDecodeStandard,
                CONFIDENCE_VIN_STANDARD,
            ));
        }

        push_attempt(attempted, "vin_decode_submodel");
        if let Some(result) = self.try_submodel(
            query,
            make_seg,
            model_seg,
            year,
            VehicleMatchMethod::VinDecodeSubmodel,
            CONFIDENCE_VIN_SUBMODEL,
        ) {
            return Some(result);
        }

        // Fall through to the year-less strategies.
        self.match_without_year(query, make_seg, model_seg, attempted)
    }

    /// Year-less fallbacks: latest catalog year for the pair, then fuzzy
    /// similarity with a flat year score.
    fn match_without_year(
        &self,
        query: &VehicleQuery,
        make_seg: &str,
        model_seg: &str,
        attempted: &Mutex<Vec<String>>,
    ) -> Option<VehicleMatchResult> {
        push_attempt(attempted, "fuzzy_no_year");
        if let Some(years) = self.index.years_for(make_seg, model_seg) {
            if let Some(latest) = years.iter().next_back() {
                if let Some(vehicle) = self.index.lookup_key3(make_seg, model_seg, *latest) {
                    return Some(self.success(
                        query,
                        vehicle.clone(),
                        Vec::new(),
                        VehicleMatchMethod::FuzzyNoYear,
                        CONFIDENCE_NO_YEAR,
                    ));
                }
            }
        }

        push_attempt(attempted, "fuzzy_similarity");
        self.try_fuzzy_similarity(query, make_seg, model_seg, None)
    }

    fn try_format_variants(
        &self,
        query: &VehicleQuery,
        make_seg: &str,
        model_seg: &str,
        year: i32,
    ) -> Option<VehicleMatchResult> {
        // Hyphen-insensitive variant key handles both F-150 -> F150 and
        // F150 -> F-150.
        let model_no_dash = model_seg.replace('-', "");
        if let Some(vehicle) = self.index.lookup_variant(make_seg, &model_no_dash, year) {
            return Some(self.success(
                query,
                vehicle.clone(),
                Vec::new(),
                VehicleMatchMethod::FormatVariant,
                CONFIDENCE_FORMAT_VARIANT,
            ));
        }

        // Input had a dash the catalog lacks.
        if model_no_dash != model_seg {
            if let Some(vehicle) = self.index.lookup_key3(make_seg, &model_no_dash, year) {
                return Some(self.success(
                    query,
                    vehicle.clone(),
                    Vec::new(),
                    VehicleMatchMethod::ModelNoDash,
                    CONFIDENCE_MODEL_DASH,
                ));
            }
        }

        // Insert a dash at the first letter->digit boundary (F150 ->
        // F-150).
        if let Some(dashed) = insert_dash(model_seg) {
            if let Some(vehicle) = self.index.lookup_key3(make_seg, &dashed, year) {
                return Some(self.success(
                    query,
                    vehicle.clone(),
                    Vec::new(),
                    VehicleMatchMethod::ModelInsertDash,
                    CONFIDENCE_MODEL_DASH,
                ));
            }
        }

        // Trailing "series" noise ("E Series" -> "E").
        if let Some(stripped) = model_seg.strip_suffix("series") {
            let stripped = stripped.trim_end_matches('-');
            if !stripped.is_empty() {
                if let Some(vehicle) = self.index.lookup_key3(make_seg, stripped, year) {
                    return Some(self.success(
                        query,
                        vehicle.clone(),
                        Vec::new(),
                        VehicleMatchMethod::FormatVariant,
                        CONFIDENCE_FORMAT_VARIANT,
                    ));
                }
            }
        }

        None
    }

    fn try_year_tolerance(
        &self,
        query: &VehicleQuery,
        make_seg: &str,
        model_seg: &str,
        year: i32,
    ) -> Option<VehicleMatchResult> {
        for offset in 1..=self.config.year_range_tolerance as i32 {
            for signed in [offset, -offset] {
                let candidate_year = year + signed;
                let vehicle = self
                    .index
                    .lookup_key3(make_seg, model_seg, candidate_year)
                    .or_else(|| {
                        self.index.lookup_variant(
                            make_seg,
                            &model_seg.replace('-', ""),
                            candidate_year,
                        )
                    });
                if let Some(vehicle) = vehicle {
                    let confidence =
                        (0.8 - 0.05 * offset as f64).max(CONFIDENCE_YEAR_FLOOR);
                    return Some(self.success(
                        query,
                        vehicle.clone(),
                        Vec::new(),
                        VehicleMatchMethod::YearOffset(signed),
                        confidence,
                    ));
                }
            }
        }
        None
    }

    /// Interpret the caller's model field as a sub-model.
    fn try_submodel(
        &self,
        query: &VehicleQuery,
        make_seg: &str,
        model_seg: &str,
        year: i32,
        method: VehicleMatchMethod,
        confidence: f64,
    ) -> Option<VehicleMatchResult> {
        let vehicles = self.index.submodel_lookup(make_seg, model_seg, year);
        let (primary, rest) = vehicles.split_first()?;
        let alternatives: Vec<Vehicle> = rest.iter().map(|v| (*v).clone()).collect();
        Some(self.success(query, (*primary).clone(), alternatives, method, confidence))
    }

    /// Per-segment similarity scan for misspelled makes and models.
    ///
    /// A pair whose segments both equal the input exactly is skipped: if it
    /// were matchable at this year, an earlier rung would have returned it,
    /// so reaching here means the year itself is unsupported and must be
    /// reported as such. An exact score tie between distinct pairs settles
    /// the outcome as `AMBIGUOUS_MATCH`.
    fn try_fuzzy_similarity(
        &self,
        query: &VehicleQuery,
        make_seg: &str,
        model_seg: &str,
        year: Option<i32>,
    ) -> Option<VehicleMatchResult> {
        let mut scored: Vec<(f64, i32, &(String, String))> = Vec::new();

        for (pair, years) in self.index.make_model_pairs() {
            let (candidate_make, candidate_model) = pair;
            if candidate_make == make_seg && candidate_model == model_seg {
                continue;
            }

            let make_sim = self.normalizer.similarity(make_seg, candidate_make);
            if make_sim < self.config.fuzzy_threshold {
                continue;
            }
            let model_sim = self.normalizer.similarity(model_seg, candidate_model);
            if model_sim < MIN_MODEL_SEGMENT_SIMILARITY {
                continue;
            }

            let (year_score, anchor_year) = match year {
                Some(year) => {
                    let nearest = years
                        .iter()
                        .min_by_key(|y| (**y - year).abs())
                        .copied()
                        .unwrap_or(year);
                    let distance = (nearest - year).abs();
                    let score = if distance == 0 {
                        1.0
                    } else if distance <= 2 {
                        0.8
                    } else if distance <= 5 {
                        0.5
                    } else {
                        0.2
                    };
                    (score, nearest)
                }
                None => (
                    0.2,
                    years.iter().next_back().copied().unwrap_or(MIN_YEAR),
                ),
            };

            let score = 0.4 * make_sim + 0.4 * model_sim + 0.2 * year_score;
            // Strictly above the floor: an exact make with a garbage model
            // bottoms out at exactly 0.6 and must not pass.
            if score > MIN_FUZZY_VEHICLE_CONFIDENCE {
                scored.push((score, anchor_year, pair));
            }
        }

        if scored.is_empty() {
            return None;
        }

        scored.sort_by(|(score_a, year_a, pair_a), (score_b, year_b, pair_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| year_b.cmp(year_a))
                .then_with(|| pair_a.cmp(pair_b))
        });

        // Distinct pairs tying at the top score cannot be ranked honestly;
        // report the ambiguity instead of silently picking one.
        if scored.len() >= 2 && (scored[0].0 - scored[1].0).abs() < SCORE_TIE_EPSILON {
            let first = scored[0].2;
            let second = scored[1].2;
            return Some(VehicleMatchResult::failure(
                query.clone(),
                VehicleFailureReason::AmbiguousMatch,
                format!(
                    "candidates {}|{} and {}|{} tie at score {:.3}",
                    first.0, first.1, second.0, second.1, scored[0].0
                ),
                Vec::new(),
            ));
        }

        let (top_score, top_year, top_pair) = &scored[0];
        let primary = self
            .index
            .lookup_key3(&top_pair.0, &top_pair.1, *top_year)?
            .clone();

        let mut alternatives = Vec::new();
        for (_, alt_year, alt_pair) in scored.iter().skip(1) {
            if let Some(vehicle) = self.index.lookup_key3(&alt_pair.0, &alt_pair.1, *alt_year) {
                alternatives.push(vehicle.clone());
            }
        }

        Some(self.success(
            query,
            primary,
            alternatives,
            VehicleMatchMethod::FuzzySimilarity,
            *top_score,
        ))
    }

    fn success(
        &self,
        query: &VehicleQuery,
        mut primary: Vehicle,
        alternatives: Vec<Vehicle>,
        method: VehicleMatchMethod,
        confidence: f64,
    ) -> VehicleMatchResult {
        // An explicitly supplied sub-model refines the resolved
        // configuration without changing method or confidence.
        if primary.sub_model_name.is_none() {
            if let Some(sub_model) = non_blank(&query.sub_model) {
                let make_seg = self.normalizer.normalize_vehicle_segment(&primary.make_name);
                let sub_seg = self.normalizer.normalize_vehicle_segment(sub_model);
                let refined = self
                    .index
                    .submodel_lookup(&make_seg, &sub_seg, primary.year)
                    .into_iter()
                    .find(|v| v.base_vehicle_id == primary.base_vehicle_id);
                if let Some(refined) = refined {
                    primary = refined.clone();
                }
            }
        }

        // Best-effort configuration enrichment; never changes the match.
        self.index.enrich(&mut primary);

        let mut seen = std::collections::HashSet::new();
        seen.insert((
            primary.base_vehicle_id,
            primary.vehicle_id,
            primary.sub_model_id,
        ));

        let mut deduped = Vec::new();
        for vehicle in alternatives {
            if deduped.len() >= self.config.max_alternatives_vehicle {
                break;
            }
            if seen.insert((
                vehicle.base_vehicle_id,
                vehicle.vehicle_id,
                vehicle.sub_model_id,
            )) {
                deduped.push(VehicleCandidate {
                    vehicle,
                    is_alternative: true,
                });
            }
        }

        VehicleMatchResult {
            matched: true,
            primary: Some(VehicleCandidate {
                vehicle: primary,
                is_alternative: false,
            }),
            alternatives: deduped,
            method: Some(method),
            confidence,
            attempted_methods: Vec::new(),
            failure_reason: None,
            failure_details: None,
            original_input: query.clone(),
        }
    }

    /// Deterministic failure classification when every strategy came up
    /// empty.
    fn build_failure(
        &self,
        query: &VehicleQuery,
        make_seg: &str,
        model_seg: &str,
        year: Option<i32>,
        vin_failure: Option<String>,
        attempted: &Mutex<Vec<String>>,
    ) -> VehicleMatchResult {
        let attempted = snapshot(attempted);

        // A failed VIN decode with no fallback year is the blocking
        // problem regardless of catalog coverage.
        if let (Some(vin_error), None) = (&vin_failure, year) {
            return VehicleMatchResult::failure(
                query.clone(),
                VehicleFailureReason::VinDecodeFailed,
                vin_error.clone(),
                attempted,
            );
        }

        if self.index.make(make_seg).is_none() {
            return VehicleMatchResult::failure(
                query.clone(),
                VehicleFailureReason::MakeNotInAutocare,
                format!("make {:?} not in catalog", make_seg),
                attempted,
            );
        }

        let model_known = !self.index.models_named(model_seg).is_empty()
            || self.index.years_for(make_seg, model_seg).is_some();
        if !model_known {
            return VehicleMatchResult::failure(
                query.clone(),
                VehicleFailureReason::ModelNotInAutocare,
                format!("model {:?} not in catalog for make {:?}", model_seg, make_seg),
                attempted,
            );
        }

        if let (Some(year), Some(years)) = (year, self.index.years_for(make_seg, model_seg)) {
            if !years.contains(&year) {
                let supported = years
                    .iter()
                    .next()
                    .zip(years.iter().next_back())
                    .map(|(first, last)| format!("{}-{}", first, last))
                    .unwrap_or_default();
                return VehicleMatchResult::failure(
                    query.clone(),
                    VehicleFailureReason::YearNotSupported,
                    format!("year {} outside supported range {}", year, supported),
                    attempted,
                );
            }
        }

        VehicleMatchResult::failure(
            query.clone(),
            VehicleFailureReason::VehicleNotInAutocare,
            format!(
                "no catalog vehicle for {:?} {:?} {:?}",
                make_seg, model_seg, year
            ),
            attempted,
        )
    }
}

/// Insert a hyphen at the first letter->digit boundary.
fn insert_dash(segment: &str) -> Option<String> {
    let chars: Vec<char> = segment.chars().collect();
    for i in 1..chars.len() {
        if chars[i - 1].is_ascii_alphabetic() && chars[i].is_ascii_digit() {
            let mut out: String = chars[..i].iter().collect();
            out.push('-');
            out.extend(&chars[i..]);
            return Some(out);
        }
    }
    None
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn push_attempt(attempted: &Mutex<Vec<String>>, method: &str) {
    if let Ok(mut attempted) = attempted.lock() {
        if attempted.last().map(String::as_str) != Some(method) {
            attempted.push(method.to_string());
        }
    }
}

fn snapshot(attempted: &Mutex<Vec<String>>) -> Vec<String> {
    attempted.lock().map(|a| a.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::vcdb::{
        BaseVehicleRecord, MakeRecord, ModelRecord, SubModelRecord, VcdbRecords, VehicleRecord,
    };
    use crate::catalog::VehicleCatalog;
    use crate::matcher::vin::TableVinDecoder;

    fn sample_matcher() -> VehicleMatcher {
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
        base_vehicles.push(BaseVehicleRecord {
            id: 300,
            make_id: 2,
            model_id: 21,
            year_id: 2020,
        });

        let records = VcdbRecords {
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
                    vehicle_type_id: None,
                },
                ModelRecord {
                    id: 12,
                    name: "Escape".to_string(),
                    vehicle_type_id: None,
                },
                ModelRecord {
                    id: 21,
                    name: "Camry".to_string(),
                    vehicle_type_id: None,
                },
            ],
            years: vec![],
            base_vehicles,
            vehicles: vec![VehicleRecord {
                id: 1000,
                base_vehicle_id: 102, // 2020 F-150
                submodel_id: Some(7),
            }],
            submodels: vec![SubModelRecord {
                id: 7,
                name: "King Ranch".to_string(),
            }],
            configs: std::collections::HashMap::new(),
        };
        let normalizer = TextNormalizer::new();
        let index = Arc::new(VehicleIndex::build(
            VehicleCatalog::from_records(records),
            &normalizer,
        ));
        VehicleMatcher::new(
            index,
            normalizer,
            MatcherConfig::default(),
            Arc::new(TableVinDecoder),
        )
    }

    #[test]
    fn test_exact_match() {
        let matcher = sample_matcher();
        let result = matcher.match_vehicle(&VehicleQuery::mmy("Ford", "F-150", 2020));
        assert!(result.matched);
        assert_eq!(result.method, Some(VehicleMatchMethod::Exact));
        assert_eq!(result.confidence, 0.98);
        assert_eq!(
            result.primary.as_ref().unwrap().vehicle.base_vehicle_id,
            102
        );
    }

    #[test]
    fn test_format_variant_no_dash_input() {
        let matcher = sample_matcher();
        let result = matcher.match_vehicle(&VehicleQuery::mmy("Ford", "F150", 2020));
        assert!(result.matched);
        assert!(matches!(
            result.method,
            Some(VehicleMatchMethod::FormatVariant) | Some(VehicleMatchMethod::ModelInsertDash)
        ));
        assert!(result.confidence >= 0.95 && result.confidence <= 0.96);
    }

    #[test]
    fn test_year_tolerance() {
        let matcher = sample_matcher();
        // Catalog covers 2018-2022; 2023 is one year out.
        let result = matcher.match_vehicle(&VehicleQuery::mmy("Ford", "F-150", 2023));
        assert!(result.matched);
        assert_eq!(result.method, Some(VehicleMatchMethod::YearOffset(-1)));
        assert!((result.confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_submodel_fallback() {
        let matcher = sample_matcher();
        let result = matcher.match_vehicle(&VehicleQuery::mmy("Ford", "King Ranch", 2020));
        assert!(result.matched);
        assert_eq!(result.method, Some(VehicleMatchMethod::SubmodelFallback));
        assert_eq!(result.confidence, 0.85);
        let primary = result.primary.as_ref().unwrap();
        assert_eq!(primary.vehicle.sub_model_name.as_deref(), Some("King Ranch"));
    }

    #[test]
    fn test_vin_year_decode() {
        let matcher = sample_matcher();
        let query = VehicleQuery {
            make: Some("Ford".to_string()),
            model: Some("F-150".to_string()),
            vin: Some("1FTFW1E50LFA00000".to_string()), // position 10 = L -> 2020
            ..VehicleQuery::default()
        };
        let result = matcher.match_vehicle(&query);
        assert!(result.matched);
        assert_eq!(result.method, Some(VehicleMatchMethod::VinDecodeStandard));
        assert_eq!(result.confidence, 0.75);
        assert_eq!(result.primary.as_ref().unwrap().vehicle.year, 2020);
    }

    #[test]
    fn test_missing_fields() {
        let matcher = sample_matcher();

        let result = matcher.match_vehicle(&VehicleQuery {
            model: Some("F-150".to_string()),
            year: Some(2020),
            ..VehicleQuery::default()
        });
        assert_eq!(result.failure_reason, Some(VehicleFailureReason::MissingMake));

        let result = matcher.match_vehicle(&VehicleQuery {
            make: Some("Ford".to_string()),
            year: Some(2020),
            ..VehicleQuery::default()
        });
        assert_eq!(result.failure_reason, Some(VehicleFailureReason::MissingModel));

        let result = matcher.match_vehicle(&VehicleQuery {
            make: Some("Ford".to_string()),
            model: Some("F-150".to_string()),
            ..VehicleQuery::default()
        });
        assert_eq!(result.failure_reason, Some(VehicleFailureReason::MissingYear));
    }

    #[test]
    fn test_invalid_year() {
        let matcher = sample_matcher();
        let result = matcher.match_vehicle(&VehicleQuery::mmy("Ford", "F-150", 1850));
        assert_eq!(result.failure_reason, Some(VehicleFailureReason::InvalidYear));
    }

    #[test]
    fn test_year_not_supported() {
        let matcher = sample_matcher();
        // Valid year, known make/model, but far outside the 2018-2022
        // coverage and beyond tolerance.
        let result = matcher.match_vehicle(&VehicleQuery::mmy("Ford", "F-150", 1990));
        assert!(!result.matched);
        assert_eq!(
            result.failure_reason,
            Some(VehicleFailureReason::YearNotSupported)
        );
    }

    #[test]
    fn test_make_not_in_catalog() {
        let matcher = sample_matcher();
        let result = matcher.match_vehicle(&VehicleQuery::mmy("Zastava", "750", 2020));
        assert_eq!(
            result.failure_reason,
            Some(VehicleFailureReason::MakeNotInAutocare)
        );
    }

    #[test]
    fn test_model_not_in_catalog() {
        let matcher = sample_matcher();
        let result = matcher.match_vehicle(&VehicleQuery::mmy("Ford", "Zephyr9000", 2020));
        assert_eq!(
            result.failure_reason,
            Some(VehicleFailureReason::ModelNotInAutocare)
        );
    }

    #[test]
    fn test_fuzzy_similarity_typo_model() {
        let matcher = sample_matcher();
        // "Escpae" is a typo for "Escape"; make matches exactly.
        let result = matcher.match_vehicle(&VehicleQuery::mmy("Ford", "Escpae", 2020));
        assert!(result.matched, "expected fuzzy match: {:?}", result);
        assert_eq!(result.method, Some(VehicleMatchMethod::FuzzySimilarity));
        assert!(result.confidence >= 0.6);
        assert_eq!(
            result.primary.as_ref().unwrap().vehicle.model_name,
            "Escape"
        );
    }

    #[test]
    fn test_no_input() {
        let matcher = sample_matcher();
        let result = matcher.match_vehicle(&VehicleQuery::default());
        assert_eq!(result.failure_reason, Some(VehicleFailureReason::NoInputData));
    }

    #[test]
    fn test_ambiguous_tie_reported() {
        // "Sierra 1500" and "Sierra 2500" are symmetrically similar to
        // "Sierra 3500": same make, same year coverage, bitwise-equal
        // scores. Neither can honestly outrank the other.
        let records = VcdbRecords {
            makes: vec![MakeRecord {
                id: 3,
                name: "GMC".to_string(),
            }],
            models: vec![
                ModelRecord {
                    id: 31,
                    name: "Sierra 1500".to_string(),
                    vehicle_type_id: None,
                },
                ModelRecord {
                    id: 32,
                    name: "Sierra 2500".to_string(),
                    vehicle_type_id: None,
                },
            ],
            years: vec![],
            base_vehicles: vec![
                BaseVehicleRecord {
                    id: 400,
                    make_id: 3,
                    model_id: 31,
                    year_id: 2020,
                },
                BaseVehicleRecord {
                    id: 401,
                    make_id: 3,
                    model_id: 32,
                    year_id: 2020,
                },
            ],
            vehicles: vec![],
            submodels: vec![],
            configs: std::collections::HashMap::new(),
        };
        let normalizer = TextNormalizer::new();
        let index = Arc::new(VehicleIndex::build(
            VehicleCatalog::from_records(records),
            &normalizer,
        ));
        let matcher = VehicleMatcher::new(
            index,
            normalizer,
            MatcherConfig::default(),
            Arc::new(TableVinDecoder),
        );

        let result = matcher.match_vehicle(&VehicleQuery::mmy("GMC", "Sierra 3500", 2020));
        assert!(!result.matched);
        assert_eq!(
            result.failure_reason,
            Some(VehicleFailureReason::AmbiguousMatch)
        );
        let details = result.failure_details.unwrap();
        assert!(details.contains("sierra1500") && details.contains("sierra2500"));
    }

    #[test]
    fn test_alternatives_deduplicated() {
        let matcher = sample_matcher();
        let result = matcher.match_vehicle(&VehicleQuery::mmy("Ford", "King Ranch", 2020));
        let primary = result.primary.as_ref().unwrap();
        for alternative in &result.alternatives {
            assert!(alternative.is_alternative);
            assert_ne!(
                (
                    alternative.vehicle.base_vehicle_id,
                    alternative.vehicle.vehicle_id,
                    alternative.vehicle.sub_model_id
                ),
                (
                    primary.vehicle.base_vehicle_id,
                    primary.vehicle.vehicle_id,
                    primary.vehicle.sub_model_id
                )
            );
        }
        assert!(result.alternatives.len() <= 3);
    }
}
