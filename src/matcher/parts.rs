//! Parts matcher
//!
//! Layered strategies over the parts index, stopping at the first
//! success: service short-circuit, vagueness check, exact key, mapping
//! table, interchange, fuzzy prefix shortlist, token recall. Failures are
//! typed; a panicking strategy demotes to `EXCEPTION_ERROR` without
//! aborting the batch.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::cache::MatchCache;
use crate::config::MatcherConfig;
use crate::index::PartsIndex;
use crate::normalize::{TextNormalizer, MIN_TOKEN_LEN};
use crate::types::{
    Part, PartCandidate, PartFailureReason, PartMatchMethod, PartMatchResult, PartQuery,
    PartTerminologyId,
};

/// Confidence assigned per strategy.
const CONFIDENCE_EXACT: f64 = 1.0;
const CONFIDENCE_MAPPED: f64 = 0.95;
const CONFIDENCE_INTERCHANGE: f64 = 0.92;
const CONFIDENCE_FUZZY_CEILING: f64 = 0.9;
const CONFIDENCE_KEYWORD_FLOOR: f64 = 0.6;
const CONFIDENCE_KEYWORD_CEILING: f64 = 0.9;

/// Fuzzy similarity below the threshold but above this floor is reported
/// as a near miss (`LOW_CONFIDENCE`) instead of a flat not-found.
const NEAR_MISS_FLOOR: f64 = 0.5;

const FUZZY_TOP_N: usize = 3;
const KEYWORD_TOP_N: usize = 5;

pub struct PartsMatcher {
    index: Arc<PartsIndex>,
    normalizer: TextNormalizer,
    config: MatcherConfig,
    cache: MatchCache<PartMatchResult>,
}

impl PartsMatcher {
    pub fn new(index: Arc<PartsIndex>, normalizer: TextNormalizer, config: MatcherConfig) -> Self {
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
        }
    }

    pub fn cache(&self) -> &MatchCache<PartMatchResult> {
        &self.cache
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Match one free-form parts input against the catalog.
    pub fn match_part(&self, query: &PartQuery) -> PartMatchResult {
        if query.is_empty() {
            return PartMatchResult::failure(
                query.clone(),
                PartFailureReason::MissingPartName,
                "no part name, description, or part number supplied",
                Vec::new(),
            );
        }

        let cache_key = self.cache_key(query);
        if let Some(mut cached) = self.cache.get(&cache_key) {
            cached.original_input = query.clone();
            return cached;
        }

        // attempted_methods survives a strategy panic so EXCEPTION_ERROR
        // results still report how far the ladder got.
        let attempted = Arc::new(Mutex::new(Vec::<String>::new()));
        let attempted_inner = Arc::clone(&attempted);
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.run_ladder(query, &attempted_inner)
        }));

        let result = match outcome {
            Ok(result) => result,
            Err(panic) => {
                let details = super::panic_message(&panic);
                tracing::error!(%details, "parts strategy panicked");
                PartMatchResult::failure(
                    query.clone(),
                    PartFailureReason::ExceptionError,
                    details,
                    attempted.lock().map(|a| a.clone()).unwrap_or_default(),
                )
            }
        };

        self.cache.put(cache_key, result.clone());
        result
    }

    fn cache_key(&self, query: &PartQuery) -> String {
        let title = non_blank(&query.title).map(|t| self.normalizer.normalize(t));
        let description = non_blank(&query.description).map(|d| self.normalizer.normalize(d));
        MatchCache::<PartMatchResult>::key(&format!(
            "{}|{}|{}|{}",
            title.unwrap_or_default(),
            description.unwrap_or_default(),
            query.shop_number.as_deref().unwrap_or(""),
            query.vendor_number.as_deref().unwrap_or("")
        ))
    }

    fn run_ladder(&self, query: &PartQuery, attempted: &Mutex<Vec<String>>) -> PartMatchResult {
        let mut near_miss: Option<(String, f64)> = None;

        // Title drives the ladder; description is only consulted when
        // every title strategy fails.
        let mut inputs: Vec<&str> = Vec::new();
        if let Some(title) = non_blank(&query.title) {
            inputs.push(title);
        }
        if let Some(description) = non_blank(&query.description) {
            if !inputs.contains(&description) {
                inputs.push(description);
            }
        }
        if inputs.is_empty() {
            if let Some(number) = non_blank(&query.shop_number).or(non_blank(&query.vendor_number))
            {
                inputs.push(number);
            }
        }

        let mut first_failure: Option<PartMatchResult> = None;

        for (pass, input) in inputs.iter().enumerate() {
            match self.match_text(query, input, pass == 0, attempted, &mut near_miss) {
                outcome if outcome.matched => {
                    let mut outcome = outcome;
                    outcome.attempted_methods = snapshot(attempted);
                    return outcome;
                }
                outcome => {
                    // Hard pre-check failures are not retried on the
                    // description field.
                    if matches!(
                        outcome.failure_reason,
                        Some(PartFailureReason::ServiceItem)
                    ) {
                        let mut outcome = outcome;
                        outcome.attempted_methods = snapshot(attempted);
                        return outcome;
                    }
                    first_failure.get_or_insert(outcome);
                }
            }
        }

        let mut failure = match (first_failure, near_miss) {
            (_, Some((best_name, best_score))) => PartMatchResult::failure(
                query.clone(),
                PartFailureReason::LowConfidence,
                format!(
                    "best fuzzy candidate {:?} scored {:.2}, below threshold {:.2}",
                    best_name, best_score, self.config.fuzzy_threshold
                ),
                Vec::new(),
            ),
            (Some(failure), None) => failure,
            (None, None) => PartMatchResult::failure(
                query.clone(),
                PartFailureReason::MissingPartName,
                "no usable part name in input",
                Vec::new(),
            ),
        };
        failure.attempted_methods = snapshot(attempted);
        failure
    }

    /// The per-text ladder: service check, vagueness, exact, mapping,
    /// interchange (first pass only), fuzzy, keyword.
    fn match_text(
        &self,
        query: &PartQuery,
        input: &str,
        first_pass: bool,
        attempted: &Mutex<Vec<String>>,
        near_miss: &mut Option<(String, f64)>,
    ) -> PartMatchResult {
        let normalized = self.normalizer.normalize(input);
        let key = normalized.replace(' ', "");

        if self.normalizer.is_service_item(&normalized) {
            return PartMatchResult::failure(
                query.clone(),
                PartFailureReason::ServiceItem,
                format!("{:?} is a service or fee line, not a part", input),
                Vec::new(),
            );
        }

        if key.len() <= 2 || self.normalizer.is_generic_term(&normalized) {
            return PartMatchResult::failure(
                query.clone(),
                PartFailureReason::VaguePartName,
                format!("{:?} is too generic to identify a part", input),
                Vec::new(),
            );
        }

        push_attempt(attempted, "exact");
        if let Some(part) = self.index.exact(&key) {
            return self.success(query, part, &[], PartMatchMethod::Exact, CONFIDENCE_EXACT);
        }

        push_attempt(attempted, "exact_mapped");
        if let Some(targets) = self.index.mapping_targets(&normalized) {
            let hits: Vec<&Part> = targets
                .iter()
                .filter_map(|target| self.index.exact(&self.normalizer.normalize_part_key(target)))
                .collect();
            if let Some((primary, alternatives)) = hits.split_first() {
                return self.success(
                    query,
                    primary,
                    alternatives,
                    PartMatchMethod::ExactMapped,
                    CONFIDENCE_MAPPED,
                );
            }
        }

        if first_pass && (query.shop_number.is_some() || query.vendor_number.is_some()) {
            push_attempt(attempted, "interchange");
            if let Some(result) = self.try_interchange(query) {
                return result;
            }
        }

        if self.config.enable_fuzzy {
            push_attempt(attempted, "fuzzy");
            if let Some(result) = self.try_fuzzy(query, &normalized, &key, near_miss) {
                return result;
            }
        }

        push_attempt(attempted, "keyword");
        if let Some(result) = self.try_keyword(query, input) {
            return result;
        }

        let specific = normalized
            .split_whitespace()
            .any(|token| token.len() >= MIN_TOKEN_LEN + 1);
        if specific {
            PartMatchResult::failure(
                query.clone(),
                PartFailureReason::PartNotInAutocare,
                format!("no catalog entry resembles {:?}", input),
                Vec::new(),
            )
        } else {
            PartMatchResult::failure(
                query.clone(),
                PartFailureReason::VaguePartName,
                format!("{:?} is too generic to identify a part", input),
                Vec::new(),
            )
        }
    }

    fn try_interchange(&self, query: &PartQuery) -> Option<PartMatchResult> {
        let numbers = [&query.shop_number, &query.vendor_number];
        for number in numbers.into_iter().flatten() {
            let ids = self.index.interchange_lookup(number);
            let parts: Vec<&Part> = ids.iter().filter_map(|id| self.index.part(*id)).collect();
            if let Some((primary, alternatives)) = parts.split_first() {
                return Some(self.success(
                    query,
                    primary,
                    alternatives,
                    PartMatchMethod::Interchange,
                    CONFIDENCE_INTERCHANGE,
                ));
            }
        }
        None
    }

    fn try_fuzzy(
        &self,
        query: &PartQuery,
        normalized: &str,
        key: &str,
        near_miss: &mut Option<(String, f64)>,
    ) -> Option<PartMatchResult> {
        let candidate_ids = self.index.prefix_candidates(key);
        let mut scored: Vec<(f64, PartTerminologyId)> = Vec::new();
        let mut best_below: Option<(String, f64)> = None;

        for id in candidate_ids
            .iter()
            .take(self.config.max_fuzzy_candidates_per_batch)
        {
            let Some(candidate_name) = self.index.normalized_name(*id) else {
                continue;
            };
            let similarity = self.normalizer.similarity(normalized, candidate_name);
            if similarity >= self.config.fuzzy_threshold {
                scored.push((similarity, *id));
            } else if similarity >= NEAR_MISS_FLOOR {
                match &best_below {
                    Some((_, best)) if *best >= similarity => {}
                    _ => best_below = Some((candidate_name.to_string(), similarity)),
                }
            }
        }

        if scored.is_empty() {
            if let Some((name, score)) = best_below {
                match near_miss {
                    Some((_, best)) if *best >= score => {}
                    _ => *near_miss = Some((name, score)),
                }
            }
            return None;
        }

        // Higher similarity, then shorter canonical name, then smaller id.
        scored.sort_by(|(sim_a, id_a), (sim_b, id_b)| {
            sim_b
                .partial_cmp(sim_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let len_a = self.index.part(*id_a).map_or(usize::MAX, |p| p.name.len());
                    let len_b = self.index.part(*id_b).map_or(usize::MAX, |p| p.name.len());
                    len_a.cmp(&len_b)
                })
                .then_with(|| id_a.cmp(id_b))
        });
        scored.truncate(FUZZY_TOP_N);

        let ranked: Vec<(f64, &Part)> = scored
            .iter()
            .filter_map(|(score, id)| self.index.part(*id).map(|part| (*score, part)))
            .collect();
        let confidence = ranked.first()?.0.min(CONFIDENCE_FUZZY_CEILING);
        Some(self.ranked_success(query, &ranked, PartMatchMethod::Fuzzy, confidence))
    }

    fn try_keyword(&self, query: &PartQuery, input: &str) -> Option<PartMatchResult> {
        let tokens = self.normalizer.tokenize(input, MIN_TOKEN_LEN);
        if tokens.is_empty() {
            return None;
        }

        let mut match_counts: std::collections::HashMap<PartTerminologyId, usize> =
            std::collections::HashMap::new();
        for token in &tokens {
            let mut seen: std::collections::HashSet<PartTerminologyId> =
                std::collections::HashSet::new();
            for expansion in self.normalizer.expand_token(token) {
                for id in self.index.token_lookup(&expansion) {
                    // Each input token counts once per candidate.
                    if seen.insert(*id) {
                        *match_counts.entry(*id).or_insert(0) += 1;
                    }
                }
            }
        }

        let mut scored: Vec<(f64, PartTerminologyId)> = match_counts
            .into_iter()
            .map(|(id, count)| (count as f64 / tokens.len() as f64, id))
            .filter(|(score, _)| *score >= self.config.description_threshold)
            .collect();
        if scored.is_empty() {
            return None;
        }

        scored.sort_by(|(score_a, id_a), (score_b, id_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let len_a = self.index.part(*id_a).map_or(usize::MAX, |p| p.name.len());
                    let len_b = self.index.part(*id_b).map_or(usize::MAX, |p| p.name.len());
                    len_a.cmp(&len_b)
                })
                .then_with(|| id_a.cmp(id_b))
        });
        scored.truncate(KEYWORD_TOP_N);

        let ranked: Vec<(f64, &Part)> = scored
            .iter()
            .filter_map(|(score, id)| self.index.part(*id).map(|part| (*score, part)))
            .collect();
        let confidence = ranked
            .first()?
            .0
            .clamp(CONFIDENCE_KEYWORD_FLOOR, CONFIDENCE_KEYWORD_CEILING);
        Some(self.ranked_success(query, &ranked, PartMatchMethod::Keyword, confidence))
    }

    fn success(
        &self,
        query: &PartQuery,
        primary: &Part,
        alternatives: &[&Part],
        method: PartMatchMethod,
        confidence: f64,
    ) -> PartMatchResult {
        let primary_candidate = PartCandidate {
            part: primary.clone(),
            is_alternative: false,
            score: None,
        };
        let alternatives = dedup_alternatives(
            primary,
            alternatives.iter().map(|part| (*part, None)),
            self.config.max_alternatives_part,
        );
        PartMatchResult {
            matched: true,
            primary: Some(primary_candidate),
            alternatives,
            method: Some(method),
            confidence,
            attempted_methods: Vec::new(),
            failure_reason: None,
            failure_details: None,
            original_input: query.clone(),
        }
    }

    fn ranked_success(
        &self,
        query: &PartQuery,
        ranked: &[(f64, &Part)],
        method: PartMatchMethod,
        confidence: f64,
    ) -> PartMatchResult {
        let (primary_score, primary_part) = ranked[0];
        let primary = PartCandidate {
            part: primary_part.clone(),
            is_alternative: false,
            score: Some(primary_score),
        };
        let alternatives = dedup_alternatives(
            primary_part,
            ranked[1..].iter().map(|(score, part)| (*part, Some(*score))),
            self.config.max_alternatives_part,
        );
        PartMatchResult {
            matched: true,
            primary: Some(primary),
            alternatives,
            method: Some(method),
            confidence,
            attempted_methods: Vec::new(),
            failure_reason: None,
            failure_details: None,
            original_input: query.clone(),
        }
    }
}

/// Alternatives deduplicated by `(part_id, name)`, never containing the
/// primary, capped at `limit`.
fn dedup_alternatives<'a>(
    primary: &Part,
    candidates: impl Iterator<Item = (&'a Part, Option<f64>)>,
    limit: usize,
) -> Vec<PartCandidate> {
    let mut seen: std::collections::HashSet<(PartTerminologyId, &str)> =
        std::collections::HashSet::new();
    seen.insert((primary.part_terminology_id, primary.name.as_str()));

    let mut out = Vec::new();
    for (part, score) in candidates {
        if out.len() >= limit {
            break;
        }
        if seen.insert((part.part_terminology_id, part.name.as_str())) {
            out.push(PartCandidate {
                part: part.clone(),
                is_alternative: true,
                score,
            });
        }
    }
    out
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
