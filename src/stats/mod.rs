//! Matching statistics
//!
//! Additive counters recorded per result, safe under concurrent callers,
//! exported on demand as a `MatchingReport` with per-reason breakdowns,
//! confidence histograms, and rule-based recommendations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;
use crate::types::{PartMatchResult, VehicleMatchResult};

/// Failure-detail samples kept per reason.
const MAX_SAMPLES_PER_REASON: usize = 100;

/// Reasons listed in the report's top-failure section.
const TOP_FAILURES: usize = 5;

/// Confidence histogram bucket labels, low to high.
const BUCKET_LABELS: [&str; 4] = ["<0.5", "0.5-0.7", "0.7-0.9", ">=0.9"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchCategory {
    Part,
    Vehicle,
}

impl MatchCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Part => "part",
            Self::Vehicle => "vehicle",
        }
    }
}

#[derive(Default)]
struct CategoryTotals {
    total: AtomicU64,
    matched: AtomicU64,
    confidence_sum_matched: Mutex<f64>,
    buckets: [AtomicU64; 4],
}

impl CategoryTotals {
    fn record(&self, matched: bool, confidence: f64) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if matched {
            self.matched.fetch_add(1, Ordering::Relaxed);
            if let Ok(mut sum) = self.confidence_sum_matched.lock() {
                *sum += confidence;
            }
        }
        self.buckets[bucket_index(confidence)].fetch_add(1, Ordering::Relaxed);
    }

    fn clear(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.matched.store(0, Ordering::Relaxed);
        if let Ok(mut sum) = self.confidence_sum_matched.lock() {
            *sum = 0.0;
        }
        for bucket in &self.buckets {
            bucket.store(0, Ordering::Relaxed);
        }
    }
}

fn bucket_index(confidence: f64) -> usize {
    if confidence >= 0.9 {
        3
    } else if confidence >= 0.7 {
        2
    } else if confidence >= 0.5 {
        1
    } else {
        0
    }
}

/// Thread-safe collector. One per engine; grows monotonically until
/// `clear` is called.
#[derive(Default)]
pub struct StatisticsCollector {
    parts: CategoryTotals,
    vehicles: CategoryTotals,
    /// `category:REASON` -> count
    failure_counts: DashMap<String, u64>,
    /// `category:REASON` -> bounded detail samples
    failure_samples: DashMap<String, Vec<String>>,
    /// `category:method` -> count of ladder attempts
    attempted_methods: DashMap<String, u64>,
}

impl StatisticsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_part(&self, result: &PartMatchResult) {
        self.parts.record(result.matched, result.confidence);
        self.record_common(
            MatchCategory::Part,
            result.failure_reason.map(|r| r.as_str()),
            result.failure_details.as_deref(),
            &result.attempted_methods,
        );
    }

    pub fn record_vehicle(&self, result: &VehicleMatchResult) {
        self.vehicles.record(result.matched, result.confidence);
        self.record_common(
            MatchCategory::Vehicle,
            result.failure_reason.map(|r| r.as_str()),
            result.failure_details.as_deref(),
            &result.attempted_methods,
        );
    }

    fn record_common(
        &self,
        category: MatchCategory,
        failure_reason: Option<&str>,
        failure_details: Option<&str>,
        attempted: &[String],
    ) {
        if let Some(reason) = failure_reason {
            let key = format!("{}:{}", category.as_str(), reason);
            *self.failure_counts.entry(key.clone()).or_insert(0) += 1;
            if let Some(details) = failure_details {
                let mut samples = self.failure_samples.entry(key).or_default();
                if samples.len() < MAX_SAMPLES_PER_REASON {
                    samples.push(details.to_string());
                }
            }
        }
        for method in attempted {
            let key = format!("{}:{}", category.as_str(), method);
            *self.attempted_methods.entry(key).or_insert(0) += 1;
        }
    }

    pub fn clear(&self) {
        self.parts.clear();
        self.vehicles.clear();
        self.failure_counts.clear();
        self.failure_samples.clear();
        self.attempted_methods.clear();
    }

    /// Snapshot of everything recorded so far.
    pub fn report(&self, parts_cache: CacheStats, vehicle_cache: CacheStats) -> MatchingReport {
        let parts = self.category_report(MatchCategory::Part, &self.parts);
        let vehicles = self.category_report(MatchCategory::Vehicle, &self.vehicles);

        let mut attempted: Vec<MethodTally> = self
            .attempted_methods
            .iter()
            .map(|entry| MethodTally {
                method: entry.key().clone(),
                count: *entry.value(),
            })
            .collect();
        attempted.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.method.cmp(&b.method)));

        let recommendations = self.recommendations(&parts, &vehicles);

        MatchingReport {
            parts,
            vehicles,
            attempted_methods: attempted,
            parts_cache,
            vehicle_cache,
            recommendations,
        }
    }

    fn category_report(&self, category: MatchCategory, totals: &CategoryTotals) -> CategoryReport {
        let total = totals.total.load(Ordering::Relaxed);
        let matched = totals.matched.load(Ordering::Relaxed);
        let confidence_sum = totals
            .confidence_sum_matched
            .lock()
            .map(|sum| *sum)
            .unwrap_or(0.0);

        let prefix = format!("{}:", category.as_str());
        let mut failures: Vec<FailureBreakdown> = self
            .failure_counts
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .map(|entry| {
                let reason = entry.key()[prefix.len()..].to_string();
                let count = *entry.value();
                let samples = self
                    .failure_samples
                    .get(entry.key())
                    .map(|samples| samples.clone())
                    .unwrap_or_default();
                FailureBreakdown {
                    reason,
                    count,
                    percentage: if total > 0 {
                        count as f64 * 100.0 / total as f64
                    } else {
                        0.0
                    },
                    samples,
                }
            })
            .collect();
        failures.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.reason.cmp(&b.reason)));

        let top_failures = failures
            .iter()
            .take(TOP_FAILURES)
            .map(|f| f.reason.clone())
            .collect();

        let histogram = BUCKET_LABELS
            .iter()
            .zip(totals.buckets.iter())
            .map(|(label, count)| ((*label).to_string(), count.load(Ordering::Relaxed)))
            .collect();

        CategoryReport {
            total,
            matched,
            success_rate: if total > 0 {
                matched as f64 / total as f64
            } else {
                0.0
            },
            average_confidence_matched: if matched > 0 {
                confidence_sum / matched as f64
            } else {
                0.0
            },
            confidence_histogram: histogram,
            failures,
            top_failures,
        }
    }

    /// Rule-based improvement advice keyed off each category's dominant
    /// failure reason.
    fn recommendations(&self, parts: &CategoryReport, vehicles: &CategoryReport) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(dominant) = parts.failures.first() {
            if let Some(advice) = part_advice(&dominant.reason) {
                out.push(format!(
                    "parts: {} ({} of {} inputs failed with {})",
                    advice, dominant.count, parts.total, dominant.reason
                ));
            }
        }
        if let Some(dominant) = vehicles.failures.first() {
            if let Some(advice) = vehicle_advice(&dominant.reason) {
                out.push(format!(
                    "vehicles: {} ({} of {} inputs failed with {})",
                    advice, dominant.count, vehicles.total, dominant.reason
                ));
            }
        }
        out
    }
}

fn part_advice(reason: &str) -> Option<&'static str> {
    match reason {
        "FUZZY_MATCH_FAILED" | "LOW_CONFIDENCE" => {
            Some("expand the synonym table; near misses dominate the failures")
        }
        "VAGUE_PART_NAME" => Some("ask shops for more specific line descriptions"),
        "PART_NOT_IN_AUTOCARE" => Some("review catalog coverage for the failing part families"),
        "SERVICE_ITEM" => Some("filter service and fee lines upstream of matching"),
        "MISSING_PART_NAME" | "NO_INPUT_DATA" => Some("require a part name at intake"),
        "KEYWORD_SEARCH_FAILED" => Some("index more descriptive text for token recall"),
        _ => None,
    }
}

fn vehicle_advice(reason: &str) -> Option<&'static str> {
    match reason {
        "MISSING_MAKE" | "MISSING_MODEL" | "MISSING_YEAR" => {
            Some("require make, model, and year at intake")
        }
        "YEAR_NOT_SUPPORTED" => Some("refresh the VCdb extract to cover the failing model years"),
        "MODEL_NOT_IN_AUTOCARE" => Some("add model aliases for the failing fleet"),
        "MAKE_NOT_IN_AUTOCARE" => Some("verify make spellings against the VCdb make list"),
        "VIN_DECODE_FAILED" => Some("validate VINs at intake before submission"),
        "INVALID_YEAR" => Some("reject implausible years at intake"),
        _ => None,
    }
}

/// One category's share of the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryReport {
    pub total: u64,
    pub matched: u64,
    pub success_rate: f64,
    pub average_confidence_matched: f64,
    /// bucket label -> count
    pub confidence_histogram: Vec<(String, u64)>,
    pub failures: Vec<FailureBreakdown>,
    pub top_failures: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureBreakdown {
    pub reason: String,
    pub count: u64,
    pub percentage: f64,
    /// Bounded rolling samples of failure details
    pub samples: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodTally {
    pub method: String,
    pub count: u64,
}

/// The exported statistics snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingReport {
    pub parts: CategoryReport,
    pub vehicles: CategoryReport,
    pub attempted_methods: Vec<MethodTally>,
    pub parts_cache: CacheStats,
    pub vehicle_cache: CacheStats,
    pub recommendations: Vec<String>,
}
