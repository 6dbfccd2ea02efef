//! Batch execution
//!
//! Runs the matcher over an ordered input list, producing an
//! insertion-ordered result map. Progress events fire on an item count or
//! a wall-clock interval, whichever comes first; a cancellation token is
//! checked between inputs and yields the partial map.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default progress cadence in items.
const PROGRESS_EVERY: usize = 5_000;
/// Cadence for very large batches.
const PROGRESS_EVERY_LARGE: usize = 20_000;
/// Batches above this size use the large cadence.
const LARGE_BATCH: usize = 1_000_000;
/// Wall-clock progress interval.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// Cooperative cancellation flag shared with the caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// One progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchProgress {
    pub run_id: Uuid,
    pub processed: usize,
    pub total: usize,
    pub percent: f64,
    pub items_per_sec: f64,
    pub eta_secs: f64,
}

/// Options for one batch run.
#[derive(Default)]
pub struct BatchOptions {
    pub cancellation: Option<CancellationToken>,
    pub on_progress: Option<Box<dyn Fn(&BatchProgress) + Send + Sync>>,
    /// Override the item cadence (testing hook).
    pub progress_every: Option<usize>,
}

/// Result of a batch run: the ordered result map plus whether the run was
/// cut short.
#[derive(Debug)]
pub struct BatchOutcome<R> {
    pub results: IndexMap<String, R>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

pub struct BatchRunner;

impl BatchRunner {
    /// Run `match_fn` over every `(id, input)` pair in order. The result
    /// map iterates in input order regardless of how matching is
    /// scheduled; per-record failures are values, never run failures.
    pub fn run<I, R, F>(inputs: Vec<(String, I)>, match_fn: F, options: &BatchOptions) -> BatchOutcome<R>
    where
        F: Fn(&I) -> R,
    {
        let run_id = Uuid::new_v4();
        let total = inputs.len();
        let progress_every = options.progress_every.unwrap_or(if total > LARGE_BATCH {
            PROGRESS_EVERY_LARGE
        } else {
            PROGRESS_EVERY
        });

        tracing::info!(%run_id, total, "batch run started");

        let started = Instant::now();
        let mut last_progress = started;
        let mut results = IndexMap::with_capacity(total);
        let mut cancelled = false;

        for (processed, (id, input)) in inputs.into_iter().enumerate() {
            if let Some(token) = &options.cancellation {
                if token.is_cancelled() {
                    cancelled = true;
                    tracing::warn!(%run_id, processed, total, "batch run cancelled");
                    break;
                }
            }

            let result = match_fn(&input);
            results.insert(id, result);

            let processed = processed + 1;
            let due_by_count = processed % progress_every == 0;
            let due_by_time = last_progress.elapsed() >= PROGRESS_INTERVAL;
            if (due_by_count || due_by_time) && processed < total {
                last_progress = Instant::now();
                let event = Self::progress(run_id, processed, total, started);
                tracing::info!(
                    %run_id,
                    processed,
                    total,
                    percent = format_args!("{:.1}", event.percent),
                    items_per_sec = format_args!("{:.0}", event.items_per_sec),
                    "batch progress"
                );
                if let Some(on_progress) = &options.on_progress {
                    on_progress(&event);
                }
            }
        }

        let elapsed = started.elapsed();
        if let Some(on_progress) = &options.on_progress {
            on_progress(&Self::progress(run_id, results.len(), total, started));
        }
        tracing::info!(
            %run_id,
            processed = results.len(),
            total,
            elapsed_ms = elapsed.as_millis() as u64,
            cancelled,
            "batch run finished"
        );

        BatchOutcome {
            results,
            cancelled,
            elapsed,
        }
    }

    fn progress(run_id: Uuid, processed: usize, total: usize, started: Instant) -> BatchProgress {
        let elapsed = started.elapsed().as_secs_f64();
        let items_per_sec = if elapsed > 0.0 {
            processed as f64 / elapsed
        } else {
            0.0
        };
        let remaining = total.saturating_sub(processed);
        BatchProgress {
            run_id,
            processed,
            total,
            percent: if total > 0 {
                processed as f64 * 100.0 / total as f64
            } else {
                100.0
            },
            items_per_sec,
            eta_secs: if items_per_sec > 0.0 {
                remaining as f64 / items_per_sec
            } else {
                0.0
            },
        }
    }
}
