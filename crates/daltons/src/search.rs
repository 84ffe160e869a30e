//! Optimal width selection.
//!
//! The exact search scores every admissible candidate and keeps the one with the lowest
//! distance; ties go to the lowest candidate mask (see [`crate::candidates`]). Parallel runs
//! split the mask range into fixed chunks and reduce `(distance, mask)` lexicographically, so
//! they return the same set as a sequential run.

use crate::candidates::CandidateUniverse;
use crate::cluster;
use crate::config::EngineConfig;
use crate::distance::{demand_descending, distance_descending};
use crate::error::{Error, Result};
use crate::model::{CandidateSet, DemandHistogram};
use rayon::prelude::*;
use serde::Serialize;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Masks scanned between two cancellation/deadline checks.
const CHECK_INTERVAL: u64 = 4096;
/// Masks per parallel work item.
const CHUNK_MASKS: u64 = CHECK_INTERVAL * 4;

/// Receives `(evaluated, total)` candidate counts while a search runs.
///
/// Parallel searches call it from worker threads; reports may arrive slightly out of order.
pub trait ProgressObserver: Sync {
    fn on_progress(&self, evaluated: u64, total: u64);
}

impl<F> ProgressObserver for F
where
    F: Fn(u64, u64) + Sync,
{
    fn on_progress(&self, evaluated: u64, total: u64) {
        self(evaluated, total)
    }
}

/// Cooperative cancellation flag shared between a caller and a running search.
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

/// Optional hooks for a long-running search. The default value runs to completion silently.
#[derive(Clone, Copy, Default)]
pub struct SearchControl<'a> {
    pub cancellation: Option<&'a CancellationToken>,
    pub deadline: Option<Instant>,
    pub progress: Option<&'a dyn ProgressObserver>,
}

impl<'a> SearchControl<'a> {
    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_progress(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.progress = Some(observer);
        self
    }

    fn check(&self) -> Result<()> {
        if self.cancellation.is_some_and(CancellationToken::is_cancelled) {
            return Err(Error::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Error::DeadlineExceeded);
        }
        Ok(())
    }

    fn report(&self, evaluated: u64, total: u64) {
        if let Some(observer) = self.progress {
            observer.on_progress(evaluated, total);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    /// No more distinct widths than requested: all of them are returned.
    AllWidths,
    Exhaustive,
    Clustering,
}

/// Widths to put in a `srcset`, narrowest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub widths: Vec<u32>,
    /// Wasted pixels of `widths` against the histogram it was computed from.
    pub distance: u64,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub candidate: CandidateSet,
    pub distance: u64,
    /// Enumeration index of the winner.
    pub mask: u64,
    /// Candidates scored.
    pub evaluated: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Best {
    distance: u64,
    mask: u64,
}

fn better(a: Option<Best>, b: Option<Best>) -> Option<Best> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if (b.distance, b.mask) < (a.distance, a.mask) {
            b
        } else {
            a
        }),
        (a, None) => a,
        (None, b) => b,
    }
}

struct Scan<'a> {
    universe: &'a CandidateUniverse,
    demand: &'a [(u32, u64)],
    max_extra: u32,
    total: u64,
    evaluated: &'a AtomicU64,
    control: &'a SearchControl<'a>,
}

impl Scan<'_> {
    fn run(&self, masks: Range<u64>) -> Result<Option<Best>> {
        let mut best: Option<Best> = None;
        let mut buf = Vec::with_capacity(self.max_extra as usize + 1);
        let mut pending: u64 = 0;

        for mask in masks.clone() {
            if (mask - masks.start) % CHECK_INTERVAL == 0 {
                self.control.check()?;
                self.flush(&mut pending);
            }
            if mask.count_ones() > self.max_extra {
                continue;
            }
            self.universe.fill(mask, &mut buf);
            let distance = distance_descending(self.demand, &buf);
            pending += 1;
            if best.is_none_or(|b| distance < b.distance) {
                best = Some(Best { distance, mask });
            }
        }
        self.flush(&mut pending);
        Ok(best)
    }

    fn flush(&self, pending: &mut u64) {
        if *pending == 0 {
            return;
        }
        let done = self.evaluated.fetch_add(*pending, Ordering::Relaxed) + *pending;
        *pending = 0;
        self.control.report(done, self.total);
    }
}

/// Scores every admissible candidate of `histogram` and returns the best one.
pub fn exhaustive_search(
    histogram: &DemandHistogram,
    config: &EngineConfig,
    control: &SearchControl<'_>,
) -> Result<SearchOutcome> {
    config.validate()?;
    let universe = CandidateUniverse::from_histogram(histogram).ok_or(Error::EmptyDataset {
        reason: "the demand histogram is empty",
    })?;
    if universe.rest().len() > config.exhaustive_search_limit {
        return Err(Error::SearchSpaceTooLarge {
            candidate_widths: universe.rest().len(),
            limit: config.exhaustive_search_limit,
        });
    }

    let demand = demand_descending(histogram);
    let total = universe.admissible_count(config.widths_number);
    let evaluated = AtomicU64::new(0);
    let scan = Scan {
        universe: &universe,
        demand: &demand,
        max_extra: config.widths_number.saturating_sub(1).min(64) as u32,
        total,
        evaluated: &evaluated,
        control,
    };
    let end = universe.mask_end();

    tracing::debug!(
        candidate_widths = universe.rest().len(),
        candidates = total,
        parallel = config.parallel,
        "starting exhaustive width search"
    );

    let best = if config.parallel && end > CHUNK_MASKS {
        let chunks = end.div_ceil(CHUNK_MASKS);
        (0..chunks)
            .into_par_iter()
            .map(|c| {
                let start = c * CHUNK_MASKS;
                scan.run(start..(start + CHUNK_MASKS).min(end))
            })
            .try_reduce(|| None, |a, b| Ok(better(a, b)))?
    } else {
        scan.run(0..end)?
    };

    // Mask 0 (the anchor alone) is always admissible, so an uncancelled scan has a winner.
    let best = best.ok_or(Error::EmptyDataset {
        reason: "no admissible candidate",
    })?;
    Ok(SearchOutcome {
        candidate: universe.candidate(best.mask),
        distance: best.distance,
        mask: best.mask,
        evaluated: evaluated.load(Ordering::Relaxed),
    })
}

/// Picks at most `widthsNumber` widths for `histogram`.
///
/// - When the histogram has no more distinct widths than requested they are all returned.
/// - Otherwise the exact search runs; if it exceeds `exhaustiveSearchLimit`, the clustering
///   approximation is used when `approximateOnOverflow` is set, else
///   [`Error::SearchSpaceTooLarge`] is returned.
pub fn optimize(
    histogram: &DemandHistogram,
    config: &EngineConfig,
    control: &SearchControl<'_>,
) -> Result<Recommendation> {
    config.validate()?;
    if histogram.is_empty() {
        return Err(Error::EmptyDataset {
            reason: "the demand histogram is empty",
        });
    }

    if histogram.len() <= config.widths_number {
        tracing::info!(
            widths = histogram.len(),
            "no more distinct widths than requested, keeping them all"
        );
        return Ok(Recommendation {
            widths: histogram.widths().collect(),
            distance: 0,
            strategy: Strategy::AllWidths,
        });
    }

    match exhaustive_search(histogram, config, control) {
        Ok(outcome) => {
            tracing::info!(
                distance = outcome.distance,
                evaluated = outcome.evaluated,
                "exhaustive search finished"
            );
            Ok(Recommendation {
                widths: outcome.candidate.to_ascending(),
                distance: outcome.distance,
                strategy: Strategy::Exhaustive,
            })
        }
        Err(Error::SearchSpaceTooLarge {
            candidate_widths,
            limit,
        }) if config.approximate_on_overflow => {
            tracing::warn!(
                candidate_widths,
                limit,
                "search space too large, falling back to k-means approximation"
            );
            cluster::approximate(histogram, config)
        }
        Err(err) => Err(err),
    }
}
