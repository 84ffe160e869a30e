//! Wasted-pixel distance between a candidate set and the demand histogram.
//!
//! Each demanded width `w` is served by the narrowest candidate `c >= w`; serving it costs
//! `(c - w) * views`. Images are never served narrower than their box, so only oversize
//! delivery is charged.

use crate::model::{CandidateSet, DemandHistogram};

/// Histogram entries widest first, the layout the evaluator walks.
pub(crate) fn demand_descending(histogram: &DemandHistogram) -> Vec<(u32, u64)> {
    histogram.iter().rev().collect()
}

/// Total wasted pixels, or `None` when some demanded width is wider than every candidate.
pub fn distance(histogram: &DemandHistogram, candidate: &CandidateSet) -> Option<u64> {
    let widest = candidate.widest()?;
    if histogram.anchor().is_some_and(|anchor| anchor > widest) {
        return None;
    }
    Some(distance_descending(
        &demand_descending(histogram),
        candidate.as_descending(),
    ))
}

/// Both slices sorted widest first; `candidate[0]` must cover `demand[0]`.
pub(crate) fn distance_descending(demand: &[(u32, u64)], candidate: &[u32]) -> u64 {
    debug_assert!(
        demand
            .first()
            .is_none_or(|&(w, _)| candidate.first().is_some_and(|&c| c >= w))
    );
    let mut j = 0;
    let mut total: u64 = 0;
    for &(width, views) in demand {
        while j + 1 < candidate.len() && candidate[j + 1] >= width {
            j += 1;
        }
        let waste = u64::from(candidate[j] - width);
        total = total.saturating_add(waste.saturating_mul(views));
    }
    total
}
