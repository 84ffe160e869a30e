//! Weighted k-means approximation for histograms too large for the exact search.
//!
//! Each histogram entry is a 1-D point (`width`) weighted by its views. Centroids are seeded
//! with weighted k-means++ and refined with Lloyd iterations, then snapped to the nearest
//! observed width so no synthetic width is ever recommended.
//!
//! k-means minimizes squared distance to the centroids, not the one-sided wasted-pixel distance
//! of [`crate::distance`]: the result is a heuristic, not a minimizer of that cost.

use crate::config::EngineConfig;
use crate::distance;
use crate::error::{Error, Result};
use crate::model::{CandidateSet, DemandHistogram};
use crate::search::{Recommendation, Strategy};

/// Lloyd iterations stop once no centroid moves further than this (in pixels).
const CONVERGENCE_EPSILON: f64 = 1e-9;

pub fn approximate(histogram: &DemandHistogram, config: &EngineConfig) -> Result<Recommendation> {
    config.validate()?;
    let Some(anchor) = histogram.anchor() else {
        return Err(Error::EmptyDataset {
            reason: "the demand histogram is empty",
        });
    };

    let points: Vec<(f64, f64)> = histogram
        .iter()
        .map(|(w, n)| (f64::from(w), n as f64))
        .collect();
    let k = config.widths_number.min(points.len());
    let centroids = weighted_kmeans(
        &points,
        k,
        config.kmeans_max_iterations,
        config.random_seed,
    );

    let observed: Vec<u32> = histogram.widths().collect();
    let mut widths: Vec<u32> = centroids.iter().map(|&c| snap(&observed, c)).collect();
    widths.sort_unstable();
    widths.dedup();

    // The widest cluster's centroid usually sits below the anchor; without the anchor the widest
    // demand would have no candidate to be served from.
    if widths.last() != Some(&anchor) {
        if widths.len() >= config.widths_number {
            widths.pop();
        }
        widths.push(anchor);
    }

    let candidate = CandidateSet::new(widths.iter().copied());
    let distance = distance::distance(histogram, &candidate).ok_or(Error::EmptyDataset {
        reason: "the demand histogram is empty",
    })?;

    tracing::info!(
        clusters = k,
        widths = widths.len(),
        distance,
        "k-means approximation finished"
    );

    Ok(Recommendation {
        widths,
        distance,
        strategy: Strategy::Clustering,
    })
}

/// Nearest width of `observed` (ascending) to `value`; ties go to the wider width.
fn snap(observed: &[u32], value: f64) -> u32 {
    let idx = observed.partition_point(|&w| f64::from(w) < value);
    match (idx.checked_sub(1).map(|i| observed[i]), observed.get(idx)) {
        (Some(below), Some(&above)) => {
            if value - f64::from(below) < f64::from(above) - value {
                below
            } else {
                above
            }
        }
        (Some(below), None) => below,
        (None, Some(&above)) => above,
        (None, None) => 0,
    }
}

/// Weighted 1-D k-means over `(value, weight)` points. Returns at most `k` centroids (fewer
/// when there are fewer distinct points than clusters).
pub fn weighted_kmeans(
    points: &[(f64, f64)],
    k: usize,
    max_iterations: usize,
    seed: u64,
) -> Vec<f64> {
    if points.is_empty() || k == 0 {
        return Vec::new();
    }

    // All-zero weights would make every sampling step degenerate; fall back to unit weights.
    let uniform = points.iter().all(|&(_, w)| w <= 0.0);
    let weight = |i: usize| if uniform { 1.0 } else { points[i].1.max(0.0) };

    let mut rng = XorShift64Star::new(seed);
    let mut centroids = seed_plus_plus(points, k, &weight, &mut rng);

    let mut sums = vec![0.0; centroids.len()];
    let mut weights = vec![0.0; centroids.len()];
    for _ in 0..max_iterations {
        sums.iter_mut().for_each(|s| *s = 0.0);
        weights.iter_mut().for_each(|w| *w = 0.0);

        for (i, &(x, _)) in points.iter().enumerate() {
            let c = nearest(&centroids, x);
            let w = weight(i);
            sums[c] += x * w;
            weights[c] += w;
        }

        let mut max_movement: f64 = 0.0;
        for (c, centroid) in centroids.iter_mut().enumerate() {
            if weights[c] > 0.0 {
                let next = sums[c] / weights[c];
                max_movement = max_movement.max((next - *centroid).abs());
                *centroid = next;
            }
        }
        if max_movement <= CONVERGENCE_EPSILON {
            break;
        }
    }

    centroids
}

fn seed_plus_plus(
    points: &[(f64, f64)],
    k: usize,
    weight: &impl Fn(usize) -> f64,
    rng: &mut XorShift64Star,
) -> Vec<f64> {
    let base: Vec<f64> = (0..points.len()).map(weight).collect();
    let Some(first) = sample(&base, rng) else {
        return Vec::new();
    };
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[first].0);

    let mut scores = vec![0.0; points.len()];
    while centroids.len() < k {
        for (i, &(x, _)) in points.iter().enumerate() {
            let d = x - centroids[nearest(&centroids, x)];
            scores[i] = base[i] * d * d;
        }
        // Every remaining point coincides with a centroid.
        let Some(next) = sample(&scores, rng) else {
            break;
        };
        centroids.push(points[next].0);
    }
    centroids
}

/// Index drawn with probability proportional to `scores`, or `None` when they sum to zero.
fn sample(scores: &[f64], rng: &mut XorShift64Star) -> Option<usize> {
    let total: f64 = scores.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return None;
    }
    let target = rng.next_f64_unit() * total;
    let mut acc = 0.0;
    let mut last_positive = None;
    for (i, &s) in scores.iter().enumerate() {
        if s <= 0.0 {
            continue;
        }
        acc += s;
        last_positive = Some(i);
        if acc > target {
            return Some(i);
        }
    }
    last_positive
}

fn nearest(centroids: &[f64], x: f64) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, &c) in centroids.iter().enumerate() {
        let d = (x - c).abs();
        if d < best_d {
            best = i;
            best_d = d;
        }
    }
    best
}

/// Small deterministic RNG so a given `randomSeed` always yields the same clusters.
#[derive(Debug, Clone)]
struct XorShift64Star {
    state: u64,
}

impl XorShift64Star {
    fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D_u64)
    }

    fn next_f64_unit(&mut self) -> f64 {
        // [0, 1) with 53 bits of precision.
        let u = self.next_u64() >> 11;
        (u as f64) / ((1u64 << 53) as f64)
    }
}
