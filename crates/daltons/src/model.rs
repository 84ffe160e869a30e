use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

/// One row of visitor statistics: how many page views were made at a given viewport width and
/// screen density.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub viewport_width: u32,
    pub density: f64,
    pub views: u64,
}

impl UsageRecord {
    pub fn new(viewport_width: u32, density: f64, views: u64) -> Self {
        Self {
            viewport_width,
            density,
            views,
        }
    }
}

/// Rendered (CSS pixel) image width for a given viewport width.
///
/// Implementations are usually filled by an external measurement step (for example a headless
/// browser resizing its viewport one pixel at a time). A `None` answer means the viewport was
/// never measured.
pub trait WidthLookup {
    fn rendered_width(&self, viewport_width: u32) -> Option<f64>;
}

impl<T: WidthLookup + ?Sized> WidthLookup for &T {
    fn rendered_width(&self, viewport_width: u32) -> Option<f64> {
        (**self).rendered_width(viewport_width)
    }
}

impl WidthLookup for BTreeMap<u32, f64> {
    fn rendered_width(&self, viewport_width: u32) -> Option<f64> {
        self.get(&viewport_width).copied()
    }
}

impl<S: BuildHasher> WidthLookup for HashMap<u32, f64, S> {
    fn rendered_width(&self, viewport_width: u32) -> Option<f64> {
        self.get(&viewport_width).copied()
    }
}

/// Adapts a closure into a [`WidthLookup`].
#[derive(Debug, Clone, Copy)]
pub struct FnLookup<F>(pub F);

impl<F> WidthLookup for FnLookup<F>
where
    F: Fn(u32) -> Option<f64>,
{
    fn rendered_width(&self, viewport_width: u32) -> Option<f64> {
        (self.0)(viewport_width)
    }
}

/// Accumulated page views per bucketed image width.
///
/// Keys are kept ordered so every traversal (and therefore every search) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DemandHistogram {
    weights: BTreeMap<u32, u64>,
}

impl DemandHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `views` to the bucket of `width`, creating it if needed. Saturates at `u64::MAX`.
    pub fn add(&mut self, width: u32, views: u64) {
        let slot = self.weights.entry(width).or_insert(0);
        *slot = slot.saturating_add(views);
    }

    pub fn get(&self, width: u32) -> Option<u64> {
        self.weights.get(&width).copied()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// The widest demanded width. Every candidate set keeps it.
    pub fn anchor(&self) -> Option<u32> {
        self.weights.keys().next_back().copied()
    }

    /// `(width, views)` pairs in ascending width order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (u32, u64)> + ExactSizeIterator + '_ {
        self.weights.iter().map(|(&w, &n)| (w, n))
    }

    pub fn widths(&self) -> impl DoubleEndedIterator<Item = u32> + ExactSizeIterator + '_ {
        self.weights.keys().copied()
    }

    pub fn widths_descending(&self) -> Vec<u32> {
        self.weights.keys().rev().copied().collect()
    }

    /// Sum of every bucket, saturating at `u64::MAX`.
    pub fn total_weight(&self) -> u64 {
        self.weights.values().fold(0u64, |acc, &n| acc.saturating_add(n))
    }

    pub fn retain(&mut self, mut keep: impl FnMut(u32, u64) -> bool) {
        self.weights.retain(|&w, &mut n| keep(w, n));
    }

    /// Per-width share of `total_views`, most viewed first (ties: narrower first).
    ///
    /// `total_views` is passed in rather than derived so that shares stay relative to the
    /// unpruned population.
    pub fn shares(&self, total_views: u64) -> Vec<WidthShare> {
        let mut out: Vec<WidthShare> = self
            .iter()
            .map(|(width, views)| WidthShare {
                width,
                views,
                percentage: if total_views == 0 {
                    0.0
                } else {
                    views as f64 / total_views as f64
                },
            })
            .collect();
        out.sort_by(|a, b| b.views.cmp(&a.views).then(a.width.cmp(&b.width)));
        out
    }
}

impl FromIterator<(u32, u64)> for DemandHistogram {
    fn from_iter<I: IntoIterator<Item = (u32, u64)>>(iter: I) -> Self {
        let mut h = Self::new();
        for (width, views) in iter {
            h.add(width, views);
        }
        h
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidthShare {
    pub width: u32,
    pub views: u64,
    /// Fraction in `[0, 1]`.
    pub percentage: f64,
}

/// A proposed set of widths, stored widest first without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CandidateSet {
    widths: Vec<u32>,
}

impl CandidateSet {
    pub fn new(widths: impl IntoIterator<Item = u32>) -> Self {
        let mut widths: Vec<u32> = widths.into_iter().collect();
        widths.sort_unstable_by(|a, b| b.cmp(a));
        widths.dedup();
        Self { widths }
    }

    /// Builds a set from widths already sorted in strictly descending order.
    pub(crate) fn from_descending(widths: Vec<u32>) -> Self {
        debug_assert!(widths.windows(2).all(|w| w[0] > w[1]));
        Self { widths }
    }

    pub fn as_descending(&self) -> &[u32] {
        &self.widths
    }

    pub fn to_ascending(&self) -> Vec<u32> {
        self.widths.iter().rev().copied().collect()
    }

    pub fn widest(&self) -> Option<u32> {
        self.widths.first().copied()
    }

    pub fn contains(&self, width: u32) -> bool {
        self.widths.binary_search_by(|probe| width.cmp(probe)).is_ok()
    }

    pub fn len(&self) -> usize {
        self.widths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widths.is_empty()
    }
}
