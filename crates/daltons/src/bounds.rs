//! Viewport and density ranges observed in visitor stats.
//!
//! Configured bounds only ever narrow what the stats contain: a `maxViewport` above the widest
//! viewport seen in the stats has no effect, and so on. The effective range is also the range of
//! viewports a measurement step needs to cover.

use crate::config::EngineConfig;
use crate::model::UsageRecord;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRange {
    pub min_viewport: u32,
    pub max_viewport: u32,
    pub min_density: f64,
    pub max_density: f64,
}

impl UsageRange {
    /// Range spanned by `records`, ignoring records with a non-finite or non-positive density.
    /// Returns `None` when no record qualifies.
    pub fn of(records: &[UsageRecord]) -> Option<Self> {
        let mut it = records
            .iter()
            .filter(|r| r.density.is_finite() && r.density > 0.0);
        let first = it.next()?;
        let mut range = Self {
            min_viewport: first.viewport_width,
            max_viewport: first.viewport_width,
            min_density: first.density,
            max_density: first.density,
        };
        for r in it {
            range.min_viewport = range.min_viewport.min(r.viewport_width);
            range.max_viewport = range.max_viewport.max(r.viewport_width);
            range.min_density = range.min_density.min(r.density);
            range.max_density = range.max_density.max(r.density);
        }
        Some(range)
    }

    /// Clips this range with the bounds set in `config`.
    ///
    /// The result may be inverted (min above max) when the configured bounds exclude every
    /// record; aggregation then reports an empty dataset.
    pub fn narrowed_by(&self, config: &EngineConfig) -> Self {
        Self {
            min_viewport: config
                .min_viewport
                .map_or(self.min_viewport, |v| v.max(self.min_viewport)),
            max_viewport: config
                .max_viewport
                .map_or(self.max_viewport, |v| v.min(self.max_viewport)),
            min_density: config
                .min_density
                .map_or(self.min_density, |v| v.max(self.min_density)),
            max_density: config
                .max_density
                .map_or(self.max_density, |v| v.min(self.max_density)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_viewport > self.max_viewport || self.min_density > self.max_density
    }

    /// Viewport widths (inclusive) a width lookup must cover for this range.
    pub fn viewports(&self) -> std::ops::RangeInclusive<u32> {
        self.min_viewport..=self.max_viewport
    }
}

/// Effective bounds for `records` under `config`, or `None` when there is nothing to bound.
pub fn effective_range(records: &[UsageRecord], config: &EngineConfig) -> Option<UsageRange> {
    UsageRange::of(records).map(|r| r.narrowed_by(config))
}
