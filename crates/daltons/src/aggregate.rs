//! Demand aggregation: visitor stats + measured image widths -> histogram of "perfect" widths.
//!
//! A perfect width is the number of device pixels an image needs to fill its rendered box
//! exactly: `ceil(renderedWidth * density)`, rounded up to the configured divisor.

use crate::config::{EngineConfig, MissingMeasurement};
use crate::error::{Error, Result};
use crate::model::{DemandHistogram, UsageRecord, WidthLookup};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    pub histogram: DemandHistogram,
    /// Views of every accepted record, taken before pruning.
    pub total_views: u64,
    /// Records dropped because their viewport had no measured width, or one too large to bucket.
    pub unmeasured_records: usize,
    /// Records outside the configured viewport/density bounds.
    pub out_of_bounds_records: usize,
    /// Records whose image was not rendered at all (perfect width 0).
    pub unrendered_records: usize,
    /// Widths removed by the `minPercentage` filter.
    pub pruned_widths: usize,
}

/// Rounds `width` up to the next multiple of `divisor`, leaving exact multiples unchanged.
/// `None` when that multiple does not fit in a `u32`.
pub fn round_up_to_divisor(width: u32, divisor: u32) -> Option<u32> {
    debug_assert!(divisor >= 1);
    match width % divisor {
        0 => Some(width),
        rem => width.checked_add(divisor - rem),
    }
}

/// `ceil(rendered_width * density)`, or `None` when the product is not a usable pixel count.
pub fn perfect_width(rendered_width: f64, density: f64) -> Option<u32> {
    let raw = (rendered_width * density).ceil();
    if !raw.is_finite() || raw < 0.0 || raw > f64::from(u32::MAX) {
        return None;
    }
    Some(raw as u32)
}

pub fn aggregate(
    records: &[UsageRecord],
    lookup: &impl WidthLookup,
    config: &EngineConfig,
) -> Result<Aggregation> {
    config.validate()?;

    let mut out = Aggregation {
        histogram: DemandHistogram::new(),
        total_views: 0,
        unmeasured_records: 0,
        out_of_bounds_records: 0,
        unrendered_records: 0,
        pruned_widths: 0,
    };

    for record in records {
        if !config.accepts(record.viewport_width, record.density) {
            out.out_of_bounds_records += 1;
            continue;
        }
        let rendered = lookup
            .rendered_width(record.viewport_width)
            .filter(|w| w.is_finite() && *w >= 0.0);
        let Some(rendered) = rendered else {
            match config.missing_measurement {
                MissingMeasurement::Skip => {
                    out.unmeasured_records += 1;
                    continue;
                }
                MissingMeasurement::Fail => {
                    return Err(Error::IncompleteMeasurement {
                        viewport: record.viewport_width,
                    });
                }
            }
        };
        let Some(width) = perfect_width(rendered, record.density) else {
            out.unmeasured_records += 1;
            continue;
        };
        if width == 0 {
            out.unrendered_records += 1;
            continue;
        }
        let Some(bucket) = round_up_to_divisor(width, config.widths_divisor) else {
            out.unmeasured_records += 1;
            continue;
        };
        // Every bucket is bounded by the total, so checking the total covers the histogram.
        out.total_views = out
            .total_views
            .checked_add(record.views)
            .ok_or(Error::ViewCountOverflow)?;
        out.histogram.add(bucket, record.views);
    }

    if out.unmeasured_records > 0 {
        tracing::warn!(
            skipped = out.unmeasured_records,
            "usage records skipped: viewport has no measured image width"
        );
    }

    if out.histogram.is_empty() {
        return Err(Error::EmptyDataset {
            reason: "no measured usage record falls within the configured bounds",
        });
    }
    if out.total_views == 0 {
        return Err(Error::EmptyDataset {
            reason: "usage records within bounds total zero views",
        });
    }

    if config.min_percentage > 0.0 {
        let total = out.total_views as f64;
        let min = config.min_percentage;
        let before = out.histogram.len();
        out.histogram.retain(|_, views| views as f64 / total >= min);
        out.pruned_widths = before - out.histogram.len();
        if out.histogram.is_empty() {
            return Err(Error::EmptyDataset {
                reason: "every width falls below the minimum percentage",
            });
        }
    }

    tracing::debug!(
        widths = out.histogram.len(),
        total_views = out.total_views,
        pruned = out.pruned_widths,
        out_of_bounds = out.out_of_bounds_records,
        unrendered = out.unrendered_records,
        "aggregated demand histogram"
    );

    Ok(out)
}
