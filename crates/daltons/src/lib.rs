#![forbid(unsafe_code)]

//! Headless engine choosing which image widths to offer in a responsive `srcset`.
//!
//! Input is visitor statistics (viewport width, screen density, page views) and a lookup of the
//! image's rendered width at each viewport. The engine builds a histogram of the widths visitors
//! actually needed, then picks the `N` widths that waste the fewest pixels across that
//! population: exactly when the search space is small enough, otherwise (optionally) with a
//! weighted k-means approximation.
//!
//! Loading stats, measuring pages and writing results are left to the caller; see the
//! `daltons-cli` crate for a command-line front end.

pub mod aggregate;
pub mod bounds;
pub mod candidates;
pub mod cluster;
pub mod config;
pub mod distance;
pub mod error;
pub mod model;
pub mod search;

pub use aggregate::{Aggregation, aggregate};
pub use bounds::UsageRange;
pub use candidates::CandidateUniverse;
pub use config::{EngineConfig, MissingMeasurement};
pub use distance::distance;
pub use error::{Error, Result};
pub use model::{CandidateSet, DemandHistogram, FnLookup, UsageRecord, WidthLookup, WidthShare};
pub use search::{
    CancellationToken, ProgressObserver, Recommendation, SearchControl, SearchOutcome, Strategy,
    exhaustive_search, optimize,
};

use serde::Serialize;

/// Everything one engine run produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub recommendation: Recommendation,
    /// Observed usage range clipped by the configured bounds.
    pub range: Option<UsageRange>,
    pub aggregation: Aggregation,
    /// Histogram rows as shares of the unpruned total, most viewed first.
    pub shares: Vec<WidthShare>,
}

/// Aggregates `records` and picks the recommended widths.
pub fn recommend(
    records: &[UsageRecord],
    lookup: &impl WidthLookup,
    config: &EngineConfig,
    control: &SearchControl<'_>,
) -> Result<Report> {
    config.validate()?;

    let range = bounds::effective_range(records, config);
    if let Some(range) = &range {
        tracing::info!(
            min_viewport = range.min_viewport,
            max_viewport = range.max_viewport,
            min_density = range.min_density,
            max_density = range.max_density,
            "effective usage range"
        );
    }

    let aggregation = aggregate(records, lookup, config)?;
    let recommendation = optimize(&aggregation.histogram, config, control)?;
    let shares = aggregation.histogram.shares(aggregation.total_views);

    Ok(Report {
        recommendation,
        range,
        aggregation,
        shares,
    })
}
