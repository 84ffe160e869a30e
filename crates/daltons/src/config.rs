use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Largest exhaustive search the candidate counter can represent (one bit per non-anchor width).
pub const MAX_EXHAUSTIVE_SEARCH_LIMIT: usize = 63;

/// What the aggregator does with a record whose viewport has no measured image width.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingMeasurement {
    /// Drop the record and tally it.
    #[default]
    Skip,
    /// Abort the run with [`Error::IncompleteMeasurement`].
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub min_viewport: Option<u32>,
    pub max_viewport: Option<u32>,
    pub min_density: Option<f64>,
    pub max_density: Option<f64>,
    /// Computed widths are rounded up to a multiple of this value.
    pub widths_divisor: u32,
    /// Number of widths to recommend (`N`).
    pub widths_number: usize,
    /// Widths representing a smaller share of views than this are dropped, in `[0, 1)`.
    pub min_percentage: f64,
    /// Maximum number of non-anchor widths for which the exact search is attempted.
    pub exhaustive_search_limit: usize,
    /// Fall back to the clustering approximation instead of failing when the limit is exceeded.
    pub approximate_on_overflow: bool,
    pub missing_measurement: MissingMeasurement,
    /// Evaluate candidates on the rayon thread pool. Results are identical either way.
    pub parallel: bool,
    pub kmeans_max_iterations: usize,
    pub random_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_viewport: None,
            max_viewport: None,
            min_density: None,
            max_density: None,
            widths_divisor: 10,
            widths_number: 5,
            min_percentage: 0.0001,
            exhaustive_search_limit: 20,
            approximate_on_overflow: false,
            missing_measurement: MissingMeasurement::Skip,
            parallel: true,
            kmeans_max_iterations: 100,
            random_seed: 0,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        fn invalid(field: &'static str, reason: &'static str) -> Result<()> {
            Err(Error::InvalidConfiguration { field, reason })
        }

        if self.widths_number < 1 {
            return invalid("widthsNumber", "must be at least 1");
        }
        if self.widths_divisor < 1 {
            return invalid("widthsDivisor", "must be at least 1");
        }
        if !(self.min_percentage.is_finite() && (0.0..1.0).contains(&self.min_percentage)) {
            return invalid("minPercentage", "must be >= 0 and < 1");
        }
        if let (Some(min), Some(max)) = (self.min_viewport, self.max_viewport) {
            if max < min {
                return invalid("maxViewport", "must be greater than minViewport");
            }
        }
        for (field, density) in [
            ("minDensity", self.min_density),
            ("maxDensity", self.max_density),
        ] {
            if let Some(d) = density {
                if !(d.is_finite() && d >= 0.0) {
                    return invalid(field, "must be a finite number >= 0");
                }
            }
        }
        if let (Some(min), Some(max)) = (self.min_density, self.max_density) {
            if max < min {
                return invalid("maxDensity", "must be greater than minDensity");
            }
        }
        if self.exhaustive_search_limit > MAX_EXHAUSTIVE_SEARCH_LIMIT {
            return invalid("exhaustiveSearchLimit", "must be at most 63");
        }
        if self.kmeans_max_iterations == 0 {
            return invalid("kmeansMaxIterations", "must be at least 1");
        }
        Ok(())
    }

    pub(crate) fn accepts(&self, viewport_width: u32, density: f64) -> bool {
        if !(density.is_finite() && density > 0.0) {
            return false;
        }
        self.min_viewport.is_none_or(|min| viewport_width >= min)
            && self.max_viewport.is_none_or(|max| viewport_width <= max)
            && self.min_density.is_none_or(|min| density >= min)
            && self.max_density.is_none_or(|max| density <= max)
    }
}
