#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: `{field}` {reason}")]
    InvalidConfiguration {
        field: &'static str,
        reason: &'static str,
    },

    #[error("no usable usage data: {reason}")]
    EmptyDataset { reason: &'static str },

    #[error(
        "exhaustive search over {candidate_widths} non-anchor widths exceeds the limit of {limit}; raise the widths divisor or enable the clustering approximation"
    )]
    SearchSpaceTooLarge { candidate_widths: usize, limit: usize },

    #[error("no measured image width for viewport {viewport}px")]
    IncompleteMeasurement { viewport: u32 },

    #[error("total page views exceed {}", u64::MAX)]
    ViewCountOverflow,

    #[error("width search was cancelled")]
    Cancelled,

    #[error("width search exceeded its deadline")]
    DeadlineExceeded,
}

pub type Result<T> = std::result::Result<T, Error>;
