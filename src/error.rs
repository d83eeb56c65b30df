use thiserror::Error;

/// Failures that end a run (or a notifier attempt) as a whole.
///
/// Per-cell date parse failures are deliberately absent: those are absorbed by
/// the coercer and only show up in its report.
#[derive(Debug, Error)]
pub enum AuctionError {
    #[error("no file matching `{pattern}`")]
    NoSourceFound { pattern: String },

    #[error("required column `{column}` not found")]
    MissingRequiredColumn { column: String },

    #[error("headers collapse to the same column `{column}`")]
    DuplicateColumn { column: String },

    #[error("invalid day range: low {low} > high {high}")]
    InvalidRange { low: i64, high: i64 },

    #[error("invalid notifier configuration: {0}")]
    InvalidConfiguration(String),

    #[error("delivery failed: {0}")]
    DeliveryFailure(String),
}

impl AuctionError {
    /// Pull an `AuctionError` back out of an `anyhow` chain.
    pub fn find(err: &anyhow::Error) -> Option<&AuctionError> {
        err.chain().find_map(|e| e.downcast_ref::<AuctionError>())
    }
}
