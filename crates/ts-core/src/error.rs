//! Error types for tstat

use thiserror::Error;

/// tstat error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Histogram archive error (missing file, bad path, unknown object)
    #[error("archive error: {0}")]
    Archive(String),

    /// Histogram shape/arithmetic error
    #[error("histogram error: {0}")]
    Histogram(String),

    /// Sample name not present in the sample database
    #[error("unknown sample: {0}")]
    UnknownSample(String),

    /// Channel name not present in the channel database
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    /// Template aggregation error (merge policy violation, missing channel)
    #[error("template error: {0}")]
    Template(String),

    /// Fraction fit error
    #[error("fit error: {0}")]
    Fit(String),

    /// Validation error
    #[error("validation error: {0}")]
    Validation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
