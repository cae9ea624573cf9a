//! Error types for the allocation core and its configuration layer.

use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Input validation failed: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("No catalog offerings match {selector} but a positive amount was assigned to it")]
    EmptyOptionSet { selector: String },

    #[error("Cannot redistribute excess from {firm}: no other participant in this bucket")]
    NoRedistributionTarget { firm: String },

    #[error("Unknown selector: {selector}")]
    UnknownSelector { selector: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Caller input rejected before any allocation is attempted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("investment amount must not be negative (got {0})")]
    NegativeAmount(f64),

    #[error("amount must be a finite number")]
    NonFiniteAmount,

    #[error("target for {strategy} must be within [0, 1] (got {fraction})")]
    FractionOutOfRange { strategy: String, fraction: f64 },

    #[error("exposure percentages exceed 100% (total {total:.2}%)")]
    OverAllocated { total: f64 },

    #[error("risk percentage must be within [0, 100] (got {0})")]
    PercentOutOfRange(u32),

    #[error("duplicate target for {0}")]
    DuplicateTarget(String),

    #[error("malformed target '{0}', expected 'Strategy=PCT'")]
    MalformedTarget(String),

    #[error("weight for {key} must be positive and finite (got {weight})")]
    NonPositiveWeight { key: String, weight: f64 },
}

impl Error {
    /// Shorthand used by the allocation pipeline when a selector has no offerings.
    pub(crate) fn empty_options(selector: impl std::fmt::Display) -> Self {
        Error::EmptyOptionSet {
            selector: selector.to_string(),
        }
    }
}
