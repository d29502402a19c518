//! Error types shared across the signal desk crates.

use thiserror::Error;

/// Malformed signal input, rejected before the gate pipeline runs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A field failed its schema constraint.
    #[error("Invalid field `{field}`: {message}")]
    InvalidField {
        /// Wire name of the offending field.
        field: &'static str,
        /// What the constraint expected.
        message: String,
    },
}

impl ValidationError {
    /// Creates an invalid-field error.
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            message: message.into(),
        }
    }

    /// Returns the wire name of the field that failed.
    #[must_use]
    pub const fn field_name(&self) -> &'static str {
        match self {
            Self::InvalidField { field, .. } => field,
        }
    }
}

/// Failures from external collaborators (market data, persistence).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// No usable price for the symbol.
    #[error("No price available for {symbol}")]
    PriceUnavailable { symbol: String },

    /// Chain lookup failed or returned nothing usable.
    #[error("Options chain unavailable for {symbol}: {reason}")]
    ChainUnavailable { symbol: String, reason: String },

    /// A single-number metric (IV rank, VIX) could not be read.
    #[error("{metric} unavailable: {reason}")]
    MetricUnavailable {
        metric: &'static str,
        reason: String,
    },

    /// Backing store failed.
    #[error("Store error: {0}")]
    Store(String),
}

impl ProviderError {
    /// Creates a chain-unavailable error.
    pub fn chain(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ChainUnavailable {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    /// Creates a metric-unavailable error.
    pub fn metric(metric: &'static str, reason: impl Into<String>) -> Self {
        Self::MetricUnavailable {
            metric,
            reason: reason.into(),
        }
    }

    /// Creates a store error.
    pub fn store(reason: impl Into<String>) -> Self {
        Self::Store(reason.into())
    }
}
