use algo_trade_core::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("position {0} not found")]
    PositionNotFound(String),

    #[error("position {0} is already closed")]
    PositionClosed(String),

    #[error("no price for {symbol}: {source}")]
    Price {
        symbol: String,
        #[source]
        source: ProviderError,
    },

    #[error("venue unavailable: {0}")]
    Venue(String),
}
