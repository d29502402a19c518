use algo_trade_core::{ProviderError, ValidationError};
use algo_trade_execution::ExecutionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("orchestrator is disabled in config")]
    NotEnabled,

    #[error("live execution is not supported; use PAPER or SHADOW")]
    LiveNotSupported,

    #[error("orchestrator channel closed")]
    ChannelClosed,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] ProviderError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for OrchestratorError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Self::ChannelClosed
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for OrchestratorError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Self::ChannelClosed
    }
}
