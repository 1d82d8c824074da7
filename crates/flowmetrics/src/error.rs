//! Application-wide error types using thiserror.

use flowmetrics_common::FlowMetricsError;

/// Main application error type.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Error raised by a library crate.
    #[error(transparent)]
    FlowMetrics(#[from] FlowMetricsError),

    /// A background task panicked or was aborted.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        Self::FlowMetrics(e.into())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        Self::FlowMetrics(e.into())
    }
}

/// Result type for the application.
pub type AppResult<T> = Result<T, AppError>;
