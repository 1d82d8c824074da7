//! Error types and utilities for FlowMetrics

use thiserror::Error;

/// Result type alias for FlowMetrics operations
pub type Result<T> = std::result::Result<T, FlowMetricsError>;

/// Main error type for FlowMetrics operations
#[derive(Error, Debug)]
pub enum FlowMetricsError {
    /// Configuration related errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network related errors (HTTP transport, connection setup)
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Backend API returned an unusable response
    #[error("Backend error: {message}")]
    Backend {
        message: String,
        status_code: Option<u16>,
    },

    /// A single collection query failed
    #[error("Query on '{table}' failed: {message}")]
    Query { table: String, message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Value could not be parsed
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Internationalization and localization errors
    #[error("Localization error: {message}")]
    Localization {
        message: String,
        locale: Option<String>,
    },

    /// Failure while turning raw rows into figures
    #[error("Aggregation error: {message}")]
    Aggregation { message: String },
}

impl FlowMetricsError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with an underlying cause
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a network error with an underlying cause
    pub fn network_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a backend error carrying the HTTP status
    pub fn backend_with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self::Backend {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create a query error for the named collection
    pub fn query(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a localization error
    pub fn localization(message: impl Into<String>, locale: Option<String>) -> Self {
        Self::Localization {
            message: message.into(),
            locale,
        }
    }

    /// Create an aggregation error
    pub fn aggregation(message: impl Into<String>) -> Self {
        Self::Aggregation {
            message: message.into(),
        }
    }

    /// Whether the error came from talking to the backend
    pub const fn is_backend_related(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Backend { .. } | Self::Query { .. }
        )
    }

    /// HTTP status code attached to the error, if any
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Backend { status_code, .. } => *status_code,
            _ => None,
        }
    }
}
