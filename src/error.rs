use thiserror::Error;

use crate::graphql::analysis::AnalysisError;

/// Errors raised by the observability layer
///
/// None of these ever reach a GraphQL client: the extension and the
/// recorder log and drop them so the response is left untouched.
#[derive(Error, Debug)]
pub enum ObservabilityError {
    /// Query shape analysis failed
    #[error("Query analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Metric registration or encoding errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ObservabilityError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            ObservabilityError::Analysis(AnalysisError::CyclicFragment { .. }) => "QUERY_TOO_COMPLEX",
            ObservabilityError::Analysis(AnalysisError::OperationNotFound { .. }) => {
                "OPERATION_NOT_FOUND"
            }
            ObservabilityError::Configuration(_) => "CONFIGURATION_ERROR",
            ObservabilityError::Metrics(_) => "METRICS_ERROR",
            ObservabilityError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for ObservabilityError {
    fn from(err: serde_json::Error) -> Self {
        ObservabilityError::Serialization(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for ObservabilityError {
    fn from(err: config::ConfigError) -> Self {
        ObservabilityError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ObservabilityError>;
