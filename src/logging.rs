//! Structured query logging and tracing setup

use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::graphql::{CompletedOperation, OperationStatus};

/// Target of every query log event
pub const QUERY_LOG_TARGET: &str = "graphql_observability::query_log";

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "graphql_observability=info,tower_http=info";

/// Install the global tracing subscriber
///
/// `json` switches the fmt layer to one JSON object per line.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// One query log record, built from a completed operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryLogRecord {
    pub operation_type: String,
    pub operation_name: String,
    pub user: String,
    pub duration_ms: f64,
    pub status: OperationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<String>,
}

impl QueryLogRecord {
    /// Build the record, keeping the query text and variables only when
    /// their toggles are on
    pub fn from_completed(completed: &CompletedOperation, config: &ObservabilityConfig) -> Self {
        let metadata = completed.metadata.as_ref();
        let duration_ms = (completed.duration.as_secs_f64() * 10_000.0).round() / 10.0;

        Self {
            operation_type: completed.operation_type().to_string(),
            operation_name: completed.operation_name().to_string(),
            user: completed.user().to_string(),
            duration_ms,
            status: completed.status,
            error_type: completed.error_type.clone(),
            query: metadata
                .and_then(|m| m.query.clone())
                .filter(|_| config.log_query_body),
            variables: metadata
                .and_then(|m| m.variables.clone())
                .filter(|_| config.log_query_variables),
        }
    }
}

/// Emit one `graphql_query` event
///
/// Errors go out at WARN, everything else at INFO. `None` fields are left
/// out of the event entirely.
pub fn emit_query_log(record: &QueryLogRecord) {
    let status = record.status.as_ref();
    let error_type = record.error_type.as_deref();
    let query = record.query.as_deref();
    let variables = record.variables.as_deref();

    match record.status {
        OperationStatus::Error => warn!(
            target: QUERY_LOG_TARGET,
            operation_type = %record.operation_type,
            operation_name = %record.operation_name,
            user = %record.user,
            duration_ms = record.duration_ms,
            status,
            error_type,
            query,
            variables,
            "graphql_query"
        ),
        OperationStatus::Success => info!(
            target: QUERY_LOG_TARGET,
            operation_type = %record.operation_type,
            operation_name = %record.operation_name,
            user = %record.user,
            duration_ms = record.duration_ms,
            status,
            error_type,
            query,
            variables,
            "graphql_query"
        ),
    }
}
