//! Prometheus metrics for GraphQL operations.
//!
//! All series are process-wide and safe to update from any worker. Every
//! recording helper in this module swallows registry errors: a metric that
//! cannot be recorded is logged and dropped, never surfaced to the request.
//!
//! # Example
//! ```no_run
//! use graphql_observability::metrics::{self, GRAPHQL_REQUESTS_TOTAL};
//!
//! metrics::init_metrics().expect("metrics registration");
//! GRAPHQL_REQUESTS_TOTAL
//!     .with_label_values(&["query", "GetDevices", "success"])
//!     .inc();
//! ```

mod middleware;

pub use middleware::{
    record_graphql_request, GraphQLObservabilityLayer, GraphQLObservabilityService,
    InFlightRequest, RequestRecorder,
};

use lazy_static::lazy_static;
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};

use crate::graphql::{CompletedOperation, OperationKind, UNKNOWN};

lazy_static! {
    /// Global Prometheus registry for all GraphQL metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Request Metrics
    // ============================================================================

    /// Total number of GraphQL requests
    ///
    /// Labels: operation_type, operation_name, status
    pub static ref GRAPHQL_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("graphql_requests_total", "Total number of GraphQL requests"),
        &["operation_type", "operation_name", "status"]
    ).expect("Failed to create GRAPHQL_REQUESTS_TOTAL metric");

    /// Duration of the full GraphQL HTTP request in seconds
    ///
    /// Labels: operation_type, operation_name
    pub static ref GRAPHQL_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "graphql_request_duration_seconds",
            "Duration of GraphQL request execution in seconds"
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["operation_type", "operation_name"]
    ).expect("Failed to create GRAPHQL_REQUEST_DURATION_SECONDS metric");

    /// Total number of GraphQL errors raised by root resolvers
    ///
    /// Labels: operation_type, operation_name, error_type
    pub static ref GRAPHQL_ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("graphql_errors_total", "Total number of GraphQL errors"),
        &["operation_type", "operation_name", "error_type"]
    ).expect("Failed to create GRAPHQL_ERRORS_TOTAL metric");

    // ============================================================================
    // Query Shape Metrics
    // ============================================================================

    /// Nesting depth of GraphQL queries
    ///
    /// Labels: operation_name
    pub static ref GRAPHQL_QUERY_DEPTH: HistogramVec = HistogramVec::new(
        HistogramOpts::new("graphql_query_depth", "Depth of GraphQL queries")
            .buckets(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 15.0, 20.0]),
        &["operation_name"]
    ).expect("Failed to create GRAPHQL_QUERY_DEPTH metric");

    /// Complexity of GraphQL queries measured by total field count
    ///
    /// Labels: operation_name
    pub static ref GRAPHQL_QUERY_COMPLEXITY: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "graphql_query_complexity",
            "Complexity of GraphQL queries measured by total field count"
        )
        .buckets(vec![1.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0]),
        &["operation_name"]
    ).expect("Failed to create GRAPHQL_QUERY_COMPLEXITY metric");

    /// Duration of individual field resolution in seconds (opt-in, high cardinality)
    ///
    /// Labels: type_name, field_name
    pub static ref GRAPHQL_FIELD_RESOLUTION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "graphql_field_resolution_duration_seconds",
            "Duration of individual GraphQL field resolution in seconds"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]),
        &["type_name", "field_name"]
    ).expect("Failed to create GRAPHQL_FIELD_RESOLUTION_DURATION_SECONDS metric");

    // ============================================================================
    // Per-User Metrics
    // ============================================================================

    /// Total number of GraphQL requests per user
    ///
    /// Labels: user, operation_type, operation_name
    pub static ref GRAPHQL_REQUESTS_BY_USER_TOTAL: CounterVec = CounterVec::new(
        Opts::new("graphql_requests_by_user_total", "Total number of GraphQL requests per user"),
        &["user", "operation_type", "operation_name"]
    ).expect("Failed to create GRAPHQL_REQUESTS_BY_USER_TOTAL metric");
}

/// Register all GraphQL metrics with [`PROMETHEUS_REGISTRY`]
///
/// Safe to call more than once: series that are already registered are
/// left as they are.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(GRAPHQL_REQUESTS_TOTAL.clone()),
        Box::new(GRAPHQL_REQUEST_DURATION_SECONDS.clone()),
        Box::new(GRAPHQL_ERRORS_TOTAL.clone()),
        Box::new(GRAPHQL_QUERY_DEPTH.clone()),
        Box::new(GRAPHQL_QUERY_COMPLEXITY.clone()),
        Box::new(GRAPHQL_FIELD_RESOLUTION_DURATION_SECONDS.clone()),
        Box::new(GRAPHQL_REQUESTS_BY_USER_TOTAL.clone()),
    ];

    for collector in collectors {
        match PROMETHEUS_REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }

    tracing::debug!("GraphQL metrics registered");
    Ok(())
}

/// Generate Prometheus text format metrics
///
/// Used by the `/metrics` endpoint. Each series is snapshotted on its own;
/// there is no cross-series consistency.
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

fn inc_counter(counter: &CounterVec, labels: &[&str]) {
    match counter.get_metric_with_label_values(labels) {
        Ok(counter) => counter.inc(),
        Err(e) => tracing::warn!(error = %e, "Failed to record GraphQL counter"),
    }
}

fn observe_histogram(histogram: &HistogramVec, labels: &[&str], value: f64) {
    match histogram.get_metric_with_label_values(labels) {
        Ok(histogram) => histogram.observe(value),
        Err(e) => tracing::warn!(error = %e, "Failed to record GraphQL histogram"),
    }
}

/// Record request count and duration for a completed operation
///
/// Operations that never reached root resolution are counted with
/// `unknown` type and name so totals are not lost.
pub fn record_request(completed: &CompletedOperation) {
    let status = completed.status.as_ref();

    match &completed.metadata {
        Some(metadata) => {
            let operation_type = metadata.operation_type.as_ref();
            let operation_name = metadata.operation_name.as_str();

            inc_counter(
                &GRAPHQL_REQUESTS_TOTAL,
                &[operation_type, operation_name, status],
            );
            observe_histogram(
                &GRAPHQL_REQUEST_DURATION_SECONDS,
                &[operation_type, operation_name],
                completed.duration.as_secs_f64(),
            );
        }
        None => inc_counter(&GRAPHQL_REQUESTS_TOTAL, &[UNKNOWN, UNKNOWN, status]),
    }
}

/// Record an error raised while resolving a root field
pub fn record_error(operation_type: OperationKind, operation_name: &str, error_type: &str) {
    inc_counter(
        &GRAPHQL_ERRORS_TOTAL,
        &[operation_type.as_ref(), operation_name, error_type],
    );
}

pub fn record_query_depth(operation_name: &str, depth: usize) {
    observe_histogram(&GRAPHQL_QUERY_DEPTH, &[operation_name], depth as f64);
}

pub fn record_query_complexity(operation_name: &str, complexity: usize) {
    observe_histogram(&GRAPHQL_QUERY_COMPLEXITY, &[operation_name], complexity as f64);
}

pub fn record_user_request(user: &str, operation_type: OperationKind, operation_name: &str) {
    inc_counter(
        &GRAPHQL_REQUESTS_BY_USER_TOTAL,
        &[user, operation_type.as_ref(), operation_name],
    );
}

pub fn record_field_resolution(type_name: &str, field_name: &str, duration_secs: f64) {
    observe_histogram(
        &GRAPHQL_FIELD_RESOLUTION_DURATION_SECONDS,
        &[type_name, field_name],
        duration_secs,
    );
}
