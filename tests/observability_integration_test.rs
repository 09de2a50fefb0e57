//! End-to-end tests for the demo router
//!
//! Every test drives the full stack (recorder layer, GraphQL handler,
//! extension) through `tower::ServiceExt::oneshot` and checks metric
//! deltas on the global series.

mod common;

use axum::http::{header, Request, StatusCode};
use axum::body::Body;
use common::*;
use graphql_observability::{
    api::{build_router, AppState},
    logging::QUERY_LOG_TARGET,
    metrics::{
        GRAPHQL_ERRORS_TOTAL, GRAPHQL_FIELD_RESOLUTION_DURATION_SECONDS, GRAPHQL_QUERY_COMPLEXITY,
        GRAPHQL_QUERY_DEPTH, GRAPHQL_REQUESTS_BY_USER_TOTAL, GRAPHQL_REQUESTS_TOTAL,
        GRAPHQL_REQUEST_DURATION_SECONDS,
    },
    AuthenticatedUser, ObservabilityConfig,
};
use tower::ServiceExt;

fn router(config: ObservabilityConfig) -> axum::Router {
    build_router(AppState::new(config))
}

#[tokio::test]
async fn test_named_query_records_request_metrics() {
    let request_labels = ["query", "InventoryOverview", "success"];
    let before = GRAPHQL_REQUESTS_TOTAL.with_label_values(&request_labels).get();
    let duration_before = GRAPHQL_REQUEST_DURATION_SECONDS
        .with_label_values(&["query", "InventoryOverview"])
        .get_sample_count();
    let depth_before = GRAPHQL_QUERY_DEPTH
        .with_label_values(&["InventoryOverview"])
        .get_sample_count();
    let complexity_sum_before = GRAPHQL_QUERY_COMPLEXITY
        .with_label_values(&["InventoryOverview"])
        .get_sample_sum();

    let response = router(ObservabilityConfig::default())
        .oneshot(graphql_request(
            "/graphql",
            "query InventoryOverview { devices { name interfaces { name enabled } } }",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body.get("errors").is_none());
    assert_eq!(body["data"]["devices"].as_array().unwrap().len(), 3);

    assert_eq!(
        GRAPHQL_REQUESTS_TOTAL.with_label_values(&request_labels).get() - before,
        1.0
    );
    assert_eq!(
        GRAPHQL_REQUEST_DURATION_SECONDS
            .with_label_values(&["query", "InventoryOverview"])
            .get_sample_count()
            - duration_before,
        1
    );
    assert_eq!(
        GRAPHQL_QUERY_DEPTH
            .with_label_values(&["InventoryOverview"])
            .get_sample_count()
            - depth_before,
        1
    );
    // devices, name, interfaces, name, enabled
    assert_eq!(
        GRAPHQL_QUERY_COMPLEXITY
            .with_label_values(&["InventoryOverview"])
            .get_sample_sum()
            - complexity_sum_before,
        5.0
    );
}

#[tokio::test]
async fn test_root_detection_fires_once_per_operation() {
    let labels = ["dave", "query", "devices,health,locations"];
    let before = GRAPHQL_REQUESTS_BY_USER_TOTAL.with_label_values(&labels).get();

    let mut request = graphql_request("/graphql", "{ health devices { name } locations }", None);
    request
        .extensions_mut()
        .insert(AuthenticatedUser::new("dave"));

    let response = router(ObservabilityConfig::default())
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let after = GRAPHQL_REQUESTS_BY_USER_TOTAL.with_label_values(&labels).get();
    assert_eq!(after - before, 1.0);
}

#[tokio::test]
async fn test_resolver_error_marks_request_as_error() {
    let request_labels = ["mutation", "RenameMissing", "error"];
    let error_labels = ["mutation", "RenameMissing", "NOT_FOUND"];
    let before = GRAPHQL_REQUESTS_TOTAL.with_label_values(&request_labels).get();
    let errors_before = GRAPHQL_ERRORS_TOTAL.with_label_values(&error_labels).get();

    let response = router(ObservabilityConfig::default())
        .oneshot(graphql_request(
            "/graphql",
            "mutation RenameMissing { renameDevice(name: \"ghost\", newName: \"x\") { name } }",
            None,
        ))
        .await
        .unwrap();

    // GraphQL errors still travel with a 200
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["errors"][0]["extensions"]["code"], "NOT_FOUND");

    assert_eq!(
        GRAPHQL_REQUESTS_TOTAL.with_label_values(&request_labels).get() - before,
        1.0
    );
    assert_eq!(
        GRAPHQL_ERRORS_TOTAL.with_label_values(&error_labels).get() - errors_before,
        1.0
    );
}

#[tokio::test]
async fn test_parse_error_uses_reduced_labels_and_keeps_response() {
    let labels = ["unknown", "unknown", "error"];
    let before = GRAPHQL_REQUESTS_TOTAL.with_label_values(&labels).get();

    let app = router(ObservabilityConfig::default());
    let response = app
        .oneshot(graphql_request("/graphql", "{ devices { name ", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let observed = json_body(response).await;

    // same request executed without any instrumentation
    let bare = graphql_observability::graphql::schema::build_schema(std::sync::Arc::new(
        ObservabilityConfig::disabled(),
    ));
    let expected = serde_json::to_value(bare.execute("{ devices { name ").await).unwrap();

    assert_eq!(observed, expected);
    assert!(GRAPHQL_REQUESTS_TOTAL.with_label_values(&labels).get() - before >= 1.0);
}

#[tokio::test]
async fn test_field_resolution_is_off_by_default() {
    let labels = ["Device", "location"];
    let before = GRAPHQL_FIELD_RESOLUTION_DURATION_SECONDS
        .with_label_values(&labels)
        .get_sample_count();

    let response = router(ObservabilityConfig::default())
        .oneshot(graphql_request("/graphql", "{ devices { location } }", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let after = GRAPHQL_FIELD_RESOLUTION_DURATION_SECONDS
        .with_label_values(&labels)
        .get_sample_count();
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_custom_graphql_path() {
    let labels = ["query", "CustomPath", "success"];
    let before = GRAPHQL_REQUESTS_TOTAL.with_label_values(&labels).get();

    let config = ObservabilityConfig::default().with_graphql_paths(["/api/graphql"]);
    let app = router(config);

    let response = app
        .clone()
        .oneshot(graphql_request("/api/graphql", "query CustomPath { health }", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        GRAPHQL_REQUESTS_TOTAL.with_label_values(&labels).get() - before,
        1.0
    );

    // the default path is no longer served
    let response = app
        .oneshot(graphql_request("/graphql", "query CustomPath { health }", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        GRAPHQL_REQUESTS_TOTAL.with_label_values(&labels).get() - before,
        1.0
    );
}

#[tokio::test]
async fn test_metrics_disabled_records_nothing() {
    let labels = ["query", "MetricsOff", "success"];
    let before = GRAPHQL_REQUESTS_TOTAL.with_label_values(&labels).get();

    let response = router(ObservabilityConfig::default().with_metrics(false))
        .oneshot(graphql_request("/graphql", "query MetricsOff { health }", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(GRAPHQL_REQUESTS_TOTAL.with_label_values(&labels).get(), before);
}

#[tokio::test]
async fn test_query_log_omits_variables_when_disabled() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_max_level(tracing::Level::INFO)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let config = ObservabilityConfig::default().with_query_logging(true, false);
    let response = router(config)
        .oneshot(graphql_request(
            "/graphql",
            "query LoggedLookup($name: String!) { device(name: $name) { name } }",
            Some(serde_json::json!({ "name": "edge-01" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let events = logs.events_for(QUERY_LOG_TARGET);
    assert_eq!(events.len(), 1);

    let fields = &events[0]["fields"];
    assert_eq!(events[0]["level"], "INFO");
    assert_eq!(fields["message"], "graphql_query");
    assert_eq!(fields["operation_type"], "query");
    assert_eq!(fields["operation_name"], "LoggedLookup");
    assert_eq!(fields["user"], "anonymous");
    assert_eq!(fields["status"], "success");
    assert!(fields["duration_ms"].is_number());
    assert_eq!(
        fields["query"],
        "query LoggedLookup($name: String!) { device(name: $name) { name } }"
    );
    assert!(fields.get("variables").is_none());
}

#[tokio::test]
async fn test_query_log_includes_variables_when_enabled() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_max_level(tracing::Level::INFO)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let config = ObservabilityConfig::default().with_query_logging(false, true);
    router(config)
        .oneshot(graphql_request(
            "/graphql",
            "query VarsLookup($name: String!) { device(name: $name) { name } }",
            Some(serde_json::json!({ "name": "core-01" })),
        ))
        .await
        .unwrap();

    let events = logs.events_for(QUERY_LOG_TARGET);
    assert_eq!(events.len(), 1);
    let fields = &events[0]["fields"];
    assert_eq!(fields["variables"], r#"{"name":"core-01"}"#);
    assert!(fields.get("query").is_none());
}

#[tokio::test]
async fn test_metrics_endpoint_serves_exposition_format() {
    let app = router(ObservabilityConfig::default());

    app.clone()
        .oneshot(graphql_request("/graphql", "query ScrapeProbe { health }", None))
        .await
        .unwrap();

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain; version=0.0.4"
    );

    let output = text_body(response).await;
    assert!(validate_exposition_format(&output).is_ok());
    assert!(output.contains("# TYPE graphql_requests_total counter"));
    assert!(output.contains("# TYPE graphql_request_duration_seconds histogram"));
    assert_eq!(
        sample_value(
            &output,
            "graphql_requests_total",
            &[("operation_name", "ScrapeProbe"), ("status", "success")]
        ),
        Some(1.0)
    );
}

#[tokio::test]
async fn test_playground_is_served() {
    let response = router(ObservabilityConfig::default())
        .oneshot(Request::builder().uri("/graphql").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text_body(response).await.contains("GraphQL Playground"));
}
