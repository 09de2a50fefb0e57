use crate::api::AppState;
use crate::graphql::ObservabilityContext;
use async_graphql::http::{playground_source, GraphQLPlaygroundConfig};
use axum::{
    extract::{OriginalUri, State},
    http::header,
    response::{Html, IntoResponse},
    Json,
};
use serde::Serialize;

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GraphQL query/mutation handler
///
/// The response body is whatever the schema produced; observability never
/// alters it.
pub async fn graphql_handler(
    State(state): State<AppState>,
    observability: ObservabilityContext,
    Json(request): Json<async_graphql::Request>,
) -> Json<async_graphql::Response> {
    let request = observability.apply(request);
    Json(state.schema.execute(request).await)
}

/// GraphQL Playground UI handler
///
/// The playground posts back to the path it was served from.
pub async fn graphql_playground(OriginalUri(uri): OriginalUri) -> impl IntoResponse {
    Html(playground_source(GraphQLPlaygroundConfig::new(uri.path())))
}

/// Prometheus metrics endpoint
///
/// Returns metrics in Prometheus text exposition format
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
        crate::metrics::gather_metrics(),
    )
}
