use crate::api::{handlers, AppState};
use crate::metrics::GraphQLObservabilityLayer;
use axum::{routing::get, Router};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Routes owned by the demo server, never mounted as GraphQL endpoints
pub const RESERVED_PATHS: [&str; 3] = ["/health", "/health/", "/metrics"];

/// Build the demo router
///
/// Every configured GraphQL path serves the schema; the observability layer
/// wraps the whole router and picks those paths out itself. Configured
/// paths that collide with [`RESERVED_PATHS`] are skipped.
pub fn build_router(state: AppState) -> Router {
    let layer = GraphQLObservabilityLayer::with_shared_config(state.config.clone());

    let mut graphql_paths: Vec<String> = state.config.graphql_path_set().into_iter().collect();
    graphql_paths.sort();

    let mut router = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/", get(handlers::health_check))
        // Prometheus scrape
        .route("/metrics", get(handlers::metrics));

    for path in &graphql_paths {
        if RESERVED_PATHS.contains(&path.as_str()) {
            tracing::warn!(path = %path, "GraphQL path collides with a built-in route, not mounted");
            continue;
        }
        router = router.route(
            path,
            get(handlers::graphql_playground).post(handlers::graphql_handler),
        );
    }

    router
        .with_state(state)
        .layer(layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
