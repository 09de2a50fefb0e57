//! Request-cycle recorder for GraphQL endpoints
//!
//! Wraps each request to an allow-listed GraphQL path with:
//! - A fresh request-scoped [`OperationStash`]
//! - Request count and duration, labeled from the stash
//! - One structured query log record
//!
//! Requests to any other path pass through untouched, as do successful
//! requests on a GraphQL path that never reached the executor (the
//! playground page).

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};

use crate::config::ObservabilityConfig;
use crate::graphql::{CompletedOperation, OperationStash, OperationStatus};
use crate::logging::{emit_query_log, QueryLogRecord};

/// Error type recorded when the inner service fails without a response
pub const SERVICE_ERROR: &str = "ServiceError";

/// Shared request-cycle logic behind the layer and the function middleware
#[derive(Clone)]
pub struct RequestRecorder {
    config: Arc<ObservabilityConfig>,
    paths: Arc<HashSet<String>>,
}

impl RequestRecorder {
    pub fn new(config: ObservabilityConfig) -> Self {
        Self::with_shared_config(Arc::new(config))
    }

    pub fn with_shared_config(config: Arc<ObservabilityConfig>) -> Self {
        let paths = Arc::new(config.graphql_path_set());
        Self { config, paths }
    }

    pub fn config(&self) -> &Arc<ObservabilityConfig> {
        &self.config
    }

    /// Whether a request to `path` is observed at all
    pub fn should_instrument(&self, path: &str) -> bool {
        self.config.is_active() && self.paths.contains(path)
    }

    /// Begin observing a request
    ///
    /// Returns `None` for requests that are not instrumented. Otherwise a
    /// fresh stash is inserted into the request extensions.
    pub fn start(&self, req: &mut Request) -> Option<InFlightRequest> {
        if !self.should_instrument(req.uri().path()) {
            return None;
        }

        let stash = OperationStash::new();
        req.extensions_mut().insert(stash.clone());
        Some(InFlightRequest {
            stash,
            started: Instant::now(),
        })
    }

    /// Finish observing a request and emit its metrics and log record
    ///
    /// `status` is `None` when the inner service produced no response.
    /// Returns `None`, recording nothing, when no GraphQL operation was
    /// attempted and the response is not an HTTP error.
    pub fn complete(
        &self,
        inflight: InFlightRequest,
        status: Option<StatusCode>,
    ) -> Option<CompletedOperation> {
        let duration = inflight.started.elapsed();
        let http_failure = status
            .map(|status| status.is_client_error() || status.is_server_error())
            .unwrap_or(true);
        if !inflight.stash.was_attempted() && !http_failure {
            return None;
        }

        let (metadata, graphql_error) = inflight.stash.take();

        let error_type = match (graphql_error, status) {
            (Some(error_type), _) => Some(error_type),
            (None, Some(status)) if status.is_client_error() || status.is_server_error() => {
                Some(format!("HTTP {}", status.as_u16()))
            }
            (None, Some(_)) => None,
            (None, None) => Some(SERVICE_ERROR.to_string()),
        };

        let completed = CompletedOperation {
            metadata,
            status: if error_type.is_some() {
                OperationStatus::Error
            } else {
                OperationStatus::Success
            },
            error_type,
            duration,
        };

        if self.config.graphql_metrics_enabled {
            super::record_request(&completed);
        }
        if self.config.query_logging_enabled {
            emit_query_log(&QueryLogRecord::from_completed(&completed, &self.config));
        }

        Some(completed)
    }
}

/// A request being observed by [`RequestRecorder`]
#[derive(Debug)]
pub struct InFlightRequest {
    stash: OperationStash,
    started: Instant,
}

impl InFlightRequest {
    pub fn stash(&self) -> &OperationStash {
        &self.stash
    }
}

/// Tower layer for GraphQL request observation
#[derive(Clone)]
pub struct GraphQLObservabilityLayer {
    recorder: RequestRecorder,
}

impl GraphQLObservabilityLayer {
    /// Create the layer, registering the GraphQL metrics if needed
    pub fn new(config: ObservabilityConfig) -> Self {
        Self::with_shared_config(Arc::new(config))
    }

    pub fn with_shared_config(config: Arc<ObservabilityConfig>) -> Self {
        if config.graphql_metrics_enabled {
            if let Err(e) = super::init_metrics() {
                tracing::warn!(error = %e, "Failed to register GraphQL metrics");
            }
        }
        Self {
            recorder: RequestRecorder::with_shared_config(config),
        }
    }

    pub fn recorder(&self) -> &RequestRecorder {
        &self.recorder
    }
}

impl<S> Layer<S> for GraphQLObservabilityLayer {
    type Service = GraphQLObservabilityService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GraphQLObservabilityService {
            inner,
            recorder: self.recorder.clone(),
        }
    }
}

/// Tower service produced by [`GraphQLObservabilityLayer`]
#[derive(Clone)]
pub struct GraphQLObservabilityService<S> {
    inner: S,
    recorder: RequestRecorder,
}

impl<S> Service<Request> for GraphQLObservabilityService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let Some(inflight) = self.recorder.start(&mut req) else {
            return Box::pin(self.inner.call(req));
        };

        let recorder = self.recorder.clone();
        let future = self.inner.call(req);

        Box::pin(async move {
            let result = future.await;
            let status = result.as_ref().ok().map(|response| response.status());
            recorder.complete(inflight, status);
            result
        })
    }
}

/// Axum middleware function for GraphQL request observation
///
/// # Example
/// ```no_run
/// use axum::{middleware, routing::post, Router};
/// use graphql_observability::metrics::{record_graphql_request, RequestRecorder};
/// use graphql_observability::ObservabilityConfig;
///
/// let recorder = RequestRecorder::new(ObservabilityConfig::default());
/// let app: Router = Router::new()
///     .route("/graphql", post(|| async { "{}" }))
///     .layer(middleware::from_fn_with_state(recorder, record_graphql_request));
/// ```
pub async fn record_graphql_request(
    State(recorder): State<RequestRecorder>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(inflight) = recorder.start(&mut req) else {
        return next.run(req).await;
    };

    let response = next.run(req).await;
    recorder.complete(inflight, Some(response.status()));
    response
}
