//! Field resolution extension
//!
//! Hooks the async-graphql extension pipeline to capture operation
//! metadata at root field resolution and, optionally, time every field.
//! Operations whose root is answered without a resolver call (a lone
//! `__typename`) are captured once execution returns.
//! The extension is inert for requests that carry no [`OperationStash`],
//! so schemas mounted outside the instrumented paths pay nothing.

use async_graphql::extensions::{
    Extension, ExtensionContext, ExtensionFactory, NextExecute, NextParseQuery, NextResolve,
    NextValidation, ResolveInfo,
};
use async_graphql::parser::types::ExecutableDocument;
use async_graphql::{Response, ServerError, ServerResult, ValidationResult, Value, Variables};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::analysis::{analyze_operation, AnalysisError, QueryShape};
use super::operation::{
    operation_label, AuthenticatedUser, OperationKind, OperationMetadata, OperationStash,
    ANONYMOUS,
};
use crate::config::ObservabilityConfig;
use crate::metrics;

/// Error type recorded when the query text cannot be parsed
pub const PARSE_ERROR: &str = "ParseError";

/// Error type recorded when the document fails validation
pub const VALIDATION_ERROR: &str = "ValidationError";

/// GraphQL observability extension
///
/// ```no_run
/// use async_graphql::{EmptyMutation, EmptySubscription, Object, Schema};
/// use graphql_observability::{ObservabilityConfig, ObservabilityExtension};
///
/// struct Query;
///
/// #[Object]
/// impl Query {
///     async fn ping(&self) -> &str {
///         "pong"
///     }
/// }
///
/// let schema = Schema::build(Query, EmptyMutation, EmptySubscription)
///     .extension(ObservabilityExtension::new(ObservabilityConfig::default()))
///     .finish();
/// ```
#[derive(Clone)]
pub struct ObservabilityExtension {
    config: Arc<ObservabilityConfig>,
}

impl ObservabilityExtension {
    pub fn new(config: ObservabilityConfig) -> Self {
        Self::with_shared_config(Arc::new(config))
    }

    /// Share one configuration with the request-cycle recorder
    pub fn with_shared_config(config: Arc<ObservabilityConfig>) -> Self {
        Self { config }
    }
}

impl ExtensionFactory for ObservabilityExtension {
    fn create(&self) -> Arc<dyn Extension> {
        Arc::new(ObservabilityExtensionImpl {
            config: self.config.clone(),
            root_seen: AtomicBool::new(false),
            state: Mutex::new(RequestState::default()),
        })
    }
}

// What root capture needs from one operation of the parsed document
struct OperationSummary {
    name: Option<String>,
    kind: OperationKind,
    label: String,
    // None when neither depth nor complexity is tracked
    shape: Option<Result<QueryShape, AnalysisError>>,
}

// Filled in by the parse and execute hooks, read at root resolution
#[derive(Default)]
struct RequestState {
    operations: Vec<OperationSummary>,
    operation_name: Option<String>,
    query: Option<String>,
    variables: Option<String>,
}

struct ObservabilityExtensionImpl {
    config: Arc<ObservabilityConfig>,
    root_seen: AtomicBool,
    state: Mutex<RequestState>,
}

impl ObservabilityExtensionImpl {
    fn field_timing_enabled(&self) -> bool {
        self.config.graphql_metrics_enabled && self.config.track_field_resolution
    }

    /// Build and attach operation metadata. Runs once per request.
    fn capture_root(&self, ctx: &ExtensionContext<'_>, stash: &OperationStash) {
        if self.root_seen.swap(true, Ordering::AcqRel) {
            return;
        }

        let Some(metadata) = self.build_metadata(ctx) else {
            debug!("GraphQL root resolution without a captured document");
            return;
        };

        if self.config.graphql_metrics_enabled {
            record_shape_metrics(&self.config, &metadata);
        }
        stash.attach(metadata);
    }

    fn summarize(&self, document: &ExecutableDocument) -> Vec<OperationSummary> {
        let track_shape = self.config.track_query_depth || self.config.track_query_complexity;

        document
            .operations
            .iter()
            .map(|(name, operation)| OperationSummary {
                name: name.map(|n| n.to_string()),
                kind: OperationKind::from(operation.node.ty),
                label: operation_label(name, &operation.node),
                shape: track_shape
                    .then(|| analyze_operation(&operation.node, &document.fragments)),
            })
            .collect()
    }

    fn build_metadata(&self, ctx: &ExtensionContext<'_>) -> Option<OperationMetadata> {
        let mut state = self.state.lock();
        let operations = std::mem::take(&mut state.operations);
        let summary = select_summary(operations, state.operation_name.as_deref())?;

        let user = ctx
            .data_opt::<AuthenticatedUser>()
            .map(|user| user.name().to_string())
            .unwrap_or_else(|| ANONYMOUS.to_string());

        let mut metadata = OperationMetadata::new(summary.kind, summary.label, user);

        if let Some(shape) = summary.shape {
            match shape {
                Ok(shape) => {
                    if self.config.track_query_depth {
                        metadata.depth = Some(shape.depth);
                    }
                    if self.config.track_query_complexity {
                        metadata.complexity = Some(shape.complexity);
                    }
                }
                Err(e) => warn!(
                    operation_name = %metadata.operation_name,
                    error = %e,
                    "GraphQL query shape analysis failed"
                ),
            }
        }

        metadata.query = state.query.take();
        metadata.variables = state.variables.take();
        Some(metadata)
    }
}

/// Pick the summary of the operation the engine executes
///
/// Without an operation name the document must hold exactly one operation.
fn select_summary(
    mut operations: Vec<OperationSummary>,
    operation_name: Option<&str>,
) -> Option<OperationSummary> {
    match operation_name {
        Some(wanted) => operations
            .into_iter()
            .find(|summary| summary.name.as_deref() == Some(wanted)),
        None if operations.len() == 1 => operations.pop(),
        None => None,
    }
}

fn record_shape_metrics(config: &ObservabilityConfig, metadata: &OperationMetadata) {
    let operation_name = metadata.operation_name.as_str();

    if let Some(depth) = metadata.depth {
        metrics::record_query_depth(operation_name, depth);
    }
    if let Some(complexity) = metadata.complexity {
        metrics::record_query_complexity(operation_name, complexity);
    }
    if config.track_per_user {
        metrics::record_user_request(&metadata.user, metadata.operation_type, operation_name);
    }
}

/// Classify a GraphQL error by its `code` extension, falling back to `default`
pub fn error_type_of(error: &ServerError, default: &str) -> String {
    error
        .extensions
        .as_ref()
        .and_then(|extensions| serde_json::to_value(extensions).ok())
        .and_then(|value| {
            value
                .get("code")
                .and_then(|code| code.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| default.to_string())
}

/// Query text on a single line, as logged
fn normalize_query(query: &str) -> Option<String> {
    let normalized = query.replace(['\r', '\n'], " ");
    let normalized = normalized.trim();
    (!normalized.is_empty()).then(|| normalized.to_string())
}

/// Compact JSON of the request variables, `None` when there are none
fn serialize_variables(variables: &Variables) -> Option<String> {
    if variables.is_empty() {
        return None;
    }
    match serde_json::to_string(variables) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(error = %e, "Failed to serialize GraphQL variables for logging");
            None
        }
    }
}

#[async_trait::async_trait]
impl Extension for ObservabilityExtensionImpl {
    async fn parse_query(
        &self,
        ctx: &ExtensionContext<'_>,
        query: &str,
        variables: &Variables,
        next: NextParseQuery<'_>,
    ) -> ServerResult<ExecutableDocument> {
        let Some(stash) = ctx.data_opt::<OperationStash>() else {
            return next.run(ctx, query, variables).await;
        };

        match next.run(ctx, query, variables).await {
            Ok(document) => {
                stash.mark_attempted();
                let operations = self.summarize(&document);
                let mut state = self.state.lock();
                state.operations = operations;
                if self.config.query_logging_enabled && self.config.log_query_body {
                    state.query = normalize_query(query);
                }
                if self.config.query_logging_enabled && self.config.log_query_variables {
                    state.variables = serialize_variables(variables);
                }
                Ok(document)
            }
            Err(e) => {
                stash.mark_attempted();
                stash.mark_error(PARSE_ERROR);
                Err(e)
            }
        }
    }

    async fn validation(
        &self,
        ctx: &ExtensionContext<'_>,
        next: NextValidation<'_>,
    ) -> Result<ValidationResult, Vec<ServerError>> {
        let result = next.run(ctx).await;
        if result.is_err() {
            if let Some(stash) = ctx.data_opt::<OperationStash>() {
                stash.mark_error(VALIDATION_ERROR);
            }
        }
        result
    }

    async fn execute(
        &self,
        ctx: &ExtensionContext<'_>,
        operation_name: Option<&str>,
        next: NextExecute<'_>,
    ) -> Response {
        let Some(stash) = ctx.data_opt::<OperationStash>() else {
            return next.run(ctx, operation_name).await;
        };

        self.state.lock().operation_name = operation_name.map(str::to_string);
        let response = next.run(ctx, operation_name).await;

        // roots answered without a resolver call, e.g. `{ __typename }`
        if self.config.is_active() && !self.root_seen.load(Ordering::Acquire) {
            self.capture_root(ctx, stash);
        }

        if let Some(error) = response.errors.first() {
            stash.mark_error(error_type_of(error, "GraphQLError"));
        }
        response
    }

    async fn resolve(
        &self,
        ctx: &ExtensionContext<'_>,
        info: ResolveInfo<'_>,
        next: NextResolve<'_>,
    ) -> ServerResult<Option<Value>> {
        let Some(stash) = ctx.data_opt::<OperationStash>() else {
            return next.run(ctx, info).await;
        };

        let is_root = info.path_node.parent.is_none();
        if is_root && self.config.is_active() {
            self.capture_root(ctx, stash);
        }

        let parent_type = info.parent_type;
        let field_name = info.name;
        let start = self.field_timing_enabled().then(Instant::now);

        let result = next.run(ctx, info).await;

        if let Some(start) = start {
            metrics::record_field_resolution(parent_type, field_name, start.elapsed().as_secs_f64());
        }

        if is_root {
            if let Err(error) = &result {
                let error_type = error_type_of(error, "ResolverError");
                if self.config.graphql_metrics_enabled {
                    if let Some(metadata) = stash.metadata() {
                        metrics::record_error(
                            metadata.operation_type,
                            &metadata.operation_name,
                            &error_type,
                        );
                    }
                }
                stash.mark_error(error_type);
            }
        }

        result
    }
}
