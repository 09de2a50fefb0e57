//! Request-scoped operation metadata
//!
//! The [`OperationStash`] is created by the request-cycle recorder, handed
//! to the GraphQL executor through the request data, filled in by the
//! resolution extension and read back once the response is built.

use async_graphql::parser::types::{OperationDefinition, OperationType, Selection};
use async_graphql::Name;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use strum::{AsRefStr, Display};

/// Label used when no authenticated user is attached to the request
pub const ANONYMOUS: &str = "anonymous";

/// Label used when the operation never reached root field resolution
pub const UNKNOWN: &str = "unknown";

/// GraphQL operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl From<OperationType> for OperationKind {
    fn from(ty: OperationType) -> Self {
        match ty {
            OperationType::Query => OperationKind::Query,
            OperationType::Mutation => OperationKind::Mutation,
            OperationType::Subscription => OperationKind::Subscription,
        }
    }
}

/// Outcome of a completed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OperationStatus {
    Success,
    Error,
}

/// Authenticated user attached to a request by the host application
///
/// Insert it into the axum request extensions (or the async-graphql request
/// data) to label per-user metrics and log records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

impl AuthenticatedUser {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Metadata captured at root field resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationMetadata {
    pub operation_type: OperationKind,
    pub operation_name: String,
    pub user: String,
    /// `None` when depth tracking is off or analysis failed
    pub depth: Option<usize>,
    /// `None` when complexity tracking is off or analysis failed
    pub complexity: Option<usize>,
    pub query: Option<String>,
    pub variables: Option<String>,
}

impl OperationMetadata {
    pub fn new(
        operation_type: OperationKind,
        operation_name: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            operation_type,
            operation_name: operation_name.into(),
            user: user.into(),
            depth: None,
            complexity: None,
            query: None,
            variables: None,
        }
    }

    /// Fill fields that are still unset from `other`, never overwriting
    fn merge_missing(&mut self, other: OperationMetadata) {
        if self.depth.is_none() {
            self.depth = other.depth;
        }
        if self.complexity.is_none() {
            self.complexity = other.complexity;
        }
        if self.query.is_none() {
            self.query = other.query;
        }
        if self.variables.is_none() {
            self.variables = other.variables;
        }
    }
}

/// Label for an operation: its explicit name, else the sorted root field
/// names joined by commas (e.g. `devices,locations`), else `anonymous`
pub fn operation_label(name: Option<&Name>, operation: &OperationDefinition) -> String {
    if let Some(name) = name {
        return name.to_string();
    }

    let mut root_fields: Vec<&str> = operation
        .selection_set
        .node
        .items
        .iter()
        .filter_map(|item| match &item.node {
            Selection::Field(field) => Some(field.node.name.node.as_str()),
            _ => None,
        })
        .collect();

    if root_fields.is_empty() {
        return ANONYMOUS.to_string();
    }
    root_fields.sort_unstable();
    root_fields.join(",")
}

#[derive(Debug, Default)]
struct StashState {
    // a GraphQL request reached the executor, successfully or not
    attempted: bool,
    metadata: Option<OperationMetadata>,
    error_type: Option<String>,
}

/// Request-scoped storage shared between the recorder and the extension
///
/// Cloning is cheap; all clones point at the same request state.
#[derive(Debug, Clone, Default)]
pub struct OperationStash {
    inner: Arc<Mutex<StashState>>,
}

impl OperationStash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach metadata to the request
    ///
    /// The first call wins; later calls only fill fields still unset.
    /// Returns `true` if this call created the metadata.
    pub fn attach(&self, metadata: OperationMetadata) -> bool {
        let mut state = self.inner.lock();
        state.attempted = true;
        match state.metadata.as_mut() {
            Some(existing) => {
                existing.merge_missing(metadata);
                false
            }
            None => {
                state.metadata = Some(metadata);
                true
            }
        }
    }

    /// Record an error for the operation. The first error type is kept.
    pub fn mark_error(&self, error_type: impl Into<String>) {
        let mut state = self.inner.lock();
        state.attempted = true;
        if state.error_type.is_none() {
            state.error_type = Some(error_type.into());
        }
    }

    /// Note that a GraphQL request was handed to the executor
    pub fn mark_attempted(&self) {
        self.inner.lock().attempted = true;
    }

    /// Whether any GraphQL operation was attempted on this request
    pub fn was_attempted(&self) -> bool {
        self.inner.lock().attempted
    }

    pub fn metadata(&self) -> Option<OperationMetadata> {
        self.inner.lock().metadata.clone()
    }

    pub fn error_type(&self) -> Option<String> {
        self.inner.lock().error_type.clone()
    }

    pub fn has_metadata(&self) -> bool {
        self.inner.lock().metadata.is_some()
    }

    /// Take the captured state, leaving the stash empty
    pub fn take(&self) -> (Option<OperationMetadata>, Option<String>) {
        let mut state = self.inner.lock();
        (state.metadata.take(), state.error_type.take())
    }
}

/// An operation finalized by the request-cycle recorder
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedOperation {
    /// Absent when execution never reached root field resolution
    pub metadata: Option<OperationMetadata>,
    pub status: OperationStatus,
    pub error_type: Option<String>,
    pub duration: Duration,
}

impl CompletedOperation {
    pub fn operation_type(&self) -> &str {
        self.metadata
            .as_ref()
            .map(|m| m.operation_type.as_ref())
            .unwrap_or(UNKNOWN)
    }

    pub fn operation_name(&self) -> &str {
        self.metadata
            .as_ref()
            .map(|m| m.operation_name.as_str())
            .unwrap_or(UNKNOWN)
    }

    pub fn user(&self) -> &str {
        self.metadata
            .as_ref()
            .map(|m| m.user.as_str())
            .unwrap_or(ANONYMOUS)
    }
}
