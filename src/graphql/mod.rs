//! GraphQL instrumentation module
//!
//! - Query shape analysis (depth and complexity)
//! - Request-scoped operation metadata
//! - The async-graphql extension that fills it in
//! - A small inventory schema for the demo server

pub mod analysis;
pub mod extension;
pub mod operation;
pub mod schema;

pub use analysis::{analyze_document, analyze_operation, AnalysisError, QueryShape};
pub use extension::ObservabilityExtension;
pub use operation::{
    operation_label, AuthenticatedUser, CompletedOperation, OperationKind, OperationMetadata,
    OperationStash, OperationStatus, ANONYMOUS, UNKNOWN,
};
pub use schema::{build_schema, InventorySchema};

use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

/// Observability data carried from the HTTP request into GraphQL execution
///
/// Extracts the stash inserted by the request-cycle recorder and any
/// [`AuthenticatedUser`] the host placed in the request extensions.
#[derive(Debug, Clone, Default)]
pub struct ObservabilityContext {
    pub stash: Option<OperationStash>,
    pub user: Option<AuthenticatedUser>,
}

impl ObservabilityContext {
    /// Attach the stash and user to a GraphQL request
    pub fn apply(self, mut request: async_graphql::Request) -> async_graphql::Request {
        if let Some(stash) = self.stash {
            request = request.data(stash);
        }
        if let Some(user) = self.user {
            request = request.data(user);
        }
        request
    }
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for ObservabilityContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            stash: parts.extensions.get::<OperationStash>().cloned(),
            user: parts.extensions.get::<AuthenticatedUser>().cloned(),
        })
    }
}
