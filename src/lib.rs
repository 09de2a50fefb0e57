//! Prometheus metrics and structured query logging for async-graphql APIs
//! served by axum.
//!
//! Two pieces cooperate through a request-scoped [`graphql::OperationStash`]:
//! - [`metrics::GraphQLObservabilityLayer`] wraps the HTTP request cycle
//! - [`ObservabilityExtension`] observes parsing and field resolution

pub mod api;
pub mod config;
pub mod error;
pub mod graphql;
pub mod logging;
pub mod metrics;

pub use crate::config::ObservabilityConfig;
pub use error::{ObservabilityError, Result};
pub use graphql::{AuthenticatedUser, ObservabilityContext, ObservabilityExtension};
pub use metrics::GraphQLObservabilityLayer;
