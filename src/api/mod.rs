pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::config::ObservabilityConfig;
use crate::graphql::{build_schema, InventorySchema};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub schema: InventorySchema,
    pub config: Arc<ObservabilityConfig>,
}

impl AppState {
    /// Build the sample schema with the given observability settings
    pub fn new(config: ObservabilityConfig) -> Self {
        let config = Arc::new(config);
        Self {
            schema: build_schema(config.clone()),
            config,
        }
    }

    /// Serve a custom schema
    pub fn with_schema(schema: InventorySchema, config: Arc<ObservabilityConfig>) -> Self {
        Self { schema, config }
    }
}
