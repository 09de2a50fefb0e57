//! Observability settings
//!
//! A single typed settings block, resolved once at startup from built-in
//! defaults, an optional TOML file and `GRAPHQL_OBSERVABILITY_*`
//! environment variables.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{ObservabilityError, Result};

/// Environment variable naming the settings file
pub const CONFIG_PATH_ENV: &str = "GRAPHQL_OBSERVABILITY_CONFIG";

/// Settings file used when [`CONFIG_PATH_ENV`] is not set
pub const DEFAULT_CONFIG_PATH: &str = "config/observability.toml";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "GRAPHQL_OBSERVABILITY";

/// Path instrumented when no `graphql_paths` are configured
pub const DEFAULT_GRAPHQL_PATH: &str = "/graphql";

/// Configuration for GraphQL metrics collection and query logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Master switch for Prometheus metrics
    #[serde(default = "default_true")]
    pub graphql_metrics_enabled: bool,

    /// Record the query nesting depth histogram
    #[serde(default = "default_true")]
    pub track_query_depth: bool,

    /// Record the query field count histogram
    #[serde(default = "default_true")]
    pub track_query_complexity: bool,

    /// Record per-field resolver duration.
    /// High cardinality: one series per (type, field) pair.
    #[serde(default)]
    pub track_field_resolution: bool,

    /// Record the per-user request counter
    #[serde(default = "default_true")]
    pub track_per_user: bool,

    /// HTTP paths treated as GraphQL endpoints
    #[serde(default = "default_graphql_paths")]
    pub graphql_paths: Vec<String>,

    /// Emit one structured log record per operation
    #[serde(default)]
    pub query_logging_enabled: bool,

    /// Include the query text in log records
    #[serde(default)]
    pub log_query_body: bool,

    /// Include the query variables in log records.
    /// Variables may carry credentials or personal data.
    #[serde(default)]
    pub log_query_variables: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            graphql_metrics_enabled: default_true(),
            track_query_depth: default_true(),
            track_query_complexity: default_true(),
            track_field_resolution: false,
            track_per_user: default_true(),
            graphql_paths: default_graphql_paths(),
            query_logging_enabled: false,
            log_query_body: false,
            log_query_variables: false,
        }
    }
}

impl ObservabilityConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from file and environment
    ///
    /// The file named by `GRAPHQL_OBSERVABILITY_CONFIG` (or
    /// `config/observability.toml`) is optional.
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&config_path))
    }

    /// Load configuration from an explicit file path plus environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("graphql_paths"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        config.warn_on_sensitive_settings();
        Ok(config)
    }

    /// Create a configuration with metrics and logging switched off
    pub fn disabled() -> Self {
        Self {
            graphql_metrics_enabled: false,
            query_logging_enabled: false,
            ..Default::default()
        }
    }

    /// Enable or disable the metrics master switch
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.graphql_metrics_enabled = enabled;
        self
    }

    /// Enable per-field resolver timing
    pub fn with_field_resolution(mut self, enabled: bool) -> Self {
        self.track_field_resolution = enabled;
        self
    }

    /// Enable query logging, optionally with query text and variables
    pub fn with_query_logging(mut self, log_body: bool, log_variables: bool) -> Self {
        self.query_logging_enabled = true;
        self.log_query_body = log_body;
        self.log_query_variables = log_variables;
        self
    }

    /// Replace the instrumented path list
    pub fn with_graphql_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.graphql_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the request-cycle recorder has anything to do at all
    pub fn is_active(&self) -> bool {
        self.graphql_metrics_enabled || self.query_logging_enabled
    }

    /// Resolve the set of instrumented paths, falling back to the default
    /// when none are configured
    pub fn graphql_path_set(&self) -> HashSet<String> {
        let paths: HashSet<String> = self
            .graphql_paths
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        if paths.is_empty() {
            return default_graphql_paths().into_iter().collect();
        }
        paths
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = self
            .graphql_paths
            .iter()
            .map(|p| p.trim())
            .find(|p| !p.is_empty() && !p.starts_with('/'))
        {
            return Err(ObservabilityError::Configuration(format!(
                "graphql path '{}' must start with '/'",
                path
            )));
        }

        Ok(())
    }

    fn warn_on_sensitive_settings(&self) {
        if self.query_logging_enabled && self.log_query_variables {
            tracing::warn!(
                "log_query_variables is enabled: GraphQL variables may contain sensitive data"
            );
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_graphql_paths() -> Vec<String> {
    vec![DEFAULT_GRAPHQL_PATH.to_string()]
}
