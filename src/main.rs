use anyhow::Context;
use clap::Parser;
use graphql_observability::{
    api::{build_router, AppState},
    config::ObservabilityConfig,
    logging,
};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "graphql-observability")]
#[command(about = "Demo GraphQL server with Prometheus metrics and query logging", long_about = None)]
struct Cli {
    /// Settings file; falls back to GRAPHQL_OBSERVABILITY_CONFIG or config/observability.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "GRAPHQL_OBSERVABILITY_BIND", default_value = "127.0.0.1:8000")]
    bind: SocketAddr,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init_tracing(cli.json_logs);

    let config = match &cli.config {
        Some(path) => ObservabilityConfig::load_from(path),
        None => ObservabilityConfig::load(),
    }
    .context("Failed to load observability configuration")?;

    tracing::info!("Starting GraphQL observability demo v{}", env!("CARGO_PKG_VERSION"));

    if config.graphql_metrics_enabled {
        if let Err(e) = graphql_observability::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        } else {
            tracing::info!("Prometheus metrics initialized");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    if config.query_logging_enabled {
        tracing::info!(
            log_query_body = config.log_query_body,
            log_query_variables = config.log_query_variables,
            "Query logging enabled"
        );
    }

    let app = build_router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;

    tracing::info!("HTTP server listening on http://{}", cli.bind);
    tracing::info!("   GraphQL API: http://{}/graphql", cli.bind);
    tracing::info!("   Metrics: http://{}/metrics", cli.bind);
    tracing::info!("   Health check: http://{}/health", cli.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("Shutting down gracefully...");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}
