//! # dsc-api — Binary Entry Point
//!
//! Starts the Axum HTTP server in the role named by `DSC_ROLE`.
//! Binds to configurable port (default 8080).

use dsc_api::state::{AppConfig, AppState, Role};
use metrics_exporter_prometheus::PrometheusBuilder;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Invalid configuration: {e}");
        e
    })?;
    let port = config.port;

    let state = match config.role {
        Role::Provider => AppState::provider(config),
        Role::Consumer => AppState::consumer_from_env(config).map_err(|e| {
            tracing::error!("Consumer configuration failed: {e}");
            e
        })?,
    };

    // Counters are recorded either way; without a recorder they are no-ops.
    let state = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            describe_metrics();
            state.with_metrics(handle)
        }
        Err(e) => {
            tracing::warn!("Prometheus recorder not installed: {e}. /metrics will return 503.");
            state
        }
    };

    let role = state.role();
    let app = dsc_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%role, "dataspace connector listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn describe_metrics() {
    metrics::describe_counter!(
        "dsc_transitions_total",
        "Provider state transitions by entity, action and outcome"
    );
    metrics::describe_counter!(
        "dsc_peer_calls_total",
        "Consumer calls to the provider by action and outcome"
    );
}

/// Structured tracing with `EnvFilter` (default `info`). JSON lines when
/// `DSC_LOG_FORMAT=json`.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = std::env::var("DSC_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
