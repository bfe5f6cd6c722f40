use std::sync::Arc;

use fal_proxy::{
    build_router,
    config::{AppConfig, TelemetryConfig},
    handlers::AppState,
    media::FalClient,
    proxy::build_http_client,
    telemetry::{install_recorder, ConsolePlugin, MetricsRegistry, PrometheusExporter},
};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let telemetry_config = TelemetryConfig::default();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    if telemetry_config.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .init();
    }

    // Load configuration
    info!("Loading application configuration");
    let config = match AppConfig::new() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    debug!(
        "Configuration loaded: port={}, host={}, fal_base={}, fal_run={}, timeout={:?}",
        config.port, config.host, config.fal_base_url, config.fal_run_url, config.timeout
    );
    if config.fal_key().is_err() {
        error!("FAL_KEY is not set; every fal call will fail until it is");
    }

    let http_client = match build_http_client(config.timeout) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let metrics_registry = Arc::new(MetricsRegistry::new(telemetry_config.debug_mode));
    if telemetry_config.debug_mode {
        debug!("Registering Console plugin for metrics");
        metrics_registry
            .register_exporter(Box::new(ConsolePlugin::new()))
            .await;
    }
    let mut metrics_handle = None;
    if telemetry_config.prometheus_enabled {
        match install_recorder() {
            Ok(handle) => {
                debug!("Registering Prometheus exporter, scrape at /metrics");
                metrics_registry
                    .register_exporter(Box::new(PrometheusExporter::new("fal_proxy".to_string())))
                    .await;
                metrics_handle = Some(handle);
            }
            Err(e) => error!("Failed to install Prometheus recorder: {}", e),
        }
    }

    let state = AppState {
        media: Arc::new(FalClient::new(config.clone(), http_client.clone())),
        http_client,
        config: config.clone(),
        metrics_handle,
    };
    let app = build_router(state, metrics_registry);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("fal proxy listening on {} (forwarding to {})", addr, config.fal_base_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|e| {
            error!("Server error: {}", e);
            std::process::exit(1);
        });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler")
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            debug!("CTRL+C signal received");
        },
        _ = terminate => {
            debug!("Terminate signal received");
        },
    }
    info!("Shutdown signal received, starting graceful shutdown");
}
