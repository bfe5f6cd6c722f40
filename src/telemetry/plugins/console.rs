use crate::telemetry::{metrics::MetricsExporter, RequestMetrics};
use async_trait::async_trait;
use std::error::Error;
use tracing::info;

/// Writes one log line per request. Registered when `DEBUG_METRICS` is on.
pub struct ConsolePlugin;

impl ConsolePlugin {
    pub fn new() -> Self {
        ConsolePlugin
    }
}

impl Default for ConsolePlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsExporter for ConsolePlugin {
    async fn export_metrics(&self, metrics: RequestMetrics) -> Result<(), Box<dyn Error + Send + Sync>> {
        info!(
            request_id = %metrics.request_id,
            route = metrics.route.as_str(),
            method = %metrics.method,
            path = %metrics.path,
            model = metrics.model.as_deref().unwrap_or("-"),
            status = metrics.status_code,
            latency_ms = metrics.total_latency.as_millis() as u64,
            "request metrics"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
