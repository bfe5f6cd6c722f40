use crate::telemetry::{metrics::MetricsExporter, RequestMetrics};
use async_trait::async_trait;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Installs the process-wide Prometheus recorder.
///
/// The returned handle renders the scrape text served at `/metrics`. Only one
/// recorder can be installed per process; a second call fails.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Records through the `metrics` facade into whichever recorder is installed.
///
/// Labels are kept to `route`, `method`, a bounded `model` and `status` so the
/// number of series does not grow with request ids.
pub struct PrometheusExporter {
    namespace: String,
}

impl PrometheusExporter {
    pub fn new(namespace: String) -> Self {
        Self { namespace }
    }

    pub fn record(&self, metrics: &RequestMetrics) {
        let labels = [
            ("route", metrics.route.as_str().to_string()),
            ("method", metrics.method.clone()),
            ("model", metrics.model.clone().unwrap_or_default()),
            ("status", metrics.status_code.to_string()),
        ];

        let name = format!("{}_request_latency", self.namespace);
        histogram!(name, &labels).record(metrics.total_latency.as_secs_f64());

        if let Some(size) = metrics.request_size {
            let name = format!("{}_request_size", self.namespace);
            gauge!(name, &labels).set(size as f64);
        }
        if let Some(size) = metrics.response_size {
            let name = format!("{}_response_size", self.namespace);
            gauge!(name, &labels).set(size as f64);
        }

        let name = format!("{}_requests_total", self.namespace);
        counter!(name, &labels).increment(1);

        if metrics.error_type.is_some() {
            let name = format!("{}_error_count", self.namespace);
            counter!(name, &labels).increment(1);
        }
    }
}

#[async_trait]
impl MetricsExporter for PrometheusExporter {
    async fn export_metrics(
        &self,
        metrics: RequestMetrics,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.record(&metrics);
        Ok(())
    }

    fn name(&self) -> &str {
        "prometheus"
    }
}
