pub mod exporters;
pub mod metrics;
pub mod middleware;
pub mod plugins;

pub use self::{
    exporters::prometheus::{install_recorder, PrometheusExporter},
    metrics::{MetricsExporter, MetricsRegistry},
    middleware::{metrics_middleware, REQUEST_ID_HEADER},
    plugins::ConsolePlugin,
};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which part of the proxy served a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Ui,
    Health,
    Forward,
    Edit,
    Metrics,
    Other,
}

impl Route {
    pub fn from_path(path: &str) -> Self {
        match path {
            "/" => Route::Ui,
            "/health" => Route::Health,
            "/ui/edit" => Route::Edit,
            "/metrics" => Route::Metrics,
            p if p.starts_with("/fal/") => Route::Forward,
            _ => Route::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Ui => "ui",
            Route::Health => "health",
            Route::Forward => "forward",
            Route::Edit => "edit",
            Route::Metrics => "metrics",
            Route::Other => "other",
        }
    }
}

/// Segments kept when deriving a model label from a forwarded path.
const MODEL_LABEL_SEGMENTS: usize = 3;

/// Bounded model label for a forwarded path such as `fal-ai/flux/dev`.
///
/// Everything from a `requests` segment on is dropped, so queue status and
/// result URLs (`fal-ai/flux/dev/requests/<id>/status`) share one label with
/// the submit call. At most three segments are kept.
pub fn model_label(forward_path: &str) -> Option<String> {
    let segments: Vec<&str> = forward_path
        .split('/')
        .filter(|s| !s.is_empty())
        .take_while(|s| *s != "requests")
        .take(MODEL_LABEL_SEGMENTS)
        .collect();
    (!segments.is_empty()).then(|| segments.join("/"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMetrics {
    // Request metadata
    pub request_id: String,
    pub route: Route,
    pub path: String,
    pub method: String,
    /// fal endpoint addressed by a forwarded request, e.g. `fal-ai/flux/dev`.
    pub model: Option<String>,

    // Timing
    pub total_latency: Duration,

    // Sizes as declared by `content-length`
    pub request_size: Option<u64>,
    pub response_size: Option<u64>,

    // Status
    pub status_code: u16,
    pub error_type: Option<String>,
}

impl Default for RequestMetrics {
    fn default() -> Self {
        Self {
            request_id: String::new(),
            route: Route::Other,
            path: String::new(),
            method: String::new(),
            model: None,
            total_latency: Duration::default(),
            request_size: None,
            response_size: None,
            status_code: 0,
            error_type: None,
        }
    }
}
