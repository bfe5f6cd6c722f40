use super::metrics::MetricsRegistry;
use super::{model_label, RequestMetrics, Route};
use axum::{
    body::{Body, HttpBody},
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, Response},
    middleware::Next,
};
use std::{sync::Arc, time::Instant};
use tracing::{debug, Instrument};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tags the request with an id, times it, and hands the result to the registry.
///
/// Bodies are never buffered here; sizes come from size hints or `content-length`.
pub async fn metrics_middleware(
    State(registry): State<Arc<MetricsRegistry>>,
    req: Request<Body>,
    next: Next,
) -> Response<Body> {
    let start = Instant::now();
    let request_id = Uuid::new_v4().to_string();

    let path = req.uri().path().to_string();
    let method = req.method().to_string();
    let route = Route::from_path(&path);
    let request_size = declared_length(req.headers());
    let model = match route {
        Route::Forward => path.strip_prefix("/fal/").and_then(model_label),
        _ => None,
    };

    debug!(request_id = %request_id, route = route.as_str(), %method, %path, "Received request");

    let span = tracing::info_span!("request", request_id = %request_id, route = route.as_str());
    let mut response = next.run(req).instrument(span).await;

    let status = response.status();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let metrics = RequestMetrics {
        request_id,
        route,
        path,
        method,
        model,
        total_latency: start.elapsed(),
        request_size,
        response_size: response
            .body()
            .size_hint()
            .exact()
            .or_else(|| declared_length(response.headers())),
        status_code: status.as_u16(),
        error_type: (status.is_client_error() || status.is_server_error())
            .then(|| status.canonical_reason().unwrap_or("error").to_string()),
    };

    registry.record_metrics(metrics).await;

    response
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}
