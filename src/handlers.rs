use axum::{
    body::Bytes,
    extract::{
        multipart::MultipartRejection, rejection::QueryRejection, Multipart, Query, State,
    },
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    config::AppConfig,
    edit::{run_edit, EditJob},
    error::AppError,
    media::MediaClient,
    proxy::{forward, ForwardRequest},
    ui,
};

/// Shared, read-only handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub http_client: reqwest::Client,
    pub media: Arc<dyn MediaClient>,
    /// Present when `ENABLE_PROMETHEUS` installed a recorder.
    pub metrics_handle: Option<PrometheusHandle>,
}

pub async fn index() -> Html<&'static str> {
    Html(ui::INDEX_HTML)
}

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Fal proxy running",
        "fal_base": state.config.fal_base_url,
    }))
}

/// Prometheus scrape endpoint; 404 when no recorder is installed.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics_handle {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "metrics_disabled" })),
        )
            .into_response(),
    }
}

pub async fn proxy_request(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(e) => return AppError::InvalidRequest(e.body_text()).into_response(),
    };
    let request = ForwardRequest {
        method,
        path: forward_path(&uri),
        query,
        headers,
        body,
    };

    match forward(&state.config, &state.http_client, request).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::error!("Proxy error: {}", e);
            e.into_response()
        }
    }
}

/// The part of the request path after `/fal/`, still percent-encoded.
///
/// Decoding here would turn an escaped `?` or `#` into a query or fragment
/// on the outbound URL.
pub fn forward_path(uri: &Uri) -> String {
    let path = uri.path();
    path.strip_prefix("/fal/")
        .or_else(|| path.strip_prefix("/fal"))
        .unwrap_or(path)
        .to_string()
}

pub async fn edit_request(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, AppError> {
    let multipart = multipart.map_err(|e| AppError::InvalidMultipart(e.body_text()))?;
    let job = EditJob::from_multipart(multipart).await.map_err(|e| {
        tracing::warn!("Rejected edit form: {}", e);
        e
    })?;
    let result = run_edit(state.media.as_ref(), job).await?;
    Ok(Json(result))
}
