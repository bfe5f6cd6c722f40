//! A small reverse proxy in front of fal.ai.
//!
//! Browser code talks to this process; the process attaches the fal key
//! (`Authorization: Key <FAL_KEY>`) and relays the call. Two surfaces exist:
//! a generic forwarder under `/fal/*path` and an upload-then-edit helper at
//! `/ui/edit`. A small HTML page at `/` exercises both. With
//! `ENABLE_PROMETHEUS` set, request metrics are scraped from `/metrics`.

pub mod config;
pub mod edit;
pub mod error;
pub mod handlers;
pub mod media;
pub mod proxy;
pub mod telemetry;
pub mod ui;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::{sync::Arc, time::Duration};
use tower_http::cors::{Any, CorsLayer};

use crate::{handlers::AppState, telemetry::MetricsRegistry};

/// Builds the full application router around `state`.
pub fn build_router(state: AppState, metrics_registry: Arc<MetricsRegistry>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .route(
            "/fal/*path",
            get(handlers::proxy_request)
                .post(handlers::proxy_request)
                .put(handlers::proxy_request)
                .delete(handlers::proxy_request)
                .patch(handlers::proxy_request)
                .options(handlers::proxy_request),
        )
        .route("/ui/edit", post(handlers::edit_request))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn_with_state(metrics_registry, telemetry::metrics_middleware))
        .with_state(state)
        .layer(cors)
}
