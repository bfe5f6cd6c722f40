use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, Response, StatusCode},
    response::IntoResponse,
};
use bytes::Bytes;
use tracing::{debug, error, info};

use crate::{config::AppConfig, error::AppError};

mod client;
pub use client::build_http_client;

/// Inbound headers that are never copied to the outbound call.
///
/// `Accept-Encoding` is left to reqwest so fal only ever answers in an
/// encoding the client can decode before `Content-Encoding` is stripped.
pub static REQUEST_HEADER_DENYLIST: [HeaderName; 5] = [
    header::HOST,
    header::AUTHORIZATION,
    header::CONTENT_LENGTH,
    header::CONNECTION,
    header::ACCEPT_ENCODING,
];

/// Upstream headers describing the outbound transport rather than the relayed body.
pub static RESPONSE_HEADER_DENYLIST: [HeaderName; 3] = [
    header::CONTENT_ENCODING,
    header::TRANSFER_ENCODING,
    header::CONNECTION,
];

/// One inbound call to `/fal/<path>`, captured in full.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// What gets written back to the caller.
#[derive(Debug)]
pub struct ForwardResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IntoResponse for ForwardResponse {
    fn into_response(self) -> axum::response::Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Copies `inbound` minus the denylist and sets `Authorization: Key <secret>`.
pub fn build_forward_headers(inbound: &HeaderMap, config: &AppConfig) -> Result<HeaderMap, AppError> {
    let authorization = config.authorization()?;

    let mut headers = HeaderMap::with_capacity(inbound.len() + 1);
    for (name, value) in inbound {
        if REQUEST_HEADER_DENYLIST.contains(name) {
            debug!(header = %name, "Dropping inbound header");
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&authorization).map_err(|_| AppError::InvalidHeader)?,
    );
    Ok(headers)
}

pub fn filter_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if !RESPONSE_HEADER_DENYLIST.contains(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}

/// Relays `request` to `<base>/<path>` with exactly one outbound call.
///
/// The key is resolved before anything touches the network, so a missing
/// `FAL_KEY` never produces an upstream request. Transport failures are
/// returned as `AppError::Upstream` and are not retried.
pub async fn forward(
    config: &AppConfig,
    client: &reqwest::Client,
    request: ForwardRequest,
) -> Result<ForwardResponse, AppError> {
    let headers = build_forward_headers(&request.headers, config)?;
    let url = config.fal_url(&request.path);

    info!(
        method = %request.method,
        url = %url,
        query_params = request.query.len(),
        body_bytes = request.body.len(),
        "Forwarding request to fal"
    );

    let response = client
        .request(request.method, &url)
        .headers(headers)
        .query(&request.query)
        .body(request.body)
        .send()
        .await
        .map_err(|e| {
            error!(url = %url, error = %e, "Request to fal failed");
            AppError::Upstream(e)
        })?;

    let status = response.status();
    let headers = filter_response_headers(response.headers());
    let body = response.bytes().await.map_err(|e| {
        error!(url = %url, error = %e, "Reading fal response failed");
        AppError::Upstream(e)
    })?;

    info!(url = %url, status = status.as_u16(), body_bytes = body.len(), "fal responded");

    Ok(ForwardResponse {
        status,
        headers,
        body,
    })
}
