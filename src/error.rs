use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("FAL_KEY environment variable is not set")]
    MissingFalKey,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Request to fal failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Missing form field: {0}")]
    MissingField(&'static str),

    #[error("No image files were provided")]
    MissingImages,

    #[error("extra_json is not a valid JSON object: {0}")]
    InvalidExtraJson(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid multipart body: {0}")]
    InvalidMultipart(String),

    #[error("Edit failed: {0}")]
    EditFailed(String),

    #[error("Invalid header value")]
    InvalidHeader,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingFalKey | AppError::InvalidConfig(_) | AppError::EditFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::MissingField(_)
            | AppError::MissingImages
            | AppError::InvalidExtraJson(_)
            | AppError::InvalidRequest(_)
            | AppError::InvalidMultipart(_)
            | AppError::InvalidHeader => StatusCode::BAD_REQUEST,
        }
    }

    /// Machine-readable code placed in the `error` field of the envelope.
    pub fn code(&self) -> String {
        match self {
            AppError::MissingFalKey => "missing_fal_key".to_string(),
            AppError::InvalidConfig(_) => "invalid_config".to_string(),
            AppError::Upstream(_) => "request_to_fal_failed".to_string(),
            AppError::MissingField(field) => format!("missing_{field}"),
            AppError::MissingImages => "missing_images".to_string(),
            AppError::InvalidExtraJson(_) => "invalid_extra_json".to_string(),
            AppError::InvalidRequest(_) => "invalid_request".to_string(),
            AppError::InvalidMultipart(_) => "invalid_multipart".to_string(),
            AppError::EditFailed(_) => "edit_failed".to_string(),
            AppError::InvalidHeader => "invalid_header".to_string(),
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            AppError::MissingField(_) | AppError::MissingImages => None,
            AppError::EditFailed(detail) => Some(detail.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self.detail() {
            Some(detail) => json!({ "error": self.code(), "detail": detail }),
            None => json!({ "error": self.code() }),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        AppError::InvalidMultipart(e.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_json())).into_response()
    }
}
