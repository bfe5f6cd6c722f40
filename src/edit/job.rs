use axum::extract::Multipart;
use bytes::Bytes;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

use crate::error::AppError;

pub const DEFAULT_EXTENSION: &str = ".png";

/// A file part taken from the edit form.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub data: Bytes,
}

impl UploadedImage {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            data: data.into(),
        }
    }

    /// Browsers send an empty, unnamed part when no file was picked.
    pub fn is_valid(&self) -> bool {
        self.file_name.as_deref().is_some_and(|n| !n.trim().is_empty()) && !self.data.is_empty()
    }

    /// Extension of the original file name including the dot, `.png` if there is none.
    pub fn extension(&self) -> String {
        self.file_name
            .as_deref()
            .and_then(|n| Path::new(n).extension())
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .map(|e| format!(".{e}"))
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
    }
}

/// One request-scoped edit: upload `images`, then invoke `model_id`.
#[derive(Debug, Clone)]
pub struct EditJob {
    pub model_id: String,
    pub prompt: String,
    pub images: Vec<UploadedImage>,
    pub extra: Map<String, Value>,
}

impl EditJob {
    /// Reads the `/ui/edit` form. Files may arrive under `images` or `image`.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut model_id = None;
        let mut prompt = None;
        let mut extra_json = None;
        let mut images = Vec::new();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "model" => model_id = Some(field.text().await?),
                "prompt" => prompt = Some(field.text().await?),
                "extra_json" => extra_json = Some(field.text().await?),
                "images" | "image" => {
                    let file_name = field.file_name().map(str::to_string);
                    let data = field.bytes().await?;
                    images.push(UploadedImage { file_name, data });
                }
                other => debug!(field = other, "Ignoring unknown form field"),
            }
        }

        if images.is_empty() {
            return Err(AppError::MissingImages);
        }
        let prompt = non_empty(prompt).ok_or(AppError::MissingField("prompt"))?;
        let model_id = non_empty(model_id).ok_or(AppError::MissingField("model"))?;
        let extra = match extra_json {
            Some(raw) => parse_extra_json(&raw)?,
            None => Map::new(),
        };

        Ok(Self {
            model_id,
            prompt,
            images,
            extra,
        })
    }
}

/// Blank input means "no extra parameters"; anything else must be a JSON object.
pub fn parse_extra_json(raw: &str) -> Result<Map<String, Value>, AppError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(AppError::InvalidExtraJson(format!(
            "expected an object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(AppError::InvalidExtraJson(e.to_string())),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
