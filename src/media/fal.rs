use super::{MediaClient, MediaError};
use crate::config::AppConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{path::Path, sync::Arc};
use tracing::{debug, error, info};

const STORAGE_TYPE: &str = "fal-cdn-v3";

#[derive(Serialize)]
struct InitiateUpload<'a> {
    content_type: &'a str,
    file_name: &'a str,
}

#[derive(Deserialize)]
struct InitiatedUpload {
    upload_url: String,
    file_url: String,
}

/// fal.ai storage + synchronous model endpoint.
pub struct FalClient {
    config: Arc<AppConfig>,
    client: reqwest::Client,
}

impl FalClient {
    pub fn new(config: Arc<AppConfig>, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn authorization(&self) -> Result<String, MediaError> {
        self.config.authorization().map_err(|_| MediaError::MissingKey)
    }
}

#[async_trait]
impl MediaClient for FalClient {
    async fn upload_file(&self, path: &Path) -> Result<String, MediaError> {
        let authorization = self.authorization()?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.png");
        let content_type = content_type_for(path);
        let data = tokio::fs::read(path).await?;

        debug!(file_name, content_type, size = data.len(), "Initiating fal upload");

        let initiate_url = format!("{}/storage/upload/initiate", self.config.fal_rest_url);
        let response = self
            .client
            .post(&initiate_url)
            .header(reqwest::header::AUTHORIZATION, &authorization)
            .query(&[("storage_type", STORAGE_TYPE)])
            .json(&InitiateUpload {
                content_type,
                file_name,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "fal refused upload initiation");
            return Err(MediaError::Upload(format!("initiate returned {status}: {body}")));
        }
        let initiated: InitiatedUpload = response
            .json()
            .await
            .map_err(|e| MediaError::Upload(format!("malformed initiate response: {e}")))?;

        let response = self
            .client
            .put(&initiated.upload_url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "fal storage rejected file body");
            return Err(MediaError::Upload(format!("storage returned {status}: {body}")));
        }

        info!(file_name, url = %initiated.file_url, "Uploaded file to fal storage");
        Ok(initiated.file_url)
    }

    async fn run(&self, model_id: &str, arguments: Value) -> Result<Value, MediaError> {
        let authorization = self.authorization()?;
        let url = self.config.fal_run_endpoint(model_id);

        info!(model = model_id, url = %url, "Invoking fal model");

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, &authorization)
            .json(&arguments)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(model = model_id, status = status.as_u16(), "fal model reported failure");
            return Err(MediaError::Invocation(format!("{status}: {body}")));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| MediaError::Invocation(format!("malformed result: {e}")))
    }

    fn name(&self) -> &str {
        "fal"
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}
