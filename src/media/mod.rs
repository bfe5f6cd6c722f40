use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

mod fal;
pub mod schema;

pub use fal::FalClient;
pub use schema::{build_arguments, image_input_for, ImageInput};

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("FAL_KEY environment variable is not set")]
    MissingKey,

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("model invocation failed: {0}")]
    Invocation(String),

    #[error("request to fal failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The two remote operations the edit helper relies on.
///
/// `FalClient` talks to fal.ai; tests swap in an in-memory double.
#[async_trait]
pub trait MediaClient: Send + Sync {
    /// Upload the file at `path` and return a publicly reachable URL for it.
    async fn upload_file(&self, path: &Path) -> Result<String, MediaError>;

    /// Invoke `model_id` with `arguments` and wait for its JSON result.
    async fn run(&self, model_id: &str, arguments: Value) -> Result<Value, MediaError>;

    fn name(&self) -> &str;
}
