use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::{
    error::AppError,
    media::{build_arguments, MediaClient, MediaError},
};

mod job;
pub use job::{parse_extra_json, EditJob, UploadedImage, DEFAULT_EXTENSION};

const TEMP_PREFIX: &str = "fal-upload-";

/// Uploads every valid image of `job`, then invokes the model with the resulting URLs.
///
/// Unnamed or empty parts are skipped; if none remain the model is never called.
/// Any upload or invocation failure aborts the whole job as `AppError::EditFailed`.
pub async fn run_edit(media: &dyn MediaClient, job: EditJob) -> Result<Value, AppError> {
    let images: Vec<&UploadedImage> = job.images.iter().filter(|i| i.is_valid()).collect();
    if images.is_empty() {
        warn!(model = %job.model_id, "Edit request had no usable images");
        return Err(AppError::MissingImages);
    }

    let mut urls = Vec::with_capacity(images.len());
    for image in images {
        let url = upload_image(media, image).await.map_err(edit_failed)?;
        urls.push(url);
    }

    let arguments = build_arguments(&job.model_id, &job.prompt, &urls, job.extra);
    info!(model = %job.model_id, images = urls.len(), client = media.name(), "Running edit");

    let mut result = media
        .run(&job.model_id, arguments)
        .await
        .map_err(edit_failed)?;

    if let Value::Object(map) = &mut result {
        map.entry("uploaded_urls").or_insert_with(|| json!(urls));
    }
    Ok(result)
}

/// Writes `image` to a uniquely named temp file for the duration of the upload.
///
/// The file is removed on every path out of this function, including a failed upload.
async fn upload_image(media: &dyn MediaClient, image: &UploadedImage) -> Result<String, MediaError> {
    let temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(&image.extension())
        .tempfile()?;
    tokio::fs::write(temp.path(), &image.data).await?;

    let outcome = media.upload_file(temp.path()).await;

    let path = temp.path().to_path_buf();
    match temp.close() {
        Ok(()) => debug!(path = %path.display(), "Removed temp upload"),
        Err(e) => warn!(path = %path.display(), error = %e, "Could not remove temp upload"),
    }

    outcome
}

fn edit_failed(e: MediaError) -> AppError {
    error!(error = %e, "Edit failed");
    AppError::EditFailed(e.to_string())
}
