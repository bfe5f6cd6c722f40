use serde_json::{json, Map, Value};

/// Edit endpoints that accept exactly one source image under `image_url`.
const SINGLE_IMAGE_MODELS: [&str; 3] = [
    "fal-ai/flux-pro/kontext",
    "fal-ai/flux-pro/kontext/max",
    "fal-ai/flux/dev/image-to-image",
];

/// How a model expects its source images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageInput {
    /// `image_url`: the first uploaded image only.
    Single,
    /// `image_urls`: every uploaded image.
    Multiple,
}

pub fn image_input_for(model_id: &str) -> ImageInput {
    let model_id = model_id.trim_matches('/');
    if SINGLE_IMAGE_MODELS.contains(&model_id) {
        ImageInput::Single
    } else {
        ImageInput::Multiple
    }
}

/// Default arguments for `model_id`, with `extra` layered on top.
pub fn build_arguments(
    model_id: &str,
    prompt: &str,
    image_urls: &[String],
    extra: Map<String, Value>,
) -> Value {
    let mut arguments = Map::new();
    arguments.insert("prompt".to_string(), json!(prompt));

    match image_input_for(model_id) {
        ImageInput::Single => {
            if let Some(first) = image_urls.first() {
                arguments.insert("image_url".to_string(), json!(first));
            }
        }
        ImageInput::Multiple => {
            arguments.insert("image_urls".to_string(), json!(image_urls));
        }
    }

    arguments.extend(extra);
    Value::Object(arguments)
}
