use super::common::{client, serve, start_proxy, FakeMedia};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{post, put},
    Json, Router,
};
use fal_proxy::{
    config::AppConfig,
    edit::{run_edit, EditJob, UploadedImage},
    media::{FalClient, MediaClient},
    proxy::build_http_client,
};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

fn image_part(name: &str, data: &'static [u8]) -> Part {
    Part::bytes(data).file_name(name.to_string())
}

async fn post_form(proxy: std::net::SocketAddr, form: Form) -> reqwest::Response {
    client()
        .post(format!("http://{proxy}/ui/edit"))
        .multipart(form)
        .send()
        .await
        .expect("proxy unreachable")
}

#[test_log::test(tokio::test)]
async fn test_edit_without_images_is_rejected() {
    let media = Arc::new(FakeMedia::default());
    let proxy = start_proxy(AppConfig::for_base_url("https://fal.run", Some("abc")), media.clone()).await;

    let form = Form::new()
        .text("model", "fal-ai/nano-banana/edit")
        .text("prompt", "add a hat");
    let response = post_form(proxy, form).await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "missing_images" }));
    assert!(media.runs.lock().unwrap().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_edit_with_only_empty_file_parts_is_rejected() {
    let media = Arc::new(FakeMedia::default());
    let proxy = start_proxy(AppConfig::for_base_url("https://fal.run", Some("abc")), media.clone()).await;

    let form = Form::new()
        .text("model", "fal-ai/nano-banana/edit")
        .text("prompt", "add a hat")
        .part("images", image_part("", b""));
    let response = post_form(proxy, form).await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "missing_images");
    assert!(media.uploads.lock().unwrap().is_empty());
    assert!(media.runs.lock().unwrap().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_edit_rejects_missing_prompt_and_bad_extra_json() {
    let media = Arc::new(FakeMedia::default());
    let proxy = start_proxy(AppConfig::for_base_url("https://fal.run", Some("abc")), media.clone()).await;

    let form = Form::new()
        .text("model", "fal-ai/nano-banana/edit")
        .part("images", image_part("cat.png", b"png"));
    let response = post_form(proxy, form).await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "missing_prompt");

    let form = Form::new()
        .text("model", "fal-ai/nano-banana/edit")
        .text("prompt", "add a hat")
        .text("extra_json", "{not json")
        .part("images", image_part("cat.png", b"png"));
    let response = post_form(proxy, form).await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid_extra_json");

    assert!(media.uploads.lock().unwrap().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_edit_rejects_missing_model() {
    let media = Arc::new(FakeMedia::default());
    let proxy = start_proxy(AppConfig::for_base_url("https://fal.run", Some("abc")), media.clone()).await;

    let form = Form::new()
        .text("prompt", "add a hat")
        .part("images", image_part("cat.png", b"png"));
    let response = post_form(proxy, form).await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "missing_model" }));
    assert!(media.uploads.lock().unwrap().is_empty());
    assert!(media.runs.lock().unwrap().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_edit_rejects_extra_json_that_is_not_an_object() {
    let media = Arc::new(FakeMedia::default());
    let proxy = start_proxy(AppConfig::for_base_url("https://fal.run", Some("abc")), media.clone()).await;

    let form = Form::new()
        .text("model", "fal-ai/nano-banana/edit")
        .text("prompt", "add a hat")
        .text("extra_json", "[1]")
        .part("images", image_part("cat.png", b"png"));
    let response = post_form(proxy, form).await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid_extra_json");
    assert!(body["detail"].as_str().unwrap().contains("array"));
    assert!(media.uploads.lock().unwrap().is_empty());
    assert!(media.runs.lock().unwrap().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_edit_uploads_every_image_and_merges_extra() {
    let media = Arc::new(FakeMedia::default());
    let proxy = start_proxy(AppConfig::for_base_url("https://fal.run", Some("abc")), media.clone()).await;

    let form = Form::new()
        .text("model", "fal-ai/nano-banana/edit")
        .text("prompt", "add a hat")
        .text("extra_json", r#"{"num_images": 2, "prompt": "add a red hat"}"#)
        .part("images", image_part("cat.jpg", b"jpeg"))
        .part("image", image_part("dog.png", b"png"));
    let response = post_form(proxy, form).await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["images"][0]["url"], "https://cdn.test/result.png");
    assert_eq!(
        body["uploaded_urls"],
        json!(["https://cdn.test/1", "https://cdn.test/2"])
    );

    let uploads = media.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 2);
    assert!(uploads[0].0.to_string_lossy().ends_with(".jpg"));
    assert!(uploads[1].0.to_string_lossy().ends_with(".png"));
    for (path, existed) in uploads.iter() {
        assert!(existed);
        assert!(!path.exists());
    }

    let runs = media.runs.lock().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].0, "fal-ai/nano-banana/edit");
    assert_eq!(
        runs[0].1,
        json!({
            "prompt": "add a red hat",
            "image_urls": ["https://cdn.test/1", "https://cdn.test/2"],
            "num_images": 2,
        })
    );
}

#[test_log::test(tokio::test)]
async fn test_edit_upload_failure_is_500_and_cleans_up() {
    let media = Arc::new(FakeMedia {
        fail_upload: true,
        ..Default::default()
    });
    let proxy = start_proxy(AppConfig::for_base_url("https://fal.run", Some("abc")), media.clone()).await;

    let form = Form::new()
        .text("model", "fal-ai/flux-pro/kontext")
        .text("prompt", "add a hat")
        .part("images", image_part("cat.png", b"png"));
    let response = post_form(proxy, form).await;

    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "edit_failed");
    assert!(body["detail"].as_str().unwrap().contains("storage unavailable"));

    let uploads = media.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert!(!uploads[0].0.exists());
    assert!(media.runs.lock().unwrap().is_empty());
}

/// Requests the fal stand-in saw, in order: (route, authorization, body).
#[derive(Clone, Default)]
struct FalLog(Arc<Mutex<Vec<(String, Option<String>, Bytes)>>>);

impl FalLog {
    fn push(&self, route: &str, headers: &HeaderMap, body: Bytes) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.0.lock().unwrap().push((route.to_string(), auth, body));
    }
}

async fn start_fal_storage_and_model() -> (std::net::SocketAddr, FalLog) {
    let log = FalLog::default();
    let addr_slot: Arc<Mutex<Option<std::net::SocketAddr>>> = Arc::default();

    let slot = addr_slot.clone();
    let initiate = move |State(log): State<FalLog>, headers: HeaderMap, body: Bytes| {
        let slot = slot.clone();
        async move {
            log.push("initiate", &headers, body);
            let addr = slot.lock().unwrap().expect("address set before first request");
            Json(json!({
                "upload_url": format!("http://{addr}/blob/cat"),
                "file_url": "https://v3.fal.media/files/cat.png",
            }))
        }
    };
    let blob = |State(log): State<FalLog>, headers: HeaderMap, body: Bytes| async move {
        log.push("blob", &headers, body);
        StatusCode::OK
    };
    let model = |State(log): State<FalLog>, headers: HeaderMap, body: Bytes| async move {
        let arguments: Value = serde_json::from_slice(&body).unwrap();
        log.push("model", &headers, body);
        Json(json!({ "images": [{ "url": "https://v3.fal.media/files/out.png" }], "echo": arguments }))
    };

    let router = Router::new()
        .route("/storage/upload/initiate", post(initiate))
        .route("/blob/cat", put(blob))
        .route("/fal-ai/flux-pro/kontext", post(model))
        .with_state(log.clone());
    let addr = serve(router).await;
    *addr_slot.lock().unwrap() = Some(addr);
    (addr, log)
}

#[test_log::test(tokio::test)]
async fn test_fal_client_uploads_then_invokes_single_image_model() {
    let (fal_addr, log) = start_fal_storage_and_model().await;
    let config = Arc::new(AppConfig::for_base_url(&format!("http://{fal_addr}"), Some("abc")));
    let media = FalClient::new(config, build_http_client(Duration::from_secs(10)).unwrap());

    let job = EditJob {
        model_id: "fal-ai/flux-pro/kontext".into(),
        prompt: "add a hat".into(),
        images: vec![UploadedImage::new("cat.png", &b"png-bytes"[..])],
        extra: serde_json::Map::new(),
    };
    let result = run_edit(&media, job).await.unwrap();

    assert_eq!(media.name(), "fal");
    assert_eq!(result["images"][0]["url"], "https://v3.fal.media/files/out.png");
    assert_eq!(
        result["echo"],
        json!({ "prompt": "add a hat", "image_url": "https://v3.fal.media/files/cat.png" })
    );

    let calls = log.0.lock().unwrap();
    let routes: Vec<&str> = calls.iter().map(|(r, _, _)| r.as_str()).collect();
    assert_eq!(routes, vec!["initiate", "blob", "model"]);
    assert_eq!(calls[0].1.as_deref(), Some("Key abc"));
    assert_eq!(calls[2].1.as_deref(), Some("Key abc"));
    assert_eq!(&calls[1].2[..], b"png-bytes");

    let initiate: Value = serde_json::from_slice(&calls[0].2).unwrap();
    assert_eq!(initiate["content_type"], "image/png");
    assert!(initiate["file_name"].as_str().unwrap().ends_with(".png"));
}

#[test_log::test(tokio::test)]
async fn test_fal_client_without_key_fails_edit() {
    let (fal_addr, log) = start_fal_storage_and_model().await;
    let config = Arc::new(AppConfig::for_base_url(&format!("http://{fal_addr}"), None));
    let media = FalClient::new(config, build_http_client(Duration::from_secs(10)).unwrap());

    let job = EditJob {
        model_id: "fal-ai/flux-pro/kontext".into(),
        prompt: "add a hat".into(),
        images: vec![UploadedImage::new("cat.png", &b"png-bytes"[..])],
        extra: serde_json::Map::new(),
    };
    let err = run_edit(&media, job).await.unwrap_err();

    assert_eq!(err.code(), "edit_failed");
    assert!(log.0.lock().unwrap().is_empty());
}

/// A stand-in for queue.fal.run: every call is accepted and answered with a ticket.
async fn start_fal_queue() -> (std::net::SocketAddr, FalLog) {
    let log = FalLog::default();
    let submit = |State(log): State<FalLog>, headers: HeaderMap, body: Bytes| async move {
        log.push("queue", &headers, body);
        Json(json!({ "request_id": "r1", "status": "IN_QUEUE" }))
    };
    let router = Router::new().fallback(submit).with_state(log.clone());
    (serve(router).await, log)
}

#[test_log::test(tokio::test)]
async fn test_edit_runs_synchronously_when_forwarder_targets_queue() {
    let (queue_addr, queue_log) = start_fal_queue().await;
    let (fal_addr, fal_log) = start_fal_storage_and_model().await;

    let mut config = AppConfig::for_base_url(&format!("http://{fal_addr}"), Some("abc"));
    config.fal_base_url = format!("http://{queue_addr}");
    let media = Arc::new(FalClient::new(
        Arc::new(config.clone()),
        build_http_client(Duration::from_secs(10)).unwrap(),
    ));
    let proxy = start_proxy(config, media).await;

    let form = Form::new()
        .text("model", "fal-ai/flux-pro/kontext")
        .text("prompt", "add a hat")
        .part("images", image_part("cat.png", b"png"));
    let response = post_form(proxy, form).await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["images"][0]["url"], "https://v3.fal.media/files/out.png");
    assert!(body.get("request_id").is_none());
    assert!(queue_log.0.lock().unwrap().is_empty());
    let routes: Vec<String> = fal_log.0.lock().unwrap().iter().map(|(r, _, _)| r.clone()).collect();
    assert_eq!(routes, vec!["initiate", "blob", "model"]);

    let ticket: Value = client()
        .post(format!("http://{proxy}/fal/fal-ai/flux-pro/kontext"))
        .json(&json!({ "prompt": "x" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ticket["status"], "IN_QUEUE");
    assert_eq!(queue_log.0.lock().unwrap().len(), 1);
}
