use std::sync::Arc;

use axum::http::StatusCode;
use personaforge_core::VideoProvider;
use personaforge_model::{JobKind, ProviderKind, QualityTier};
use serde_json::{Value, json};

mod support;

use support::{
    AUDIO_URI, FakeProvider, FakeSpeech, FakeText, build_app,
    build_default_app, wait_for_job,
};

#[tokio::test]
async fn sync_make_video_returns_rendered_video() {
    let provider = Arc::new(FakeProvider::completing(ProviderKind::RunPod, 2));
    let app = build_default_app(Arc::clone(&provider));

    let response = app
        .server
        .post("/api/v1/videos")
        .json(&json!({
            "persona_id": "persona-1",
            "text": "Hello there!",
            "image": "img.png",
            "quality": "high"
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "success");
    let data = &body["data"];
    assert_eq!(data["text"], "Hello there!");
    assert_eq!(data["audio_url"], AUDIO_URI);
    assert_eq!(data["video_url"], "https://cdn.example.com/runpod.mp4");
    assert_eq!(data["provider"], "runpod");
    assert_eq!(data["status"], "completed");

    assert_eq!(provider.submits(), 1);
    let sent = provider.last_input.lock().unwrap().clone().unwrap();
    assert_eq!(sent.kind, JobKind::LipsyncOnly);
    assert_eq!(sent.source_image, "img.png");
    assert_eq!(sent.audio.as_deref(), Some(AUDIO_URI));
    assert_eq!(sent.quality, QualityTier::High);
}

#[tokio::test]
async fn message_is_answered_by_text_generator() {
    let provider = Arc::new(FakeProvider::completing(ProviderKind::RunPod, 1));
    let text = Arc::new(FakeText::replying("Generated reply."));
    let app = build_app(
        vec![provider as Arc<dyn VideoProvider>],
        Arc::new(FakeSpeech::working()),
        Arc::clone(&text) as _,
    );

    let response = app
        .server
        .post("/api/v1/videos")
        .json(&json!({
            "persona_id": "persona-1",
            "message": "Who are you?",
            "system_prompt": "You are Ada.",
            "image": "img.png"
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["text"], "Generated reply.");

    let request = text.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(request.message, "Who are you?");
    assert_eq!(request.system_prompt.as_deref(), Some("You are Ada."));
}

#[tokio::test]
async fn missing_text_and_message_is_rejected() {
    let provider = Arc::new(FakeProvider::completing(ProviderKind::RunPod, 1));
    let app = build_default_app(Arc::clone(&provider));

    let response = app
        .server
        .post("/api/v1/videos")
        .json(&json!({"persona_id": "persona-1", "image": "img.png"}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"], "either text or message is required");
    assert_eq!(provider.submits(), 0);
}

#[tokio::test]
async fn unknown_quality_is_rejected() {
    let provider = Arc::new(FakeProvider::completing(ProviderKind::RunPod, 1));
    let app = build_default_app(Arc::clone(&provider));

    let response = app
        .server
        .post("/api/v1/videos")
        .json(&json!({
            "persona_id": "persona-1",
            "text": "hi",
            "image": "img.png",
            "quality": "ultra"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(provider.submits(), 0);
}

#[tokio::test]
async fn missing_image_returns_audio_only() {
    let provider = Arc::new(FakeProvider::completing(ProviderKind::RunPod, 1));
    let app = build_default_app(Arc::clone(&provider));

    let response = app
        .server
        .post("/api/v1/videos")
        .json(&json!({"persona_id": "persona-1", "text": "Hello"}))
        .await;

    response.assert_status_ok();
    let data = response.json::<Value>()["data"].clone();
    assert_eq!(data["audio_url"], AUDIO_URI);
    assert!(data["video_url"].is_null());
    assert_eq!(data["note"], "no image provided; audio only");
    assert_eq!(provider.submits(), 0);
}

#[tokio::test]
async fn speech_failure_returns_text_only() {
    let provider = Arc::new(FakeProvider::completing(ProviderKind::RunPod, 1));
    let app = build_app(
        vec![Arc::clone(&provider) as Arc<dyn VideoProvider>],
        Arc::new(FakeSpeech::failing()),
        Arc::new(FakeText::unconfigured()),
    );

    let response = app
        .server
        .post("/api/v1/videos")
        .json(&json!({
            "persona_id": "persona-1",
            "text": "Hello",
            "image": "img.png"
        }))
        .await;

    response.assert_status_ok();
    let data = response.json::<Value>()["data"].clone();
    assert_eq!(data["text"], "Hello");
    assert!(data["audio_url"].is_null());
    assert!(data["video_url"].is_null());
    assert!(
        data["note"]
            .as_str()
            .unwrap()
            .starts_with("speech synthesis failed")
    );
    assert_eq!(provider.submits(), 0);
}

#[tokio::test]
async fn no_provider_degrades_to_audio() {
    let app = build_app(
        Vec::new(),
        Arc::new(FakeSpeech::working()),
        Arc::new(FakeText::unconfigured()),
    );

    for mode in ["sync", "async"] {
        let response = app
            .server
            .post("/api/v1/videos")
            .json(&json!({
                "persona_id": format!("persona-{mode}"),
                "text": "Hello",
                "image": "img.png",
                "mode": mode
            }))
            .await;

        response.assert_status_ok();
        let data = response.json::<Value>()["data"].clone();
        assert_eq!(data["audio_url"], AUDIO_URI, "{mode}");
        assert!(data["video_url"].is_null(), "{mode}");
        assert_eq!(data["note"], "no video provider configured", "{mode}");
    }
}

#[tokio::test]
async fn failing_primary_falls_back_to_secondary() {
    let primary = Arc::new(FakeProvider::rejecting(ProviderKind::RunPod));
    let secondary =
        Arc::new(FakeProvider::completing(ProviderKind::Replicate, 1));
    let app = build_app(
        vec![
            Arc::clone(&primary) as Arc<dyn VideoProvider>,
            Arc::clone(&secondary) as Arc<dyn VideoProvider>,
        ],
        Arc::new(FakeSpeech::working()),
        Arc::new(FakeText::unconfigured()),
    );

    let response = app
        .server
        .post("/api/v1/videos")
        .json(&json!({
            "persona_id": "persona-1",
            "text": "Hello",
            "image": "img.png"
        }))
        .await;

    response.assert_status_ok();
    let data = response.json::<Value>()["data"].clone();
    assert_eq!(data["provider"], "replicate");
    assert_eq!(data["video_url"], "https://cdn.example.com/replicate.mp4");
    assert_eq!(secondary.submits(), 1);
}

#[tokio::test]
async fn async_make_video_is_tracked_by_job_status() {
    let provider = Arc::new(FakeProvider::completing(ProviderKind::RunPod, 3));
    let app = build_default_app(Arc::clone(&provider));

    let response = app
        .server
        .post("/api/v1/videos")
        .json(&json!({
            "persona_id": "persona-1",
            "text": "Hello",
            "image": "img.png",
            "quality": "draft",
            "mode": "async"
        }))
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    let data = response.json::<Value>()["data"].clone();
    assert_eq!(data["audio_url"], AUDIO_URI);
    assert_eq!(data["estimated_time_ms"], 30_000);
    assert_eq!(data["provider"], "runpod");
    assert_eq!(data["already_active"], false);

    let job_id = data["job_id"].as_str().unwrap().to_string();
    let finished = wait_for_job(&app.server, &job_id).await;
    assert_eq!(finished["status"], "completed");
    assert_eq!(finished["video_url"], "https://cdn.example.com/runpod.mp4");
    assert_eq!(finished["owner"], "persona-1");

    let again: Value = app
        .server
        .get(&format!("/api/v1/jobs/{job_id}"))
        .await
        .json();
    assert_eq!(again["data"], finished);
    assert_eq!(provider.submits(), 1);
}

#[tokio::test]
async fn second_async_submit_returns_active_job() {
    let provider =
        Arc::new(FakeProvider::completing(ProviderKind::RunPod, 50));
    let app = build_default_app(Arc::clone(&provider));
    let body = json!({
        "persona_id": "persona-1",
        "text": "Hello",
        "image": "img.png",
        "mode": "async"
    });

    let first = app.server.post("/api/v1/videos").json(&body).await;
    let second = app.server.post("/api/v1/videos").json(&body).await;

    let first = first.json::<Value>()["data"].clone();
    let second = second.json::<Value>()["data"].clone();
    assert_eq!(first["job_id"], second["job_id"]);
    assert_eq!(second["already_active"], true);
    assert_eq!(provider.submits(), 1);
}
