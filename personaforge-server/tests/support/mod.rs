#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum_test::TestServer;
use serde_json::Value;

use personaforge_config::{
    Config, ConfigMetadata, CorsConfig, ProvidersConfig, ReplicateConfig,
    RunPodConfig, ServerConfig, SpeechConfig, TextConfig, VideoConfig,
};
use personaforge_core::{
    FallbackCoordinator, InMemoryJobStore, PollPolicy, Poller, ProviderError,
    ProviderStatus, VideoJobService, VideoProvider,
    collaborators::{
        CollaboratorError, SpeechSynthesizer, SynthesizedAudio, TextGenerator,
        TextRequest,
    },
    providers::SubmittedJob,
};
use personaforge_model::{ProviderKind, VideoJobInput};
use personaforge_server::{AppState, routes};

pub const AUDIO_URI: &str = "data:audio/mpeg;base64,AAAA";

/// Scripted provider: accepts (or rejects) submissions and reports
/// completion after `polls_until_done` status checks.
pub struct FakeProvider {
    kind: ProviderKind,
    fail_submit: bool,
    polls_until_done: u32,
    video_url: String,
    pub submits: AtomicU32,
    pub polls: AtomicU32,
    pub last_input: std::sync::Mutex<Option<VideoJobInput>>,
}

impl FakeProvider {
    pub fn completing(kind: ProviderKind, polls_until_done: u32) -> Self {
        Self {
            kind,
            fail_submit: false,
            polls_until_done,
            video_url: format!("https://cdn.example.com/{kind}.mp4"),
            submits: AtomicU32::new(0),
            polls: AtomicU32::new(0),
            last_input: std::sync::Mutex::new(None),
        }
    }

    pub fn rejecting(kind: ProviderKind) -> Self {
        Self {
            fail_submit: true,
            ..Self::completing(kind, 1)
        }
    }

    pub fn submits(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoProvider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn submit(
        &self,
        input: &VideoJobInput,
    ) -> Result<SubmittedJob, ProviderError> {
        if self.fail_submit {
            return Err(ProviderError::Http {
                provider: self.kind,
                status: 503,
                body: "no workers available".into(),
            });
        }
        let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_input.lock().unwrap() = Some(input.clone());
        Ok(SubmittedJob {
            external_id: format!("{}-{n}", self.kind),
            status: ProviderStatus::Processing,
        })
    }

    async fn check_status(
        &self,
        _external_id: &str,
    ) -> Result<ProviderStatus, ProviderError> {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if poll >= self.polls_until_done {
            Ok(ProviderStatus::Completed {
                video_url: self.video_url.clone(),
            })
        } else {
            Ok(ProviderStatus::Processing)
        }
    }
}

pub struct FakeSpeech {
    pub fail: bool,
    pub calls: AtomicU32,
}

impl FakeSpeech {
    pub fn working() -> Self {
        Self {
            fail: false,
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    fn is_configured(&self) -> bool {
        !self.fail
    }

    async fn synthesize(
        &self,
        _text: &str,
        _voice_id: Option<String>,
    ) -> Result<SynthesizedAudio, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CollaboratorError::Http {
                service: "elevenlabs",
                status: 401,
                body: "invalid api key".into(),
            });
        }
        Ok(SynthesizedAudio {
            mime: "audio/mpeg".into(),
            bytes: vec![0, 0, 0],
        })
    }
}

pub struct FakeText {
    reply: Option<String>,
    pub last_request: std::sync::Mutex<Option<TextRequest>>,
}

impl FakeText {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            last_request: std::sync::Mutex::new(None),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            reply: None,
            last_request: std::sync::Mutex::new(None),
        }
    }
}

#[async_trait]
impl TextGenerator for FakeText {
    fn is_configured(&self) -> bool {
        self.reply.is_some()
    }

    async fn generate(
        &self,
        request: TextRequest,
    ) -> Result<String, CollaboratorError> {
        *self.last_request.lock().unwrap() = Some(request);
        self.reply
            .clone()
            .ok_or(CollaboratorError::NotConfigured {
                service: "anthropic",
            })
    }
}

pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
        },
        runpod: RunPodConfig::default(),
        replicate: ReplicateConfig::default(),
        providers: ProvidersConfig::default(),
        polling: PollPolicy {
            interval_ms: 10,
            timeout_ms: 2_000,
            max_consecutive_errors: 3,
        },
        video: VideoConfig {
            sync_timeout_ms: 3_000,
            talk_timeout_ms: 3_000,
            async_timeout_ms: 3_000,
            ..Default::default()
        },
        speech: SpeechConfig::default(),
        text: TextConfig::default(),
        cors: CorsConfig {
            allowed_origins: Vec::new(),
        },
        dev_mode: true,
        metadata: ConfigMetadata {
            config_path: Some(PathBuf::from("personaforge.toml")),
            env_file_loaded: false,
        },
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
}

pub fn build_app(
    providers: Vec<Arc<dyn VideoProvider>>,
    speech: Arc<dyn SpeechSynthesizer>,
    text: Arc<dyn TextGenerator>,
) -> TestApp {
    let config = Arc::new(test_config());
    let coordinator =
        FallbackCoordinator::new(providers, Poller::new(config.polling));
    let videos = VideoJobService::new(
        Arc::new(InMemoryJobStore::new()),
        Arc::new(coordinator),
        config.video.async_timeout(),
    );
    let state = AppState::new(config, videos, speech, text);
    let server = TestServer::builder()
        .build(routes::create_router(state.clone()))
        .expect("test server");
    TestApp { server, state }
}

pub fn build_default_app(provider: Arc<FakeProvider>) -> TestApp {
    build_app(
        vec![provider as Arc<dyn VideoProvider>],
        Arc::new(FakeSpeech::working()),
        Arc::new(FakeText::replying("Hi, I'm Ada.")),
    )
}

/// Polls the job endpoint until the job leaves `processing`.
pub async fn wait_for_job(server: &TestServer, job_id: &str) -> Value {
    for _ in 0..200 {
        let body: Value =
            server.get(&format!("/api/v1/jobs/{job_id}")).await.json();
        let status = body["data"]["status"].as_str().unwrap_or_default();
        if !matches!(status, "submitted" | "processing") {
            return body["data"].clone();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never finished");
}
