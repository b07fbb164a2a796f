use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use tracing_subscriber::{
    EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use personaforge_config::Config;
use personaforge_core::{
    FallbackCoordinator, InMemoryJobStore, Poller, ReplicateProvider,
    RunPodProvider, VideoJobService, VideoProvider,
    collaborators::{AnthropicText, ElevenLabsSpeech},
};
use personaforge_model::ProviderKind;

use super::app_state::AppState;

/// Upper bound for a single upstream HTTP exchange. Poll loops and render
/// budgets are enforced separately.
const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How often expired results are swept from the cache.
const PURGE_INTERVAL: Duration = Duration::from_secs(300);

/// Used when `RUST_LOG` is unset. Covers the config crate too, so file
/// discovery is visible while the loader runs.
pub const DEFAULT_LOG_FILTER: &str =
    "info,personaforge_config=debug,personaforge_core=debug,tower_http=warn";

pub fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Installs the global subscriber. Call before loading configuration.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(log_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("personaforge/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .timeout(HTTP_REQUEST_TIMEOUT)
        .build()
        .context("failed to build HTTP client")
}

/// Adapters in configured fallback order. Unconfigured ones are kept so the
/// coordinator can log that it skipped them.
pub fn build_providers(
    config: &Config,
    http: &reqwest::Client,
) -> Vec<Arc<dyn VideoProvider>> {
    config
        .providers
        .order
        .iter()
        .map(|kind| -> Arc<dyn VideoProvider> {
            match kind {
                ProviderKind::RunPod => Arc::new(RunPodProvider::new(
                    http.clone(),
                    config.runpod.endpoint.clone(),
                    config.runpod.api_key.clone(),
                )),
                ProviderKind::Replicate => Arc::new(ReplicateProvider::new(
                    http.clone(),
                    config.replicate.base_url.clone(),
                    config.replicate.api_token.clone(),
                    config.replicate.model_version.clone(),
                )),
            }
        })
        .collect()
}

/// Wires providers, collaborators and the job service from `config`.
pub fn build_state(config: Arc<Config>) -> Result<AppState> {
    let http = build_http_client()?;

    let providers = build_providers(&config, &http);
    let coordinator = FallbackCoordinator::new(
        providers,
        Poller::new(config.polling),
    );
    info!(
        providers = ?coordinator.configured_kinds(),
        interval_ms = config.polling.interval_ms,
        timeout_ms = config.polling.timeout_ms,
        "video providers ready"
    );

    let videos = VideoJobService::new(
        Arc::new(InMemoryJobStore::new()),
        Arc::new(coordinator),
        config.video.async_timeout(),
    );

    let speech = ElevenLabsSpeech::new(
        http.clone(),
        config.speech.base_url.clone(),
        config.speech.api_key.clone(),
        config.speech.voice_id.clone(),
        config.speech.model_id.clone(),
        config.speech.settings,
    );
    let text = AnthropicText::new(
        http,
        config.text.base_url.clone(),
        config.text.api_key.clone(),
        config.text.model.clone(),
        config.text.max_tokens,
        config.text.system_prompt.clone(),
    );

    Ok(AppState::new(
        config,
        videos,
        Arc::new(speech),
        Arc::new(text),
    ))
}

/// Periodically drops cached results older than `ttl`.
pub fn spawn_result_purge(
    videos: VideoJobService,
    ttl: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = PURGE_INTERVAL.min(ttl).max(Duration::from_secs(1));
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let purged = videos.purge_results(ttl);
            if purged > 0 {
                debug!(purged, "expired video results purged");
            }
        }
    })
}
