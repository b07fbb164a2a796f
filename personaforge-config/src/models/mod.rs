use std::{fmt, path::PathBuf, time::Duration};

use personaforge_core::{PollPolicy, collaborators::VoiceSettings};
use personaforge_model::{ProviderKind, QualityTier};

pub mod sources;

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub runpod: RunPodConfig,
    pub replicate: ReplicateConfig,
    pub providers: ProvidersConfig,
    pub polling: PollPolicy,
    pub video: VideoConfig,
    pub speech: SpeechConfig,
    pub text: TextConfig,
    pub cors: CorsConfig,
    pub dev_mode: bool,
    pub metadata: ConfigMetadata,
}

impl Config {
    /// Providers from the configured order that have credentials, in order.
    pub fn configured_providers(&self) -> Vec<ProviderKind> {
        self.providers
            .order
            .iter()
            .copied()
            .filter(|kind| match kind {
                ProviderKind::RunPod => self.runpod.is_configured(),
                ProviderKind::Replicate => self.replicate.is_configured(),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Default)]
pub struct RunPodConfig {
    /// Full serverless endpoint URL, e.g. `https://api.runpod.ai/v2/<id>`.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

impl RunPodConfig {
    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some() && self.api_key.is_some()
    }
}

impl fmt::Debug for RunPodConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunPodConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &redacted(&self.api_key))
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct ReplicateConfig {
    pub api_token: Option<String>,
    pub model_version: Option<String>,
    pub base_url: Option<String>,
}

impl ReplicateConfig {
    pub fn is_configured(&self) -> bool {
        self.api_token.is_some() && self.model_version.is_some()
    }
}

impl fmt::Debug for ReplicateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicateConfig")
            .field("model_version", &self.model_version)
            .field("base_url", &self.base_url)
            .field("api_token", &redacted(&self.api_token))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ProvidersConfig {
    /// Fallback order; unconfigured entries are skipped at startup.
    pub order: Vec<ProviderKind>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            order: vec![ProviderKind::RunPod, ProviderKind::Replicate],
        }
    }
}

#[derive(Debug, Clone)]
pub struct VideoConfig {
    pub sync_timeout_ms: u64,
    pub talk_timeout_ms: u64,
    pub async_timeout_ms: u64,
    pub result_ttl_secs: u64,
    pub default_quality: QualityTier,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            sync_timeout_ms: 120_000,
            talk_timeout_ms: 60_000,
            async_timeout_ms: 300_000,
            result_ttl_secs: 3_600,
            default_quality: QualityTier::default(),
        }
    }
}

impl VideoConfig {
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    pub fn talk_timeout(&self) -> Duration {
        Duration::from_millis(self.talk_timeout_ms)
    }

    pub fn async_timeout(&self) -> Duration {
        Duration::from_millis(self.async_timeout_ms)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }
}

#[derive(Clone, Default)]
pub struct SpeechConfig {
    pub api_key: Option<String>,
    pub voice_id: Option<String>,
    pub model_id: Option<String>,
    pub base_url: Option<String>,
    pub settings: VoiceSettings,
}

impl SpeechConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.voice_id.is_some()
    }
}

impl fmt::Debug for SpeechConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechConfig")
            .field("voice_id", &self.voice_id)
            .field("model_id", &self.model_id)
            .field("base_url", &self.base_url)
            .field("settings", &self.settings)
            .field("api_key", &redacted(&self.api_key))
            .finish()
    }
}

pub const DEFAULT_TEXT_MAX_TOKENS: u32 = 300;

#[derive(Clone)]
pub struct TextConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: None,
            base_url: None,
            max_tokens: DEFAULT_TEXT_MAX_TOKENS,
            system_prompt: None,
        }
    }
}

impl TextConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

impl fmt::Debug for TextConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("system_prompt", &self.system_prompt.is_some())
            .field("api_key", &redacted(&self.api_key))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    pub fn is_wildcard_included(&self) -> bool {
        self.allowed_origins.iter().any(|origin| origin == "*")
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

fn redacted(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "<redacted>")
}
