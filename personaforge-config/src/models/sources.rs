use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use personaforge_model::{ProviderKind, QualityTier};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub runpod: FileRunPodConfig,
    #[serde(default)]
    pub replicate: FileReplicateConfig,
    #[serde(default)]
    pub providers: FileProvidersConfig,
    #[serde(default)]
    pub polling: FilePollingConfig,
    #[serde(default)]
    pub video: FileVideoConfig,
    #[serde(default)]
    pub speech: FileSpeechConfig,
    #[serde(default)]
    pub text: FileTextConfig,
    #[serde(default)]
    pub cors: FileCorsConfig,
    pub dev_mode: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileRunPodConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileReplicateConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileProvidersConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<ProviderKind>>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FilePollingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_consecutive_errors: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileVideoConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub talk_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub async_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_ttl_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_quality: Option<QualityTier>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileSpeechConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stability: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_boost: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_speaker_boost: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileTextConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCorsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<Vec<String>>,
}

/// Values read from the process environment (after `.env` is applied).
///
/// Strings are kept raw; anything that needs parsing into a domain type is
/// parsed during composition so a typo surfaces as a load error instead of
/// being dropped.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub runpod_endpoint: Option<String>,
    pub runpod_api_key: Option<String>,
    pub replicate_api_token: Option<String>,
    pub replicate_model_version: Option<String>,
    pub replicate_base_url: Option<String>,
    pub provider_order: Option<Vec<String>>,
    pub poll_interval_ms: Option<u64>,
    pub poll_timeout_ms: Option<u64>,
    pub poll_max_consecutive_errors: Option<u32>,
    pub video_sync_timeout_ms: Option<u64>,
    pub video_talk_timeout_ms: Option<u64>,
    pub video_async_timeout_ms: Option<u64>,
    pub video_result_ttl_secs: Option<u64>,
    pub video_default_quality: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_voice_id: Option<String>,
    pub elevenlabs_model_id: Option<String>,
    pub elevenlabs_base_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub anthropic_max_tokens: Option<u32>,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub dev_mode: Option<bool>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        let mut env_config = Self::default();

        env_config.config_path =
            parse_string_var("PERSONAFORGE_CONFIG").map(PathBuf::from);
        env_config.server_host = parse_string_var("SERVER_HOST");
        env_config.server_port = parse_number_var("SERVER_PORT");

        env_config.runpod_endpoint = parse_string_var("RUNPOD_ENDPOINT");
        env_config.runpod_api_key = parse_string_var("RUNPOD_API_KEY");
        env_config.replicate_api_token =
            parse_string_var("REPLICATE_API_TOKEN");
        env_config.replicate_model_version =
            parse_string_var("REPLICATE_MODEL_VERSION");
        env_config.replicate_base_url = parse_string_var("REPLICATE_BASE_URL");
        env_config.provider_order = parse_csv_var("VIDEO_PROVIDER_ORDER");

        env_config.poll_interval_ms = parse_number_var("POLL_INTERVAL_MS");
        env_config.poll_timeout_ms = parse_number_var("POLL_TIMEOUT_MS");
        env_config.poll_max_consecutive_errors =
            parse_number_var("POLL_MAX_CONSECUTIVE_ERRORS");

        env_config.video_sync_timeout_ms =
            parse_number_var("VIDEO_SYNC_TIMEOUT_MS");
        env_config.video_talk_timeout_ms =
            parse_number_var("VIDEO_TALK_TIMEOUT_MS");
        env_config.video_async_timeout_ms =
            parse_number_var("VIDEO_ASYNC_TIMEOUT_MS");
        env_config.video_result_ttl_secs =
            parse_number_var("VIDEO_RESULT_TTL_SECS");
        env_config.video_default_quality =
            parse_string_var("VIDEO_DEFAULT_QUALITY");

        env_config.elevenlabs_api_key = parse_string_var("ELEVENLABS_API_KEY");
        env_config.elevenlabs_voice_id =
            parse_string_var("ELEVENLABS_VOICE_ID");
        env_config.elevenlabs_model_id =
            parse_string_var("ELEVENLABS_MODEL_ID");
        env_config.elevenlabs_base_url =
            parse_string_var("ELEVENLABS_BASE_URL");

        env_config.anthropic_api_key = parse_string_var("ANTHROPIC_API_KEY");
        env_config.anthropic_model = parse_string_var("ANTHROPIC_MODEL");
        env_config.anthropic_base_url = parse_string_var("ANTHROPIC_BASE_URL");
        env_config.anthropic_max_tokens =
            parse_number_var("ANTHROPIC_MAX_TOKENS");

        env_config.cors_allowed_origins = parse_csv_var("CORS_ALLOWED_ORIGINS");
        env_config.dev_mode = parse_bool_var("DEV_MODE");

        env_config
    }
}

/// Blank values count as unset so `RUNPOD_API_KEY=` in a `.env` template
/// does not look like a credential.
fn parse_string_var(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|raw| {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_number_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn parse_csv_var(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|raw| {
        raw.split(',')
            .filter_map(|part| {
                let trimmed = part.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect()
    })
}

fn parse_bool_var(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|raw| {
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    })
}
