use thiserror::Error;
use url::Url;

use super::models::Config;

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("invalid polling configuration: {reason}")]
    InvalidPolling { reason: String },
    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },
    #[error("{field} is not a valid URL")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("CORS wildcard origins are not allowed when DEV_MODE is false")]
    DangerousCorsWildcard,
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    validate_polling(config)?;
    validate_timeouts(config)?;
    validate_urls(config)?;

    if !config.dev_mode && config.cors.is_wildcard_included() {
        return Err(ConfigGuardRailError::DangerousCorsWildcard);
    }

    if config.configured_providers().is_empty() {
        warnings.push_with_hint(
            "No video provider configured; video requests will degrade to audio-only responses",
            "Set RUNPOD_ENDPOINT and RUNPOD_API_KEY, or REPLICATE_API_TOKEN and REPLICATE_MODEL_VERSION",
        );
    }

    if config.runpod.endpoint.is_some() != config.runpod.api_key.is_some() {
        warnings.push(
            "RunPod is only partially configured; both RUNPOD_ENDPOINT and RUNPOD_API_KEY are required",
        );
    }

    if config.replicate.api_token.is_some()
        && config.replicate.model_version.is_none()
    {
        warnings.push(
            "REPLICATE_API_TOKEN set without REPLICATE_MODEL_VERSION; Replicate is disabled",
        );
    }

    if !config.speech.is_configured() {
        warnings.push_with_hint(
            "Speech synthesis not configured; replies will be returned as text only",
            "Set ELEVENLABS_API_KEY and ELEVENLABS_VOICE_ID",
        );
    }

    if !config.text.is_configured() {
        warnings.push_with_hint(
            "Text generation not configured; requests must carry the reply text",
            "Set ANTHROPIC_API_KEY to generate replies from a message",
        );
    }

    if config.polling.timeout_ms > config.video.sync_timeout_ms {
        warnings.push(format!(
            "polling.timeout_ms ({}) exceeds video.sync_timeout_ms ({}); synchronous renders stop at the shorter budget",
            config.polling.timeout_ms, config.video.sync_timeout_ms
        ));
    }

    Ok(warnings)
}

fn validate_polling(config: &Config) -> Result<(), ConfigGuardRailError> {
    let polling = &config.polling;
    if polling.interval_ms == 0 {
        return Err(ConfigGuardRailError::InvalidPolling {
            reason: "interval_ms must be greater than zero".into(),
        });
    }
    if polling.timeout_ms < polling.interval_ms {
        return Err(ConfigGuardRailError::InvalidPolling {
            reason: format!(
                "timeout_ms ({}) is shorter than interval_ms ({})",
                polling.timeout_ms, polling.interval_ms
            ),
        });
    }
    Ok(())
}

fn validate_timeouts(config: &Config) -> Result<(), ConfigGuardRailError> {
    let video = &config.video;
    for (field, value) in [
        ("video.sync_timeout_ms", video.sync_timeout_ms),
        ("video.talk_timeout_ms", video.talk_timeout_ms),
        ("video.async_timeout_ms", video.async_timeout_ms),
        ("video.result_ttl_secs", video.result_ttl_secs),
    ] {
        if value == 0 {
            return Err(ConfigGuardRailError::ZeroTimeout { field });
        }
    }
    Ok(())
}

fn validate_urls(config: &Config) -> Result<(), ConfigGuardRailError> {
    for (field, value) in [
        ("runpod.endpoint", &config.runpod.endpoint),
        ("replicate.base_url", &config.replicate.base_url),
        ("speech.base_url", &config.speech.base_url),
        ("text.base_url", &config.text.base_url),
    ] {
        if let Some(raw) = value {
            Url::parse(raw)
                .map_err(|source| ConfigGuardRailError::InvalidUrl {
                    field,
                    source,
                })?;
        }
    }
    Ok(())
}
