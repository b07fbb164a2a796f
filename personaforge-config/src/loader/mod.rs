use once_cell::sync::Lazy;
use std::{collections::HashSet, fs, path::PathBuf};
use tracing::debug;

use personaforge_core::{PollPolicy, collaborators::VoiceSettings};
use personaforge_model::{ProviderKind, QualityTier};

use crate::{
    models::{
        Config, ConfigMetadata, CorsConfig, ProvidersConfig, ReplicateConfig,
        RunPodConfig, ServerConfig, SpeechConfig, TextConfig, VideoConfig,
        sources::{EnvConfig, FileConfig},
    },
    validation::{self, ConfigWarnings},
};

pub mod error;

use error::ConfigLoadError;

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("personaforge.toml"),
        PathBuf::from("config/personaforge.toml"),
    ]
});

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Applies the `.env` file to the process environment, then composes the
    /// configuration from the file and the environment.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let mut load = self.load_from_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Composes against an already gathered environment without touching
    /// the process environment or any `.env` file.
    pub fn load_from_env(
        &self,
        env_config: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env_config)?;
        let (config, warnings) =
            compose_config(file_config, env_config, config_path)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let mut source = ConfigPathSource::default();

        if let Some(explicit) = &self.options.config_path {
            source.explicit = Some(explicit.clone());
        } else if let Some(from_env) = &env_config.config_path {
            source.env = Some(from_env.clone());
        }

        if source.is_empty() {
            source.default = DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
                .cloned();
        }

        let Some((path, provenance)) = source.resolved_path() else {
            return Ok((None, None));
        };

        if !path.exists() {
            if provenance.is_explicit() {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents =
            fs::read_to_string(&path).map_err(|err| ConfigLoadError::Io {
                path: path.clone(),
                source: err,
            })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|err| {
                ConfigLoadError::Parse {
                    path: path.clone(),
                    source: err,
                }
            })?;
        debug!(
            path = %path.display(),
            ?provenance,
            "configuration file loaded"
        );

        Ok((Some(file_config), Some(path)))
    }
}

fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();

    if file_config.is_none() {
        warnings.push_with_hint(
            "No personaforge.toml detected; falling back to environment variables",
            "Copy personaforge.example.toml to personaforge.toml or set PERSONAFORGE_CONFIG",
        );
    }

    let FileConfig {
        server: file_server,
        runpod: file_runpod,
        replicate: file_replicate,
        providers: file_providers,
        polling: file_polling,
        video: file_video,
        speech: file_speech,
        text: file_text,
        cors: file_cors,
        dev_mode: file_dev_mode,
    } = file_config.unwrap_or_default();

    let server = ServerConfig {
        host: env
            .server_host
            .or(file_server.host)
            .unwrap_or_else(|| "0.0.0.0".to_string()),
        port: env.server_port.or(file_server.port).unwrap_or(3000),
    };

    let runpod = RunPodConfig {
        endpoint: env.runpod_endpoint.or(non_blank(file_runpod.endpoint)),
        api_key: env.runpod_api_key.or(non_blank(file_runpod.api_key)),
    };

    let replicate = ReplicateConfig {
        api_token: env
            .replicate_api_token
            .or(non_blank(file_replicate.api_token)),
        model_version: env
            .replicate_model_version
            .or(non_blank(file_replicate.model_version)),
        base_url: env
            .replicate_base_url
            .or(non_blank(file_replicate.base_url)),
    };

    let order = match env.provider_order {
        Some(names) => names
            .iter()
            .map(|name| name.parse::<ProviderKind>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| ConfigLoadError::InvalidValue {
                field: "VIDEO_PROVIDER_ORDER",
                source,
            })?,
        None => file_providers
            .order
            .unwrap_or_else(|| ProvidersConfig::default().order),
    };
    let providers = ProvidersConfig {
        order: dedupe_order(order, &mut warnings),
    };

    let poll_defaults = PollPolicy::default();
    let polling = PollPolicy {
        interval_ms: env
            .poll_interval_ms
            .or(file_polling.interval_ms)
            .unwrap_or(poll_defaults.interval_ms),
        timeout_ms: env
            .poll_timeout_ms
            .or(file_polling.timeout_ms)
            .unwrap_or(poll_defaults.timeout_ms),
        max_consecutive_errors: env
            .poll_max_consecutive_errors
            .or(file_polling.max_consecutive_errors)
            .unwrap_or(poll_defaults.max_consecutive_errors),
    };

    let default_quality = match env.video_default_quality {
        Some(raw) => raw.parse::<QualityTier>().map_err(|source| {
            ConfigLoadError::InvalidValue {
                field: "VIDEO_DEFAULT_QUALITY",
                source,
            }
        })?,
        None => file_video.default_quality.unwrap_or_default(),
    };
    let video_defaults = VideoConfig::default();
    let video = VideoConfig {
        sync_timeout_ms: env
            .video_sync_timeout_ms
            .or(file_video.sync_timeout_ms)
            .unwrap_or(video_defaults.sync_timeout_ms),
        talk_timeout_ms: env
            .video_talk_timeout_ms
            .or(file_video.talk_timeout_ms)
            .unwrap_or(video_defaults.talk_timeout_ms),
        async_timeout_ms: env
            .video_async_timeout_ms
            .or(file_video.async_timeout_ms)
            .unwrap_or(video_defaults.async_timeout_ms),
        result_ttl_secs: env
            .video_result_ttl_secs
            .or(file_video.result_ttl_secs)
            .unwrap_or(video_defaults.result_ttl_secs),
        default_quality,
    };

    let voice_defaults = VoiceSettings::default();
    let speech = SpeechConfig {
        api_key: env.elevenlabs_api_key.or(non_blank(file_speech.api_key)),
        voice_id: env.elevenlabs_voice_id.or(non_blank(file_speech.voice_id)),
        model_id: env.elevenlabs_model_id.or(non_blank(file_speech.model_id)),
        base_url: env.elevenlabs_base_url.or(non_blank(file_speech.base_url)),
        settings: VoiceSettings {
            stability: file_speech
                .stability
                .unwrap_or(voice_defaults.stability),
            similarity_boost: file_speech
                .similarity_boost
                .unwrap_or(voice_defaults.similarity_boost),
            style: file_speech.style.unwrap_or(voice_defaults.style),
            use_speaker_boost: file_speech
                .use_speaker_boost
                .unwrap_or(voice_defaults.use_speaker_boost),
        },
    };

    let text = TextConfig {
        api_key: env.anthropic_api_key.or(non_blank(file_text.api_key)),
        model: env.anthropic_model.or(non_blank(file_text.model)),
        base_url: env.anthropic_base_url.or(non_blank(file_text.base_url)),
        max_tokens: env
            .anthropic_max_tokens
            .or(file_text.max_tokens)
            .unwrap_or(TextConfig::default().max_tokens),
        system_prompt: non_blank(file_text.system_prompt),
    };

    let cors = CorsConfig {
        allowed_origins: env
            .cors_allowed_origins
            .or(file_cors.allowed_origins)
            .unwrap_or_else(default_cors_origins),
    };

    let config = Config {
        server,
        runpod,
        replicate,
        providers,
        polling,
        video,
        speech,
        text,
        cors,
        dev_mode: env.dev_mode.or(file_dev_mode).unwrap_or(false),
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded: false,
        },
    };

    warnings.extend(validation::apply_guard_rails(&config)?);

    Ok((config, warnings))
}

fn dedupe_order(
    order: Vec<ProviderKind>,
    warnings: &mut ConfigWarnings,
) -> Vec<ProviderKind> {
    let mut seen = HashSet::new();
    let mut deduped = Vec::with_capacity(order.len());
    for kind in order {
        if seen.insert(kind) {
            deduped.push(kind);
        } else {
            warnings.push(format!(
                "provider {kind} listed more than once in providers.order; later entries ignored"
            ));
        }
    }
    deduped
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|raw| !raw.trim().is_empty())
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

#[derive(Debug, Default)]
struct ConfigPathSource {
    explicit: Option<PathBuf>,
    env: Option<PathBuf>,
    default: Option<PathBuf>,
}

impl ConfigPathSource {
    fn is_empty(&self) -> bool {
        self.explicit.is_none() && self.env.is_none() && self.default.is_none()
    }

    fn resolved_path(&self) -> Option<(PathBuf, ConfigPathProvenance)> {
        if let Some(path) = &self.explicit {
            return Some((path.clone(), ConfigPathProvenance::Explicit));
        }
        if let Some(path) = &self.env {
            return Some((path.clone(), ConfigPathProvenance::Env));
        }
        if let Some(path) = &self.default {
            return Some((path.clone(), ConfigPathProvenance::Default));
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigPathProvenance {
    Explicit,
    Env,
    Default,
}

impl ConfigPathProvenance {
    fn is_explicit(self) -> bool {
        matches!(
            self,
            ConfigPathProvenance::Explicit | ConfigPathProvenance::Env
        )
    }
}
