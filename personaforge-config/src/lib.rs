//! Configuration library for PersonaForge.
//!
//! Settings are composed from an optional TOML file, a `.env` file and the
//! process environment (environment wins), then checked by the guard rails
//! in [`validation`]. The server binary is the only consumer; keeping the
//! loader in its own crate lets it be tested without an HTTP stack.

#![allow(missing_docs)]

pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{
    ConfigLoad, ConfigLoader, ConfigLoaderOptions, error::ConfigLoadError,
};
pub use models::{
    Config, ConfigMetadata, CorsConfig, ProvidersConfig, ReplicateConfig,
    RunPodConfig, ServerConfig, SpeechConfig, TextConfig, VideoConfig,
    sources::{EnvConfig, FileConfig},
};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
