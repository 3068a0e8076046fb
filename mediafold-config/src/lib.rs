//! Shared configuration library for mediafold.
//!
//! Configuration is assembled from an optional `.env` file, an optional
//! `mediafold.toml`, and process environment variables (highest precedence).
//! The server re-exports these types so there is a single source of truth
//! for defaults and validation rules.

pub mod constants;
pub mod loader;
pub mod models;
pub mod util;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoader, error::ConfigLoadError};
pub use models::{
    CacheConfig, Config, ConfigMetadata, ConversionConfig, ConversionStrategy,
    CorsConfig, FfmpegConfig, MediaConfig, PriorityConfig, ServerConfig,
    ThumbnailConfig,
};
pub use validation::{ConfigWarning, ConfigWarnings};
