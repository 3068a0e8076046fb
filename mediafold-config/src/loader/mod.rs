pub mod error;

use once_cell::sync::Lazy;
use std::{fs, path::PathBuf, time::Duration};

use self::error::ConfigLoadError;
use crate::{
    constants::*,
    models::{
        CacheConfig, Config, ConfigMetadata, ConversionConfig,
        ConversionStrategy, CorsConfig, FfmpegConfig, MediaConfig,
        PriorityConfig, ServerConfig, ThumbnailConfig,
        sources::{EnvConfig, FileConfig},
    },
    util::parse_duration,
    validation::{self, ConfigWarnings},
};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("mediafold.toml"),
        PathBuf::from("config/mediafold.toml"),
    ]
});

#[derive(Debug, Default, Clone)]
struct ConfigLoaderOptions {
    config_path: Option<PathBuf>,
    env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

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

        let env_config = EnvConfig::gather();
        let (file_config, config_path) = self.load_file_config(&env_config)?;

        let (config, warnings) = Self::compose_config(
            file_config,
            env_config,
            config_path,
            env_file_loaded,
        )?;

        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env_config.config_path.clone());

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            let file_config = read_file_config(&path)?;
            return Ok((Some(file_config), Some(path)));
        }

        match DEFAULT_CONFIG_LOCATIONS
            .iter()
            .find(|candidate| candidate.exists())
        {
            Some(path) => {
                let file_config = read_file_config(path)?;
                Ok((Some(file_config), Some(path.clone())))
            }
            None => Ok((None, None)),
        }
    }

    /// Merge file and environment values (environment wins), create the
    /// scratch directory and collect startup warnings.
    pub fn compose_config(
        file_config: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
        env_file_loaded: bool,
    ) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();

        if file_config.is_none() {
            warnings.push_with_hint(
                "No mediafold.toml detected; falling back to environment variables",
                "Create mediafold.toml or set MEDIAFOLD_CONFIG to tune workers and timeouts",
            );
        }

        let FileConfig {
            server: file_server,
            media: file_media,
            cache: file_cache,
            ffmpeg: file_ffmpeg,
            thumbnails: file_thumbnails,
            conversion: file_conversion,
            priority: file_priority,
            cors: file_cors,
            dev_mode: file_dev_mode,
        } = file_config.unwrap_or_default();

        let server = ServerConfig {
            host: env
                .server_host
                .or(file_server.host)
                .unwrap_or_else(|| DEFAULT_SERVER_HOST.to_string()),
            port: env
                .server_port
                .or(file_server.port)
                .unwrap_or(DEFAULT_SERVER_PORT),
        };

        let media = MediaConfig {
            root: env
                .media_root
                .or(file_media.root)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MEDIA_ROOT)),
        };

        let cache = CacheConfig {
            scratch: env
                .scratch_dir
                .or(file_cache.scratch)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRATCH_DIR)),
        };

        let ffmpeg = FfmpegConfig {
            ffmpeg_path: env
                .ffmpeg_path
                .or(file_ffmpeg.ffmpeg_path)
                .unwrap_or_else(|| DEFAULT_FFMPEG_PATH.to_string()),
        };

        let thumbnails = ThumbnailConfig {
            workers: clamp_workers(
                "thumbnails.workers",
                env.thumbnail_workers
                    .or(file_thumbnails.workers)
                    .unwrap_or(DEFAULT_THUMBNAIL_WORKERS),
                &mut warnings,
            ),
            job_timeout: resolve_duration(
                "thumbnails.job_timeout",
                env.thumbnail_job_timeout.or(file_thumbnails.job_timeout),
                DEFAULT_THUMBNAIL_JOB_TIMEOUT,
            )?,
            attempt_timeout: resolve_duration(
                "thumbnails.attempt_timeout",
                env.thumbnail_attempt_timeout
                    .or(file_thumbnails.attempt_timeout),
                DEFAULT_THUMBNAIL_ATTEMPT_TIMEOUT,
            )?,
            seek_offset: resolve_duration(
                "thumbnails.seek_offset",
                file_thumbnails.seek_offset,
                DEFAULT_THUMBNAIL_SEEK_OFFSET,
            )?,
            fallback_seek_offset: resolve_duration(
                "thumbnails.fallback_seek_offset",
                file_thumbnails.fallback_seek_offset,
                DEFAULT_THUMBNAIL_FALLBACK_SEEK_OFFSET,
            )?,
            width: env
                .thumbnail_width
                .or(file_thumbnails.width)
                .unwrap_or(DEFAULT_THUMBNAIL_WIDTH),
        };
        if thumbnails.width == 0 {
            return Err(ConfigLoadError::InvalidValue {
                field: "thumbnails.width",
                reason: "must be greater than zero".into(),
            });
        }

        let strategy = match env.conversion_strategy {
            Some(raw) => raw.parse::<ConversionStrategy>().map_err(|reason| {
                ConfigLoadError::InvalidValue {
                    field: "conversion.strategy",
                    reason,
                }
            })?,
            None => file_conversion.strategy.unwrap_or_default(),
        };

        let conversion = ConversionConfig {
            strategy,
            workers: clamp_workers(
                "conversion.workers",
                env.conversion_workers
                    .or(file_conversion.workers)
                    .unwrap_or(DEFAULT_CONVERSION_WORKERS),
                &mut warnings,
            ),
            job_timeout: resolve_duration(
                "conversion.job_timeout",
                env.conversion_job_timeout.or(file_conversion.job_timeout),
                DEFAULT_CONVERSION_JOB_TIMEOUT,
            )?,
            poll_interval: resolve_duration(
                "conversion.poll_interval",
                env.conversion_poll_interval
                    .or(file_conversion.poll_interval),
                DEFAULT_CONVERSION_POLL_INTERVAL,
            )?,
        };
        if conversion.poll_interval.is_zero() {
            return Err(ConfigLoadError::InvalidValue {
                field: "conversion.poll_interval",
                reason: "must be greater than zero".into(),
            });
        }

        let priority = PriorityConfig {
            active: file_priority.active.unwrap_or(DEFAULT_ACTIVE_PRIORITY),
            background: file_priority
                .background
                .unwrap_or(DEFAULT_BACKGROUND_PRIORITY),
        };
        if priority.active >= priority.background {
            return Err(ConfigLoadError::InvalidValue {
                field: "priority.active",
                reason: format!(
                    "must be lower than priority.background ({})",
                    priority.background
                ),
            });
        }

        let cors = CorsConfig {
            allowed_origins: env
                .cors_allowed_origins
                .or(file_cors.allowed_origins)
                .unwrap_or_else(default_cors_origins),
            allow_credentials: env
                .cors_allow_credentials
                .or(file_cors.allow_credentials)
                .unwrap_or(true),
        };

        let dev_mode = env.dev_mode.or(file_dev_mode).unwrap_or(false);

        let mut config = Config {
            server,
            media,
            cache,
            ffmpeg,
            thumbnails,
            conversion,
            priority,
            cors,
            dev_mode,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        };

        config
            .ensure_directories()
            .map_err(|err| ConfigLoadError::Filesystem { source: err })?;
        config
            .normalize_paths()
            .map_err(|err| ConfigLoadError::Filesystem { source: err })?;

        warnings.extend(validation::collect_warnings(&config));

        Ok((config, warnings))
    }
}

pub fn read_file_config(
    path: &std::path::Path,
) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|err| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
    toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source: err,
    })
}

fn resolve_duration(
    field: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    match raw {
        Some(value) => parse_duration(&value).map_err(|source| {
            ConfigLoadError::InvalidDuration {
                field,
                value,
                source,
            }
        }),
        None => Ok(default),
    }
}

fn clamp_workers(
    field: &str,
    requested: usize,
    warnings: &mut ConfigWarnings,
) -> usize {
    if requested == 0 {
        warnings.push(format!("{field} was 0; using a single worker"));
        1
    } else {
        requested
    }
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}
