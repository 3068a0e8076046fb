use std::path::Path;

use super::models::Config;

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

/// Checks that never fail the load but are worth surfacing at startup.
pub fn collect_warnings(config: &Config) -> ConfigWarnings {
    let mut warnings = ConfigWarnings::default();

    if !config.media.root.is_dir() {
        warnings.push_with_hint(
            format!(
                "Media root {} does not exist or is not a directory",
                config.media.root.display()
            ),
            "Set MEDIA_ROOT (or PHOTOS_DIR) to the folder that holds your photos",
        );
    }

    let ffmpeg = Path::new(&config.ffmpeg.ffmpeg_path);
    if ffmpeg.components().count() > 1 && !ffmpeg.exists() {
        warnings.push_with_hint(
            format!("FFMPEG_PATH {} does not exist", ffmpeg.display()),
            "Thumbnails and conversions will fail until ffmpeg is installed",
        );
    }

    if config.priority.active >= config.priority.background {
        warnings.push(format!(
            "Active-folder priority ({}) is not lower than background priority ({}); folder affinity has no effect",
            config.priority.active, config.priority.background
        ));
    }

    if config.thumbnails.attempt_timeout * 2 > config.thumbnails.job_timeout {
        warnings.push(
            "Thumbnail job timeout leaves no room for the fallback seek attempt",
        );
    }

    if !config.dev_mode && config.cors.is_wildcard_included() {
        warnings.push_with_hint(
            "CORS wildcard origin configured outside of DEV_MODE",
            "List explicit origins in CORS_ALLOWED_ORIGINS",
        );
    }

    if config.cors.allow_credentials && config.cors.is_wildcard_included() {
        warnings.push(
            "CORS credentials allowed alongside wildcard origin; browsers will reject such configuration",
        );
    }

    warnings
}
