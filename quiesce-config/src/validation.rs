use std::time::Duration;

use thiserror::Error;
use url::Url;

use super::models::Config;

/// Upper bound for every duration setting (ten years).
pub const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("directory_path is required")]
    MissingDirectory,
    #[error("api_url is required")]
    MissingApiUrl,
    #[error("api_url `{url}` is not a valid absolute URL")]
    InvalidApiUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("api_url `{url}` must use http or https")]
    UnsupportedScheme { url: String },
    #[error("{field} must be greater than zero")]
    MustBePositive { field: &'static str },
    #[error("{field} must not exceed {max_secs} seconds")]
    TooLarge { field: &'static str, max_secs: u64 },
    #[error("at least one eligible file suffix is required")]
    NoSuffixes,
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
    pub fn push_with_hint<S: Into<String>, H: Into<String>>(&mut self, message: S, hint: H) {
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
}

fn check_bounded(field: &'static str, value: Duration) -> Result<(), ConfigGuardRailError> {
    if value > Duration::from_secs(MAX_DURATION_SECS) {
        return Err(ConfigGuardRailError::TooLarge {
            field,
            max_secs: MAX_DURATION_SECS,
        });
    }
    Ok(())
}

pub fn apply_guard_rails(config: &Config) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();
    let watcher = &config.watcher;

    if watcher.directory_path.as_os_str().is_empty() {
        return Err(ConfigGuardRailError::MissingDirectory);
    }

    let api_url = watcher.api_url.trim();
    if api_url.is_empty() {
        return Err(ConfigGuardRailError::MissingApiUrl);
    }
    let parsed = Url::parse(api_url).map_err(|source| ConfigGuardRailError::InvalidApiUrl {
        url: api_url.to_string(),
        source,
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigGuardRailError::UnsupportedScheme {
            url: api_url.to_string(),
        });
    }

    if watcher.poll_interval.is_zero() {
        return Err(ConfigGuardRailError::MustBePositive {
            field: "poll_interval",
        });
    }
    if watcher.batch_size == 0 {
        return Err(ConfigGuardRailError::MustBePositive { field: "batch_size" });
    }
    if watcher.workers == 0 {
        return Err(ConfigGuardRailError::MustBePositive { field: "workers" });
    }
    if watcher.eligible_suffixes.is_empty() {
        return Err(ConfigGuardRailError::NoSuffixes);
    }

    check_bounded("timeout", watcher.timeout)?;
    check_bounded("poll_interval", watcher.poll_interval)?;
    check_bounded("notify_timeout", config.notify_timeout)?;

    if watcher.timeout.is_zero() {
        warnings.push_with_hint(
            "timeout is 0; studies will be marked ready on the first deadline check \
             after their first file",
            "Set timeout to the longest expected gap between files of one study",
        );
    }

    if !watcher.directory_path.exists() {
        warnings.push_with_hint(
            format!("directory_path {} does not exist yet", watcher.directory_path.display()),
            "Scans will report walk errors until the directory is created",
        );
    }

    Ok(warnings)
}
