use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

use quiesce_core::WatcherSettings;
use quiesce_core::settings::{DEFAULT_MODEL, default_eligible_suffixes_vec, default_worker_count};

use super::{
    models::{Config, ConfigMetadata},
    sources::{EnvConfig, FileConfig},
    validation::{self, ConfigGuardRailError, ConfigWarnings},
};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("quiesce.toml"),
        PathBuf::from("config/quiesce.toml"),
        PathBuf::from("/app/config.toml"),
        PathBuf::from("/app/config.yaml"),
    ]
});

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Default, Clone)]
struct ConfigLoaderOptions {
    config_path: Option<PathBuf>,
    env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
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

    /// Load `.env`, the config file and environment overrides, then validate.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
            None => dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
        };

        let env_config = EnvConfig::gather();
        let (file_config, config_path) = self.load_file_config(&env_config)?;

        self.compose(file_config, env_config, config_path, env_file_loaded)
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = match (&self.options.config_path, &env_config.config_path) {
            (Some(path), _) => (Some(path.clone()), true),
            (None, Some(path)) => (Some(path.clone()), true),
            (None, None) => (
                DEFAULT_CONFIG_LOCATIONS
                    .iter()
                    .find(|candidate| candidate.exists())
                    .cloned(),
                false,
            ),
        };

        let Some(path) = path else {
            return Ok((None, None));
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        Ok((Some(read_file_config(&path)?), Some(path)))
    }

    /// Merge file values, environment overrides and defaults, in that
    /// precedence order from lowest to highest: defaults, file, environment.
    pub fn compose(
        &self,
        file_config: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
        env_file_loaded: bool,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();

        if file_config.is_none() {
            warnings.push_with_hint(
                "No configuration file detected; falling back to environment variables",
                "Pass --config or set QUIESCE_CONFIG to point at a configuration file",
            );
        }

        let FileConfig {
            directory_path,
            api_url,
            timeout,
            poll_interval,
            batch_size,
            workers,
            model,
            suffixes,
            notify_timeout,
        } = file_config.unwrap_or_default();

        let watcher = WatcherSettings {
            directory_path: env.directory_path.or(directory_path).unwrap_or_default(),
            api_url: env.api_url.or(api_url).unwrap_or_default(),
            timeout: Duration::from_secs(env.timeout.or(timeout).unwrap_or(DEFAULT_TIMEOUT_SECS)),
            poll_interval: Duration::from_secs(
                env.poll_interval
                    .or(poll_interval)
                    .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            batch_size: env.batch_size.or(batch_size).unwrap_or(DEFAULT_BATCH_SIZE),
            workers: env.workers.or(workers).unwrap_or_else(default_worker_count),
            model: env
                .model
                .or(model)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            eligible_suffixes: env
                .suffixes
                .or(suffixes)
                .unwrap_or_else(default_eligible_suffixes_vec),
        };

        let config = Config {
            watcher,
            notify_timeout: Duration::from_secs(
                env.notify_timeout
                    .or(notify_timeout)
                    .unwrap_or(DEFAULT_NOTIFY_TIMEOUT_SECS),
            ),
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        };

        warnings.extend(validation::apply_guard_rails(&config)?);

        Ok(ConfigLoad { config, warnings })
    }
}

/// Parse a config file. `.yaml` / `.yml` files use YAML with the same flat
/// keys; everything else is read as TOML.
fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents = fs::read_to_string(path).map_err(|err| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source: err,
    })?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
    if is_yaml {
        return serde_yaml::from_str(&contents).map_err(|err| ConfigLoadError::ParseYaml {
            path: path.to_path_buf(),
            source: err,
        });
    }

    toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source: err,
    })
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to parse configuration {path}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}
