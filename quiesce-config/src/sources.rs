use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
///
/// Durations are whole seconds, matching the keys operators already use:
///
/// ```toml
/// directory_path = "/data/incoming"
/// api_url = "http://inference:8080/studies/ready"
/// timeout = 60
/// poll_interval = 10
/// batch_size = 100
/// ```
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffixes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_timeout: Option<u64>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub directory_path: Option<PathBuf>,
    pub api_url: Option<String>,
    pub timeout: Option<u64>,
    pub poll_interval: Option<u64>,
    pub batch_size: Option<usize>,
    pub workers: Option<usize>,
    pub model: Option<String>,
    pub suffixes: Option<Vec<String>>,
    pub notify_timeout: Option<u64>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: std::env::var("QUIESCE_CONFIG").ok().map(PathBuf::from),
            directory_path: std::env::var("QUIESCE_DIRECTORY_PATH")
                .ok()
                .map(PathBuf::from),
            api_url: std::env::var("QUIESCE_API_URL").ok(),
            timeout: parse_var("QUIESCE_TIMEOUT"),
            poll_interval: parse_var("QUIESCE_POLL_INTERVAL"),
            batch_size: parse_var("QUIESCE_BATCH_SIZE"),
            workers: parse_var("QUIESCE_WORKERS"),
            model: std::env::var("QUIESCE_MODEL").ok(),
            suffixes: parse_csv_var("QUIESCE_SUFFIXES"),
            notify_timeout: parse_var("QUIESCE_NOTIFY_TIMEOUT"),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn parse_csv_var(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|raw| split_csv(&raw))
}

pub(crate) fn split_csv(raw: &str) -> Vec<String> {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_values_are_trimmed_and_empty_parts_dropped() {
        assert_eq!(split_csv(" .dcm, .dcm.gz ,,"), vec![".dcm", ".dcm.gz"]);
        assert!(split_csv("").is_empty());
    }

    #[test]
    fn file_config_reads_flat_keys() {
        let parsed: FileConfig = toml::from_str(
            r#"
                directory_path = "/data"
                api_url = "http://localhost:8080/ready"
                timeout = 30
                poll_interval = 5
                batch_size = 50
            "#,
        )
        .unwrap();
        assert_eq!(parsed.directory_path, Some(PathBuf::from("/data")));
        assert_eq!(parsed.timeout, Some(30));
        assert_eq!(parsed.batch_size, Some(50));
        assert!(parsed.model.is_none());
    }
}
