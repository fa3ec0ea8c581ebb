use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uploader_core::{UploadPolicy, DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_MAX_UPLOAD_BYTES};
use uploader_engine::{ApiError, ClientSettings, PollSettings, DEFAULT_BASE_URL};
use uploader_logging::uploader_info;

pub const DEFAULT_CONFIG_FILE: &str = "uploader.ron";
pub const ENV_BASE_URL: &str = "UPLOADER_BASE_URL";
pub const ENV_TOKEN: &str = "UPLOADER_TOKEN";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Settings read from `uploader.ron`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    pub max_upload_bytes: u64,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub upload_timeout_ms: u64,
    pub log_to_file: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_ms: 3_000,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            upload_timeout_ms: 60 * 60 * 1_000,
            log_to_file: false,
        }
    }
}

impl AppConfig {
    /// Loads `path`, or `uploader.ron` in the working directory when `path` is
    /// `None`. Only the implicit file may be missing.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if !required && err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        let config = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        uploader_info!("loaded config from {:?}", path);
        config.validate()
    }

    pub fn parse(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    /// Applies `UPLOADER_BASE_URL` through `lookup`, usually `std::env::var`.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|url| !url.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        self
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Zero {
                field: "poll_interval_ms",
            });
        }
        if self.max_poll_attempts == 0 {
            return Err(ConfigError::Zero {
                field: "max_poll_attempts",
            });
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Zero {
                field: "max_upload_bytes",
            });
        }
        Ok(self)
    }

    pub fn client_settings(&self) -> Result<ClientSettings, ApiError> {
        let mut settings = ClientSettings::new(&self.base_url)?;
        settings.connect_timeout = Duration::from_millis(self.connect_timeout_ms);
        settings.request_timeout = Duration::from_millis(self.request_timeout_ms);
        settings.upload_timeout = Duration::from_millis(self.upload_timeout_ms);
        Ok(settings)
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn policy(&self) -> UploadPolicy {
        UploadPolicy::with_max_bytes(self.max_upload_bytes)
    }
}

/// `--token` wins over `UPLOADER_TOKEN`.
pub fn resolve_token<F>(flag: Option<String>, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    flag.or_else(|| lookup(ENV_TOKEN))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = AppConfig::parse("(poll_interval_ms: 500, log_to_file: true)").unwrap();
        assert_eq!(config.poll_interval_ms, 500);
        assert!(config.log_to_file);
        assert_eq!(config.max_poll_attempts, DEFAULT_MAX_POLL_ATTEMPTS);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(Some(&dir.path().join("absent.ron"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn file_on_disk_is_loaded_and_validated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(base_url: \"https://videos.example.com/api\", max_poll_attempts: 5)")
            .unwrap();
        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.base_url, "https://videos.example.com/api");
        assert_eq!(config.max_poll_attempts, 5);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "(max_poll_attempts: 0)").unwrap();
        assert!(matches!(
            AppConfig::load(Some(bad.path())),
            Err(ConfigError::Zero {
                field: "max_poll_attempts"
            })
        ));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(poll_interval_ms: \"soon\")").unwrap();
        assert!(matches!(
            AppConfig::load(Some(file.path())),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn env_overrides_base_url() {
        let config = AppConfig::default().with_env(|key| {
            (key == ENV_BASE_URL).then(|| " https://staging.example.com/api ".to_string())
        });
        assert_eq!(config.base_url, "https://staging.example.com/api");
        assert_eq!(AppConfig::default().with_env(no_env), AppConfig::default());
    }

    #[test]
    fn token_flag_wins_over_env() {
        let env = |key: &str| (key == ENV_TOKEN).then(|| "from-env".to_string());
        assert_eq!(
            resolve_token(Some("from-flag".to_string()), env).as_deref(),
            Some("from-flag")
        );
        assert_eq!(resolve_token(None, env).as_deref(), Some("from-env"));
        assert_eq!(resolve_token(Some("  ".to_string()), no_env), None);
    }

    #[test]
    fn settings_carry_configured_timeouts() {
        let config = AppConfig {
            request_timeout_ms: 1_500,
            poll_interval_ms: 250,
            ..AppConfig::default()
        };
        let settings = config.client_settings().unwrap();
        assert_eq!(settings.request_timeout, Duration::from_millis(1_500));
        assert_eq!(config.poll_settings().interval, Duration::from_millis(250));
        assert_eq!(config.policy().max_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }
}
