// Configuration loading and parsing (config/lcu-dash.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use lcu_dash_core::normalize::DEFAULT_ICON_URL_TEMPLATE;

/// Backend `get_history` rejects counts outside this range.
pub const HISTORY_COUNT_RANGE: std::ops::RangeInclusive<u32> = 1..=200;

const CONFIG_FILE: &str = "lcu-dash.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub push: PushConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Root of the HTTP API, e.g. `http://127.0.0.1:5000`.
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// Websocket endpoint of the push channel.
    pub url: String,
    #[serde(default = "default_reconnect_secs")]
    pub reconnect_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// SQLite file for preferences. Empty means the platform data directory.
    #[serde(default)]
    pub db_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    #[serde(default = "default_history_count")]
    pub history_count: u32,
    #[serde(default = "default_icon_url_template")]
    pub icon_url_template: String,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            history_count: default_history_count(),
            icon_url_template: default_icon_url_template(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    /// Connection flag assumed until the first poll answers.
    #[serde(default)]
    pub assume_connected: bool,
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_reconnect_secs() -> u64 {
    3
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_history_count() -> u32 {
    20
}

fn default_icon_url_template() -> String {
    DEFAULT_ICON_URL_TEMPLATE.to_string()
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll.interval_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.push.reconnect_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.request_timeout_secs)
    }

    /// Where the preferences database lives. An empty `storage.db_path`
    /// resolves to `<data dir>/preferences.db`, falling back to the working
    /// directory when the platform has no data directory.
    pub fn resolved_db_path(&self) -> PathBuf {
        if !self.storage.db_path.trim().is_empty() {
            return PathBuf::from(self.storage.db_path.trim());
        }
        directories::ProjectDirs::from("", "", "lcu-dash")
            .map(|dirs| dirs.data_dir().join("preferences.db"))
            .unwrap_or_else(|| PathBuf::from("preferences.db"))
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/lcu-dash.toml` relative to `base_dir`.
///
/// Does not copy defaults; prefer `load_config()`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let config = parse_config(&text).map_err(|source| ConfigError::ParseError {
        path: path.clone(),
        source,
    })?;
    validate(&config)?;
    Ok(config)
}

/// Parse without validating.
pub fn parse_config(text: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(text)
}

/// Copy every file from `defaults/` into `config/` that is not already
/// there. Returns the copied paths. `.example` files are skipped.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the crate root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }

        let target = config_dir.join(file_name);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Load config relative to the working directory, copying defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    check_url("backend.base_url", &config.backend.base_url, &["http", "https"])?;
    check_url("push.url", &config.push.url, &["ws", "wss"])?;

    let durations: &[(&str, u64)] = &[
        ("backend.request_timeout_secs", config.backend.request_timeout_secs),
        ("push.reconnect_secs", config.push.reconnect_secs),
        ("poll.interval_secs", config.poll.interval_secs),
    ];
    for (name, val) in durations {
        if *val == 0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must be > 0".into(),
            });
        }
    }

    let count = config.stats.history_count;
    if !HISTORY_COUNT_RANGE.contains(&count) {
        return Err(ConfigError::ValidationError {
            field: "stats.history_count".into(),
            message: format!(
                "must be between {} and {}, got {count}",
                HISTORY_COUNT_RANGE.start(),
                HISTORY_COUNT_RANGE.end()
            ),
        });
    }

    if !config.stats.icon_url_template.contains("{id}") {
        return Err(ConfigError::ValidationError {
            field: "stats.icon_url_template".into(),
            message: "must contain the `{id}` placeholder".into(),
        });
    }

    Ok(())
}

fn check_url(field: &str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let url = reqwest::Url::parse(value).map_err(|e| ConfigError::ValidationError {
        field: field.into(),
        message: format!("invalid URL {value:?}: {e}"),
    })?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::ValidationError {
            field: field.into(),
            message: format!("scheme must be one of {schemes:?}, got {:?}", url.scheme()),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
