//! Configuration types and loading for the application.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveTime, Utc};
use config::{Config, Environment, File, FileFormat};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::paths::{expand_str_path, write_default_config};
use crate::{AppPaths, env_prefix};

/// Watermark used when a channel has never been checked for unread messages.
pub const DEFAULT_WATERMARK: &str = "2017-01-01T00:00:00Z";

/// Keyword for a watermark at midnight UTC of the current day.
pub const WATERMARK_TODAY: &str = "today";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(
    title = "Application Configuration",
    description = "Main configuration for the application"
)]
pub struct AppConfig {
    /// JSON Schema reference for editor support.
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub schema: Option<String>,

    /// Chat server connection settings.
    pub server: ServerConfig,

    /// Credential and token handling.
    pub auth: AuthConfig,

    /// Unread message tracking.
    pub unread: UnreadConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Custom paths for data and state directories.
    pub paths: PathsConfig,
}

impl AppConfig {
    /// Load configuration from file and environment, creating defaults if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read, parsed, or written.
    pub fn load(paths: &AppPaths, dry_run: bool) -> Result<Self> {
        if !paths.config_file.exists() {
            if dry_run {
                log::info!(
                    "dry-run: would create default config at {}",
                    paths.config_file.display()
                );
            } else {
                write_default_config(&paths.config_file)?;
            }
        }

        Self::load_from_path(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub fn load_from_path(config_file: &Path) -> Result<Self> {
        let env_prefix = env_prefix();
        let built = Config::builder()
            .set_default("server.domain", ServerConfig::DEFAULT_DOMAIN)?
            .set_default("server.verify_tls", true)?
            .set_default("server.timeout", 60_i64)?
            .set_default("auth.store_token", true)?
            .set_default("auth.creds_from_env", false)?
            .set_default("unread.default_watermark", DEFAULT_WATERMARK)?
            .set_default("logging.level", "warn")?
            .add_source(
                File::from(config_file)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix(env_prefix.as_str()).separator("__"))
            .build()?;

        let mut config: Self = built.try_deserialize()?;

        if let Some(ref file) = config.logging.file {
            let expanded = expand_str_path(file)?;
            config.logging.file = Some(expanded.display().to_string());
        }

        config.server.domain = config.server.domain.trim_end_matches('/').to_string();
        config.unread.default_watermark_at(Utc::now())?;

        Ok(config)
    }

    /// Point the `[server]` table at a new domain and write the config to disk.
    ///
    /// Other tables in the file are left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or written.
    pub fn set_server(config_path: &Path, domain: &str, verify_tls: bool) -> Result<()> {
        let content = if config_path.exists() {
            std::fs::read_to_string(config_path)
                .with_context(|| format!("reading {}", config_path.display()))?
        } else {
            String::new()
        };

        let mut doc: toml::Table = content.parse().unwrap_or_default();

        let server = doc
            .entry("server")
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));

        if let toml::Value::Table(tbl) = server {
            tbl.insert(
                "domain".to_string(),
                toml::Value::String(domain.trim_end_matches('/').to_string()),
            );
            tbl.insert("verify_tls".to_string(), toml::Value::Boolean(verify_tls));
        }

        let output = toml::to_string_pretty(&doc)?;
        std::fs::write(config_path, output)
            .with_context(|| format!("writing {}", config_path.display()))?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema: None,
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            unread: UnreadConfig::default(),
            logging: LoggingConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

/// Chat server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Chat server connection settings")]
pub struct ServerConfig {
    /// Base URL of the server, e.g. `https://chat.example.com`.
    pub domain: String,

    /// Verify TLS certificates. Disable for self-signed private servers.
    pub verify_tls: bool,

    /// Request timeout in seconds (default: 60).
    #[schemars(range(min = 1))]
    pub timeout: u64,
}

impl ServerConfig {
    /// Domain used until `rchat configure domain` is run.
    pub const DEFAULT_DOMAIN: &str = "http://localhost:3000";
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            domain: Self::DEFAULT_DOMAIN.to_string(),
            verify_tls: true,
            timeout: 60,
        }
    }
}

/// Credential and token handling.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Credential and token handling")]
pub struct AuthConfig {
    /// Persist the login token and reuse it across runs.
    pub store_token: bool,

    /// Read credentials from environment variables instead of the credentials file.
    pub creds_from_env: bool,

    /// Environment variable holding the username.
    pub user_env: String,

    /// Environment variable holding the password.
    pub password_env: String,

    /// Override for the credentials file location. Supports ~ and environment variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creds_file: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            store_token: true,
            creds_from_env: false,
            user_env: "RCHAT_USER".to_string(),
            password_env: "RCHAT_PASSWORD".to_string(),
            creds_file: None,
        }
    }
}

/// Unread message tracking.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Unread message tracking")]
pub struct UnreadConfig {
    /// Starting watermark for channels never checked before: an RFC 3339
    /// timestamp, or "today" for midnight UTC of the current day.
    pub default_watermark: String,

    /// Seconds between polls in `rchat watch` (default: 3).
    #[schemars(range(min = 1))]
    pub poll_interval: u64,
}

impl UnreadConfig {
    /// Resolve `default_watermark` against the given clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is neither "today" nor an RFC 3339 timestamp.
    pub fn default_watermark_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let raw = self.default_watermark.trim();
        if raw.eq_ignore_ascii_case(WATERMARK_TODAY) {
            return Ok(now.date_naive().and_time(NaiveTime::MIN).and_utc());
        }
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| anyhow!("invalid unread.default_watermark '{raw}': {e}"))
    }
}

impl Default for UnreadConfig {
    fn default() -> Self {
        Self {
            default_watermark: DEFAULT_WATERMARK.to_string(),
            poll_interval: 3,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Logging configuration")]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace).
    #[schemars(default = "default_log_level")]
    pub level: LogLevel,

    /// Optional path for log file output. Supports ~ and environment variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Log level enumeration for schema validation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only emit error-level messages.
    Error,
    /// Emit warnings and errors (default).
    #[default]
    Warn,
    /// Emit informational messages and above.
    Info,
    /// Emit debug diagnostics and above.
    Debug,
    /// Emit all messages including fine-grained traces.
    Trace,
}

impl LogLevel {
    /// Matching `log` filter.
    #[must_use]
    pub const fn as_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

const fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            file: None,
        }
    }
}

/// Path override configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Custom paths for data and state directories")]
pub struct PathsConfig {
    /// Directory for persistent data. Supports ~ and environment variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// Directory for state files (tokens, channel watermarks). Supports ~ and
    /// environment variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn defaults_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        write_default_config(&path).unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.server.domain, ServerConfig::DEFAULT_DOMAIN);
        assert!(config.server.verify_tls);
        assert!(config.auth.store_token);
        assert!(!config.auth.creds_from_env);
        assert_eq!(config.unread.default_watermark, DEFAULT_WATERMARK);
    }

    #[test]
    fn set_server_keeps_other_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[auth]\nstore_token = false\n").unwrap();

        AppConfig::set_server(&path, "https://chat.example.com/", false).unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.server.domain, "https://chat.example.com");
        assert!(!config.server.verify_tls);
        assert!(!config.auth.store_token);
    }

    #[test]
    fn watermark_today_is_midnight() {
        let unread = UnreadConfig {
            default_watermark: "today".to_string(),
            ..UnreadConfig::default()
        };
        let now = Utc.with_ymd_and_hms(2023, 3, 9, 17, 45, 12).unwrap();
        let watermark = unread.default_watermark_at(now).unwrap();
        assert_eq!(watermark, Utc.with_ymd_and_hms(2023, 3, 9, 0, 0, 0).unwrap());
    }

    #[test]
    fn watermark_fixed_and_invalid() {
        let now = Utc::now();
        let fixed = UnreadConfig::default().default_watermark_at(now).unwrap();
        assert_eq!(fixed, Utc.with_ymd_and_hms(2017, 1, 1, 0, 0, 0).unwrap());

        let broken = UnreadConfig {
            default_watermark: "last tuesday".to_string(),
            ..UnreadConfig::default()
        };
        assert!(broken.default_watermark_at(now).is_err());
    }
}
