//! XDG-compliant path resolution for application directories.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::{APP_NAME, AppConfig};

/// Credentials file name inside the config directory.
pub const CREDS_FILENAME: &str = "creds.json";

/// Application paths for config, data, and state directories.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Path to the configuration file.
    pub config_file: PathBuf,
    /// Path to the credentials file (`{"user": ..., "password": ...}`).
    pub creds_file: PathBuf,
    /// Directory for persistent application data.
    pub data_dir: PathBuf,
    /// Directory for application state files (tokens, channel watermarks).
    pub state_dir: PathBuf,
}

impl AppPaths {
    /// Discover application paths, optionally overriding the config file location.
    ///
    /// # Errors
    ///
    /// Returns an error if paths cannot be resolved or expanded.
    pub fn discover(override_path: Option<&Path>) -> Result<Self> {
        let config_file = match override_path {
            Some(path) => {
                let expanded = expand_path(path)?;
                if expanded.is_dir() {
                    expanded.join("config.toml")
                } else {
                    expanded
                }
            }
            None => default_config_dir()?.join("config.toml"),
        };

        let Some(config_dir) = config_file.parent() else {
            return Err(anyhow!(
                "invalid config file path: {}",
                config_file.display()
            ));
        };
        let creds_file = config_dir.join(CREDS_FILENAME);

        let data_dir = default_data_dir()?;
        let state_dir = default_state_dir()?;

        Ok(Self {
            config_file,
            creds_file,
            data_dir,
            state_dir,
        })
    }

    /// Apply path overrides from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if override paths cannot be expanded.
    pub fn apply_overrides(mut self, cfg: &AppConfig) -> Result<Self> {
        if let Some(ref data_override) = cfg.paths.data_dir {
            self.data_dir = expand_str_path(data_override)?;
        }
        if let Some(ref state_override) = cfg.paths.state_dir {
            self.state_dir = expand_str_path(state_override)?;
        }
        if let Some(ref creds_override) = cfg.auth.creds_file {
            self.creds_file = expand_str_path(creds_override)?;
        }
        Ok(self)
    }

    /// Directory holding one token file per user.
    #[must_use]
    pub fn token_dir(&self) -> PathBuf {
        self.state_dir.join("tokens")
    }

    /// Directory holding one watermark file per channel.
    #[must_use]
    pub fn channel_dir(&self) -> PathBuf {
        self.state_dir.join("channels")
    }

    /// Ensure all required directories exist.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created.
    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("creating data directory {}", self.data_dir.display()))?;
        for dir in [self.state_dir.clone(), self.token_dir(), self.channel_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("creating state directory {}", dir.display()))?;
        }
        Ok(())
    }

    /// Log directory creation in dry-run mode.
    pub fn log_dry_run(&self) {
        log::info!(
            "dry-run: would ensure data dir {} and state dir {}",
            self.data_dir.display(),
            self.state_dir.display()
        );
    }
}

impl std::fmt::Display for AppPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "config: {}, creds: {}, data: {}, state: {}",
            self.config_file.display(),
            self.creds_file.display(),
            self.data_dir.display(),
            self.state_dir.display()
        )
    }
}

/// Percent-encode an arbitrary key (username, room id + name) into a file stem.
///
/// Distinct keys always give distinct stems. Leading dots are encoded too,
/// so a stem never names a hidden file or a parent directory.
#[must_use]
pub fn encode_file_stem(key: &str) -> String {
    if key.is_empty() {
        return "%".to_string();
    }
    let rest = key.trim_start_matches('.');
    let dots = key.len() - rest.len();
    format!("{}{}", "%2E".repeat(dots), urlencoding::encode(rest))
}

/// Expand a `PathBuf`, resolving ~ and environment variables.
///
/// # Errors
///
/// Returns an error if shell expansion fails.
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    path.to_str()
        .map_or_else(|| Ok(path.to_path_buf()), expand_str_path)
}

/// Expand a string path, resolving ~ and environment variables.
///
/// # Errors
///
/// Returns an error if shell expansion fails.
pub fn expand_str_path(text: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(text).context("expanding path")?;
    Ok(PathBuf::from(expanded.to_string()))
}

/// `$<var>/rchat`, else the platform directory from `dirs`, else
/// `~/<home_fallback>/rchat`.
fn xdg_dir(
    var: &str,
    platform: fn() -> Option<PathBuf>,
    home_fallback: &[&str],
    what: &str,
) -> Result<PathBuf> {
    if let Some(dir) = env::var_os(var).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }
    if let Some(dir) = platform() {
        return Ok(dir.join(APP_NAME));
    }
    let home = dirs::home_dir().ok_or_else(|| anyhow!("unable to determine {what} directory"))?;
    Ok(home_fallback
        .iter()
        .fold(home, |path, part| path.join(part))
        .join(APP_NAME))
}

/// Default configuration directory (`XDG_CONFIG_HOME` or fallback).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_config_dir() -> Result<PathBuf> {
    xdg_dir("XDG_CONFIG_HOME", dirs::config_dir, &[".config"], "configuration")
}

/// Default data directory (`XDG_DATA_HOME` or fallback).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_data_dir() -> Result<PathBuf> {
    xdg_dir("XDG_DATA_HOME", dirs::data_dir, &[".local", "share"], "data")
}

/// Default state directory, where tokens and channel watermarks live.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_state_dir() -> Result<PathBuf> {
    xdg_dir("XDG_STATE_HOME", dirs::state_dir, &[".local", "state"], "state")
}

/// Default cache directory (`XDG_CACHE_HOME` or fallback).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_cache_dir() -> Result<PathBuf> {
    xdg_dir("XDG_CACHE_HOME", dirs::cache_dir, &[".cache"], "cache")
}

/// Write the default configuration file to the specified path.
///
/// # Errors
///
/// Returns an error if the file cannot be written or the directory cannot be created.
pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }

    let toml_str =
        toml::to_string_pretty(&AppConfig::default()).context("serializing default config to TOML")?;
    let body = default_config_header(path) + &toml_str;
    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}

fn default_config_header(path: &Path) -> String {
    format!(
        "# Configuration for {APP_NAME}\n# File: {}\n# Credentials: {CREDS_FILENAME} next to this file\n\n",
        path.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stems_stay_inside_the_directory() {
        assert_eq!(encode_file_stem("alice"), "alice");
        assert_eq!(encode_file_stem("bob@example.com"), "bob%40example.com");
        assert_eq!(encode_file_stem("GENERAL:general"), "GENERAL%3Ageneral");
        assert_eq!(encode_file_stem("../../etc/passwd"), "%2E%2E%2F..%2Fetc%2Fpasswd");
        assert_eq!(encode_file_stem(".hidden"), "%2Ehidden");
        assert_eq!(encode_file_stem(""), "%");
    }

    #[test]
    fn similar_keys_get_distinct_stems() {
        let keys = ["a/b", "a_b", "a%2Fb", "x:y", "x_y", ".x", "%2Ex", "", "%"];
        let mut stems: Vec<_> = keys.iter().map(|k| encode_file_stem(k)).collect();
        stems.sort_unstable();
        stems.dedup();
        assert_eq!(stems.len(), keys.len());
    }

    #[test]
    fn default_config_is_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        write_default_config(&path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Configuration for rchat"));
        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.server.domain, AppConfig::default().server.domain);
    }

    #[test]
    fn explicit_config_path_places_creds_beside_it() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::discover(Some(dir.path())).unwrap();
        assert_eq!(paths.config_file, dir.path().join("config.toml"));
        assert_eq!(paths.creds_file, dir.path().join(CREDS_FILENAME));
        assert!(paths.token_dir().ends_with("tokens"));
        assert!(paths.channel_dir().ends_with("channels"));
    }
}
