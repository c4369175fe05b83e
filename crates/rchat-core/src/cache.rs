//! Per-channel state cache.
//!
//! Each channel gets one small JSON file under `$XDG_STATE_HOME/rchat/channels/`,
//! keyed by `"{room_id}:{room_name}"`. The file holds at least the unread
//! watermark (`last_message_dt`); any other keys found in it are kept on rewrite.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::paths::encode_file_stem;

/// State remembered for one channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelState {
    /// Update time of the newest message already seen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_dt: Option<DateTime<Utc>>,

    /// Keys this version does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// File-backed store of [`ChannelState`] entries.
#[derive(Debug, Clone)]
pub struct ChannelCache {
    dir: PathBuf,
}

impl ChannelCache {
    /// Create a cache rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the channel files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache key for a room.
    #[must_use]
    pub fn key(room_id: &str, room_name: Option<&str>) -> String {
        format!("{room_id}:{}", room_name.unwrap_or_default())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_file_stem(key)))
    }

    /// Load a channel's state.
    ///
    /// Missing or unreadable files yield the default state.
    #[must_use]
    pub fn load(&self, key: &str) -> ChannelState {
        let path = self.path_for(key);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("reading channel cache {}: {e}", path.display());
                }
                return ChannelState::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("ignoring malformed channel cache {}: {e}", path.display());
            ChannelState::default()
        })
    }

    /// Persist a channel's state.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn store(&self, key: &str, state: &ChannelState) -> Result<(), CoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| CoreError::Serialization(format!("serializing channel state: {e}")))?;
        let path = self.path_for(key);
        log::debug!("writing channel cache {}", path.display());
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Remove a channel's state. Removing an absent entry is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn forget(&self, key: &str) -> Result<(), CoreError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn missing_entry_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ChannelCache::new(dir.path());
        assert_eq!(cache.load("GENERAL:general"), ChannelState::default());
    }

    #[test]
    fn store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ChannelCache::new(dir.path().join("channels"));
        let key = ChannelCache::key("GENERAL", Some("general"));
        let state = ChannelState {
            last_message_dt: Some(Utc.with_ymd_and_hms(2023, 1, 5, 0, 0, 0).unwrap()),
            ..ChannelState::default()
        };
        cache.store(&key, &state).unwrap();
        assert_eq!(cache.load(&key), state);

        cache.forget(&key).unwrap();
        cache.forget(&key).unwrap();
        assert_eq!(cache.load(&key), ChannelState::default());
    }

    #[test]
    fn unknown_keys_survive_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ChannelCache::new(dir.path());
        let key = ChannelCache::key("abc", None);
        std::fs::write(
            dir.path().join("abc%3A.json"),
            r#"{"last_message_dt": "2020-02-02T10:00:00Z", "muted": true}"#,
        )
        .unwrap();

        let mut state = cache.load(&key);
        assert_eq!(
            state.last_message_dt,
            Some(Utc.with_ymd_and_hms(2020, 2, 2, 10, 0, 0).unwrap())
        );
        state.last_message_dt = None;
        cache.store(&key, &state).unwrap();

        let reloaded = cache.load(&key);
        assert_eq!(reloaded.extra.get("muted"), Some(&serde_json::Value::Bool(true)));
        assert!(reloaded.last_message_dt.is_none());
    }

    #[test]
    fn similar_keys_do_not_share_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ChannelCache::new(dir.path());
        let state = ChannelState {
            last_message_dt: Some(Utc.with_ymd_and_hms(2023, 1, 5, 0, 0, 0).unwrap()),
            ..ChannelState::default()
        };
        cache.store("x:y", &state).unwrap();
        assert_eq!(cache.load("x_y"), ChannelState::default());
        assert_eq!(cache.load("x:y"), state);
    }

    #[test]
    fn malformed_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ChannelCache::new(dir.path());
        std::fs::write(dir.path().join("x%3Ay.json"), "not json").unwrap();
        assert_eq!(cache.load("x:y"), ChannelState::default());
    }
}
