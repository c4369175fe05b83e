//! On-disk token storage, one file per username.
//!
//! A token file holds either the JSON token (`{"authToken": ..., "userId": ...}`)
//! or the bare tombstone marker written on logout. A tombstone reads the same
//! as an absent file, so the next call logs in again.

use std::path::{Path, PathBuf};

use crate::CoreError;
use crate::paths::encode_file_stem;
use crate::rocket::models::Token;

/// What a token file contained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredToken {
    /// A usable token.
    Token(Token),
    /// The logout marker.
    Tombstone,
    /// No file, or a file that could not be read.
    Absent,
}

impl StoredToken {
    /// The token, if one was stored.
    #[must_use]
    pub fn into_token(self) -> Option<Token> {
        match self {
            Self::Token(token) => Some(token),
            Self::Tombstone | Self::Absent => None,
        }
    }
}

/// File-backed token storage.
#[derive(Debug, Clone)]
pub struct TokenStorage {
    dir: PathBuf,
}

impl TokenStorage {
    /// Marker written over a token on logout or rejection.
    pub const TOMBSTONE: &str = "session-expired";

    /// Create a storage rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the token files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Token file for `user`.
    #[must_use]
    pub fn path_for(&self, user: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_file_stem(user)))
    }

    /// Read the stored state for `user`.
    ///
    /// Unreadable or malformed files are logged and reported as absent.
    #[must_use]
    pub fn read(&self, user: &str) -> StoredToken {
        let path = self.path_for(user);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StoredToken::Absent,
            Err(e) => {
                log::warn!("reading token file {}: {e}", path.display());
                return StoredToken::Absent;
            }
        };

        if content.trim() == Self::TOMBSTONE {
            return StoredToken::Tombstone;
        }

        match serde_json::from_str::<Token>(&content) {
            Ok(token) => StoredToken::Token(token),
            Err(e) => {
                log::warn!("ignoring malformed token file {}: {e}", path.display());
                StoredToken::Absent
            }
        }
    }

    /// Load a usable token for `user`, if any.
    #[must_use]
    pub fn load(&self, user: &str) -> Option<Token> {
        self.read(user).into_token()
    }

    /// Store `token` for `user`, replacing whatever was there.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn write(&self, user: &str, token: &Token) -> Result<(), CoreError> {
        let json = serde_json::to_string(token)
            .map_err(|e| CoreError::Serialization(format!("serializing token: {e}")))?;
        self.write_raw(user, &json)
    }

    /// Replace the token for `user` with the tombstone.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn clear(&self, user: &str) -> Result<(), CoreError> {
        self.write_raw(user, Self::TOMBSTONE)
    }

    fn write_raw(&self, user: &str, content: &str) -> Result<(), CoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(user);
        log::debug!("writing token file {}", path.display());
        std::fs::write(&path, content)?;
        restrict_permissions(&path)?;
        Ok(())
    }
}

#[cfg(unix)]
pub(crate) fn restrict_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn restrict_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_then_written_then_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(dir.path().join("tokens"));
        assert_eq!(storage.read("eliza"), StoredToken::Absent);

        let token = Token::new("tok", "uid");
        storage.write("eliza", &token).unwrap();
        assert_eq!(storage.load("eliza"), Some(token));

        storage.clear("eliza").unwrap();
        assert_eq!(storage.read("eliza"), StoredToken::Tombstone);
        assert_eq!(storage.load("eliza"), None);
        let raw = std::fs::read_to_string(storage.path_for("eliza")).unwrap();
        assert_eq!(raw, TokenStorage::TOMBSTONE);
    }

    #[test]
    fn users_do_not_share_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(dir.path());
        storage.write("alice", &Token::new("a", "1")).unwrap();
        assert_eq!(storage.read("bob"), StoredToken::Absent);
        assert_ne!(storage.path_for("alice"), storage.path_for("bob"));

        storage.write("a/b", &Token::new("slash", "2")).unwrap();
        assert_eq!(storage.read("a_b"), StoredToken::Absent);
        assert_eq!(storage.load("a/b"), Some(Token::new("slash", "2")));
        assert_eq!(storage.path_for("a/b").parent(), Some(dir.path()));
    }

    #[test]
    fn malformed_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(dir.path());
        std::fs::write(storage.path_for("eliza"), "{\"authToken\": 1").unwrap();
        assert_eq!(storage.read("eliza"), StoredToken::Absent);
    }

    #[cfg(unix)]
    #[test]
    fn token_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(dir.path());
        storage.write("eliza", &Token::new("a", "1")).unwrap();
        let mode = std::fs::metadata(storage.path_for("eliza")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
