//! Credentials and token lifecycle.
//!
//! The [`TokenManager`] owns the session's token. It resolves credentials,
//! reuses a stored token when storage is enabled, and otherwise runs the
//! login function it is given. Concurrent callers share one login: the
//! token slot is guarded by an async mutex held across the login.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{AppPaths, AuthConfig, CoreError};
use crate::rocket::models::Token;
use crate::rocket::storage::{TokenStorage, restrict_permissions};

/// Username and password used to log in.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Username or email.
    pub user: String,
    /// Password.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Create credentials.
    #[must_use]
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// Reject blank usernames or passwords.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Credentials`] naming the blank field.
    pub fn validate(self) -> Result<Self, CoreError> {
        if self.user.trim().is_empty() {
            return Err(CoreError::Credentials("user is blank".to_string()));
        }
        if self.password.is_empty() {
            return Err(CoreError::Credentials(format!(
                "password for '{}' is blank",
                self.user
            )));
        }
        Ok(self)
    }

    /// Read credentials from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Credentials`] if the file is missing or malformed.
    pub fn read_file(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::Credentials(format!(
                    "no credentials file at {} (run `rchat configure password`)",
                    path.display()
                ))
            } else {
                CoreError::Credentials(format!("reading {}: {e}", path.display()))
            }
        })?;
        serde_json::from_str(&content)
            .map_err(|e| CoreError::Credentials(format!("parsing {}: {e}", path.display())))
    }

    /// Write credentials to a JSON file readable only by the owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_file(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::Serialization(format!("serializing credentials: {e}")))?;
        std::fs::write(path, json)?;
        restrict_permissions(path)
    }

    /// Build credentials from two variables looked up through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Credentials`] naming the unset variable.
    pub fn from_lookup<F>(user_var: &str, password_var: &str, lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let user = lookup(user_var)
            .ok_or_else(|| CoreError::Credentials(format!("{user_var} is not set")))?;
        let password = lookup(password_var)
            .ok_or_else(|| CoreError::Credentials(format!("{password_var} is not set")))?;
        Ok(Self::new(user, password))
    }
}

/// Where credentials come from.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// A JSON file with `user` and `password`.
    File(PathBuf),
    /// Two environment variables.
    Env {
        /// Variable holding the username.
        user_var: String,
        /// Variable holding the password.
        password_var: String,
    },
    /// Fixed credentials supplied by the caller.
    Static(Credentials),
}

impl CredentialSource {
    /// Environment variables when `auth.creds_from_env` is set, otherwise
    /// the credentials file.
    #[must_use]
    pub fn from_config(auth: &AuthConfig, paths: &AppPaths) -> Self {
        if auth.creds_from_env {
            Self::Env {
                user_var: auth.user_env.clone(),
                password_var: auth.password_env.clone(),
            }
        } else {
            Self::File(paths.creds_file.clone())
        }
    }

    /// Resolve and validate the credentials.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Credentials`] if they are missing or blank.
    pub fn resolve(&self) -> Result<Credentials, CoreError> {
        let credentials = match self {
            Self::File(path) => Credentials::read_file(path)?,
            Self::Env {
                user_var,
                password_var,
            } => Credentials::from_lookup(user_var, password_var, |name| std::env::var(name).ok())?,
            Self::Static(credentials) => credentials.clone(),
        };
        credentials.validate()
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Env {
                user_var,
                password_var,
            } => write!(f, "environment ${user_var} / ${password_var}"),
            Self::Static(credentials) => write!(f, "static credentials for {}", credentials.user),
        }
    }
}

#[derive(Debug)]
struct HeldToken {
    user: String,
    token: Arc<Token>,
}

/// Owner of the session token.
#[derive(Debug)]
pub struct TokenManager {
    credentials: CredentialSource,
    storage: Option<TokenStorage>,
    current: Mutex<Option<HeldToken>>,
}

impl TokenManager {
    /// Create a manager. `storage` is `None` when tokens are not persisted.
    #[must_use]
    pub fn new(credentials: CredentialSource, storage: Option<TokenStorage>) -> Self {
        Self {
            credentials,
            storage,
            current: Mutex::new(None),
        }
    }

    /// Credential source in use.
    #[must_use]
    pub const fn credentials(&self) -> &CredentialSource {
        &self.credentials
    }

    /// Token storage in use, if any.
    #[must_use]
    pub const fn storage(&self) -> Option<&TokenStorage> {
        self.storage.as_ref()
    }

    /// Return the current token, obtaining one if needed.
    ///
    /// Order: in-memory token, then stored token, then `login`. Credentials
    /// are resolved before storage or network are touched, so blank
    /// credentials fail without a request.
    ///
    /// # Errors
    ///
    /// Returns credential errors, login errors, or storage write errors.
    pub async fn authenticate<F, Fut>(&self, login: F) -> Result<Arc<Token>, CoreError>
    where
        F: FnOnce(Credentials) -> Fut,
        Fut: Future<Output = Result<Token, CoreError>>,
    {
        let mut slot = self.current.lock().await;
        if let Some(held) = slot.as_ref() {
            return Ok(Arc::clone(&held.token));
        }

        let credentials = self.credentials.resolve()?;
        let user = credentials.user.clone();

        if let Some(storage) = &self.storage
            && let Some(token) = storage.load(&user)
        {
            log::debug!("using stored token for {user}");
            let token = Arc::new(token);
            *slot = Some(HeldToken {
                user,
                token: Arc::clone(&token),
            });
            return Ok(token);
        }

        log::info!("logging in as {user}");
        let token = login(credentials).await?;
        if let Some(storage) = &self.storage {
            storage.write(&user, &token)?;
        }
        let token = Arc::new(token);
        *slot = Some(HeldToken {
            user,
            token: Arc::clone(&token),
        });
        Ok(token)
    }

    /// The token currently held in memory.
    pub async fn current(&self) -> Option<Arc<Token>> {
        self.current
            .lock()
            .await
            .as_ref()
            .map(|held| Arc::clone(&held.token))
    }

    /// Drop `stale` after the server rejected it.
    ///
    /// Does nothing when another caller already replaced it. Returns whether
    /// the token was dropped.
    pub async fn invalidate(&self, stale: &Arc<Token>) -> bool {
        let mut slot = self.current.lock().await;
        let Some(held) = slot.as_ref() else {
            return false;
        };
        if !Arc::ptr_eq(&held.token, stale) {
            return false;
        }
        let user = held.user.clone();
        *slot = None;
        self.tombstone(&user);
        true
    }

    /// Forget the token in memory and tombstone the stored one.
    ///
    /// # Errors
    ///
    /// Returns an error if the tombstone cannot be written.
    pub async fn clear(&self) -> Result<(), CoreError> {
        let held = self.current.lock().await.take();
        let user = match held {
            Some(held) => held.user,
            None => match self.credentials.resolve() {
                Ok(credentials) => credentials.user,
                Err(e) => {
                    log::debug!("no credentials to clear a stored token for: {e}");
                    return Ok(());
                }
            },
        };
        if let Some(storage) = &self.storage {
            storage.clear(&user)?;
        }
        Ok(())
    }

    fn tombstone(&self, user: &str) {
        if let Some(storage) = &self.storage
            && let Err(e) = storage.clear(user)
        {
            log::warn!("clearing stored token for {user}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rocket::storage::StoredToken;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn static_source() -> CredentialSource {
        CredentialSource::Static(Credentials::new("eliza", "secret"))
    }

    #[test]
    fn blank_credentials_are_rejected() {
        assert!(matches!(
            Credentials::new("", "pw").validate(),
            Err(CoreError::Credentials(_))
        ));
        assert!(matches!(
            Credentials::new("eliza", "").validate(),
            Err(CoreError::Credentials(_))
        ));
        assert!(Credentials::new("eliza", "pw").validate().is_ok());
    }

    #[test]
    fn lookup_names_the_missing_variable() {
        let vars = HashMap::from([("RCHAT_USER".to_string(), "eliza".to_string())]);
        let err = Credentials::from_lookup("RCHAT_USER", "RCHAT_PASSWORD", |k| vars.get(k).cloned())
            .unwrap_err();
        assert!(err.to_string().contains("RCHAT_PASSWORD"));
    }

    #[test]
    fn credentials_file_roundtrip_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        assert!(matches!(
            Credentials::read_file(&path),
            Err(CoreError::Credentials(_))
        ));
        let creds = Credentials::new("eliza", "pw");
        creds.write_file(&path).unwrap();
        assert_eq!(Credentials::read_file(&path).unwrap(), creds);
        assert_eq!(
            CredentialSource::File(path).resolve().unwrap(),
            creds
        );
    }

    #[test]
    fn config_picks_the_source() {
        let paths = AppPaths {
            config_file: PathBuf::from("/cfg/config.toml"),
            creds_file: PathBuf::from("/cfg/creds.json"),
            data_dir: PathBuf::from("/data"),
            state_dir: PathBuf::from("/state"),
        };
        let mut auth = AuthConfig::default();
        assert!(matches!(
            CredentialSource::from_config(&auth, &paths),
            CredentialSource::File(ref p) if p == &paths.creds_file
        ));
        auth.creds_from_env = true;
        let source = CredentialSource::from_config(&auth, &paths);
        assert_eq!(source.to_string(), "environment $RCHAT_USER / $RCHAT_PASSWORD");
    }

    #[test]
    fn debug_hides_password() {
        let text = format!("{:?}", Credentials::new("eliza", "hunter2"));
        assert!(!text.contains("hunter2"));
    }

    #[tokio::test]
    async fn memory_token_is_reused() {
        let manager = TokenManager::new(static_source(), None);
        let logins = AtomicUsize::new(0);
        let first = manager
            .authenticate(|_| async {
                logins.fetch_add(1, Ordering::SeqCst);
                Ok(Token::new("t", "u"))
            })
            .await
            .unwrap();
        let second = manager
            .authenticate(|_| async { Err(CoreError::Other("second login".to_string())) })
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stored_token_skips_login() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(dir.path());
        storage.write("eliza", &Token::new("stored", "u")).unwrap();
        let manager = TokenManager::new(static_source(), Some(storage));
        let token = manager
            .authenticate(|_| async { Err(CoreError::Other("should not log in".to_string())) })
            .await
            .unwrap();
        assert_eq!(token.auth_token, "stored");
    }

    #[tokio::test]
    async fn tombstone_forces_login_and_new_token_is_stored() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(dir.path());
        storage.clear("eliza").unwrap();
        let manager = TokenManager::new(static_source(), Some(storage.clone()));
        let token = manager
            .authenticate(|creds| async move {
                assert_eq!(creds.password, "secret");
                Ok(Token::new("fresh", "u"))
            })
            .await
            .unwrap();
        assert_eq!(token.auth_token, "fresh");
        assert_eq!(storage.load("eliza"), Some(Token::new("fresh", "u")));
    }

    #[tokio::test]
    async fn blank_credentials_fail_before_login() {
        let manager = TokenManager::new(CredentialSource::Static(Credentials::new(" ", "pw")), None);
        let err = manager
            .authenticate(|_| async { Err(CoreError::Other("should not log in".to_string())) })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Credentials(_)));
    }

    #[tokio::test]
    async fn invalidate_only_drops_the_stale_token() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(dir.path());
        let manager = TokenManager::new(static_source(), Some(storage.clone()));
        let first = manager
            .authenticate(|_| async { Ok(Token::new("one", "u")) })
            .await
            .unwrap();
        assert!(manager.invalidate(&first).await);
        assert_eq!(storage.read("eliza"), StoredToken::Tombstone);

        let second = manager
            .authenticate(|_| async { Ok(Token::new("two", "u")) })
            .await
            .unwrap();
        assert!(!manager.invalidate(&first).await);
        assert!(Arc::ptr_eq(&manager.current().await.unwrap(), &second));
    }

    #[tokio::test]
    async fn clear_tombstones_and_forgets() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(dir.path());
        let manager = TokenManager::new(static_source(), Some(storage.clone()));
        manager
            .authenticate(|_| async { Ok(Token::new("t", "u")) })
            .await
            .unwrap();
        manager.clear().await.unwrap();
        assert!(manager.current().await.is_none());
        assert_eq!(storage.load("eliza"), None);
    }
}
