//! User lookups and account management.

use serde::Serialize;
use serde_json::{Value, json};

use crate::CoreError;
use crate::rocket::client::Session;
use crate::rocket::models::{Message, Presence, Token, User};
use crate::rocket::routes::{self, RouteRequest};

/// Account to create with `users.create`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Initial password.
    pub password: String,
    /// Username.
    pub username: String,
    /// Whether the account starts active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// Roles to grant.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    /// Join the default channels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_default_channels: Option<bool>,
    /// Force a password change on first login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_password_change: Option<bool>,
    /// Send the welcome email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_welcome_email: Option<bool>,
    /// Mark the email as verified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

/// Identify `user` by ID when known, else by username.
fn by_user(request: RouteRequest, user: &User) -> Result<RouteRequest, CoreError> {
    if !user.id.is_empty() {
        Ok(request.param("userId", user.id.as_str()))
    } else if !user.username.is_empty() {
        Ok(request.param("username", user.username.as_str()))
    } else {
        Err(CoreError::InvalidArgument(
            "user has neither an ID nor a username".to_string(),
        ))
    }
}

impl Session {
    /// The logged-in user, fetched once per session.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn me(&self) -> Result<User, CoreError> {
        let mut slot = self.me.lock().await;
        if let Some(me) = slot.as_ref() {
            return Ok(me.clone());
        }
        let mut body = self.dispatch(routes::ME.request()).await?;
        if let Some(fields) = body.as_object_mut() {
            fields.remove("success");
        }
        let me: User = serde_json::from_value(body)
            .map_err(|e| CoreError::Serialization(format!("parsing me response: {e}")))?;
        *slot = Some(me.clone());
        Ok(me)
    }

    /// Full details of `user`, looked up by ID or username.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] when `user` carries neither,
    /// and dispatch errors.
    pub async fn user_info(&self, user: &User) -> Result<User, CoreError> {
        self.call(by_user(routes::USERS_INFO.request(), user)?).await
    }

    /// Look up a user by username. A leading `@` is ignored.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn user_by_username(&self, username: &str) -> Result<User, CoreError> {
        self.user_info(&User::with_username(username.trim_start_matches('@')))
            .await
    }

    /// Users on the server.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn users(&self) -> Result<Vec<User>, CoreError> {
        self.call(routes::USERS_LIST.request()).await
    }

    /// Presence of `user`.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn presence(&self, user: &User) -> Result<Presence, CoreError> {
        self.call(by_user(routes::USERS_GET_PRESENCE.request(), user)?)
            .await
    }

    /// Author of `message`, with full details.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for messages without an author, and
    /// dispatch errors.
    pub async fn message_author(&self, message: &Message) -> Result<User, CoreError> {
        let author = message
            .u
            .as_ref()
            .ok_or_else(|| CoreError::NotFound(format!("author of message {}", message.id)))?;
        self.user_info(&User::from(author)).await
    }

    /// Users mentioned in `message`. `@all` and `@here` are skipped.
    #[must_use]
    pub fn mentioned_users(message: &Message) -> Vec<User> {
        message
            .mentions
            .iter()
            .filter(|m| !matches!(m.username.as_str(), "all" | "here"))
            .map(User::from)
            .collect()
    }

    /// Create an account (admin).
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn create_user(&self, user: &NewUser) -> Result<User, CoreError> {
        let body = serde_json::to_value(user)
            .map_err(|e| CoreError::Serialization(format!("serializing new user: {e}")))?;
        self.call(routes::USERS_CREATE.request().body(body)).await
    }

    /// Self-register an account.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn register_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<User, CoreError> {
        let body = json!({ "username": username, "email": email, "pass": password, "name": name });
        self.call(routes::USERS_REGISTER.request().body(body)).await
    }

    /// Update account fields (admin). `data` holds the fields to change.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn update_user(&self, user_id: &str, data: Value) -> Result<User, CoreError> {
        let body = json!({ "userId": user_id, "data": data });
        self.call(routes::USERS_UPDATE.request().body(body)).await
    }

    /// Delete an account (admin).
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn delete_user(&self, user_id: &str) -> Result<Value, CoreError> {
        self.dispatch(routes::USERS_DELETE.request().body(json!({ "userId": user_id })))
            .await
    }

    /// Issue a login token for another user (admin).
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn create_user_token(&self, user: &User) -> Result<Token, CoreError> {
        let body = if user.id.is_empty() {
            json!({ "username": user.username })
        } else {
            json!({ "userId": user.id })
        };
        self.call(routes::USERS_CREATE_TOKEN.request().body(body))
            .await
    }

    /// Set the caller's avatar from a URL.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn set_avatar(&self, avatar_url: &str) -> Result<Value, CoreError> {
        self.dispatch(
            routes::USERS_SET_AVATAR
                .request()
                .body(json!({ "avatarUrl": avatar_url })),
        )
        .await
    }

    /// Reset `user`'s avatar to the default.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn reset_avatar(&self, user: &User) -> Result<Value, CoreError> {
        let body = if user.id.is_empty() {
            json!({ "username": user.username })
        } else {
            json!({ "userId": user.id })
        };
        self.dispatch(routes::USERS_RESET_AVATAR.request().body(body))
            .await
    }

    /// Public avatar URL of `user`.
    ///
    /// `users.getAvatar` answers with the image itself, so callers that
    /// want a link use this instead.
    #[must_use]
    pub fn avatar_url(&self, user: &User) -> String {
        format!(
            "{}/avatar/{}",
            self.base_url(),
            urlencoding::encode(&user.username)
        )
    }
}
