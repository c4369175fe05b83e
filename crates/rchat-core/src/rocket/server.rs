//! Server information, settings, integrations and livechat routes.
//!
//! These are pass-through wrappers; responses stay as JSON.

use serde_json::{Value, json};

use crate::CoreError;
use crate::rocket::client::Session;
use crate::rocket::models::ServerInfo;
use crate::rocket::routes::{self, HttpMethod};

/// Livechat staff role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivechatRole {
    /// Agent answering chats.
    Agent,
    /// Manager of agents.
    Manager,
}

impl LivechatRole {
    /// URL form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Manager => "manager",
        }
    }
}

impl Session {
    /// Server version information. Needs no login.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn info(&self) -> Result<ServerInfo, CoreError> {
        let mut body = self.dispatch(routes::INFO.request()).await?;
        let info = body.get_mut("info").map(Value::take).unwrap_or(Value::Null);
        serde_json::from_value(info)
            .map_err(|e| CoreError::Serialization(format!("parsing info response: {e}")))
    }

    /// Read a setting (admin).
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn setting(&self, setting_id: &str) -> Result<Value, CoreError> {
        self.dispatch(routes::SETTINGS.request().url_arg("_id", setting_id))
            .await
    }

    /// Change a setting (admin).
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn update_setting(&self, setting_id: &str, value: Value) -> Result<Value, CoreError> {
        let request = routes::SETTINGS
            .request()
            .method(HttpMethod::Post)
            .url_arg("_id", setting_id)
            .body(json!({ "value": value }));
        self.dispatch(request).await
    }

    /// Integrations on the server (admin).
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn integrations(&self) -> Result<Vec<Value>, CoreError> {
        self.call(routes::INTEGRATIONS_LIST.request()).await
    }

    /// Create an integration (admin). `integration` is sent as-is.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn create_integration(&self, integration: Value) -> Result<Value, CoreError> {
        self.dispatch(routes::INTEGRATIONS_CREATE.request().body(integration))
            .await
    }

    /// Remove an integration (admin).
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn remove_integration(&self, kind: &str, integration_id: &str) -> Result<Value, CoreError> {
        let body = json!({ "type": kind, "integrationId": integration_id });
        self.dispatch(routes::INTEGRATIONS_REMOVE.request().body(body))
            .await
    }

    /// Livechat agents or managers.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn livechat_users(&self, role: LivechatRole) -> Result<Vec<Value>, CoreError> {
        self.call(routes::LIVECHAT_USERS.request().url_arg("type", role.as_str()))
            .await
    }

    /// Give `username` a livechat role.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn add_livechat_user(&self, role: LivechatRole, username: &str) -> Result<Value, CoreError> {
        let request = routes::LIVECHAT_USERS
            .request()
            .method(HttpMethod::Post)
            .url_arg("type", role.as_str())
            .body(json!({ "username": username }));
        self.dispatch(request).await
    }

    /// One livechat agent or manager.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn livechat_user(&self, role: LivechatRole, user_id: &str) -> Result<Value, CoreError> {
        let request = routes::LIVECHAT_USER
            .request()
            .url_arg("type", role.as_str())
            .url_arg("_id", user_id);
        self.dispatch(request).await
    }

    /// Revoke a livechat role.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn remove_livechat_user(&self, role: LivechatRole, user_id: &str) -> Result<Value, CoreError> {
        let request = routes::LIVECHAT_USER
            .request()
            .method(HttpMethod::Delete)
            .url_arg("type", role.as_str())
            .url_arg("_id", user_id);
        self.dispatch(request).await
    }

    /// Livechat departments.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn livechat_departments(&self) -> Result<Value, CoreError> {
        self.dispatch(routes::LIVECHAT_DEPARTMENTS.request()).await
    }

    /// One livechat department.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn livechat_department(&self, department_id: &str) -> Result<Value, CoreError> {
        self.dispatch(
            routes::LIVECHAT_DEPARTMENT
                .request()
                .url_arg("_id", department_id),
        )
        .await
    }
}
