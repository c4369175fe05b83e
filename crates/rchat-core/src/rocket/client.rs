//! HTTP transport and the authenticated session.
//!
//! [`Session`] interprets the route table: it validates a [`RouteRequest`],
//! attaches the `X-Auth-Token` / `X-User-Id` headers for authenticated
//! routes, checks the response envelope and extracts the declared key.
//! A 401 on an authenticated route drops the token, logs in once more and
//! replays the request once.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::rocket::auth::{CredentialSource, Credentials, TokenManager};
use crate::rocket::models::{ChannelType, Room, Token, User};
use crate::rocket::routes::{self, HttpMethod, PreparedRequest, RouteRequest};
use crate::rocket::storage::TokenStorage;
use crate::{AppConfig, AppPaths, CoreError, ServerConfig};

/// Header carrying the auth token.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
/// Header carrying the user ID.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// A request as handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Absolute URL without query string.
    pub url: String,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// JSON body.
    pub body: Option<Value>,
}

impl HttpRequest {
    /// First query parameter named `name`.
    #[must_use]
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First header named `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response as returned by a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Raw body.
    pub body: String,
}

impl HttpResponse {
    /// A response with a JSON body.
    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

/// Moves requests to the server. Implemented over reqwest, and by fakes in tests.
#[async_trait]
pub trait Transport: fmt::Debug + Send + Sync {
    /// Send one request and return the raw response.
    ///
    /// Non-2xx statuses are responses, not errors.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CoreError>;
}

/// [`Transport`] backed by a reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: Client,
}

impl ReqwestTransport {
    /// Create a transport honoring the server timeout and TLS settings.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client creation fails.
    pub fn new(server: &ServerConfig) -> Result<Self, CoreError> {
        if !server.verify_tls {
            log::warn!("TLS certificate verification is disabled for {}", server.domain);
        }
        let http_client = Client::builder()
            .timeout(Duration::from_secs(server.timeout))
            .danger_accept_invalid_certs(!server.verify_tls)
            .user_agent(concat!("rchat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CoreError::Transport(format!("creating HTTP client: {e}")))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CoreError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.http_client.request(method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CoreError::Transport(format!("{} {}: {e}", request.method, request.url)))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::Transport(format!("reading response from {}: {e}", request.url)))?;
        Ok(HttpResponse { status, body })
    }
}

/// Connection to one server as one user.
#[derive(Debug)]
pub struct Session {
    base_url: String,
    transport: Arc<dyn Transport>,
    auth: TokenManager,
    pub(crate) me: Mutex<Option<User>>,
    pub(crate) rooms: Mutex<HashMap<ChannelType, Arc<Vec<Room>>>>,
}

impl Session {
    /// Start building a session for `domain`.
    #[must_use]
    pub fn builder(domain: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(domain)
    }

    /// Server base URL, without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The token manager.
    #[must_use]
    pub const fn token_manager(&self) -> &TokenManager {
        &self.auth
    }

    /// Return the current token, logging in if needed.
    ///
    /// Concurrent callers share a single login.
    ///
    /// # Errors
    ///
    /// Returns credential, login, or storage errors.
    pub async fn authenticate(&self) -> Result<Arc<Token>, CoreError> {
        self.auth.authenticate(|credentials| self.login(credentials)).await
    }

    /// Call a route and return the extracted part of the response.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] before any request when the
    /// request does not fit its route, [`CoreError::Server`] when the
    /// envelope reports failure, [`CoreError::Serialization`] for non-JSON
    /// bodies, and transport or authentication errors.
    pub async fn dispatch(&self, request: RouteRequest) -> Result<Value, CoreError> {
        let prepared = request.prepare()?;
        let route = prepared.route;
        if !route.authenticated {
            let response = self.send_prepared(&prepared, None).await?;
            return Self::decode(&prepared, &response);
        }

        let token = self.authenticate().await?;
        let response = self.send_prepared(&prepared, Some(&token)).await?;
        if response.status != 401 {
            return Self::decode(&prepared, &response);
        }

        log::info!("{} rejected the session token, logging in again", route.name);
        self.auth.invalidate(&token).await;
        let token = self.authenticate().await?;
        let response = self.send_prepared(&prepared, Some(&token)).await?;
        Self::decode(&prepared, &response)
    }

    /// Call a route and deserialize the extracted part.
    ///
    /// # Errors
    ///
    /// Same as [`Session::dispatch`], plus [`CoreError::Serialization`]
    /// when the value does not match `T`.
    pub async fn call<T: DeserializeOwned>(&self, request: RouteRequest) -> Result<T, CoreError> {
        let name = request.route().name;
        let value = self.dispatch(request).await?;
        serde_json::from_value(value)
            .map_err(|e| CoreError::Serialization(format!("parsing {name} response: {e}")))
    }

    /// Log out on the server and forget the token locally.
    ///
    /// The local token is dropped and the stored one tombstoned even when
    /// the server call fails.
    ///
    /// # Errors
    ///
    /// Returns the server call's error, or a storage error.
    pub async fn logout(&self) -> Result<Value, CoreError> {
        let result = self.dispatch(routes::LOGOUT.request()).await;
        self.auth.clear().await?;
        self.reset_caches().await;
        result
    }

    /// Forget cached `me` and room lists.
    pub async fn reset_caches(&self) {
        *self.me.lock().await = None;
        self.rooms.lock().await.clear();
    }

    async fn login(&self, credentials: Credentials) -> Result<Token, CoreError> {
        let request = routes::LOGIN.request().body(json!({
            "user": credentials.user,
            "password": credentials.password,
        }));
        let prepared = request.prepare()?;
        let response = self.send_prepared(&prepared, None).await?;
        let data = Self::decode(&prepared, &response)?;
        serde_json::from_value(data)
            .map_err(|e| CoreError::Serialization(format!("parsing login response: {e}")))
    }

    async fn send_prepared(
        &self,
        prepared: &PreparedRequest,
        token: Option<&Token>,
    ) -> Result<HttpResponse, CoreError> {
        let mut headers = Vec::new();
        if let Some(token) = token {
            headers.push((AUTH_TOKEN_HEADER.to_string(), token.auth_token.clone()));
            headers.push((USER_ID_HEADER.to_string(), token.user_id.clone()));
        }
        let request = HttpRequest {
            method: prepared.method,
            url: format!("{}{}", self.base_url, prepared.path),
            query: prepared.query.clone(),
            headers,
            body: prepared.body.clone(),
        };
        log::debug!("{} {}", request.method, request.url);
        let response = self.transport.send(request).await?;
        log::trace!("{} answered HTTP {}", prepared.route.name, response.status);
        Ok(response)
    }

    fn decode(prepared: &PreparedRequest, response: &HttpResponse) -> Result<Value, CoreError> {
        let body: Value = serde_json::from_str(&response.body).map_err(|e| {
            CoreError::Serialization(format!(
                "{} returned a non-JSON body (HTTP {}): {e}",
                prepared.route.name, response.status
            ))
        })?;
        if !envelope_succeeded(&body) {
            return Err(CoreError::from_envelope(response.status, &body));
        }
        prepared.extract(body)
    }
}

/// `status == "success"` or `success == true`.
fn envelope_succeeded(body: &Value) -> bool {
    body.get("status").and_then(Value::as_str) == Some("success")
        || body.get("success").and_then(Value::as_bool) == Some(true)
}

/// Builder for [`Session`].
#[derive(Debug)]
pub struct SessionBuilder {
    server: ServerConfig,
    transport: Option<Arc<dyn Transport>>,
    credentials: Option<CredentialSource>,
    storage: Option<TokenStorage>,
}

impl SessionBuilder {
    /// Start with default server settings for `domain`.
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            server: ServerConfig {
                domain: domain.into(),
                ..ServerConfig::default()
            },
            transport: None,
            credentials: None,
            storage: None,
        }
    }

    /// Configure from loaded config and resolved paths.
    ///
    /// Credentials come from the environment when `auth.creds_from_env` is
    /// set, otherwise from the credentials file. Tokens are stored only
    /// when `auth.store_token` is set.
    #[must_use]
    pub fn from_config(config: &AppConfig, paths: &AppPaths) -> Self {
        let credentials = CredentialSource::from_config(&config.auth, paths);
        let storage = config
            .auth
            .store_token
            .then(|| TokenStorage::new(paths.token_dir()));
        Self {
            server: config.server.clone(),
            transport: None,
            credentials: Some(credentials),
            storage,
        }
    }

    /// Use a specific transport instead of reqwest.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the credential source.
    #[must_use]
    pub fn credentials(mut self, credentials: CredentialSource) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set or disable token storage.
    #[must_use]
    pub fn token_storage(mut self, storage: Option<TokenStorage>) -> Self {
        self.storage = storage;
        self
    }

    /// Toggle TLS certificate verification.
    #[must_use]
    pub const fn verify_tls(mut self, verify: bool) -> Self {
        self.server.verify_tls = verify;
        self
    }

    /// Request timeout in seconds.
    #[must_use]
    pub const fn timeout(mut self, seconds: u64) -> Self {
        self.server.timeout = seconds;
        self
    }

    /// Build the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain is empty, no credential source was
    /// set, or the HTTP client cannot be created.
    pub fn build(self) -> Result<Session, CoreError> {
        let base_url = normalize_base_url(&self.server.domain)?;
        let credentials = self
            .credentials
            .ok_or_else(|| CoreError::Config("no credential source configured".to_string()))?;
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.server)?),
        };
        log::debug!("session for {base_url} using credentials from {credentials}");
        Ok(Session {
            base_url,
            transport,
            auth: TokenManager::new(credentials, self.storage),
            me: Mutex::new(None),
            rooms: Mutex::new(HashMap::new()),
        })
    }
}

/// Trim the domain and default the scheme to https.
fn normalize_base_url(domain: &str) -> Result<String, CoreError> {
    let trimmed = domain.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(CoreError::Config("server domain is empty".to_string()));
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("https://{trimmed}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rocket::routes::{
        CHAT_POST_MESSAGE, INFO, LIVECHAT_SMS_INCOMING, ME, ROOMS_HISTORY, ROOMS_LIST,
        USERS_REGISTER,
    };
    use crate::rocket::testing::{MockTransport, login_ok, ok, session_with, status};

    #[test]
    fn base_url_normalization() {
        assert_eq!(normalize_base_url("chat.example.com/").unwrap(), "https://chat.example.com");
        assert_eq!(normalize_base_url("http://localhost:3000").unwrap(), "http://localhost:3000");
        assert!(normalize_base_url("  ").is_err());
    }

    #[test]
    fn envelope_forms() {
        assert!(envelope_succeeded(&json!({"status": "success"})));
        assert!(envelope_succeeded(&json!({"success": true})));
        assert!(!envelope_succeeded(&json!({"status": "fail"})));
        assert!(!envelope_succeeded(&json!({"success": false, "error": "x"})));
        assert!(!envelope_succeeded(&json!({})));
    }

    #[tokio::test]
    async fn authenticated_route_sends_token_headers() {
        let mock = MockTransport::new(|req| {
            if req.url.ends_with("/api/v1/login") {
                return login_ok("tok", "uid");
            }
            ok(json!({"_id": "uid", "username": "eliza", "success": true}))
        });
        let session = session_with(&mock);
        let me: User = session.call(ME.request()).await.unwrap();
        assert_eq!(me.username, "eliza");

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].body, Some(json!({"user": "eliza", "password": "secret"})));
        assert!(requests[0].header(AUTH_TOKEN_HEADER).is_none());
        assert_eq!(requests[1].header(AUTH_TOKEN_HEADER), Some("tok"));
        assert_eq!(requests[1].header(USER_ID_HEADER), Some("uid"));
        assert_eq!(requests[1].url, "http://chat.test/api/v1/me");
    }

    #[tokio::test]
    async fn registration_and_sms_routes_carry_token_headers() {
        let mock = MockTransport::new(|req| {
            if req.url.ends_with("/api/v1/login") {
                return login_ok("tok", "uid");
            }
            ok(json!({"user": {"_id": "n1", "username": "new"}, "success": true}))
        });
        let session = session_with(&mock);
        session
            .dispatch(USERS_REGISTER.request().body(json!({"username": "new"})))
            .await
            .unwrap();
        session
            .dispatch(LIVECHAT_SMS_INCOMING.request().body(json!({"From": "+1"})))
            .await
            .unwrap();

        for suffix in ["/api/v1/users.register", "/api/v1/livechat/sms-incoming/twilio"] {
            let sent = &mock.matching(suffix)[0];
            assert_eq!(sent.header(AUTH_TOKEN_HEADER), Some("tok"), "{suffix}");
            assert_eq!(sent.header(USER_ID_HEADER), Some("uid"), "{suffix}");
        }
        assert_eq!(mock.count("/api/v1/login"), 1);
    }

    #[tokio::test]
    async fn public_route_skips_login() {
        let mock = MockTransport::new(|_| ok(json!({"info": {"version": "6.5.0"}, "success": true})));
        let session = session_with(&mock);
        let body = session.dispatch(INFO.request()).await.unwrap();
        assert_eq!(body["info"]["version"], "6.5.0");
        assert_eq!(mock.requests().len(), 1);
    }

    #[tokio::test]
    async fn failed_login_envelope_is_a_server_error() {
        let mock = MockTransport::new(|_| ok(json!({"status": "fail"})));
        let session = session_with(&mock);
        let err = session.authenticate().await.unwrap_err();
        assert!(matches!(err, CoreError::Server { status: 200, .. }));
        assert!(session.token_manager().current().await.is_none());
    }

    #[tokio::test]
    async fn invalid_arguments_fail_before_any_request() {
        let mock = MockTransport::new(|_| ok(json!({"success": true})));
        let session = session_with(&mock);
        let err = session
            .dispatch(ROOMS_LIST.request().url_arg("channel_type", "rooms"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
        let err = session.dispatch(ROOMS_HISTORY.request().channel_type(ChannelType::Channels)).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn non_json_body_is_a_serialization_error() {
        let mock = MockTransport::new(|_| HttpResponse {
            status: 502,
            body: "<html>Bad Gateway</html>".to_string(),
        });
        let session = session_with(&mock);
        let err = session.dispatch(INFO.request()).await.unwrap_err();
        assert!(matches!(err, CoreError::Serialization(_)));
    }

    #[tokio::test]
    async fn server_failure_carries_error_fields() {
        let mock = MockTransport::new(|req| {
            if req.url.ends_with("/api/v1/login") {
                return login_ok("tok", "uid");
            }
            status(
                400,
                json!({"success": false, "error": "The room does not exist", "errorType": "error-room-not-found"}),
            )
        });
        let session = session_with(&mock);
        let err = session
            .dispatch(CHAT_POST_MESSAGE.request().body(json!({"roomId": "nope", "text": "hi"})))
            .await
            .unwrap_err();
        match err {
            CoreError::Server { status, error, error_type } => {
                assert_eq!(status, 400);
                assert_eq!(error.as_deref(), Some("The room does not exist"));
                assert_eq!(error_type.as_deref(), Some("error-room-not-found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn rejected_token_is_refreshed_once() {
        let mock = MockTransport::new(|req| {
            if req.url.ends_with("/api/v1/login") {
                return login_ok("fresh", "uid");
            }
            if req.header(AUTH_TOKEN_HEADER) == Some("fresh") {
                ok(json!({"_id": "uid", "username": "eliza", "success": true}))
            } else {
                status(401, json!({"status": "error", "message": "You must be logged in to do this."}))
            }
        });
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(dir.path());
        storage.write("eliza", &Token::new("stale", "uid")).unwrap();
        let session = Session::builder("http://chat.test")
            .transport(mock.clone())
            .credentials(CredentialSource::Static(Credentials::new("eliza", "secret")))
            .token_storage(Some(storage.clone()))
            .build()
            .unwrap();

        let me: User = session.call(ME.request()).await.unwrap();
        assert_eq!(me.id, "uid");
        assert_eq!(storage.load("eliza"), Some(Token::new("fresh", "uid")));
        assert_eq!(mock.count("/api/v1/login"), 1);
        assert_eq!(mock.count("/api/v1/me"), 2);
    }

    #[tokio::test]
    async fn persistent_401_gives_up_after_one_retry() {
        let mock = MockTransport::new(|req| {
            if req.url.ends_with("/api/v1/login") {
                return login_ok("tok", "uid");
            }
            status(401, json!({"status": "error", "message": "You must be logged in to do this."}))
        });
        let session = session_with(&mock);
        let err = session.dispatch(ME.request()).await.unwrap_err();
        assert_eq!(err.http_status(), Some(401));
        assert_eq!(mock.count("/api/v1/me"), 2);
        assert_eq!(mock.count("/api/v1/login"), 2);
    }

    #[tokio::test]
    async fn concurrent_calls_share_one_login() {
        let mock = MockTransport::new(|req| {
            if req.url.ends_with("/api/v1/login") {
                return login_ok("tok", "uid");
            }
            ok(json!({"_id": "uid", "username": "eliza", "success": true}))
        })
        .with_delay(Duration::from_millis(20));
        let session = session_with(&mock);

        let (a, b, c) = tokio::join!(
            session.authenticate(),
            session.authenticate(),
            session.dispatch(ME.request())
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        c.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(mock.count("/api/v1/login"), 1);
    }

    #[tokio::test]
    async fn logout_forgets_and_tombstones() {
        let mock = MockTransport::new(|req| {
            if req.url.ends_with("/api/v1/login") {
                return login_ok("tok", "uid");
            }
            ok(json!({"status": "success", "data": {"message": "You've been logged out!"}}))
        });
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(dir.path());
        let session = Session::builder("http://chat.test")
            .transport(mock.clone())
            .credentials(CredentialSource::Static(Credentials::new("eliza", "secret")))
            .token_storage(Some(storage.clone()))
            .build()
            .unwrap();

        session.authenticate().await.unwrap();
        assert!(storage.load("eliza").is_some());
        let data = session.logout().await.unwrap();
        assert_eq!(data["message"], "You've been logged out!");
        assert!(session.token_manager().current().await.is_none());
        assert_eq!(storage.load("eliza"), None);
        assert_eq!(
            std::fs::read_to_string(storage.path_for("eliza")).unwrap(),
            TokenStorage::TOMBSTONE
        );
    }

    #[test]
    fn builder_requires_credentials() {
        let err = Session::builder("http://chat.test")
            .transport(MockTransport::new(|_| ok(json!({}))))
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn builder_from_config_picks_sources() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths {
            config_file: dir.path().join("config.toml"),
            creds_file: dir.path().join("creds.json"),
            data_dir: dir.path().join("data"),
            state_dir: dir.path().join("state"),
        };
        let mut config = AppConfig::default();
        let builder = SessionBuilder::from_config(&config, &paths);
        assert!(matches!(builder.credentials, Some(CredentialSource::File(_))));
        assert!(builder.storage.is_some());

        config.auth.creds_from_env = true;
        config.auth.store_token = false;
        let builder = SessionBuilder::from_config(&config, &paths);
        assert!(matches!(builder.credentials, Some(CredentialSource::Env { .. })));
        assert!(builder.storage.is_none());
    }
}
