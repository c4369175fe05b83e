//! Scripted transport for unit tests.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::CoreError;
use crate::rocket::auth::{CredentialSource, Credentials};
use crate::rocket::client::{HttpRequest, HttpResponse, Session, Transport};

type Handler = Box<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

/// Answers every request through a handler and records what it saw.
pub struct MockTransport {
    handler: Handler,
    requests: Mutex<Vec<HttpRequest>>,
    delay_ms: AtomicU64,
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport").finish_non_exhaustive()
    }
}

impl MockTransport {
    pub fn new(handler: impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            delay_ms: AtomicU64::new(0),
        })
    }

    /// Sleep before answering, so concurrent callers overlap.
    pub fn with_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.delay_ms.store(millis, Ordering::SeqCst);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests whose URL ends with `suffix`.
    pub fn matching(&self, suffix: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.ends_with(suffix))
            .collect()
    }

    pub fn count(&self, suffix: &str) -> usize {
        self.matching(suffix).len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CoreError> {
        self.requests.lock().unwrap().push(request.clone());
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok((self.handler)(&request))
    }
}

pub fn ok(body: Value) -> HttpResponse {
    HttpResponse::json(200, &body)
}

pub fn status(code: u16, body: Value) -> HttpResponse {
    HttpResponse::json(code, &body)
}

pub fn login_ok(auth_token: &str, user_id: &str) -> HttpResponse {
    ok(json!({
        "status": "success",
        "data": {"authToken": auth_token, "userId": user_id, "me": {"_id": user_id, "username": "eliza"}}
    }))
}

/// Session for `eliza` on `http://chat.test` without token storage.
pub fn session_with(mock: &Arc<MockTransport>) -> Session {
    Session::builder("http://chat.test")
        .transport(mock.clone())
        .credentials(CredentialSource::Static(Credentials::new("eliza", "secret")))
        .token_storage(None)
        .build()
        .unwrap()
}

/// Answer login, then delegate everything else to `routes`.
pub fn with_login(
    routes: impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
) -> Arc<MockTransport> {
    MockTransport::new(move |req| {
        if req.url.ends_with("/api/v1/login") {
            login_ok("tok", "uid")
        } else {
            routes(req)
        }
    })
}
