//! Error types for the core library.

use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A configuration-related error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A path resolution or validation error.
    #[error("path error: {0}")]
    Path(String),

    /// An I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialization or deserialization error, including response bodies
    /// that are not valid JSON.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Missing or blank credentials. Raised before any request is sent.
    #[error("credentials error: {0}")]
    Credentials(String),

    /// The server answered, but the response envelope reports failure.
    #[error("server error (HTTP {status}): {}", describe_failure(.error.as_deref(), .error_type.as_deref()))]
    Server {
        /// HTTP status code of the response.
        status: u16,
        /// Server-provided `error` field.
        error: Option<String>,
        /// Server-provided `errorType` field.
        error_type: Option<String>,
    },

    /// The request could not be delivered (connection, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// A route was called with parameters it does not accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A looked-up entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A generic error for other cases.
    #[error("error: {0}")]
    Other(String),
}

impl CoreError {
    /// Build a server error from a decoded failure envelope.
    #[must_use]
    pub fn from_envelope(status: u16, body: &serde_json::Value) -> Self {
        Self::Server {
            status,
            error: body
                .get("error")
                .and_then(value_to_string)
                .or_else(|| body.get("message").and_then(value_to_string)),
            error_type: body.get("errorType").and_then(value_to_string),
        }
    }

    /// HTTP status of a server error, if this is one.
    #[must_use]
    pub const fn http_status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn describe_failure(error: Option<&str>, error_type: Option<&str>) -> String {
    let message = error.unwrap_or("unknown error");
    error_type.map_or_else(|| message.to_string(), |t| format!("{message} [{t}]"))
}

fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_fields_are_carried() {
        let body = json!({"status": "error", "error": "Unauthorized", "errorType": "error-unauthorized"});
        let err = CoreError::from_envelope(401, &body);
        assert_eq!(err.http_status(), Some(401));
        let text = err.to_string();
        assert!(text.contains("Unauthorized"));
        assert!(text.contains("error-unauthorized"));
    }

    #[test]
    fn envelope_without_error_fields() {
        let err = CoreError::from_envelope(200, &json!({"status": "fail"}));
        match err {
            CoreError::Server { status, error, error_type } => {
                assert_eq!(status, 200);
                assert!(error.is_none());
                assert!(error_type.is_none());
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
