//! Error taxonomy for the asset client.
//!
//! Lower layers tag and return errors; nothing here is fatal to the process.
//! Each failure is scoped to the single operation that produced it.

use serde_json::Value;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Authentication failure that forces the user to sign in again.
///
/// `Clone` because one refresh outcome is handed to every queued caller.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuthError {
    #[error("No refresh token available")]
    NoRefreshToken,
    #[error("Token refresh rejected ({status})")]
    RefreshRejected { status: u16 },
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),
    #[error("Token refresh interrupted")]
    Interrupted,
}

/// Non-2xx response from the API, carrying the server payload unchanged.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("API request failed ({status}): {message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
    pub payload: Value,
}

impl ApiError {
    /// Build from a status code and the raw response body.
    ///
    /// The message prefers `detail`, then `message`, then `error`, matching the
    /// backend's error envelope. Non-JSON bodies are kept as a JSON string.
    pub fn from_body(status: u16, body: &[u8]) -> Self {
        let payload = serde_json::from_slice::<Value>(body).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(body).into_owned())
        });
        let message = detail_message(&payload)
            .unwrap_or_else(|| format!("HTTP {}", status));
        Self {
            status,
            message,
            payload,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

fn detail_message(payload: &Value) -> Option<String> {
    match payload {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => ["detail", "message", "error"]
            .iter()
            .filter_map(|k| map.get(*k))
            .find_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Array(items) => Some(
                    items
                        .iter()
                        .map(|i| i.as_str().map(str::to_string).unwrap_or_else(|| i.to_string()))
                        .collect::<Vec<_>>()
                        .join("; "),
                ),
                Value::Null => None,
                other => Some(other.to_string()),
            }),
        _ => None,
    }
}

/// Failure of the direct PUT to object storage.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransferError {
    #[error("Upload cancelled")]
    Cancelled,
    #[error("Upload failed with status {0}")]
    Status(u16),
    #[error("Upload failed: {0}")]
    Network(String),
}

/// Client-side guard that blocks an action before any network call.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Keychain or other persistent token storage failure.
#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("Keychain operation failed: {0}")]
    Keychain(String),
}

impl From<keyring::Error> for TokenStoreError {
    fn from(err: keyring::Error) -> Self {
        TokenStoreError::Keychain(err.to_string())
    }
}

/// Any failure surfaced by the client library.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Failed to decode response: {0}")]
    Decode(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status of the failed API call, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api(e) => Some(e.status),
            Error::Transfer(TransferError::Status(s)) => Some(*s),
            _ => None,
        }
    }

    /// Whether the session is gone and the user must sign in again.
    pub fn requires_login(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_prefers_detail() {
        let err = ApiError::from_body(403, br#"{"detail":"Not allowed","error":"forbidden"}"#);
        assert_eq!(err.status, 403);
        assert_eq!(err.message, "Not allowed");
        assert_eq!(err.payload["error"], "forbidden");
    }

    #[test]
    fn test_api_error_joins_list_detail() {
        let err = ApiError::from_body(400, br#"{"detail":["too big","bad type"]}"#);
        assert_eq!(err.message, "too big; bad type");
    }

    #[test]
    fn test_api_error_field_errors_keep_payload() {
        let err = ApiError::from_body(400, br#"{"name":["This field is required."]}"#);
        assert_eq!(err.message, "HTTP 400");
        assert_eq!(err.payload["name"][0], "This field is required.");
    }

    #[test]
    fn test_api_error_non_json_body() {
        let err = ApiError::from_body(502, b"Bad Gateway");
        assert_eq!(err.message, "Bad Gateway");
        assert_eq!(err.payload, Value::String("Bad Gateway".into()));
    }

    #[test]
    fn test_error_status_and_login_flag() {
        let api: Error = ApiError::from_body(500, b"{}").into();
        assert_eq!(api.status(), Some(500));
        assert!(!api.requires_login());

        let auth: Error = AuthError::NoRefreshToken.into();
        assert_eq!(auth.status(), None);
        assert!(auth.requires_login());
    }

    #[test]
    fn test_cancelled_message_is_distinct() {
        assert_eq!(TransferError::Cancelled.to_string(), "Upload cancelled");
        assert_ne!(
            TransferError::Cancelled.to_string(),
            TransferError::Network("connection reset".into()).to_string()
        );
    }
}
