//! Envelope, request and reply types for the backend socket.

use serde::{Deserialize, Serialize};

use crate::PROTOCOL_VERSION;
use crate::command::{AuthState, Command, Event, EventStream, OAuthConfig, UploadResult};

/// Message envelope wrapping all protocol messages.
///
/// Every message exchanged with the backend is wrapped in this envelope,
/// which provides versioning and request correlation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Protocol version (always "1" for v1).
    pub protocol_version: String,
    /// Unique request ID for correlation.
    pub request_id: String,
    pub payload: T,
}

impl<T> Envelope<T> {
    /// Creates a new envelope with the current protocol version.
    pub fn new(request_id: impl Into<String>, payload: T) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            request_id: request_id.into(),
            payload,
        }
    }

    /// Checks if this envelope uses a compatible protocol version.
    pub fn is_compatible(&self) -> bool {
        self.protocol_version == PROTOCOL_VERSION
    }
}

/// Messages sent from the client to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Run a command and answer with a single reply.
    Invoke { command: Command },

    /// Keep the connection open and forward every emission on `stream`.
    Subscribe { stream: EventStream },

    /// Liveness check.
    Ping,
}

impl Request {
    /// Creates an Invoke request.
    pub fn invoke(command: Command) -> Self {
        Self::Invoke { command }
    }

    /// Creates a Subscribe request.
    pub fn subscribe(stream: EventStream) -> Self {
        Self::Subscribe { stream }
    }
}

/// Messages sent from the backend to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    /// Answer to `check_auth`, `exchange_code` and `refresh_token`.
    Auth { state: AuthState },

    /// Answer to `get_auth_url`.
    AuthUrl { url: String },

    /// Answer to `upload_file`.
    Uploaded { result: UploadResult },

    /// Answer to `get_oauth_config`.
    #[serde(rename = "oauth_config")]
    OAuthConfig { config: OAuthConfig },

    /// Success without a payload.
    Ok,

    /// Acknowledges a subscription; events follow on the same connection.
    Subscribed { stream: EventStream },

    /// One emission on a subscribed stream.
    Event { event: Event },

    /// The command failed.
    Error {
        #[serde(flatten)]
        error: ErrorResponse,
    },

    /// Pong response to Ping.
    Pong,
}

impl Reply {
    /// Creates an Error reply.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            error: ErrorResponse::new(code, message),
        }
    }

    /// Returns a short name for the variant, for logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::AuthUrl { .. } => "auth_url",
            Self::Uploaded { .. } => "uploaded",
            Self::OAuthConfig { .. } => "oauth_config",
            Self::Ok => "ok",
            Self::Subscribed { .. } => "subscribed",
            Self::Event { .. } => "event",
            Self::Error { .. } => "error",
            Self::Pong => "pong",
        }
    }

    /// Returns true unless this is an Error reply.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Error { .. })
    }

    /// Returns the error if this is an error reply.
    pub fn as_error(&self) -> Option<&ErrorResponse> {
        match self {
            Self::Error { error } => Some(error),
            _ => None,
        }
    }
}

/// Error codes reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Unknown or internal error.
    InternalError,

    /// Invalid request format.
    InvalidRequest,

    /// The command name is not known to the backend.
    UnknownCommand,

    /// The identity provider rejected the request.
    AuthenticationFailed,

    /// No stored session to act on.
    NotAuthenticated,

    /// The file could not be read or the remote service refused it.
    UploadFailed,

    /// The requested event stream does not exist.
    UnknownStream,

    /// Backend is shutting down.
    ShuttingDown,
}

impl ErrorCode {
    /// Returns a human-readable description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InternalError => "An internal error occurred",
            Self::InvalidRequest => "The request was invalid",
            Self::UnknownCommand => "The command is not supported",
            Self::AuthenticationFailed => "Authentication failed",
            Self::NotAuthenticated => "Not signed in",
            Self::UploadFailed => "The upload failed",
            Self::UnknownStream => "The event stream does not exist",
            Self::ShuttingDown => "Backend is shutting down",
        }
    }
}

/// Error response details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    /// Human-readable error message, shown to the user as-is.
    pub message: String,
}

impl ErrorResponse {
    /// Creates a new error response.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

impl std::error::Error for ErrorResponse {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::UploadProgress;

    #[test]
    fn request_serde_invoke() {
        let request = Request::invoke(Command::CheckAuth);
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"type":"invoke","command":{"name":"check_auth"}}"#);

        let parsed: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn request_serde_subscribe() {
        let request = Request::subscribe(EventStream::UploadProgress);
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"type":"subscribe","stream":"upload-progress"}"#);
    }

    #[test]
    fn request_serde_ping() {
        let json = serde_json::to_string(&Request::Ping).unwrap();
        assert_eq!(json, r#"{"type":"ping"}"#);
    }

    #[test]
    fn reply_serde_auth() {
        let reply = Reply::Auth {
            state: AuthState::authenticated("tok", 42),
        };
        insta::assert_json_snapshot!(reply, @r#"
        {
          "type": "auth",
          "state": {
            "is_authenticated": true,
            "access_token": "tok",
            "expires_at": 42
          }
        }
        "#);
    }

    #[test]
    fn reply_serde_ok() {
        let json = serde_json::to_string(&Reply::Ok).unwrap();
        assert_eq!(json, r#"{"type":"ok"}"#);

        let parsed: Reply = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Reply::Ok);
    }

    #[test]
    fn reply_serde_oauth_config_tag() {
        let reply = Reply::OAuthConfig {
            config: OAuthConfig::default(),
        };
        let json = serde_json::to_string(&reply).unwrap();
        assert!(json.starts_with(r#"{"type":"oauth_config""#));
        assert_eq!(reply.kind(), "oauth_config");
    }

    #[test]
    fn reply_serde_error_is_flattened() {
        let reply = Reply::error(ErrorCode::UploadFailed, "quota exceeded");
        let json = serde_json::to_string(&reply).unwrap();
        assert_eq!(
            json,
            r#"{"type":"error","code":"upload_failed","message":"quota exceeded"}"#
        );

        let parsed: Reply = serde_json::from_str(&json).unwrap();
        assert!(!parsed.is_success());
        assert_eq!(parsed.as_error().unwrap().message, "quota exceeded");
    }

    #[test]
    fn reply_serde_event() {
        let reply = Reply::Event {
            event: Event::UploadProgress(UploadProgress::new(1, 4, 25.0)),
        };
        let json = serde_json::to_string(&reply).unwrap();
        let parsed: Reply = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, reply);
        assert!(parsed.is_success());
    }

    #[test]
    fn envelope_version_check() {
        let envelope = Envelope::new("req-1", Request::Ping);
        assert!(envelope.is_compatible());

        let old = Envelope {
            protocol_version: "0".to_string(),
            ..envelope
        };
        assert!(!old.is_compatible());
    }

    #[test]
    fn error_response_display() {
        let error = ErrorResponse::new(ErrorCode::NotAuthenticated, "no refresh token");
        let display = error.to_string();
        assert!(display.contains("Not signed in"));
        assert!(display.contains("no refresh token"));
    }

    #[test]
    fn error_code_descriptions_are_filled() {
        for code in [
            ErrorCode::InternalError,
            ErrorCode::InvalidRequest,
            ErrorCode::UnknownCommand,
            ErrorCode::AuthenticationFailed,
            ErrorCode::NotAuthenticated,
            ErrorCode::UploadFailed,
            ErrorCode::UnknownStream,
            ErrorCode::ShuttingDown,
        ] {
            assert!(!code.description().is_empty());
        }
    }
}
