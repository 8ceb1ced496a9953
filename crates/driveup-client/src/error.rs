//! Client error types.

use driveup_protocol::{ErrorCode, ErrorResponse, ProtocolError};
use thiserror::Error;

/// Result type for boundary calls.
pub type BoundaryResult<T> = Result<T, BoundaryError>;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// A failed command invocation or subscription.
#[derive(Debug, Error)]
pub enum BoundaryError {
    /// The backend could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The backend did not answer in time.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Framing or schema error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend ran the command and reported a failure. The message is
    /// the backend's own and is shown to the user unchanged.
    #[error("{message}")]
    Rejected { code: ErrorCode, message: String },

    /// The backend answered with a reply that does not belong to the command.
    #[error("unexpected {reply} reply to {command}")]
    UnexpectedReply {
        command: &'static str,
        reply: &'static str,
    },
}

impl BoundaryError {
    /// Creates a rejection with the given code and message.
    pub fn rejected(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }
}

impl From<ErrorResponse> for BoundaryError {
    fn from(error: ErrorResponse) -> Self {
        Self::Rejected {
            code: error.code,
            message: error.message,
        }
    }
}

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Boundary(#[from] BoundaryError),

    /// The backend produced an authorization URL that does not parse.
    #[error("invalid authorization URL {url:?}: {source}")]
    InvalidAuthUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Action failed (opening a URL in the browser).
    #[error("action failed: {0}")]
    Action(String),

    /// `upload()` was called while another upload is still running.
    #[error("an upload is already in progress")]
    UploadInProgress,

    #[error("configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_displays_backend_message_verbatim() {
        let error = BoundaryError::rejected(ErrorCode::AuthenticationFailed, "Invalid code");
        assert_eq!(error.to_string(), "Invalid code");

        let client: ClientError = error.into();
        assert_eq!(client.to_string(), "Invalid code");
    }

    #[test]
    fn error_response_converts_to_rejection() {
        let error: BoundaryError =
            ErrorResponse::new(ErrorCode::UploadFailed, "quota exceeded").into();
        assert!(matches!(
            error,
            BoundaryError::Rejected {
                code: ErrorCode::UploadFailed,
                ..
            }
        ));
    }

    #[test]
    fn unexpected_reply_names_both_sides() {
        let error = BoundaryError::UnexpectedReply {
            command: "check_auth",
            reply: "pong",
        };
        assert_eq!(error.to_string(), "unexpected pong reply to check_auth");
    }

    #[test]
    fn upload_in_progress_message() {
        assert_eq!(
            ClientError::UploadInProgress.to_string(),
            "an upload is already in progress"
        );
    }
}
