//! Boundary commands, their payloads, and the event streams.
//!
//! Field names on the wire follow the backend process: command arguments
//! are camelCase (`filePath`, `folderId`), reply payloads are snake_case.
//! The Rust field names describe what the value is for this client.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// A named command understood by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "args", rename_all = "snake_case")]
pub enum Command {
    /// Query the current authentication state.
    CheckAuth,

    /// Ask for the identity provider's authorization URL.
    GetAuthUrl,

    /// Exchange an authorization code for a session.
    ExchangeCode {
        /// Code received on the OAuth redirect.
        code: String,
    },

    /// Refresh the access token using the stored refresh token.
    RefreshToken,

    /// Invalidate the session and forget stored tokens.
    SignOut,

    /// Upload a local file, converting it on the remote side.
    UploadFile {
        /// Local path of the file to upload.
        #[serde(rename = "filePath")]
        file_path: String,
        /// Destination folder; `null` uploads to the root folder.
        #[serde(rename = "folderId")]
        folder_id: Option<String>,
    },

    /// Read the custom OAuth client configuration.
    GetOauthConfig,

    /// Store a custom OAuth client.
    SaveOauthConfig {
        #[serde(rename = "clientId")]
        client_id: String,
        #[serde(rename = "clientSecret")]
        client_secret: String,
    },

    /// Remove the custom OAuth client and fall back to the built-in one.
    ClearOauthConfig,
}

impl Command {
    /// Creates an ExchangeCode command.
    pub fn exchange_code(code: impl Into<String>) -> Self {
        Self::ExchangeCode { code: code.into() }
    }

    /// Creates an UploadFile command.
    ///
    /// An empty folder id is treated the same as no folder, so the backend
    /// always receives either a usable id or an explicit `null`.
    pub fn upload_file(file_path: impl Into<String>, folder_id: Option<&str>) -> Self {
        Self::UploadFile {
            file_path: file_path.into(),
            folder_id: folder_id
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        }
    }

    /// Creates a SaveOauthConfig command.
    pub fn save_oauth_config(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self::SaveOauthConfig {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Returns the wire name of this command.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CheckAuth => "check_auth",
            Self::GetAuthUrl => "get_auth_url",
            Self::ExchangeCode { .. } => "exchange_code",
            Self::RefreshToken => "refresh_token",
            Self::SignOut => "sign_out",
            Self::UploadFile { .. } => "upload_file",
            Self::GetOauthConfig => "get_oauth_config",
            Self::SaveOauthConfig { .. } => "save_oauth_config",
            Self::ClearOauthConfig => "clear_oauth_config",
        }
    }

    /// Returns true for commands whose reply only arrives once a transfer
    /// has finished.
    pub fn is_long_running(&self) -> bool {
        matches!(self, Self::UploadFile { .. })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Authentication state as reported by the backend.
///
/// Returned by `check_auth`, `exchange_code` and `refresh_token`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    #[serde(rename = "is_authenticated")]
    pub authenticated: bool,
    #[serde(default)]
    pub access_token: Option<String>,
    /// Absolute expiry, seconds since the Unix epoch.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl AuthState {
    /// A state with no session.
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    /// A live session.
    pub fn authenticated(access_token: impl Into<String>, expires_at: i64) -> Self {
        Self {
            authenticated: true,
            access_token: Some(access_token.into()),
            expires_at: Some(expires_at),
        }
    }

    /// Checks that an authenticated state carries a token together with
    /// its expiry.
    ///
    /// An unauthenticated state is never rejected: the backend reports a
    /// stored token whose expiry is missing as not signed in, and that is a
    /// state, not a failure. An unpaired token or expiry is dropped so the
    /// returned value holds either both or neither.
    pub fn validate(self) -> ProtocolResult<Self> {
        if !self.authenticated {
            return Ok(match (self.access_token, self.expires_at) {
                (Some(token), Some(expires_at)) => Self {
                    authenticated: false,
                    access_token: Some(token),
                    expires_at: Some(expires_at),
                },
                _ => Self::unauthenticated(),
            });
        }

        let problem = match (self.access_token.is_some(), self.expires_at.is_some()) {
            (true, true) => return Ok(self),
            (true, false) => "auth state has an access token but no expiry",
            (false, true) => "auth state has an expiry but no access token",
            (false, false) => "auth state is authenticated but has no access token",
        };
        Err(ProtocolError::invalid_payload(problem))
    }
}

/// Result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// Identifier of the created remote file.
    #[serde(rename = "file_id")]
    pub remote_id: String,
    /// Name of the remote file.
    #[serde(rename = "name")]
    pub display_name: String,
    /// Link that opens the converted document.
    #[serde(rename = "web_view_link")]
    pub remote_link: String,
    /// Category the backend actually converted the file into.
    #[serde(rename = "file_type")]
    pub resolved_category: String,
}

/// Progress of the running upload, as emitted on the progress stream.
///
/// Values are forwarded as the backend reports them; nothing here checks
/// that `percentage` agrees with the byte counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadProgress {
    #[serde(rename = "bytes_uploaded")]
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    /// 0 to 100.
    pub percentage: f64,
}

impl UploadProgress {
    pub fn new(bytes_transferred: u64, total_bytes: u64, percentage: f64) -> Self {
        Self {
            bytes_transferred,
            total_bytes,
            percentage,
        }
    }
}

/// Custom OAuth client configuration. The secret itself never crosses the
/// boundary in this direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub use_custom: bool,
    #[serde(default)]
    pub client_id: Option<String>,
    pub has_client_secret: bool,
}

/// Named event streams the backend can emit on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStream {
    #[serde(rename = "upload-progress")]
    UploadProgress,
}

impl EventStream {
    /// Returns the wire name of this stream.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UploadProgress => "upload-progress",
        }
    }
}

impl fmt::Display for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single emission on an event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stream", content = "payload")]
pub enum Event {
    #[serde(rename = "upload-progress")]
    UploadProgress(UploadProgress),
}

impl Event {
    /// Returns the stream this event was emitted on.
    pub fn stream(&self) -> EventStream {
        match self {
            Self::UploadProgress(_) => EventStream::UploadProgress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_command_has_no_args() {
        let json = serde_json::to_string(&Command::CheckAuth).unwrap();
        assert_eq!(json, r#"{"name":"check_auth"}"#);

        let parsed: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Command::CheckAuth);
    }

    #[test]
    fn exchange_code_args() {
        let json = serde_json::to_string(&Command::exchange_code("auth-code-123")).unwrap();
        assert_eq!(
            json,
            r#"{"name":"exchange_code","args":{"code":"auth-code-123"}}"#
        );
    }

    #[test]
    fn upload_file_without_folder_sends_explicit_null() {
        let command = Command::upload_file("/home/user/report.docx", None);
        insta::assert_json_snapshot!(command, @r#"
        {
          "name": "upload_file",
          "args": {
            "filePath": "/home/user/report.docx",
            "folderId": null
          }
        }
        "#);
    }

    #[test]
    fn upload_file_empty_folder_is_null() {
        let command = Command::upload_file("/tmp/a.csv", Some(""));
        assert_eq!(
            command,
            Command::UploadFile {
                file_path: "/tmp/a.csv".to_string(),
                folder_id: None,
            }
        );
    }

    #[test]
    fn upload_file_with_folder() {
        let command = Command::upload_file("/tmp/a.csv", Some("folder-1"));
        let json = serde_json::to_string(&command).unwrap();
        assert!(json.contains(r#""folderId":"folder-1""#));
        assert!(command.is_long_running());
        assert!(!Command::CheckAuth.is_long_running());
    }

    #[test]
    fn save_oauth_config_args_are_camel_case() {
        let command = Command::save_oauth_config("id.apps.googleusercontent.com", "s3cret");
        let json = serde_json::to_string(&command).unwrap();
        assert_eq!(
            json,
            r#"{"name":"save_oauth_config","args":{"clientId":"id.apps.googleusercontent.com","clientSecret":"s3cret"}}"#
        );
    }

    #[test]
    fn command_names_match_wire_tags() {
        let commands = [
            Command::CheckAuth,
            Command::GetAuthUrl,
            Command::exchange_code("c"),
            Command::RefreshToken,
            Command::SignOut,
            Command::upload_file("/f.txt", None),
            Command::GetOauthConfig,
            Command::save_oauth_config("i", "s"),
            Command::ClearOauthConfig,
        ];
        for command in commands {
            let value = serde_json::to_value(&command).unwrap();
            assert_eq!(value["name"], command.name());
        }
    }

    #[test]
    fn auth_state_wire_names() {
        let json = r#"{"is_authenticated":true,"access_token":"test-token","expires_at":9999999999}"#;
        let state: AuthState = serde_json::from_str(json).unwrap();
        assert_eq!(state, AuthState::authenticated("test-token", 9_999_999_999));
        assert!(state.validate().is_ok());
    }

    #[test]
    fn auth_state_missing_token_fields_default_to_none() {
        let state: AuthState = serde_json::from_str(r#"{"is_authenticated":false}"#).unwrap();
        assert_eq!(state, AuthState::unauthenticated());
        assert!(state.validate().is_ok());
    }

    #[test]
    fn auth_state_validation_rejects_authenticated_half_sessions() {
        let token_only = AuthState {
            authenticated: true,
            access_token: Some("t".into()),
            expires_at: None,
        };
        assert!(token_only.validate().is_err());

        let expiry_only = AuthState {
            authenticated: true,
            access_token: None,
            expires_at: Some(1),
        };
        assert!(expiry_only.validate().is_err());

        let flag_only = AuthState {
            authenticated: true,
            access_token: None,
            expires_at: None,
        };
        assert!(matches!(
            flag_only.validate(),
            Err(ProtocolError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn unauthenticated_half_sessions_are_normalized() {
        let token_only = AuthState {
            authenticated: false,
            access_token: Some("t".into()),
            expires_at: None,
        };
        assert_eq!(token_only.validate().unwrap(), AuthState::unauthenticated());

        let expiry_only = AuthState {
            authenticated: false,
            access_token: None,
            expires_at: Some(1),
        };
        assert_eq!(expiry_only.validate().unwrap(), AuthState::unauthenticated());

        let expired = AuthState {
            authenticated: false,
            access_token: Some("t".into()),
            expires_at: Some(1),
        };
        assert_eq!(expired.clone().validate().unwrap(), expired);
    }

    #[test]
    fn upload_result_wire_names() {
        let json = r#"{"file_id":"abc","name":"report","web_view_link":"https://docs.google.com/document/d/abc","file_type":"Google Docs"}"#;
        let result: UploadResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.remote_id, "abc");
        assert_eq!(result.display_name, "report");
        assert_eq!(result.remote_link, "https://docs.google.com/document/d/abc");
        assert_eq!(result.resolved_category, "Google Docs");
    }

    #[test]
    fn progress_event_shape() {
        let event = Event::UploadProgress(UploadProgress::new(512, 1024, 50.0));
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"stream":"upload-progress","payload":{"bytes_uploaded":512,"total_bytes":1024,"percentage":50.0}}"#
        );
        assert_eq!(event.stream(), EventStream::UploadProgress);
    }

    #[test]
    fn progress_accepts_integer_percentage() {
        let json = r#"{"stream":"upload-progress","payload":{"bytes_uploaded":0,"total_bytes":10,"percentage":0}}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event, Event::UploadProgress(UploadProgress::new(0, 10, 0.0)));
    }

    #[test]
    fn event_stream_name() {
        assert_eq!(EventStream::UploadProgress.to_string(), "upload-progress");
        let json = serde_json::to_string(&EventStream::UploadProgress).unwrap();
        assert_eq!(json, r#""upload-progress""#);
    }

    #[test]
    fn oauth_config_roundtrip() {
        let config = OAuthConfig {
            use_custom: true,
            client_id: Some("id".into()),
            has_client_secret: true,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(
            json,
            r#"{"use_custom":true,"client_id":"id","has_client_secret":true}"#
        );
    }
}
