//! Boundary schemas and IPC framing for driveup.
//!
//! The desktop shell talks to a backend process that owns the OAuth tokens
//! and performs the actual transfers. Everything that crosses that boundary
//! is described here:
//!
//! - [`Command`]: the named commands and their arguments
//! - [`AuthState`], [`UploadResult`], [`OAuthConfig`]: command results
//! - [`Event`] / [`EventStream`]: out-of-band emissions such as upload progress
//! - [`Envelope`], [`Request`], [`Reply`]: the socket message layer
//!
//! # Wire format
//!
//! Messages are sent as length-prefixed JSON:
//! - 4 bytes: message length (u32, big-endian)
//! - N bytes: JSON payload
//!
//! # Example
//!
//! ```rust
//! use driveup_protocol::{decode_message, encode_message, Command, Envelope, Request};
//!
//! let request = Envelope::new("req-123", Request::invoke(Command::CheckAuth));
//! let bytes = encode_message(&request).unwrap();
//! let decoded: Envelope<Request> = decode_message(&bytes).unwrap();
//! assert_eq!(decoded, request);
//! ```

mod command;
mod error;
mod framing;
mod types;

pub use command::{AuthState, Command, Event, EventStream, OAuthConfig, UploadProgress, UploadResult};
pub use error::{ProtocolError, ProtocolResult};
pub use framing::{LENGTH_PREFIX_SIZE, decode_message, decode_payload, encode_message, payload_len};
pub use types::{Envelope, ErrorCode, ErrorResponse, Reply, Request};

/// Protocol version constant.
pub const PROTOCOL_VERSION: &str = "1";

/// Maximum message size (1 MB).
pub const MAX_MESSAGE_SIZE: u32 = 1024 * 1024;
