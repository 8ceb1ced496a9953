//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/driveup/config.toml` by default. Every key is optional:
//!
//! ```toml
//! debug = false
//!
//! [server]
//! socket_path = "/run/user/1000/driveup.sock"
//! timeout = 5
//! upload_timeout = 600
//!
//! [auth]
//! expiry_buffer_secs = 300
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use driveup_core::TracingConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Seconds before expiry at which a session stops counting as live.
pub const DEFAULT_EXPIRY_BUFFER_SECS: i64 = 300;

/// Configuration for the driveup client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// Backend connection settings.
    pub server: ServerSettings,

    /// Session settings.
    pub auth: AuthSettings,
}

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Path to the backend socket.
    pub socket_path: Option<PathBuf>,

    /// Connect and reply timeout in seconds.
    pub timeout: u64,

    /// Reply timeout for `upload_file` in seconds. Unset waits for as long
    /// as the transfer takes.
    pub upload_timeout: Option<u64>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            socket_path: None,
            timeout: 5,
            upload_timeout: None,
        }
    }
}

/// Session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub expiry_buffer_secs: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            expiry_buffer_secs: DEFAULT_EXPIRY_BUFFER_SECS,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            ClientError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("driveup")
    }

    /// Returns the configured socket path or the per-user default.
    pub fn socket_path(&self) -> PathBuf {
        self.server
            .socket_path
            .clone()
            .unwrap_or_else(default_socket_path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout)
    }

    pub fn upload_timeout(&self) -> Option<Duration> {
        self.server.upload_timeout.map(Duration::from_secs)
    }

    /// Returns the tracing setup matching the `debug` flag.
    pub fn tracing_config(&self) -> TracingConfig {
        TracingConfig::for_debug(self.debug)
    }
}

/// Returns the default socket path for the backend.
///
/// Uses `$XDG_RUNTIME_DIR/driveup.sock` if available, otherwise
/// `/tmp/driveup-$UID.sock`.
pub fn default_socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join("driveup.sock")
    } else {
        #[cfg(unix)]
        let uid = unsafe { libc::getuid() };
        #[cfg(not(unix))]
        let uid = 0;
        PathBuf::from(format!("/tmp/driveup-{}.sock", uid))
    }
}
