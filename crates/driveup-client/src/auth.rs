//! Authentication coordinator.
//!
//! Owns the client's view of the session and drives the sign-in flow
//! through the boundary: `check_auth`, `get_auth_url`, `exchange_code`,
//! `refresh_token` and `sign_out`. Observers follow the session through a
//! [`watch::Receiver`] from [`AuthCoordinator::subscribe`].
//!
//! Only the two sign-in steps return errors to the caller. Every other
//! operation records failures in [`AuthSession::last_error`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use driveup_protocol::AuthState;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use crate::actions::{SystemOpener, UrlOpener};
use crate::boundary::{BoundaryExt, SessionBoundary};
use crate::config::{ClientConfig, DEFAULT_EXPIRY_BUFFER_SECS};
use crate::error::{ClientError, ClientResult};
use crate::pending::{PendingGuard, TracksPending};

/// The client's view of the authentication session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSession {
    pub authenticated: bool,
    /// Opaque bearer credential.
    pub access_token: Option<String>,
    /// Absolute expiry in epoch seconds.
    pub expires_at: Option<i64>,
    /// True while at least one auth operation is in flight.
    pub pending: bool,
    pub last_error: Option<String>,
    in_flight: u32,
}

impl AuthSession {
    /// Returns true if the session is still usable `buffer_secs` after `now`.
    ///
    /// A session without an expiry is never live.
    pub fn is_live_at(&self, now: DateTime<Utc>, buffer_secs: i64) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at > now.timestamp().saturating_add(buffer_secs))
    }

    /// Time left until expiry, negative once expired.
    pub fn expires_in(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.expires_at
            .map(|expires_at| chrono::Duration::seconds(expires_at - now.timestamp()))
    }

    fn apply(&mut self, state: AuthState) {
        self.authenticated = state.authenticated;
        self.access_token = state.access_token;
        self.expires_at = state.expires_at;
    }

    fn clear(&mut self) {
        self.authenticated = false;
        self.access_token = None;
        self.expires_at = None;
    }
}

impl TracksPending for AuthSession {
    fn enter(&mut self) {
        self.in_flight += 1;
        self.pending = true;
        self.last_error = None;
    }

    fn exit(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.pending = self.in_flight > 0;
    }
}

/// Drives the authentication flow and owns the [`AuthSession`].
pub struct AuthCoordinator {
    boundary: Arc<dyn SessionBoundary>,
    opener: Arc<dyn UrlOpener>,
    state: watch::Sender<AuthSession>,
    expiry_buffer_secs: i64,
}

impl AuthCoordinator {
    /// Creates a coordinator with an empty session that opens URLs in the
    /// system browser.
    pub fn new(boundary: Arc<dyn SessionBoundary>) -> Self {
        Self {
            boundary,
            opener: Arc::new(SystemOpener),
            state: watch::Sender::new(AuthSession::default()),
            expiry_buffer_secs: DEFAULT_EXPIRY_BUFFER_SECS,
        }
    }

    /// Creates a coordinator using the `[auth]` settings.
    pub fn from_config(boundary: Arc<dyn SessionBoundary>, config: &ClientConfig) -> Self {
        Self::new(boundary).with_expiry_buffer(config.auth.expiry_buffer_secs)
    }

    #[must_use]
    pub fn with_opener(mut self, opener: Arc<dyn UrlOpener>) -> Self {
        self.opener = opener;
        self
    }

    #[must_use]
    pub fn with_expiry_buffer(mut self, secs: i64) -> Self {
        self.expiry_buffer_secs = secs;
        self
    }

    /// Returns a copy of the current session.
    pub fn snapshot(&self) -> AuthSession {
        self.state.borrow().clone()
    }

    /// Returns a receiver that observes every session change.
    pub fn subscribe(&self) -> watch::Receiver<AuthSession> {
        self.state.subscribe()
    }

    /// Returns true if the session is live right now.
    pub fn is_live(&self) -> bool {
        self.is_live_at(Utc::now())
    }

    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.state.borrow().is_live_at(now, self.expiry_buffer_secs)
    }

    /// Asks the backend for the current session and mirrors it.
    ///
    /// On failure the session is marked unauthenticated and the error is
    /// recorded; the token fields keep their previous values.
    pub async fn check_auth(&self) {
        let guard = PendingGuard::enter(&self.state);
        match self.boundary.check_auth().await {
            Ok(state) => {
                debug!(authenticated = state.authenticated, "auth state checked");
                guard.finish(|s| s.apply(state));
            }
            Err(e) => {
                warn!(error = %e, "auth check failed");
                guard.finish(|s| {
                    s.authenticated = false;
                    s.last_error = Some(e.to_string());
                });
            }
        }
    }

    /// Fetches the authorization URL and opens it in the browser.
    ///
    /// Returns the URL that was opened.
    pub async fn begin_sign_in(&self) -> ClientResult<String> {
        let guard = PendingGuard::enter(&self.state);
        match self.open_auth_url().await {
            Ok(url) => {
                info!("sign-in started");
                guard.finish(|_| {});
                Ok(url)
            }
            Err(e) => {
                warn!(error = %e, "could not start sign-in");
                let message = e.to_string();
                guard.finish(|s| s.last_error = Some(message));
                Err(e)
            }
        }
    }

    async fn open_auth_url(&self) -> ClientResult<String> {
        let url = self.boundary.get_auth_url().await?;
        if let Err(source) = Url::parse(&url) {
            return Err(ClientError::InvalidAuthUrl { url, source });
        }
        self.opener.open(&url)?;
        Ok(url)
    }

    /// Exchanges the authorization code from the redirect for a session.
    pub async fn complete_sign_in(&self, code: &str) -> ClientResult<()> {
        let guard = PendingGuard::enter(&self.state);
        match self.boundary.exchange_code(code).await {
            Ok(state) => {
                info!(authenticated = state.authenticated, "sign-in completed");
                guard.finish(|s| s.apply(state));
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "code exchange failed");
                let message = e.to_string();
                guard.finish(|s| s.last_error = Some(message));
                Err(e.into())
            }
        }
    }

    /// Refreshes the access token. A failure signs the session out locally.
    pub async fn refresh_session(&self) {
        let guard = PendingGuard::enter(&self.state);
        match self.boundary.refresh_token().await {
            Ok(state) => {
                debug!(expires_at = ?state.expires_at, "session refreshed");
                guard.finish(|s| s.apply(state));
            }
            Err(e) => {
                warn!(error = %e, "session refresh failed");
                guard.finish(|s| {
                    s.authenticated = false;
                    s.last_error = Some(e.to_string());
                });
            }
        }
    }

    /// Signs out on the backend and always forgets the local session.
    pub async fn sign_out(&self) {
        let guard = PendingGuard::enter(&self.state);
        let outcome = self.boundary.sign_out().await;
        if let Err(e) = &outcome {
            warn!(error = %e, "backend sign-out failed, clearing local session anyway");
        } else {
            info!("signed out");
        }
        guard.finish(|s| {
            s.clear();
            s.last_error = outcome.err().map(|e| e.to_string());
        });
    }
}
