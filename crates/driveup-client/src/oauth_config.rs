//! Custom OAuth client settings.
//!
//! Users can sign in through their own Google Cloud OAuth client instead of
//! the built-in one. The secret is write-only from here: the backend only
//! ever reports whether one is stored.

use std::sync::Arc;

use driveup_protocol::OAuthConfig;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::boundary::{BoundaryExt, SessionBoundary};
use crate::error::ClientResult;
use crate::pending::{PendingGuard, TracksPending};

/// The client's view of the custom OAuth client settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OAuthConfigView {
    pub use_custom: bool,
    pub client_id: Option<String>,
    pub has_client_secret: bool,
    pub pending: bool,
    pub last_error: Option<String>,
    in_flight: u32,
}

impl OAuthConfigView {
    fn apply(&mut self, config: OAuthConfig) {
        self.use_custom = config.use_custom;
        self.client_id = config.client_id;
        self.has_client_secret = config.has_client_secret;
    }
}

impl TracksPending for OAuthConfigView {
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

pub struct OAuthConfigCoordinator {
    boundary: Arc<dyn SessionBoundary>,
    state: watch::Sender<OAuthConfigView>,
}

impl OAuthConfigCoordinator {
    pub fn new(boundary: Arc<dyn SessionBoundary>) -> Self {
        Self {
            boundary,
            state: watch::Sender::new(OAuthConfigView::default()),
        }
    }

    pub fn snapshot(&self) -> OAuthConfigView {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OAuthConfigView> {
        self.state.subscribe()
    }

    /// Reads the stored settings. Failures are recorded, not returned.
    pub async fn load(&self) {
        let guard = PendingGuard::enter(&self.state);
        match self.boundary.get_oauth_config().await {
            Ok(config) => guard.finish(|s| s.apply(config)),
            Err(e) => {
                warn!(error = %e, "could not load OAuth settings");
                guard.finish(|s| s.last_error = Some(e.to_string()));
            }
        }
    }

    /// Stores a custom OAuth client.
    pub async fn save(&self, client_id: &str, client_secret: &str) -> ClientResult<()> {
        let guard = PendingGuard::enter(&self.state);
        match self
            .boundary
            .save_oauth_config(client_id, client_secret)
            .await
        {
            Ok(()) => {
                info!("custom OAuth client saved");
                guard.finish(|s| {
                    s.use_custom = true;
                    s.client_id = Some(client_id.to_string());
                    s.has_client_secret = !client_secret.is_empty();
                });
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "could not save OAuth settings");
                let message = e.to_string();
                guard.finish(|s| s.last_error = Some(message));
                Err(e.into())
            }
        }
    }

    /// Removes the custom OAuth client. Failures are recorded, not returned.
    pub async fn clear(&self) {
        let guard = PendingGuard::enter(&self.state);
        match self.boundary.clear_oauth_config().await {
            Ok(()) => {
                info!("custom OAuth client removed");
                guard.finish(|s| s.apply(OAuthConfig::default()));
            }
            Err(e) => {
                warn!(error = %e, "could not clear OAuth settings");
                guard.finish(|s| s.last_error = Some(e.to_string()));
            }
        }
    }
}
