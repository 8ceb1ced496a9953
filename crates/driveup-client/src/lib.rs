//! Client-side coordination for the driveup desktop uploader.
//!
//! The backend process owns tokens, the OAuth flow and the actual transfer.
//! This crate keeps the application's view of that work:
//!
//! - [`AuthCoordinator`] mirrors the sign-in session and drives sign-in,
//!   refresh and sign-out.
//! - [`UploadCoordinator`] tracks the selected file and its upload,
//!   including progress streamed by the backend.
//! - [`OAuthConfigCoordinator`] manages an optional custom OAuth client.
//!
//! All three talk to the backend through a [`SessionBoundary`]; the
//! production one is [`SocketBoundary`]. Each coordinator publishes its
//! state through a `tokio::sync::watch` channel.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use driveup_client::{
//!     AuthCoordinator, ClientConfig, SocketBoundary, UploadCoordinator,
//! };
//!
//! # async fn run() -> driveup_client::ClientResult<()> {
//! let config = ClientConfig::load()?;
//! let boundary = Arc::new(SocketBoundary::from_config(&config));
//!
//! let auth = AuthCoordinator::from_config(boundary.clone(), &config);
//! auth.check_auth().await;
//!
//! if auth.is_live() {
//!     let upload = UploadCoordinator::new(boundary);
//!     upload.select_file("/home/user/report.docx");
//!     upload.upload(None).await?;
//!     println!("{:?}", upload.snapshot().result);
//!     upload.teardown().await;
//! }
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod auth;
pub mod boundary;
pub mod config;
pub mod error;
pub mod oauth_config;
mod pending;
pub mod socket;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

pub use actions::{SystemOpener, UrlOpener};
pub use auth::{AuthCoordinator, AuthSession};
pub use boundary::{
    BoundaryExt, BoxFuture, EventHandler, SessionBoundary, StreamEnd, Subscription,
};
pub use config::{ClientConfig, default_socket_path};
pub use error::{BoundaryError, BoundaryResult, ClientError, ClientResult};
pub use oauth_config::{OAuthConfigCoordinator, OAuthConfigView};
pub use socket::SocketBoundary;
pub use upload::{NO_FILE_SELECTED, UploadCoordinator, UploadSession, UploadStatus};
