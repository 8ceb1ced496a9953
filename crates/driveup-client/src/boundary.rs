//! The session boundary: commands and event streams to the backend.
//!
//! [`SessionBoundary`] is the only way the coordinators reach the backend
//! process. It has two primitives:
//!
//! - [`SessionBoundary::invoke`] runs one named command and resolves to its
//!   reply, or to a [`BoundaryError`] when the backend rejects it or cannot
//!   be reached.
//! - [`SessionBoundary::subscribe`] registers a handler on a named event
//!   stream and resolves to a [`Subscription`] once the backend has
//!   accepted it. Dropping the subscription unsubscribes.
//!
//! The raw primitives deal in [`Reply`] values. [`BoundaryExt`] layers one
//! typed accessor per command on top, checking that the reply has the shape
//! the command promises.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use driveup_protocol::{
    AuthState, Command, Event, EventStream, OAuthConfig, Reply, UploadResult,
};

use crate::error::{BoundaryError, BoundaryResult};

/// A boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Callback run for every emission on a subscribed stream.
///
/// Handlers run on the transport's task and must not block.
pub type EventHandler = Arc<dyn Fn(Event) + Send + Sync>;

/// Lets the event source report that a stream ended on its side.
///
/// Clones share one flag. Once closed it stays closed.
#[derive(Debug, Clone, Default)]
pub struct StreamEnd(Arc<AtomicBool>);

impl StreamEnd {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the stream as ended. No further events will arrive.
    pub fn close(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Handle to an active event-stream subscription.
///
/// The subscription ends when the handle is dropped or
/// [`unsubscribe`](Subscription::unsubscribe) is called, whichever comes
/// first. It also stops being active when the source closes the stream,
/// for example when the backend goes away.
pub struct Subscription {
    stream: EventStream,
    end: StreamEnd,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Creates a handle that runs `cancel` exactly once when released.
    pub fn new(stream: EventStream, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            stream,
            end: StreamEnd::new(),
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Ties the handle to a source-side end signal.
    #[must_use]
    pub fn with_end(mut self, end: StreamEnd) -> Self {
        self.end = end;
        self
    }

    /// Returns the stream this subscription listens on.
    pub fn stream(&self) -> EventStream {
        self.stream
    }

    /// Returns `true` while events can still arrive.
    pub fn is_active(&self) -> bool {
        self.cancel.is_some() && !self.end.is_closed()
    }

    /// Ends the subscription now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("stream", &self.stream)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Asynchronous command/event channel to the backend process.
///
/// Implementations are stateless with respect to sessions; all session
/// state lives in the coordinators.
pub trait SessionBoundary: Send + Sync {
    /// Runs a command and returns its reply.
    ///
    /// An error reply from the backend must be returned as
    /// [`BoundaryError::Rejected`], never as `Ok(Reply::Error { .. })`;
    /// [`into_result`] does that conversion.
    fn invoke(&self, command: Command) -> BoxFuture<'_, BoundaryResult<Reply>>;

    /// Starts delivering every emission on `stream` to `handler`.
    fn subscribe(
        &self,
        stream: EventStream,
        handler: EventHandler,
    ) -> BoxFuture<'_, BoundaryResult<Subscription>>;
}

/// Turns an error reply into a [`BoundaryError::Rejected`].
pub fn into_result(reply: Reply) -> BoundaryResult<Reply> {
    match reply {
        Reply::Error { error } => Err(error.into()),
        other => Ok(other),
    }
}

fn unexpected(command: &'static str, reply: &Reply) -> BoundaryError {
    BoundaryError::UnexpectedReply {
        command,
        reply: reply.kind(),
    }
}

fn expect_auth(command: &'static str, reply: Reply) -> BoundaryResult<AuthState> {
    match into_result(reply)? {
        Reply::Auth { state } => Ok(state.validate()?),
        other => Err(unexpected(command, &other)),
    }
}

fn expect_ok(command: &'static str, reply: Reply) -> BoundaryResult<()> {
    match into_result(reply)? {
        Reply::Ok => Ok(()),
        other => Err(unexpected(command, &other)),
    }
}

/// Typed accessors for every boundary command.
///
/// Implemented for every [`SessionBoundary`], including trait objects.
pub trait BoundaryExt: SessionBoundary {
    /// `check_auth`
    fn check_auth(&self) -> BoxFuture<'_, BoundaryResult<AuthState>> {
        Box::pin(async move { expect_auth("check_auth", self.invoke(Command::CheckAuth).await?) })
    }

    /// `get_auth_url`
    fn get_auth_url(&self) -> BoxFuture<'_, BoundaryResult<String>> {
        Box::pin(async move {
            match into_result(self.invoke(Command::GetAuthUrl).await?)? {
                Reply::AuthUrl { url } => Ok(url),
                other => Err(unexpected("get_auth_url", &other)),
            }
        })
    }

    /// `exchange_code { code }`
    fn exchange_code<'a>(&'a self, code: &'a str) -> BoxFuture<'a, BoundaryResult<AuthState>> {
        Box::pin(async move {
            expect_auth(
                "exchange_code",
                self.invoke(Command::exchange_code(code)).await?,
            )
        })
    }

    /// `refresh_token`
    fn refresh_token(&self) -> BoxFuture<'_, BoundaryResult<AuthState>> {
        Box::pin(async move {
            expect_auth("refresh_token", self.invoke(Command::RefreshToken).await?)
        })
    }

    /// `sign_out`
    fn sign_out(&self) -> BoxFuture<'_, BoundaryResult<()>> {
        Box::pin(async move { expect_ok("sign_out", self.invoke(Command::SignOut).await?) })
    }

    /// `upload_file { filePath, folderId }`
    fn upload_file<'a>(
        &'a self,
        file_path: &'a str,
        folder_id: Option<&'a str>,
    ) -> BoxFuture<'a, BoundaryResult<UploadResult>> {
        Box::pin(async move {
            let command = Command::upload_file(file_path, folder_id);
            match into_result(self.invoke(command).await?)? {
                Reply::Uploaded { result } => Ok(result),
                other => Err(unexpected("upload_file", &other)),
            }
        })
    }

    /// `get_oauth_config`
    fn get_oauth_config(&self) -> BoxFuture<'_, BoundaryResult<OAuthConfig>> {
        Box::pin(async move {
            match into_result(self.invoke(Command::GetOauthConfig).await?)? {
                Reply::OAuthConfig { config } => Ok(config),
                other => Err(unexpected("get_oauth_config", &other)),
            }
        })
    }

    /// `save_oauth_config { clientId, clientSecret }`
    fn save_oauth_config<'a>(
        &'a self,
        client_id: &'a str,
        client_secret: &'a str,
    ) -> BoxFuture<'a, BoundaryResult<()>> {
        Box::pin(async move {
            let command = Command::save_oauth_config(client_id, client_secret);
            expect_ok("save_oauth_config", self.invoke(command).await?)
        })
    }

    /// `clear_oauth_config`
    fn clear_oauth_config(&self) -> BoxFuture<'_, BoundaryResult<()>> {
        Box::pin(async move {
            expect_ok(
                "clear_oauth_config",
                self.invoke(Command::ClearOauthConfig).await?,
            )
        })
    }
}

impl<B: SessionBoundary + ?Sized> BoundaryExt for B {}
