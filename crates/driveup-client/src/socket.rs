//! Unix socket transport to the driveup backend.
//!
//! Each command opens its own connection, sends one framed
//! [`Request::Invoke`] and reads one framed reply. A subscription keeps its
//! connection open: after the `subscribed` acknowledgement, every frame the
//! backend writes is an event for that stream, read on a background task
//! until the [`Subscription`] is dropped or the backend closes the
//! connection. A frame that does not decode is logged and skipped.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, warn};
use uuid::Uuid;

use driveup_protocol::{
    Command, Envelope, EventStream, LENGTH_PREFIX_SIZE, ProtocolError, Reply, Request,
    decode_payload, encode_message, payload_len,
};

use crate::boundary::{
    BoxFuture, EventHandler, SessionBoundary, StreamEnd, Subscription, into_result,
};
use crate::config::ClientConfig;
use crate::error::{BoundaryError, BoundaryResult};

/// [`SessionBoundary`] over the backend's Unix socket.
#[derive(Debug, Clone)]
pub struct SocketBoundary {
    socket_path: PathBuf,
    timeout: Duration,
    upload_timeout: Option<Duration>,
}

impl SocketBoundary {
    /// Creates a new socket boundary. Uploads wait without a reply timeout
    /// unless [`with_upload_timeout`](Self::with_upload_timeout) sets one.
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
            upload_timeout: None,
        }
    }

    /// Creates a socket boundary from the `[server]` settings.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.socket_path(), config.timeout())
            .with_upload_timeout(config.upload_timeout())
    }

    #[must_use]
    pub fn with_upload_timeout(mut self, upload_timeout: Option<Duration>) -> Self {
        self.upload_timeout = upload_timeout;
        self
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Checks if the backend socket exists.
    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Pings the backend to check if it's alive.
    pub async fn ping(&self) -> bool {
        matches!(
            self.send(Request::Ping, Some(self.timeout)).await,
            Ok(Reply::Pong)
        )
    }

    fn reply_timeout(&self, command: &Command) -> Option<Duration> {
        if command.is_long_running() {
            self.upload_timeout
        } else {
            Some(self.timeout)
        }
    }

    async fn connect(&self) -> BoundaryResult<UnixStream> {
        debug!(socket = %self.socket_path.display(), "connecting to backend");

        tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| {
                BoundaryError::Timeout(format!(
                    "connection timed out after {:?}",
                    self.timeout
                ))
            })?
            .map_err(|e| {
                BoundaryError::Connection(format!(
                    "failed to connect to {}: {}",
                    self.socket_path.display(),
                    e
                ))
            })
    }

    /// Sends one request on a fresh connection and waits for its reply.
    async fn send(
        &self,
        request: Request,
        reply_timeout: Option<Duration>,
    ) -> BoundaryResult<Reply> {
        let mut stream = self.connect().await?;
        let request_id = Uuid::new_v4().to_string();
        let envelope = Envelope::new(&request_id, request);

        with_timeout(
            Some(self.timeout),
            "sending request",
            write_envelope(&mut stream, &envelope),
        )
        .await?;

        debug!(request_id = %request_id, "request sent, waiting for reply");

        let reply = with_timeout(reply_timeout, "reading reply", read_envelope(&mut stream))
            .await?
            .ok_or_else(|| {
                BoundaryError::Connection("backend closed the connection before replying".into())
            })?;
        check_envelope(&reply, &request_id)?;

        debug!(request_id = %request_id, reply = reply.payload.kind(), "reply received");
        Ok(reply.payload)
    }
}

impl SessionBoundary for SocketBoundary {
    fn invoke(&self, command: Command) -> BoxFuture<'_, BoundaryResult<Reply>> {
        Box::pin(async move {
            let name = command.name();
            let reply_timeout = self.reply_timeout(&command);
            debug!(command = name, "invoking backend command");

            let reply = self.send(Request::invoke(command), reply_timeout).await?;
            into_result(reply).inspect_err(|e| debug!(command = name, error = %e, "command failed"))
        })
    }

    fn subscribe(
        &self,
        stream: EventStream,
        handler: EventHandler,
    ) -> BoxFuture<'_, BoundaryResult<Subscription>> {
        Box::pin(async move {
            let mut conn = self.connect().await?;
            let request_id = Uuid::new_v4().to_string();
            let envelope = Envelope::new(&request_id, Request::subscribe(stream));

            with_timeout(
                Some(self.timeout),
                "sending subscription",
                write_envelope(&mut conn, &envelope),
            )
            .await?;

            let ack = with_timeout(
                Some(self.timeout),
                "waiting for subscription",
                read_envelope(&mut conn),
            )
            .await?
            .ok_or_else(|| {
                BoundaryError::Connection("backend closed the stream before acknowledging".into())
            })?;
            check_envelope(&ack, &request_id)?;

            match into_result(ack.payload)? {
                Reply::Subscribed { stream: acked } if acked == stream => {}
                other => {
                    return Err(BoundaryError::UnexpectedReply {
                        command: "subscribe",
                        reply: other.kind(),
                    });
                }
            }

            debug!(stream = %stream, "subscribed to backend events");

            let end = StreamEnd::new();
            let closed = end.clone();
            let task = tokio::spawn(async move {
                loop {
                    let frame = match read_frame(&mut conn).await {
                        Ok(Some(frame)) => frame,
                        Ok(None) => {
                            debug!(stream = %stream, "backend closed event stream");
                            break;
                        }
                        Err(e) => {
                            warn!(stream = %stream, error = %e, "event stream failed");
                            break;
                        }
                    };
                    match decode_payload::<Envelope<Reply>>(&frame) {
                        Ok(envelope) => match envelope.payload {
                            Reply::Event { event } if event.stream() == stream => handler(event),
                            other => warn!(
                                stream = %stream,
                                reply = other.kind(),
                                "ignoring non-event frame on event stream"
                            ),
                        },
                        Err(e) => warn!(
                            stream = %stream,
                            error = %e,
                            "skipping undecodable frame on event stream"
                        ),
                    }
                }
                closed.close();
            });

            Ok(Subscription::new(stream, move || {
                debug!(stream = %stream, "unsubscribing from backend events");
                task.abort();
            })
            .with_end(end))
        })
    }
}

fn check_envelope(envelope: &Envelope<Reply>, request_id: &str) -> BoundaryResult<()> {
    if !envelope.is_compatible() {
        return Err(ProtocolError::UnsupportedVersion(envelope.protocol_version.clone()).into());
    }

    if envelope.request_id != request_id {
        warn!(
            expected = %request_id,
            received = %envelope.request_id,
            "reply request_id mismatch"
        );
    }

    Ok(())
}

async fn with_timeout<T>(
    limit: Option<Duration>,
    what: &str,
    fut: impl Future<Output = BoundaryResult<T>>,
) -> BoundaryResult<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| BoundaryError::Timeout(format!("{} after {:?}", what, limit)))?,
        None => fut.await,
    }
}

async fn write_envelope<W: AsyncWrite + Unpin>(
    writer: &mut W,
    envelope: &Envelope<Request>,
) -> BoundaryResult<()> {
    let bytes = encode_message(envelope)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one framed reply, or `None` if the peer closed the connection.
async fn read_envelope<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> BoundaryResult<Option<Envelope<Reply>>> {
    match read_frame(reader).await? {
        Some(payload) => Ok(Some(decode_payload(&payload)?)),
        None => Ok(None),
    }
}

/// Reads one length-prefixed payload without decoding it.
async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> BoundaryResult<Option<Vec<u8>>> {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = payload_len(prefix)?;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    Ok(Some(payload))
}
