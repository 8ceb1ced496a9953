//! Upload coordinator.
//!
//! Tracks one file selection and its transfer. The backend reports progress
//! on the `upload-progress` stream while the `upload_file` command is in
//! flight; the coordinator holds a single subscription to that stream for
//! its whole lifetime and mirrors every event into
//! [`UploadSession::progress`].
//!
//! A transfer can outlive the selection it was started for: the user may
//! pick another file or reset the panel while the backend is still
//! sending. Every `select_file`, `reset` and accepted `upload` starts a new
//! generation, and results or progress from an older generation are
//! dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use driveup_core::{DocumentCategory, display_name};
use driveup_protocol::{Event, EventStream, UploadProgress, UploadResult};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::boundary::{BoundaryExt, EventHandler, SessionBoundary, Subscription};
use crate::error::{ClientError, ClientResult};

/// Error recorded when `upload()` runs without a selected file.
pub const NO_FILE_SELECTED: &str = "No file selected";

/// Recorded when an upload future is dropped before the backend answered.
const UPLOAD_ABANDONED: &str = "Upload was cancelled before it finished";

/// Where the current selection is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UploadStatus {
    #[default]
    Idle,
    Uploading,
    Succeeded,
    Failed,
}

/// The selected file and the state of its transfer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadSession {
    pub source_path: Option<String>,
    pub display_name: Option<String>,
    pub document_category: Option<DocumentCategory>,
    pub status: UploadStatus,
    pub progress: UploadProgress,
    pub result: Option<UploadResult>,
    pub last_error: Option<String>,
}

impl UploadSession {
    pub fn is_uploading(&self) -> bool {
        self.status == UploadStatus::Uploading
    }

    pub fn is_complete(&self) -> bool {
        self.status == UploadStatus::Succeeded
    }

    pub fn has_error(&self) -> bool {
        self.status == UploadStatus::Failed
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.status = UploadStatus::Failed;
        self.result = None;
        self.last_error = Some(message.into());
    }
}

/// State shared with the progress handler.
///
/// `generation` and `active` are only written inside a `send_modify` /
/// `send_if_modified` closure and only read there or under a `borrow()`, so
/// they change in lockstep with the published session.
struct Shared {
    state: watch::Sender<UploadSession>,
    /// Bumped by every selection, reset and accepted upload.
    generation: AtomicU64,
    /// Generation of the most recent accepted upload, 0 before the first.
    active: AtomicU64,
}

impl Shared {
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Relaxed) == generation
    }

    fn apply_progress(&self, progress: UploadProgress) {
        let applied = self.state.send_if_modified(|s| {
            let active = self.active.load(Ordering::Relaxed);
            if active == 0 || !self.is_current(active) {
                return false;
            }
            s.progress = progress;
            true
        });
        if !applied {
            debug!(
                bytes = progress.bytes_transferred,
                "dropping progress from a superseded upload"
            );
        }
    }
}

/// Sets the session to failed if an upload is abandoned mid-flight.
struct InFlight<'a> {
    shared: &'a Shared,
    generation: u64,
    resolved: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        let generation = self.generation;
        let shared = self.shared;
        shared.state.send_if_modified(|s| {
            if !shared.is_current(generation) {
                return false;
            }
            s.fail(UPLOAD_ABANDONED);
            true
        });
    }
}

enum Start {
    Begun { generation: u64, source_path: String },
    NoFile,
    Busy,
}

/// Drives file selection and upload, and owns the [`UploadSession`].
pub struct UploadCoordinator {
    boundary: Arc<dyn SessionBoundary>,
    shared: Arc<Shared>,
    subscription: Mutex<Option<Subscription>>,
}

impl UploadCoordinator {
    pub fn new(boundary: Arc<dyn SessionBoundary>) -> Self {
        Self {
            boundary,
            shared: Arc::new(Shared {
                state: watch::Sender::new(UploadSession::default()),
                generation: AtomicU64::new(0),
                active: AtomicU64::new(0),
            }),
            subscription: Mutex::new(None),
        }
    }

    /// Returns a copy of the current session.
    pub fn snapshot(&self) -> UploadSession {
        self.shared.state.borrow().clone()
    }

    /// Returns a receiver that observes every session change.
    pub fn subscribe(&self) -> watch::Receiver<UploadSession> {
        self.shared.state.subscribe()
    }

    pub fn status(&self) -> UploadStatus {
        self.shared.state.borrow().status
    }

    pub fn is_uploading(&self) -> bool {
        self.shared.state.borrow().is_uploading()
    }

    pub fn is_complete(&self) -> bool {
        self.shared.state.borrow().is_complete()
    }

    pub fn has_error(&self) -> bool {
        self.shared.state.borrow().has_error()
    }

    /// Selects `path` as the file to upload.
    ///
    /// Derives the display name and document category from the path and
    /// returns the session to `Idle`. Never touches the boundary.
    pub fn select_file(&self, path: &str) {
        let name = display_name(path).to_string();
        let category = DocumentCategory::from_path(path);
        debug!(file = %name, category = ?category, "file selected");

        self.shared.state.send_modify(|s| {
            self.shared.next_generation();
            *s = UploadSession {
                source_path: Some(path.to_string()),
                display_name: Some(name),
                document_category: category,
                ..UploadSession::default()
            };
        });
    }

    /// Uploads the selected file into `target_folder_id`, or the root
    /// folder when `None` or empty.
    ///
    /// The outcome of the transfer lands in the session, never in the
    /// returned result. The only error is [`ClientError::UploadInProgress`],
    /// returned without touching the session.
    pub async fn upload(&self, target_folder_id: Option<&str>) -> ClientResult<()> {
        if self.is_uploading() {
            return Err(ClientError::UploadInProgress);
        }

        let (has_file, observed) = {
            let session = self.shared.state.borrow();
            (
                session.source_path.is_some(),
                self.shared.generation.load(Ordering::Relaxed),
            )
        };
        if has_file {
            if let Err(e) = self.ensure_subscribed().await {
                warn!(error = %e, "could not subscribe to upload progress");
                let shared = &self.shared;
                shared.state.send_if_modified(|s| {
                    if !shared.is_current(observed) || s.is_uploading() {
                        return false;
                    }
                    s.fail(e.to_string());
                    true
                });
                return Ok(());
            }
        }

        let (generation, source_path) = match self.start() {
            Start::Begun {
                generation,
                source_path,
            } => (generation, source_path),
            Start::NoFile => {
                warn!("upload requested without a selected file");
                return Ok(());
            }
            Start::Busy => return Err(ClientError::UploadInProgress),
        };

        let mut in_flight = InFlight {
            shared: &*self.shared,
            generation,
            resolved: false,
        };

        info!(file = %source_path, folder = ?target_folder_id, "upload started");
        let outcome = self
            .boundary
            .upload_file(&source_path, target_folder_id)
            .await;
        in_flight.resolved = true;

        let shared = &self.shared;
        let applied = shared.state.send_if_modified(|s| {
            if !shared.is_current(generation) {
                return false;
            }
            match &outcome {
                Ok(result) => {
                    s.status = UploadStatus::Succeeded;
                    s.result = Some(result.clone());
                    s.last_error = None;
                }
                Err(e) => s.fail(e.to_string()),
            }
            true
        });

        match (&outcome, applied) {
            (_, false) => debug!(file = %source_path, "discarding result of a superseded upload"),
            (Ok(result), true) => info!(
                file = %source_path,
                remote_id = %result.remote_id,
                "upload finished"
            ),
            (Err(e), true) => warn!(file = %source_path, error = %e, "upload failed"),
        }

        Ok(())
    }

    /// Moves the session to `Uploading` if it may start, in one update.
    fn start(&self) -> Start {
        let shared = &self.shared;
        let mut start = Start::NoFile;
        shared.state.send_if_modified(|s| {
            let Some(source_path) = s.source_path.clone() else {
                s.fail(NO_FILE_SELECTED);
                return true;
            };
            if s.is_uploading() {
                start = Start::Busy;
                return false;
            }

            let generation = shared.next_generation();
            shared.active.store(generation, Ordering::Relaxed);
            s.status = UploadStatus::Uploading;
            s.progress = UploadProgress::default();
            s.result = None;
            s.last_error = None;
            start = Start::Begun {
                generation,
                source_path,
            };
            true
        });
        start
    }

    /// Returns the session to its initial empty form.
    ///
    /// A transfer still in flight keeps running on the backend but its
    /// result and progress are ignored. The progress subscription is kept.
    pub fn reset(&self) {
        self.shared.state.send_modify(|s| {
            self.shared.next_generation();
            *s = UploadSession::default();
        });
        debug!("upload session reset");
    }

    /// Subscribes to upload progress unless a live subscription already
    /// exists. A subscription whose stream was closed by the backend is
    /// replaced.
    pub async fn ensure_subscribed(&self) -> ClientResult<()> {
        let mut slot = self.subscription.lock().await;
        if slot.as_ref().is_some_and(Subscription::is_active) {
            return Ok(());
        }
        if slot.take().is_some() {
            debug!("progress stream ended, subscribing again");
        }

        let subscription = self
            .boundary
            .subscribe(EventStream::UploadProgress, progress_handler(&self.shared))
            .await?;
        debug!(stream = %subscription.stream(), "progress subscription established");
        *slot = Some(subscription);
        Ok(())
    }

    /// Returns `true` while a progress subscription is held and still live.
    pub async fn is_subscribed(&self) -> bool {
        self.subscription
            .lock()
            .await
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// Releases the progress subscription. Safe to call more than once.
    pub async fn teardown(&self) {
        if let Some(subscription) = self.subscription.lock().await.take() {
            subscription.unsubscribe();
            debug!("progress subscription released");
        }
    }
}

fn progress_handler(shared: &Arc<Shared>) -> EventHandler {
    let shared = Arc::clone(shared);
    Arc::new(move |event: Event| match event {
        Event::UploadProgress(progress) => shared.apply_progress(progress),
    })
}
