//! Scripted in-memory boundary for coordinator tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use driveup_protocol::{Command, ErrorCode, Event, EventStream, Reply};
use tokio::sync::oneshot;

use crate::boundary::{
    BoxFuture, EventHandler, SessionBoundary, StreamEnd, Subscription, into_result,
};
use crate::error::{BoundaryError, BoundaryResult};

enum Scripted {
    Ready(BoundaryResult<Reply>),
    Deferred(oneshot::Receiver<BoundaryResult<Reply>>),
}

struct Handler {
    id: u64,
    stream: EventStream,
    handler: EventHandler,
    end: StreamEnd,
}

/// Answers commands from a queue and lets tests emit events by hand.
#[derive(Default)]
pub(crate) struct ScriptedBoundary {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<Command>>,
    handlers: Arc<Mutex<Vec<Handler>>>,
    next_handler: AtomicU64,
    subscribe_calls: AtomicU64,
    fail_subscribe: Mutex<Option<String>>,
    deferred_subscribe: Mutex<Option<oneshot::Receiver<Option<String>>>>,
}

impl ScriptedBoundary {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues a reply for the next command.
    pub(crate) fn push_reply(&self, reply: Reply) {
        self.push(Scripted::Ready(into_result(reply)));
    }

    /// Queues a backend rejection for the next command.
    pub(crate) fn push_rejection(&self, message: &str) {
        self.push(Scripted::Ready(Err(BoundaryError::rejected(
            ErrorCode::InternalError,
            message,
        ))));
    }

    /// Queues a reply the test resolves later through the returned sender.
    pub(crate) fn push_deferred(&self) -> oneshot::Sender<BoundaryResult<Reply>> {
        let (tx, rx) = oneshot::channel();
        self.push(Scripted::Deferred(rx));
        tx
    }

    /// Makes the next subscription attempt fail with `message`.
    pub(crate) fn fail_next_subscribe(&self, message: &str) {
        *self.fail_subscribe.lock().unwrap() = Some(message.to_string());
    }

    /// Holds the next subscription attempt until the returned sender fires.
    /// Sending `Some(message)` makes it fail with that message.
    pub(crate) fn defer_next_subscribe(&self) -> oneshot::Sender<Option<String>> {
        let (tx, rx) = oneshot::channel();
        *self.deferred_subscribe.lock().unwrap() = Some(rx);
        tx
    }

    /// Ends every open stream from the backend's side, as when the backend
    /// process goes away.
    pub(crate) fn close_streams(&self) {
        for held in self.handlers.lock().unwrap().drain(..) {
            held.end.close();
        }
    }

    fn push(&self, scripted: Scripted) {
        self.script.lock().unwrap().push_back(scripted);
    }

    /// Commands invoked so far, oldest first.
    pub(crate) fn calls(&self) -> Vec<Command> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of subscriptions currently held by callers.
    pub(crate) fn active_subscriptions(&self) -> usize {
        self.handlers.lock().unwrap().len()
    }

    /// Number of times `subscribe` was called.
    pub(crate) fn subscribe_calls(&self) -> u64 {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Delivers `event` to every handler subscribed to its stream.
    pub(crate) fn emit(&self, event: Event) {
        let handlers: Vec<EventHandler> = self
            .handlers
            .lock()
            .unwrap()
            .iter()
            .filter(|held| held.stream == event.stream())
            .map(|held| held.handler.clone())
            .collect();
        for handler in handlers {
            handler(event.clone());
        }
    }
}

impl SessionBoundary for ScriptedBoundary {
    fn invoke(&self, command: Command) -> BoxFuture<'_, BoundaryResult<Reply>> {
        self.calls.lock().unwrap().push(command);
        let next = self.script.lock().unwrap().pop_front();
        Box::pin(async move {
            match next {
                Some(Scripted::Ready(result)) => result,
                Some(Scripted::Deferred(rx)) => rx
                    .await
                    .unwrap_or_else(|_| Err(BoundaryError::Connection("reply dropped".into()))),
                None => Err(BoundaryError::Connection("no scripted reply".into())),
            }
        })
    }

    fn subscribe(
        &self,
        stream: EventStream,
        handler: EventHandler,
    ) -> BoxFuture<'_, BoundaryResult<Subscription>> {
        Box::pin(async move {
            self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
            let deferred = self.deferred_subscribe.lock().unwrap().take();
            if let Some(rx) = deferred {
                if let Ok(Some(message)) = rx.await {
                    return Err(BoundaryError::rejected(ErrorCode::UnknownStream, message));
                }
            }
            if let Some(message) = self.fail_subscribe.lock().unwrap().take() {
                return Err(BoundaryError::rejected(ErrorCode::UnknownStream, message));
            }

            let id = self.next_handler.fetch_add(1, Ordering::SeqCst);
            let end = StreamEnd::new();
            self.handlers.lock().unwrap().push(Handler {
                id,
                stream,
                handler,
                end: end.clone(),
            });

            let handlers = Arc::clone(&self.handlers);
            Ok(Subscription::new(stream, move || {
                handlers.lock().unwrap().retain(|held| held.id != id);
            })
            .with_end(end))
        })
    }
}
