//! In-flight bookkeeping shared by the coordinators.

use tokio::sync::watch;

/// State that tracks how many operations are in flight.
pub(crate) trait TracksPending {
    /// Marks one more operation in flight and clears the previous error.
    fn enter(&mut self);

    /// Marks one operation as finished.
    fn exit(&mut self);
}

/// Keeps `pending` raised for as long as an operation runs.
///
/// The operation's outcome and the `exit` are published in a single
/// update via [`finish`](PendingGuard::finish). If the operation future is
/// dropped first, the guard still performs the `exit`.
pub(crate) struct PendingGuard<'a, S: TracksPending> {
    state: &'a watch::Sender<S>,
    finished: bool,
}

impl<'a, S: TracksPending> PendingGuard<'a, S> {
    pub(crate) fn enter(state: &'a watch::Sender<S>) -> Self {
        state.send_modify(S::enter);
        Self {
            state,
            finished: false,
        }
    }

    pub(crate) fn finish(mut self, apply: impl FnOnce(&mut S)) {
        self.finished = true;
        self.state.send_modify(|s| {
            apply(s);
            s.exit();
        });
    }
}

impl<S: TracksPending> Drop for PendingGuard<'_, S> {
    fn drop(&mut self) {
        if !self.finished {
            self.state.send_modify(S::exit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Counter {
        in_flight: u32,
        error: Option<String>,
        value: u32,
    }

    impl TracksPending for Counter {
        fn enter(&mut self) {
            self.in_flight += 1;
            self.error = None;
        }

        fn exit(&mut self) {
            self.in_flight = self.in_flight.saturating_sub(1);
        }
    }

    #[test]
    fn finish_applies_and_exits_together() {
        let (tx, mut rx) = watch::channel(Counter {
            error: Some("old".into()),
            ..Default::default()
        });

        let guard = PendingGuard::enter(&tx);
        assert_eq!(tx.borrow().in_flight, 1);
        assert!(tx.borrow().error.is_none());
        rx.mark_unchanged();

        guard.finish(|s| s.value = 7);
        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update();
        assert_eq!(state.in_flight, 0);
        assert_eq!(state.value, 7);
    }

    #[test]
    fn dropped_guard_still_exits() {
        let (tx, _rx) = watch::channel(Counter::default());

        let outer = PendingGuard::enter(&tx);
        {
            let _inner = PendingGuard::enter(&tx);
            assert_eq!(tx.borrow().in_flight, 2);
        }
        assert_eq!(tx.borrow().in_flight, 1);

        drop(outer);
        assert_eq!(tx.borrow().in_flight, 0);
    }
}
