use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tracing::debug;

type CancelAction = Box<dyn FnOnce() + Send>;

struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
    actions: Mutex<Vec<CancelAction>>,
}

/// Closes one stream connection.
///
/// Cancelling stops dispatch, detaches the handlers and wakes the read loop
/// so the connection is dropped. Clones share state; cancelling more than
/// once is harmless.
#[derive(Clone)]
pub struct CancelHandle {
    inner: Arc<Inner>,
}

impl CancelHandle {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
                actions: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Queue an action for the first `cancel`. Runs immediately if the
    /// handle is already cancelled.
    pub(crate) fn on_cancel(&self, action: impl FnOnce() + Send + 'static) {
        let mut actions = self.inner.actions.lock().unwrap_or_else(|p| p.into_inner());
        if !self.is_cancelled() {
            actions.push(Box::new(action));
            return;
        }
        drop(actions);
        action();
    }

    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Cancelling flow stream");
        let actions = std::mem::take(
            &mut *self
                .inner
                .actions
                .lock()
                .unwrap_or_else(|p| p.into_inner()),
        );
        for action in actions {
            action();
        }
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the handle is cancelled. Any number of clones may
    /// wait at the same time.
    pub(crate) async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel
            // cannot slip between the two.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
