//! Per-kind handler registry.
//!
//! An [`EventChannel`] maps an event kind to at most one handler. Emitting an
//! event with no registered handler is a silent no-op; the channel never
//! buffers. Handlers are invoked synchronously, outside the table lock, so a
//! handler may register, unregister or emit without deadlocking.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::events::Tagged;

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Slot<E> {
    id: u64,
    handler: Handler<E>,
}

type Table<E> = HashMap<<E as Tagged>::Kind, Slot<E>>;

/// Registry of one handler per event kind.
pub struct EventChannel<E: Tagged> {
    table: Arc<Mutex<Table<E>>>,
    next_id: AtomicU64,
}

impl<E: Tagged + 'static> EventChannel<E> {
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table<E>> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `handler` for `kind`, replacing any previous handler.
    ///
    /// The returned [`Unsubscribe`] only removes this registration; if the
    /// kind has since been re-registered, the newer handler stays.
    pub fn register<F>(&self, kind: E::Kind, handler: F) -> Unsubscribe
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(
            kind,
            Slot {
                id,
                handler: Arc::new(handler),
            },
        );

        let table: Weak<Mutex<Table<E>>> = Arc::downgrade(&self.table);
        Unsubscribe::new(move || {
            if let Some(table) = table.upgrade() {
                let mut table = table.lock().unwrap_or_else(|p| p.into_inner());
                if table.get(&kind).map(|slot| slot.id) == Some(id) {
                    table.remove(&kind);
                }
            }
        })
    }

    /// Invoke the handler registered for the event's kind, if any.
    ///
    /// Returns whether a handler was invoked.
    pub fn emit(&self, event: &E) -> bool {
        let handler = self.lock().get(&event.kind()).map(|slot| slot.handler.clone());
        match handler {
            Some(handler) => {
                handler(event);
                true
            }
            None => false,
        }
    }

    pub fn has_handler(&self, kind: E::Kind) -> bool {
        self.lock().contains_key(&kind)
    }

    pub fn handler_count(&self) -> usize {
        self.lock().len()
    }

    /// Drop every registration.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl<E: Tagged + 'static> Default for EventChannel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Tagged> fmt::Debug for EventChannel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<E::Kind> = self
            .table
            .lock()
            .map(|t| t.keys().copied().collect())
            .unwrap_or_default();
        f.debug_struct("EventChannel").field("kinds", &kinds).finish()
    }
}

/// Handle that removes one channel registration.
///
/// Calling it more than once is harmless. Dropping it does not unregister.
pub struct Unsubscribe {
    action: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Unsubscribe {
    pub(crate) fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            action: Mutex::new(Some(Box::new(action))),
        }
    }

    pub fn unsubscribe(&self) {
        let action = self
            .action
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(action) = action {
            action();
        }
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Unsubscribe")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, FlowEvent, FlowStartEvent};
    use std::sync::atomic::AtomicUsize;

    fn start() -> FlowEvent {
        FlowEvent::FlowStart(FlowStartEvent {
            meta: Default::default(),
        })
    }

    #[test]
    fn test_emit_without_handler_is_noop() {
        let channel: EventChannel<FlowEvent> = EventChannel::new();
        assert!(!channel.emit(&start()));
    }

    #[test]
    fn test_emit_invokes_registered_handler() {
        let channel: EventChannel<FlowEvent> = EventChannel::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        channel.register(EventKind::FlowStart, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(channel.emit(&start()));
        assert!(!channel.emit(&FlowEvent::failure("x")));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_register_replaces_previous_handler() {
        let channel: EventChannel<FlowEvent> = EventChannel::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let f = first.clone();
        let old = channel.register(EventKind::FlowStart, move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });
        let s = second.clone();
        channel.register(EventKind::FlowStart, move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });

        // Stale handle must not remove the newer registration
        old.unsubscribe();
        channel.emit(&start());

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let channel: EventChannel<FlowEvent> = EventChannel::new();
        let handle = channel.register(EventKind::FlowStart, |_| {});
        handle.unsubscribe();
        handle.unsubscribe();
        assert!(!channel.has_handler(EventKind::FlowStart));
    }

    #[test]
    fn test_handler_may_reenter_channel() {
        let channel: Arc<EventChannel<FlowEvent>> = Arc::new(EventChannel::new());
        let inner = channel.clone();
        channel.register(EventKind::FlowStart, move |_| {
            inner.register(EventKind::FlowFail, |_| {});
        });

        channel.emit(&start());
        assert!(channel.has_handler(EventKind::FlowFail));
    }

    #[test]
    fn test_clear_drops_all_handlers() {
        let channel: EventChannel<FlowEvent> = EventChannel::new();
        channel.register(EventKind::FlowStart, |_| {});
        channel.register(EventKind::FlowEnd, |_| {});
        assert_eq!(channel.handler_count(), 2);

        channel.clear();
        assert_eq!(channel.handler_count(), 0);
    }
}
