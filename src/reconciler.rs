//! Ordering of resume backlog and live events.
//!
//! A stream may deliver, once and at its start, a resume snapshot of events
//! the client missed before it attached. Live events can arrive before that
//! snapshot has been processed. The reconciler guarantees that handlers see
//! the snapshot first, then the live events in arrival order, then every
//! later event immediately, and that nothing is dispatched after the first
//! terminal event.
//!
//! ```text
//!  AwaitingResume ──resume──▶ DispatchingBacklog ──queues empty──▶ SteadyState
//!        │                           │                                 │
//!        └───────────────────────────┴──────── terminal event ─────────┴──▶ Closed
//! ```
//!
//! Draining is guarded against re-entrance: if dispatching one event causes
//! another to arrive on the same call stack, the new event is queued and the
//! outer drain loop picks it up in order.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::channel::EventChannel;
use crate::events::{FlowEvent, Tagged};
use crate::protocol::Classified;

/// Whether a connection starts by waiting for a resume snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumeMode {
    /// Buffer live events until the resume snapshot (or end of stream).
    #[default]
    AwaitSnapshot,
    /// Dispatch live events as they arrive; a later snapshot is still honored.
    Immediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilerState {
    AwaitingResume,
    DispatchingBacklog,
    SteadyState,
    /// A terminal event was dispatched or the connection was closed.
    Closed,
}

#[derive(Debug)]
struct Queues {
    state: ReconcilerState,
    missed: VecDeque<FlowEvent>,
    live: VecDeque<FlowEvent>,
    draining: bool,
    resumed: bool,
}

impl Queues {
    fn close(&mut self) {
        self.state = ReconcilerState::Closed;
        self.missed.clear();
        self.live.clear();
    }
}

type CloseHook = Box<dyn FnOnce() + Send>;

/// Buffers and orders events for one connection, dispatching them into an
/// [`EventChannel`].
pub struct EventReconciler {
    queues: Mutex<Queues>,
    channel: Arc<EventChannel<FlowEvent>>,
    close_hook: Mutex<Option<CloseHook>>,
    dispatched: AtomicU64,
}

impl EventReconciler {
    pub fn new(channel: Arc<EventChannel<FlowEvent>>, mode: ResumeMode) -> Self {
        let state = match mode {
            ResumeMode::AwaitSnapshot => ReconcilerState::AwaitingResume,
            ResumeMode::Immediate => ReconcilerState::SteadyState,
        };
        Self {
            queues: Mutex::new(Queues {
                state,
                missed: VecDeque::new(),
                live: VecDeque::new(),
                draining: false,
                resumed: false,
            }),
            channel,
            close_hook: Mutex::new(None),
            dispatched: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Install the action run right after a terminal event is dispatched.
    ///
    /// The transport uses it to close the stream and detach listeners.
    pub fn set_close_hook(&self, hook: impl FnOnce() + Send + 'static) {
        *self.close_hook.lock().unwrap_or_else(|p| p.into_inner()) = Some(Box::new(hook));
    }

    pub fn state(&self) -> ReconcilerState {
        self.lock().state
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ReconcilerState::Closed
    }

    /// Number of events handed to the channel so far.
    pub fn dispatched_count(&self) -> u64 {
        self.dispatched.load(Ordering::SeqCst)
    }

    /// Events currently buffered (missed + live).
    pub fn pending_count(&self) -> usize {
        let queues = self.lock();
        queues.missed.len() + queues.live.len()
    }

    /// Route a classified stream message.
    pub fn accept(&self, message: Classified) {
        match message {
            Classified::Live(event) => self.push_live(event),
            Classified::Resume(events) => self.push_resume(events),
        }
    }

    /// Accept an event pushed live by the server.
    pub fn push_live(&self, event: FlowEvent) {
        {
            let mut queues = self.lock();
            match queues.state {
                ReconcilerState::Closed => {
                    debug!(kind = %event.kind(), "Dropping event received after close");
                    return;
                }
                ReconcilerState::AwaitingResume => {
                    queues.live.push_back(event);
                    return;
                }
                ReconcilerState::DispatchingBacklog | ReconcilerState::SteadyState => {
                    queues.live.push_back(event);
                }
            }
        }
        self.drain();
    }

    /// Accept the resume snapshot. Only the first snapshot of a connection
    /// is honored.
    pub fn push_resume(&self, events: Vec<FlowEvent>) {
        {
            let mut queues = self.lock();
            if queues.state == ReconcilerState::Closed {
                return;
            }
            if queues.resumed {
                warn!("Ignoring duplicate resume snapshot");
                return;
            }
            queues.resumed = true;
            debug!(
                missed = events.len(),
                buffered = queues.live.len(),
                "Processing resume snapshot"
            );
            queues.missed.extend(events);
            queues.state = ReconcilerState::DispatchingBacklog;
        }
        self.drain();
    }

    /// The stream ended or broke.
    ///
    /// If no snapshot arrived, whatever was buffered is flushed as if an
    /// empty snapshot had been received.
    pub fn end_of_stream(&self) {
        let awaiting = self.state() == ReconcilerState::AwaitingResume;
        if awaiting {
            debug!("Stream ended before a resume snapshot; flushing buffered events");
            self.push_resume(Vec::new());
        }
    }

    /// Stop dispatching and discard buffered events. Does not run the close
    /// hook.
    pub fn close(&self) {
        self.lock().close();
    }

    fn drain(&self) {
        {
            let mut queues = self.lock();
            if queues.draining {
                return;
            }
            queues.draining = true;
        }

        loop {
            let next = {
                let mut queues = self.lock();
                if queues.state == ReconcilerState::Closed {
                    queues.draining = false;
                    return;
                }
                match queues.missed.pop_front().or_else(|| queues.live.pop_front()) {
                    Some(event) => {
                        if event.is_terminal() {
                            // Close before dispatching so events arriving from
                            // inside the terminal handler are dropped.
                            queues.close();
                            queues.draining = false;
                        }
                        event
                    }
                    None => {
                        if queues.state == ReconcilerState::DispatchingBacklog {
                            queues.state = ReconcilerState::SteadyState;
                        }
                        queues.draining = false;
                        return;
                    }
                }
            };

            let terminal = next.is_terminal();
            self.dispatch(&next);

            if terminal {
                let hook = self.close_hook.lock().unwrap_or_else(|p| p.into_inner()).take();
                if let Some(hook) = hook {
                    hook();
                }
                return;
            }
        }
    }

    fn dispatch(&self, event: &FlowEvent) {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        debug!(kind = %event.kind(), "Dispatching flow event");
        self.channel.emit(event);
    }
}

impl fmt::Debug for EventReconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queues = self.lock();
        f.debug_struct("EventReconciler")
            .field("state", &queues.state)
            .field("missed", &queues.missed.len())
            .field("live", &queues.live.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{
        EventKind, EventMeta, FlowEndEvent, FlowResult, FlowResultFragment, FlowStartEvent,
        FlowValueType, NodeLogEvent,
    };
    use std::sync::atomic::AtomicBool;

    fn log(message: &str) -> FlowEvent {
        FlowEvent::NodeLog(NodeLogEvent {
            meta: EventMeta::default(),
            node_id: "n".to_string(),
            message: message.to_string(),
        })
    }

    fn fragment(value: &str) -> FlowEvent {
        FlowEvent::FlowResultFragment(FlowResultFragment {
            meta: EventMeta::default(),
            node_id: "n".to_string(),
            field_name: "result".to_string(),
            value: value.to_string(),
            value_type: FlowValueType::Text,
        })
    }

    fn end() -> FlowEvent {
        FlowEvent::FlowEnd(FlowEndEvent {
            meta: EventMeta::default(),
            result: FlowResult::new(),
        })
    }

    /// Record every dispatched event as a label, in order.
    fn recording_channel() -> (Arc<EventChannel<FlowEvent>>, Arc<Mutex<Vec<String>>>) {
        let channel = Arc::new(EventChannel::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        for kind in EventKind::ALL {
            let seen = seen.clone();
            channel.register(kind, move |event: &FlowEvent| {
                let label = match event {
                    FlowEvent::NodeLog(e) => e.message.clone(),
                    FlowEvent::FlowResultFragment(e) => e.value.clone(),
                    other => other.kind().to_string(),
                };
                seen.lock().unwrap().push(label);
            });
        }
        (channel, seen)
    }

    fn labels(seen: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        seen.lock().unwrap().clone()
    }

    #[test]
    fn test_live_events_wait_for_resume() {
        let (channel, seen) = recording_channel();
        let reconciler = EventReconciler::new(channel, ResumeMode::AwaitSnapshot);

        reconciler.push_live(log("live-0"));
        reconciler.push_live(log("live-1"));
        assert!(labels(&seen).is_empty());
        assert_eq!(reconciler.pending_count(), 2);
        assert_eq!(reconciler.state(), ReconcilerState::AwaitingResume);

        reconciler.push_resume(vec![log("missed-0"), log("missed-1"), log("missed-2")]);

        assert_eq!(
            labels(&seen),
            vec!["missed-0", "missed-1", "missed-2", "live-0", "live-1"]
        );
        assert_eq!(reconciler.state(), ReconcilerState::SteadyState);
        assert_eq!(reconciler.pending_count(), 0);
    }

    #[test]
    fn test_order_holds_for_any_split() {
        for missed_count in 0..4 {
            for live_count in 0..4 {
                let (channel, seen) = recording_channel();
                let reconciler = EventReconciler::new(channel, ResumeMode::AwaitSnapshot);

                let live: Vec<String> = (0..live_count).map(|i| format!("l{}", i)).collect();
                let missed: Vec<String> = (0..missed_count).map(|i| format!("m{}", i)).collect();

                for label in &live {
                    reconciler.push_live(log(label));
                }
                reconciler.push_resume(missed.iter().map(|l| log(l)).collect());

                let expected: Vec<String> = missed.iter().chain(live.iter()).cloned().collect();
                assert_eq!(labels(&seen), expected);
            }
        }
    }

    #[test]
    fn test_steady_state_dispatches_immediately() {
        let (channel, seen) = recording_channel();
        let reconciler = EventReconciler::new(channel, ResumeMode::AwaitSnapshot);
        reconciler.push_resume(Vec::new());

        reconciler.push_live(log("a"));
        assert_eq!(labels(&seen), vec!["a"]);
        reconciler.push_live(log("b"));
        assert_eq!(labels(&seen), vec!["a", "b"]);
    }

    #[test]
    fn test_immediate_mode_skips_waiting() {
        let (channel, seen) = recording_channel();
        let reconciler = EventReconciler::new(channel, ResumeMode::Immediate);

        reconciler.push_live(log("a"));
        assert_eq!(labels(&seen), vec!["a"]);
        assert_eq!(reconciler.state(), ReconcilerState::SteadyState);
    }

    #[test]
    fn test_duplicate_resume_is_ignored() {
        let (channel, seen) = recording_channel();
        let reconciler = EventReconciler::new(channel, ResumeMode::AwaitSnapshot);

        reconciler.push_resume(vec![fragment("Jo")]);
        reconciler.push_resume(vec![fragment("Jo")]);

        assert_eq!(labels(&seen), vec!["Jo"]);
    }

    #[test]
    fn test_end_of_stream_flushes_buffer() {
        let (channel, seen) = recording_channel();
        let reconciler = EventReconciler::new(channel, ResumeMode::AwaitSnapshot);

        reconciler.push_live(log("a"));
        reconciler.end_of_stream();

        assert_eq!(labels(&seen), vec!["a"]);
        assert_eq!(reconciler.state(), ReconcilerState::SteadyState);
    }

    #[test]
    fn test_nothing_dispatched_after_terminal() {
        let (channel, seen) = recording_channel();
        let reconciler = EventReconciler::new(channel, ResumeMode::AwaitSnapshot);

        reconciler.push_live(log("before"));
        reconciler.push_live(end());
        reconciler.push_live(log("after-end-buffered"));
        reconciler.push_resume(vec![log("missed")]);
        reconciler.push_live(log("after-close"));
        reconciler.push_live(FlowEvent::failure("late"));

        assert_eq!(labels(&seen), vec!["missed", "before", "flow-end"]);
        assert!(reconciler.is_closed());
        assert_eq!(reconciler.pending_count(), 0);
    }

    #[test]
    fn test_terminal_runs_close_hook_once() {
        let (channel, _seen) = recording_channel();
        let reconciler = EventReconciler::new(channel, ResumeMode::Immediate);
        let closed = Arc::new(AtomicU64::new(0));
        let c = closed.clone();
        reconciler.set_close_hook(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        reconciler.push_live(FlowEvent::failure("boom"));
        reconciler.push_live(end());

        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert_eq!(reconciler.dispatched_count(), 1);
    }

    #[test]
    fn test_reentrant_arrival_is_queued_not_interleaved() {
        let channel: Arc<EventChannel<FlowEvent>> = Arc::new(EventChannel::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let reconciler = Arc::new(EventReconciler::new(
            channel.clone(),
            ResumeMode::AwaitSnapshot,
        ));

        let fired = Arc::new(AtomicBool::new(false));
        {
            let seen = seen.clone();
            let reconciler = Arc::downgrade(&reconciler);
            let fired = fired.clone();
            channel.register(EventKind::NodeLog, move |event: &FlowEvent| {
                if let FlowEvent::NodeLog(e) = event {
                    seen.lock().unwrap().push(e.message.clone());
                }
                // The first dispatched event synchronously causes a new arrival
                if !fired.swap(true, Ordering::SeqCst) {
                    if let Some(reconciler) = reconciler.upgrade() {
                        reconciler.push_live(log("reentrant"));
                    }
                }
            });
        }

        reconciler.push_live(log("live-0"));
        reconciler.push_resume(vec![log("missed-0"), log("missed-1")]);

        assert_eq!(
            labels(&seen),
            vec!["missed-0", "missed-1", "live-0", "reentrant"]
        );
    }

    #[test]
    fn test_events_inside_terminal_handler_are_dropped() {
        let channel: Arc<EventChannel<FlowEvent>> = Arc::new(EventChannel::new());
        let reconciler = Arc::new(EventReconciler::new(channel.clone(), ResumeMode::Immediate));
        let later = Arc::new(AtomicU64::new(0));

        {
            let reconciler = Arc::downgrade(&reconciler);
            channel.register(EventKind::FlowEnd, move |_| {
                if let Some(reconciler) = reconciler.upgrade() {
                    reconciler.push_live(log("too-late"));
                }
            });
            let later = later.clone();
            channel.register(EventKind::NodeLog, move |_| {
                later.fetch_add(1, Ordering::SeqCst);
            });
        }

        reconciler.push_live(end());
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_close_discards_buffer() {
        let (channel, seen) = recording_channel();
        let reconciler = EventReconciler::new(channel, ResumeMode::AwaitSnapshot);
        reconciler.push_live(log("a"));
        reconciler.close();
        reconciler.push_resume(vec![FlowEvent::FlowStart(FlowStartEvent {
            meta: EventMeta::default(),
        })]);

        assert!(labels(&seen).is_empty());
        assert!(reconciler.is_closed());
    }
}
