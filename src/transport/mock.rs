//! Offline transport.
//!
//! Streams a canned answer into the `result` field a few characters at a
//! time, the way a language model would, without touching the network.
//! Useful for demos and for building a UI before a flow exists.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{CancelHandle, EventCallback, FlowTransport, TriggerOutcome};
use crate::channel::{EventChannel, Unsubscribe};
use crate::error::{ListenError, TriggerFlowError};
use crate::events::{
    EventKind, EventMeta, FlowEndEvent, FlowEvent, FlowResult, FlowResultFragment,
    FlowStartEvent, FlowValueType, SessionId, TriggerId,
};
use crate::reconciler::{EventReconciler, ResumeMode};

pub const MOCK_FIELD: &str = "result";

const MOCK_TEXT: &str = "Hello! I am your AI assistant. I'm here to help you with a variety of \
tasks. Whether you need assistance with coding, writing, or just need someone to talk to, I'm \
here for you. Let's get started!\n\n\
I can draft emails, write reports and explain code. If you're stuck on a bug, just let me know \
and we will work through it together.\n\n\
So, what can I help you with today?";

/// Chunk sizes cycle through 2, 3 and 4 characters.
const CHUNK_SIZES: [usize; 3] = [2, 3, 4];

pub struct MockFlowTransport {
    text: String,
    min_delay: Duration,
    max_delay: Duration,
    channel: Arc<EventChannel<FlowEvent>>,
    cancel: Mutex<Option<CancelHandle>>,
    triggers: AtomicUsize,
}

impl MockFlowTransport {
    pub fn new() -> Self {
        Self {
            text: MOCK_TEXT.to_string(),
            min_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(100),
            channel: Arc::new(EventChannel::new()),
            cancel: Mutex::new(None),
            triggers: AtomicUsize::new(0),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Pause between fragments, spread over `min..=max`.
    pub fn with_delay(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min;
        self.max_delay = max.max(min);
        self
    }

    /// Number of times `trigger_flow` was called.
    pub fn trigger_count(&self) -> usize {
        self.triggers.load(Ordering::SeqCst)
    }

    fn script(&self, trigger_id: &TriggerId) -> Vec<FlowEvent> {
        let meta = EventMeta {
            workflow_id: Some("mock".to_string()),
            trigger_id: Some(trigger_id.to_string()),
            session_id: None,
        };

        let chars: Vec<char> = self.text.chars().collect();
        let mut events = vec![FlowEvent::FlowStart(FlowStartEvent { meta: meta.clone() })];
        let mut index = 0;
        let mut step = 0;
        while index < chars.len() {
            let end = (index + CHUNK_SIZES[step % CHUNK_SIZES.len()]).min(chars.len());
            events.push(FlowEvent::FlowResultFragment(FlowResultFragment {
                meta: meta.clone(),
                node_id: "mock".to_string(),
                field_name: MOCK_FIELD.to_string(),
                value: chars[index..end].iter().collect(),
                value_type: FlowValueType::Text,
            }));
            index = end;
            step += 1;
        }
        events.push(FlowEvent::FlowEnd(FlowEndEvent {
            meta,
            result: FlowResult::new(),
        }));
        events
    }

    fn delay(&self, step: usize) -> Duration {
        let span = self.max_delay.saturating_sub(self.min_delay).as_millis() as u64;
        let jitter = if span == 0 {
            0
        } else {
            (step as u64 * 37) % (span + 1)
        };
        self.min_delay + Duration::from_millis(jitter)
    }
}

impl Default for MockFlowTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FlowTransport for MockFlowTransport {
    async fn trigger_flow(
        &self,
        _trigger_id: &TriggerId,
        session_id: Option<&SessionId>,
    ) -> Result<TriggerOutcome, TriggerFlowError> {
        self.triggers.fetch_add(1, Ordering::SeqCst);
        Ok(TriggerOutcome {
            session_id: session_id.cloned().unwrap_or_else(SessionId::generate),
        })
    }

    async fn listen_flow(&self, trigger_id: &TriggerId) -> Result<CancelHandle, ListenError> {
        debug!(%trigger_id, "Listening to mock flow");

        let reconciler = Arc::new(EventReconciler::new(
            self.channel.clone(),
            ResumeMode::Immediate,
        ));
        let cancel = CancelHandle::new();
        {
            let reconciler = reconciler.clone();
            let channel = self.channel.clone();
            cancel.on_cancel(move || {
                reconciler.close();
                channel.clear();
            });
        }
        {
            let cancel = cancel.clone();
            reconciler.set_close_hook(move || cancel.cancel());
        }

        let steps: Vec<(FlowEvent, Duration)> = self
            .script(trigger_id)
            .into_iter()
            .enumerate()
            .map(|(step, event)| (event, self.delay(step)))
            .collect();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            for (event, delay) in steps {
                tokio::select! {
                    biased;
                    _ = task_cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => reconciler.push_live(event),
                }
            }
        });

        if let Some(previous) = self
            .cancel
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .replace(cancel.clone())
        {
            previous.cancel();
        }
        Ok(cancel)
    }

    fn add_event_listener(&self, kind: EventKind, callback: EventCallback) -> Unsubscribe {
        self.channel.register(kind, callback)
    }

    fn close(&self) {
        if let Some(cancel) = self.cancel.lock().unwrap_or_else(|p| p.into_inner()).take() {
            cancel.cancel();
        }
        self.channel.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_chunks_text() {
        let transport = MockFlowTransport::new().with_text("Hello world");
        let events = transport.script(&TriggerId::generate());

        let fragments: Vec<String> = events
            .iter()
            .filter_map(|event| match event {
                FlowEvent::FlowResultFragment(f) => Some(f.value.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(fragments, vec!["He", "llo", " wor", "ld"]);
        assert!(matches!(events.first(), Some(FlowEvent::FlowStart(_))));
        assert!(matches!(events.last(), Some(FlowEvent::FlowEnd(_))));
    }

    #[test]
    fn test_script_keeps_multibyte_chars_whole() {
        let transport = MockFlowTransport::new().with_text("héé");
        let events = transport.script(&TriggerId::generate());
        assert!(matches!(
            &events[1],
            FlowEvent::FlowResultFragment(f) if f.value == "hé"
        ));
    }

    #[test]
    fn test_delay_stays_in_range() {
        let transport = MockFlowTransport::new();
        for step in 0..200 {
            let delay = transport.delay(step);
            assert!(delay >= Duration::from_millis(50));
            assert!(delay <= Duration::from_millis(100));
        }
    }

    #[tokio::test]
    async fn test_streams_text_then_ends() {
        let transport = MockFlowTransport::new()
            .with_text("Hi!")
            .with_delay(Duration::ZERO, Duration::ZERO);

        let text = Arc::new(Mutex::new(String::new()));
        let t = text.clone();
        transport.add_event_listener(
            EventKind::FlowResultFragment,
            Box::new(move |event: &FlowEvent| {
                if let FlowEvent::FlowResultFragment(f) = event {
                    t.lock().unwrap().push_str(&f.value);
                }
            }),
        );

        let outcome = transport.trigger_flow(&TriggerId::generate(), None).await.unwrap();
        assert!(!outcome.session_id.as_str().is_empty());
        let cancel = transport.listen_flow(&TriggerId::generate()).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), cancel.cancelled())
            .await
            .expect("mock run should end");
        assert_eq!(*text.lock().unwrap(), "Hi!");
        assert_eq!(transport.trigger_count(), 1);
    }
}
