//! Run status and result accumulation.
//!
//! [`ResultAccumulator`] folds domain events into a [`FlowResult`] and a
//! [`RunStatus`]. Status only moves forward: once a run is complete or has
//! failed, every later update is ignored.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::events::{FlowEvent, FlowResult, Tagged};
use crate::response::FlowOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Pending,
    Running,
    Complete,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Complete => "complete",
            RunStatus::Error => "error",
        }
    }

    /// Complete and error are final.
    pub fn is_frozen(&self) -> bool {
        matches!(self, RunStatus::Complete | RunStatus::Error)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
pub struct ResultAccumulator {
    status: RunStatus,
    result: FlowResult,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn result(&self) -> &FlowResult {
        &self.result
    }

    /// Move to `next` unless the status is frozen. Returns whether the status
    /// changed.
    pub fn update_status(&mut self, next: RunStatus) -> bool {
        if self.status.is_frozen() {
            return false;
        }
        let changed = self.status != next;
        self.status = next;
        changed
    }

    /// Fold one event. Returns the outcome when the event ends the run.
    ///
    /// Node, tool and agent events change nothing here.
    pub fn apply(&mut self, event: &FlowEvent) -> Option<FlowOutcome> {
        if self.status.is_frozen() {
            debug!(kind = %event.kind(), status = %self.status, "Ignoring event for finished run");
            return None;
        }

        match event {
            FlowEvent::FlowStart(_) => {
                self.update_status(RunStatus::Running);
                None
            }
            FlowEvent::FlowResultFragment(fragment) => {
                self.update_status(RunStatus::Running);
                self.result
                    .append(&fragment.field_name, &fragment.value, fragment.value_type);
                None
            }
            FlowEvent::FlowFail(fail) => {
                self.update_status(RunStatus::Error);
                Some(FlowOutcome::Failure {
                    error: fail.message.clone(),
                })
            }
            FlowEvent::FlowEnd(_) => {
                self.update_status(RunStatus::Complete);
                Some(FlowOutcome::Success {
                    result: self.result.clone(),
                })
            }
            FlowEvent::NodeStart(_)
            | FlowEvent::NodeEnd(_)
            | FlowEvent::NodeFail(_)
            | FlowEvent::NodeLog(_)
            | FlowEvent::ToolStart(_)
            | FlowEvent::ToolEnd(_)
            | FlowEvent::ToolFail(_)
            | FlowEvent::AgentNotification(_) => None,
        }
    }
}
