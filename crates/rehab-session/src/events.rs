//! Outbound notifications for the UI collaborator.

use rehab_core::{Phase, Timestamp};
use rehab_motion::{FormFlags, PhaseTransition, RepEvent, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    PhaseChanged {
        transition: PhaseTransition,
        timestamp: Timestamp,
    },
    RepCompleted(RepEvent),
    /// The target count was reached; completion follows after the delay
    TargetReached { reps: u32, timestamp: Timestamp },
    /// Fired once per session
    SessionComplete {
        reps: u32,
        target_reps: u32,
        timestamp: Timestamp,
    },
    /// Tracked joints have been missing for several consecutive frames
    RepositionHint {
        missing: Vec<Role>,
        timestamp: Timestamp,
    },
    /// Tracking switched to substitute joints
    Substitution {
        requested: String,
        used: String,
        timestamp: Timestamp,
    },
}

/// Result of processing one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameUpdate {
    pub timestamp: Timestamp,
    pub phase: Phase,
    pub rep_count: u32,
    /// Message to display; repeats the previous one when nothing changed
    pub feedback_text: String,
    pub form_flags: FormFlags,
    pub events: Vec<SessionEvent>,
}

impl FrameUpdate {
    pub fn is_complete(&self) -> bool {
        self.events
            .iter()
            .any(|event| matches!(event, SessionEvent::SessionComplete { .. }))
    }

    pub fn reached_target(&self) -> bool {
        self.events
            .iter()
            .any(|event| matches!(event, SessionEvent::TargetReached { .. }))
    }
}
