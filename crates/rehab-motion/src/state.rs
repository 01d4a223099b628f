//! Per-session tracking state.

use rehab_core::{Phase, Timestamp};

use crate::history::PositionHistory;

/// Everything the tracker and state machine remember between frames.
///
/// One instance belongs to exactly one active session and is mutated only
/// through `&mut` by the frame-processing pass of that session.
#[derive(Debug, Clone)]
pub struct TrackingState {
    pub(crate) history: PositionHistory,
    pub(crate) velocity: f64,
    pub(crate) phase: Phase,
    pub(crate) motion_phase: Option<Phase>,
    pub(crate) last_rep_at: Option<Timestamp>,
    pub(crate) rep_count: u32,
    pub(crate) target_reps: u32,
    pub(crate) consecutive_unresolved: u32,
    pub(crate) completion_due: Option<Timestamp>,
    pub(crate) completion_signalled: bool,
}

impl TrackingState {
    pub fn new(history_capacity: usize, target_reps: u32) -> Self {
        Self {
            history: PositionHistory::new(history_capacity),
            velocity: 0.0,
            phase: Phase::Extended,
            motion_phase: None,
            last_rep_at: None,
            rep_count: 0,
            target_reps,
            consecutive_unresolved: 0,
            completion_due: None,
            completion_signalled: false,
        }
    }

    pub fn history(&self) -> &PositionHistory {
        &self.history
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Last phase classified by the motion tracker, `None` until the first one
    pub fn motion_phase(&self) -> Option<Phase> {
        self.motion_phase
    }

    pub fn last_rep_at(&self) -> Option<Timestamp> {
        self.last_rep_at
    }

    pub fn rep_count(&self) -> u32 {
        self.rep_count
    }

    pub fn target_reps(&self) -> u32 {
        self.target_reps
    }

    pub fn target_reached(&self) -> bool {
        self.rep_count >= self.target_reps
    }

    pub fn consecutive_unresolved(&self) -> u32 {
        self.consecutive_unresolved
    }

    /// Record a frame whose joints could not be resolved; returns the streak
    pub fn mark_unresolved(&mut self) -> u32 {
        self.consecutive_unresolved = self.consecutive_unresolved.saturating_add(1);
        self.consecutive_unresolved
    }

    pub fn mark_resolved(&mut self) {
        self.consecutive_unresolved = 0;
    }

    pub fn completion_pending(&self) -> bool {
        self.completion_due.is_some() && !self.completion_signalled
    }

    pub fn completion_due(&self) -> Option<Timestamp> {
        self.completion_due
    }

    pub fn completion_signalled(&self) -> bool {
        self.completion_signalled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = TrackingState::new(30, 10);
        assert_eq!(state.phase(), Phase::Extended);
        assert_eq!(state.motion_phase(), None);
        assert_eq!(state.rep_count(), 0);
        assert_eq!(state.history().capacity(), 30);
        assert!(!state.completion_pending());
        assert!(!state.target_reached());
    }

    #[test]
    fn test_unresolved_streak() {
        let mut state = TrackingState::new(30, 10);
        assert_eq!(state.mark_unresolved(), 1);
        assert_eq!(state.mark_unresolved(), 2);
        state.mark_resolved();
        assert_eq!(state.consecutive_unresolved(), 0);
    }
}
