//! Repetition counting state machine.
//!
//! Two states, `Extended` (start position) and `Flexed` (mid position),
//! starting in `Extended`. A candidate phase arrives each frame either from the
//! joint angle classified against the role spec's bands or from the motion
//! tracker. A repetition is counted when the state enters the phase named by
//! the role spec's [`RepAnchor`], unless the previous count happened within the
//! cool-down window. Reaching the target schedules a single session-complete
//! signal after a short delay; counting itself never stops here.

use rehab_core::{Phase, Timestamp};
use serde::{Deserialize, Serialize};

use crate::form::FormVerdict;
use crate::roles::{JointRoleSpec, RepAnchor};
use crate::state::TrackingState;
use crate::tracker::PhaseEstimate;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Minimum interval between two counted repetitions
    pub cooldown_ms: u64,
    /// Delay between reaching the target and signalling completion, so the
    /// final rep's feedback goes out first
    pub completion_delay_ms: u64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 400,
            completion_delay_ms: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
}

/// A counted repetition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepEvent {
    /// Cumulative count including this repetition (1-based)
    pub repetition_index: u32,
    pub phase_transition: PhaseTransition,
    pub timestamp: Timestamp,
    /// Most recent form verdict at the time of counting
    pub form: FormVerdict,
}

/// Outcome of one machine step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Step {
    pub transition: Option<PhaseTransition>,
    pub rep: Option<RepEvent>,
    /// A transition into the anchor phase fell inside the cool-down window
    pub suppressed: bool,
    /// This step's repetition reached the target count
    pub target_reached: bool,
    /// The session-complete signal fired on this step
    pub completed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RepetitionStateMachine {
    config: MachineConfig,
}

impl RepetitionStateMachine {
    pub fn new(config: MachineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Angle-driven step; dead-zone angles leave the state unchanged
    pub fn advance_angle(
        &self,
        state: &mut TrackingState,
        angle: f64,
        spec: &JointRoleSpec,
        timestamp: Timestamp,
        form: &FormVerdict,
    ) -> Step {
        self.advance(state, spec.classify_angle(angle), spec.anchor(), timestamp, form)
    }

    /// Motion-tracker-driven step; an unknown phase takes no transition
    pub fn advance_phase(
        &self,
        state: &mut TrackingState,
        estimate: &PhaseEstimate,
        spec: &JointRoleSpec,
        timestamp: Timestamp,
        form: &FormVerdict,
    ) -> Step {
        self.advance(state, estimate.phase, spec.anchor(), timestamp, form)
    }

    pub fn advance(
        &self,
        state: &mut TrackingState,
        candidate: Option<Phase>,
        anchor: RepAnchor,
        timestamp: Timestamp,
        form: &FormVerdict,
    ) -> Step {
        let mut step = Step::default();

        if let Some(next) = candidate.filter(|next| *next != state.phase) {
            let transition = PhaseTransition {
                from: state.phase,
                to: next,
            };
            state.phase = next;
            step.transition = Some(transition);
            tracing::debug!(from = %transition.from, to = %transition.to, "Phase transition");

            if next == anchor.counted_phase() {
                if self.in_cooldown(state, timestamp) {
                    step.suppressed = true;
                    tracing::debug!(
                        since_last_ms = state.last_rep_at.map(|t| timestamp.millis_since(t)),
                        "Repetition suppressed by cool-down"
                    );
                } else {
                    step.rep = Some(self.count(state, transition, timestamp, form));
                    step.target_reached = state.rep_count == state.target_reps;
                    if step.target_reached {
                        state.completion_due =
                            Some(timestamp.plus_millis(self.config.completion_delay_ms));
                        tracing::info!(reps = state.rep_count, "Target repetitions reached");
                    }
                }
            }
        }

        step.completed = self.poll_completion(state, timestamp);
        step
    }

    /// Fire the pending completion signal once `now` reaches its deadline
    pub fn poll_completion(&self, state: &mut TrackingState, now: Timestamp) -> bool {
        match state.completion_due {
            Some(due) if !state.completion_signalled && now >= due => {
                state.completion_signalled = true;
                true
            }
            _ => false,
        }
    }

    /// Fire a pending completion signal regardless of frame time
    pub fn flush_completion(&self, state: &mut TrackingState) -> bool {
        if state.completion_pending() {
            state.completion_signalled = true;
            true
        } else {
            false
        }
    }

    fn in_cooldown(&self, state: &TrackingState, now: Timestamp) -> bool {
        state
            .last_rep_at
            .map_or(false, |last| now.millis_since(last) < self.config.cooldown_ms as i64)
    }

    fn count(
        &self,
        state: &mut TrackingState,
        transition: PhaseTransition,
        timestamp: Timestamp,
        form: &FormVerdict,
    ) -> RepEvent {
        state.rep_count += 1;
        state.last_rep_at = Some(timestamp);
        tracing::info!(rep = state.rep_count, good_form = form.is_good_form, "Repetition counted");

        RepEvent {
            repetition_index: state.rep_count,
            phase_transition: transition,
            timestamp,
            form: form.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::RoleTriple;

    const SCRIPT: [f64; 8] = [170.0, 160.0, 90.0, 85.0, 170.0, 165.0, 92.0, 88.0];

    fn squat(anchor: RepAnchor) -> JointRoleSpec {
        JointRoleSpec::new(RoleTriple::new("left_hip", "left_knee", "left_ankle"), 160.0, 90.0, 15.0)
            .unwrap()
            .with_anchor(anchor)
    }

    /// Frames 500 ms apart, beyond the cool-down
    fn run_script(machine: &RepetitionStateMachine, spec: &JointRoleSpec, state: &mut TrackingState) -> Vec<usize> {
        let form = FormVerdict::good();
        SCRIPT
            .iter()
            .enumerate()
            .filter_map(|(i, angle)| {
                let ts = Timestamp::from_millis(i as i64 * 500);
                machine
                    .advance_angle(state, *angle, spec, ts, &form)
                    .rep
                    .map(|_| i)
            })
            .collect()
    }

    #[test]
    fn test_scripted_sequence_counts_on_flexed() {
        let machine = RepetitionStateMachine::default();
        let spec = squat(RepAnchor::OnFlexed);
        let mut state = TrackingState::new(30, 10);

        let counted_at = run_script(&machine, &spec, &mut state);

        assert_eq!(state.rep_count(), 2);
        assert_eq!(counted_at, vec![2, 6]);
        assert_eq!(state.phase(), Phase::Flexed);
    }

    #[test]
    fn test_scripted_sequence_counts_once_on_return_by_default() {
        let machine = RepetitionStateMachine::default();
        let spec = squat(RepAnchor::default());
        let mut state = TrackingState::new(30, 10);

        let counted_at = run_script(&machine, &spec, &mut state);

        assert_eq!(state.rep_count(), 1);
        // Fifth sample, the first return to 170 degrees
        assert_eq!(counted_at, vec![4]);
        assert_eq!(state.phase(), Phase::Flexed);
    }

    #[test]
    fn test_cooldown_suppresses_double_count() {
        let machine = RepetitionStateMachine::default();
        let spec = squat(RepAnchor::OnFlexed);
        let mut state = TrackingState::new(30, 10);
        let form = FormVerdict::good();

        let first = machine.advance_angle(&mut state, 80.0, &spec, Timestamp::from_millis(1_000), &form);
        assert!(first.rep.is_some());

        machine.advance_angle(&mut state, 170.0, &spec, Timestamp::from_millis(1_150), &form);
        let second = machine.advance_angle(&mut state, 80.0, &spec, Timestamp::from_millis(1_300), &form);

        assert!(second.rep.is_none());
        assert!(second.suppressed);
        assert_eq!(second.transition.map(|t| t.to), Some(Phase::Flexed));
        assert_eq!(state.rep_count(), 1);

        // Cool-down is measured from the last count, not the last transition
        machine.advance_angle(&mut state, 170.0, &spec, Timestamp::from_millis(1_350), &form);
        let third = machine.advance_angle(&mut state, 80.0, &spec, Timestamp::from_millis(1_450), &form);
        assert!(third.rep.is_some());
        assert_eq!(state.rep_count(), 2);
    }

    #[test]
    fn test_rep_event_carries_form_and_transition() {
        let machine = RepetitionStateMachine::default();
        let spec = squat(RepAnchor::OnFlexed);
        let mut state = TrackingState::new(30, 10);
        let mut form = FormVerdict::good();
        form.is_good_form = false;
        form.suggestion = "Keep your back straight and chest up".into();

        let step = machine.advance_angle(&mut state, 80.0, &spec, Timestamp::from_millis(0), &form);
        let rep = step.rep.unwrap();

        assert_eq!(rep.repetition_index, 1);
        assert_eq!(
            rep.phase_transition,
            PhaseTransition {
                from: Phase::Extended,
                to: Phase::Flexed
            }
        );
        assert_eq!(rep.form, form);
    }

    #[test]
    fn test_completion_fires_once_after_delay() {
        let machine = RepetitionStateMachine::default();
        let spec = squat(RepAnchor::OnFlexed);
        let mut state = TrackingState::new(30, 1);
        let form = FormVerdict::good();

        let step = machine.advance_angle(&mut state, 80.0, &spec, Timestamp::from_millis(0), &form);
        assert!(step.target_reached);
        assert!(!step.completed);
        assert!(state.completion_pending());

        let early = machine.advance_angle(&mut state, 80.0, &spec, Timestamp::from_millis(300), &form);
        assert!(!early.completed);

        let due = machine.advance_angle(&mut state, 80.0, &spec, Timestamp::from_millis(600), &form);
        assert!(due.completed);

        let later = machine.advance_angle(&mut state, 170.0, &spec, Timestamp::from_millis(900), &form);
        assert!(!later.completed);
        assert!(!machine.flush_completion(&mut state));

        // Counting continues past the target
        let extra = machine.advance_angle(&mut state, 80.0, &spec, Timestamp::from_millis(1_500), &form);
        assert!(extra.rep.is_some());
        assert!(!extra.target_reached);
        assert_eq!(state.rep_count(), 2);
    }

    #[test]
    fn test_flush_completion() {
        let machine = RepetitionStateMachine::default();
        let spec = squat(RepAnchor::OnFlexed);
        let mut state = TrackingState::new(30, 1);

        assert!(!machine.flush_completion(&mut state));
        machine.advance_angle(&mut state, 80.0, &spec, Timestamp::from_millis(0), &FormVerdict::good());
        assert!(machine.flush_completion(&mut state));
        assert!(state.completion_signalled());
    }

    #[test]
    fn test_unknown_motion_phase_takes_no_transition() {
        let machine = RepetitionStateMachine::default();
        let mut state = TrackingState::new(30, 10);

        let step = machine.advance(&mut state, None, RepAnchor::OnFlexed, Timestamp::from_millis(0), &FormVerdict::good());
        assert_eq!(step, Step::default());
        assert_eq!(state.phase(), Phase::Extended);
    }

    #[test]
    fn test_count_never_decreases() {
        let machine = RepetitionStateMachine::default();
        let spec = squat(RepAnchor::OnFlexed);
        let mut state = TrackingState::new(30, 100);
        let form = FormVerdict::good();
        let mut last = 0;

        for i in 0..200 {
            let angle = if (i / 3) % 2 == 0 { 170.0 } else { 70.0 } + (i % 7) as f64;
            machine.advance_angle(&mut state, angle, &spec, Timestamp::from_millis(i * 90), &form);
            assert!(state.rep_count() >= last);
            last = state.rep_count();
        }
        assert!(last > 0);
    }
}
