//! Per-session frame processing.
//!
//! [`SessionEngine`] owns the single [`TrackingState`] of a session. Each call
//! to [`SessionEngine::process_frame`] runs one synchronous
//! resolve → track → evaluate → emit pass over a keypoint snapshot.

use rehab_core::{try_angle_at, Error, KeypointSnapshot, Phase, Result, SessionId, Timestamp, BODY_JOINTS};
use rehab_motion::{
    FormEvaluator, FormFlags, FormVerdict, JointResolver, MotionSample, MotionTracker, RepEvent,
    RepetitionStateMachine, Resolution, ResolvedJoints, Role, RoleTriple, Step, TrackingMode,
    TrackingState,
};

use crate::catalog::ExerciseDefinition;
use crate::config::EngineConfig;
use crate::events::{FrameUpdate, SessionEvent};
use crate::summary::{SessionSummary, SessionSummaryBuilder, SubjectiveFeedback};

pub const FEEDBACK_READY: &str = "Ready when you are!";
pub const FEEDBACK_BODY_NOT_VISIBLE: &str =
    "Please ensure your upper and lower body are visible in the camera.";
pub const FEEDBACK_MOVE_CLOSER: &str = "Move closer to the camera so your joints are visible.";
pub const FEEDBACK_RETURN_TO_START: &str = "Good! Return to the start to complete the rep.";
pub const FEEDBACK_HAND_FALLBACK: &str =
    "Using wrist tracking for finger exercise. Keep wrist in view.";

pub struct SessionEngine {
    session_id: SessionId,
    exercise: ExerciseDefinition,
    config: EngineConfig,
    resolver: JointResolver,
    tracker: MotionTracker,
    machine: RepetitionStateMachine,
    form: FormEvaluator,
    state: TrackingState,
    summary: SessionSummaryBuilder,
    feedback: String,
    last_verdict: FormVerdict,
    tracked_side: Option<RoleTriple>,
    substituting: bool,
}

impl SessionEngine {
    pub fn new(exercise: ExerciseDefinition, target_reps: u32, config: EngineConfig) -> Result<Self> {
        if target_reps == 0 {
            return Err(Error::InvalidInput("target_reps must be at least 1".into()));
        }
        config.validate()?;
        exercise.spec.validate()?;

        let session_id = SessionId::new();
        let tracker = MotionTracker::new(config.motion.clone());
        let state = tracker.new_state(target_reps);
        let summary =
            SessionSummaryBuilder::new(session_id, &exercise.name, target_reps, config.summary.clone());

        tracing::info!(
            session = %session_id,
            exercise = %exercise.name,
            target_reps,
            mode = ?exercise.spec.mode(),
            "Session started"
        );

        Ok(Self {
            session_id,
            resolver: JointResolver::new(config.resolver.clone()),
            machine: RepetitionStateMachine::new(config.machine.clone()),
            form: FormEvaluator::new(config.form.clone()),
            tracker,
            state,
            summary,
            exercise,
            config,
            feedback: FEEDBACK_READY.to_string(),
            last_verdict: FormVerdict::good(),
            tracked_side: None,
            substituting: false,
        })
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn exercise(&self) -> &ExerciseDefinition {
        &self.exercise
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn rep_count(&self) -> u32 {
        self.state.rep_count()
    }

    pub fn target_reps(&self) -> u32 {
        self.state.target_reps()
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    pub fn rep_events(&self) -> &[RepEvent] {
        self.summary.reps()
    }

    /// Frame time at which the pending completion signal fires
    pub fn completion_deadline(&self) -> Option<Timestamp> {
        self.state
            .completion_pending()
            .then(|| self.state.completion_due())
            .flatten()
    }

    pub fn is_complete(&self) -> bool {
        self.state.completion_signalled()
    }

    /// Run one full pass over a snapshot
    pub fn process_frame(&mut self, snapshot: &KeypointSnapshot) -> FrameUpdate {
        let timestamp = snapshot.timestamp;
        self.summary.observe_frame(timestamp);
        let mut events = Vec::new();
        let mut form_flags = FormFlags::default();

        let completed = if self.body_visible(snapshot) {
            let verdict = self.form.evaluate(snapshot);
            form_flags = verdict.flags;

            let step = match self.exercise.spec.mode() {
                TrackingMode::Angle => self.angle_step(snapshot, &verdict, &mut events),
                TrackingMode::Motion => self.motion_step(snapshot, &verdict, &mut events),
            };
            let completed = match step {
                Some(step) => self.apply_step(step, timestamp, &mut events),
                None => self.machine.poll_completion(&mut self.state, timestamp),
            };

            if verdict.needs_immediate_attention {
                self.feedback = verdict.suggestion.clone();
            }
            self.last_verdict = verdict;
            completed
        } else {
            self.feedback = FEEDBACK_BODY_NOT_VISIBLE.to_string();
            self.machine.poll_completion(&mut self.state, timestamp)
        };

        if completed {
            self.complete(timestamp, &mut events);
        }

        self.update(timestamp, form_flags, events)
    }

    /// Fire a pending completion signal without waiting for another frame
    pub fn flush_completion(&mut self, now: Timestamp) -> Option<FrameUpdate> {
        if !self.machine.flush_completion(&mut self.state) {
            return None;
        }
        let mut events = Vec::new();
        self.complete(now, &mut events);
        Some(self.update(now, self.last_verdict.flags, events))
    }

    /// Build the session summary; repeatable, the engine keeps its counts
    pub fn finalize_session(&self, feedback: &SubjectiveFeedback) -> SessionSummary {
        let summary = self.summary.build(feedback);
        tracing::info!(
            session = %self.session_id,
            reps = summary.total_reps,
            quality = summary.session_quality,
            "Session summary built"
        );
        summary
    }

    fn body_visible(&self, snapshot: &KeypointSnapshot) -> bool {
        let gate = &self.config.gate;
        gate.min_visible_body_joints == 0
            || JointResolver::count_visible(snapshot, &BODY_JOINTS, gate.visibility_min_confidence)
                >= gate.min_visible_body_joints
    }

    fn angle_step(
        &mut self,
        snapshot: &KeypointSnapshot,
        verdict: &FormVerdict,
        events: &mut Vec<SessionEvent>,
    ) -> Option<Step> {
        let timestamp = snapshot.timestamp;
        let joints = match self.resolver.resolve_spec(snapshot, &self.exercise.spec) {
            Resolution::Resolved(joints) => joints,
            Resolution::Unresolved { missing } => {
                self.on_unresolved(missing, timestamp, events);
                if self.state.consecutive_unresolved() >= self.reposition_threshold() {
                    self.feedback = FEEDBACK_MOVE_CLOSER.to_string();
                }
                return None;
            }
        };
        self.state.mark_resolved();
        self.announce_substitution(&joints, timestamp, events);

        match try_angle_at(
            &joints.p1.keypoint.position,
            &joints.p2.keypoint.position,
            &joints.p3.keypoint.position,
        ) {
            Ok(angle) => Some(self.machine.advance_angle(
                &mut self.state,
                angle,
                &self.exercise.spec,
                timestamp,
                verdict,
            )),
            Err(e) => {
                tracing::debug!(error = %e, "Degenerate angle, no transition");
                None
            }
        }
    }

    fn motion_step(
        &mut self,
        snapshot: &KeypointSnapshot,
        verdict: &FormVerdict,
        events: &mut Vec<SessionEvent>,
    ) -> Option<Step> {
        let timestamp = snapshot.timestamp;
        let side = self.resolver.pick_side(snapshot, &self.exercise.spec);
        if self.tracked_side.as_ref() != Some(&side) {
            if self.exercise.spec.mirror_sides() {
                let label = if side.p2.starts_with("right_") { "right" } else { "left" };
                self.feedback = format!(
                    "Tracking {label} {}. Keep it centered in frame.",
                    self.exercise.pivot_label()
                );
            }
            tracing::debug!(pivot = %side.p2, "Tracking side selected");
            self.tracked_side = Some(side.clone());
        }

        let sample = snapshot
            .get(&side.p2)
            .map(|point| MotionSample::new(*point, snapshot.get(&side.p1).copied()));
        let estimate = sample.map(|sample| self.tracker.update(&mut self.state, sample));

        match estimate {
            Some(estimate) if estimate.accepted => {
                self.state.mark_resolved();
                Some(self.machine.advance_phase(
                    &mut self.state,
                    &estimate,
                    &self.exercise.spec,
                    timestamp,
                    verdict,
                ))
            }
            _ => {
                self.on_unresolved(vec![Role::Pivot], timestamp, events);
                self.feedback = format!(
                    "Show your {} clearly to the camera.",
                    self.exercise.pivot_label()
                );
                None
            }
        }
    }

    fn reposition_threshold(&self) -> u32 {
        self.config.gate.reposition_after_frames.max(1)
    }

    fn on_unresolved(&mut self, missing: Vec<Role>, timestamp: Timestamp, events: &mut Vec<SessionEvent>) {
        let streak = self.state.mark_unresolved();
        if streak == self.reposition_threshold() {
            tracing::warn!(
                streak,
                missing = ?missing,
                exercise = %self.exercise.name,
                "Tracked joints unresolved, asking patient to reposition"
            );
            events.push(SessionEvent::RepositionHint { missing, timestamp });
        }
    }

    /// Tell the patient once when tracking moves onto substitute joints
    fn announce_substitution(
        &mut self,
        joints: &ResolvedJoints,
        timestamp: Timestamp,
        events: &mut Vec<SessionEvent>,
    ) {
        let spec = &self.exercise.spec;
        let on_fallback = spec.fallback_roles() == Some(&joints.requested());
        let substitution = if on_fallback {
            Some((spec.roles().p2.clone(), joints.p2.used.clone()))
        } else {
            joints
                .substitutions()
                .first()
                .map(|(requested, used)| (requested.to_string(), used.to_string()))
        };

        match substitution {
            Some((requested, used)) if !self.substituting => {
                let hand = self.exercise.target_body_part.eq_ignore_ascii_case("hand")
                    || self.exercise.name.to_ascii_lowercase().contains("finger");
                self.feedback = if hand {
                    FEEDBACK_HAND_FALLBACK.to_string()
                } else {
                    format!("Tracking {used} in place of {requested}. Keep it in view.")
                };
                tracing::info!(%requested, %used, "Tracking on substitute joints");
                events.push(SessionEvent::Substitution {
                    requested,
                    used,
                    timestamp,
                });
                self.substituting = true;
            }
            Some(_) => {}
            None => self.substituting = false,
        }
    }

    /// Turn a machine step into events and feedback; returns whether the
    /// completion signal fired
    fn apply_step(&mut self, step: Step, timestamp: Timestamp, events: &mut Vec<SessionEvent>) -> bool {
        if let Some(transition) = step.transition {
            events.push(SessionEvent::PhaseChanged {
                transition,
                timestamp,
            });
            let counted = self.exercise.spec.anchor().counted_phase();
            if transition.to == Phase::Flexed && counted == Phase::Extended {
                self.feedback = FEEDBACK_RETURN_TO_START.to_string();
            }
        }

        if let Some(rep) = step.rep {
            self.feedback = if rep.form.is_good_form {
                format!("Rep {} complete! Great form.", rep.repetition_index)
            } else {
                format!("Rep {} done. {}", rep.repetition_index, rep.form.suggestion)
            };
            self.summary.record(rep.clone());
            events.push(SessionEvent::RepCompleted(rep));
        }

        if step.target_reached {
            events.push(SessionEvent::TargetReached {
                reps: self.state.rep_count(),
                timestamp,
            });
        }

        step.completed
    }

    fn complete(&mut self, timestamp: Timestamp, events: &mut Vec<SessionEvent>) {
        let reps = self.state.rep_count();
        let target_reps = self.state.target_reps();
        self.feedback = format!("Session Complete! {reps}/{target_reps} reps completed.");
        tracing::info!(session = %self.session_id, reps, target_reps, "Session complete");
        events.push(SessionEvent::SessionComplete {
            reps,
            target_reps,
            timestamp,
        });
    }

    fn update(&self, timestamp: Timestamp, form_flags: FormFlags, events: Vec<SessionEvent>) -> FrameUpdate {
        FrameUpdate {
            timestamp,
            phase: self.state.phase(),
            rep_count: self.state.rep_count(),
            feedback_text: self.feedback.clone(),
            form_flags,
            events,
        }
    }
}
