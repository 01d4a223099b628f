//! Position-history phase tracking for joints whose angle is unreliable.
//!
//! Small, fast joints such as the wrist produce noisy angles, so their phase is
//! read from vertical position instead:
//!
//! - With a confident anchor joint (the elbow for a wrist), the signed offset
//!   `anchor.y - point.y` is compared against two thresholds. The extended
//!   threshold sits above the flexed one, so an offset oscillating between
//!   them cannot flip the phase back and forth.
//! - Without an anchor, the sign of the raw velocity decides, but only once
//!   the window amplitude clears a noise floor. Jitter on a still joint never
//!   moves the phase.
//!
//! When neither signal is usable the phase holds its last value. Before the
//! first classification it is unknown; the tracker never guesses.

use rehab_core::{Keypoint, Phase};
use serde::{Deserialize, Serialize};

use crate::state::TrackingState;

/// Motion tracking parameters (pixel units)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Ring buffer capacity
    pub history_capacity: usize,
    /// Samples averaged for the smoothed position
    pub smoothing_window: usize,
    /// Tracked-point samples at or below this confidence are ignored
    pub min_confidence: f32,
    /// Anchor must exceed this confidence to drive classification
    pub anchor_min_confidence: f32,
    /// Anchor offset above which the phase is extended
    pub extended_threshold: f64,
    /// Anchor offset below which the phase is flexed
    pub flexed_threshold: f64,
    /// Minimum window amplitude before velocity is trusted
    pub amplitude_noise_floor: f64,
    /// Minimum per-frame displacement (pixels) for the fallback path; jitter
    /// below this never classifies, whatever the window amplitude
    pub min_velocity: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            history_capacity: 30,
            smoothing_window: 5,
            min_confidence: 0.25,
            anchor_min_confidence: 0.25,
            extended_threshold: 24.0,
            flexed_threshold: 10.0,
            amplitude_noise_floor: 22.0,
            min_velocity: 3.0,
        }
    }
}

impl MotionConfig {
    pub fn validate(&self) -> rehab_core::Result<()> {
        if self.extended_threshold <= self.flexed_threshold {
            return Err(rehab_core::Error::Config(format!(
                "motion.extended_threshold ({}) must exceed motion.flexed_threshold ({})",
                self.extended_threshold, self.flexed_threshold
            )));
        }
        if self.history_capacity < 2 || self.smoothing_window == 0 {
            return Err(rehab_core::Error::Config(
                "motion.history_capacity must be >= 2 and motion.smoothing_window >= 1".into(),
            ));
        }
        Ok(())
    }
}

/// One frame's input to the tracker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    pub point: Keypoint,
    pub anchor: Option<Keypoint>,
}

impl MotionSample {
    pub fn new(point: Keypoint, anchor: Option<Keypoint>) -> Self {
        Self { point, anchor }
    }
}

/// Which signal produced the estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseSource {
    Anchor,
    Velocity,
    /// No usable signal this frame; last known phase repeated
    Held,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseEstimate {
    pub phase: Option<Phase>,
    pub source: PhaseSource,
    /// False when the sample was below the confidence floor and ignored
    pub accepted: bool,
    pub smoothed: Option<f64>,
    pub velocity: f64,
    pub amplitude: f64,
}

#[derive(Debug, Clone, Default)]
pub struct MotionTracker {
    config: MotionConfig,
}

impl MotionTracker {
    pub fn new(config: MotionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// A fresh state sized for this tracker's history window
    pub fn new_state(&self, target_reps: u32) -> TrackingState {
        TrackingState::new(self.config.history_capacity, target_reps)
    }

    pub fn update(&self, state: &mut TrackingState, sample: MotionSample) -> PhaseEstimate {
        if !sample.point.is_confident(self.config.min_confidence) {
            return self.held(state, false);
        }

        state.history.push(sample.point.y());
        if let Some(velocity) = state.history.velocity() {
            state.velocity = velocity;
        }
        let amplitude = state.history.amplitude().unwrap_or(0.0);

        let anchor = sample
            .anchor
            .filter(|a| a.is_confident(self.config.anchor_min_confidence));

        let (candidate, source) = match anchor {
            Some(anchor) => (self.classify_offset(anchor.y() - sample.point.y()), PhaseSource::Anchor),
            None if state.history.len() < 2 => (None, PhaseSource::Held),
            None => (self.classify_velocity(state.velocity, amplitude), PhaseSource::Velocity),
        };

        match candidate {
            Some(phase) => {
                state.motion_phase = Some(phase);
                PhaseEstimate {
                    phase: Some(phase),
                    source,
                    accepted: true,
                    smoothed: state.history.smoothed(self.config.smoothing_window),
                    velocity: state.velocity,
                    amplitude,
                }
            }
            None => self.held(state, true),
        }
    }

    fn classify_offset(&self, offset: f64) -> Option<Phase> {
        if offset > self.config.extended_threshold {
            Some(Phase::Extended)
        } else if offset < self.config.flexed_threshold {
            Some(Phase::Flexed)
        } else {
            None
        }
    }

    fn classify_velocity(&self, velocity: f64, amplitude: f64) -> Option<Phase> {
        if amplitude <= self.config.amplitude_noise_floor {
            return None;
        }
        if velocity > self.config.min_velocity {
            Some(Phase::Extended)
        } else if velocity < -self.config.min_velocity {
            Some(Phase::Flexed)
        } else {
            None
        }
    }

    fn held(&self, state: &TrackingState, accepted: bool) -> PhaseEstimate {
        PhaseEstimate {
            phase: state.motion_phase,
            source: PhaseSource::Held,
            accepted,
            smoothed: state.history.smoothed(self.config.smoothing_window),
            velocity: state.velocity,
            amplitude: state.history.amplitude().unwrap_or(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrist(y: f64) -> Keypoint {
        Keypoint::new(300.0, y, 0.9)
    }

    fn elbow(y: f64) -> Keypoint {
        Keypoint::new(300.0, y, 0.9)
    }

    #[test]
    fn test_flat_history_never_classifies() {
        let tracker = MotionTracker::default();
        let mut state = tracker.new_state(10);

        for _ in 0..30 {
            let estimate = tracker.update(&mut state, MotionSample::new(wrist(240.0), None));
            assert_eq!(estimate.phase, None);
            assert_eq!(estimate.source, PhaseSource::Held);
        }
        assert_eq!(state.history().len(), 30);
        assert_eq!(state.motion_phase(), None);
    }

    #[test]
    fn test_anchor_hysteresis() {
        let tracker = MotionTracker::default();
        let mut state = tracker.new_state(10);
        let elbow_y = 300.0;

        // offset 30 > 24: extended
        let e = tracker.update(&mut state, MotionSample::new(wrist(270.0), Some(elbow(elbow_y))));
        assert_eq!(e.phase, Some(Phase::Extended));
        assert_eq!(e.source, PhaseSource::Anchor);

        // offset 15 sits between thresholds: held
        let e = tracker.update(&mut state, MotionSample::new(wrist(285.0), Some(elbow(elbow_y))));
        assert_eq!(e.phase, Some(Phase::Extended));
        assert_eq!(e.source, PhaseSource::Held);

        // offset 5 < 10: flexed
        let e = tracker.update(&mut state, MotionSample::new(wrist(295.0), Some(elbow(elbow_y))));
        assert_eq!(e.phase, Some(Phase::Flexed));

        // offset 20 still below 24: stays flexed
        let e = tracker.update(&mut state, MotionSample::new(wrist(280.0), Some(elbow(elbow_y))));
        assert_eq!(e.phase, Some(Phase::Flexed));
    }

    #[test]
    fn test_velocity_fallback_needs_amplitude() {
        let tracker = MotionTracker::default();
        let mut state = tracker.new_state(10);

        // Small moves: amplitude stays under the noise floor
        for y in [300.0, 295.0, 290.0, 285.0] {
            let e = tracker.update(&mut state, MotionSample::new(wrist(y), None));
            assert_eq!(e.phase, None);
        }

        // Keep rising: amplitude 30 > 22, velocity positive
        let e = tracker.update(&mut state, MotionSample::new(wrist(270.0), None));
        assert_eq!(e.phase, Some(Phase::Extended));
        assert_eq!(e.source, PhaseSource::Velocity);
        assert!(e.velocity > 0.0);

        // Falling back down
        let e = tracker.update(&mut state, MotionSample::new(wrist(290.0), None));
        assert_eq!(e.phase, Some(Phase::Flexed));
        assert!(e.velocity < 0.0);
    }

    #[test]
    fn test_jitter_after_large_move_holds_phase() {
        let tracker = MotionTracker::default();
        let mut state = tracker.new_state(10);

        tracker.update(&mut state, MotionSample::new(wrist(300.0), None));
        let raised = tracker.update(&mut state, MotionSample::new(wrist(260.0), None));
        assert_eq!(raised.phase, Some(Phase::Extended));

        // The raise stays in the 30-sample window, so amplitude remains 40 px
        for i in 0..20 {
            let y = if i % 2 == 0 { 261.0 } else { 260.0 };
            let e = tracker.update(&mut state, MotionSample::new(wrist(y), None));
            assert!(e.amplitude > tracker.config().amplitude_noise_floor);
            assert_eq!(e.phase, Some(Phase::Extended));
            assert_eq!(e.source, PhaseSource::Held);
        }
    }

    #[test]
    fn test_low_confidence_sample_is_ignored() {
        let tracker = MotionTracker::default();
        let mut state = tracker.new_state(10);

        let faint = Keypoint::new(300.0, 100.0, 0.25);
        let e = tracker.update(&mut state, MotionSample::new(faint, Some(elbow(300.0))));

        assert!(!e.accepted);
        assert_eq!(e.phase, None);
        assert!(state.history().is_empty());
    }

    #[test]
    fn test_low_confidence_anchor_uses_velocity_path() {
        let tracker = MotionTracker::default();
        let mut state = tracker.new_state(10);
        let faint_elbow = Keypoint::new(300.0, 400.0, 0.1);

        tracker.update(&mut state, MotionSample::new(wrist(300.0), Some(faint_elbow)));
        let e = tracker.update(&mut state, MotionSample::new(wrist(250.0), Some(faint_elbow)));
        assert_eq!(e.source, PhaseSource::Velocity);
        assert_eq!(e.phase, Some(Phase::Extended));
    }

    #[test]
    fn test_smoothed_uses_last_five() {
        let tracker = MotionTracker::default();
        let mut state = tracker.new_state(10);
        let mut last = None;
        for y in [100.0, 200.0, 200.0, 200.0, 200.0, 200.0] {
            last = Some(tracker.update(&mut state, MotionSample::new(wrist(y), None)));
        }
        assert_eq!(last.and_then(|e| e.smoothed), Some(200.0));
    }

    #[test]
    fn test_config_validation() {
        assert!(MotionConfig::default().validate().is_ok());
        let inverted = MotionConfig {
            extended_threshold: 5.0,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
    }
}
