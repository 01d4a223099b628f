//! Per-exercise joint role declarations.
//!
//! A [`JointRoleSpec`] names the three joints whose angle defines a
//! repetition, the angle thresholds of the start and mid positions, and how
//! the exercise is tracked and counted. Specs are validated when built so a
//! missing or inconsistent field is rejected at load time rather than
//! discovered as a gap while a patient is mid-session.

use rehab_core::{Error, Phase, Result};
use serde::{Deserialize, Serialize};

/// Joint names filling the proximal, pivot and distal roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTriple {
    /// Proximal reference joint (e.g. hip for a knee angle)
    pub p1: String,
    /// Pivot joint, the vertex of the measured angle
    pub p2: String,
    /// Distal reference joint (e.g. ankle for a knee angle)
    pub p3: String,
}

impl RoleTriple {
    pub fn new(p1: &str, p2: &str, p3: &str) -> Self {
        Self {
            p1: p1.to_string(),
            p2: p2.to_string(),
            p3: p3.to_string(),
        }
    }

    pub fn names(&self) -> [&str; 3] {
        [&self.p1, &self.p2, &self.p3]
    }

    /// Same roles on the opposite body side (`left_*` <-> `right_*`)
    pub fn mirrored(&self) -> Self {
        Self {
            p1: mirror_joint_name(&self.p1),
            p2: mirror_joint_name(&self.p2),
            p3: mirror_joint_name(&self.p3),
        }
    }

    fn validate(&self, label: &str) -> Result<()> {
        for (role, name) in [("p1", &self.p1), ("p2", &self.p2), ("p3", &self.p3)] {
            if name.trim().is_empty() {
                return Err(Error::Config(format!("{label}.{role} is empty")));
            }
        }
        if self.p1 == self.p2 || self.p2 == self.p3 {
            return Err(Error::Config(format!(
                "{label}: pivot {} must differ from its reference joints",
                self.p2
            )));
        }
        Ok(())
    }
}

/// Swap the body side prefix of a joint name; unsided names are unchanged
pub fn mirror_joint_name(name: &str) -> String {
    if let Some(rest) = name.strip_prefix("left_") {
        format!("right_{rest}")
    } else if let Some(rest) = name.strip_prefix("right_") {
        format!("left_{rest}")
    } else {
        name.to_string()
    }
}

/// How the exercise phase is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// Joint angle at the pivot against start/mid thresholds
    Angle,
    /// Vertical motion of the pivot joint relative to the proximal joint.
    /// Used for small, fast joints (wrists) whose angle is unreliable.
    Motion,
}

impl TrackingMode {
    /// Counting convention used when an exercise does not name one.
    ///
    /// Angle exercises count on the return to the start position. The motion
    /// path counts when the joint drops back down, i.e. on entering `Flexed`.
    pub fn default_anchor(&self) -> RepAnchor {
        match self {
            TrackingMode::Angle => RepAnchor::OnExtended,
            TrackingMode::Motion => RepAnchor::OnFlexed,
        }
    }
}

/// Which phase transition increments the repetition counter; defaults to
/// counting on the return to the start position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepAnchor {
    /// Count on Extended -> Flexed (reaching the mid position)
    OnFlexed,
    /// Count on Flexed -> Extended (returning to the start position)
    OnExtended,
}

impl RepAnchor {
    pub fn counted_phase(&self) -> Phase {
        match self {
            RepAnchor::OnFlexed => Phase::Flexed,
            RepAnchor::OnExtended => Phase::Extended,
        }
    }
}

impl Default for RepAnchor {
    fn default() -> Self {
        RepAnchor::OnExtended
    }
}

/// Validated role and threshold declaration for one exercise
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JointRoleSpec {
    roles: RoleTriple,
    start_angle: f64,
    mid_angle: f64,
    tolerance: f64,
    mode: TrackingMode,
    anchor: RepAnchor,
    fallback_roles: Option<RoleTriple>,
    mirror_sides: bool,
}

impl JointRoleSpec {
    pub const DEFAULT_TOLERANCE: f64 = 15.0;

    /// Angle-tracked spec counting on the return to the start position
    pub fn new(roles: RoleTriple, start_angle: f64, mid_angle: f64, tolerance: f64) -> Result<Self> {
        let spec = Self {
            roles,
            start_angle,
            mid_angle,
            tolerance,
            mode: TrackingMode::Angle,
            anchor: RepAnchor::default(),
            fallback_roles: None,
            mirror_sides: false,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn with_mode(mut self, mode: TrackingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_anchor(mut self, anchor: RepAnchor) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_mirror_sides(mut self, mirror: bool) -> Self {
        self.mirror_sides = mirror;
        self
    }

    pub fn with_fallback_roles(mut self, fallback: RoleTriple) -> Result<Self> {
        fallback.validate("fallbackJoints")?;
        self.fallback_roles = Some(fallback);
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.roles.validate("trackedJoints")?;

        for (label, angle) in [("startAngle", self.start_angle), ("midAngle", self.mid_angle)] {
            if !angle.is_finite() || !(0.0..=180.0).contains(&angle) {
                return Err(Error::Config(format!(
                    "repLogic.{label} must be within [0, 180], got {angle}"
                )));
            }
        }

        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(Error::Config(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }

        // The two bands must leave a dead zone between them
        let span = (self.start_angle - self.mid_angle).abs();
        if span <= 2.0 * self.tolerance {
            return Err(Error::Config(format!(
                "start/mid bands overlap: |{} - {}| must exceed twice the tolerance {}",
                self.start_angle, self.mid_angle, self.tolerance
            )));
        }

        Ok(())
    }

    pub fn roles(&self) -> &RoleTriple {
        &self.roles
    }

    pub fn start_angle(&self) -> f64 {
        self.start_angle
    }

    pub fn mid_angle(&self) -> f64 {
        self.mid_angle
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn mode(&self) -> TrackingMode {
        self.mode
    }

    pub fn anchor(&self) -> RepAnchor {
        self.anchor
    }

    pub fn fallback_roles(&self) -> Option<&RoleTriple> {
        self.fallback_roles.as_ref()
    }

    pub fn mirror_sides(&self) -> bool {
        self.mirror_sides
    }

    /// True when the mid position has a smaller angle than the start (squats,
    /// curls); false for opening movements such as arm raises.
    pub fn is_closing(&self) -> bool {
        self.start_angle > self.mid_angle
    }

    /// Candidate phase for an angle, `None` inside the dead zone
    pub fn classify_angle(&self, angle: f64) -> Option<Phase> {
        let (at_start, at_mid) = if self.is_closing() {
            (
                angle > self.start_angle - self.tolerance,
                angle < self.mid_angle + self.tolerance,
            )
        } else {
            (
                angle < self.start_angle + self.tolerance,
                angle > self.mid_angle - self.tolerance,
            )
        };

        if at_start {
            Some(Phase::Extended)
        } else if at_mid {
            Some(Phase::Flexed)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squat_roles() -> RoleTriple {
        RoleTriple::new("left_hip", "left_knee", "left_ankle")
    }

    #[test]
    fn test_closing_bands_and_dead_zone() {
        let spec = JointRoleSpec::new(squat_roles(), 160.0, 90.0, 15.0).unwrap();

        assert_eq!(spec.classify_angle(170.0), Some(Phase::Extended));
        assert_eq!(spec.classify_angle(146.0), Some(Phase::Extended));
        assert_eq!(spec.classify_angle(145.0), None);
        assert_eq!(spec.classify_angle(120.0), None);
        assert_eq!(spec.classify_angle(105.0), None);
        assert_eq!(spec.classify_angle(104.0), Some(Phase::Flexed));
        assert_eq!(spec.classify_angle(0.0), Some(Phase::Flexed));
    }

    #[test]
    fn test_opening_bands() {
        let roles = RoleTriple::new("left_hip", "left_shoulder", "left_wrist");
        let spec = JointRoleSpec::new(roles, 60.0, 150.0, 15.0).unwrap();

        assert!(!spec.is_closing());
        assert_eq!(spec.classify_angle(30.0), Some(Phase::Extended));
        assert_eq!(spec.classify_angle(100.0), None);
        assert_eq!(spec.classify_angle(170.0), Some(Phase::Flexed));
    }

    #[test]
    fn test_rejects_overlapping_bands() {
        let err = JointRoleSpec::new(squat_roles(), 100.0, 80.0, 15.0).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        assert!(JointRoleSpec::new(squat_roles(), 100.0, 80.0, 5.0).is_ok());
    }

    #[test]
    fn test_rejects_bad_fields() {
        let empty = RoleTriple::new("left_hip", "", "left_ankle");
        assert!(JointRoleSpec::new(empty, 160.0, 90.0, 15.0).is_err());

        let same_pivot = RoleTriple::new("left_knee", "left_knee", "left_ankle");
        assert!(JointRoleSpec::new(same_pivot, 160.0, 90.0, 15.0).is_err());

        assert!(JointRoleSpec::new(squat_roles(), 200.0, 90.0, 15.0).is_err());
        assert!(JointRoleSpec::new(squat_roles(), f64::NAN, 90.0, 15.0).is_err());
        assert!(JointRoleSpec::new(squat_roles(), 160.0, 90.0, 0.0).is_err());
    }

    #[test]
    fn test_mirrored_roles() {
        let roles = RoleTriple::new("left_elbow", "left_wrist", "nose").mirrored();
        assert_eq!(roles, RoleTriple::new("right_elbow", "right_wrist", "nose"));
        assert_eq!(mirror_joint_name("right_knee"), "left_knee");
    }

    #[test]
    fn test_anchor_phase() {
        assert_eq!(RepAnchor::default().counted_phase(), Phase::Extended);
        assert_eq!(RepAnchor::OnFlexed.counted_phase(), Phase::Flexed);
        assert_eq!(TrackingMode::Angle.default_anchor(), RepAnchor::OnExtended);
        assert_eq!(TrackingMode::Motion.default_anchor(), RepAnchor::OnFlexed);
    }
}
