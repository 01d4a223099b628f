//! Posture quality checks on a single keypoint snapshot.
//!
//! The checks are exercise-agnostic: the same knee, trunk and depth rules run
//! for every exercise. A "go deeper" hint during a wrist curl is therefore
//! possible whenever the lower body is in view. Exercise-aware rules would
//! need per-exercise check selection in the role spec.

use rehab_core::{midpoint, KeypointSnapshot};
use serde::{Deserialize, Serialize};

pub const SUGGESTION_KNEES: &str = "Keep your knees aligned over your toes";
pub const SUGGESTION_BACK: &str = "Keep your back straight and chest up";
pub const SUGGESTION_DEPTH: &str = "Go deeper - thighs should be parallel to floor";
pub const SUGGESTION_GOOD: &str = "Perfect form! Keep it up!";

/// Form check thresholds (pixel units)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    /// Joints at or below this confidence do not take part in checks
    pub min_confidence: f32,
    /// Max horizontal spread between left and right knee
    pub lateral_threshold: f64,
    /// Max horizontal offset between shoulder and hip midpoints
    pub trunk_threshold: f64,
    /// Hip must sit at least this far below the knee line to count as deep
    pub depth_margin: f64,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.2,
            lateral_threshold: 50.0,
            trunk_threshold: 30.0,
            depth_margin: 20.0,
        }
    }
}

/// Individual check outcomes; `true` means the issue was detected
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormFlags {
    pub misaligned: bool,
    pub trunk_lean: bool,
    pub shallow_depth: bool,
}

impl FormFlags {
    pub fn any(&self) -> bool {
        self.misaligned || self.trunk_lean || self.shallow_depth
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormVerdict {
    pub flags: FormFlags,
    pub is_good_form: bool,
    pub needs_immediate_attention: bool,
    /// Highest-priority suggestion, or positive reinforcement
    pub suggestion: String,
}

impl FormVerdict {
    pub fn good() -> Self {
        Self {
            flags: FormFlags::default(),
            is_good_form: true,
            needs_immediate_attention: false,
            suggestion: SUGGESTION_GOOD.to_string(),
        }
    }
}

impl Default for FormVerdict {
    fn default() -> Self {
        Self::good()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FormEvaluator {
    config: FormConfig,
}

impl FormEvaluator {
    pub fn new(config: FormConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, snapshot: &KeypointSnapshot) -> FormVerdict {
        let floor = self.config.min_confidence;
        let get = |name: &str| snapshot.get_confident(name, floor);

        let mut flags = FormFlags::default();

        // Lateral pair: knees, only when the feet are in view too
        if let (Some(lk), Some(rk), Some(_), Some(_)) = (
            get("left_knee"),
            get("right_knee"),
            get("left_ankle"),
            get("right_ankle"),
        ) {
            flags.misaligned = (lk.x() - rk.x()).abs() > self.config.lateral_threshold;
        }

        if let (Some(ls), Some(rs), Some(lh), Some(rh)) = (
            get("left_shoulder"),
            get("right_shoulder"),
            get("left_hip"),
            get("right_hip"),
        ) {
            let shoulders = midpoint(&ls.position, &rs.position);
            let hips = midpoint(&lh.position, &rh.position);
            flags.trunk_lean = (shoulders.x - hips.x).abs() > self.config.trunk_threshold;
        }

        if let (Some(hip), Some(knee), Some(_)) = (get("left_hip"), get("left_knee"), get("left_ankle")) {
            flags.shallow_depth = hip.y() < knee.y() + self.config.depth_margin;
        }

        Self::verdict(flags)
    }

    fn verdict(flags: FormFlags) -> FormVerdict {
        let suggestion = if flags.misaligned {
            SUGGESTION_KNEES
        } else if flags.trunk_lean {
            SUGGESTION_BACK
        } else if flags.shallow_depth {
            SUGGESTION_DEPTH
        } else {
            SUGGESTION_GOOD
        };

        FormVerdict {
            flags,
            is_good_form: !flags.any(),
            needs_immediate_attention: flags.misaligned,
            suggestion: suggestion.to_string(),
        }
    }
}
