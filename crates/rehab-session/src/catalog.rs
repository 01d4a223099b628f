//! Exercise definitions as delivered by the catalog collaborator.
//!
//! Definitions arrive as camelCase JSON and are validated into a
//! [`JointRoleSpec`] when loaded, so a malformed exercise never reaches a live
//! session.

use std::path::Path;

use rehab_core::{Error, Result};
use rehab_motion::{JointRoleSpec, RepAnchor, RoleTriple, TrackingMode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRepLogic {
    start_angle: Option<f64>,
    mid_angle: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExercise {
    name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    instructions: Vec<String>,
    target_body_part: Option<String>,
    tracked_joints: Option<RoleTriple>,
    rep_logic: Option<RawRepLogic>,
    tolerance: Option<f64>,
    tracking: Option<TrackingMode>,
    rep_anchor: Option<RepAnchor>,
    fallback_joints: Option<RoleTriple>,
    #[serde(default)]
    mirror_sides: bool,
}

/// A validated exercise
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseDefinition {
    pub name: String,
    pub description: String,
    pub instructions: Vec<String>,
    pub target_body_part: String,
    pub spec: JointRoleSpec,
}

impl TryFrom<RawExercise> for ExerciseDefinition {
    type Error = Error;

    fn try_from(raw: RawExercise) -> Result<Self> {
        let name = raw
            .name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| Error::Config("exercise is missing a name".into()))?;
        let missing = |field: &str| Error::Config(format!("exercise '{name}' is missing {field}"));

        let roles = raw.tracked_joints.ok_or_else(|| missing("trackedJoints"))?;
        let logic = raw.rep_logic.ok_or_else(|| missing("repLogic"))?;
        let start = logic.start_angle.ok_or_else(|| missing("repLogic.startAngle"))?;
        let mid = logic.mid_angle.ok_or_else(|| missing("repLogic.midAngle"))?;
        let tolerance = raw.tolerance.unwrap_or(JointRoleSpec::DEFAULT_TOLERANCE);

        let mode = raw.tracking.unwrap_or(TrackingMode::Angle);

        let spec = JointRoleSpec::new(roles, start, mid, tolerance)
            .map_err(|e| Error::Config(format!("exercise '{name}': {e}")))?
            .with_mode(mode)
            .with_anchor(raw.rep_anchor.unwrap_or_else(|| mode.default_anchor()))
            .with_mirror_sides(raw.mirror_sides);
        let spec = match raw.fallback_joints {
            Some(fallback) => spec
                .with_fallback_roles(fallback)
                .map_err(|e| Error::Config(format!("exercise '{name}': {e}")))?,
            None => spec,
        };

        Ok(Self {
            target_body_part: raw.target_body_part.unwrap_or_default(),
            description: raw.description,
            instructions: raw.instructions,
            name,
            spec,
        })
    }
}

impl ExerciseDefinition {
    /// Parse and validate a single JSON definition
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawExercise = serde_json::from_str(json)?;
        raw.try_into()
    }

    /// Last segment of the pivot joint name, e.g. `wrist` for `left_wrist`
    pub fn pivot_label(&self) -> &str {
        let pivot = self.spec.roles().p2.as_str();
        pivot
            .strip_prefix("left_")
            .or_else(|| pivot.strip_prefix("right_"))
            .unwrap_or(pivot)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExerciseCatalog {
    exercises: Vec<ExerciseDefinition>,
}

impl ExerciseCatalog {
    /// Parse a JSON array of definitions; any invalid entry rejects the whole set
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: Vec<RawExercise> = serde_json::from_str(json)?;
        let exercises = raw
            .into_iter()
            .map(ExerciseDefinition::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { exercises })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// The exercise set seeded by the application backend
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_EXERCISES)
    }

    /// Case-insensitive lookup by name
    pub fn get(&self, name: &str) -> Option<&ExerciseDefinition> {
        self.exercises
            .iter()
            .find(|exercise| exercise.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExerciseDefinition> {
        self.exercises.iter()
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }
}

const BUILTIN_EXERCISES: &str = r#"[
  {
    "name": "Wrist Curls",
    "description": "Strengthen forearm flexors.",
    "instructions": ["Hold light weight.", "Curl wrist up and down."],
    "targetBodyPart": "Wrist",
    "trackedJoints": { "p1": "left_elbow", "p2": "left_wrist", "p3": "left_index" },
    "repLogic": { "startAngle": 170, "midAngle": 90 },
    "tracking": "motion",
    "mirrorSides": true
  },
  {
    "name": "Wrist Fixation",
    "description": "Isometric wrist stabilization in neutral position.",
    "instructions": ["Keep forearm supported.", "Hold wrist steady against gentle resistance."],
    "targetBodyPart": "Wrist",
    "trackedJoints": { "p1": "left_elbow", "p2": "left_wrist", "p3": "left_index" },
    "repLogic": { "startAngle": 170, "midAngle": 150 },
    "tolerance": 5,
    "tracking": "motion",
    "mirrorSides": true
  },
  {
    "name": "Wrist Rotations",
    "description": "Improve wrist mobility with rotational movement.",
    "instructions": ["Keep elbow still.", "Rotate wrist clockwise and counter-clockwise."],
    "targetBodyPart": "Wrist",
    "trackedJoints": { "p1": "left_elbow", "p2": "left_wrist", "p3": "left_index" },
    "repLogic": { "startAngle": 160, "midAngle": 100 },
    "tracking": "motion",
    "mirrorSides": true
  },
  {
    "name": "Jumping Jacks",
    "description": "Full-body cardio warmup.",
    "instructions": ["Jump feet apart and raise arms.", "Return to start, repeat."],
    "targetBodyPart": "Full Body",
    "trackedJoints": { "p1": "left_hip", "p2": "left_shoulder", "p3": "left_wrist" },
    "repLogic": { "startAngle": 160, "midAngle": 60 }
  },
  {
    "name": "Finger Flexions",
    "description": "Improve finger mobility.",
    "instructions": ["Open and close fist.", "Squeeze gently."],
    "targetBodyPart": "Hand",
    "trackedJoints": { "p1": "left_wrist", "p2": "left_index", "p3": "left_thumb" },
    "repLogic": { "startAngle": 150, "midAngle": 70 },
    "fallbackJoints": { "p1": "left_shoulder", "p2": "left_elbow", "p3": "left_wrist" }
  },
  {
    "name": "Neck Rotations",
    "description": "Gentle neck mobility.",
    "instructions": ["Rotate head left and right.", "Keep shoulders relaxed."],
    "targetBodyPart": "Neck",
    "trackedJoints": { "p1": "left_shoulder", "p2": "nose", "p3": "right_shoulder" },
    "repLogic": { "startAngle": 160, "midAngle": 80 }
  },
  {
    "name": "Squats",
    "description": "Lower body strength.",
    "instructions": ["Feet shoulder-width.", "Lower hips back and down."],
    "targetBodyPart": "Lower Body",
    "trackedJoints": { "p1": "left_hip", "p2": "left_knee", "p3": "left_ankle" },
    "repLogic": { "startAngle": 170, "midAngle": 90 }
  },
  {
    "name": "Hand Raises",
    "description": "Shoulder mobility and strength.",
    "instructions": ["Raise arms overhead.", "Lower slowly."],
    "targetBodyPart": "Shoulder",
    "trackedJoints": { "p1": "left_hip", "p2": "left_shoulder", "p3": "left_wrist" },
    "repLogic": { "startAngle": 60, "midAngle": 150 }
  },
  {
    "name": "Pendulum Swings",
    "description": "Gentle shoulder mobility.",
    "instructions": ["Lean over, let your arm hang.", "Swing it gently in circles."],
    "targetBodyPart": "Shoulder",
    "trackedJoints": { "p1": "left_hip", "p2": "left_shoulder", "p3": "left_elbow" },
    "repLogic": { "startAngle": 80, "midAngle": 100 },
    "tolerance": 5
  },
  {
    "name": "Wall Push-ups",
    "description": "Low-impact shoulder strengthening.",
    "instructions": ["Face a wall, hands on wall.", "Bend elbows, lean in, push out."],
    "targetBodyPart": "Shoulder",
    "trackedJoints": { "p1": "left_shoulder", "p2": "left_elbow", "p3": "left_wrist" },
    "repLogic": { "startAngle": 170, "midAngle": 90 }
  },
  {
    "name": "Seated Knee Flexion",
    "description": "Improve knee ROM.",
    "instructions": ["Sit on a chair.", "Slowly bend and straighten your knee."],
    "targetBodyPart": "Knee",
    "trackedJoints": { "p1": "left_hip", "p2": "left_knee", "p3": "left_ankle" },
    "repLogic": { "startAngle": 170, "midAngle": 80 }
  },
  {
    "name": "Glute Bridges",
    "description": "Strengthen glutes and lower back.",
    "instructions": ["Lie on your back.", "Lift your hips off the floor."],
    "targetBodyPart": "Hips",
    "trackedJoints": { "p1": "left_shoulder", "p2": "left_hip", "p3": "left_knee" },
    "repLogic": { "startAngle": 170, "midAngle": 120 }
  }
]"#;
