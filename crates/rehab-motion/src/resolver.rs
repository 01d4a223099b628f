//! Mapping abstract joint roles to concrete detected keypoints.
//!
//! The pose model only detects 17 body landmarks, so exercises that ask for
//! hand or foot detail (fingertips, thumbs, heels) are measured on the nearest
//! detected joint instead. That substitution changes what is being measured:
//! a "finger flexion" angle computed on the wrist is a wrist angle. The table
//! is kept here, in one reviewed place, and every substitution is reported
//! back to the caller so it can tell the patient.

use rehab_core::{Error, Keypoint, KeypointSnapshot, Result};
use serde::{Deserialize, Serialize};

use crate::roles::{JointRoleSpec, RoleTriple};

/// Requested joint -> detected joint measured in its place
pub static FALLBACK_TABLE: &[(&str, &str)] = &[
    ("left_index", "left_wrist"),
    ("right_index", "right_wrist"),
    ("left_thumb", "left_wrist"),
    ("right_thumb", "right_wrist"),
    ("left_pinky", "left_wrist"),
    ("right_pinky", "right_wrist"),
    ("left_heel", "left_ankle"),
    ("right_heel", "right_ankle"),
    ("left_foot_index", "left_ankle"),
    ("right_foot_index", "right_ankle"),
];

pub fn fallback_for(name: &str) -> Option<&'static str> {
    FALLBACK_TABLE
        .iter()
        .find(|(requested, _)| *requested == name)
        .map(|(_, substitute)| *substitute)
}

/// Confidence floors per role
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Floor for the pivot joint; the angle vertex is the most sensitive role
    pub pivot_min_confidence: f32,
    /// Floor for the proximal and distal reference joints
    pub reference_min_confidence: f32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            pivot_min_confidence: 0.3,
            reference_min_confidence: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Proximal,
    Pivot,
    Distal,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Proximal => "proximal",
            Role::Pivot => "pivot",
            Role::Distal => "distal",
        }
    }
}

/// A role bound to the keypoint that fills it
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedJoint {
    pub requested: String,
    /// Joint actually used; differs from `requested` after a substitution
    pub used: String,
    pub keypoint: Keypoint,
}

impl ResolvedJoint {
    pub fn is_substitute(&self) -> bool {
        self.requested != self.used
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedJoints {
    pub p1: ResolvedJoint,
    pub p2: ResolvedJoint,
    pub p3: ResolvedJoint,
}

impl ResolvedJoints {
    /// `(requested, used)` pairs for every substituted role
    pub fn substitutions(&self) -> Vec<(&str, &str)> {
        [&self.p1, &self.p2, &self.p3]
            .into_iter()
            .filter(|joint| joint.is_substitute())
            .map(|joint| (joint.requested.as_str(), joint.used.as_str()))
            .collect()
    }

    /// Substitution mapped the pivot onto a reference joint, so no angle exists
    pub fn is_collapsed(&self) -> bool {
        self.p2.used == self.p1.used || self.p2.used == self.p3.used
    }

    /// The role triple these joints were resolved for
    pub fn requested(&self) -> RoleTriple {
        RoleTriple::new(&self.p1.requested, &self.p2.requested, &self.p3.requested)
    }

    pub fn total_confidence(&self) -> f32 {
        self.p1.keypoint.confidence + self.p2.keypoint.confidence + self.p3.keypoint.confidence
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(ResolvedJoints),
    Unresolved { missing: Vec<Role> },
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    pub fn into_result(self) -> Result<ResolvedJoints> {
        match self {
            Resolution::Resolved(joints) => Ok(joints),
            Resolution::Unresolved { missing } => Err(Error::UnresolvedJoints {
                missing: missing.iter().map(|role| role.as_str().to_string()).collect(),
            }),
        }
    }
}

/// Role-to-keypoint lookup with fallback substitution
#[derive(Debug, Clone, Default)]
pub struct JointResolver {
    config: ResolverConfig,
}

impl JointResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn floor_for(&self, role: Role) -> f32 {
        match role {
            Role::Pivot => self.config.pivot_min_confidence,
            Role::Proximal | Role::Distal => self.config.reference_min_confidence,
        }
    }

    /// Look up one joint, retrying with its fallback-table substitute
    pub fn resolve_joint(
        &self,
        snapshot: &KeypointSnapshot,
        name: &str,
        floor: f32,
    ) -> Option<ResolvedJoint> {
        if let Some(kp) = snapshot.get_confident(name, floor) {
            return Some(ResolvedJoint {
                requested: name.to_string(),
                used: name.to_string(),
                keypoint: *kp,
            });
        }

        let substitute = fallback_for(name)?;
        let kp = snapshot.get_confident(substitute, floor)?;
        tracing::debug!(requested = name, used = substitute, "Joint substituted");

        Some(ResolvedJoint {
            requested: name.to_string(),
            used: substitute.to_string(),
            keypoint: *kp,
        })
    }

    /// Resolve all three roles or report which ones are missing
    pub fn resolve(&self, snapshot: &KeypointSnapshot, roles: &RoleTriple) -> Resolution {
        let p1 = self.resolve_joint(snapshot, &roles.p1, self.floor_for(Role::Proximal));
        let p2 = self.resolve_joint(snapshot, &roles.p2, self.floor_for(Role::Pivot));
        let p3 = self.resolve_joint(snapshot, &roles.p3, self.floor_for(Role::Distal));

        match (p1, p2, p3) {
            (Some(p1), Some(p2), Some(p3)) => Resolution::Resolved(ResolvedJoints { p1, p2, p3 }),
            (p1, p2, p3) => {
                let missing = [
                    (Role::Proximal, p1.is_none()),
                    (Role::Pivot, p2.is_none()),
                    (Role::Distal, p3.is_none()),
                ]
                .into_iter()
                .filter(|(_, absent)| *absent)
                .map(|(role, _)| role)
                .collect();
                Resolution::Unresolved { missing }
            }
        }
    }

    /// Pick the body side whose joints the detector sees best.
    ///
    /// Without `mirror_sides` this is always the declared triple. Ties keep the
    /// declared side.
    pub fn pick_side(&self, snapshot: &KeypointSnapshot, spec: &JointRoleSpec) -> RoleTriple {
        let declared = spec.roles().clone();
        if !spec.mirror_sides() {
            return declared;
        }

        let mirrored = declared.mirrored();
        if side_score(snapshot, &mirrored) > side_score(snapshot, &declared) {
            mirrored
        } else {
            declared
        }
    }

    /// Resolve on the better-detected side, then on the role spec's fallback roles.
    ///
    /// The fallback triple is tried when the primary roles are unresolved or
    /// collapsed onto a single joint by substitution. A collapsed triple is
    /// never returned: with no usable fallback it reports the pivot missing.
    pub fn resolve_spec(&self, snapshot: &KeypointSnapshot, spec: &JointRoleSpec) -> Resolution {
        let primary = match self.resolve(snapshot, &self.pick_side(snapshot, spec)) {
            Resolution::Resolved(joints) if !joints.is_collapsed() => {
                return Resolution::Resolved(joints);
            }
            Resolution::Resolved(joints) => {
                tracing::debug!(pivot = %joints.p2.used, "Primary roles collapsed by substitution");
                Resolution::Unresolved {
                    missing: vec![Role::Pivot],
                }
            }
            unresolved => unresolved,
        };

        match spec.fallback_roles() {
            Some(fallback) => match self.resolve(snapshot, fallback) {
                Resolution::Resolved(joints) => {
                    tracing::debug!(p2 = %fallback.p2, "Resolved on fallback roles");
                    Resolution::Resolved(joints)
                }
                Resolution::Unresolved { .. } => primary,
            },
            None => primary,
        }
    }

    /// Number of `names` present above `floor`
    pub fn count_visible(snapshot: &KeypointSnapshot, names: &[&str], floor: f32) -> usize {
        names
            .iter()
            .filter(|name| snapshot.get_confident(name, floor).is_some())
            .count()
    }
}

/// Summed raw confidence of a triple; absent joints score zero
fn side_score(snapshot: &KeypointSnapshot, roles: &RoleTriple) -> f32 {
    roles
        .names()
        .iter()
        .map(|name| {
            snapshot
                .get(name)
                .or_else(|| fallback_for(name).and_then(|alt| snapshot.get(alt)))
                .map_or(0.0, |kp| kp.confidence)
        })
        .sum()
}
