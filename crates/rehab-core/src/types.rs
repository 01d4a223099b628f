//! Fundamental types for the rehab motion engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session identifier linking frames, events and the final summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Timestamp wrapper with nanosecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_nanos_opt().unwrap_or(0))
    }

    pub fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub fn from_millis(millis: i64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    pub fn as_nanos(&self) -> i64 {
        self.0
    }

    pub fn as_millis(&self) -> i64 {
        self.0 / 1_000_000
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    /// Milliseconds elapsed since `earlier`; negative if `earlier` is in the future
    pub fn millis_since(&self, earlier: Timestamp) -> i64 {
        self.0.saturating_sub(earlier.0) / 1_000_000
    }

    pub fn plus_millis(&self, millis: u64) -> Self {
        Self(self.0.saturating_add((millis as i64).saturating_mul(1_000_000)))
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.0)
    }
}

/// 2D position in image pixel space (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn to_nalgebra(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    /// Vector from `self` to `other`
    pub fn vector_to(&self, other: &Point2D) -> Vector2<f64> {
        other.to_nalgebra() - self.to_nalgebra()
    }

    pub fn distance_to(&self, other: &Self) -> f64 {
        self.vector_to(other).norm()
    }
}

/// A single named landmark detection with confidence score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub position: Point2D,
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, confidence: f32) -> Self {
        Self {
            position: Point2D::new(x, y),
            confidence,
        }
    }

    pub fn x(&self) -> f64 {
        self.position.x
    }

    pub fn y(&self) -> f64 {
        self.position.y
    }

    /// Strictly above the floor; a detection exactly at the floor is rejected
    pub fn is_confident(&self, floor: f32) -> bool {
        self.confidence > floor
    }
}

/// Joints the body-visibility gate and form checks look at
pub const BODY_JOINTS: [&str; 8] = [
    "left_shoulder",
    "right_shoulder",
    "left_hip",
    "right_hip",
    "left_knee",
    "right_knee",
    "left_ankle",
    "right_ankle",
];

/// All keypoints detected in one video frame.
///
/// Absence of a joint is normal. Names follow the pose model's snake_case
/// convention (`left_wrist`, `right_knee`, `nose`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeypointSnapshot {
    pub timestamp: Timestamp,
    pub keypoints: BTreeMap<String, Keypoint>,
}

impl KeypointSnapshot {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            keypoints: BTreeMap::new(),
        }
    }

    pub fn with_keypoint(mut self, name: &str, x: f64, y: f64, confidence: f32) -> Self {
        self.insert(name, Keypoint::new(x, y, confidence));
        self
    }

    pub fn insert(&mut self, name: &str, keypoint: Keypoint) {
        self.keypoints.insert(name.to_string(), keypoint);
    }

    pub fn get(&self, name: &str) -> Option<&Keypoint> {
        self.keypoints.get(name)
    }

    /// Keypoint by name, only if its confidence is above `floor`
    pub fn get_confident(&self, name: &str, floor: f32) -> Option<&Keypoint> {
        self.get(name).filter(|kp| kp.is_confident(floor))
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Coarse limb state used as the unit of repetition counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Resting / start position
    Extended,
    /// Active / mid position
    Flexed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Extended => "extended",
            Phase::Flexed => "flexed",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Phase::Extended => Phase::Flexed,
            Phase::Flexed => Phase::Extended,
        }
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Extended
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance() {
        let p1 = Point2D::new(0.0, 0.0);
        let p2 = Point2D::new(3.0, 4.0);
        assert!((p1.distance_to(&p2) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_timestamp_millis() {
        let t0 = Timestamp::from_millis(1_000);
        let t1 = t0.plus_millis(450);
        assert_eq!(t1.as_millis(), 1_450);
        assert_eq!(t1.millis_since(t0), 450);
        assert_eq!(t0.millis_since(t1), -450);
    }

    #[test]
    fn test_millis_since_saturates_on_extreme_timestamps() {
        let late = Timestamp::from_nanos(i64::MAX);
        let early = Timestamp::from_nanos(i64::MIN);
        assert_eq!(late.millis_since(early), i64::MAX / 1_000_000);
        assert_eq!(early.millis_since(late), i64::MIN / 1_000_000);
    }

    #[test]
    fn test_confidence_floor_is_exclusive() {
        let snapshot = KeypointSnapshot::new(Timestamp::from_millis(0))
            .with_keypoint("left_wrist", 10.0, 20.0, 0.2)
            .with_keypoint("left_elbow", 10.0, 40.0, 0.21);

        assert!(snapshot.get("left_wrist").is_some());
        assert!(snapshot.get_confident("left_wrist", 0.2).is_none());
        assert!(snapshot.get_confident("left_elbow", 0.2).is_some());
        assert!(snapshot.get_confident("nose", 0.0).is_none());
    }

    #[test]
    fn test_snapshot_json_roundtrip_keeps_names() {
        let snapshot = KeypointSnapshot::new(Timestamp::from_millis(33))
            .with_keypoint("nose", 320.0, 80.0, 0.9);
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: KeypointSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_phase_opposite() {
        assert_eq!(Phase::Extended.opposite(), Phase::Flexed);
        assert_eq!(Phase::default(), Phase::Extended);
        assert_eq!(Phase::Flexed.to_string(), "flexed");
    }
}
