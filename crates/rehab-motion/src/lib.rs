//! # Rehab-Motion
//!
//! Frame-level building blocks of repetition tracking.
//!
//! ## Tracking paths
//!
//! Each exercise declares a [`JointRoleSpec`]: three named joints (proximal,
//! pivot, distal) plus start and mid thresholds. Every frame the
//! [`JointResolver`] maps those roles onto confident keypoints, substituting
//! anatomical neighbours when fingertips or feet are not detected. Then one of
//! two paths produces a candidate phase:
//!
//! - **Angle**: the pivot angle is classified against the start and mid bands
//! - **Motion**: the [`MotionTracker`] follows the pivot's vertical position,
//!   relative to the proximal joint when visible, otherwise by smoothed
//!   velocity gated on movement amplitude
//!
//! ## Counting
//!
//! The [`RepetitionStateMachine`] turns candidate phases into counted
//! repetitions with a cool-down and a delayed completion signal, and the
//! [`FormEvaluator`] attaches posture feedback to each repetition.

pub mod form;
pub mod history;
pub mod machine;
pub mod resolver;
pub mod roles;
pub mod state;
pub mod tracker;

pub use form::*;
pub use history::*;
pub use machine::*;
pub use resolver::*;
pub use roles::*;
pub use state::*;
pub use tracker::*;
