//! # Rehab-Session
//!
//! Session-level orchestration of the rehab motion engine.
//!
//! A [`SessionEngine`] is created per exercise session from a validated
//! [`ExerciseDefinition`] and owns all tracking state for that session. Hosts
//! either call [`SessionEngine::process_frame`] directly from their own frame
//! loop, or hand a [`PoseSource`] to a [`SessionPipeline`] that drives the
//! engine and broadcasts [`FrameUpdate`]s. When the session ends,
//! [`SessionEngine::finalize_session`] combines the counted repetitions with
//! the patient's [`SubjectiveFeedback`] into a [`SessionSummary`].

pub mod catalog;
pub mod config;
pub mod engine;
pub mod events;
pub mod pipeline;
pub mod source;
pub mod summary;

pub use catalog::*;
pub use config::*;
pub use engine::*;
pub use events::*;
pub use pipeline::*;
pub use source::*;
pub use summary::*;
