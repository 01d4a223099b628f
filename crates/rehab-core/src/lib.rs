//! # Rehab-Core
//!
//! Core types and utilities for the rehab motion engine: keypoint snapshots
//! produced by the pose-estimation collaborator, the shared error type and the
//! joint-angle geometry every tracking path is built on.

pub mod error;
pub mod geometry;
pub mod types;

pub use error::{Error, Result};
pub use geometry::*;
pub use types::*;
