//! Error types for the rehab motion engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unresolved joints: {}", .missing.join(", "))]
    UnresolvedJoints { missing: Vec<String> },

    #[error("Degenerate geometry: zero-length ray at joint {0}")]
    DegenerateGeometry(String),

    #[error("Stale history: need {required} samples, have {available}")]
    StaleHistory { required: usize, available: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Pose source error: {0}")]
    Source(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_message_lists_roles() {
        let err = Error::UnresolvedJoints {
            missing: vec!["pivot".into(), "distal".into()],
        };
        assert_eq!(err.to_string(), "Unresolved joints: pivot, distal");
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
