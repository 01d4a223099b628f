//! Keypoint snapshot sources.
//!
//! The pose-estimation collaborator is reached only through [`PoseSource`].
//! Live sessions feed snapshots over a channel; recorded sessions replay them
//! from memory or from a JSON-lines file.

use std::collections::VecDeque;
use std::path::Path;

use async_trait::async_trait;
use rehab_core::{Error, KeypointSnapshot, Result};
use tokio::sync::mpsc;

/// Producer of keypoint snapshots, one per video frame
#[async_trait]
pub trait PoseSource: Send {
    /// Next snapshot, `Ok(None)` once the stream has ended
    async fn next_snapshot(&mut self) -> Result<Option<KeypointSnapshot>>;

    /// Human-readable name for logs
    fn name(&self) -> &str;
}

/// Snapshots pushed by a live pose estimator
pub struct ChannelPoseSource {
    rx: mpsc::Receiver<KeypointSnapshot>,
}

impl ChannelPoseSource {
    pub fn new(rx: mpsc::Receiver<KeypointSnapshot>) -> Self {
        Self { rx }
    }

    /// Source plus the sender the estimator pushes into
    pub fn channel(capacity: usize) -> (mpsc::Sender<KeypointSnapshot>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl PoseSource for ChannelPoseSource {
    async fn next_snapshot(&mut self) -> Result<Option<KeypointSnapshot>> {
        // All senders dropped ends the stream
        Ok(self.rx.recv().await)
    }

    fn name(&self) -> &str {
        "channel"
    }
}

/// Recorded snapshots replayed in order
#[derive(Debug, Clone, Default)]
pub struct ReplayPoseSource {
    frames: VecDeque<KeypointSnapshot>,
}

impl ReplayPoseSource {
    pub fn new(frames: Vec<KeypointSnapshot>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    /// One JSON snapshot per line; blank lines are skipped
    pub fn from_json_lines(input: &str) -> Result<Self> {
        let frames = input
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line).map_err(|e| {
                    Error::Serialization(format!("snapshot on line {}: {e}", n + 1))
                })
            })
            .collect::<Result<Vec<KeypointSnapshot>>>()?;
        Ok(Self::new(frames))
    }

    pub fn from_json_lines_file(path: impl AsRef<Path>) -> Result<Self> {
        let input = std::fs::read_to_string(path)?;
        Self::from_json_lines(&input)
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

#[async_trait]
impl PoseSource for ReplayPoseSource {
    async fn next_snapshot(&mut self) -> Result<Option<KeypointSnapshot>> {
        Ok(self.frames.pop_front())
    }

    fn name(&self) -> &str {
        "replay"
    }
}
