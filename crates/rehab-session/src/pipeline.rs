//! Async frame-processing loop for one session.
//!
//! The pipeline pulls snapshots from a [`PoseSource`], runs one synchronous
//! [`SessionEngine::process_frame`] pass per snapshot and broadcasts every
//! [`FrameUpdate`]. It stops on an explicit stop request, when the session
//! completes, or when the source ends or fails, and always hands the engine
//! back so the session can still be finalized.

use std::time::Duration;

use rehab_core::Timestamp;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

use crate::engine::SessionEngine;
use crate::events::FrameUpdate;
use crate::source::PoseSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Stop requested through [`PipelineControl`]
    Stopped,
    /// The session-complete signal fired
    SessionComplete,
    SourceExhausted,
    SourceFailed(String),
}

/// Handle for stopping a running pipeline
#[derive(Debug, Clone)]
pub struct PipelineControl {
    stop: watch::Sender<bool>,
}

impl PipelineControl {
    pub fn stop(&self) {
        // The pipeline may already have finished
        let _ = self.stop.send(true);
    }
}

pub struct SessionPipeline {
    engine: SessionEngine,
    updates: broadcast::Sender<FrameUpdate>,
    stop: watch::Receiver<bool>,
}

impl SessionPipeline {
    pub fn new(engine: SessionEngine, update_capacity: usize) -> (Self, PipelineControl) {
        let (updates, _) = broadcast::channel(update_capacity.max(1));
        let (stop_tx, stop) = watch::channel(false);
        (
            Self {
                engine,
                updates,
                stop,
            },
            PipelineControl { stop: stop_tx },
        )
    }

    /// Receive every frame update from now on; slow receivers may lag
    pub fn subscribe(&self) -> broadcast::Receiver<FrameUpdate> {
        self.updates.subscribe()
    }

    pub fn engine(&self) -> &SessionEngine {
        &self.engine
    }

    /// Process frames until a stop condition.
    ///
    /// `source.next_snapshot()` is dropped whenever another branch wins the
    /// select, so sources must be cancel safe.
    pub async fn run<S: PoseSource>(mut self, mut source: S) -> (SessionEngine, StopReason) {
        let completion_delay = Duration::from_millis(self.engine.config().machine.completion_delay_ms);
        let completion_timer = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(completion_timer);
        let mut completion_armed = false;
        let mut stop_open = true;

        tracing::info!(
            session = %self.engine.session_id(),
            source = source.name(),
            "Session pipeline started"
        );

        let stopped_early = *self.stop.borrow();
        let reason = if stopped_early {
            StopReason::Stopped
        } else {
            loop {
                tokio::select! {
                    biased;

                    changed = self.stop.changed(), if stop_open => match changed {
                        Ok(()) if *self.stop.borrow() => break StopReason::Stopped,
                        Ok(()) => {}
                        // Control dropped without stopping; keep running
                        Err(_) => stop_open = false,
                    },

                    _ = &mut completion_timer, if completion_armed => {
                        completion_armed = false;
                        let now = self.engine.completion_deadline().unwrap_or_else(Timestamp::now);
                        if let Some(update) = self.engine.flush_completion(now) {
                            self.publish(update);
                            break StopReason::SessionComplete;
                        }
                    }

                    next = source.next_snapshot() => match next {
                        Ok(Some(snapshot)) => {
                            let update = self.engine.process_frame(&snapshot);
                            let complete = update.is_complete();
                            if update.reached_target() && !complete {
                                completion_timer.as_mut().reset(Instant::now() + completion_delay);
                                completion_armed = true;
                            }
                            self.publish(update);
                            if complete {
                                break StopReason::SessionComplete;
                            }
                            tokio::task::yield_now().await;
                        }
                        Ok(None) => break StopReason::SourceExhausted,
                        Err(e) => {
                            tracing::warn!(error = %e, source = source.name(), "Pose source failed");
                            break StopReason::SourceFailed(e.to_string());
                        }
                    },
                }
            }
        };

        tracing::info!(
            session = %self.engine.session_id(),
            reason = ?reason,
            reps = self.engine.rep_count(),
            "Session pipeline stopped"
        );
        (self.engine, reason)
    }

    fn publish(&self, update: FrameUpdate) {
        // No subscribers is fine
        let _ = self.updates.send(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ExerciseCatalog;
    use crate::config::EngineConfig;
    use crate::source::{ChannelPoseSource, ReplayPoseSource};
    use async_trait::async_trait;
    use rehab_core::{Error, KeypointSnapshot, Result};

    fn engine(target: u32, completion_delay_ms: u64) -> SessionEngine {
        let exercise = ExerciseCatalog::builtin().unwrap().get("Wall Push-ups").unwrap().clone();
        let mut config = EngineConfig::default();
        config.machine.completion_delay_ms = completion_delay_ms;
        SessionEngine::new(exercise, target, config).unwrap()
    }

    fn frame(ms: i64, elbow_angle: f64) -> KeypointSnapshot {
        let rad = elbow_angle.to_radians();
        KeypointSnapshot::new(Timestamp::from_millis(ms))
            .with_keypoint("left_shoulder", 300.0, 200.0, 0.9)
            .with_keypoint("right_shoulder", 200.0, 200.0, 0.9)
            .with_keypoint("left_hip", 290.0, 400.0, 0.9)
            .with_keypoint("right_hip", 210.0, 400.0, 0.9)
            .with_keypoint("left_elbow", 400.0, 200.0, 0.9)
            .with_keypoint("left_wrist", 400.0 - 80.0 * rad.cos(), 200.0 + 80.0 * rad.sin(), 0.9)
    }

    fn frames(angles: &[f64]) -> Vec<KeypointSnapshot> {
        angles
            .iter()
            .enumerate()
            .map(|(i, angle)| frame(i as i64 * 500, *angle))
            .collect()
    }

    struct FailingSource;

    #[async_trait]
    impl PoseSource for FailingSource {
        async fn next_snapshot(&mut self) -> Result<Option<KeypointSnapshot>> {
            Err(Error::Source("camera disconnected".into()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_returns_engine_when_source_ends() {
        let (pipeline, _control) = SessionPipeline::new(engine(10, 600), 64);
        let mut updates = pipeline.subscribe();
        let source = ReplayPoseSource::new(frames(&[170.0, 90.0, 170.0, 90.0, 170.0]));

        let (engine, reason) = pipeline.run(source).await;

        assert_eq!(reason, StopReason::SourceExhausted);
        assert_eq!(engine.rep_count(), 2);

        let mut received = 0;
        while updates.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 5);
    }

    #[tokio::test]
    async fn test_stops_when_session_completes_on_frame() {
        let (pipeline, _control) = SessionPipeline::new(engine(1, 600), 64);
        // The frame at 2000 ms passes the completion deadline; the last frame is never read
        let source = ReplayPoseSource::new(frames(&[170.0, 90.0, 170.0, 170.0, 170.0, 90.0]));

        let (engine, reason) = pipeline.run(source).await;

        assert_eq!(reason, StopReason::SessionComplete);
        assert!(engine.is_complete());
        assert_eq!(engine.phase(), rehab_core::Phase::Extended);
    }

    #[tokio::test]
    async fn test_completion_timer_fires_without_frames() {
        let (pipeline, _control) = SessionPipeline::new(engine(1, 20), 64);
        let mut updates = pipeline.subscribe();
        let (tx, source) = ChannelPoseSource::channel(8);

        for snapshot in frames(&[170.0, 90.0, 170.0]) {
            tx.send(snapshot).await.unwrap();
        }

        // Sender stays alive, so only the timer can end the session
        let (engine, reason) = pipeline.run(source).await;
        drop(tx);

        assert_eq!(reason, StopReason::SessionComplete);
        assert_eq!(engine.rep_count(), 1);

        let mut last = None;
        while let Ok(update) = updates.try_recv() {
            last = Some(update);
        }
        let last = last.unwrap();
        assert!(last.is_complete());
        assert_eq!(last.feedback_text, "Session Complete! 1/1 reps completed.");
    }

    #[tokio::test]
    async fn test_explicit_stop() {
        let (pipeline, control) = SessionPipeline::new(engine(10, 600), 64);
        let mut updates = pipeline.subscribe();
        let (tx, source) = ChannelPoseSource::channel(8);
        let task = tokio::spawn(pipeline.run(source));

        tx.send(frame(0, 170.0)).await.unwrap();
        tx.send(frame(500, 90.0)).await.unwrap();
        tx.send(frame(1_000, 170.0)).await.unwrap();
        updates.recv().await.unwrap();
        let flexed = updates.recv().await.unwrap();
        assert_eq!(flexed.rep_count, 0);
        let returned = updates.recv().await.unwrap();
        assert_eq!(returned.rep_count, 1);

        control.stop();
        let (engine, reason) = task.await.unwrap();

        assert_eq!(reason, StopReason::Stopped);
        assert_eq!(engine.rep_count(), 1);
    }

    #[tokio::test]
    async fn test_source_failure_keeps_counts() {
        let (pipeline, _control) = SessionPipeline::new(engine(10, 600), 64);
        let (engine, reason) = pipeline.run(FailingSource).await;

        assert!(matches!(reason, StopReason::SourceFailed(msg) if msg.contains("camera disconnected")));
        assert_eq!(engine.rep_count(), 0);
    }
}
