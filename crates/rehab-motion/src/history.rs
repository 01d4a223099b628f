//! Bounded sample history for tracked joint positions.

use std::collections::VecDeque;

/// Fixed-capacity ring buffer of primary-axis positions; the oldest sample
/// is evicted once capacity is reached
#[derive(Debug, Clone)]
pub struct PositionHistory {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl PositionHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    /// Mean of the last `window` samples, or of all samples if fewer
    pub fn smoothed(&self, window: usize) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let take = window.clamp(1, self.samples.len());
        let sum: f64 = self.samples.iter().rev().take(take).sum();
        Some(sum / take as f64)
    }

    /// Previous raw sample minus latest raw sample; positive when the value
    /// decreases (an image point moving up)
    pub fn velocity(&self) -> Option<f64> {
        let n = self.samples.len();
        if n < 2 {
            return None;
        }
        Some(self.samples[n - 2] - self.samples[n - 1])
    }

    /// Max minus min over the whole window
    pub fn amplitude(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let (min, max) = self
            .samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        Some(max - min)
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.samples.iter()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = PositionHistory::new(30);
        for i in 0..45 {
            history.push(i as f64);
            assert!(history.len() <= 30);
        }
        assert_eq!(history.len(), 30);
        assert_eq!(history.iter().next().copied(), Some(15.0));
        assert_eq!(history.latest(), Some(44.0));
    }

    #[test]
    fn test_smoothing_short_and_full() {
        let mut history = PositionHistory::new(30);
        assert_eq!(history.smoothed(5), None);

        history.push(10.0);
        history.push(20.0);
        assert_eq!(history.smoothed(5), Some(15.0));

        for v in [30.0, 40.0, 50.0, 60.0] {
            history.push(v);
        }
        // last five: 20..60
        assert_eq!(history.smoothed(5), Some(40.0));
    }

    #[test]
    fn test_velocity_sign_and_amplitude() {
        let mut history = PositionHistory::new(30);
        history.push(200.0);
        assert_eq!(history.velocity(), None);

        history.push(190.0);
        assert_eq!(history.velocity(), Some(10.0));

        history.push(230.0);
        assert_eq!(history.velocity(), Some(-40.0));
        assert_eq!(history.amplitude(), Some(40.0));
    }
}
