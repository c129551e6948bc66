//! Video frame sampling cadence.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Uniform frame sampling: `rate` frames per second, with the first frame
/// taken `phase` of a sampling period after the window start.
///
/// The default (1 fps, phase 0.5) takes one frame from the middle of every
/// second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameSampling {
    pub rate: f64,
    pub phase: f64,
}

impl Default for FrameSampling {
    fn default() -> Self {
        Self {
            rate: 1.0,
            phase: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SamplingError {
    #[error("frame rate must be positive, got {0}")]
    NonPositiveRate(f64),

    #[error("phase must be in [0, 1), got {0}")]
    PhaseOutOfRange(f64),
}

impl FrameSampling {
    pub fn new(rate: f64, phase: f64) -> Result<Self, SamplingError> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(SamplingError::NonPositiveRate(rate));
        }
        if !(0.0..1.0).contains(&phase) {
            return Err(SamplingError::PhaseOutOfRange(phase));
        }
        Ok(Self { rate, phase })
    }

    /// Sampling period in seconds.
    pub fn period(&self) -> f64 {
        1.0 / self.rate
    }

    /// Offset of the first sample from the window start.
    pub fn first_offset(&self) -> f64 {
        self.phase * self.period()
    }

    /// Timestamps sampled from `[start, end)`.
    pub fn sample_times(&self, start: f64, end: f64) -> Vec<f64> {
        let period = self.period();
        let first = start + self.first_offset();
        let mut times = Vec::new();
        let mut k = 0u64;
        loop {
            let t = first + k as f64 * period;
            if t >= end {
                break;
            }
            times.push(t);
            k += 1;
        }
        times
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_mid_second() {
        let sampling = FrameSampling::default();
        assert_eq!(sampling.sample_times(0.0, 3.0), vec![0.5, 1.5, 2.5]);
    }

    #[test]
    fn test_window_shorter_than_phase() {
        let sampling = FrameSampling::default();
        assert!(sampling.sample_times(0.0, 0.4).is_empty());
    }

    #[test]
    fn test_higher_rate() {
        let sampling = FrameSampling::new(2.0, 0.0).unwrap();
        assert_eq!(sampling.sample_times(10.0, 12.0), vec![10.0, 10.5, 11.0, 11.5]);
    }

    #[test]
    fn test_validation() {
        assert!(matches!(FrameSampling::new(0.0, 0.5), Err(SamplingError::NonPositiveRate(_))));
        assert!(matches!(FrameSampling::new(1.0, 1.0), Err(SamplingError::PhaseOutOfRange(_))));
        assert!(FrameSampling::new(0.5, 0.0).is_ok());
    }
}
