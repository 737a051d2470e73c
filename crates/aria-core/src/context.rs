//! Per-call render context

use serde::{Deserialize, Serialize};

/// Read-only configuration for a single `process()`/`render()` call.
///
/// Processors may read it but never mutate it; tempo and time exist so that
/// tempo-synced processors can derive delay times without owning a clock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DspContext {
    pub sample_rate: f64,
    pub block_size: usize,
    pub tempo_bpm: f64,
    /// Transport time at the start of the block, in seconds.
    pub time_seconds: f64,
}

impl DspContext {
    pub fn new(sample_rate: f64, block_size: usize) -> Self {
        Self {
            sample_rate,
            block_size,
            tempo_bpm: 120.0,
            time_seconds: 0.0,
        }
    }

    /// Duration of one quarter note in seconds.
    #[inline]
    pub fn beat_seconds(&self) -> f64 {
        60.0 / self.tempo_bpm.max(1.0)
    }

    #[inline]
    pub fn seconds_to_samples(&self, seconds: f64) -> usize {
        (seconds * self.sample_rate).round().max(0.0) as usize
    }
}

impl Default for DspContext {
    fn default() -> Self {
        Self::new(crate::DEFAULT_SAMPLE_RATE, 512)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beat_seconds() {
        let mut ctx = DspContext::new(48000.0, 256);
        ctx.tempo_bpm = 120.0;
        assert_eq!(ctx.beat_seconds(), 0.5);
        assert_eq!(ctx.seconds_to_samples(0.5), 24000);
    }
}
