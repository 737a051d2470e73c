//! Multi-channel audio buffer
//!
//! The buffer is the unit of exchange across the engine boundary: a set of
//! equal-length per-channel sample sequences plus a sample rate. Processors
//! never mutate a caller's buffer in place; they copy, transform, and return
//! a fresh one.

use serde::{Deserialize, Serialize};

use crate::{AriaError, AriaResult, Sample};

/// Multi-channel block of audio samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioBuffer {
    channels: Vec<Vec<Sample>>,
    sample_rate: f64,
}

impl AudioBuffer {
    /// Create a silent buffer with the given shape.
    pub fn silent(num_channels: usize, num_samples: usize, sample_rate: f64) -> Self {
        Self {
            channels: vec![vec![0.0; num_samples]; num_channels.max(1)],
            sample_rate,
        }
    }

    /// Build a buffer from channel data, validating the shape invariant.
    pub fn from_channels(channels: Vec<Vec<Sample>>, sample_rate: f64) -> AriaResult<Self> {
        if channels.is_empty() {
            return Err(AriaError::ShapeMismatch("buffer has no channels".into()));
        }
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(AriaError::InvalidSampleRate(sample_rate));
        }
        let len = channels[0].len();
        for (i, ch) in channels.iter().enumerate() {
            if ch.len() != len {
                return Err(AriaError::ShapeMismatch(format!(
                    "channel {} has {} samples, expected {}",
                    i,
                    ch.len(),
                    len
                )));
            }
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel.
    #[inline]
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &[Sample] {
        &self.channels[index]
    }

    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [Sample] {
        &mut self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<Sample>] {
        &self.channels
    }

    /// Absolute peak across all channels.
    pub fn peak(&self) -> Sample {
        self.channels
            .iter()
            .flat_map(|ch| ch.iter())
            .fold(0.0, |acc: f64, &x| acc.max(x.abs()))
    }

    /// RMS across all channels.
    pub fn rms(&self) -> Sample {
        let n = self.num_channels() * self.len();
        if n == 0 {
            return 0.0;
        }
        let sum: f64 = self
            .channels
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|&x| x * x)
            .sum();
        (sum / n as f64).sqrt()
    }

    /// True if every sample is finite (no NaN/Inf escaped a recurrence).
    pub fn is_finite(&self) -> bool {
        self.channels
            .iter()
            .all(|ch| ch.iter().all(|x| x.is_finite()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_validation() {
        let ok = AudioBuffer::from_channels(vec![vec![0.0; 4], vec![0.0; 4]], 48000.0);
        assert!(ok.is_ok());

        let bad = AudioBuffer::from_channels(vec![vec![0.0; 4], vec![0.0; 3]], 48000.0);
        assert!(matches!(bad, Err(AriaError::ShapeMismatch(_))));

        let empty = AudioBuffer::from_channels(vec![], 48000.0);
        assert!(empty.is_err());

        let bad_rate = AudioBuffer::from_channels(vec![vec![0.0; 4]], 0.0);
        assert!(matches!(bad_rate, Err(AriaError::InvalidSampleRate(_))));
    }

    #[test]
    fn test_peak_and_rms() {
        let buf =
            AudioBuffer::from_channels(vec![vec![0.5, -1.0, 0.0, 0.0]], 48000.0).unwrap();
        assert_eq!(buf.peak(), 1.0);
        assert!((buf.rms() - (1.25f64 / 4.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_json_roundtrip() {
        let buf = AudioBuffer::from_channels(vec![vec![0.25, -0.5]], 44100.0).unwrap();
        let json = serde_json::to_string(&buf).unwrap();
        let back: AudioBuffer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, buf);
    }
}
