//! Grain-based pitch shifter
//!
//! Two read taps sweep a shared delay line at a rate offset from the write
//! cursor, crossfaded so one tap is always near full gain while the other
//! wraps. This is a cheap time-domain approximation: expect audible grain
//! artifacts and comb coloration on broadband material, not phase-vocoder
//! transparency.

use std::f64::consts::PI;

use aria_core::Sample;

use crate::delay_line::DelayLine;
use crate::{MonoProcessor, Processor, ProcessorConfig};

/// Two-grain overlap/crossfade pitch shifter
#[derive(Debug, Clone)]
pub struct GrainPitchShifter {
    line: DelayLine,
    window_samples: f64,
    ratio: f64,
    phase: f64,
    sample_rate: f64,
}

impl GrainPitchShifter {
    /// `window_ms` sets the grain length; 30-60 ms suits most material.
    pub fn new(sample_rate: f64, window_ms: f64) -> Self {
        let window_samples = (window_ms.clamp(5.0, 200.0) * 0.001 * sample_rate).round();
        Self {
            line: DelayLine::new(window_samples as usize + 4),
            window_samples,
            ratio: 1.0,
            phase: 0.0,
            sample_rate,
        }
    }

    /// Pitch ratio (2.0 = up one octave, 0.5 = down one octave).
    pub fn set_ratio(&mut self, ratio: f64) {
        self.ratio = ratio.clamp(0.25, 4.0);
    }

    pub fn set_semitones(&mut self, semitones: f64) {
        self.set_ratio(2.0_f64.powf(semitones.clamp(-24.0, 24.0) / 12.0));
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    #[inline]
    fn tap(&self, phase: f64) -> Sample {
        let delay = phase * (self.window_samples - 2.0);
        let gain = (PI * phase).sin();
        self.line.read_interpolated(delay) * gain * gain
    }
}

impl Processor for GrainPitchShifter {
    fn reset(&mut self) {
        self.line.clear();
        self.phase = 0.0;
    }
}

impl MonoProcessor for GrainPitchShifter {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        self.line.write(input);

        let a = self.tap(self.phase);
        let b = self.tap((self.phase + 0.5).rem_euclid(1.0));

        // Tap delay grows at (1 - ratio) per sample, so the read head moves
        // through the buffer at the requested ratio.
        self.phase = (self.phase + (1.0 - self.ratio) / self.window_samples).rem_euclid(1.0);

        a + b
    }
}

impl ProcessorConfig for GrainPitchShifter {
    fn set_sample_rate(&mut self, sample_rate: f64) {
        let window_seconds = self.window_samples / self.sample_rate;
        self.sample_rate = sample_rate;
        self.window_samples = (window_seconds * sample_rate).round();
        self.line = DelayLine::new(self.window_samples as usize + 4);
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dominant_period(signal: &[f64]) -> f64 {
        // Count zero crossings in the analysis region.
        let mut crossings = 0;
        for w in signal.windows(2) {
            if w[0] <= 0.0 && w[1] > 0.0 {
                crossings += 1;
            }
        }
        signal.len() as f64 / crossings.max(1) as f64
    }

    #[test]
    fn test_unity_ratio_passes_signal() {
        let sr = 48000.0;
        let mut shifter = GrainPitchShifter::new(sr, 40.0);
        shifter.set_ratio(1.0);
        let mut out = Vec::new();
        for i in 0..9600 {
            let t = i as f64 / sr;
            out.push(shifter.process_sample((2.0 * PI * 440.0 * t).sin()));
        }
        let late = &out[4800..];
        let rms = (late.iter().map(|x| x * x).sum::<f64>() / late.len() as f64).sqrt();
        assert!(rms > 0.3, "unity shift lost the signal, rms = {rms}");
    }

    #[test]
    fn test_octave_up_doubles_frequency() {
        let sr = 48000.0;
        let mut shifter = GrainPitchShifter::new(sr, 40.0);
        shifter.set_semitones(12.0);
        let mut out = Vec::new();
        for i in 0..48000 {
            let t = i as f64 / sr;
            out.push(shifter.process_sample((2.0 * PI * 200.0 * t).sin()));
        }
        // Input period 240 samples; expect roughly 120 after the shift.
        let period = dominant_period(&out[24000..]);
        assert!(
            (100.0..140.0).contains(&period),
            "expected ~120-sample period, got {period}"
        );
    }

    #[test]
    fn test_silence_in_silence_out() {
        let mut shifter = GrainPitchShifter::new(48000.0, 30.0);
        shifter.set_semitones(7.0);
        for _ in 0..4096 {
            assert_eq!(shifter.process_sample(0.0), 0.0);
        }
    }
}
