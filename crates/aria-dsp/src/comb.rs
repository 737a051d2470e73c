//! All-pass and comb feedback networks
//!
//! The reverb building blocks: Schroeder all-pass sections diffuse phase
//! without coloring the magnitude response; feedback combs with a one-pole
//! damping filter in the loop form the decaying "tank".

use aria_core::Sample;

use crate::delay_line::DelayLine;
use crate::{MonoProcessor, Processor};

/// Schroeder all-pass diffuser
#[derive(Debug, Clone)]
pub struct AllpassDiffuser {
    line: DelayLine,
    delay_samples: usize,
    feedback: f64,
}

impl AllpassDiffuser {
    pub fn new(delay_samples: usize, feedback: f64) -> Self {
        let delay_samples = delay_samples.max(1);
        Self {
            line: DelayLine::new(delay_samples + 1),
            delay_samples,
            feedback: feedback.clamp(-0.999, 0.999),
        }
    }

    pub fn set_feedback(&mut self, feedback: f64) {
        self.feedback = feedback.clamp(-0.999, 0.999);
    }

    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }
}

impl Processor for AllpassDiffuser {
    fn reset(&mut self) {
        self.line.clear();
    }
}

impl MonoProcessor for AllpassDiffuser {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let delayed = self.line.read(self.delay_samples - 1);
        let node = input + delayed * self.feedback;
        self.line.write(node);
        delayed - node * self.feedback
    }
}

/// Feedback comb filter with one-pole damping inside the loop
#[derive(Debug, Clone)]
pub struct DampedComb {
    line: DelayLine,
    delay_samples: usize,
    feedback: f64,
    damping: f64,
    filter_state: f64,
}

impl DampedComb {
    pub fn new(delay_samples: usize, feedback: f64, damping: f64) -> Self {
        let delay_samples = delay_samples.max(1);
        Self {
            line: DelayLine::new(delay_samples + 1),
            delay_samples,
            feedback: feedback.clamp(0.0, 0.999),
            damping: damping.clamp(0.0, 0.999),
            filter_state: 0.0,
        }
    }

    /// Feedback gain targeting -60 dB at `decay_seconds` for this comb's
    /// loop length: `0.001^(delay / (decay * sample_rate))`.
    pub fn feedback_for_decay(delay_samples: usize, decay_seconds: f64, sample_rate: f64) -> f64 {
        let decay = decay_seconds.max(1e-3);
        0.001_f64
            .powf(delay_samples as f64 / (decay * sample_rate))
            .clamp(0.0, 0.999)
    }

    pub fn set_feedback(&mut self, feedback: f64) {
        self.feedback = feedback.clamp(0.0, 0.999);
    }

    pub fn set_damping(&mut self, damping: f64) {
        self.damping = damping.clamp(0.0, 0.999);
    }

    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }
}

impl Processor for DampedComb {
    fn reset(&mut self) {
        self.line.clear();
        self.filter_state = 0.0;
    }
}

impl MonoProcessor for DampedComb {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let delayed = self.line.read(self.delay_samples - 1);
        // Damping lowpass in the feedback path.
        self.filter_state = delayed + self.damping * (self.filter_state - delayed);
        self.line.write(input + self.filter_state * self.feedback);
        delayed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allpass_impulse_energy_conserved() {
        let mut ap = AllpassDiffuser::new(113, 0.5);
        let mut energy = 0.0;
        for i in 0..20_000 {
            let out = ap.process_sample(if i == 0 { 1.0 } else { 0.0 });
            energy += out * out;
        }
        // Unity-gain all-pass: impulse energy ~1 once the tail has rung out.
        assert!((energy - 1.0).abs() < 1e-3, "energy = {energy}");
    }

    #[test]
    fn test_comb_decays() {
        let mut comb = DampedComb::new(400, 0.8, 0.2);
        comb.process_sample(1.0);
        let mut peak_late: f64 = 0.0;
        for i in 0..48_000 {
            let out = comb.process_sample(0.0);
            if i > 40_000 {
                peak_late = peak_late.max(out.abs());
            }
        }
        assert!(peak_late < 1e-3);
    }

    #[test]
    fn test_feedback_for_decay_law() {
        let sr = 48000.0;
        let fb = DampedComb::feedback_for_decay(1557, 2.0, sr);
        let expected = 0.001_f64.powf(1557.0 / (2.0 * sr));
        assert!((fb - expected).abs() < 1e-12);
        // Longer decay → feedback closer to 1.
        assert!(DampedComb::feedback_for_decay(1557, 10.0, sr) > fb);
    }

    #[test]
    fn test_reset_silences() {
        let mut comb = DampedComb::new(64, 0.9, 0.3);
        for _ in 0..256 {
            comb.process_sample(1.0);
        }
        comb.reset();
        assert_eq!(comb.process_sample(0.0), 0.0);
    }
}
