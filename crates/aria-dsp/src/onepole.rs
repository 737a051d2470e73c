//! One-pole filters
//!
//! Cheap smoothing and tone shaping: a single coefficient, a single state
//! sample. Used standalone for parameter smoothing and inside feedback
//! paths (comb damping, envelope shaping) where a biquad would be overkill.

use std::f64::consts::PI;

use aria_core::Sample;

use crate::biquad::clamp_freq;
use crate::{MonoProcessor, Processor, ProcessorConfig};

/// One-pole filter mode
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum OnePoleMode {
    #[default]
    Lowpass,
    Highpass,
}

/// One-pole lowpass/highpass filter
#[derive(Debug, Clone)]
pub struct OnePole {
    mode: OnePoleMode,
    coeff: f64,
    state: f64,
    sample_rate: f64,
}

impl OnePole {
    pub fn new(sample_rate: f64) -> Self {
        let mut filter = Self {
            mode: OnePoleMode::Lowpass,
            coeff: 0.0,
            state: 0.0,
            sample_rate,
        };
        filter.set_cutoff(1000.0);
        filter
    }

    pub fn lowpass(sample_rate: f64, cutoff: f64) -> Self {
        let mut filter = Self::new(sample_rate);
        filter.set_mode(OnePoleMode::Lowpass);
        filter.set_cutoff(cutoff);
        filter
    }

    pub fn highpass(sample_rate: f64, cutoff: f64) -> Self {
        let mut filter = Self::new(sample_rate);
        filter.set_mode(OnePoleMode::Highpass);
        filter.set_cutoff(cutoff);
        filter
    }

    pub fn set_mode(&mut self, mode: OnePoleMode) {
        self.mode = mode;
    }

    pub fn set_cutoff(&mut self, cutoff: f64) {
        let cutoff = clamp_freq(cutoff, self.sample_rate);
        self.coeff = (-2.0 * PI * cutoff / self.sample_rate).exp();
    }

    /// Set the smoothing coefficient directly (0 = no smoothing, →1 = heavy).
    pub fn set_coeff(&mut self, coeff: f64) {
        self.coeff = coeff.clamp(0.0, 0.9999);
    }

    #[inline]
    pub fn state(&self) -> f64 {
        self.state
    }
}

impl Processor for OnePole {
    fn reset(&mut self) {
        self.state = 0.0;
    }
}

impl MonoProcessor for OnePole {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let low = input + self.coeff * (self.state - input);
        self.state = low;
        match self.mode {
            OnePoleMode::Lowpass => low,
            OnePoleMode::Highpass => input - low,
        }
    }
}

impl ProcessorConfig for OnePole {
    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }
}

/// First-order DC blocker (high-pass around 5 Hz)
///
/// Feedback networks accumulate sub-audio energy; a blocker in the loop
/// keeps long reverb tails from drifting off zero.
#[derive(Debug, Clone, Default)]
pub struct DcBlocker {
    prev_in: f64,
    prev_out: f64,
}

impl DcBlocker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Processor for DcBlocker {
    fn reset(&mut self) {
        self.prev_in = 0.0;
        self.prev_out = 0.0;
    }
}

impl MonoProcessor for DcBlocker {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        // y[n] = x[n] - x[n-1] + R * y[n-1], R = 0.9995 (~5 Hz @ 48 kHz)
        let output = input - self.prev_in + 0.9995 * self.prev_out;
        self.prev_in = input;
        self.prev_out = output;
        output
    }
}
