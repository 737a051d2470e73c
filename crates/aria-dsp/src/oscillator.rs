//! Phase-accumulator oscillators and LFOs
//!
//! Readouts sample the current phase, then advance it by
//! `frequency / sample_rate`, so repeated `render()` calls stay
//! phase-continuous across block boundaries.

use std::f64::consts::PI;

use aria_core::Sample;

use crate::{Processor, ProcessorConfig};

const TWO_PI: f64 = 2.0 * PI;

/// Oscillator waveform
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Waveform {
    #[default]
    Sine,
    Triangle,
    Saw,
    Square,
    /// Variable-width pulse; width set separately.
    Pulse,
    /// Band-limited additive sawtooth (harmonics summed to Nyquist)
    BlSaw,
    /// Band-limited additive square (odd harmonics to Nyquist)
    BlSquare,
}

/// Audio-rate oscillator
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    frequency: f64,
    phase: f64,
    pulse_width: f64,
    sample_rate: f64,
}

impl Oscillator {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            waveform: Waveform::Sine,
            frequency: 440.0,
            phase: 0.0,
            pulse_width: 0.5,
            sample_rate,
        }
    }

    pub fn with_waveform(sample_rate: f64, waveform: Waveform) -> Self {
        let mut osc = Self::new(sample_rate);
        osc.waveform = waveform;
        osc
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency.clamp(0.0, self.sample_rate * 0.5);
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn set_pulse_width(&mut self, width: f64) {
        self.pulse_width = width.clamp(0.05, 0.95);
    }

    /// Phase in [0, 1).
    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn set_phase(&mut self, phase: f64) {
        self.phase = phase.rem_euclid(1.0);
    }

    #[inline]
    fn readout(&self, phase: f64) -> Sample {
        match self.waveform {
            Waveform::Sine => (TWO_PI * phase).sin(),
            Waveform::Triangle => {
                if phase < 0.5 {
                    4.0 * phase - 1.0
                } else {
                    3.0 - 4.0 * phase
                }
            }
            Waveform::Saw => 2.0 * phase - 1.0,
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Pulse => {
                if phase < self.pulse_width {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::BlSaw => {
                let harmonics = self.max_harmonics();
                let mut sum = 0.0;
                for k in 1..=harmonics {
                    sum += (TWO_PI * phase * k as f64).sin() / k as f64;
                }
                // 2/pi normalizes the full series to +-1.
                sum * (2.0 / PI)
            }
            Waveform::BlSquare => {
                let harmonics = self.max_harmonics();
                let mut sum = 0.0;
                let mut k = 1;
                while k <= harmonics {
                    sum += (TWO_PI * phase * k as f64).sin() / k as f64;
                    k += 2;
                }
                sum * (4.0 / PI)
            }
        }
    }

    fn max_harmonics(&self) -> usize {
        if self.frequency < 1.0 {
            return 1;
        }
        ((self.sample_rate * 0.5 / self.frequency).floor() as usize).clamp(1, 256)
    }

    /// Sample the current phase, then advance by one step.
    #[inline]
    pub fn process(&mut self) -> Sample {
        let out = self.readout(self.phase);
        self.advance();
        out
    }

    /// Sample with an added phase offset (for phase modulation), then advance.
    #[inline]
    pub fn process_pm(&mut self, phase_offset: f64) -> Sample {
        let out = self.readout((self.phase + phase_offset).rem_euclid(1.0));
        self.advance();
        out
    }

    #[inline]
    fn advance(&mut self) {
        self.phase += self.frequency / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
    }
}

impl Processor for Oscillator {
    fn reset(&mut self) {
        self.phase = 0.0;
    }
}

impl ProcessorConfig for Oscillator {
    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }
}

/// Low-frequency oscillator, unipolar or bipolar readout
#[derive(Debug, Clone)]
pub struct Lfo {
    osc: Oscillator,
}

impl Lfo {
    pub fn new(sample_rate: f64, frequency: f64, waveform: Waveform) -> Self {
        let mut osc = Oscillator::with_waveform(sample_rate, waveform);
        osc.set_frequency(frequency);
        Self { osc }
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.osc.set_frequency(frequency);
    }

    pub fn set_phase(&mut self, phase: f64) {
        self.osc.set_phase(phase);
    }

    /// Bipolar output in [-1, 1].
    #[inline]
    pub fn process(&mut self) -> Sample {
        self.osc.process()
    }

    /// Unipolar output in [0, 1].
    #[inline]
    pub fn process_unipolar(&mut self) -> Sample {
        self.osc.process() * 0.5 + 0.5
    }
}

impl Processor for Lfo {
    fn reset(&mut self) {
        self.osc.reset();
    }
}

impl ProcessorConfig for Lfo {
    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.osc.set_sample_rate(sample_rate);
    }
}
