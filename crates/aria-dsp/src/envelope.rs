//! Envelope generators and followers
//!
//! The ADSR is an explicit five-state machine; segment durations are fixed
//! in seconds at `trigger()` time and converted to sample counts with the
//! sample rate in effect at that moment.

use aria_core::Sample;

use crate::{Processor, ProcessorConfig};

/// ADSR envelope stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdsrStage {
    #[default]
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// ADSR envelope generator
#[derive(Debug, Clone)]
pub struct Adsr {
    attack_seconds: f64,
    decay_seconds: f64,
    sustain_level: f64,
    release_seconds: f64,

    stage: AdsrStage,
    level: f64,
    counter: usize,
    attack_samples: usize,
    decay_samples: usize,
    release_samples: usize,
    release_start: f64,

    sample_rate: f64,
}

impl Adsr {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            attack_seconds: 0.01,
            decay_seconds: 0.1,
            sustain_level: 0.7,
            release_seconds: 0.2,
            stage: AdsrStage::Idle,
            level: 0.0,
            counter: 0,
            attack_samples: 1,
            decay_samples: 1,
            release_samples: 1,
            release_start: 0.0,
            sample_rate,
        }
    }

    /// Segment times in seconds; sustain is a level in [0, 1].
    pub fn set_adsr(&mut self, attack: f64, decay: f64, sustain: f64, release: f64) {
        self.attack_seconds = attack.max(0.0);
        self.decay_seconds = decay.max(0.0);
        self.sustain_level = sustain.clamp(0.0, 1.0);
        self.release_seconds = release.max(0.0);
    }

    pub fn stage(&self) -> AdsrStage {
        self.stage
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn is_active(&self) -> bool {
        self.stage != AdsrStage::Idle
    }

    /// Restart the envelope from the attack stage with a fresh counter.
    /// Segment sample counts are locked in here.
    pub fn trigger(&mut self) {
        self.attack_samples = self.to_samples(self.attack_seconds);
        self.decay_samples = self.to_samples(self.decay_seconds);
        self.release_samples = self.to_samples(self.release_seconds);
        self.stage = AdsrStage::Attack;
        self.counter = 0;
        self.level = 0.0;
    }

    /// Begin the release ramp from the current level, whatever stage the
    /// envelope is in, so the transition is continuous.
    pub fn release(&mut self) {
        if self.stage == AdsrStage::Idle {
            return;
        }
        self.release_samples = self.to_samples(self.release_seconds);
        self.release_start = self.level;
        self.stage = AdsrStage::Release;
        self.counter = 0;
    }

    fn to_samples(&self, seconds: f64) -> usize {
        ((seconds * self.sample_rate) as usize).max(1)
    }

    /// Advance one sample and return the current level.
    #[inline]
    pub fn process(&mut self) -> Sample {
        match self.stage {
            AdsrStage::Idle => {
                self.level = 0.0;
            }
            AdsrStage::Attack => {
                self.counter += 1;
                self.level = self.counter as f64 / self.attack_samples as f64;
                if self.counter >= self.attack_samples {
                    self.level = 1.0;
                    self.stage = AdsrStage::Decay;
                    self.counter = 0;
                }
            }
            AdsrStage::Decay => {
                self.counter += 1;
                let t = self.counter as f64 / self.decay_samples as f64;
                self.level = 1.0 - t * (1.0 - self.sustain_level);
                if self.counter >= self.decay_samples {
                    self.level = self.sustain_level;
                    self.stage = AdsrStage::Sustain;
                    self.counter = 0;
                }
            }
            AdsrStage::Sustain => {
                self.level = self.sustain_level;
            }
            AdsrStage::Release => {
                self.counter += 1;
                let t = self.counter as f64 / self.release_samples as f64;
                self.level = self.release_start * (1.0 - t);
                if self.counter >= self.release_samples {
                    self.level = 0.0;
                    self.stage = AdsrStage::Idle;
                    self.counter = 0;
                }
            }
        }
        self.level
    }
}

impl Processor for Adsr {
    fn reset(&mut self) {
        self.stage = AdsrStage::Idle;
        self.level = 0.0;
        self.counter = 0;
        self.release_start = 0.0;
    }
}

impl ProcessorConfig for Adsr {
    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }
}

/// Asymmetric one-pole peak detector
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    attack_coeff: f64,
    release_coeff: f64,
    envelope: f64,
    attack_ms: f64,
    release_ms: f64,
    sample_rate: f64,
}

impl EnvelopeFollower {
    pub fn new(sample_rate: f64) -> Self {
        let mut follower = Self {
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelope: 0.0,
            attack_ms: 10.0,
            release_ms: 100.0,
            sample_rate,
        };
        follower.set_times(10.0, 100.0);
        follower
    }

    /// Set attack and release times in milliseconds.
    pub fn set_times(&mut self, attack_ms: f64, release_ms: f64) {
        self.attack_ms = attack_ms.max(0.01);
        self.release_ms = release_ms.max(0.01);
        self.attack_coeff = (-1.0 / (self.attack_ms * 0.001 * self.sample_rate)).exp();
        self.release_coeff = (-1.0 / (self.release_ms * 0.001 * self.sample_rate)).exp();
    }

    #[inline(always)]
    pub fn process(&mut self, input: Sample) -> f64 {
        let abs_input = input.abs();
        let coeff = if abs_input > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = abs_input + coeff * (self.envelope - abs_input);
        self.envelope
    }

    pub fn current(&self) -> f64 {
        self.envelope
    }
}

impl Processor for EnvelopeFollower {
    fn reset(&mut self) {
        self.envelope = 0.0;
    }
}

impl ProcessorConfig for EnvelopeFollower {
    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.set_times(self.attack_ms, self.release_ms);
    }
}
