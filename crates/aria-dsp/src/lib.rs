//! aria-dsp: Primitive library for the Aria DSP engine
//!
//! Stateful per-sample building blocks the effect and synthesizer
//! catalogues are composed from.
//!
//! ## Modules
//! - `biquad` - TDF-II biquad filters (RBJ cookbook coefficient design)
//! - `onepole` - one-pole lowpass/highpass and parameter smoothing
//! - `delay_line` - circular delay line with interpolated reads
//! - `comb` - all-pass diffusers and damped feedback combs
//! - `oscillator` - phase-accumulator oscillators and LFOs
//! - `envelope` - ADSR state machine and asymmetric envelope follower
//! - `pitch` - two-grain overlap pitch shifter
//! - `wavetable` - morphing wavetable bank
//! - `noise` - seedable noise sources

pub mod biquad;
pub mod comb;
pub mod delay_line;
pub mod envelope;
pub mod noise;
pub mod onepole;
pub mod oscillator;
pub mod pitch;
pub mod wavetable;

use aria_core::Sample;

/// Trait for all stateful DSP primitives and processors
pub trait Processor: Send {
    /// Reset internal state without discarding configuration
    fn reset(&mut self);

    /// Latency introduced by the processor, in samples
    fn latency(&self) -> usize {
        0
    }
}

/// Mono processor trait
pub trait MonoProcessor: Processor {
    /// Process a single sample
    fn process_sample(&mut self, input: Sample) -> Sample;

    /// Process a block of samples in place
    fn process_block(&mut self, buffer: &mut [Sample]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }
}

/// Stereo processor trait
pub trait StereoProcessor: Processor {
    /// Process a stereo sample pair
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample);

    /// Process stereo blocks in place
    fn process_block(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        debug_assert_eq!(left.len(), right.len());
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            (*l, *r) = self.process_sample(*l, *r);
        }
    }
}

/// Processor configuration for sample rate changes
pub trait ProcessorConfig {
    fn set_sample_rate(&mut self, sample_rate: f64);
}
