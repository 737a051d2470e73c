//! aria-synth: Instrument synthesizers
//!
//! Ninety voices in nine families, all behind [`InstrumentSynth`]. Every
//! synth renders stereo, keeps phase across `render()` calls, and adapts
//! to the context sample rate on the first call that carries a new one.

use aria_core::{AriaError, AriaResult, AudioBuffer, DspContext, Sample};

pub mod analog;
pub mod bass;
pub mod drums;
pub mod fm;
pub mod pads;
pub mod piano;
pub mod plucked;
pub mod strings;
pub mod wavetable_synth;

/// A playable instrument voice.
///
/// One instance renders one voice; callers own instances exclusively and
/// drive them with `note_on`/`note_off` around `render()` calls. `render`
/// is phase-continuous: two back-to-back half-size blocks produce the same
/// samples as one full block.
pub trait InstrumentSynth: Send {
    /// Start a note at `frequency` Hz with velocity in [0, 1].
    fn note_on(&mut self, frequency: f64, velocity: f64, ctx: &DspContext);

    /// Release the current note; the voice rings out until `is_active()`
    /// goes false.
    fn note_off(&mut self, ctx: &DspContext);

    /// Render the next `num_samples` samples as a stereo buffer.
    fn render(&mut self, num_samples: usize, ctx: &DspContext) -> AriaResult<AudioBuffer>;

    /// True while the voice still produces audible output.
    fn is_active(&self) -> bool;

    /// Return to the freshly-constructed state, deterministically.
    fn reset(&mut self);
}

/// Level below which a ringing voice counts as finished.
pub(crate) const SILENCE_FLOOR: f64 = 1.0e-4;

pub(crate) fn check_rate(ctx: &DspContext) -> AriaResult<()> {
    if ctx.sample_rate.is_finite() && ctx.sample_rate > 0.0 {
        Ok(())
    } else {
        Err(AriaError::InvalidSampleRate(ctx.sample_rate))
    }
}

/// Equal-power pan gains for a position in [-1, 1].
#[inline]
pub(crate) fn pan_gains(position: f64) -> (Sample, Sample) {
    let angle = (position.clamp(-1.0, 1.0) + 1.0) * std::f64::consts::FRAC_PI_4;
    (angle.cos(), angle.sin())
}

/// Spread `num_voices` unison voices evenly across the stereo field.
#[inline]
pub(crate) fn voice_pan(voice: usize, num_voices: usize) -> f64 {
    if num_voices <= 1 {
        0.0
    } else {
        voice as f64 / (num_voices - 1) as f64 * 2.0 - 1.0
    }
}

/// Symmetric unison detune ratio for one voice out of `num_voices`,
/// `cents` wide end to end.
#[inline]
pub(crate) fn voice_detune(voice: usize, num_voices: usize, cents: f64) -> f64 {
    let spread = voice_pan(voice, num_voices);
    (2.0f64).powf(spread * cents * 0.5 / 1200.0)
}

pub(crate) fn stereo_buffer(num_samples: usize, sample_rate: f64) -> AudioBuffer {
    AudioBuffer::silent(2, num_samples, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pan_gains_equal_power() {
        let (l, r) = pan_gains(0.0);
        assert!((l - r).abs() < 1e-12);
        assert!((l * l + r * r - 1.0).abs() < 1e-12);
        let (l, r) = pan_gains(-1.0);
        assert!(l > 0.99 && r < 1e-9);
    }

    #[test]
    fn test_voice_detune_symmetric() {
        let low = voice_detune(0, 5, 20.0);
        let high = voice_detune(4, 5, 20.0);
        assert!((low * high - 1.0).abs() < 1e-9);
        assert_eq!(voice_detune(2, 5, 20.0), 1.0);
    }
}
