//! aria-effects: Effect processor catalogue
//!
//! Nine families of block processors behind one uniform contract. Every
//! processor copies the input, transforms the copy, and blends it with the
//! dry signal per sample (`out = dry * (1 - mix) + wet * mix`). Parameters
//! arrive as a flat string map and are resolved once per call into a typed,
//! clamped struct; missing or mistyped values fall back to documented
//! defaults.
//!
//! ## Families
//! - `reverb` - diffuser/comb tank reverbs
//! - `delay` - echo lines: stereo, ping-pong, tape, multi-tap, tempo-synced
//! - `compressor` - VCA/opto/FET/vari-mu/multiband dynamics reduction
//! - `eq` - parametric, graphic, dynamic, mid/side, tilt equalizers
//! - `distortion` - waveshaping and hardware-modeled saturation
//! - `modulation` - chorus, flanger, phaser, tremolo, rotary
//! - `dynamics` - gate, expander, de-esser, transient and lookahead tools
//! - `vocal` - macro-controlled vocal chain templates
//! - `microphone` - microphone response models

pub mod compressor;
pub mod delay;
pub mod distortion;
pub mod dynamics;
pub mod eq;
pub mod microphone;
pub mod modulation;
pub mod reverb;
pub mod vocal;

use aria_core::{AriaError, AriaResult, AudioBuffer, DspContext, ParamMap, Sample};

/// Uniform contract for all effect processors.
///
/// An instance is exclusively owned by one plugin slot and must never be
/// shared between callers; all state mutation happens inside `process`.
pub trait EffectProcessor: Send {
    /// Transform one block. The output preserves the input's channel count
    /// and sample rate; the input itself is never mutated.
    fn process(
        &mut self,
        input: &AudioBuffer,
        params: &ParamMap,
        ctx: &DspContext,
    ) -> AriaResult<AudioBuffer>;

    /// Restore initial state without reallocation. Idempotent, never fails.
    fn reset(&mut self);

    /// Latency introduced by the wet path, in samples.
    fn latency(&self) -> usize {
        0
    }
}

/// Fail fast on contract violations: the block's sample rate must match the
/// context's. (Channel-length equality is enforced by `AudioBuffer`
/// construction.)
pub(crate) fn check_block(input: &AudioBuffer, ctx: &DspContext) -> AriaResult<()> {
    if (input.sample_rate() - ctx.sample_rate).abs() > 1e-9 {
        return Err(AriaError::ShapeMismatch(format!(
            "buffer sample rate {} does not match context sample rate {}",
            input.sample_rate(),
            ctx.sample_rate
        )));
    }
    Ok(())
}

/// Per-sample dry/wet blend, in place on the wet buffer.
pub(crate) fn blend(dry: &AudioBuffer, wet: &mut AudioBuffer, mix: f64) {
    let mix = mix.clamp(0.0, 1.0);
    for ch in 0..wet.num_channels() {
        let dry_ch = dry.channel(ch);
        for (w, &d) in wet.channel_mut(ch).iter_mut().zip(dry_ch.iter()) {
            *w = d * (1.0 - mix) + *w * mix;
        }
    }
}

/// Grow a per-channel state vector to cover `num_channels`, one state
/// instance per channel so stereo material never shares filter history.
pub(crate) fn ensure_channels<T>(states: &mut Vec<T>, num_channels: usize, make: impl Fn() -> T) {
    while states.len() < num_channels {
        states.push(make());
    }
}

/// Equal-power stereo pan gains for a position in [-1, 1].
pub(crate) fn pan_gains(position: f64) -> (Sample, Sample) {
    let angle = (position.clamp(-1.0, 1.0) + 1.0) * std::f64::consts::FRAC_PI_4;
    (angle.cos(), angle.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_block_rejects_rate_mismatch() {
        let buf = AudioBuffer::silent(2, 64, 44100.0);
        let ctx = DspContext::new(48000.0, 64);
        assert!(check_block(&buf, &ctx).is_err());
        let ctx = DspContext::new(44100.0, 64);
        assert!(check_block(&buf, &ctx).is_ok());
    }

    #[test]
    fn test_blend_endpoints() {
        let dry = AudioBuffer::from_channels(vec![vec![1.0, -1.0]], 48000.0).unwrap();
        let mut wet = AudioBuffer::from_channels(vec![vec![0.5, 0.5]], 48000.0).unwrap();
        blend(&dry, &mut wet, 0.0);
        assert_eq!(wet.channel(0), &[1.0, -1.0]);

        let mut wet = AudioBuffer::from_channels(vec![vec![0.5, 0.5]], 48000.0).unwrap();
        blend(&dry, &mut wet, 1.0);
        assert_eq!(wet.channel(0), &[0.5, 0.5]);
    }

    #[test]
    fn test_pan_gains_equal_power() {
        for pos in [-1.0, -0.5, 0.0, 0.5, 1.0] {
            let (l, r) = pan_gains(pos);
            assert!((l * l + r * r - 1.0).abs() < 1e-9);
        }
        let (l, r) = pan_gains(-1.0);
        assert!(l > 0.99 && r < 1e-9);
    }
}
