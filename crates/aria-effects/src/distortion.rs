//! Saturation and distortion
//!
//! Ten waveshaper characters behind one processor. Shapers are normalized
//! so zero input maps to zero output and unity drive stays near unity
//! gain; asymmetric curves subtract their bias offset rather than leaking
//! DC into the output.

use aria_core::{
    AriaResult, AudioBuffer, DspContext, ParamMap, Sample, DEFAULT_SAMPLE_RATE, db_to_linear,
};
use aria_dsp::biquad::BiquadTDF2;
use aria_dsp::onepole::OnePole;
use aria_dsp::{MonoProcessor, Processor};

use crate::{EffectProcessor, blend, check_block, ensure_channels};

/// Distortion character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistortionMode {
    Tube,
    Tape,
    Fuzz,
    SoftClip,
    HardClip,
    Bitcrush,
    Wavefold,
    Overdrive,
    AmpSim,
    Exciter,
}

impl DistortionMode {
    fn default_drive(self) -> f64 {
        match self {
            DistortionMode::Fuzz => 8.0,
            DistortionMode::Wavefold => 3.0,
            DistortionMode::HardClip | DistortionMode::SoftClip => 2.0,
            DistortionMode::Exciter => 4.0,
            _ => 2.5,
        }
    }

    fn default_tone(self) -> f64 {
        match self {
            DistortionMode::AmpSim => 5000.0,
            DistortionMode::Tape => 9000.0,
            DistortionMode::Fuzz => 6000.0,
            _ => 12000.0,
        }
    }
}

struct DistortionParams {
    drive: f64,
    tone: f64,
    bits: i64,
    decimate: i64,
    output_db: f64,
    mix: f64,
}

impl DistortionParams {
    fn resolve(params: &ParamMap, mode: DistortionMode) -> Self {
        Self {
            drive: params.float_clamped("drive", mode.default_drive(), 0.1, 50.0),
            tone: params.float_clamped("tone", mode.default_tone(), 500.0, 20000.0),
            bits: params.int_or("bits", 8).clamp(2, 24),
            decimate: params.int_or("decimate", 4).clamp(1, 64),
            output_db: params.float_clamped("output_db", 0.0, -24.0, 12.0),
            mix: params.float_clamped("mix", 1.0, 0.0, 1.0),
        }
    }
}

/// Triangle-fold into [-1, 1], period 4.
#[inline]
fn fold(x: f64) -> f64 {
    let t = (x + 1.0).rem_euclid(4.0);
    if t < 2.0 { t - 1.0 } else { 3.0 - t }
}

/// Multi-character waveshaper
pub struct Distortion {
    mode: DistortionMode,
    pre_hp: Vec<OnePole>,
    tone_lp: Vec<OnePole>,
    presence: Vec<BiquadTDF2>,
    exciter_hp: Vec<BiquadTDF2>,
    // Bitcrusher sample-hold state.
    held: Vec<Sample>,
    hold_count: Vec<u32>,
    sample_rate: f64,
}

impl Distortion {
    pub fn new(mode: DistortionMode) -> Self {
        Self {
            mode,
            pre_hp: Vec::new(),
            tone_lp: Vec::new(),
            presence: Vec::new(),
            exciter_hp: Vec::new(),
            held: Vec::new(),
            hold_count: Vec::new(),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    fn prepare(&mut self, ctx: &DspContext, num_channels: usize) {
        if (ctx.sample_rate - self.sample_rate).abs() > 1e-9 {
            self.sample_rate = ctx.sample_rate;
            self.pre_hp.clear();
            self.tone_lp.clear();
            self.presence.clear();
            self.exciter_hp.clear();
        }
        let sr = self.sample_rate;
        ensure_channels(&mut self.pre_hp, num_channels, || OnePole::highpass(sr, 80.0));
        ensure_channels(&mut self.tone_lp, num_channels, || {
            OnePole::lowpass(sr, 12000.0)
        });
        ensure_channels(&mut self.presence, num_channels, || {
            let mut bq = BiquadTDF2::new(sr);
            bq.set_peaking(2500.0, 0.9, 3.0);
            bq
        });
        ensure_channels(&mut self.exciter_hp, num_channels, || {
            let mut bq = BiquadTDF2::new(sr);
            bq.set_highpass(3000.0, 0.707);
            bq
        });
        ensure_channels(&mut self.held, num_channels, || 0.0);
        ensure_channels(&mut self.hold_count, num_channels, || 0);
    }

    #[inline]
    fn shape(&self, x: f64, drive: f64) -> f64 {
        match self.mode {
            DistortionMode::Tube => {
                // Asymmetric transfer with the bias offset removed.
                let bias = 0.2;
                ((drive * (x + bias)).tanh() - (drive * bias).tanh()) / drive.tanh()
            }
            DistortionMode::Tape => {
                let y = x * drive;
                (y / (1.0 + y.abs())) * (1.0 + drive) / drive
            }
            DistortionMode::Fuzz => x.signum() * (1.0 - (-(x * drive).abs()).exp()),
            DistortionMode::SoftClip | DistortionMode::Overdrive | DistortionMode::AmpSim => {
                (x * drive).tanh() / drive.tanh()
            }
            DistortionMode::HardClip => (x * drive).clamp(-1.0, 1.0),
            DistortionMode::Wavefold => fold(x * drive),
            DistortionMode::Exciter => (x * drive).tanh(),
            DistortionMode::Bitcrush => x,
        }
    }

    #[inline]
    fn crush(&mut self, ch: usize, x: f64, bits: i64, decimate: i64) -> f64 {
        if self.hold_count[ch] == 0 {
            let levels = (1i64 << (bits - 1)) as f64;
            self.held[ch] = (x * levels).round() / levels;
        }
        self.hold_count[ch] = (self.hold_count[ch] + 1) % decimate as u32;
        self.held[ch]
    }
}

impl EffectProcessor for Distortion {
    fn process(
        &mut self,
        input: &AudioBuffer,
        params: &ParamMap,
        ctx: &DspContext,
    ) -> AriaResult<AudioBuffer> {
        check_block(input, ctx)?;
        let p = DistortionParams::resolve(params, self.mode);
        let num_channels = input.num_channels();
        self.prepare(ctx, num_channels);

        for lp in &mut self.tone_lp {
            lp.set_cutoff(p.tone);
        }
        let out_gain = db_to_linear(p.output_db);
        let pre_filter = matches!(self.mode, DistortionMode::Overdrive | DistortionMode::AmpSim);

        let mut output = input.clone();
        for ch in 0..num_channels {
            for i in 0..input.len() {
                let mut x = input.channel(ch)[i];
                if pre_filter {
                    x = self.pre_hp[ch].process_sample(x);
                }
                let mut y = match self.mode {
                    DistortionMode::Bitcrush => self.crush(ch, x, p.bits, p.decimate),
                    DistortionMode::Exciter => {
                        // Harmonics generated from the high band only, then
                        // added back to the dry path.
                        let high = self.exciter_hp[ch].process_sample(x);
                        x + self.shape(high, p.drive) * 0.5
                    }
                    _ => self.shape(x, p.drive),
                };
                y = self.tone_lp[ch].process_sample(y);
                if self.mode == DistortionMode::AmpSim {
                    y = self.presence[ch].process_sample(y);
                }
                output.channel_mut(ch)[i] = y * out_gain;
            }
        }

        blend(input, &mut output, p.mix);
        Ok(output)
    }

    fn reset(&mut self) {
        for f in self.pre_hp.iter_mut().chain(self.tone_lp.iter_mut()) {
            f.reset();
        }
        for bq in self.presence.iter_mut().chain(self.exciter_hp.iter_mut()) {
            bq.clear();
        }
        self.held.fill(0.0);
        self.hold_count.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(level: f64, len: usize) -> AudioBuffer {
        let mut buf = AudioBuffer::silent(1, len, 48000.0);
        for i in 0..len {
            buf.channel_mut(0)[i] =
                level * (2.0 * std::f64::consts::PI * 220.0 * i as f64 / 48000.0).sin();
        }
        buf
    }

    #[test]
    fn test_shapers_map_zero_to_zero() {
        for mode in [
            DistortionMode::Tube,
            DistortionMode::Tape,
            DistortionMode::Fuzz,
            DistortionMode::SoftClip,
            DistortionMode::HardClip,
            DistortionMode::Wavefold,
            DistortionMode::Overdrive,
            DistortionMode::Exciter,
        ] {
            let dist = Distortion::new(mode);
            for drive in [0.5, 2.0, 10.0] {
                assert_eq!(dist.shape(0.0, drive), 0.0, "{mode:?} leaks DC");
            }
        }
    }

    #[test]
    fn test_hard_clip_bounds_output() {
        let ctx = DspContext::new(48000.0, 512);
        let mut dist = Distortion::new(DistortionMode::HardClip);
        let mut params = ParamMap::new();
        params.set("drive", 10.0).set("tone", 20000.0);

        let out = dist.process(&sine(1.0, 4096), &params, &ctx).unwrap();
        assert!(out.peak() <= 1.0 + 1e-9);
    }

    #[test]
    fn test_saturation_adds_harmonics() {
        let ctx = DspContext::new(48000.0, 512);
        let mut dist = Distortion::new(DistortionMode::Tube);
        let mut params = ParamMap::new();
        params.set("drive", 8.0).set("tone", 20000.0);

        let input = sine(0.8, 9600);
        let out = dist.process(&input, &params, &ctx).unwrap();
        // Correlate against the fundamental: a driven tube stage must leave
        // energy the fundamental cannot explain.
        let dot: f64 = out
            .channel(0)
            .iter()
            .zip(input.channel(0))
            .map(|(a, b)| a * b)
            .sum();
        let in_energy: f64 = input.channel(0).iter().map(|s| s * s).sum();
        let coeff = dot / in_energy;
        let residual: f64 = out
            .channel(0)
            .iter()
            .zip(input.channel(0))
            .map(|(a, b)| (a - coeff * b).powi(2))
            .sum();
        let out_energy: f64 = out.channel(0).iter().map(|s| s * s).sum();
        assert!(residual > out_energy * 0.01, "no harmonic content generated");
    }

    #[test]
    fn test_bitcrusher_quantizes() {
        let ctx = DspContext::new(48000.0, 512);
        let mut dist = Distortion::new(DistortionMode::Bitcrush);
        let mut params = ParamMap::new();
        params
            .set("bits", 4i64)
            .set("decimate", 1i64)
            .set("tone", 20000.0);

        let out = dist.process(&sine(0.9, 2048), &params, &ctx).unwrap();
        // 4 bits -> 8 positive levels; samples sit on the grid up to the
        // smearing of the wide-open tone filter.
        for &s in out.channel(0).iter() {
            let level = s * 8.0;
            assert!((level - level.round()).abs() < 0.2, "off-grid sample {s}");
        }
    }

    #[test]
    fn test_all_modes_stable_and_zero_preserving() {
        let ctx = DspContext::new(48000.0, 512);
        for mode in [
            DistortionMode::Tube,
            DistortionMode::Tape,
            DistortionMode::Fuzz,
            DistortionMode::SoftClip,
            DistortionMode::HardClip,
            DistortionMode::Bitcrush,
            DistortionMode::Wavefold,
            DistortionMode::Overdrive,
            DistortionMode::AmpSim,
            DistortionMode::Exciter,
        ] {
            let mut dist = Distortion::new(mode);
            let silence = AudioBuffer::silent(2, 1024, 48000.0);
            let out = dist.process(&silence, &ParamMap::new(), &ctx).unwrap();
            assert!(out.is_finite());
            assert_eq!(out.peak(), 0.0, "{mode:?} produced output from silence");

            let out = dist.process(&sine(0.9, 1024), &ParamMap::new(), &ctx).unwrap();
            assert!(out.is_finite(), "{mode:?} went non-finite");
        }
    }
}
