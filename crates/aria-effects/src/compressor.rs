//! Compressors
//!
//! All ten characters share one log-domain gain computer (soft knee,
//! downward ratio) and differ in detector timing, channel linking, knee
//! width, and the nonlinearity applied after gain reduction. The multiband
//! variant splits into three bands with its own detector per band.

use aria_core::{
    AriaResult, AudioBuffer, DspContext, ParamMap, Sample, DEFAULT_SAMPLE_RATE, db_to_linear,
    linear_to_db,
};
use aria_dsp::biquad::BiquadTDF2;
use aria_dsp::envelope::EnvelopeFollower;
use aria_dsp::onepole::OnePole;
use aria_dsp::{MonoProcessor, Processor};

use crate::{EffectProcessor, blend, check_block, ensure_channels};

/// Compressor character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressorMode {
    StudioVca,
    Opto,
    Fet,
    VariMu,
    Bus,
    Multiband,
    Parallel,
    Vintage,
    SoftKnee,
    Peak,
}

impl CompressorMode {
    // (threshold_db, ratio, attack_ms, release_ms, knee_db)
    fn defaults(self) -> (f64, f64, f64, f64, f64) {
        match self {
            CompressorMode::StudioVca => (-18.0, 4.0, 5.0, 80.0, 6.0),
            CompressorMode::Opto => (-20.0, 3.0, 10.0, 300.0, 8.0),
            CompressorMode::Fet => (-22.0, 8.0, 0.5, 60.0, 2.0),
            CompressorMode::VariMu => (-16.0, 2.5, 20.0, 200.0, 12.0),
            CompressorMode::Bus => (-14.0, 2.0, 10.0, 120.0, 4.0),
            CompressorMode::Multiband => (-20.0, 3.0, 8.0, 100.0, 6.0),
            CompressorMode::Parallel => (-28.0, 10.0, 1.0, 80.0, 3.0),
            CompressorMode::Vintage => (-18.0, 3.0, 15.0, 150.0, 9.0),
            CompressorMode::SoftKnee => (-20.0, 3.0, 8.0, 120.0, 18.0),
            CompressorMode::Peak => (-12.0, 20.0, 0.1, 50.0, 0.0),
        }
    }

    fn default_mix(self) -> f64 {
        match self {
            CompressorMode::Parallel => 0.5,
            _ => 1.0,
        }
    }

    /// Bus-style compressors move both channels with one detector.
    fn stereo_linked(self) -> bool {
        matches!(
            self,
            CompressorMode::Bus | CompressorMode::VariMu | CompressorMode::Vintage
        )
    }

    fn saturates(self) -> bool {
        matches!(
            self,
            CompressorMode::Fet | CompressorMode::VariMu | CompressorMode::Vintage
        )
    }
}

struct CompressorParams {
    threshold_db: f64,
    ratio: f64,
    attack_ms: f64,
    release_ms: f64,
    knee_db: f64,
    makeup_db: f64,
    mix: f64,
}

impl CompressorParams {
    fn resolve(params: &ParamMap, mode: CompressorMode) -> Self {
        let (threshold, ratio, attack, release, knee) = mode.defaults();
        Self {
            threshold_db: params.float_clamped("threshold_db", threshold, -60.0, 0.0),
            ratio: params.float_clamped("ratio", ratio, 1.0, 30.0),
            attack_ms: params.float_clamped("attack_ms", attack, 0.05, 500.0),
            release_ms: params.float_clamped("release_ms", release, 5.0, 4000.0),
            knee_db: params.float_clamped("knee_db", knee, 0.0, 24.0),
            makeup_db: params.float_clamped("makeup_db", 0.0, 0.0, 24.0),
            mix: params.float_clamped("mix", mode.default_mix(), 0.0, 1.0),
        }
    }
}

/// Soft-knee downward gain computer. Input and output in dB; the return
/// value is the (non-positive) gain to apply.
#[inline]
fn gain_reduction_db(level_db: f64, threshold_db: f64, ratio: f64, knee_db: f64) -> f64 {
    let over = level_db - threshold_db;
    let slope = 1.0 / ratio - 1.0;
    if knee_db > 0.0 && over.abs() < knee_db * 0.5 {
        let x = over + knee_db * 0.5;
        slope * x * x / (2.0 * knee_db)
    } else if over > 0.0 {
        slope * over
    } else {
        0.0
    }
}

/// Three-way crossover for the multiband path (200 Hz / 2 kHz).
struct BandSplitter {
    low_lp: BiquadTDF2,
    mid_hp: BiquadTDF2,
    mid_lp: BiquadTDF2,
    high_hp: BiquadTDF2,
}

impl BandSplitter {
    const LOW_CROSS: f64 = 200.0;
    const HIGH_CROSS: f64 = 2000.0;

    fn new(sample_rate: f64) -> Self {
        let q = std::f64::consts::FRAC_1_SQRT_2;
        let mut low_lp = BiquadTDF2::new(sample_rate);
        low_lp.set_lowpass(Self::LOW_CROSS, q);
        let mut mid_hp = BiquadTDF2::new(sample_rate);
        mid_hp.set_highpass(Self::LOW_CROSS, q);
        let mut mid_lp = BiquadTDF2::new(sample_rate);
        mid_lp.set_lowpass(Self::HIGH_CROSS, q);
        let mut high_hp = BiquadTDF2::new(sample_rate);
        high_hp.set_highpass(Self::HIGH_CROSS, q);
        Self {
            low_lp,
            mid_hp,
            mid_lp,
            high_hp,
        }
    }

    #[inline]
    fn split(&mut self, input: Sample) -> [Sample; 3] {
        let low = self.low_lp.process_sample(input);
        let mid = self.mid_lp.process_sample(self.mid_hp.process_sample(input));
        let high = self.high_hp.process_sample(input);
        [low, mid, high]
    }

    fn reset(&mut self) {
        self.low_lp.clear();
        self.mid_hp.clear();
        self.mid_lp.clear();
        self.high_hp.clear();
    }
}

/// Multi-character compressor
pub struct Compressor {
    mode: CompressorMode,
    detectors: Vec<EnvelopeFollower>,
    sidechain_hp: Vec<OnePole>,
    splitters: Vec<BandSplitter>,
    band_detectors: Vec<[EnvelopeFollower; 3]>,
    sample_rate: f64,
}

impl Compressor {
    pub fn new(mode: CompressorMode) -> Self {
        Self {
            mode,
            detectors: Vec::new(),
            sidechain_hp: Vec::new(),
            splitters: Vec::new(),
            band_detectors: Vec::new(),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    fn prepare(&mut self, ctx: &DspContext, num_channels: usize) {
        if (ctx.sample_rate - self.sample_rate).abs() > 1e-9 {
            self.sample_rate = ctx.sample_rate;
            self.detectors.clear();
            self.sidechain_hp.clear();
            self.splitters.clear();
            self.band_detectors.clear();
        }
        let sr = self.sample_rate;
        ensure_channels(&mut self.detectors, num_channels, || {
            EnvelopeFollower::new(sr)
        });
        ensure_channels(&mut self.sidechain_hp, num_channels, || {
            OnePole::highpass(sr, 100.0)
        });
        if self.mode == CompressorMode::Multiband {
            ensure_channels(&mut self.splitters, num_channels, || BandSplitter::new(sr));
            ensure_channels(&mut self.band_detectors, num_channels, || {
                [
                    EnvelopeFollower::new(sr),
                    EnvelopeFollower::new(sr),
                    EnvelopeFollower::new(sr),
                ]
            });
        }
    }

    #[inline]
    fn color(&self, sample: Sample) -> Sample {
        if self.mode.saturates() {
            // Mild odd-harmonic coloration; unity slope at zero.
            (sample * 1.1).tanh() / 1.1_f64.tanh()
        } else {
            sample
        }
    }

    fn process_multiband(&mut self, input: &AudioBuffer, p: &CompressorParams) -> AudioBuffer {
        let mut output = input.clone();
        let makeup = db_to_linear(p.makeup_db);
        for ch in 0..input.num_channels() {
            for i in 0..input.len() {
                let bands = self.splitters[ch].split(input.channel(ch)[i]);
                let mut sum = 0.0;
                for (b, &band) in bands.iter().enumerate() {
                    let env = self.band_detectors[ch][b].process(band);
                    let gr = gain_reduction_db(
                        linear_to_db(env),
                        p.threshold_db,
                        p.ratio,
                        p.knee_db,
                    );
                    sum += band * db_to_linear(gr);
                }
                output.channel_mut(ch)[i] = sum * makeup;
            }
        }
        output
    }
}

impl EffectProcessor for Compressor {
    fn process(
        &mut self,
        input: &AudioBuffer,
        params: &ParamMap,
        ctx: &DspContext,
    ) -> AriaResult<AudioBuffer> {
        check_block(input, ctx)?;
        let p = CompressorParams::resolve(params, self.mode);
        let num_channels = input.num_channels();
        self.prepare(ctx, num_channels);

        for det in self.detectors.iter_mut() {
            det.set_times(p.attack_ms, p.release_ms);
        }
        for bands in self.band_detectors.iter_mut() {
            for det in bands.iter_mut() {
                det.set_times(p.attack_ms, p.release_ms);
            }
        }

        let mut output = if self.mode == CompressorMode::Multiband {
            self.process_multiband(input, &p)
        } else {
            let mut output = input.clone();
            let makeup = db_to_linear(p.makeup_db);
            let linked = self.mode.stereo_linked();
            for i in 0..input.len() {
                // Detector runs on the high-passed sidechain so low-end
                // weight does not dominate the gain rider.
                let mut link_env = 0.0f64;
                let mut envs = [0.0f64; 16];
                for ch in 0..num_channels.min(16) {
                    let key = self.sidechain_hp[ch].process_sample(input.channel(ch)[i]);
                    let env = self.detectors[ch].process(key);
                    envs[ch] = env;
                    link_env = link_env.max(env);
                }
                for ch in 0..num_channels.min(16) {
                    let env = if linked { link_env } else { envs[ch] };
                    let mut gr =
                        gain_reduction_db(linear_to_db(env), p.threshold_db, p.ratio, p.knee_db);
                    if self.mode == CompressorMode::Opto {
                        // Program-dependent memory: deep reduction recovers
                        // more slowly, approximated by easing the reduction.
                        gr *= 1.0 - (-gr * 0.02).min(0.3);
                    }
                    let compressed =
                        input.channel(ch)[i] * db_to_linear(gr) * makeup;
                    output.channel_mut(ch)[i] = self.color(compressed);
                }
            }
            output
        };

        blend(input, &mut output, p.mix);
        Ok(output)
    }

    fn reset(&mut self) {
        for det in &mut self.detectors {
            det.reset();
        }
        for hp in &mut self.sidechain_hp {
            hp.reset();
        }
        for splitter in &mut self.splitters {
            splitter.reset();
        }
        for bands in &mut self.band_detectors {
            for det in bands.iter_mut() {
                det.reset();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loud_sine(level: f64, len: usize) -> AudioBuffer {
        let mut buf = AudioBuffer::silent(2, len, 48000.0);
        for ch in 0..2 {
            for i in 0..len {
                buf.channel_mut(ch)[i] =
                    level * (2.0 * std::f64::consts::PI * 440.0 * i as f64 / 48000.0).sin();
            }
        }
        buf
    }

    #[test]
    fn test_gain_computer_regions() {
        // Below knee: unity. Above knee: slope 1/ratio.
        assert_eq!(gain_reduction_db(-40.0, -20.0, 4.0, 6.0), 0.0);
        let gr = gain_reduction_db(-8.0, -20.0, 4.0, 6.0);
        assert!((gr - (1.0 / 4.0 - 1.0) * 12.0).abs() < 1e-9);
        // Inside the knee the curve is between the two lines.
        let knee_gr = gain_reduction_db(-20.0, -20.0, 4.0, 6.0);
        assert!(knee_gr < 0.0 && knee_gr > (1.0 / 4.0 - 1.0) * 3.0);
    }

    #[test]
    fn test_loud_signal_is_reduced() {
        let ctx = DspContext::new(48000.0, 512);
        let mut comp = Compressor::new(CompressorMode::StudioVca);
        let mut params = ParamMap::new();
        params.set("threshold_db", -20.0).set("ratio", 4.0);

        let input = loud_sine(0.9, 48000);
        let out = comp.process(&input, &params, &ctx).unwrap();
        // Steady-state tail, after the detector has settled.
        let out_rms: f64 = out.channel(0)[24000..].iter().map(|s| s * s).sum::<f64>();
        let in_rms: f64 = input.channel(0)[24000..].iter().map(|s| s * s).sum::<f64>();
        assert!(out_rms < in_rms * 0.5, "expected clear gain reduction");
    }

    #[test]
    fn test_quiet_signal_passes_untouched() {
        let ctx = DspContext::new(48000.0, 512);
        let mut comp = Compressor::new(CompressorMode::SoftKnee);
        let mut params = ParamMap::new();
        params.set("threshold_db", -12.0).set("knee_db", 0.0);

        let input = loud_sine(0.01, 4096); // about -40 dBFS
        let out = comp.process(&input, &params, &ctx).unwrap();
        for i in 2048..4096 {
            assert!((out.channel(0)[i] - input.channel(0)[i]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_bus_mode_links_channels() {
        let ctx = DspContext::new(48000.0, 512);
        let mut comp = Compressor::new(CompressorMode::Bus);
        let mut params = ParamMap::new();
        params.set("threshold_db", -24.0).set("ratio", 4.0);

        // Loud left, quiet right: a linked detector must duck both.
        let mut input = AudioBuffer::silent(2, 48000, 48000.0);
        for i in 0..48000 {
            let s = (2.0 * std::f64::consts::PI * 330.0 * i as f64 / 48000.0).sin();
            input.channel_mut(0)[i] = 0.9 * s;
            input.channel_mut(1)[i] = 0.05 * s;
        }
        let out = comp.process(&input, &params, &ctx).unwrap();
        let right_out: f64 = out.channel(1)[24000..].iter().map(|s| s.abs()).sum();
        let right_in: f64 = input.channel(1)[24000..].iter().map(|s| s.abs()).sum();
        assert!(right_out < right_in * 0.95, "linked detector must duck the quiet side");
    }

    #[test]
    fn test_all_modes_stable_and_zero_preserving() {
        let ctx = DspContext::new(48000.0, 512);
        for mode in [
            CompressorMode::StudioVca,
            CompressorMode::Opto,
            CompressorMode::Fet,
            CompressorMode::VariMu,
            CompressorMode::Bus,
            CompressorMode::Multiband,
            CompressorMode::Parallel,
            CompressorMode::Vintage,
            CompressorMode::SoftKnee,
            CompressorMode::Peak,
        ] {
            let mut comp = Compressor::new(mode);
            let silence = AudioBuffer::silent(2, 1024, 48000.0);
            let out = comp.process(&silence, &ParamMap::new(), &ctx).unwrap();
            assert!(out.is_finite());
            assert_eq!(out.peak(), 0.0, "{mode:?} produced output from silence");

            let out = comp.process(&loud_sine(0.8, 1024), &ParamMap::new(), &ctx).unwrap();
            assert!(out.is_finite(), "{mode:?} went non-finite");
        }
    }
}
