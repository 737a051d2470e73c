//! Gates, expanders, limiters, and transient tools
//!
//! The gate/expander side attenuates below a threshold with hold and
//! smoothed gain; the limiter side rides gain against a ceiling, with a
//! short delay line for lookahead so peaks never get through. Transient
//! and envelope shapers derive their control signal from the spread
//! between a fast and a slow follower.

use aria_core::{
    AriaResult, AudioBuffer, DspContext, ParamMap, DEFAULT_SAMPLE_RATE, db_to_linear,
    linear_to_db,
};
use aria_dsp::biquad::BiquadTDF2;
use aria_dsp::delay_line::DelayLine;
use aria_dsp::envelope::EnvelopeFollower;
use aria_dsp::onepole::OnePole;
use aria_dsp::{MonoProcessor, Processor};

use crate::{EffectProcessor, blend, check_block, ensure_channels};

const MAX_LOOKAHEAD_SECONDS: f64 = 0.02;

/// Dynamics character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicsMode {
    NoiseGate,
    Expander,
    DeEsser,
    Ducker,
    TransientShaper,
    LookaheadLimiter,
    Maximizer,
    Leveler,
    EnvelopeShaper,
    BrickwallClipper,
}

struct DynamicsParams {
    threshold_db: f64,
    ratio: f64,
    attack_ms: f64,
    release_ms: f64,
    hold_ms: f64,
    ceiling_db: f64,
    lookahead_ms: f64,
    gain_db: f64,
    attack_gain: f64,
    sustain_gain: f64,
    mix: f64,
}

impl DynamicsParams {
    fn resolve(params: &ParamMap, mode: DynamicsMode) -> Self {
        let (threshold, attack, release) = match mode {
            DynamicsMode::NoiseGate => (-50.0, 1.0, 100.0),
            DynamicsMode::Expander => (-40.0, 5.0, 150.0),
            DynamicsMode::DeEsser => (-30.0, 1.0, 60.0),
            DynamicsMode::Ducker => (-30.0, 10.0, 400.0),
            DynamicsMode::Leveler => (-18.0, 200.0, 1000.0),
            DynamicsMode::LookaheadLimiter | DynamicsMode::Maximizer => (-1.0, 0.05, 60.0),
            _ => (-24.0, 5.0, 100.0),
        };
        Self {
            threshold_db: params.float_clamped("threshold_db", threshold, -80.0, 0.0),
            ratio: params.float_clamped("ratio", 2.0, 1.0, 20.0),
            attack_ms: params.float_clamped("attack_ms", attack, 0.05, 500.0),
            release_ms: params.float_clamped("release_ms", release, 5.0, 4000.0),
            hold_ms: params.float_clamped("hold_ms", 50.0, 0.0, 1000.0),
            ceiling_db: params.float_clamped("ceiling_db", -0.3, -24.0, 0.0),
            lookahead_ms: params.float_clamped("lookahead_ms", 5.0, 0.0, 20.0),
            gain_db: params.float_clamped("gain_db", 6.0, 0.0, 24.0),
            attack_gain: params.float_clamped("attack_gain", 1.0, -1.0, 1.0),
            sustain_gain: params.float_clamped("sustain_gain", 0.0, -1.0, 1.0),
            mix: params.float_clamped("mix", 1.0, 0.0, 1.0),
        }
    }
}

/// Gate channel state. Opening and Closing ramp the gain linearly so
/// the transitions are click-free; Hold keeps the gate open for a
/// timer after the signal drops under the close threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateStage {
    Closed,
    Opening,
    Open,
    Hold,
    Closing,
}

/// Multi-character dynamics processor
pub struct Dynamics {
    mode: DynamicsMode,
    detectors: Vec<EnvelopeFollower>,
    slow_detectors: Vec<EnvelopeFollower>,
    gain_smoothers: Vec<OnePole>,
    gate_stages: Vec<GateStage>,
    gate_gains: Vec<f64>,
    hold_counters: Vec<usize>,
    lookahead: Vec<DelayLine>,
    sibilance_bp: Vec<BiquadTDF2>,
    band_hp: Vec<BiquadTDF2>,
    latency_samples: usize,
    sample_rate: f64,
}

impl Dynamics {
    pub fn new(mode: DynamicsMode) -> Self {
        Self {
            mode,
            detectors: Vec::new(),
            slow_detectors: Vec::new(),
            gain_smoothers: Vec::new(),
            gate_stages: Vec::new(),
            gate_gains: Vec::new(),
            hold_counters: Vec::new(),
            lookahead: Vec::new(),
            sibilance_bp: Vec::new(),
            band_hp: Vec::new(),
            latency_samples: 0,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    fn prepare(&mut self, ctx: &DspContext, num_channels: usize) {
        if (ctx.sample_rate - self.sample_rate).abs() > 1e-9 {
            self.sample_rate = ctx.sample_rate;
            self.detectors.clear();
            self.slow_detectors.clear();
            self.gain_smoothers.clear();
            self.gate_stages.clear();
            self.gate_gains.clear();
            self.hold_counters.clear();
            self.lookahead.clear();
            self.sibilance_bp.clear();
            self.band_hp.clear();
        }
        let sr = self.sample_rate;
        ensure_channels(&mut self.detectors, num_channels, || {
            EnvelopeFollower::new(sr)
        });
        ensure_channels(&mut self.slow_detectors, num_channels, || {
            let mut det = EnvelopeFollower::new(sr);
            det.set_times(80.0, 300.0);
            det
        });
        ensure_channels(&mut self.gain_smoothers, num_channels, || {
            let mut smoother = OnePole::new(sr);
            smoother.set_coeff(0.999);
            smoother
        });
        ensure_channels(&mut self.gate_stages, num_channels, || GateStage::Closed);
        ensure_channels(&mut self.gate_gains, num_channels, || 0.0);
        ensure_channels(&mut self.hold_counters, num_channels, || 0);
        ensure_channels(&mut self.lookahead, num_channels, || {
            DelayLine::with_max_time(sr, MAX_LOOKAHEAD_SECONDS)
        });
        ensure_channels(&mut self.sibilance_bp, num_channels, || {
            let mut bq = BiquadTDF2::new(sr);
            bq.set_bandpass(6500.0, 1.2);
            bq
        });
        ensure_channels(&mut self.band_hp, num_channels, || {
            let mut bq = BiquadTDF2::new(sr);
            bq.set_highpass(5000.0, 0.707);
            bq
        });
    }

    /// Closed → Opening → Open → Hold → Closing, with hysteresis: the
    /// gate opens at the threshold but only arms the close path once
    /// the level drops a few dB further, so signal hovering at the
    /// threshold does not chatter.
    fn process_gate(&mut self, input: &AudioBuffer, p: &DynamicsParams) -> AudioBuffer {
        let sr = self.sample_rate;
        let open_threshold = db_to_linear(p.threshold_db);
        let close_threshold = db_to_linear(p.threshold_db - 6.0);
        let hold_samples = (p.hold_ms * 0.001 * sr) as usize;
        let attack_step = 1.0 / (p.attack_ms * 0.001 * sr).max(1.0);
        let release_step = 1.0 / (p.release_ms * 0.001 * sr).max(1.0);
        let mut output = input.clone();
        for ch in 0..input.num_channels() {
            for i in 0..input.len() {
                let x = input.channel(ch)[i];
                let env = self.detectors[ch].process(x);
                let stage = self.gate_stages[ch];
                let next = match stage {
                    GateStage::Closed => {
                        if env > open_threshold {
                            GateStage::Opening
                        } else {
                            GateStage::Closed
                        }
                    }
                    GateStage::Opening => {
                        self.gate_gains[ch] = (self.gate_gains[ch] + attack_step).min(1.0);
                        if self.gate_gains[ch] >= 1.0 {
                            GateStage::Open
                        } else {
                            GateStage::Opening
                        }
                    }
                    GateStage::Open => {
                        if env < close_threshold {
                            self.hold_counters[ch] = hold_samples;
                            GateStage::Hold
                        } else {
                            GateStage::Open
                        }
                    }
                    GateStage::Hold => {
                        if env > open_threshold {
                            GateStage::Open
                        } else if self.hold_counters[ch] > 0 {
                            self.hold_counters[ch] -= 1;
                            GateStage::Hold
                        } else {
                            GateStage::Closing
                        }
                    }
                    GateStage::Closing => {
                        if env > open_threshold {
                            GateStage::Opening
                        } else {
                            self.gate_gains[ch] = (self.gate_gains[ch] - release_step).max(0.0);
                            if self.gate_gains[ch] <= 0.0 {
                                GateStage::Closed
                            } else {
                                GateStage::Closing
                            }
                        }
                    }
                };
                self.gate_stages[ch] = next;
                output.channel_mut(ch)[i] = x * self.gate_gains[ch];
            }
        }
        output
    }

    fn process_gate_like(&mut self, input: &AudioBuffer, p: &DynamicsParams) -> AudioBuffer {
        let floor_db = -60.0;
        let mut output = input.clone();
        for ch in 0..input.num_channels() {
            for i in 0..input.len() {
                let x = input.channel(ch)[i];
                let env = self.detectors[ch].process(x);
                let target = match self.mode {
                    DynamicsMode::Expander => {
                        let under = (linear_to_db(env) - p.threshold_db).min(0.0);
                        db_to_linear((under * (p.ratio - 1.0)).max(floor_db))
                    }
                    DynamicsMode::Ducker => {
                        let over = (linear_to_db(env) - p.threshold_db).max(0.0);
                        db_to_linear(-(over * (1.0 - 1.0 / p.ratio)))
                    }
                    _ => 1.0,
                };
                let gain = self.gain_smoothers[ch].process_sample(target);
                output.channel_mut(ch)[i] = x * gain;
            }
        }
        output
    }

    fn process_limiter(&mut self, input: &AudioBuffer, p: &DynamicsParams) -> AudioBuffer {
        let sr = self.sample_rate;
        let ceiling = db_to_linear(p.ceiling_db);
        let boost = if self.mode == DynamicsMode::Maximizer {
            db_to_linear(p.gain_db)
        } else {
            1.0
        };
        let lookahead = (p.lookahead_ms * 0.001 * sr) as usize;
        self.latency_samples = lookahead;
        let mut output = input.clone();
        for ch in 0..input.num_channels() {
            for i in 0..input.len() {
                let x = input.channel(ch)[i] * boost;
                // Detector sees the incoming peak; the audio path is delayed
                // behind it, so gain is already down when the peak arrives.
                let env = self.detectors[ch].process(x);
                let gain = if env > ceiling { ceiling / env } else { 1.0 };
                self.lookahead[ch].write(x);
                let delayed = if lookahead > 0 {
                    self.lookahead[ch].read(lookahead - 1)
                } else {
                    x
                };
                // Attack is instant (min), release rides the smoother; the
                // final clamp is the true brickwall.
                let smoothed = self.gain_smoothers[ch].process_sample(gain);
                let out = delayed * smoothed.min(gain);
                output.channel_mut(ch)[i] = out.clamp(-ceiling, ceiling);
            }
        }
        output
    }

    fn process_shaper(&mut self, input: &AudioBuffer, p: &DynamicsParams) -> AudioBuffer {
        let mut output = input.clone();
        for ch in 0..input.num_channels() {
            for i in 0..input.len() {
                let x = input.channel(ch)[i];
                let fast = self.detectors[ch].process(x);
                let slow = self.slow_detectors[ch].process(x);
                // Positive while the sound is still attacking, negative as
                // it rings out.
                let transient = ((fast - slow) / slow.max(1e-6)).clamp(-1.0, 1.0);
                let gain_db = if transient > 0.0 {
                    p.attack_gain * 12.0 * transient
                } else {
                    p.sustain_gain * 12.0 * -transient
                };
                output.channel_mut(ch)[i] = x * db_to_linear(gain_db);
            }
        }
        output
    }

    fn process_deesser(&mut self, input: &AudioBuffer, p: &DynamicsParams) -> AudioBuffer {
        let threshold = db_to_linear(p.threshold_db);
        let mut output = input.clone();
        for ch in 0..input.num_channels() {
            for i in 0..input.len() {
                let x = input.channel(ch)[i];
                let sibilance = self.sibilance_bp[ch].process_sample(x);
                let env = self.detectors[ch].process(sibilance);
                let reduction = if env > threshold {
                    (threshold / env).max(db_to_linear(-18.0))
                } else {
                    1.0
                };
                let gain = self.gain_smoothers[ch].process_sample(reduction);
                // Only the band above the split frequency gets attenuated.
                let high = self.band_hp[ch].process_sample(x);
                output.channel_mut(ch)[i] = x - high * (1.0 - gain);
            }
        }
        output
    }

    fn process_leveler(&mut self, input: &AudioBuffer, p: &DynamicsParams) -> AudioBuffer {
        let target = db_to_linear(p.threshold_db);
        let mut output = input.clone();
        for ch in 0..input.num_channels() {
            for i in 0..input.len() {
                let x = input.channel(ch)[i];
                let env = self.detectors[ch].process(x);
                let target_gain = if env > 1e-5 {
                    (target / env).clamp(db_to_linear(-12.0), db_to_linear(12.0))
                } else {
                    1.0
                };
                let gain = self.gain_smoothers[ch].process_sample(target_gain);
                output.channel_mut(ch)[i] = x * gain;
            }
        }
        output
    }

    fn process_clipper(&self, input: &AudioBuffer, p: &DynamicsParams) -> AudioBuffer {
        let ceiling = db_to_linear(p.ceiling_db);
        let mut output = input.clone();
        for ch in 0..input.num_channels() {
            for sample in output.channel_mut(ch).iter_mut() {
                *sample = sample.clamp(-ceiling, ceiling);
            }
        }
        output
    }
}

impl EffectProcessor for Dynamics {
    fn process(
        &mut self,
        input: &AudioBuffer,
        params: &ParamMap,
        ctx: &DspContext,
    ) -> AriaResult<AudioBuffer> {
        check_block(input, ctx)?;
        let p = DynamicsParams::resolve(params, self.mode);
        self.prepare(ctx, input.num_channels());

        let fast_attack = matches!(
            self.mode,
            DynamicsMode::LookaheadLimiter | DynamicsMode::Maximizer | DynamicsMode::DeEsser
        );
        for det in self.detectors.iter_mut() {
            if self.mode == DynamicsMode::TransientShaper
                || self.mode == DynamicsMode::EnvelopeShaper
            {
                det.set_times(0.5, 30.0);
            } else {
                det.set_times(p.attack_ms, p.release_ms);
            }
        }
        let smoother_coeff = if fast_attack { 0.9 } else { 0.999 };
        for smoother in self.gain_smoothers.iter_mut() {
            smoother.set_coeff(smoother_coeff);
        }

        let mut output = match self.mode {
            DynamicsMode::NoiseGate => self.process_gate(input, &p),
            DynamicsMode::Expander | DynamicsMode::Ducker => self.process_gate_like(input, &p),
            DynamicsMode::DeEsser => self.process_deesser(input, &p),
            DynamicsMode::TransientShaper | DynamicsMode::EnvelopeShaper => {
                self.process_shaper(input, &p)
            }
            DynamicsMode::LookaheadLimiter | DynamicsMode::Maximizer => {
                self.process_limiter(input, &p)
            }
            DynamicsMode::Leveler => self.process_leveler(input, &p),
            DynamicsMode::BrickwallClipper => self.process_clipper(input, &p),
        };

        blend(input, &mut output, p.mix);
        Ok(output)
    }

    fn reset(&mut self) {
        for det in self
            .detectors
            .iter_mut()
            .chain(self.slow_detectors.iter_mut())
        {
            det.reset();
        }
        for smoother in &mut self.gain_smoothers {
            smoother.reset();
        }
        self.gate_stages.fill(GateStage::Closed);
        self.gate_gains.fill(0.0);
        self.hold_counters.fill(0);
        for line in &mut self.lookahead {
            line.clear();
        }
        for bq in self
            .sibilance_bp
            .iter_mut()
            .chain(self.band_hp.iter_mut())
        {
            bq.clear();
        }
    }

    fn latency(&self) -> usize {
        self.latency_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_burst(level: f64, len: usize, start: usize, stop: usize) -> AudioBuffer {
        let mut buf = AudioBuffer::silent(1, len, 48000.0);
        for i in start..stop {
            buf.channel_mut(0)[i] =
                level * (2.0 * std::f64::consts::PI * 500.0 * i as f64 / 48000.0).sin();
        }
        buf
    }

    #[test]
    fn test_gate_passes_signal_and_mutes_floor() {
        let ctx = DspContext::new(48000.0, 512);
        let mut gate = Dynamics::new(DynamicsMode::NoiseGate);
        let mut params = ParamMap::new();
        params.set("threshold_db", -30.0).set("hold_ms", 20.0);

        // Half-second tone, then a quiet hiss-level tail.
        let mut input = tone_burst(0.5, 96000, 0, 48000);
        for i in 48000..96000 {
            input.channel_mut(0)[i] = 0.001 * if i % 2 == 0 { 1.0 } else { -1.0 };
        }
        let out = gate.process(&input, &params, &ctx).unwrap();
        let open: f64 = out.channel(0)[24000..48000].iter().map(|s| s.abs()).sum();
        let closed: f64 = out.channel(0)[72000..].iter().map(|s| s.abs()).sum();
        assert!(open > 1000.0, "gate must pass the loud section");
        assert!(closed < open * 0.001, "gate must mute the floor");
    }

    #[test]
    fn test_gate_hysteresis_ignores_sub_threshold_signal() {
        let ctx = DspContext::new(48000.0, 512);
        let mut gate = Dynamics::new(DynamicsMode::NoiseGate);
        let mut params = ParamMap::new();
        params.set("threshold_db", -20.0);

        // Sits between the close and open thresholds; a closed gate
        // must stay closed rather than chatter.
        let input = tone_burst(db_to_linear(-23.0), 24000, 0, 24000);
        let out = gate.process(&input, &params, &ctx).unwrap();
        assert_eq!(out.peak(), 0.0);
    }

    #[test]
    fn test_limiter_holds_ceiling() {
        let ctx = DspContext::new(48000.0, 512);
        let mut limiter = Dynamics::new(DynamicsMode::LookaheadLimiter);
        let mut params = ParamMap::new();
        params.set("ceiling_db", -1.0);

        let input = tone_burst(1.4, 24000, 0, 24000);
        let out = limiter.process(&input, &params, &ctx).unwrap();
        let ceiling = db_to_linear(-1.0);
        assert!(out.peak() <= ceiling + 1e-9, "peak {} over ceiling", out.peak());
        assert!(limiter.latency() > 0);
    }

    #[test]
    fn test_maximizer_raises_loudness_under_ceiling() {
        let ctx = DspContext::new(48000.0, 512);
        let mut max = Dynamics::new(DynamicsMode::Maximizer);
        let mut params = ParamMap::new();
        params.set("gain_db", 12.0).set("ceiling_db", -0.3);

        let input = tone_burst(0.1, 24000, 0, 24000);
        let out = max.process(&input, &params, &ctx).unwrap();
        let in_rms: f64 = input.channel(0).iter().map(|s| s * s).sum();
        let out_rms: f64 = out.channel(0).iter().map(|s| s * s).sum();
        assert!(out_rms > in_rms * 4.0);
        assert!(out.peak() <= db_to_linear(-0.3) + 1e-9);
    }

    #[test]
    fn test_transient_shaper_boosts_attack() {
        let ctx = DspContext::new(48000.0, 512);
        let mut shaper = Dynamics::new(DynamicsMode::TransientShaper);
        let mut params = ParamMap::new();
        params.set("attack_gain", 1.0).set("sustain_gain", 0.0);

        // Burst with a hard onset.
        let input = tone_burst(0.5, 9600, 2400, 9600);
        let out = shaper.process(&input, &params, &ctx).unwrap();
        let attack_out: f64 = out.channel(0)[2400..2900].iter().map(|s| s.abs()).sum();
        let attack_in: f64 = input.channel(0)[2400..2900].iter().map(|s| s.abs()).sum();
        assert!(attack_out > attack_in * 1.2, "onset must be emphasized");
    }

    #[test]
    fn test_deesser_leaves_lows_alone() {
        let ctx = DspContext::new(48000.0, 512);
        let mut de = Dynamics::new(DynamicsMode::DeEsser);
        let mut params = ParamMap::new();
        params.set("threshold_db", -40.0);

        let input = tone_burst(0.5, 16384, 0, 16384); // 500 Hz, far below the band
        let out = de.process(&input, &params, &ctx).unwrap();
        let in_e: f64 = input.channel(0)[8192..].iter().map(|s| s * s).sum();
        let out_e: f64 = out.channel(0)[8192..].iter().map(|s| s * s).sum();
        assert!((out_e / in_e - 1.0).abs() < 0.1, "low content must survive");
    }

    #[test]
    fn test_all_modes_stable_and_zero_preserving() {
        let ctx = DspContext::new(48000.0, 512);
        for mode in [
            DynamicsMode::NoiseGate,
            DynamicsMode::Expander,
            DynamicsMode::DeEsser,
            DynamicsMode::Ducker,
            DynamicsMode::TransientShaper,
            DynamicsMode::LookaheadLimiter,
            DynamicsMode::Maximizer,
            DynamicsMode::Leveler,
            DynamicsMode::EnvelopeShaper,
            DynamicsMode::BrickwallClipper,
        ] {
            let mut dyn_proc = Dynamics::new(mode);
            let silence = AudioBuffer::silent(2, 1024, 48000.0);
            let out = dyn_proc.process(&silence, &ParamMap::new(), &ctx).unwrap();
            assert!(out.is_finite());
            assert_eq!(out.peak(), 0.0, "{mode:?} produced output from silence");

            let out = dyn_proc
                .process(&tone_burst(0.9, 1024, 0, 1024), &ParamMap::new(), &ctx)
                .unwrap();
            assert!(out.is_finite(), "{mode:?} went non-finite");
        }
    }
}
