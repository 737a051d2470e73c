//! Bass family
//!
//! Mono-summed two-oscillator voices into a resonant lowpass. The filter
//! is the instrument here: acid squelch, wobble LFO, reese beating, slap
//! transients. FM bass swaps the oscillator pair for a 2-operator stack.

use aria_core::{AriaResult, AudioBuffer, DspContext, DEFAULT_SAMPLE_RATE};
use aria_dsp::biquad::BiquadTDF2;
use aria_dsp::envelope::Adsr;
use aria_dsp::noise::NoiseSource;
use aria_dsp::onepole::OnePole;
use aria_dsp::oscillator::{Lfo, Oscillator, Waveform};
use aria_dsp::{MonoProcessor, Processor, ProcessorConfig};

use crate::{InstrumentSynth, check_rate, stereo_buffer};

/// Bass model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BassModel {
    Analog,
    Sub,
    Acid,
    Fm,
    Reese,
    Wobble,
    Slap,
    Pick,
    Upright,
    Synth,
}

struct ModelSpec {
    wave: Waveform,
    wave2: Option<Waveform>,
    detune_cents: f64,
    sub_gain: f64,
    cutoff: f64,
    cutoff_env: f64,
    resonance: f64,
    filter_decay: f64,
    adsr: (f64, f64, f64, f64),
    fm: Option<(f64, f64)>,
    wobble_rate: f64,
    transient: f64,
    drive: f64,
}

impl BassModel {
    fn spec(self) -> ModelSpec {
        let base = ModelSpec {
            wave: Waveform::BlSaw,
            wave2: None,
            detune_cents: 0.0,
            sub_gain: 0.0,
            cutoff: 900.0,
            cutoff_env: 2.0,
            resonance: 0.9,
            filter_decay: 0.25,
            adsr: (0.005, 0.15, 0.8, 0.2),
            fm: None,
            wobble_rate: 0.0,
            transient: 0.0,
            drive: 0.0,
        };
        match self {
            BassModel::Analog => ModelSpec {
                wave2: Some(Waveform::BlSquare),
                sub_gain: 0.5,
                ..base
            },
            BassModel::Sub => ModelSpec {
                wave: Waveform::Sine,
                cutoff: 400.0,
                cutoff_env: 0.5,
                resonance: 0.5,
                drive: 1.3,
                ..base
            },
            BassModel::Acid => ModelSpec {
                cutoff: 300.0,
                cutoff_env: 5.0,
                resonance: 6.0,
                filter_decay: 0.18,
                drive: 1.5,
                ..base
            },
            BassModel::Fm => ModelSpec {
                wave: Waveform::Sine,
                fm: Some((1.0, 2.5)),
                cutoff: 3000.0,
                cutoff_env: 0.5,
                ..base
            },
            BassModel::Reese => ModelSpec {
                wave2: Some(Waveform::BlSaw),
                detune_cents: 25.0,
                cutoff: 1200.0,
                cutoff_env: 0.5,
                resonance: 0.6,
                adsr: (0.01, 0.2, 0.9, 0.3),
                ..base
            },
            BassModel::Wobble => ModelSpec {
                wave2: Some(Waveform::BlSaw),
                detune_cents: 12.0,
                cutoff: 350.0,
                cutoff_env: 3.0,
                resonance: 2.5,
                wobble_rate: 2.0,
                ..base
            },
            BassModel::Slap => ModelSpec {
                wave2: Some(Waveform::BlSquare),
                cutoff: 2500.0,
                cutoff_env: 2.0,
                filter_decay: 0.08,
                transient: 0.5,
                adsr: (0.002, 0.25, 0.5, 0.15),
                ..base
            },
            BassModel::Pick => ModelSpec {
                cutoff: 1800.0,
                filter_decay: 0.12,
                transient: 0.3,
                adsr: (0.002, 0.3, 0.6, 0.15),
                ..base
            },
            BassModel::Upright => ModelSpec {
                wave: Waveform::Sine,
                wave2: Some(Waveform::Triangle),
                cutoff: 800.0,
                cutoff_env: 1.0,
                resonance: 0.6,
                transient: 0.15,
                adsr: (0.008, 0.4, 0.5, 0.25),
                ..base
            },
            BassModel::Synth => ModelSpec {
                wave: Waveform::BlSquare,
                cutoff: 1100.0,
                ..base
            },
        }
    }
}

/// Subtractive/FM bass voice
pub struct Bass {
    model: BassModel,
    osc1: Oscillator,
    osc2: Oscillator,
    sub_osc: Oscillator,
    modulator: Oscillator,
    env: Adsr,
    filter_env: f64,
    filter_decay_coeff: f64,
    filter: BiquadTDF2,
    wobble: Lfo,
    noise: NoiseSource,
    transient_filter: OnePole,
    transient_remaining: usize,
    frequency: f64,
    velocity: f64,
    tick: u64,
    sample_rate: f64,
}

impl Bass {
    pub fn new(model: BassModel) -> Self {
        let sr = DEFAULT_SAMPLE_RATE;
        let spec = model.spec();
        let mut env = Adsr::new(sr);
        env.set_adsr(spec.adsr.0, spec.adsr.1, spec.adsr.2, spec.adsr.3);
        Self {
            model,
            osc1: Oscillator::with_waveform(sr, spec.wave),
            osc2: Oscillator::with_waveform(sr, spec.wave2.unwrap_or(spec.wave)),
            sub_osc: Oscillator::new(sr),
            modulator: Oscillator::new(sr),
            env,
            filter_env: 0.0,
            filter_decay_coeff: 0.0,
            filter: BiquadTDF2::new(sr),
            wobble: Lfo::new(sr, spec.wobble_rate.max(0.1), Waveform::Sine),
            noise: NoiseSource::new(0xba55),
            transient_filter: OnePole::highpass(sr, 1200.0),
            transient_remaining: 0,
            frequency: 55.0,
            velocity: 0.0,
            tick: 0,
            sample_rate: sr,
        }
    }

    fn prepare(&mut self, ctx: &DspContext) {
        if (ctx.sample_rate - self.sample_rate).abs() > 1e-9 {
            self.sample_rate = ctx.sample_rate;
            self.osc1.set_sample_rate(ctx.sample_rate);
            self.osc2.set_sample_rate(ctx.sample_rate);
            self.sub_osc.set_sample_rate(ctx.sample_rate);
            self.modulator.set_sample_rate(ctx.sample_rate);
            self.env.set_sample_rate(ctx.sample_rate);
            self.wobble.set_sample_rate(ctx.sample_rate);
            self.transient_filter.set_sample_rate(ctx.sample_rate);
            self.filter = BiquadTDF2::new(ctx.sample_rate);
        }
    }
}

impl InstrumentSynth for Bass {
    fn note_on(&mut self, frequency: f64, velocity: f64, ctx: &DspContext) {
        self.prepare(ctx);
        let spec = self.model.spec();
        self.frequency = frequency.clamp(20.0, 2000.0);
        self.velocity = velocity.clamp(0.0, 1.0);

        let detune = (2.0f64).powf(spec.detune_cents / 1200.0);
        self.osc1.set_frequency(self.frequency);
        self.osc2.set_frequency(self.frequency * detune);
        self.sub_osc.set_frequency(self.frequency * 0.5);
        if let Some((ratio, _)) = spec.fm {
            self.modulator.set_frequency(self.frequency * ratio);
        }
        self.osc1.reset();
        self.osc2.reset();
        self.sub_osc.reset();
        self.modulator.reset();
        self.noise.reset();
        self.env.trigger();
        self.filter_env = 1.0;
        self.filter_decay_coeff = (-1.0 / (spec.filter_decay * self.sample_rate)).exp();
        self.transient_remaining = if spec.transient > 0.0 {
            (0.004 * self.sample_rate) as usize
        } else {
            0
        };
    }

    fn note_off(&mut self, _ctx: &DspContext) {
        self.env.release();
    }

    fn render(&mut self, num_samples: usize, ctx: &DspContext) -> AriaResult<AudioBuffer> {
        check_rate(ctx)?;
        self.prepare(ctx);
        let spec = self.model.spec();
        let mut out = stereo_buffer(num_samples, self.sample_rate);
        if !self.env.is_active() {
            return Ok(out);
        }

        for i in 0..num_samples {
            let env = self.env.process();
            if self.tick % 16 == 0 {
                let wobble = if spec.wobble_rate > 0.0 {
                    0.5 + 0.5 * self.wobble.process_unipolar()
                } else {
                    1.0
                };
                let cutoff = spec.cutoff
                    * (1.0 + spec.cutoff_env * self.filter_env)
                    * wobble;
                self.filter
                    .set_lowpass(cutoff.clamp(40.0, self.sample_rate * 0.45), spec.resonance);
            } else if spec.wobble_rate > 0.0 {
                // Keep the LFO phase advancing on skipped ticks.
                self.wobble.process_unipolar();
            }
            self.tick += 1;

            let mut s = match spec.fm {
                Some((_, index)) => {
                    let pm = self.modulator.process() * index * self.filter_env;
                    self.osc1.process_pm(pm * 0.15)
                }
                None => {
                    let mut v = self.osc1.process();
                    if spec.wave2.is_some() {
                        v = (v + self.osc2.process()) * 0.5;
                    }
                    v
                }
            };
            if spec.sub_gain > 0.0 {
                s += self.sub_osc.process() * spec.sub_gain;
            }
            if self.transient_remaining > 0 {
                self.transient_remaining -= 1;
                s += self.transient_filter.process_sample(self.noise.white()) * spec.transient;
            }
            // Drive ahead of the filter so the closing sweep still darkens
            // the saturated harmonics.
            if spec.drive > 0.0 {
                s = (s * spec.drive).tanh() / spec.drive;
            }
            s = self.filter.process_sample(s);
            self.filter_env *= self.filter_decay_coeff;

            let v = s * env * self.velocity * 0.8;
            out.channel_mut(0)[i] = v;
            out.channel_mut(1)[i] = v;
        }
        Ok(out)
    }

    fn is_active(&self) -> bool {
        self.env.is_active()
    }

    fn reset(&mut self) {
        self.osc1.reset();
        self.osc2.reset();
        self.sub_osc.reset();
        self.modulator.reset();
        self.env.reset();
        self.filter.clear();
        self.wobble.reset();
        self.noise.reset();
        self.transient_filter.reset();
        self.transient_remaining = 0;
        self.filter_env = 0.0;
        self.tick = 0;
        self.velocity = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_sounds_and_releases() {
        let ctx = DspContext::new(48000.0, 512);
        let mut bass = Bass::new(BassModel::Analog);
        bass.note_on(55.0, 0.9, &ctx);
        let held = bass.render(9600, &ctx).unwrap();
        assert!(held.rms() > 0.01);
        bass.note_off(&ctx);
        for _ in 0..5 {
            bass.render(4800, &ctx).unwrap();
        }
        assert!(!bass.is_active());
    }

    #[test]
    fn test_acid_filter_sweep_brightens_attack() {
        let ctx = DspContext::new(48000.0, 512);
        let mut bass = Bass::new(BassModel::Acid);
        bass.note_on(110.0, 1.0, &ctx);
        let out = bass.render(24000, &ctx).unwrap();
        // Filter opens at the attack and closes over ~180 ms: energy above
        // 800 Hz must collapse between the early and late windows.
        let mut hp = OnePole::highpass(48000.0, 800.0);
        let bright: Vec<f64> = out.channel(0).iter().map(|&s| hp.process_sample(s)).collect();
        let early: f64 = bright[0..4800].iter().map(|s| s * s).sum();
        let late: f64 = bright[19200..24000].iter().map(|s| s * s).sum();
        assert!(early > late * 3.0, "sweep must darken the tail: {early} vs {late}");
    }

    #[test]
    fn test_wobble_modulates_brightness() {
        let ctx = DspContext::new(48000.0, 512);
        let mut bass = Bass::new(BassModel::Wobble);
        bass.note_on(55.0, 1.0, &ctx);
        // 2 Hz wobble: compare RMS of high-passed halves of one cycle.
        let out = bass.render(48000, &ctx).unwrap();
        let mut hp = OnePole::highpass(48000.0, 800.0);
        let bright: Vec<f64> = out.channel(0).iter().map(|&s| hp.process_sample(s)).collect();
        let a: f64 = bright[24000..30000].iter().map(|s| s * s).sum();
        let b: f64 = bright[36000..42000].iter().map(|s| s * s).sum();
        let ratio = a.max(b) / a.min(b).max(1e-12);
        assert!(ratio > 1.5, "wobble must swing the top end, got {ratio}");
    }

    #[test]
    fn test_block_size_invariance() {
        let ctx = DspContext::new(48000.0, 512);
        let mut a = Bass::new(BassModel::Wobble);
        let mut b = Bass::new(BassModel::Wobble);
        a.note_on(82.4, 0.8, &ctx);
        b.note_on(82.4, 0.8, &ctx);
        let whole = a.render(512, &ctx).unwrap();
        let first = b.render(256, &ctx).unwrap();
        let second = b.render(256, &ctx).unwrap();
        for i in 0..256 {
            assert_eq!(whole.channel(0)[i], first.channel(0)[i]);
            assert_eq!(whole.channel(0)[256 + i], second.channel(0)[i]);
        }
    }

    #[test]
    fn test_all_models_render_finite() {
        let ctx = DspContext::new(48000.0, 512);
        for model in [
            BassModel::Analog,
            BassModel::Sub,
            BassModel::Acid,
            BassModel::Fm,
            BassModel::Reese,
            BassModel::Wobble,
            BassModel::Slap,
            BassModel::Pick,
            BassModel::Upright,
            BassModel::Synth,
        ] {
            let mut bass = Bass::new(model);
            bass.note_on(61.7, 0.8, &ctx);
            let out = bass.render(4096, &ctx).unwrap();
            assert!(out.is_finite(), "{model:?} went non-finite");
            assert!(out.rms() > 1e-5, "{model:?} rendered silence");
        }
    }
}
