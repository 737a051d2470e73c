//! Virtual-analog family
//!
//! Two oscillators into a resonant lowpass with an envelope-driven sweep.
//! On top of the common voice: portamento (glide), pulse-width motion
//! (PWM), emulated hard sync (slave phase reset on master wrap), and a
//! drawbar organ mode that bypasses the filter envelope entirely.

use aria_core::{AriaResult, AudioBuffer, DspContext, DEFAULT_SAMPLE_RATE};
use aria_dsp::biquad::BiquadTDF2;
use aria_dsp::envelope::{Adsr, AdsrStage};
use aria_dsp::oscillator::{Lfo, Oscillator, Waveform};
use aria_dsp::{MonoProcessor, Processor, ProcessorConfig};

use crate::{InstrumentSynth, check_rate, pan_gains, stereo_buffer};

/// Analog synth model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogModel {
    Lead,
    Brass,
    Pluck,
    Keys,
    Poly,
    MonoLead,
    PwmLead,
    SyncLead,
    GlideLead,
    Organ,
}

const DRAWBARS: &[(f64, f64)] = &[(0.5, 0.5), (1.0, 1.0), (2.0, 0.6), (3.0, 0.3), (4.0, 0.2)];

struct ModelSpec {
    wave: Waveform,
    wave2: Option<Waveform>,
    detune_cents: f64,
    cutoff: f64,
    cutoff_env: f64,
    resonance: f64,
    filter_decay: f64,
    adsr: (f64, f64, f64, f64),
    pwm_rate: f64,
    pwm_depth: f64,
    sync_ratio: f64,
    glide_seconds: f64,
    organ: bool,
}

impl AnalogModel {
    fn spec(self) -> ModelSpec {
        let base = ModelSpec {
            wave: Waveform::BlSaw,
            wave2: None,
            detune_cents: 8.0,
            cutoff: 1800.0,
            cutoff_env: 2.0,
            resonance: 1.2,
            filter_decay: 0.3,
            adsr: (0.01, 0.2, 0.7, 0.25),
            pwm_rate: 0.0,
            pwm_depth: 0.0,
            sync_ratio: 0.0,
            glide_seconds: 0.0,
            organ: false,
        };
        match self {
            AnalogModel::Lead => ModelSpec {
                wave2: Some(Waveform::BlSaw),
                ..base
            },
            AnalogModel::Brass => ModelSpec {
                cutoff: 1000.0,
                cutoff_env: 3.0,
                filter_decay: 0.5,
                adsr: (0.06, 0.3, 0.8, 0.2),
                resonance: 0.8,
                ..base
            },
            AnalogModel::Pluck => ModelSpec {
                cutoff: 2500.0,
                filter_decay: 0.09,
                adsr: (0.002, 0.3, 0.0, 0.2),
                ..base
            },
            AnalogModel::Keys => ModelSpec {
                wave: Waveform::BlSquare,
                cutoff: 2000.0,
                cutoff_env: 1.2,
                filter_decay: 0.4,
                adsr: (0.005, 0.5, 0.5, 0.3),
                ..base
            },
            AnalogModel::Poly => ModelSpec {
                wave2: Some(Waveform::BlSaw),
                detune_cents: 16.0,
                cutoff: 2200.0,
                adsr: (0.03, 0.3, 0.75, 0.5),
                ..base
            },
            AnalogModel::MonoLead => ModelSpec {
                wave2: Some(Waveform::BlSquare),
                cutoff: 2800.0,
                resonance: 2.0,
                glide_seconds: 0.03,
                ..base
            },
            AnalogModel::PwmLead => ModelSpec {
                wave: Waveform::Pulse,
                pwm_rate: 0.6,
                pwm_depth: 0.35,
                cutoff: 2400.0,
                ..base
            },
            AnalogModel::SyncLead => ModelSpec {
                sync_ratio: 1.5,
                cutoff: 3200.0,
                resonance: 1.0,
                ..base
            },
            AnalogModel::GlideLead => ModelSpec {
                glide_seconds: 0.12,
                cutoff: 2000.0,
                ..base
            },
            AnalogModel::Organ => ModelSpec {
                wave: Waveform::Sine,
                cutoff: 8000.0,
                cutoff_env: 0.0,
                resonance: 0.707,
                adsr: (0.004, 0.01, 1.0, 0.05),
                organ: true,
                ..base
            },
        }
    }
}

/// Virtual-analog voice
pub struct AnalogSynth {
    model: AnalogModel,
    osc1: Oscillator,
    osc2: Oscillator,
    drawbars: Vec<Oscillator>,
    env: Adsr,
    filter_env: f64,
    filter_decay_coeff: f64,
    filter_l: BiquadTDF2,
    filter_r: BiquadTDF2,
    pwm: Lfo,
    // Glide state: current frequency eases toward the target.
    current_freq: f64,
    target_freq: f64,
    glide_coeff: f64,
    // Sync emulation: master phase accumulator resets the slave.
    master_phase: f64,
    velocity: f64,
    tick: u64,
    sample_rate: f64,
}

impl AnalogSynth {
    pub fn new(model: AnalogModel) -> Self {
        let sr = DEFAULT_SAMPLE_RATE;
        let spec = model.spec();
        let mut env = Adsr::new(sr);
        env.set_adsr(spec.adsr.0, spec.adsr.1, spec.adsr.2, spec.adsr.3);
        Self {
            model,
            osc1: Oscillator::with_waveform(sr, spec.wave),
            osc2: Oscillator::with_waveform(sr, spec.wave2.unwrap_or(spec.wave)),
            drawbars: Vec::new(),
            env,
            filter_env: 0.0,
            filter_decay_coeff: 0.0,
            filter_l: BiquadTDF2::new(sr),
            filter_r: BiquadTDF2::new(sr),
            pwm: Lfo::new(sr, spec.pwm_rate.max(0.1), Waveform::Sine),
            current_freq: 220.0,
            target_freq: 220.0,
            glide_coeff: 0.0,
            master_phase: 0.0,
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
            for osc in &mut self.drawbars {
                osc.set_sample_rate(ctx.sample_rate);
            }
            self.env.set_sample_rate(ctx.sample_rate);
            self.pwm.set_sample_rate(ctx.sample_rate);
            self.filter_l = BiquadTDF2::new(ctx.sample_rate);
            self.filter_r = BiquadTDF2::new(ctx.sample_rate);
        }
    }
}

impl InstrumentSynth for AnalogSynth {
    fn note_on(&mut self, frequency: f64, velocity: f64, ctx: &DspContext) {
        self.prepare(ctx);
        let spec = self.model.spec();
        let frequency = frequency.clamp(20.0, 8000.0);
        self.velocity = velocity.clamp(0.0, 1.0);

        self.target_freq = frequency;
        if spec.glide_seconds > 0.0 && self.env.is_active() {
            // Legato: keep the old pitch and slide from there.
            self.glide_coeff = (-1.0 / (spec.glide_seconds * self.sample_rate)).exp();
        } else {
            self.current_freq = frequency;
            self.glide_coeff = if spec.glide_seconds > 0.0 {
                (-1.0 / (spec.glide_seconds * self.sample_rate)).exp()
            } else {
                0.0
            };
        }

        if spec.organ {
            self.drawbars = DRAWBARS
                .iter()
                .map(|&(ratio, _)| {
                    let mut osc = Oscillator::new(self.sample_rate);
                    osc.set_frequency(frequency * ratio);
                    osc
                })
                .collect();
        } else {
            self.osc1.reset();
            self.osc2.reset();
            self.osc2.set_phase(0.5);
        }
        self.master_phase = 0.0;
        self.env.trigger();
        self.filter_env = 1.0;
        self.filter_decay_coeff = (-1.0 / (spec.filter_decay * self.sample_rate)).exp();
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
        let detune = (2.0f64).powf(spec.detune_cents / 1200.0);

        for i in 0..num_samples {
            // Plucked envelopes (sustain 0) fall straight into release.
            if spec.adsr.2 == 0.0 && self.env.stage() == AdsrStage::Sustain {
                self.env.release();
            }
            let env = self.env.process();
            self.current_freq =
                self.target_freq + (self.current_freq - self.target_freq) * self.glide_coeff;
            if self.tick % 16 == 0 {
                let cutoff = (spec.cutoff * (1.0 + spec.cutoff_env * self.filter_env))
                    .clamp(80.0, self.sample_rate * 0.45);
                self.filter_l.set_lowpass(cutoff, spec.resonance);
                self.filter_r.set_lowpass(cutoff, spec.resonance);
            }
            self.tick += 1;

            let (mut left, mut right) = if spec.organ {
                let mut s = 0.0;
                for (osc, &(ratio, gain)) in self.drawbars.iter_mut().zip(DRAWBARS) {
                    osc.set_frequency(self.current_freq * ratio);
                    s += osc.process() * gain;
                }
                s *= 0.4;
                (s, s)
            } else {
                if spec.pwm_depth > 0.0 {
                    self.osc1
                        .set_pulse_width(0.5 + self.pwm.process() * spec.pwm_depth);
                }
                if spec.sync_ratio > 0.0 {
                    // Slave runs sharp; every master wrap snaps it back.
                    self.master_phase += self.current_freq / self.sample_rate;
                    if self.master_phase >= 1.0 {
                        self.master_phase -= 1.0;
                        self.osc1.set_phase(0.0);
                    }
                    self.osc1.set_frequency(self.current_freq * spec.sync_ratio);
                } else {
                    self.osc1.set_frequency(self.current_freq);
                }
                let a = self.osc1.process();
                if spec.wave2.is_some() {
                    self.osc2.set_frequency(self.current_freq * detune);
                    let b = self.osc2.process();
                    let (gl1, gr1) = pan_gains(-0.3);
                    let (gl2, gr2) = pan_gains(0.3);
                    (a * gl1 + b * gl2, a * gr1 + b * gr2)
                } else {
                    (a * 0.8, a * 0.8)
                }
            };
            self.filter_env *= self.filter_decay_coeff;
            let gain = env * self.velocity * 0.6;
            left = self.filter_l.process_sample(left * gain);
            right = self.filter_r.process_sample(right * gain);
            out.channel_mut(0)[i] = left;
            out.channel_mut(1)[i] = right;
        }
        Ok(out)
    }

    fn is_active(&self) -> bool {
        self.env.is_active()
    }

    fn reset(&mut self) {
        self.osc1.reset();
        self.osc2.reset();
        self.drawbars.clear();
        self.env.reset();
        self.filter_l.clear();
        self.filter_r.clear();
        self.pwm.reset();
        self.filter_env = 0.0;
        self.master_phase = 0.0;
        self.tick = 0;
        self.velocity = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glide_slides_between_notes() {
        let ctx = DspContext::new(48000.0, 512);
        let mut synth = AnalogSynth::new(AnalogModel::GlideLead);
        synth.note_on(220.0, 0.8, &ctx);
        synth.render(4800, &ctx).unwrap();
        // Retrigger while held: pitch must ease, not jump.
        synth.note_on(440.0, 0.8, &ctx);
        synth.render(256, &ctx).unwrap();
        let early_freq = synth.current_freq;
        synth.render(48000, &ctx).unwrap();
        assert!(early_freq > 220.0 && early_freq < 400.0, "glide mid-way: {early_freq}");
        assert!((synth.current_freq - 440.0).abs() < 1.0);
    }

    #[test]
    fn test_pluck_self_terminates() {
        let ctx = DspContext::new(48000.0, 512);
        let mut synth = AnalogSynth::new(AnalogModel::Pluck);
        synth.note_on(440.0, 0.9, &ctx);
        let pluck = synth.render(4800, &ctx).unwrap();
        assert!(pluck.rms() > 0.005);
        // Sustain level 0: once the decay finishes the voice idles after
        // release, no note_off needed for silence.
        synth.render(48000, &ctx).unwrap();
        let tail = synth.render(4800, &ctx).unwrap();
        assert!(tail.rms() < 1e-4);
        assert!(!synth.is_active());
    }

    #[test]
    fn test_organ_has_no_filter_sweep() {
        let ctx = DspContext::new(48000.0, 512);
        let mut organ = AnalogSynth::new(AnalogModel::Organ);
        organ.note_on(220.0, 0.8, &ctx);
        let out = organ.render(24000, &ctx).unwrap();
        // Steady drawbar tone: early and late windows match in level.
        let rms = |w: &[f64]| (w.iter().map(|s| s * s).sum::<f64>() / w.len() as f64).sqrt();
        let early = rms(&out.channel(0)[2400..7200]);
        let late = rms(&out.channel(0)[19200..24000]);
        assert!((early / late - 1.0).abs() < 0.1, "{early} vs {late}");
    }

    #[test]
    fn test_sync_lead_is_harmonically_rich() {
        let ctx = DspContext::new(48000.0, 512);
        let mut sync = AnalogSynth::new(AnalogModel::SyncLead);
        sync.note_on(220.0, 0.9, &ctx);
        let out = sync.render(9600, &ctx).unwrap();
        assert!(out.is_finite());
        assert!(out.rms() > 0.01);
    }

    #[test]
    fn test_all_models_render_finite() {
        let ctx = DspContext::new(48000.0, 512);
        for model in [
            AnalogModel::Lead,
            AnalogModel::Brass,
            AnalogModel::Pluck,
            AnalogModel::Keys,
            AnalogModel::Poly,
            AnalogModel::MonoLead,
            AnalogModel::PwmLead,
            AnalogModel::SyncLead,
            AnalogModel::GlideLead,
            AnalogModel::Organ,
        ] {
            let mut synth = AnalogSynth::new(model);
            synth.note_on(330.0, 0.8, &ctx);
            let out = synth.render(4096, &ctx).unwrap();
            assert!(out.is_finite(), "{model:?} went non-finite");
            assert!(out.rms() > 1e-5, "{model:?} rendered silence");
        }
    }
}
