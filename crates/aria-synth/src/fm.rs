//! Two-operator FM family
//!
//! A single modulator phase-modulates a carrier. The modulation index
//! rides its own decay envelope so bright attacks mellow into the tail,
//! which is where most of the family's character lives. Bell-like
//! variants use non-integer ratios, keys and brass stay harmonic.

use aria_core::{AriaResult, AudioBuffer, DspContext, DEFAULT_SAMPLE_RATE};
use aria_dsp::envelope::{Adsr, AdsrStage};
use aria_dsp::oscillator::{Lfo, Oscillator, Waveform};
use aria_dsp::{Processor, ProcessorConfig};

use crate::{InstrumentSynth, check_rate, stereo_buffer};

/// FM voice model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FmModel {
    Bell,
    Keys,
    Pluck,
    Brass,
    Organ,
    Lead,
    Marimba,
    Glass,
    Growl,
    Chime,
}

struct ModelSpec {
    /// Modulator frequency as a multiple of the carrier.
    ratio: f64,
    /// Peak modulation index, in radians of phase deviation.
    index: f64,
    /// Decay time of the index envelope.
    index_decay: f64,
    /// Fraction of the index that survives the decay.
    index_floor: f64,
    adsr: (f64, f64, f64, f64),
    /// Slow amplitude wobble, Hz (0 disables).
    trem_rate: f64,
    trem_depth: f64,
    /// Second detuned carrier for width.
    detune_cents: f64,
}

impl FmModel {
    fn spec(self) -> ModelSpec {
        let base = ModelSpec {
            ratio: 2.0,
            index: 3.0,
            index_decay: 0.4,
            index_floor: 0.1,
            adsr: (0.005, 0.3, 0.6, 0.3),
            trem_rate: 0.0,
            trem_depth: 0.0,
            detune_cents: 0.0,
        };
        match self {
            FmModel::Bell => ModelSpec {
                ratio: 3.5,
                index: 5.0,
                index_decay: 1.2,
                index_floor: 0.05,
                adsr: (0.002, 2.5, 0.0, 1.5),
                ..base
            },
            FmModel::Keys => ModelSpec {
                ratio: 1.0,
                index: 2.2,
                index_decay: 0.5,
                adsr: (0.004, 0.8, 0.4, 0.4),
                ..base
            },
            FmModel::Pluck => ModelSpec {
                ratio: 2.0,
                index: 4.0,
                index_decay: 0.08,
                index_floor: 0.0,
                adsr: (0.002, 0.4, 0.0, 0.3),
                ..base
            },
            FmModel::Brass => ModelSpec {
                ratio: 1.0,
                index: 3.5,
                index_decay: 0.15,
                index_floor: 0.5,
                adsr: (0.07, 0.2, 0.8, 0.2),
                ..base
            },
            FmModel::Organ => ModelSpec {
                ratio: 2.0,
                index: 1.2,
                index_decay: 1.0,
                index_floor: 1.0,
                adsr: (0.005, 0.01, 1.0, 0.06),
                trem_rate: 5.5,
                trem_depth: 0.12,
                ..base
            },
            FmModel::Lead => ModelSpec {
                ratio: 1.0,
                index: 4.5,
                index_decay: 0.3,
                index_floor: 0.4,
                adsr: (0.01, 0.2, 0.75, 0.25),
                detune_cents: 9.0,
                ..base
            },
            FmModel::Marimba => ModelSpec {
                ratio: 4.0,
                index: 2.5,
                index_decay: 0.05,
                index_floor: 0.0,
                adsr: (0.001, 0.5, 0.0, 0.3),
                ..base
            },
            FmModel::Glass => ModelSpec {
                ratio: 5.19,
                index: 3.0,
                index_decay: 0.9,
                index_floor: 0.08,
                adsr: (0.01, 1.8, 0.0, 1.0),
                ..base
            },
            FmModel::Growl => ModelSpec {
                ratio: 0.5,
                index: 6.0,
                index_decay: 0.4,
                index_floor: 0.7,
                adsr: (0.02, 0.3, 0.7, 0.3),
                trem_rate: 3.0,
                trem_depth: 0.2,
                ..base
            },
            FmModel::Chime => ModelSpec {
                ratio: 7.83,
                index: 4.0,
                index_decay: 2.0,
                index_floor: 0.03,
                adsr: (0.001, 3.5, 0.0, 2.0),
                ..base
            },
        }
    }
}

/// Two-operator FM voice
pub struct FmSynth {
    model: FmModel,
    carrier: Oscillator,
    carrier2: Oscillator,
    modulator: Oscillator,
    env: Adsr,
    tremolo: Lfo,
    index_env: f64,
    index_coeff: f64,
    frequency: f64,
    velocity: f64,
    sample_rate: f64,
}

impl FmSynth {
    pub fn new(model: FmModel) -> Self {
        let sr = DEFAULT_SAMPLE_RATE;
        let spec = model.spec();
        let mut env = Adsr::new(sr);
        env.set_adsr(spec.adsr.0, spec.adsr.1, spec.adsr.2, spec.adsr.3);
        Self {
            model,
            carrier: Oscillator::new(sr),
            carrier2: Oscillator::new(sr),
            modulator: Oscillator::new(sr),
            env,
            tremolo: Lfo::new(sr, spec.trem_rate.max(0.1), Waveform::Sine),
            index_env: 0.0,
            index_coeff: 0.0,
            frequency: 220.0,
            velocity: 0.0,
            sample_rate: sr,
        }
    }

    fn prepare(&mut self, ctx: &DspContext) {
        if (ctx.sample_rate - self.sample_rate).abs() > 1e-9 {
            self.sample_rate = ctx.sample_rate;
            self.carrier.set_sample_rate(ctx.sample_rate);
            self.carrier2.set_sample_rate(ctx.sample_rate);
            self.modulator.set_sample_rate(ctx.sample_rate);
            self.env.set_sample_rate(ctx.sample_rate);
            self.tremolo.set_sample_rate(ctx.sample_rate);
        }
    }
}

impl InstrumentSynth for FmSynth {
    fn note_on(&mut self, frequency: f64, velocity: f64, ctx: &DspContext) {
        self.prepare(ctx);
        let spec = self.model.spec();
        self.frequency = frequency.clamp(20.0, 8000.0);
        self.velocity = velocity.clamp(0.0, 1.0);
        let detune = (2.0f64).powf(spec.detune_cents / 1200.0);
        self.carrier.reset();
        self.carrier2.reset();
        self.modulator.reset();
        self.carrier.set_frequency(self.frequency);
        self.carrier2.set_frequency(self.frequency * detune);
        self.modulator.set_frequency(self.frequency * spec.ratio);
        self.env.trigger();
        // Velocity scales brightness harder than loudness.
        self.index_env = 1.0;
        self.index_coeff = (-1.0 / (spec.index_decay * self.sample_rate)).exp();
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
        let index = spec.index * (0.4 + 0.6 * self.velocity);
        let two_carrier = spec.detune_cents > 0.0;

        for i in 0..num_samples {
            if spec.adsr.2 == 0.0 && self.env.stage() == AdsrStage::Sustain {
                self.env.release();
            }
            let env = self.env.process();
            let idx = index * (spec.index_floor + (1.0 - spec.index_floor) * self.index_env);
            self.index_env *= self.index_coeff;

            let pm = self.modulator.process() * idx / std::f64::consts::TAU;
            let mut s = self.carrier.process_pm(pm);
            if two_carrier {
                s = (s + self.carrier2.process_pm(pm)) * 0.7;
            }
            let mut gain = env * self.velocity * 0.5;
            if spec.trem_depth > 0.0 {
                gain *= 1.0 - spec.trem_depth * self.tremolo.process_unipolar();
            }
            let v = s * gain;
            out.channel_mut(0)[i] = v;
            out.channel_mut(1)[i] = v;
        }
        Ok(out)
    }

    fn is_active(&self) -> bool {
        self.env.is_active()
    }

    fn reset(&mut self) {
        self.carrier.reset();
        self.carrier2.reset();
        self.modulator.reset();
        self.env.reset();
        self.tremolo.reset();
        self.index_env = 0.0;
        self.velocity = 0.0;
    }
}
