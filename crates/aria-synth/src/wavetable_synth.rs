//! Wavetable family
//!
//! Voices scan a bank of single-cycle tables. Each model picks a bank,
//! a home position and a motion source for the scan position: an LFO
//! for the moving pads, the amplitude envelope for the sweeps, or
//! nothing for the static tones. Two detuned scan heads give width.

use aria_core::{AriaResult, AudioBuffer, DspContext, DEFAULT_SAMPLE_RATE};
use aria_dsp::envelope::{Adsr, AdsrStage};
use aria_dsp::oscillator::{Lfo, Waveform};
use aria_dsp::wavetable::{TableRecipe, Wavetable};
use aria_dsp::{Processor, ProcessorConfig};

use crate::{InstrumentSynth, check_rate, pan_gains, stereo_buffer};

/// Wavetable voice model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavetableModel {
    Lead,
    Pad,
    Pluck,
    Keys,
    Sweep,
    Formant,
    Digital,
    Bell,
    Motion,
    Bass,
}

/// What drives the scan position after note-on.
#[derive(Clone, Copy)]
enum Motion {
    Static,
    Lfo { rate: f64, depth: f64 },
    /// Position tracks the amplitude envelope, scaled by depth.
    Envelope { depth: f64 },
}

struct ModelSpec {
    bank: Option<&'static [TableRecipe]>,
    position: f64,
    motion: Motion,
    detune_cents: f64,
    adsr: (f64, f64, f64, f64),
    octave: i32,
}

const BELL_BANK: &[TableRecipe] = &[
    TableRecipe::Sine,
    TableRecipe::Additive,
    TableRecipe::Formant(5.0, 11.0),
];
const FORMANT_BANK: &[TableRecipe] = &[
    TableRecipe::Formant(2.0, 7.0),
    TableRecipe::Formant(3.0, 9.0),
    TableRecipe::Formant(5.0, 12.0),
];
const DIGITAL_BANK: &[TableRecipe] = &[
    TableRecipe::Digital(8),
    TableRecipe::Digital(5),
    TableRecipe::Digital(3),
];

impl WavetableModel {
    fn spec(self) -> ModelSpec {
        let base = ModelSpec {
            bank: None,
            position: 0.3,
            motion: Motion::Static,
            detune_cents: 10.0,
            adsr: (0.01, 0.3, 0.7, 0.3),
            octave: 0,
        };
        match self {
            WavetableModel::Lead => ModelSpec {
                position: 0.35,
                motion: Motion::Lfo { rate: 0.4, depth: 0.1 },
                ..base
            },
            WavetableModel::Pad => ModelSpec {
                position: 0.2,
                motion: Motion::Lfo { rate: 0.15, depth: 0.15 },
                detune_cents: 14.0,
                adsr: (0.8, 0.5, 0.85, 1.2),
                ..base
            },
            WavetableModel::Pluck => ModelSpec {
                position: 0.5,
                motion: Motion::Envelope { depth: 0.4 },
                adsr: (0.002, 0.25, 0.0, 0.2),
                ..base
            },
            WavetableModel::Keys => ModelSpec {
                position: 0.15,
                adsr: (0.004, 0.6, 0.45, 0.35),
                ..base
            },
            WavetableModel::Sweep => ModelSpec {
                position: 0.0,
                motion: Motion::Envelope { depth: 0.9 },
                adsr: (1.5, 0.5, 0.8, 1.0),
                ..base
            },
            WavetableModel::Formant => ModelSpec {
                bank: Some(FORMANT_BANK),
                position: 0.0,
                motion: Motion::Lfo { rate: 0.3, depth: 0.5 },
                ..base
            },
            WavetableModel::Digital => ModelSpec {
                bank: Some(DIGITAL_BANK),
                position: 0.5,
                detune_cents: 6.0,
                ..base
            },
            WavetableModel::Bell => ModelSpec {
                bank: Some(BELL_BANK),
                position: 0.6,
                adsr: (0.002, 2.0, 0.0, 1.2),
                octave: 1,
                ..base
            },
            WavetableModel::Motion => ModelSpec {
                position: 0.5,
                motion: Motion::Lfo { rate: 1.2, depth: 0.45 },
                adsr: (0.2, 0.3, 0.8, 0.6),
                ..base
            },
            WavetableModel::Bass => ModelSpec {
                position: 0.4,
                detune_cents: 4.0,
                adsr: (0.004, 0.2, 0.8, 0.15),
                octave: -1,
                ..base
            },
        }
    }
}

/// Wavetable-scanning voice
pub struct WavetableSynth {
    model: WavetableModel,
    bank: Wavetable,
    // Two scan heads, detuned against each other.
    phase_a: f64,
    phase_b: f64,
    env: Adsr,
    motion_lfo: Lfo,
    frequency: f64,
    velocity: f64,
    sample_rate: f64,
}

impl WavetableSynth {
    pub fn new(model: WavetableModel) -> Self {
        let sr = DEFAULT_SAMPLE_RATE;
        let spec = model.spec();
        let bank = match spec.bank {
            Some(recipes) => Wavetable::from_recipes(recipes),
            None => Wavetable::standard_bank(),
        };
        let mut env = Adsr::new(sr);
        env.set_adsr(spec.adsr.0, spec.adsr.1, spec.adsr.2, spec.adsr.3);
        let lfo_rate = match spec.motion {
            Motion::Lfo { rate, .. } => rate,
            _ => 0.1,
        };
        Self {
            model,
            bank,
            phase_a: 0.0,
            phase_b: 0.0,
            env,
            motion_lfo: Lfo::new(sr, lfo_rate, Waveform::Sine),
            frequency: 220.0,
            velocity: 0.0,
            sample_rate: sr,
        }
    }

    fn prepare(&mut self, ctx: &DspContext) {
        if (ctx.sample_rate - self.sample_rate).abs() > 1e-9 {
            self.sample_rate = ctx.sample_rate;
            self.env.set_sample_rate(ctx.sample_rate);
            self.motion_lfo.set_sample_rate(ctx.sample_rate);
        }
    }
}

impl InstrumentSynth for WavetableSynth {
    fn note_on(&mut self, frequency: f64, velocity: f64, ctx: &DspContext) {
        self.prepare(ctx);
        let spec = self.model.spec();
        self.frequency = (frequency * (2.0f64).powi(spec.octave)).clamp(20.0, 8000.0);
        self.velocity = velocity.clamp(0.0, 1.0);
        self.phase_a = 0.0;
        self.phase_b = 0.0;
        self.motion_lfo.reset();
        self.env.trigger();
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
        let step_a = self.frequency / self.sample_rate;
        let step_b = self.frequency * detune / self.sample_rate;
        let (gl_a, gr_a) = pan_gains(-0.4);
        let (gl_b, gr_b) = pan_gains(0.4);

        for i in 0..num_samples {
            if spec.adsr.2 == 0.0 && self.env.stage() == AdsrStage::Sustain {
                self.env.release();
            }
            let env = self.env.process();
            let position = match spec.motion {
                Motion::Static => spec.position,
                Motion::Lfo { depth, .. } => {
                    spec.position + depth * self.motion_lfo.process_unipolar()
                }
                Motion::Envelope { depth } => spec.position + depth * env,
            }
            .clamp(0.0, 1.0);

            let a = self.bank.sample(self.phase_a, position);
            let b = self.bank.sample(self.phase_b, position);
            self.phase_a = (self.phase_a + step_a).rem_euclid(1.0);
            self.phase_b = (self.phase_b + step_b).rem_euclid(1.0);

            let gain = env * self.velocity * 0.45;
            out.channel_mut(0)[i] = (a * gl_a + b * gl_b) * gain;
            out.channel_mut(1)[i] = (a * gr_a + b * gr_b) * gain;
        }
        Ok(out)
    }

    fn is_active(&self) -> bool {
        self.env.is_active()
    }

    fn reset(&mut self) {
        self.phase_a = 0.0;
        self.phase_b = 0.0;
        self.env.reset();
        self.motion_lfo.reset();
        self.velocity = 0.0;
    }
}
