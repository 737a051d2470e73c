//! Piano family
//!
//! Additive partial stacks. Acoustic models use a harmonic series with
//! string inharmonicity (f_k = f * k * sqrt(1 + B k^2)); electric and
//! mallet-ish models use fixed modal ratio tables. A short filtered noise
//! burst stands in for the hammer, scaled and brightened by velocity.

use aria_core::{AriaResult, AudioBuffer, DspContext, DEFAULT_SAMPLE_RATE};
use aria_dsp::noise::NoiseSource;
use aria_dsp::onepole::OnePole;
use aria_dsp::oscillator::Oscillator;
use aria_dsp::{MonoProcessor, Processor, ProcessorConfig};

use crate::{InstrumentSynth, SILENCE_FLOOR, check_rate, stereo_buffer};

/// Piano model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PianoModel {
    Grand,
    Upright,
    Felt,
    HonkyTonk,
    ElectricTine,
    ElectricReed,
    DxEPiano,
    Toy,
    Bell,
    Harpsichord,
}

struct ModelSpec {
    /// Harmonic partial count; unused when `modes` is set.
    partials: usize,
    inharmonicity: f64,
    /// Amplitude rolloff exponent: amp_k = 1 / k^rolloff.
    rolloff: f64,
    /// Base decay of the fundamental, seconds.
    decay: f64,
    /// How much faster the k-th partial decays.
    decay_spread: f64,
    hammer: f64,
    /// Fixed (ratio, amp) table for non-harmonic models.
    modes: Option<&'static [(f64, f64)]>,
    /// Second detuned strike, cents (honky-tonk).
    double_strike_cents: f64,
}

const TINE_MODES: &[(f64, f64)] = &[(1.0, 1.0), (4.0, 0.15), (10.0, 0.05)];
const REED_MODES: &[(f64, f64)] = &[(1.0, 1.0), (2.0, 0.3), (3.0, 0.15), (4.0, 0.08)];
const DX_MODES: &[(f64, f64)] = &[(1.0, 1.0), (3.0, 0.2), (7.0, 0.12), (14.0, 0.05)];
const TOY_MODES: &[(f64, f64)] = &[(1.0, 1.0), (3.9, 0.3), (9.2, 0.15)];
const BELL_MODES: &[(f64, f64)] = &[(1.0, 1.0), (2.76, 0.6), (5.4, 0.4), (8.93, 0.25)];

impl PianoModel {
    fn spec(self) -> ModelSpec {
        let base = ModelSpec {
            partials: 16,
            inharmonicity: 0.0002,
            rolloff: 1.0,
            decay: 4.0,
            decay_spread: 0.5,
            hammer: 0.25,
            modes: None,
            double_strike_cents: 0.0,
        };
        match self {
            PianoModel::Grand => base,
            PianoModel::Upright => ModelSpec {
                partials: 12,
                inharmonicity: 0.0004,
                rolloff: 1.2,
                decay: 3.0,
                hammer: 0.3,
                ..base
            },
            PianoModel::Felt => ModelSpec {
                partials: 8,
                rolloff: 2.0,
                decay: 3.5,
                hammer: 0.08,
                ..base
            },
            PianoModel::HonkyTonk => ModelSpec {
                partials: 12,
                inharmonicity: 0.0005,
                rolloff: 1.1,
                decay: 2.5,
                double_strike_cents: 12.0,
                ..base
            },
            PianoModel::ElectricTine => ModelSpec {
                decay: 5.0,
                decay_spread: 1.5,
                hammer: 0.1,
                modes: Some(TINE_MODES),
                ..base
            },
            PianoModel::ElectricReed => ModelSpec {
                decay: 3.0,
                decay_spread: 1.0,
                hammer: 0.12,
                modes: Some(REED_MODES),
                ..base
            },
            PianoModel::DxEPiano => ModelSpec {
                decay: 4.0,
                decay_spread: 2.0,
                hammer: 0.05,
                modes: Some(DX_MODES),
                ..base
            },
            PianoModel::Toy => ModelSpec {
                decay: 1.2,
                decay_spread: 1.0,
                hammer: 0.2,
                modes: Some(TOY_MODES),
                ..base
            },
            PianoModel::Bell => ModelSpec {
                decay: 6.0,
                decay_spread: 0.8,
                hammer: 0.1,
                modes: Some(BELL_MODES),
                ..base
            },
            PianoModel::Harpsichord => ModelSpec {
                partials: 20,
                inharmonicity: 0.0001,
                rolloff: 0.7,
                decay: 1.5,
                decay_spread: 0.8,
                hammer: 0.4,
                ..base
            },
        }
    }
}

struct Partial {
    osc: Oscillator,
    amp: f64,
    env: f64,
    decay_coeff: f64,
    pan: f64,
}

/// Additive piano voice
pub struct Piano {
    model: PianoModel,
    partials: Vec<Partial>,
    hammer_noise: NoiseSource,
    hammer_filter: OnePole,
    hammer_remaining: usize,
    hammer_gain: f64,
    release_coeff: f64,
    releasing: bool,
    active: bool,
    sample_rate: f64,
}

impl Piano {
    pub fn new(model: PianoModel) -> Self {
        Self {
            model,
            partials: Vec::new(),
            hammer_noise: NoiseSource::new(0x9a70),
            hammer_filter: OnePole::lowpass(DEFAULT_SAMPLE_RATE, 3000.0),
            hammer_remaining: 0,
            hammer_gain: 0.0,
            release_coeff: 1.0,
            releasing: false,
            active: false,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    fn prepare(&mut self, ctx: &DspContext) {
        if (ctx.sample_rate - self.sample_rate).abs() > 1e-9 {
            log::debug!("{:?} piano re-tuning for {} Hz", self.model, ctx.sample_rate);
            self.sample_rate = ctx.sample_rate;
            self.hammer_filter.set_sample_rate(ctx.sample_rate);
        }
    }

    fn spawn_partials(&mut self, frequency: f64, velocity: f64) {
        let spec = self.model.spec();
        let sr = self.sample_rate;
        let nyquist = sr * 0.45;
        // Brighter strikes decay the rolloff less per partial.
        let brightness = 0.4 + 0.6 * velocity;
        self.partials.clear();

        let mut ratios: Vec<(f64, f64)> = match spec.modes {
            Some(modes) => modes.to_vec(),
            None => (1..=spec.partials)
                .map(|k| {
                    let k_f = k as f64;
                    let ratio = k_f * (1.0 + spec.inharmonicity * k_f * k_f).sqrt();
                    (ratio, 1.0 / k_f.powf(spec.rolloff))
                })
                .collect(),
        };
        if spec.double_strike_cents > 0.0 {
            let detune = (2.0f64).powf(spec.double_strike_cents / 1200.0);
            let doubled: Vec<(f64, f64)> =
                ratios.iter().map(|&(r, a)| (r * detune, a * 0.7)).collect();
            ratios.extend(doubled);
        }

        for (idx, (ratio, base_amp)) in ratios.into_iter().enumerate() {
            let freq = frequency * ratio;
            if freq >= nyquist {
                continue;
            }
            let mut osc = Oscillator::new(sr);
            osc.set_frequency(freq);
            let tau = spec.decay / (1.0 + (ratio - 1.0) * spec.decay_spread);
            // Alternate partials lean slightly left/right for width.
            let pan = if idx % 2 == 0 { -0.2 } else { 0.2 };
            self.partials.push(Partial {
                osc,
                amp: base_amp * brightness.powf(ratio - 1.0) * velocity,
                env: 1.0,
                decay_coeff: (-1.0 / (tau.max(0.01) * sr)).exp(),
                pan,
            });
        }
    }

    fn level(&self) -> f64 {
        self.partials
            .iter()
            .map(|p| p.amp * p.env)
            .fold(0.0, f64::max)
    }
}

impl InstrumentSynth for Piano {
    fn note_on(&mut self, frequency: f64, velocity: f64, ctx: &DspContext) {
        self.prepare(ctx);
        let velocity = velocity.clamp(0.0, 1.0);
        self.spawn_partials(frequency.clamp(10.0, 10_000.0), velocity);
        let spec = self.model.spec();
        self.hammer_remaining = (0.002 * self.sample_rate) as usize;
        self.hammer_gain = spec.hammer * velocity;
        self.hammer_filter
            .set_cutoff(1500.0 + 6000.0 * velocity);
        self.release_coeff = 1.0;
        self.releasing = false;
        self.active = true;
    }

    fn note_off(&mut self, _ctx: &DspContext) {
        if self.active && !self.releasing {
            self.releasing = true;
            // Dampers: every partial decays on a ~150 ms tail from here.
            self.release_coeff = (-1.0 / (0.15 * self.sample_rate)).exp();
        }
    }

    fn render(&mut self, num_samples: usize, ctx: &DspContext) -> AriaResult<AudioBuffer> {
        check_rate(ctx)?;
        self.prepare(ctx);
        let mut out = stereo_buffer(num_samples, self.sample_rate);
        if !self.active {
            return Ok(out);
        }

        for i in 0..num_samples {
            let mut left = 0.0;
            let mut right = 0.0;
            for partial in self.partials.iter_mut() {
                let s = partial.osc.process() * partial.amp * partial.env;
                partial.env *= partial.decay_coeff * self.release_coeff;
                left += s * (1.0 - partial.pan).min(1.0);
                right += s * (1.0 + partial.pan).min(1.0);
            }
            if self.hammer_remaining > 0 {
                self.hammer_remaining -= 1;
                let thump = self.hammer_filter.process_sample(self.hammer_noise.white())
                    * self.hammer_gain;
                left += thump;
                right += thump;
            }
            out.channel_mut(0)[i] = left * 0.5;
            out.channel_mut(1)[i] = right * 0.5;
        }

        if self.level() < SILENCE_FLOOR {
            self.active = false;
        }
        Ok(out)
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn reset(&mut self) {
        self.partials.clear();
        self.hammer_noise.reset();
        self.hammer_filter.reset();
        self.hammer_remaining = 0;
        self.hammer_gain = 0.0;
        self.release_coeff = 1.0;
        self.releasing = false;
        self.active = false;
    }
}
