//! Plucked strings and struck mallets
//!
//! The guitar-like models run a plucked-string loop: a short noise
//! burst circulates in a fractional delay with a damping filter in the
//! feedback path, so the tone starts bright and decays into a dark
//! fundamental. The mallet models are additive, a handful of exponential
//! partials at bar-mode ratios with a click of attack noise.

use aria_core::{AriaResult, AudioBuffer, DspContext, DEFAULT_SAMPLE_RATE};
use aria_dsp::delay_line::DelayLine;
use aria_dsp::noise::NoiseSource;
use aria_dsp::onepole::OnePole;
use aria_dsp::oscillator::{Lfo, Waveform};
use aria_dsp::{MonoProcessor, Processor, ProcessorConfig};

use crate::{InstrumentSynth, SILENCE_FLOOR, check_rate, stereo_buffer};

/// Plucked or struck model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluckedModel {
    String,
    NylonGuitar,
    SteelGuitar,
    Harp,
    Kalimba,
    MusicBox,
    Marimba,
    Vibraphone,
    SteelDrum,
    Celesta,
}

// Transverse bar modes, roughly free-bar ratios. Marimba bars are
// tuned so the first overtone lands on the double octave.
const BAR_MODES: &[(f64, f64)] = &[(1.0, 1.0), (3.98, 0.4), (9.1, 0.15), (16.3, 0.05)];
const MARIMBA_MODES: &[(f64, f64)] = &[(1.0, 1.0), (4.0, 0.35), (9.2, 0.08)];
const KALIMBA_MODES: &[(f64, f64)] = &[(1.0, 1.0), (5.4, 0.25), (8.9, 0.1)];
const MUSIC_BOX_MODES: &[(f64, f64)] = &[(1.0, 1.0), (3.4, 0.5), (7.2, 0.2), (12.4, 0.08)];
const STEEL_DRUM_MODES: &[(f64, f64)] = &[
    (1.0, 1.0),
    (2.0, 0.7),
    (3.01, 0.45),
    (4.2, 0.25),
    (5.5, 0.12),
];
const CELESTA_MODES: &[(f64, f64)] = &[(1.0, 1.0), (4.1, 0.2), (9.6, 0.04)];

enum Engine {
    Plucked {
        /// Loss per trip round the loop.
        feedback: f64,
        /// Damping cutoff as a multiple of the fundamental.
        brightness: f64,
        burst_seconds: f64,
        decay_stretch: f64,
    },
    Struck {
        modes: &'static [(f64, f64)],
        decay: f64,
        click: f64,
        tremolo_rate: f64,
    },
}

impl PluckedModel {
    fn engine(self) -> Engine {
        match self {
            PluckedModel::String => Engine::Plucked {
                feedback: 0.996,
                brightness: 14.0,
                burst_seconds: 0.003,
                decay_stretch: 1.0,
            },
            PluckedModel::NylonGuitar => Engine::Plucked {
                feedback: 0.994,
                brightness: 8.0,
                burst_seconds: 0.004,
                decay_stretch: 1.0,
            },
            PluckedModel::SteelGuitar => Engine::Plucked {
                feedback: 0.997,
                brightness: 22.0,
                burst_seconds: 0.002,
                decay_stretch: 1.2,
            },
            PluckedModel::Harp => Engine::Plucked {
                feedback: 0.998,
                brightness: 12.0,
                burst_seconds: 0.005,
                decay_stretch: 1.5,
            },
            PluckedModel::Kalimba => Engine::Struck {
                modes: KALIMBA_MODES,
                decay: 0.8,
                click: 0.4,
                tremolo_rate: 0.0,
            },
            PluckedModel::MusicBox => Engine::Struck {
                modes: MUSIC_BOX_MODES,
                decay: 1.6,
                click: 0.15,
                tremolo_rate: 0.0,
            },
            PluckedModel::Marimba => Engine::Struck {
                modes: MARIMBA_MODES,
                decay: 0.2,
                click: 0.5,
                tremolo_rate: 0.0,
            },
            PluckedModel::Vibraphone => Engine::Struck {
                modes: BAR_MODES,
                decay: 3.0,
                click: 0.2,
                tremolo_rate: 4.5,
            },
            PluckedModel::SteelDrum => Engine::Struck {
                modes: STEEL_DRUM_MODES,
                decay: 1.2,
                click: 0.3,
                tremolo_rate: 0.0,
            },
            PluckedModel::Celesta => Engine::Struck {
                modes: CELESTA_MODES,
                decay: 1.4,
                click: 0.25,
                tremolo_rate: 0.0,
            },
        }
    }
}

struct Partial {
    phase: f64,
    step: f64,
    amp: f64,
    env: f64,
    decay_coeff: f64,
}

/// Plucked-string / struck-mallet voice
pub struct PluckedSynth {
    model: PluckedModel,
    // String engine state
    loop_line: DelayLine,
    damper: OnePole,
    period: f64,
    feedback: f64,
    burst_left: usize,
    // Mallet engine state
    partials: Vec<Partial>,
    click_env: f64,
    click_coeff: f64,
    click_gain: f64,
    tremolo: Lfo,
    noise: NoiseSource,
    release_coeff: f64,
    level: f64,
    velocity: f64,
    active: bool,
    sample_rate: f64,
}

impl PluckedSynth {
    pub fn new(model: PluckedModel) -> Self {
        let sr = DEFAULT_SAMPLE_RATE;
        Self {
            model,
            loop_line: DelayLine::with_max_time(sr, 0.1),
            damper: OnePole::lowpass(sr, 4000.0),
            period: 100.0,
            feedback: 0.0,
            burst_left: 0,
            partials: Vec::new(),
            click_env: 0.0,
            click_coeff: 0.0,
            click_gain: 0.0,
            tremolo: Lfo::new(sr, 4.5, Waveform::Sine),
            noise: NoiseSource::new(0x706c),
            release_coeff: 1.0,
            level: 0.0,
            velocity: 0.0,
            active: false,
            sample_rate: sr,
        }
    }

    fn prepare(&mut self, ctx: &DspContext) {
        if (ctx.sample_rate - self.sample_rate).abs() > 1e-9 {
            self.sample_rate = ctx.sample_rate;
            self.loop_line = DelayLine::with_max_time(ctx.sample_rate, 0.1);
            self.tremolo.set_sample_rate(ctx.sample_rate);
            self.active = false;
        }
    }
}

impl InstrumentSynth for PluckedSynth {
    fn note_on(&mut self, frequency: f64, velocity: f64, ctx: &DspContext) {
        self.prepare(ctx);
        let frequency = frequency.clamp(25.0, 4000.0);
        self.velocity = velocity.clamp(0.0, 1.0);
        self.noise.reset();
        self.release_coeff = 1.0;
        self.level = 1.0;
        self.active = true;

        match self.model.engine() {
            Engine::Plucked {
                feedback,
                brightness,
                burst_seconds,
                decay_stretch,
            } => {
                self.period = self.sample_rate / frequency;
                // Higher notes lose energy faster; stretch compensates.
                let trips = frequency * decay_stretch;
                self.feedback = feedback.powf((trips / 440.0).max(0.3));
                let cutoff =
                    (frequency * brightness * (0.5 + self.velocity)).min(self.sample_rate * 0.45);
                self.damper = OnePole::lowpass(self.sample_rate, cutoff);
                self.loop_line.clear();
                self.burst_left = ((burst_seconds * self.sample_rate) as usize).max(8);
            }
            Engine::Struck {
                modes,
                decay,
                click,
                tremolo_rate,
            } => {
                self.partials = modes
                    .iter()
                    .filter(|&&(ratio, _)| frequency * ratio < self.sample_rate * 0.45)
                    .enumerate()
                    .map(|(k, &(ratio, amp))| {
                        // Upper modes die off quicker than the fundamental.
                        let tau = decay / (1.0 + k as f64 * 1.5);
                        Partial {
                            phase: 0.0,
                            step: frequency * ratio / self.sample_rate,
                            amp: amp * self.velocity,
                            env: 1.0,
                            decay_coeff: (-1.0 / (tau * self.sample_rate)).exp(),
                        }
                    })
                    .collect();
                self.click_env = 1.0;
                self.click_coeff = (-1.0 / (0.002 * self.sample_rate)).exp();
                self.click_gain = click * self.velocity;
                if tremolo_rate > 0.0 {
                    self.tremolo = Lfo::new(self.sample_rate, tremolo_rate, Waveform::Sine);
                }
            }
        }
    }

    fn note_off(&mut self, _ctx: &DspContext) {
        // Both engines ring freely; note-off just damps the tail.
        self.release_coeff = (-1.0 / (0.1 * self.sample_rate)).exp();
    }

    fn render(&mut self, num_samples: usize, ctx: &DspContext) -> AriaResult<AudioBuffer> {
        check_rate(ctx)?;
        self.prepare(ctx);
        let mut out = stereo_buffer(num_samples, self.sample_rate);
        if !self.active {
            return Ok(out);
        }
        let tremolo_depth = match self.model.engine() {
            Engine::Struck { tremolo_rate, .. } if tremolo_rate > 0.0 => 0.4,
            _ => 0.0,
        };
        let plucked = matches!(self.model.engine(), Engine::Plucked { .. });

        for i in 0..num_samples {
            let mut s;
            if plucked {
                let excite = if self.burst_left > 0 {
                    self.burst_left -= 1;
                    self.noise.white() * self.velocity
                } else {
                    0.0
                };
                let recirculated = self.loop_line.read_interpolated(self.period - 1.0);
                let fed = self.damper.process_sample(recirculated) * self.feedback;
                self.loop_line.write(excite + fed);
                s = (excite + fed) * 0.8;
            } else {
                s = 0.0;
                let mut peak = 0.0f64;
                for p in &mut self.partials {
                    s += (std::f64::consts::TAU * p.phase).sin() * p.amp * p.env;
                    p.phase = (p.phase + p.step).rem_euclid(1.0);
                    p.env *= p.decay_coeff * self.release_coeff;
                    peak = peak.max(p.amp * p.env);
                }
                if self.click_env > SILENCE_FLOOR {
                    s += self.noise.white() * self.click_gain * self.click_env;
                    self.click_env *= self.click_coeff;
                }
                if tremolo_depth > 0.0 {
                    s *= 1.0 - tremolo_depth * self.tremolo.process_unipolar();
                }
                s *= 0.5;
                if peak < SILENCE_FLOOR {
                    self.active = false;
                }
            }
            if plucked {
                self.level *= self.release_coeff;
                s *= self.level;
                if self.level < SILENCE_FLOOR {
                    self.active = false;
                }
            }
            out.channel_mut(0)[i] = s;
            out.channel_mut(1)[i] = s;
        }

        // A free-ringing string eventually falls below audibility even
        // without note-off; poll the loop energy at block rate.
        if plucked && self.active && self.burst_left == 0 {
            let rms = out.rms();
            if rms < SILENCE_FLOOR * 0.5 {
                self.active = false;
            }
        }
        Ok(out)
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn reset(&mut self) {
        self.loop_line.clear();
        self.damper.reset();
        self.partials.clear();
        self.tremolo.reset();
        self.noise.reset();
        self.burst_left = 0;
        self.click_env = 0.0;
        self.release_coeff = 1.0;
        self.level = 0.0;
        self.velocity = 0.0;
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pluck_decays_and_terminates() {
        let ctx = DspContext::new(48000.0, 512);
        let mut synth = PluckedSynth::new(PluckedModel::NylonGuitar);
        synth.note_on(330.0, 0.9, &ctx);
        let attack = synth.render(4800, &ctx).unwrap();
        assert!(attack.rms() > 0.01);
        synth.note_off(&ctx);
        let mut blocks = 0;
        while synth.is_active() && blocks < 100 {
            synth.render(4800, &ctx).unwrap();
            blocks += 1;
        }
        assert!(!synth.is_active(), "string never damped out");
    }

    #[test]
    fn test_string_pitch_matches_note() {
        let ctx = DspContext::new(48000.0, 512);
        let mut synth = PluckedSynth::new(PluckedModel::String);
        synth.note_on(220.0, 0.9, &ctx);
        synth.render(9600, &ctx).unwrap();
        let out = synth.render(48000, &ctx).unwrap();
        let ch = out.channel(0);
        let crossings = ch.windows(2).filter(|w| w[0] <= 0.0 && w[1] > 0.0).count();
        // One positive crossing per period once the loop settles.
        assert!((190..=260).contains(&crossings), "{crossings} crossings");
    }

    #[test]
    fn test_pluck_darkens_as_it_rings() {
        let ctx = DspContext::new(48000.0, 512);
        let mut synth = PluckedSynth::new(PluckedModel::SteelGuitar);
        synth.note_on(196.0, 1.0, &ctx);
        let out = synth.render(96000, &ctx).unwrap();
        let ch = out.channel(0);
        let roughness = |w: &[f64]| {
            let mut d = 0.0;
            for k in 1..w.len() {
                d += (w[k] - w[k - 1]).powi(2);
            }
            d / w.iter().map(|s| s * s).sum::<f64>().max(1e-12)
        };
        let early = roughness(&ch[2400..7200]);
        let late = roughness(&ch[76800..81600]);
        assert!(early > late, "early {early} late {late}");
    }

    #[test]
    fn test_marimba_is_short_and_vibraphone_rings() {
        let ctx = DspContext::new(48000.0, 512);
        let mut marimba = PluckedSynth::new(PluckedModel::Marimba);
        let mut vibes = PluckedSynth::new(PluckedModel::Vibraphone);
        marimba.note_on(440.0, 0.9, &ctx);
        vibes.note_on(440.0, 0.9, &ctx);
        // Two seconds in, the marimba is done and the vibraphone is not.
        for _ in 0..20 {
            marimba.render(4800, &ctx).unwrap();
            vibes.render(4800, &ctx).unwrap();
        }
        assert!(!marimba.is_active());
        assert!(vibes.is_active());
    }

    #[test]
    fn test_retrigger_is_deterministic() {
        let ctx = DspContext::new(48000.0, 512);
        let mut synth = PluckedSynth::new(PluckedModel::Harp);
        synth.note_on(261.6, 0.8, &ctx);
        let first = synth.render(2048, &ctx).unwrap();
        synth.reset();
        synth.note_on(261.6, 0.8, &ctx);
        let second = synth.render(2048, &ctx).unwrap();
        for (a, b) in first.channel(0).iter().zip(second.channel(0)) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_all_models_render_finite() {
        let ctx = DspContext::new(48000.0, 512);
        for model in [
            PluckedModel::String,
            PluckedModel::NylonGuitar,
            PluckedModel::SteelGuitar,
            PluckedModel::Harp,
            PluckedModel::Kalimba,
            PluckedModel::MusicBox,
            PluckedModel::Marimba,
            PluckedModel::Vibraphone,
            PluckedModel::SteelDrum,
            PluckedModel::Celesta,
        ] {
            let mut synth = PluckedSynth::new(model);
            synth.note_on(330.0, 0.8, &ctx);
            let out = synth.render(4096, &ctx).unwrap();
            assert!(out.is_finite(), "{model:?} went non-finite");
            assert!(out.rms() > 1e-5, "{model:?} rendered silence");
        }
    }
}
