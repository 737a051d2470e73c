//! String family
//!
//! Detuned band-limited saw stacks into an envelope-swept lowpass, with
//! section vibrato. Pizzicato is the same voice with a percussive
//! envelope that releases itself once the pluck has decayed.

use aria_core::{AriaResult, AudioBuffer, DspContext, DEFAULT_SAMPLE_RATE};
use aria_dsp::biquad::BiquadTDF2;
use aria_dsp::envelope::{Adsr, AdsrStage};
use aria_dsp::oscillator::{Lfo, Oscillator, Waveform};
use aria_dsp::{MonoProcessor, Processor, ProcessorConfig};

use crate::{InstrumentSynth, check_rate, pan_gains, stereo_buffer, voice_detune, voice_pan};

/// String section model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringsModel {
    Ensemble,
    Chamber,
    SoloViolin,
    CelloSection,
    Pizzicato,
    Tremolo,
    Octave,
    Synth,
    Warm,
    Baroque,
}

struct ModelSpec {
    voices: usize,
    detune_cents: f64,
    attack: f64,
    release: f64,
    cutoff: f64,
    /// Cutoff swing as a multiple of the base while the envelope is open.
    cutoff_env: f64,
    vibrato_rate: f64,
    vibrato_depth: f64,
    /// Amplitude tremolo depth (bowed tremolo sections).
    tremolo_depth: f64,
    octave_layer: bool,
    percussive: bool,
}

impl StringsModel {
    fn spec(self) -> ModelSpec {
        let base = ModelSpec {
            voices: 5,
            detune_cents: 14.0,
            attack: 0.25,
            release: 0.6,
            cutoff: 3000.0,
            cutoff_env: 1.5,
            vibrato_rate: 5.0,
            vibrato_depth: 0.006,
            tremolo_depth: 0.0,
            octave_layer: false,
            percussive: false,
        };
        match self {
            StringsModel::Ensemble => base,
            StringsModel::Chamber => ModelSpec {
                voices: 3,
                detune_cents: 8.0,
                cutoff: 2500.0,
                ..base
            },
            StringsModel::SoloViolin => ModelSpec {
                voices: 1,
                detune_cents: 0.0,
                attack: 0.08,
                cutoff: 4000.0,
                vibrato_depth: 0.012,
                ..base
            },
            StringsModel::CelloSection => ModelSpec {
                voices: 3,
                detune_cents: 7.0,
                attack: 0.18,
                cutoff: 1500.0,
                vibrato_rate: 4.2,
                ..base
            },
            StringsModel::Pizzicato => ModelSpec {
                voices: 2,
                detune_cents: 4.0,
                attack: 0.002,
                release: 0.15,
                cutoff: 2500.0,
                cutoff_env: 2.5,
                vibrato_depth: 0.0,
                percussive: true,
                ..base
            },
            StringsModel::Tremolo => ModelSpec {
                tremolo_depth: 0.7,
                ..base
            },
            StringsModel::Octave => ModelSpec {
                voices: 4,
                octave_layer: true,
                ..base
            },
            StringsModel::Synth => ModelSpec {
                voices: 7,
                detune_cents: 22.0,
                attack: 0.4,
                release: 1.0,
                cutoff: 3500.0,
                vibrato_depth: 0.003,
                ..base
            },
            StringsModel::Warm => ModelSpec {
                voices: 5,
                cutoff: 1800.0,
                cutoff_env: 1.0,
                attack: 0.35,
                ..base
            },
            StringsModel::Baroque => ModelSpec {
                voices: 3,
                detune_cents: 10.0,
                attack: 0.12,
                cutoff: 3200.0,
                vibrato_rate: 6.0,
                vibrato_depth: 0.004,
                ..base
            },
        }
    }
}

struct UnisonVoice {
    osc: Oscillator,
    detune: f64,
    pan: f64,
    octave: bool,
}

/// Bowed/plucked string section voice
pub struct Strings {
    model: StringsModel,
    voices: Vec<UnisonVoice>,
    env: Adsr,
    filter_env: f64,
    vibrato: Lfo,
    tremolo: Lfo,
    filter_l: BiquadTDF2,
    filter_r: BiquadTDF2,
    frequency: f64,
    velocity: f64,
    tick: u64,
    sample_rate: f64,
}

impl Strings {
    pub fn new(model: StringsModel) -> Self {
        let spec = model.spec();
        let mut env = Adsr::new(DEFAULT_SAMPLE_RATE);
        env.set_adsr(spec.attack, 0.1, 0.85, spec.release);
        Self {
            model,
            voices: Vec::new(),
            env,
            filter_env: 0.0,
            vibrato: Lfo::new(DEFAULT_SAMPLE_RATE, spec.vibrato_rate, Waveform::Sine),
            tremolo: Lfo::new(DEFAULT_SAMPLE_RATE, 9.0, Waveform::Sine),
            filter_l: BiquadTDF2::new(DEFAULT_SAMPLE_RATE),
            filter_r: BiquadTDF2::new(DEFAULT_SAMPLE_RATE),
            frequency: 220.0,
            velocity: 0.0,
            tick: 0,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    fn prepare(&mut self, ctx: &DspContext) {
        if (ctx.sample_rate - self.sample_rate).abs() > 1e-9 {
            self.sample_rate = ctx.sample_rate;
            self.env.set_sample_rate(ctx.sample_rate);
            self.vibrato.set_sample_rate(ctx.sample_rate);
            self.tremolo.set_sample_rate(ctx.sample_rate);
            self.filter_l = BiquadTDF2::new(ctx.sample_rate);
            self.filter_r = BiquadTDF2::new(ctx.sample_rate);
            for voice in &mut self.voices {
                voice.osc.set_sample_rate(ctx.sample_rate);
            }
        }
    }
}

impl InstrumentSynth for Strings {
    fn note_on(&mut self, frequency: f64, velocity: f64, ctx: &DspContext) {
        self.prepare(ctx);
        let spec = self.model.spec();
        self.frequency = frequency.clamp(20.0, 8000.0);
        self.velocity = velocity.clamp(0.0, 1.0);

        let total = if spec.octave_layer {
            spec.voices * 2
        } else {
            spec.voices
        };
        self.voices = (0..total)
            .map(|v| {
                let section = v % spec.voices;
                let octave = spec.octave_layer && v >= spec.voices;
                let mut osc = Oscillator::with_waveform(self.sample_rate, Waveform::BlSaw);
                // Seeded phase spread keeps the stack from a flam onset
                // while staying deterministic.
                osc.set_phase(section as f64 * 0.37 + if octave { 0.19 } else { 0.0 });
                UnisonVoice {
                    osc,
                    detune: voice_detune(section, spec.voices, spec.detune_cents),
                    pan: voice_pan(section, spec.voices) * 0.7,
                    octave,
                }
            })
            .collect();
        self.env.trigger();
        self.filter_env = 0.0;
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
        let norm = 1.0 / (self.voices.len().max(1) as f64).sqrt();

        for i in 0..num_samples {
            let env = self.env.process();
            if spec.percussive && self.env.stage() == AdsrStage::Sustain {
                // Plucks never sustain; fall straight into the release tail.
                self.env.release();
            }
            let vib = 1.0 + self.vibrato.process() * spec.vibrato_depth;
            // Envelope-followed cutoff, refreshed on a fixed global stride
            // so block boundaries never change the output.
            if self.tick % 32 == 0 {
                self.filter_env = env;
                let cutoff = spec.cutoff * (1.0 + spec.cutoff_env * self.filter_env);
                self.filter_l.set_lowpass(cutoff.min(self.sample_rate * 0.45), 0.8);
                self.filter_r.set_lowpass(cutoff.min(self.sample_rate * 0.45), 0.8);
            }
            self.tick += 1;

            let mut left = 0.0;
            let mut right = 0.0;
            for voice in &mut self.voices {
                let octave_shift = if voice.octave { 2.0 } else { 1.0 };
                voice
                    .osc
                    .set_frequency(self.frequency * voice.detune * octave_shift * vib);
                let s = voice.osc.process() * if voice.octave { 0.5 } else { 1.0 };
                let (gl, gr) = pan_gains(voice.pan);
                left += s * gl;
                right += s * gr;
            }
            let trem = if spec.tremolo_depth > 0.0 {
                1.0 - spec.tremolo_depth * self.tremolo.process_unipolar()
            } else {
                1.0
            };
            let gain = env * self.velocity * trem * norm * 0.5;
            out.channel_mut(0)[i] = self.filter_l.process_sample(left * gain);
            out.channel_mut(1)[i] = self.filter_r.process_sample(right * gain);
        }
        Ok(out)
    }

    fn is_active(&self) -> bool {
        self.env.is_active()
    }

    fn reset(&mut self) {
        self.voices.clear();
        self.env.reset();
        self.vibrato.reset();
        self.tremolo.reset();
        self.filter_l.clear();
        self.filter_r.clear();
        self.filter_env = 0.0;
        self.tick = 0;
        self.velocity = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sustained_note_holds_level() {
        let ctx = DspContext::new(48000.0, 512);
        let mut strings = Strings::new(StringsModel::Ensemble);
        strings.note_on(220.0, 0.8, &ctx);
        strings.render(48000, &ctx).unwrap(); // past the attack
        let held = strings.render(24000, &ctx).unwrap();
        assert!(held.rms() > 0.01, "section must sustain");
        assert!(strings.is_active());
    }

    #[test]
    fn test_release_rings_out_then_stops() {
        let ctx = DspContext::new(48000.0, 512);
        let mut strings = Strings::new(StringsModel::Chamber);
        strings.note_on(330.0, 0.8, &ctx);
        strings.render(24000, &ctx).unwrap();
        strings.note_off(&ctx);
        let tail = strings.render(12000, &ctx).unwrap();
        assert!(tail.rms() > 0.001, "release must not cut hard");
        strings.render(48000, &ctx).unwrap();
        assert!(!strings.is_active());
    }

    #[test]
    fn test_pizzicato_self_terminates() {
        let ctx = DspContext::new(48000.0, 512);
        let mut pizz = Strings::new(StringsModel::Pizzicato);
        pizz.note_on(440.0, 0.9, &ctx);
        let pluck = pizz.render(4800, &ctx).unwrap();
        assert!(pluck.rms() > 0.005);
        // No note_off: the pluck must still die on its own.
        for _ in 0..10 {
            pizz.render(4800, &ctx).unwrap();
        }
        assert!(!pizz.is_active());
    }

    #[test]
    fn test_block_size_invariance() {
        let ctx = DspContext::new(48000.0, 512);
        let mut a = Strings::new(StringsModel::Synth);
        let mut b = Strings::new(StringsModel::Synth);
        a.note_on(220.0, 0.7, &ctx);
        b.note_on(220.0, 0.7, &ctx);
        let whole = a.render(512, &ctx).unwrap();
        let first = b.render(256, &ctx).unwrap();
        let second = b.render(256, &ctx).unwrap();
        for i in 0..256 {
            assert_eq!(whole.channel(1)[i], first.channel(1)[i]);
            assert_eq!(whole.channel(1)[256 + i], second.channel(1)[i]);
        }
    }

    #[test]
    fn test_all_models_render_finite() {
        let ctx = DspContext::new(48000.0, 512);
        for model in [
            StringsModel::Ensemble,
            StringsModel::Chamber,
            StringsModel::SoloViolin,
            StringsModel::CelloSection,
            StringsModel::Pizzicato,
            StringsModel::Tremolo,
            StringsModel::Octave,
            StringsModel::Synth,
            StringsModel::Warm,
            StringsModel::Baroque,
        ] {
            let mut strings = Strings::new(model);
            strings.note_on(261.63, 0.8, &ctx);
            let out = strings.render(4096, &ctx).unwrap();
            assert!(out.is_finite(), "{model:?} went non-finite");
            assert!(out.rms() > 1e-5, "{model:?} rendered silence");
        }
    }
}
