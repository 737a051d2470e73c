//! Pad family
//!
//! Wide unison stacks with slow envelopes and slow filter motion. Voices
//! are spread across the stereo field; character layers (shimmer octave,
//! choir formants, hollow notch) sit on top of the common engine.

use aria_core::{AriaResult, AudioBuffer, DspContext, DEFAULT_SAMPLE_RATE};
use aria_dsp::biquad::BiquadTDF2;
use aria_dsp::envelope::Adsr;
use aria_dsp::oscillator::{Lfo, Oscillator, Waveform};
use aria_dsp::{MonoProcessor, Processor, ProcessorConfig};

use crate::{InstrumentSynth, check_rate, pan_gains, stereo_buffer, voice_detune, voice_pan};

/// Pad model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadModel {
    Warm,
    Dark,
    Glass,
    Choir,
    Sweep,
    Ambient,
    Shimmer,
    Motion,
    Vintage,
    Hollow,
}

struct ModelSpec {
    voices: usize,
    detune_cents: f64,
    wave: Waveform,
    attack: f64,
    release: f64,
    cutoff: f64,
    lfo_rate: f64,
    /// Cutoff swing, as a fraction of the base cutoff.
    lfo_depth: f64,
    shimmer_gain: f64,
    formants: Option<&'static [(f64, f64)]>,
    notch: bool,
    pan_lfo_depth: f64,
}

// Rough "ah" vowel pair.
const CHOIR_FORMANTS: &[(f64, f64)] = &[(800.0, 4.0), (1150.0, 5.0)];

impl PadModel {
    fn spec(self) -> ModelSpec {
        let base = ModelSpec {
            voices: 5,
            detune_cents: 18.0,
            wave: Waveform::BlSaw,
            attack: 0.8,
            release: 1.5,
            cutoff: 2200.0,
            lfo_rate: 0.1,
            lfo_depth: 0.3,
            shimmer_gain: 0.0,
            formants: None,
            notch: false,
            pan_lfo_depth: 0.0,
        };
        match self {
            PadModel::Warm => base,
            PadModel::Dark => ModelSpec {
                cutoff: 900.0,
                lfo_depth: 0.2,
                attack: 1.2,
                ..base
            },
            PadModel::Glass => ModelSpec {
                wave: Waveform::Triangle,
                voices: 4,
                detune_cents: 8.0,
                cutoff: 8000.0,
                shimmer_gain: 0.35,
                attack: 0.5,
                ..base
            },
            PadModel::Choir => ModelSpec {
                voices: 4,
                detune_cents: 10.0,
                cutoff: 3500.0,
                formants: Some(CHOIR_FORMANTS),
                ..base
            },
            PadModel::Sweep => ModelSpec {
                lfo_rate: 0.08,
                lfo_depth: 1.8,
                cutoff: 1200.0,
                ..base
            },
            PadModel::Ambient => ModelSpec {
                voices: 7,
                detune_cents: 25.0,
                attack: 2.0,
                release: 3.0,
                cutoff: 1800.0,
                ..base
            },
            PadModel::Shimmer => ModelSpec {
                shimmer_gain: 0.5,
                cutoff: 3000.0,
                ..base
            },
            PadModel::Motion => ModelSpec {
                lfo_rate: 0.25,
                lfo_depth: 0.8,
                pan_lfo_depth: 0.7,
                ..base
            },
            PadModel::Vintage => ModelSpec {
                cutoff: 1500.0,
                detune_cents: 22.0,
                lfo_rate: 0.15,
                ..base
            },
            PadModel::Hollow => ModelSpec {
                wave: Waveform::BlSquare,
                cutoff: 2000.0,
                notch: true,
                ..base
            },
        }
    }
}

struct UnisonVoice {
    osc: Oscillator,
    detune: f64,
    pan: f64,
}

/// Unison pad voice
pub struct Pad {
    model: PadModel,
    voices: Vec<UnisonVoice>,
    shimmer: Oscillator,
    env: Adsr,
    filter_l: BiquadTDF2,
    filter_r: BiquadTDF2,
    formant_l: Vec<BiquadTDF2>,
    formant_r: Vec<BiquadTDF2>,
    notch_l: BiquadTDF2,
    notch_r: BiquadTDF2,
    cutoff_lfo: Lfo,
    pan_lfo: Lfo,
    frequency: f64,
    velocity: f64,
    tick: u64,
    sample_rate: f64,
}

impl Pad {
    pub fn new(model: PadModel) -> Self {
        let sr = DEFAULT_SAMPLE_RATE;
        let spec = model.spec();
        let mut env = Adsr::new(sr);
        env.set_adsr(spec.attack, 0.3, 0.9, spec.release);
        Self {
            model,
            voices: Vec::new(),
            shimmer: Oscillator::new(sr),
            env,
            filter_l: BiquadTDF2::new(sr),
            filter_r: BiquadTDF2::new(sr),
            formant_l: Vec::new(),
            formant_r: Vec::new(),
            notch_l: BiquadTDF2::new(sr),
            notch_r: BiquadTDF2::new(sr),
            cutoff_lfo: Lfo::new(sr, spec.lfo_rate, Waveform::Sine),
            pan_lfo: Lfo::new(sr, spec.lfo_rate * 0.7, Waveform::Sine),
            frequency: 220.0,
            velocity: 0.0,
            tick: 0,
            sample_rate: sr,
        }
    }

    fn prepare(&mut self, ctx: &DspContext) {
        if (ctx.sample_rate - self.sample_rate).abs() > 1e-9 {
            self.sample_rate = ctx.sample_rate;
            self.env.set_sample_rate(ctx.sample_rate);
            self.shimmer.set_sample_rate(ctx.sample_rate);
            self.cutoff_lfo.set_sample_rate(ctx.sample_rate);
            self.pan_lfo.set_sample_rate(ctx.sample_rate);
            self.filter_l = BiquadTDF2::new(ctx.sample_rate);
            self.filter_r = BiquadTDF2::new(ctx.sample_rate);
            self.notch_l = BiquadTDF2::new(ctx.sample_rate);
            self.notch_r = BiquadTDF2::new(ctx.sample_rate);
            self.formant_l.clear();
            self.formant_r.clear();
            for voice in &mut self.voices {
                voice.osc.set_sample_rate(ctx.sample_rate);
            }
        }
    }
}

impl InstrumentSynth for Pad {
    fn note_on(&mut self, frequency: f64, velocity: f64, ctx: &DspContext) {
        self.prepare(ctx);
        let spec = self.model.spec();
        self.frequency = frequency.clamp(20.0, 4000.0);
        self.velocity = velocity.clamp(0.0, 1.0);

        self.voices = (0..spec.voices)
            .map(|v| {
                let mut osc = Oscillator::with_waveform(self.sample_rate, spec.wave);
                osc.set_phase(v as f64 * 0.41);
                UnisonVoice {
                    osc,
                    detune: voice_detune(v, spec.voices, spec.detune_cents),
                    pan: voice_pan(v, spec.voices) * 0.85,
                }
            })
            .collect();
        self.shimmer.set_frequency(self.frequency * 2.0);
        self.shimmer.reset();

        if let Some(formants) = spec.formants {
            let build = |sr: f64| -> Vec<BiquadTDF2> {
                formants
                    .iter()
                    .map(|&(freq, q)| {
                        let mut bq = BiquadTDF2::new(sr);
                        bq.set_bandpass(freq, q);
                        bq
                    })
                    .collect()
            };
            self.formant_l = build(self.sample_rate);
            self.formant_r = build(self.sample_rate);
        }
        if spec.notch {
            self.notch_l.set_notch(self.frequency * 3.0, 2.0);
            self.notch_r.set_notch(self.frequency * 3.0, 2.0);
        }
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
        let norm = 1.0 / (spec.voices as f64).sqrt();

        for i in 0..num_samples {
            let env = self.env.process();
            let sweep = self.cutoff_lfo.process();
            let pan_offset = self.pan_lfo.process() * spec.pan_lfo_depth;
            if self.tick % 32 == 0 {
                let cutoff = (spec.cutoff * (1.0 + spec.lfo_depth * sweep))
                    .clamp(100.0, self.sample_rate * 0.45);
                self.filter_l.set_lowpass(cutoff, 0.8);
                self.filter_r.set_lowpass(cutoff, 0.8);
            }
            self.tick += 1;

            let mut left = 0.0;
            let mut right = 0.0;
            for voice in &mut self.voices {
                voice.osc.set_frequency(self.frequency * voice.detune);
                let s = voice.osc.process();
                let (gl, gr) = pan_gains((voice.pan + pan_offset).clamp(-1.0, 1.0));
                left += s * gl;
                right += s * gr;
            }
            if spec.shimmer_gain > 0.0 {
                let sparkle = self.shimmer.process() * spec.shimmer_gain;
                left += sparkle;
                right += sparkle;
            }
            let gain = env * self.velocity * norm * 0.4;
            let mut l = self.filter_l.process_sample(left * gain);
            let mut r = self.filter_r.process_sample(right * gain);
            for (fl, fr) in self.formant_l.iter_mut().zip(self.formant_r.iter_mut()) {
                // Formant bands blended on top of the filtered bed.
                l = l * 0.5 + fl.process_sample(l) * 1.5;
                r = r * 0.5 + fr.process_sample(r) * 1.5;
            }
            if spec.notch {
                l = self.notch_l.process_sample(l);
                r = self.notch_r.process_sample(r);
            }
            out.channel_mut(0)[i] = l;
            out.channel_mut(1)[i] = r;
        }
        Ok(out)
    }

    fn is_active(&self) -> bool {
        self.env.is_active()
    }

    fn reset(&mut self) {
        self.voices.clear();
        self.shimmer.reset();
        self.env.reset();
        self.filter_l.clear();
        self.filter_r.clear();
        for bq in self.formant_l.iter_mut().chain(self.formant_r.iter_mut()) {
            bq.clear();
        }
        self.notch_l.clear();
        self.notch_r.clear();
        self.cutoff_lfo.reset();
        self.pan_lfo.reset();
        self.tick = 0;
        self.velocity = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slow_attack_swells() {
        let ctx = DspContext::new(48000.0, 512);
        let mut pad = Pad::new(PadModel::Warm);
        pad.note_on(220.0, 0.8, &ctx);
        let early = pad.render(4800, &ctx).unwrap(); // first 100 ms of a 800 ms attack
        let later = pad.render(43200, &ctx).unwrap();
        let late_rms = {
            let tail = &later.channel(0)[38400..];
            (tail.iter().map(|s| s * s).sum::<f64>() / tail.len() as f64).sqrt()
        };
        assert!(early.rms() < late_rms * 0.5, "attack must swell slowly");
    }

    #[test]
    fn test_stereo_spread_decorrelates_channels() {
        let ctx = DspContext::new(48000.0, 512);
        let mut pad = Pad::new(PadModel::Ambient);
        pad.note_on(220.0, 0.8, &ctx);
        pad.render(48000, &ctx).unwrap();
        let out = pad.render(24000, &ctx).unwrap();
        let (mut dot, mut el, mut er) = (0.0, 0.0, 0.0);
        for i in 0..out.len() {
            let (l, r) = (out.channel(0)[i], out.channel(1)[i]);
            dot += l * r;
            el += l * l;
            er += r * r;
        }
        let correlation = dot / (el * er).sqrt().max(1e-12);
        assert!(correlation < 0.9, "channels too similar: {correlation}");
    }

    #[test]
    fn test_release_tail_is_long() {
        let ctx = DspContext::new(48000.0, 512);
        let mut pad = Pad::new(PadModel::Warm);
        pad.note_on(220.0, 0.8, &ctx);
        pad.render(96000, &ctx).unwrap();
        pad.note_off(&ctx);
        // 1.5 s release: still audible after 0.5 s.
        pad.render(24000, &ctx).unwrap();
        let tail = pad.render(4800, &ctx).unwrap();
        assert!(tail.rms() > 0.001);
        assert!(pad.is_active());
        pad.render(96000, &ctx).unwrap();
        assert!(!pad.is_active());
    }

    #[test]
    fn test_all_models_render_finite() {
        let ctx = DspContext::new(48000.0, 512);
        for model in [
            PadModel::Warm,
            PadModel::Dark,
            PadModel::Glass,
            PadModel::Choir,
            PadModel::Sweep,
            PadModel::Ambient,
            PadModel::Shimmer,
            PadModel::Motion,
            PadModel::Vintage,
            PadModel::Hollow,
        ] {
            let mut pad = Pad::new(model);
            pad.note_on(220.0, 0.8, &ctx);
            let out = pad.render(8192, &ctx).unwrap();
            assert!(out.is_finite(), "{model:?} went non-finite");
            assert!(out.rms() > 1e-6, "{model:?} rendered silence");
        }
    }
}
