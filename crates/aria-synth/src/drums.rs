//! Drum family
//!
//! One-shot percussion voices. The note frequency picks the voice: kicks
//! below 90 Hz, snares below 200, toms below 400, closed hats below 1500,
//! cymbals above. Kicks are pitched sine drops, snares mix body tones with
//! band-passed noise, hats and cymbals are filtered noise bursts. The kit
//! sets tuning, decay scaling, and the lo-fi/drive character on top.

use aria_core::{AriaResult, AudioBuffer, DspContext, DEFAULT_SAMPLE_RATE};
use aria_dsp::biquad::BiquadTDF2;
use aria_dsp::noise::NoiseSource;
use aria_dsp::oscillator::Oscillator;
use aria_dsp::{MonoProcessor, Processor, ProcessorConfig};

use crate::{InstrumentSynth, SILENCE_FLOOR, check_rate, stereo_buffer};

/// Drum kit character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrumKit {
    Acoustic,
    Room,
    Brush,
    LoFi,
    Machine808,
    Machine909,
    Trap,
    Industrial,
    Percussion,
    Vinyl,
}

struct KitSpec {
    tune: f64,
    decay: f64,
    noise_mix: f64,
    drive: f64,
    crush_bits: Option<u32>,
    tone_cutoff: f64,
}

impl DrumKit {
    fn spec(self) -> KitSpec {
        let base = KitSpec {
            tune: 1.0,
            decay: 1.0,
            noise_mix: 1.0,
            drive: 0.0,
            crush_bits: None,
            tone_cutoff: 16000.0,
        };
        match self {
            DrumKit::Acoustic => base,
            DrumKit::Room => KitSpec {
                decay: 1.6,
                noise_mix: 1.3,
                ..base
            },
            DrumKit::Brush => KitSpec {
                noise_mix: 2.2,
                decay: 0.8,
                tone_cutoff: 9000.0,
                ..base
            },
            DrumKit::LoFi => KitSpec {
                crush_bits: Some(6),
                tone_cutoff: 6000.0,
                ..base
            },
            DrumKit::Machine808 => KitSpec {
                tune: 0.95,
                decay: 2.2,
                noise_mix: 0.8,
                ..base
            },
            DrumKit::Machine909 => KitSpec {
                decay: 1.1,
                noise_mix: 1.1,
                drive: 1.5,
                ..base
            },
            DrumKit::Trap => KitSpec {
                tune: 0.9,
                decay: 2.6,
                noise_mix: 1.2,
                ..base
            },
            DrumKit::Industrial => KitSpec {
                drive: 4.0,
                decay: 1.3,
                noise_mix: 1.5,
                ..base
            },
            DrumKit::Percussion => KitSpec {
                tune: 1.2,
                decay: 0.7,
                noise_mix: 0.5,
                ..base
            },
            DrumKit::Vinyl => KitSpec {
                crush_bits: Some(8),
                tone_cutoff: 7500.0,
                decay: 0.9,
                ..base
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VoiceKind {
    Kick,
    Snare,
    Tom,
    ClosedHat,
    Cymbal,
}

impl VoiceKind {
    fn from_frequency(freq: f64) -> Self {
        if freq < 90.0 {
            VoiceKind::Kick
        } else if freq < 200.0 {
            VoiceKind::Snare
        } else if freq < 400.0 {
            VoiceKind::Tom
        } else if freq < 1500.0 {
            VoiceKind::ClosedHat
        } else {
            VoiceKind::Cymbal
        }
    }
}

/// One-shot drum voice
pub struct Drums {
    kit: DrumKit,
    kind: VoiceKind,
    body: Oscillator,
    overtone: Oscillator,
    noise: NoiseSource,
    noise_filter: BiquadTDF2,
    tone_filter: BiquadTDF2,
    pitch: f64,
    pitch_drop: f64,
    pitch_env: f64,
    pitch_coeff: f64,
    amp_env: f64,
    amp_coeff: f64,
    noise_env: f64,
    noise_coeff: f64,
    noise_gain: f64,
    body_gain: f64,
    click_remaining: usize,
    crush_held: f64,
    crush_phase: u32,
    velocity: f64,
    active: bool,
    sample_rate: f64,
}

impl Drums {
    pub fn new(kit: DrumKit) -> Self {
        let sr = DEFAULT_SAMPLE_RATE;
        Self {
            kit,
            kind: VoiceKind::Kick,
            body: Oscillator::new(sr),
            overtone: Oscillator::new(sr),
            noise: NoiseSource::new(0xd00d),
            noise_filter: BiquadTDF2::new(sr),
            tone_filter: BiquadTDF2::new(sr),
            pitch: 55.0,
            pitch_drop: 0.0,
            pitch_env: 0.0,
            pitch_coeff: 0.0,
            amp_env: 0.0,
            amp_coeff: 0.0,
            noise_env: 0.0,
            noise_coeff: 0.0,
            noise_gain: 0.0,
            body_gain: 1.0,
            click_remaining: 0,
            crush_held: 0.0,
            crush_phase: 0,
            velocity: 0.0,
            active: false,
            sample_rate: sr,
        }
    }

    fn prepare(&mut self, ctx: &DspContext) {
        if (ctx.sample_rate - self.sample_rate).abs() > 1e-9 {
            self.sample_rate = ctx.sample_rate;
            self.body.set_sample_rate(ctx.sample_rate);
            self.overtone.set_sample_rate(ctx.sample_rate);
            self.noise_filter = BiquadTDF2::new(ctx.sample_rate);
            self.tone_filter = BiquadTDF2::new(ctx.sample_rate);
        }
    }

    fn coeff(&self, seconds: f64) -> f64 {
        (-1.0 / (seconds.max(0.005) * self.sample_rate)).exp()
    }
}

impl InstrumentSynth for Drums {
    fn note_on(&mut self, frequency: f64, velocity: f64, ctx: &DspContext) {
        self.prepare(ctx);
        let spec = self.kit.spec();
        self.kind = VoiceKind::from_frequency(frequency);
        self.velocity = velocity.clamp(0.0, 1.0);
        self.pitch = frequency.max(30.0) * spec.tune;
        self.body.reset();
        self.overtone.reset();
        self.noise.reset();
        self.tone_filter
            .set_lowpass(spec.tone_cutoff.min(self.sample_rate * 0.45), 0.707);
        self.tone_filter.clear();
        self.noise_filter.clear();
        self.amp_env = 1.0;
        self.noise_env = 1.0;
        self.pitch_env = 1.0;
        self.click_remaining = 0;
        self.crush_held = 0.0;
        self.crush_phase = 0;

        match self.kind {
            VoiceKind::Kick => {
                self.pitch_drop = 1.8;
                self.pitch_coeff = self.coeff(0.03);
                self.amp_coeff = self.coeff(0.25 * spec.decay);
                self.noise_coeff = self.coeff(0.01);
                self.noise_gain = 0.4 * spec.noise_mix;
                self.body_gain = 1.0;
                self.noise_filter.set_highpass(2000.0, 0.707);
                self.click_remaining = (0.001 * self.sample_rate) as usize;
            }
            VoiceKind::Snare => {
                self.pitch_drop = 0.3;
                self.pitch_coeff = self.coeff(0.02);
                self.amp_coeff = self.coeff(0.1 * spec.decay);
                self.noise_coeff = self.coeff(0.15 * spec.decay);
                self.noise_gain = 0.7 * spec.noise_mix;
                self.body_gain = 0.6;
                self.overtone.set_frequency(self.pitch * 1.83);
                self.noise_filter.set_bandpass(1800.0, 0.7);
            }
            VoiceKind::Tom => {
                self.pitch_drop = 0.5;
                self.pitch_coeff = self.coeff(0.05);
                self.amp_coeff = self.coeff(0.3 * spec.decay);
                self.noise_coeff = self.coeff(0.02);
                self.noise_gain = 0.15 * spec.noise_mix;
                self.body_gain = 0.9;
                self.noise_filter.set_bandpass(2500.0, 1.0);
            }
            VoiceKind::ClosedHat => {
                self.pitch_drop = 0.0;
                self.pitch_coeff = 1.0;
                self.amp_coeff = self.coeff(0.05 * spec.decay);
                self.noise_coeff = self.amp_coeff;
                self.noise_gain = 0.8 * spec.noise_mix;
                self.body_gain = 0.0;
                self.noise_filter.set_highpass(6000.0, 0.707);
            }
            VoiceKind::Cymbal => {
                self.pitch_drop = 0.0;
                self.pitch_coeff = 1.0;
                self.amp_coeff = self.coeff(0.9 * spec.decay);
                self.noise_coeff = self.amp_coeff;
                self.noise_gain = 0.7 * spec.noise_mix;
                self.body_gain = 0.0;
                self.noise_filter.set_highpass(8000.0, 0.707);
            }
        }
        self.active = true;
    }

    fn note_off(&mut self, _ctx: &DspContext) {
        // One-shots ignore releases; they ring out on their own.
    }

    fn render(&mut self, num_samples: usize, ctx: &DspContext) -> AriaResult<AudioBuffer> {
        check_rate(ctx)?;
        self.prepare(ctx);
        let spec = self.kit.spec();
        let mut out = stereo_buffer(num_samples, self.sample_rate);
        if !self.active {
            return Ok(out);
        }

        for i in 0..num_samples {
            let freq = self.pitch * (1.0 + self.pitch_drop * self.pitch_env);
            self.body.set_frequency(freq);
            let mut s = self.body.process() * self.body_gain * self.amp_env;
            if self.kind == VoiceKind::Snare {
                s += self.overtone.process() * 0.3 * self.amp_env;
            }
            let hiss = self.noise_filter.process_sample(self.noise.white());
            s += hiss * self.noise_gain * self.noise_env;
            if self.click_remaining > 0 {
                self.click_remaining -= 1;
                s += self.noise.white() * 0.5;
            }
            s *= self.velocity;

            if spec.drive > 0.0 {
                s = (s * spec.drive).tanh() / spec.drive.tanh();
            }
            if let Some(bits) = spec.crush_bits {
                if self.crush_phase == 0 {
                    let levels = (1u32 << (bits - 1)) as f64;
                    self.crush_held = (s * levels).round() / levels;
                }
                self.crush_phase = (self.crush_phase + 1) % 2;
                s = self.crush_held;
            }
            s = self.tone_filter.process_sample(s);

            self.amp_env *= self.amp_coeff;
            self.noise_env *= self.noise_coeff;
            self.pitch_env *= self.pitch_coeff;

            out.channel_mut(0)[i] = s;
            out.channel_mut(1)[i] = s;
        }

        if self.amp_env.max(self.noise_env) * self.velocity < SILENCE_FLOOR {
            self.active = false;
        }
        Ok(out)
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn reset(&mut self) {
        self.body.reset();
        self.overtone.reset();
        self.noise.reset();
        self.noise_filter.clear();
        self.tone_filter.clear();
        self.amp_env = 0.0;
        self.noise_env = 0.0;
        self.pitch_env = 0.0;
        self.click_remaining = 0;
        self.crush_held = 0.0;
        self.crush_phase = 0;
        self.velocity = 0.0;
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_hit(kit: DrumKit, freq: f64, samples: usize) -> AudioBuffer {
        let ctx = DspContext::new(48000.0, 512);
        let mut drums = Drums::new(kit);
        drums.note_on(freq, 0.9, &ctx);
        drums.render(samples, &ctx).unwrap()
    }

    /// Crude spectral centroid via zero crossings per second.
    fn zero_cross_rate(buf: &AudioBuffer) -> f64 {
        let ch = buf.channel(0);
        let crossings = ch.windows(2).filter(|w| w[0].signum() != w[1].signum()).count();
        crossings as f64 * 48000.0 / ch.len() as f64
    }

    #[test]
    fn test_frequency_buckets_select_voices() {
        let kick = render_hit(DrumKit::Acoustic, 50.0, 9600);
        let hat = render_hit(DrumKit::Acoustic, 800.0, 9600);
        // A kick centers far below a hat (the click burst adds a few
        // high-rate crossings up front).
        assert!(zero_cross_rate(&kick) < 1500.0);
        assert!(zero_cross_rate(&hat) > 4000.0);
    }

    #[test]
    fn test_hits_decay_to_silence() {
        let ctx = DspContext::new(48000.0, 512);
        let mut drums = Drums::new(DrumKit::Machine909);
        drums.note_on(50.0, 1.0, &ctx);
        assert!(drums.is_active());
        for _ in 0..30 {
            drums.render(4800, &ctx).unwrap();
        }
        assert!(!drums.is_active(), "one-shot must self-terminate");
    }

    #[test]
    fn test_trap_kick_rings_longer_than_acoustic() {
        let acoustic = render_hit(DrumKit::Acoustic, 50.0, 48000);
        let trap = render_hit(DrumKit::Trap, 50.0, 48000);
        let tail = |buf: &AudioBuffer| -> f64 {
            buf.channel(0)[24000..].iter().map(|s| s * s).sum()
        };
        assert!(tail(&trap) > tail(&acoustic) * 3.0);
    }

    #[test]
    fn test_reset_then_retrigger_is_deterministic() {
        let ctx = DspContext::new(48000.0, 512);
        let mut drums = Drums::new(DrumKit::Brush);
        drums.note_on(120.0, 0.8, &ctx);
        let first = drums.render(2048, &ctx).unwrap();
        drums.reset();
        drums.note_on(120.0, 0.8, &ctx);
        let second = drums.render(2048, &ctx).unwrap();
        for i in 0..2048 {
            assert_eq!(first.channel(0)[i], second.channel(0)[i]);
        }
    }

    #[test]
    fn test_all_kits_render_finite() {
        for kit in [
            DrumKit::Acoustic,
            DrumKit::Room,
            DrumKit::Brush,
            DrumKit::LoFi,
            DrumKit::Machine808,
            DrumKit::Machine909,
            DrumKit::Trap,
            DrumKit::Industrial,
            DrumKit::Percussion,
            DrumKit::Vinyl,
        ] {
            for freq in [50.0, 150.0, 300.0, 800.0, 3000.0] {
                let out = render_hit(kit, freq, 4096);
                assert!(out.is_finite(), "{kit:?}@{freq} went non-finite");
                assert!(out.peak() > 0.0, "{kit:?}@{freq} rendered silence");
            }
        }
    }
}
