//! Echo delays
//!
//! One engine, ten characters: plain stereo and ping-pong feedback lines,
//! tape/analog echoes with modulated reads and loop saturation, slapback,
//! dub, multi-tap, reversed-grain, tempo-synced dotted-eighth, and a
//! chorus-ish modulated line. Feedback paths carry the usual high/low
//! shaping so repeats darken the way hardware does.

use aria_core::{AriaResult, AudioBuffer, DspContext, ParamMap, Sample, DEFAULT_SAMPLE_RATE};
use aria_dsp::delay_line::DelayLine;
use aria_dsp::noise::NoiseSource;
use aria_dsp::onepole::OnePole;
use aria_dsp::oscillator::{Lfo, Waveform};
use aria_dsp::{MonoProcessor, Processor, ProcessorConfig};

use crate::{EffectProcessor, blend, check_block, ensure_channels};

const MAX_DELAY_SECONDS: f64 = 2.0;

/// Delay character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayMode {
    Stereo,
    PingPong,
    Tape,
    Analog,
    Slapback,
    Dub,
    MultiTap,
    Reverse,
    DottedEighth,
    Modulated,
}

impl DelayMode {
    fn default_time_ms(self) -> f64 {
        match self {
            DelayMode::Slapback => 110.0,
            DelayMode::Modulated => 300.0,
            DelayMode::Dub => 450.0,
            _ => 380.0,
        }
    }

    fn default_feedback(self) -> f64 {
        match self {
            DelayMode::Slapback => 0.05,
            DelayMode::Dub => 0.65,
            DelayMode::Reverse => 0.3,
            DelayMode::DottedEighth => 0.45,
            _ => 0.4,
        }
    }

    fn default_tone(self) -> f64 {
        match self {
            DelayMode::Tape => 5000.0,
            DelayMode::Analog => 3000.0,
            DelayMode::Dub => 2500.0,
            _ => 8000.0,
        }
    }

    fn saturates(self) -> bool {
        matches!(self, DelayMode::Tape | DelayMode::Analog | DelayMode::Dub)
    }

    fn wow_settings(self) -> Option<(f64, f64)> {
        // (rate Hz, depth ms)
        match self {
            DelayMode::Tape => Some((0.6, 1.2)),
            DelayMode::Modulated => Some((0.8, 5.0)),
            DelayMode::Dub => Some((0.3, 0.6)),
            _ => None,
        }
    }
}

struct DelayParams {
    time_ms: f64,
    feedback: f64,
    tone: f64,
    hiss: f64,
    mix: f64,
}

impl DelayParams {
    fn resolve(params: &ParamMap, mode: DelayMode, ctx: &DspContext) -> Self {
        let time_ms = if mode == DelayMode::DottedEighth {
            // Dotted eighth = 3/4 of a beat, from the transport tempo.
            (ctx.beat_seconds() * 0.75 * 1000.0).clamp(10.0, MAX_DELAY_SECONDS * 1000.0 - 1.0)
        } else {
            params.float_clamped(
                "time_ms",
                mode.default_time_ms(),
                1.0,
                MAX_DELAY_SECONDS * 1000.0 - 1.0,
            )
        };
        Self {
            time_ms,
            feedback: params.float_clamped("feedback", mode.default_feedback(), 0.0, 0.95),
            tone: params.float_clamped("tone", mode.default_tone(), 200.0, 20000.0),
            hiss: params.float_clamped("hiss", 0.0, 0.0, 0.05),
            mix: params.float_clamped("mix", 0.35, 0.0, 1.0),
        }
    }
}

/// Multi-character echo processor
pub struct EchoDelay {
    mode: DelayMode,
    lines: Vec<DelayLine>,
    lowpass: Vec<OnePole>,
    highpass: Vec<OnePole>,
    wow: Lfo,
    hiss: NoiseSource,
    // Reverse mode: per-channel record/playback grain pair.
    rev_record: Vec<Vec<Sample>>,
    rev_play: Vec<Vec<Sample>>,
    rev_pos: usize,
    sample_rate: f64,
}

impl EchoDelay {
    pub fn new(mode: DelayMode) -> Self {
        Self {
            mode,
            lines: Vec::new(),
            lowpass: Vec::new(),
            highpass: Vec::new(),
            wow: Lfo::new(DEFAULT_SAMPLE_RATE, 0.5, Waveform::Sine),
            hiss: NoiseSource::new(0x5eed),
            rev_record: Vec::new(),
            rev_play: Vec::new(),
            rev_pos: 0,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    fn prepare(&mut self, ctx: &DspContext, num_channels: usize) {
        if (ctx.sample_rate - self.sample_rate).abs() > 1e-9 {
            self.sample_rate = ctx.sample_rate;
            self.lines.clear();
            self.lowpass.clear();
            self.highpass.clear();
            self.wow.set_sample_rate(ctx.sample_rate);
        }
        let sr = self.sample_rate;
        ensure_channels(&mut self.lines, num_channels, || {
            DelayLine::with_max_time(sr, MAX_DELAY_SECONDS)
        });
        ensure_channels(&mut self.lowpass, num_channels, || OnePole::lowpass(sr, 8000.0));
        ensure_channels(&mut self.highpass, num_channels, || {
            OnePole::highpass(sr, 90.0)
        });
    }

    #[inline]
    fn shape_feedback(&mut self, ch: usize, sample: Sample) -> Sample {
        let filtered = self.lowpass[ch].process_sample(sample);
        let filtered = self.highpass[ch].process_sample(filtered);
        if self.mode.saturates() {
            (filtered * 1.2).tanh() / 1.2_f64.tanh() * 0.9
        } else {
            filtered
        }
    }

    fn process_reverse(&mut self, input: &AudioBuffer, p: &DelayParams) -> AudioBuffer {
        let chunk_len = ((p.time_ms * 0.001 * self.sample_rate) as usize).max(64);
        let num_channels = input.num_channels();
        if self.rev_record.len() != num_channels || self.rev_record[0].len() != chunk_len {
            self.rev_record = vec![vec![0.0; chunk_len]; num_channels];
            self.rev_play = vec![vec![0.0; chunk_len]; num_channels];
            self.rev_pos = 0;
        }

        let mut output = input.clone();
        for i in 0..input.len() {
            for ch in 0..num_channels {
                let dry = input.channel(ch)[i];
                let wet = self.rev_play[ch][chunk_len - 1 - self.rev_pos];
                self.rev_record[ch][self.rev_pos] = dry + wet * p.feedback;
                output.channel_mut(ch)[i] = wet;
            }
            self.rev_pos += 1;
            if self.rev_pos >= chunk_len {
                self.rev_pos = 0;
                std::mem::swap(&mut self.rev_record, &mut self.rev_play);
            }
        }
        output
    }
}

impl EffectProcessor for EchoDelay {
    fn process(
        &mut self,
        input: &AudioBuffer,
        params: &ParamMap,
        ctx: &DspContext,
    ) -> AriaResult<AudioBuffer> {
        check_block(input, ctx)?;
        let p = DelayParams::resolve(params, self.mode, ctx);
        let num_channels = input.num_channels();
        self.prepare(ctx, num_channels);

        for lp in &mut self.lowpass {
            lp.set_cutoff(p.tone);
        }

        if self.mode == DelayMode::Reverse {
            let mut output = self.process_reverse(input, &p);
            blend(input, &mut output, p.mix);
            return Ok(output);
        }

        let sr = self.sample_rate;
        let base_delay = p.time_ms * 0.001 * sr;
        let (wow_rate, wow_depth) = self.mode.wow_settings().unwrap_or((0.0, 0.0));
        self.wow.set_frequency(wow_rate);
        let depth_samples = wow_depth * 0.001 * sr;

        let cross = self.mode == DelayMode::PingPong && num_channels >= 2;
        let taps: &[(f64, f64)] = if self.mode == DelayMode::MultiTap {
            &[(1.0, 1.0), (0.75, 0.7), (0.5, 0.55), (0.25, 0.4)]
        } else {
            &[(1.0, 1.0)]
        };

        let mut output = input.clone();
        for i in 0..input.len() {
            let mod_offset = if depth_samples > 0.0 {
                self.wow.process() * depth_samples
            } else {
                0.0
            };
            let delay = (base_delay + mod_offset).max(1.0);

            // Read every channel before any write so cross-feedback sees
            // this sample's pre-write state.
            let mut delayed = [0.0f64; 16];
            let mut wet = [0.0f64; 16];
            for ch in 0..num_channels.min(16) {
                let mut tap_sum = 0.0;
                for &(ratio, gain) in taps {
                    tap_sum += self.lines[ch].read_interpolated(delay * ratio) * gain;
                }
                delayed[ch] = self.lines[ch].read_interpolated(delay);
                wet[ch] = tap_sum;
            }

            for ch in 0..num_channels.min(16) {
                let dry = input.channel(ch)[i];
                let fb_source = if cross {
                    delayed[ch ^ 1]
                } else {
                    delayed[ch]
                };
                let mut fb = self.shape_feedback(ch, fb_source) * p.feedback;
                if p.hiss > 0.0 {
                    fb += self.hiss.white() * p.hiss;
                }
                self.lines[ch].write(dry + fb);
                output.channel_mut(ch)[i] = wet[ch];
            }
        }

        blend(input, &mut output, p.mix);
        Ok(output)
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
        for f in self.lowpass.iter_mut().chain(self.highpass.iter_mut()) {
            f.reset();
        }
        self.wow.reset();
        self.hiss.reset();
        for chunk in self.rev_record.iter_mut().chain(self.rev_play.iter_mut()) {
            chunk.fill(0.0);
        }
        self.rev_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse(len: usize, sr: f64) -> AudioBuffer {
        let mut buf = AudioBuffer::silent(2, len, sr);
        buf.channel_mut(0)[0] = 1.0;
        buf.channel_mut(1)[0] = 1.0;
        buf
    }

    #[test]
    fn test_echo_appears_at_delay_time() {
        let ctx = DspContext::new(48000.0, 512);
        let mut delay = EchoDelay::new(DelayMode::Stereo);
        let mut params = ParamMap::new();
        params.set("time_ms", 100.0).set("mix", 1.0).set("feedback", 0.0);

        let out = delay.process(&impulse(9600, 48000.0), &params, &ctx).unwrap();
        let expected = (0.1 * 48000.0) as usize;
        // The first echo lands one delay time after the impulse.
        let (peak_idx, _) = out
            .channel(0)
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .unwrap();
        assert!(
            (peak_idx as i64 - expected as i64).abs() <= 2,
            "echo at {peak_idx}, expected ~{expected}"
        );
    }

    #[test]
    fn test_ping_pong_alternates_channels() {
        let ctx = DspContext::new(48000.0, 512);
        let mut delay = EchoDelay::new(DelayMode::PingPong);
        let mut params = ParamMap::new();
        params
            .set("time_ms", 50.0)
            .set("mix", 1.0)
            .set("feedback", 0.7);

        // Impulse on the left channel only.
        let mut input = AudioBuffer::silent(2, 48000, 48000.0);
        input.channel_mut(0)[0] = 1.0;
        let out = delay.process(&input, &params, &ctx).unwrap();

        let d = (0.05 * 48000.0) as usize;
        let window_peak = |ch: usize, at: usize| {
            out.channel(ch)[at..at + 8]
                .iter()
                .fold(0.0f64, |m, s| m.max(s.abs()))
        };
        // First repeat: left (its own line); second repeat crossed over.
        let l2 = window_peak(0, 2 * d);
        let r2 = window_peak(1, 2 * d);
        assert!(
            r2 > l2,
            "second repeat should have crossed to the right: l={l2} r={r2}"
        );
    }

    #[test]
    fn test_dotted_eighth_follows_tempo() {
        let mut ctx = DspContext::new(48000.0, 512);
        ctx.tempo_bpm = 120.0; // beat = 0.5 s, dotted eighth = 375 ms
        let mut delay = EchoDelay::new(DelayMode::DottedEighth);
        let mut params = ParamMap::new();
        params.set("mix", 1.0).set("feedback", 0.0);

        let out = delay.process(&impulse(24000, 48000.0), &params, &ctx).unwrap();
        let expected = (0.375 * 48000.0) as usize;
        let (peak_idx, _) = out
            .channel(0)
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .unwrap();
        assert!((peak_idx as i64 - expected as i64).abs() <= 2);
    }

    #[test]
    fn test_reverse_plays_grains_backwards() {
        let ctx = DspContext::new(48000.0, 512);
        let mut delay = EchoDelay::new(DelayMode::Reverse);
        let mut params = ParamMap::new();
        params
            .set("time_ms", 10.0) // 480-sample grain
            .set("mix", 1.0)
            .set("feedback", 0.0);

        // Ramp input: the reversed grain must ramp downward.
        let len = 1920;
        let mut input = AudioBuffer::silent(1, len, 48000.0);
        for i in 0..len {
            input.channel_mut(0)[i] = i as f64 / len as f64;
        }
        let out = delay.process(&input, &params, &ctx).unwrap();
        // Second grain window plays the first grain reversed: decreasing.
        let window = &out.channel(0)[480..960];
        assert!(window[0] > window[479]);
    }

    #[test]
    fn test_all_modes_stable_and_zero_preserving() {
        let ctx = DspContext::new(48000.0, 512);
        for mode in [
            DelayMode::Stereo,
            DelayMode::PingPong,
            DelayMode::Tape,
            DelayMode::Analog,
            DelayMode::Slapback,
            DelayMode::Dub,
            DelayMode::MultiTap,
            DelayMode::Reverse,
            DelayMode::DottedEighth,
            DelayMode::Modulated,
        ] {
            let mut delay = EchoDelay::new(mode);
            let silence = AudioBuffer::silent(2, 2048, 48000.0);
            for _ in 0..3 {
                let out = delay.process(&silence, &ParamMap::new(), &ctx).unwrap();
                assert!(out.is_finite());
                assert_eq!(out.peak(), 0.0, "{mode:?} injected signal into silence");
            }
        }
    }
}
