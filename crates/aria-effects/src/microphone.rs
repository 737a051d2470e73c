//! Microphone colorations
//!
//! Frequency-response emulations of ten capsule/body combinations: a
//! fixed section stack per model, a proximity control driving an extra
//! low shelf, and a transformer/tube stage on the models that have one.
//! Self-noise is available but defaults to zero.

use aria_core::{AriaResult, AudioBuffer, DspContext, ParamMap, DEFAULT_SAMPLE_RATE};
use aria_dsp::biquad::{BiquadCoeffs, BiquadTDF2};
use aria_dsp::noise::NoiseSource;
use aria_dsp::{MonoProcessor, Processor};

use crate::{EffectProcessor, blend, check_block};

/// Microphone model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicModel {
    StudioCondenser,
    VintageTube,
    VintageRibbon,
    BroadcastDynamic,
    SmallDiaphragm,
    HandheldStage,
    Lavalier,
    Boundary,
    Shotgun,
    DrumRoom,
}

impl MicModel {
    // (freq, q, gain_db) peaking/shelf moves; shelves flagged by q = 0.
    fn response(self) -> Vec<(f64, f64, f64)> {
        match self {
            // Gentle presence lift and airy top.
            MicModel::StudioCondenser => vec![(3500.0, 0.9, 2.0), (12000.0, 0.0, 3.0)],
            // Thick low mids, softened top, tube stage added separately.
            MicModel::VintageTube => vec![(200.0, 0.7, 2.5), (9000.0, 0.0, -2.0)],
            // Figure-8 bass bump and dark ribbon rolloff.
            MicModel::VintageRibbon => vec![(120.0, 0.6, 3.0), (6000.0, 0.0, -6.0)],
            // Broadcast mid punch.
            MicModel::BroadcastDynamic => vec![(100.0, 0.6, 1.5), (2500.0, 1.0, 3.0), (11000.0, 0.0, -3.0)],
            // Flat and fast with a tiny top tick.
            MicModel::SmallDiaphragm => vec![(9000.0, 1.2, 1.5)],
            // Stage vocal mic: low shelf trims handling rumble, big presence bump.
            MicModel::HandheldStage => vec![(5000.0, 0.8, 4.0), (150.0, 0.0, -3.0)],
            // Chest-mounted: notch the chest resonance, lift speech band.
            MicModel::Lavalier => vec![(700.0, 1.4, -3.0), (6000.0, 0.9, 3.0)],
            // Floor plate: phase-y low mids, plate brightness.
            MicModel::Boundary => vec![(300.0, 1.0, -2.0), (4000.0, 0.7, 2.0)],
            // Narrow lobe: thin lows, forward mids.
            MicModel::Shotgun => vec![(250.0, 0.0, -4.0), (3000.0, 0.8, 3.5)],
            // Smashed room mic: scooped mids, big edges.
            MicModel::DrumRoom => vec![(80.0, 0.7, 4.0), (500.0, 0.9, -4.0), (8000.0, 0.0, 3.0)],
        }
    }

    fn drive(self) -> f64 {
        match self {
            MicModel::VintageTube => 1.8,
            MicModel::VintageRibbon | MicModel::BroadcastDynamic => 1.2,
            MicModel::DrumRoom => 2.2,
            _ => 0.0,
        }
    }

    /// Shelf frequency the proximity control operates on.
    fn proximity_freq(self) -> f64 {
        match self {
            MicModel::VintageRibbon => 250.0,
            MicModel::Lavalier => 120.0,
            _ => 180.0,
        }
    }
}

/// Microphone response processor
pub struct MicColoration {
    model: MicModel,
    chains: Vec<Vec<BiquadTDF2>>,
    proximity: Vec<BiquadTDF2>,
    noise: NoiseSource,
    sample_rate: f64,
}

impl MicColoration {
    pub fn new(model: MicModel) -> Self {
        Self {
            model,
            chains: Vec::new(),
            proximity: Vec::new(),
            noise: NoiseSource::new(0x0a1c),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl EffectProcessor for MicColoration {
    fn process(
        &mut self,
        input: &AudioBuffer,
        params: &ParamMap,
        ctx: &DspContext,
    ) -> AriaResult<AudioBuffer> {
        check_block(input, ctx)?;
        if (ctx.sample_rate - self.sample_rate).abs() > 1e-9 {
            self.sample_rate = ctx.sample_rate;
            self.chains.clear();
            self.proximity.clear();
        }
        let sr = self.sample_rate;
        let amount = params.float_clamped("amount", 1.0, 0.0, 2.0);
        let proximity = params.float_clamped("proximity", 0.0, 0.0, 1.0);
        let self_noise = params.float_clamped("self_noise", 0.0, 0.0, 0.01);
        let mix = params.float_clamped("mix", 1.0, 0.0, 1.0);
        let num_channels = input.num_channels();

        let response = self.model.response();
        let sections: Vec<BiquadCoeffs> = response
            .iter()
            .map(|&(freq, q, gain)| {
                if q == 0.0 {
                    if freq < 1000.0 {
                        BiquadCoeffs::low_shelf(freq, 0.7, gain * amount, sr)
                    } else {
                        BiquadCoeffs::high_shelf(freq, 0.7, gain * amount, sr)
                    }
                } else {
                    BiquadCoeffs::peaking(freq, q, gain * amount, sr)
                }
            })
            .collect();

        if self.chains.len() != num_channels
            || self.chains.first().is_some_and(|c| c.len() != sections.len())
        {
            self.chains = (0..num_channels)
                .map(|_| sections.iter().map(|_| BiquadTDF2::new(sr)).collect())
                .collect();
            self.proximity = (0..num_channels).map(|_| BiquadTDF2::new(sr)).collect();
        }
        for chain in &mut self.chains {
            for (bq, coeffs) in chain.iter_mut().zip(&sections) {
                bq.set_coeffs(*coeffs);
            }
        }
        let prox_coeffs = BiquadCoeffs::low_shelf(
            self.model.proximity_freq(),
            0.7,
            6.0 * proximity,
            sr,
        );
        for bq in &mut self.proximity {
            bq.set_coeffs(prox_coeffs);
        }

        let drive = self.model.drive() * amount;
        let mut output = input.clone();
        for ch in 0..num_channels {
            for i in 0..input.len() {
                let mut x = input.channel(ch)[i];
                for bq in self.chains[ch].iter_mut() {
                    x = bq.process_sample(x);
                }
                x = self.proximity[ch].process_sample(x);
                if drive > 0.0 {
                    // Unity small-signal gain so the drive stage only adds
                    // harmonics, never level.
                    x = (x * drive).tanh() / drive;
                }
                if self_noise > 0.0 {
                    x += self.noise.white() * self_noise;
                }
                output.channel_mut(ch)[i] = x;
            }
        }

        blend(input, &mut output, mix);
        Ok(output)
    }

    fn reset(&mut self) {
        for chain in &mut self.chains {
            for bq in chain.iter_mut() {
                bq.clear();
            }
        }
        for bq in &mut self.proximity {
            bq.clear();
        }
        self.noise.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, len: usize) -> AudioBuffer {
        let mut buf = AudioBuffer::silent(1, len, 48000.0);
        for i in 0..len {
            buf.channel_mut(0)[i] =
                0.25 * (2.0 * std::f64::consts::PI * freq * i as f64 / 48000.0).sin();
        }
        buf
    }

    fn steady_rms(buf: &AudioBuffer) -> f64 {
        let tail = &buf.channel(0)[buf.len() / 2..];
        (tail.iter().map(|s| s * s).sum::<f64>() / tail.len() as f64).sqrt()
    }

    #[test]
    fn test_ribbon_is_dark() {
        let ctx = DspContext::new(48000.0, 512);
        let mut mic = MicColoration::new(MicModel::VintageRibbon);
        let high = sine(12000.0, 8192);
        let out = mic.process(&high, &ParamMap::new(), &ctx).unwrap();
        assert!(steady_rms(&out) < steady_rms(&high) * 0.7);
    }

    #[test]
    fn test_proximity_adds_bass() {
        let ctx = DspContext::new(48000.0, 512);
        let mut mic = MicColoration::new(MicModel::StudioCondenser);
        let low = sine(100.0, 8192);

        let flat = mic.process(&low, &ParamMap::new(), &ctx).unwrap();
        mic.reset();
        let mut params = ParamMap::new();
        params.set("proximity", 1.0);
        let close = mic.process(&low, &params, &ctx).unwrap();
        assert!(steady_rms(&close) > steady_rms(&flat) * 1.5);
    }

    #[test]
    fn test_self_noise_defaults_off() {
        let ctx = DspContext::new(48000.0, 512);
        let mut mic = MicColoration::new(MicModel::VintageTube);
        let silence = AudioBuffer::silent(1, 4096, 48000.0);
        let out = mic.process(&silence, &ParamMap::new(), &ctx).unwrap();
        assert_eq!(out.peak(), 0.0);

        let mut params = ParamMap::new();
        params.set("self_noise", 0.005);
        let out = mic.process(&silence, &params, &ctx).unwrap();
        assert!(out.peak() > 0.0, "requested self-noise must appear");
    }

    #[test]
    fn test_all_models_stable_and_zero_preserving() {
        let ctx = DspContext::new(48000.0, 512);
        for model in [
            MicModel::StudioCondenser,
            MicModel::VintageTube,
            MicModel::VintageRibbon,
            MicModel::BroadcastDynamic,
            MicModel::SmallDiaphragm,
            MicModel::HandheldStage,
            MicModel::Lavalier,
            MicModel::Boundary,
            MicModel::Shotgun,
            MicModel::DrumRoom,
        ] {
            let mut mic = MicColoration::new(model);
            let silence = AudioBuffer::silent(2, 1024, 48000.0);
            let out = mic.process(&silence, &ParamMap::new(), &ctx).unwrap();
            assert!(out.is_finite());
            assert_eq!(out.peak(), 0.0, "{model:?} produced output from silence");

            let out = mic.process(&sine(440.0, 1024), &ParamMap::new(), &ctx).unwrap();
            assert!(out.is_finite(), "{model:?} went non-finite");
        }
    }
}
