//! Voice treatment chains
//!
//! Each character is a fixed recipe: a short biquad section stack, an
//! optional leveling stage, and an optional drive stage, scaled by one
//! `amount` control. Bandlimited characters (radio, telephone) double
//! their edge filters for steeper skirts.

use aria_core::{
    AriaResult, AudioBuffer, DspContext, ParamMap, DEFAULT_SAMPLE_RATE, db_to_linear, linear_to_db,
};
use aria_dsp::biquad::{BiquadCoeffs, BiquadTDF2};
use aria_dsp::envelope::EnvelopeFollower;
use aria_dsp::{MonoProcessor, Processor};

use crate::{EffectProcessor, blend, check_block, ensure_channels};

/// Vocal chain character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VocalMode {
    Air,
    Warmth,
    Presence,
    Radio,
    Telephone,
    Podcast,
    Broadcast,
    Smooth,
    Crisp,
    Vintage,
}

/// One EQ move inside a recipe, gains scaled by `amount` at compile time.
enum Section {
    Highpass(f64),
    Lowpass(f64),
    LowShelf(f64, f64),
    HighShelf(f64, f64),
    Peaking(f64, f64, f64),
}

impl Section {
    fn coeffs(&self, amount: f64, sr: f64) -> BiquadCoeffs {
        match *self {
            Section::Highpass(freq) => BiquadCoeffs::highpass(freq, 0.707, sr),
            Section::Lowpass(freq) => BiquadCoeffs::lowpass(freq, 0.707, sr),
            Section::LowShelf(freq, gain) => {
                BiquadCoeffs::low_shelf(freq, 0.7, gain * amount, sr)
            }
            Section::HighShelf(freq, gain) => {
                BiquadCoeffs::high_shelf(freq, 0.7, gain * amount, sr)
            }
            Section::Peaking(freq, q, gain) => BiquadCoeffs::peaking(freq, q, gain * amount, sr),
        }
    }
}

impl VocalMode {
    fn recipe(self) -> Vec<Section> {
        use Section::*;
        match self {
            VocalMode::Air => vec![Highpass(80.0), HighShelf(12000.0, 5.0)],
            VocalMode::Warmth => vec![
                LowShelf(200.0, 4.0),
                Peaking(3000.0, 1.0, -2.0),
                Lowpass(14000.0),
            ],
            VocalMode::Presence => vec![Highpass(100.0), Peaking(3500.0, 1.0, 5.0)],
            VocalMode::Radio => vec![
                Highpass(300.0),
                Highpass(300.0),
                Lowpass(3000.0),
                Lowpass(3000.0),
            ],
            VocalMode::Telephone => vec![
                Highpass(400.0),
                Highpass(400.0),
                Lowpass(2200.0),
                Lowpass(2200.0),
            ],
            VocalMode::Podcast => vec![
                Highpass(90.0),
                Peaking(2500.0, 0.9, 2.5),
                HighShelf(9000.0, 2.0),
            ],
            VocalMode::Broadcast => vec![
                Highpass(70.0),
                LowShelf(150.0, 2.0),
                Peaking(3000.0, 1.0, 3.0),
                HighShelf(10000.0, 3.0),
            ],
            VocalMode::Smooth => vec![Peaking(3000.0, 1.2, -3.0), HighShelf(9000.0, -2.0)],
            VocalMode::Crisp => vec![
                Highpass(120.0),
                Peaking(5000.0, 1.0, 3.0),
                HighShelf(10000.0, 4.0),
            ],
            VocalMode::Vintage => vec![
                Highpass(60.0),
                LowShelf(180.0, 2.0),
                Lowpass(10000.0),
            ],
        }
    }

    /// Drive into the tanh stage; zero skips it.
    fn drive(self) -> f64 {
        match self {
            VocalMode::Radio => 2.5,
            VocalMode::Telephone => 4.0,
            VocalMode::Vintage => 1.5,
            _ => 0.0,
        }
    }

    /// Leveling depth, 0..1.
    fn leveling(self) -> f64 {
        match self {
            VocalMode::Podcast => 0.5,
            VocalMode::Broadcast => 0.8,
            VocalMode::Smooth => 0.4,
            _ => 0.0,
        }
    }
}

/// Fixed-recipe voice processor
pub struct VocalChain {
    mode: VocalMode,
    chains: Vec<Vec<BiquadTDF2>>,
    detectors: Vec<EnvelopeFollower>,
    sample_rate: f64,
}

impl VocalChain {
    pub fn new(mode: VocalMode) -> Self {
        Self {
            mode,
            chains: Vec::new(),
            detectors: Vec::new(),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl EffectProcessor for VocalChain {
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
            self.detectors.clear();
        }
        let sr = self.sample_rate;
        let amount = params.float_clamped("amount", 1.0, 0.0, 2.0);
        let mix = params.float_clamped("mix", 1.0, 0.0, 1.0);
        let num_channels = input.num_channels();

        let recipe = self.mode.recipe();
        let sections: Vec<BiquadCoeffs> =
            recipe.iter().map(|s| s.coeffs(amount, sr)).collect();
        if self.chains.len() != num_channels
            || self.chains.first().is_some_and(|c| c.len() != sections.len())
        {
            self.chains = (0..num_channels)
                .map(|_| sections.iter().map(|_| BiquadTDF2::new(sr)).collect())
                .collect();
        }
        for chain in &mut self.chains {
            for (bq, coeffs) in chain.iter_mut().zip(&sections) {
                bq.set_coeffs(*coeffs);
            }
        }
        ensure_channels(&mut self.detectors, num_channels, || {
            let mut det = EnvelopeFollower::new(sr);
            det.set_times(15.0, 250.0);
            det
        });

        let drive = self.mode.drive() * amount;
        let leveling = self.mode.leveling() * amount.min(1.0);
        let mut output = input.clone();
        for ch in 0..num_channels {
            for i in 0..input.len() {
                let mut x = input.channel(ch)[i];
                for bq in self.chains[ch].iter_mut() {
                    x = bq.process_sample(x);
                }
                if leveling > 0.0 {
                    // Pull levels toward -18 dBFS, scaled by depth.
                    let env = self.detectors[ch].process(x);
                    if env > 1e-5 {
                        let correction_db =
                            ((-18.0 - linear_to_db(env)) * leveling).clamp(-9.0, 9.0);
                        x *= db_to_linear(correction_db);
                    }
                }
                if drive > 0.0 {
                    x = (x * drive).tanh() / drive;
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
        for det in &mut self.detectors {
            det.reset();
        }
    }
}
