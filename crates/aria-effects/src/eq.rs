//! Equalizers
//!
//! Every character compiles its controls into a list of biquad sections
//! per call, then runs one section chain per channel. The dynamic variant
//! rides its band gain with an envelope detector; the mid-side variant
//! encodes to M/S, runs separate chains, and decodes.

use aria_core::{
    AriaResult, AudioBuffer, DspContext, ParamMap, StereoSample, DEFAULT_SAMPLE_RATE, linear_to_db,
};
use aria_dsp::biquad::{BiquadCoeffs, BiquadTDF2, MAX_Q, MIN_Q};
use aria_dsp::envelope::EnvelopeFollower;
use aria_dsp::{MonoProcessor, Processor};

use crate::{EffectProcessor, blend, check_block, ensure_channels};

const GAIN_RANGE_DB: f64 = 24.0;
const GRAPHIC_BANDS: [f64; 10] = [
    31.5, 63.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
];

/// Equalizer character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqMode {
    Parametric,
    Graphic,
    Dynamic,
    MidSide,
    Tilt,
    Vintage,
    Baxandall,
    Filter,
    Air,
    Notch,
}

/// Multi-character equalizer
pub struct Equalizer {
    mode: EqMode,
    chains: Vec<Vec<BiquadTDF2>>,
    side_chain: Vec<BiquadTDF2>,
    detectors: Vec<EnvelopeFollower>,
    sample_rate: f64,
}

impl Equalizer {
    pub fn new(mode: EqMode) -> Self {
        Self {
            mode,
            chains: Vec::new(),
            side_chain: Vec::new(),
            detectors: Vec::new(),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    fn gain(params: &ParamMap, key: &str, default: f64) -> f64 {
        params.float_clamped(key, default, -GAIN_RANGE_DB, GAIN_RANGE_DB)
    }

    /// Compile the control set into biquad sections for the main path.
    fn sections(&self, params: &ParamMap) -> Vec<BiquadCoeffs> {
        let sr = self.sample_rate;
        match self.mode {
            EqMode::Parametric => {
                let mid_freq = params.float_clamped("mid_freq", 1000.0, 100.0, 12000.0);
                let q = params.float_clamped("q", 1.0, MIN_Q, MAX_Q);
                vec![
                    BiquadCoeffs::low_shelf(100.0, 0.707, Self::gain(params, "low_gain_db", 0.0), sr),
                    BiquadCoeffs::peaking(mid_freq, q, Self::gain(params, "mid_gain_db", 0.0), sr),
                    BiquadCoeffs::high_shelf(8000.0, 0.707, Self::gain(params, "high_gain_db", 0.0), sr),
                ]
            }
            EqMode::Graphic => GRAPHIC_BANDS
                .iter()
                .enumerate()
                .map(|(i, &freq)| {
                    let key = format!("band_{}", i + 1);
                    BiquadCoeffs::peaking(freq, 1.4, Self::gain(params, &key, 0.0), sr)
                })
                .collect(),
            EqMode::Tilt => {
                let tilt = Self::gain(params, "tilt_db", 3.0);
                let pivot = params.float_clamped("pivot_freq", 650.0, 100.0, 4000.0);
                vec![
                    BiquadCoeffs::low_shelf(pivot, 0.5, -tilt, sr),
                    BiquadCoeffs::high_shelf(pivot, 0.5, tilt, sr),
                ]
            }
            EqMode::Vintage => {
                // Fixed console-style curve, scaled by one amount control.
                let amount = params.float_clamped("amount", 1.0, 0.0, 2.0);
                vec![
                    BiquadCoeffs::low_shelf(100.0, 0.6, 2.0 * amount, sr),
                    BiquadCoeffs::peaking(400.0, 0.7, -1.5 * amount, sr),
                    BiquadCoeffs::high_shelf(8000.0, 0.6, 2.5 * amount, sr),
                ]
            }
            EqMode::Baxandall => {
                let bass = Self::gain(params, "bass_db", 0.0);
                let treble = Self::gain(params, "treble_db", 0.0);
                vec![
                    BiquadCoeffs::low_shelf(120.0, 0.4, bass, sr),
                    BiquadCoeffs::high_shelf(8000.0, 0.4, treble, sr),
                ]
            }
            EqMode::Filter => {
                let hp = params.float_clamped("hp_freq", 20.0, 10.0, 20000.0);
                let lp = params.float_clamped("lp_freq", 20000.0, 40.0, 22000.0);
                let res = params.float_clamped("resonance", 0.707, MIN_Q, 10.0);
                vec![
                    BiquadCoeffs::highpass(hp, res, sr),
                    BiquadCoeffs::lowpass(lp, res, sr),
                ]
            }
            EqMode::Air => {
                let air = Self::gain(params, "air_db", 4.0);
                vec![
                    BiquadCoeffs::high_shelf(12000.0, 0.55, air, sr),
                    BiquadCoeffs::peaking(16000.0, 0.8, air * 0.3, sr),
                ]
            }
            EqMode::Notch => {
                let freq = params.float_clamped("freq", 1000.0, 20.0, 20000.0);
                let q = params.float_clamped("q", 8.0, MIN_Q, MAX_Q);
                let mut sections = vec![BiquadCoeffs::notch(freq, q, sr)];
                if params.bool_or("harmonic", false) {
                    sections.push(BiquadCoeffs::notch(freq * 2.0, q, sr));
                }
                sections
            }
            // Dynamic recomputes per sample; MidSide builds its own chains.
            EqMode::Dynamic | EqMode::MidSide => Vec::new(),
        }
    }

    fn rebuild(&mut self, num_channels: usize, num_sections: usize) {
        let sr = self.sample_rate;
        if self.chains.len() != num_channels
            || self.chains.first().is_some_and(|c| c.len() != num_sections)
        {
            self.chains = (0..num_channels)
                .map(|_| (0..num_sections).map(|_| BiquadTDF2::new(sr)).collect())
                .collect();
        }
    }

    fn process_dynamic(
        &mut self,
        input: &AudioBuffer,
        params: &ParamMap,
    ) -> AudioBuffer {
        let sr = self.sample_rate;
        let freq = params.float_clamped("freq", 3000.0, 100.0, 16000.0);
        let q = params.float_clamped("q", 1.5, MIN_Q, MAX_Q);
        let gain_db = Self::gain(params, "gain_db", -6.0);
        let threshold_db = params.float_clamped("threshold_db", -30.0, -60.0, 0.0);
        let num_channels = input.num_channels();

        self.rebuild(num_channels, 1);
        ensure_channels(&mut self.detectors, num_channels, || {
            let mut det = EnvelopeFollower::new(sr);
            det.set_times(5.0, 120.0);
            det
        });

        let mut output = input.clone();
        // Coefficients update every 32 samples; per-sample recomputation
        // buys nothing audible at these detector speeds.
        const STRIDE: usize = 32;
        for ch in 0..num_channels {
            for i in 0..input.len() {
                let dry = input.channel(ch)[i];
                let env_db = linear_to_db(self.detectors[ch].process(dry));
                if i % STRIDE == 0 {
                    let excess = (env_db - threshold_db).max(0.0);
                    // The band gain fades in as the detector crosses the
                    // threshold; 12 dB over drives it fully open.
                    let active = (excess / 12.0).min(1.0);
                    self.chains[ch][0]
                        .set_coeffs(BiquadCoeffs::peaking(freq, q, gain_db * active, sr));
                }
                output.channel_mut(ch)[i] = self.chains[ch][0].process_sample(dry);
            }
        }
        output
    }

    fn process_mid_side(&mut self, input: &AudioBuffer, params: &ParamMap) -> AudioBuffer {
        let sr = self.sample_rate;
        let mid_gain = Self::gain(params, "mid_gain_db", 0.0);
        let side_gain = Self::gain(params, "side_gain_db", 0.0);
        let mid_freq = params.float_clamped("mid_freq", 800.0, 100.0, 12000.0);

        self.rebuild(1, 1);
        self.chains[0][0].set_coeffs(BiquadCoeffs::peaking(mid_freq, 0.8, mid_gain, sr));
        if self.side_chain.is_empty() {
            self.side_chain.push(BiquadTDF2::new(sr));
        }
        self.side_chain[0].set_coeffs(BiquadCoeffs::high_shelf(2000.0, 0.6, side_gain, sr));

        let mut output = input.clone();
        if input.num_channels() < 2 {
            // Mono has no side signal; only the mid chain applies.
            for i in 0..input.len() {
                output.channel_mut(0)[i] = self.chains[0][0].process_sample(input.channel(0)[i]);
            }
            return output;
        }
        for i in 0..input.len() {
            let frame = StereoSample::new(input.channel(0)[i], input.channel(1)[i]);
            let mut ms = frame.to_mid_side();
            ms.mid = self.chains[0][0].process_sample(ms.mid);
            ms.side = self.side_chain[0].process_sample(ms.side);
            let out = ms.to_stereo();
            output.channel_mut(0)[i] = out.left;
            output.channel_mut(1)[i] = out.right;
        }
        output
    }
}

impl EffectProcessor for Equalizer {
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
            self.side_chain.clear();
            self.detectors.clear();
        }
        let mix = params.float_clamped("mix", 1.0, 0.0, 1.0);

        let mut output = match self.mode {
            EqMode::Dynamic => self.process_dynamic(input, params),
            EqMode::MidSide => self.process_mid_side(input, params),
            _ => {
                let sections = self.sections(params);
                self.rebuild(input.num_channels(), sections.len());
                for chain in &mut self.chains {
                    for (biquad, coeffs) in chain.iter_mut().zip(&sections) {
                        biquad.set_coeffs(*coeffs);
                    }
                }
                let mut output = input.clone();
                for (ch, chain) in self.chains.iter_mut().enumerate() {
                    let samples = output.channel_mut(ch);
                    for sample in samples.iter_mut() {
                        let mut acc = *sample;
                        for biquad in chain.iter_mut() {
                            acc = biquad.process_sample(acc);
                        }
                        *sample = acc;
                    }
                }
                output
            }
        };

        blend(input, &mut output, mix);
        Ok(output)
    }

    fn reset(&mut self) {
        for chain in &mut self.chains {
            for biquad in chain.iter_mut() {
                biquad.clear();
            }
        }
        for biquad in &mut self.side_chain {
            biquad.clear();
        }
        for det in &mut self.detectors {
            det.reset();
        }
    }
}
