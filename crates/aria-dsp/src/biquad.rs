//! Biquad filter implementation using Transposed Direct Form II
//!
//! Coefficients follow the RBJ audio EQ cookbook (bilinear transform of the
//! second-order continuous-time prototypes). Unlike the formulas as usually
//! printed, every constructor clamps its inputs to the stable region:
//! frequency strictly inside (0, Nyquist) and Q > 0, so a bad parameter can
//! never seed NaN into the recurrence.

use std::f64::consts::PI;

use aria_core::Sample;

use crate::{MonoProcessor, Processor, ProcessorConfig};

/// Lowest Q accepted by the cookbook constructors.
pub const MIN_Q: f64 = 0.05;
/// Highest Q accepted by the cookbook constructors.
pub const MAX_Q: f64 = 40.0;

/// Clamp a center/cutoff frequency strictly inside (0, Nyquist).
#[inline]
pub fn clamp_freq(freq: f64, sample_rate: f64) -> f64 {
    let freq = if freq.is_finite() { freq } else { 1000.0 };
    freq.clamp(1.0, sample_rate * 0.49)
}

#[inline]
fn clamp_q(q: f64) -> f64 {
    let q = if q.is_finite() { q } else { MIN_Q };
    q.clamp(MIN_Q, MAX_Q)
}

/// Intermediate terms shared by every cookbook formula.
struct Prototype {
    sin_omega: f64,
    cos_omega: f64,
    alpha: f64,
}

impl Prototype {
    fn new(freq: f64, q: f64, sample_rate: f64) -> Self {
        let omega = 2.0 * PI * clamp_freq(freq, sample_rate) / sample_rate;
        let sin_omega = omega.sin();
        Self {
            sin_omega,
            cos_omega: omega.cos(),
            alpha: sin_omega / (2.0 * clamp_q(q)),
        }
    }
}

/// Normalized biquad coefficients (a0 divided out)
#[derive(Debug, Clone, Copy, Default)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        let inv_a0 = 1.0 / a0;
        Self {
            b0: b0 * inv_a0,
            b1: b1 * inv_a0,
            b2: b2 * inv_a0,
            a1: a1 * inv_a0,
            a2: a2 * inv_a0,
        }
    }

    pub fn lowpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let p = Prototype::new(freq, q, sample_rate);
        let b1 = 1.0 - p.cos_omega;
        Self::normalized(
            b1 / 2.0,
            b1,
            b1 / 2.0,
            1.0 + p.alpha,
            -2.0 * p.cos_omega,
            1.0 - p.alpha,
        )
    }

    pub fn highpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let p = Prototype::new(freq, q, sample_rate);
        let peak = 1.0 + p.cos_omega;
        Self::normalized(
            peak / 2.0,
            -peak,
            peak / 2.0,
            1.0 + p.alpha,
            -2.0 * p.cos_omega,
            1.0 - p.alpha,
        )
    }

    /// Bandpass with constant 0 dB peak gain
    pub fn bandpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let p = Prototype::new(freq, q, sample_rate);
        Self::normalized(
            p.alpha,
            0.0,
            -p.alpha,
            1.0 + p.alpha,
            -2.0 * p.cos_omega,
            1.0 - p.alpha,
        )
    }

    pub fn notch(freq: f64, q: f64, sample_rate: f64) -> Self {
        let p = Prototype::new(freq, q, sample_rate);
        Self::normalized(
            1.0,
            -2.0 * p.cos_omega,
            1.0,
            1.0 + p.alpha,
            -2.0 * p.cos_omega,
            1.0 - p.alpha,
        )
    }

    pub fn allpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let p = Prototype::new(freq, q, sample_rate);
        Self::normalized(
            1.0 - p.alpha,
            -2.0 * p.cos_omega,
            1.0 + p.alpha,
            1.0 + p.alpha,
            -2.0 * p.cos_omega,
            1.0 - p.alpha,
        )
    }

    pub fn peaking(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let p = Prototype::new(freq, q, sample_rate);
        Self::normalized(
            1.0 + p.alpha * a,
            -2.0 * p.cos_omega,
            1.0 - p.alpha * a,
            1.0 + p.alpha / a,
            -2.0 * p.cos_omega,
            1.0 - p.alpha / a,
        )
    }

    pub fn low_shelf(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let p = Prototype::new(freq, q, sample_rate);
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * p.alpha;
        Self::normalized(
            a * ((a + 1.0) - (a - 1.0) * p.cos_omega + two_sqrt_a_alpha),
            2.0 * a * ((a - 1.0) - (a + 1.0) * p.cos_omega),
            a * ((a + 1.0) - (a - 1.0) * p.cos_omega - two_sqrt_a_alpha),
            (a + 1.0) + (a - 1.0) * p.cos_omega + two_sqrt_a_alpha,
            -2.0 * ((a - 1.0) + (a + 1.0) * p.cos_omega),
            (a + 1.0) + (a - 1.0) * p.cos_omega - two_sqrt_a_alpha,
        )
    }

    pub fn high_shelf(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let p = Prototype::new(freq, q, sample_rate);
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * p.alpha;
        Self::normalized(
            a * ((a + 1.0) + (a - 1.0) * p.cos_omega + two_sqrt_a_alpha),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * p.cos_omega),
            a * ((a + 1.0) + (a - 1.0) * p.cos_omega - two_sqrt_a_alpha),
            (a + 1.0) - (a - 1.0) * p.cos_omega + two_sqrt_a_alpha,
            2.0 * ((a - 1.0) - (a + 1.0) * p.cos_omega),
            (a + 1.0) - (a - 1.0) * p.cos_omega - two_sqrt_a_alpha,
        )
    }

    /// Unity gain, no filtering
    pub fn bypass() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

/// Transposed Direct Form II biquad filter
#[derive(Debug, Clone)]
pub struct BiquadTDF2 {
    coeffs: BiquadCoeffs,
    z1: f64,
    z2: f64,
    sample_rate: f64,
}

impl BiquadTDF2 {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            coeffs: BiquadCoeffs::bypass(),
            z1: 0.0,
            z2: 0.0,
            sample_rate,
        }
    }

    #[inline]
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    #[inline]
    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    pub fn set_lowpass(&mut self, freq: f64, q: f64) {
        self.coeffs = BiquadCoeffs::lowpass(freq, q, self.sample_rate);
    }

    pub fn set_highpass(&mut self, freq: f64, q: f64) {
        self.coeffs = BiquadCoeffs::highpass(freq, q, self.sample_rate);
    }

    pub fn set_bandpass(&mut self, freq: f64, q: f64) {
        self.coeffs = BiquadCoeffs::bandpass(freq, q, self.sample_rate);
    }

    pub fn set_notch(&mut self, freq: f64, q: f64) {
        self.coeffs = BiquadCoeffs::notch(freq, q, self.sample_rate);
    }

    pub fn set_allpass(&mut self, freq: f64, q: f64) {
        self.coeffs = BiquadCoeffs::allpass(freq, q, self.sample_rate);
    }

    pub fn set_peaking(&mut self, freq: f64, q: f64, gain_db: f64) {
        self.coeffs = BiquadCoeffs::peaking(freq, q, gain_db, self.sample_rate);
    }

    pub fn set_low_shelf(&mut self, freq: f64, q: f64, gain_db: f64) {
        self.coeffs = BiquadCoeffs::low_shelf(freq, q, gain_db, self.sample_rate);
    }

    pub fn set_high_shelf(&mut self, freq: f64, q: f64, gain_db: f64) {
        self.coeffs = BiquadCoeffs::high_shelf(freq, q, gain_db, self.sample_rate);
    }

    pub fn set_bypass(&mut self) {
        self.coeffs = BiquadCoeffs::bypass();
    }

    /// Zero the two-sample history without touching coefficients.
    pub fn clear(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

impl Processor for BiquadTDF2 {
    fn reset(&mut self) {
        self.clear();
    }
}

impl MonoProcessor for BiquadTDF2 {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let output = self.coeffs.b0 * input + self.z1;
        self.z1 = self.coeffs.b1 * input - self.coeffs.a1 * output + self.z2;
        self.z2 = self.coeffs.b2 * input - self.coeffs.a2 * output;
        output
    }
}

impl ProcessorConfig for BiquadTDF2 {
    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steady_sine_gain(filter: &mut BiquadTDF2, freq: f64, sample_rate: f64) -> f64 {
        let samples = (sample_rate as usize).min(48000);
        let mut peak: f64 = 0.0;
        for i in 0..samples {
            let t = i as f64 / sample_rate;
            let out = filter.process_sample((2.0 * PI * freq * t).sin());
            // Measure after settling.
            if i > samples / 2 {
                peak = peak.max(out.abs());
            }
        }
        peak
    }

    #[test]
    fn test_bypass_identity() {
        let mut filter = BiquadTDF2::new(48000.0);
        filter.set_bypass();
        assert!((filter.process_sample(0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_lowpass_minus_3db_at_cutoff() {
        let mut filter = BiquadTDF2::new(48000.0);
        filter.set_lowpass(1000.0, std::f64::consts::FRAC_1_SQRT_2);
        let gain = steady_sine_gain(&mut filter, 1000.0, 48000.0);
        let db = 20.0 * gain.log10();
        assert!((db + 3.0).abs() < 1.0, "expected ~-3 dB at cutoff, got {db}");
    }

    #[test]
    fn test_highpass_near_zero_cutoff_is_transparent() {
        let mut filter = BiquadTDF2::new(48000.0);
        // Out-of-range request clamps to the bottom of the legal band.
        filter.set_highpass(0.0, std::f64::consts::FRAC_1_SQRT_2);
        for freq in [100.0, 1000.0, 10000.0] {
            filter.reset();
            let gain = steady_sine_gain(&mut filter, freq, 48000.0);
            assert!(gain > 0.98, "hp at ~0 Hz attenuated {freq} Hz to {gain}");
        }
    }

    #[test]
    fn test_lowpass_blocks_high_passes_dc() {
        let mut filter = BiquadTDF2::new(48000.0);
        filter.set_lowpass(500.0, std::f64::consts::FRAC_1_SQRT_2);
        for _ in 0..2000 {
            filter.process_sample(1.0);
        }
        assert!((filter.process_sample(1.0) - 1.0).abs() < 0.01);

        filter.reset();
        let gain = steady_sine_gain(&mut filter, 10000.0, 48000.0);
        assert!(gain < 0.01);
    }

    #[test]
    fn test_pathological_inputs_stay_finite() {
        let mut filter = BiquadTDF2::new(48000.0);
        for (freq, q) in [(0.0, 0.0), (-10.0, -1.0), (1.0e9, 1.0e9), (f64::NAN, f64::NAN)] {
            filter.set_peaking(freq, q, 12.0);
            filter.reset();
            for i in 0..256 {
                let out = filter.process_sample(if i == 0 { 1.0 } else { 0.0 });
                assert!(out.is_finite());
            }
        }
    }

    #[test]
    fn test_clear_keeps_coeffs() {
        let mut filter = BiquadTDF2::new(48000.0);
        filter.set_lowpass(1000.0, 0.707);
        let before = *filter.coeffs();
        for _ in 0..100 {
            filter.process_sample(1.0);
        }
        filter.clear();
        assert_eq!(before.b0, filter.coeffs().b0);
        assert_eq!(filter.process_sample(0.0), 0.0);
    }
}
