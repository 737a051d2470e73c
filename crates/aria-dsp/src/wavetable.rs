//! Morphing wavetable bank
//!
//! A bank is an ordered list of fixed-size single-cycle tables, each built
//! from a harmonic recipe. `sample()` interpolates bilinearly across both
//! the phase axis and the table-position axis, which is what makes smooth
//! morphing between adjacent recipes possible.

use std::f64::consts::PI;

use aria_core::Sample;

/// Samples per single-cycle table
pub const TABLE_SIZE: usize = 2048;

const TWO_PI: f64 = 2.0 * PI;

/// Recipe for one table in a bank
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TableRecipe {
    Sine,
    Triangle,
    /// Band-limited additive sawtooth
    Saw,
    /// Band-limited additive square
    Square,
    /// Pulse built from two offset saws; width in (0, 1)
    Pwm(f64),
    /// Vowel-like spectrum with bumps at the given harmonic numbers
    Formant(f64, f64),
    /// Sine quantized to the given bit depth
    Digital(u32),
    /// Odd harmonics with 1/k^2 rolloff (hollow, organ-like)
    Additive,
}

const TABLE_HARMONICS: usize = 64;

fn additive_saw(phase: f64) -> f64 {
    let mut sum = 0.0;
    for k in 1..=TABLE_HARMONICS {
        sum += (TWO_PI * phase * k as f64).sin() / k as f64;
    }
    sum * (2.0 / PI)
}

fn generate(recipe: TableRecipe) -> Vec<Sample> {
    (0..TABLE_SIZE)
        .map(|i| {
            let phase = i as f64 / TABLE_SIZE as f64;
            match recipe {
                TableRecipe::Sine => (TWO_PI * phase).sin(),
                TableRecipe::Triangle => {
                    if phase < 0.5 {
                        4.0 * phase - 1.0
                    } else {
                        3.0 - 4.0 * phase
                    }
                }
                TableRecipe::Saw => additive_saw(phase),
                TableRecipe::Square => {
                    let mut sum = 0.0;
                    let mut k = 1;
                    while k <= TABLE_HARMONICS {
                        sum += (TWO_PI * phase * k as f64).sin() / k as f64;
                        k += 2;
                    }
                    sum * (4.0 / PI)
                }
                TableRecipe::Pwm(width) => {
                    let width = width.clamp(0.05, 0.95);
                    additive_saw(phase) - additive_saw((phase + width).rem_euclid(1.0))
                }
                TableRecipe::Formant(f1, f2) => {
                    let mut sum = 0.0;
                    for k in 1..=TABLE_HARMONICS {
                        let h = k as f64;
                        let bump1 = (-((h - f1) * (h - f1)) / 8.0).exp();
                        let bump2 = 0.7 * (-((h - f2) * (h - f2)) / 18.0).exp();
                        sum += (bump1 + bump2) * (TWO_PI * phase * h).sin() / h.sqrt();
                    }
                    sum * 0.5
                }
                TableRecipe::Digital(bits) => {
                    let levels = 2.0_f64.powi(bits.clamp(2, 12) as i32);
                    ((TWO_PI * phase).sin() * levels).round() / levels
                }
                TableRecipe::Additive => {
                    let mut sum = 0.0;
                    let mut k = 1;
                    while k <= TABLE_HARMONICS {
                        let h = k as f64;
                        sum += (TWO_PI * phase * h).sin() / (h * h);
                        k += 2;
                    }
                    sum * (8.0 / (PI * PI))
                }
            }
        })
        .collect()
}

/// Bank of single-cycle tables with bilinear morphing
#[derive(Debug, Clone)]
pub struct Wavetable {
    tables: Vec<Vec<Sample>>,
}

impl Wavetable {
    pub fn from_recipes(recipes: &[TableRecipe]) -> Self {
        debug_assert!(!recipes.is_empty());
        log::debug!("generating wavetable bank: {} tables", recipes.len());
        Self {
            tables: recipes.iter().map(|&r| generate(r)).collect(),
        }
    }

    /// The default morph bank: sine → triangle → saw → square → PWM →
    /// formant → digital → additive.
    pub fn standard_bank() -> Self {
        Self::from_recipes(&[
            TableRecipe::Sine,
            TableRecipe::Triangle,
            TableRecipe::Saw,
            TableRecipe::Square,
            TableRecipe::Pwm(0.25),
            TableRecipe::Formant(3.0, 9.0),
            TableRecipe::Digital(4),
            TableRecipe::Additive,
        ])
    }

    pub fn num_tables(&self) -> usize {
        self.tables.len()
    }

    #[inline]
    fn read_table(&self, index: usize, phase: f64) -> Sample {
        let table = &self.tables[index];
        let pos = phase.rem_euclid(1.0) * TABLE_SIZE as f64;
        let i0 = pos as usize % TABLE_SIZE;
        let i1 = (i0 + 1) % TABLE_SIZE;
        let frac = pos - pos.floor();
        table[i0] + frac * (table[i1] - table[i0])
    }

    /// Bilinear lookup: linear across phase within each table, linear
    /// across `position` (0..1 spanning the whole bank) between tables.
    #[inline]
    pub fn sample(&self, phase: f64, position: f64) -> Sample {
        let last = (self.tables.len() - 1) as f64;
        let pos = position.clamp(0.0, 1.0) * last;
        let t0 = pos as usize;
        let t1 = (t0 + 1).min(self.tables.len() - 1);
        let frac = pos - t0 as f64;
        let a = self.read_table(t0, phase);
        let b = self.read_table(t1, phase);
        a + frac * (b - a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_endpoints_hit_exact_tables() {
        let bank = Wavetable::standard_bank();
        // Position 0 is the pure sine table.
        let v = bank.sample(0.25, 0.0);
        assert!((v - 1.0).abs() < 1e-3);
        // All tables are bounded single cycles.
        for i in 0..64 {
            let phase = i as f64 / 64.0;
            for j in 0..=8 {
                assert!(bank.sample(phase, j as f64 / 8.0).abs() < 1.6);
            }
        }
    }

    #[test]
    fn test_morph_is_between_neighbors() {
        let bank = Wavetable::from_recipes(&[TableRecipe::Sine, TableRecipe::Saw]);
        for i in 0..32 {
            let phase = i as f64 / 32.0;
            let a = bank.sample(phase, 0.0);
            let b = bank.sample(phase, 1.0);
            let mid = bank.sample(phase, 0.5);
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            assert!(mid >= lo - 1e-9 && mid <= hi + 1e-9);
        }
    }

    #[test]
    fn test_phase_wraps() {
        let bank = Wavetable::from_recipes(&[TableRecipe::Triangle]);
        assert!((bank.sample(0.3, 0.0) - bank.sample(1.3, 0.0)).abs() < 1e-9);
    }

    #[test]
    fn test_tables_are_zero_mean() {
        let bank = Wavetable::standard_bank();
        for t in 0..bank.num_tables() {
            let mean: f64 = (0..TABLE_SIZE)
                .map(|i| bank.read_table(t, i as f64 / TABLE_SIZE as f64))
                .sum::<f64>()
                / TABLE_SIZE as f64;
            assert!(mean.abs() < 0.02, "table {t} has DC {mean}");
        }
    }
}
