//! Circular delay line
//!
//! Fixed capacity, one write per sample. Reads are clamped to the capacity
//! so a mis-set delay time can never wrap into samples that have not been
//! written yet.

use aria_core::Sample;

use crate::Processor;

/// Fixed-capacity circular delay buffer
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<Sample>,
    write_pos: usize,
}

impl DelayLine {
    /// Capacity is the maximum usable delay in samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(2)],
            write_pos: 0,
        }
    }

    pub fn with_max_time(sample_rate: f64, max_seconds: f64) -> Self {
        Self::new((max_seconds * sample_rate).ceil() as usize + 1)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Write one sample and advance the cursor by exactly one position.
    #[inline(always)]
    pub fn write(&mut self, sample: Sample) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    /// Read `delay_samples` behind the write cursor (floor, no interpolation).
    ///
    /// A delay of 0 returns the most recently written sample.
    #[inline(always)]
    pub fn read(&self, delay_samples: usize) -> Sample {
        let len = self.buffer.len();
        let delay = delay_samples.min(len - 1) + 1;
        self.buffer[(self.write_pos + len - delay) % len]
    }

    /// Fractional-delay read with linear interpolation between the two
    /// nearest integer taps. For integer delays this equals `read()`.
    #[inline(always)]
    pub fn read_interpolated(&self, delay_samples: f64) -> Sample {
        let max = (self.buffer.len() - 2) as f64;
        let delay = delay_samples.clamp(0.0, max);
        let whole = delay.floor();
        let frac = delay - whole;
        let a = self.read(whole as usize);
        let b = self.read(whole as usize + 1);
        a + frac * (b - a)
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

impl Processor for DelayLine {
    fn reset(&mut self) {
        self.clear();
    }
}
