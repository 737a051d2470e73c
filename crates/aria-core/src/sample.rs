//! Sample type and level conversion helpers

/// Type alias for audio samples (always f64 for maximum precision)
pub type Sample = f64;

/// Stereo sample pair
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    #[inline]
    pub const fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    #[inline]
    pub const fn mono(value: Sample) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    #[inline]
    pub fn to_mid_side(self) -> MidSideSample {
        MidSideSample {
            mid: (self.left + self.right) * 0.5,
            side: (self.left - self.right) * 0.5,
        }
    }
}

/// Mid/Side sample pair
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct MidSideSample {
    pub mid: Sample,
    pub side: Sample,
}

impl MidSideSample {
    #[inline]
    pub fn to_stereo(self) -> StereoSample {
        StereoSample {
            left: self.mid + self.side,
            right: self.mid - self.side,
        }
    }
}

/// Convert decibels to linear gain
#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert linear gain to decibels (floored at -120 dB)
#[inline]
pub fn linear_to_db(linear: f64) -> f64 {
    if linear > 1e-6 {
        20.0 * linear.log10()
    } else {
        -120.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_db_roundtrip() {
        for db in [-60.0, -12.0, -3.0, 0.0, 6.0] {
            assert_relative_eq!(linear_to_db(db_to_linear(db)), db, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_mid_side_roundtrip() {
        let s = StereoSample::new(0.7, -0.3);
        let back = s.to_mid_side().to_stereo();
        assert_relative_eq!(back.left, s.left, epsilon = 1e-12);
        assert_relative_eq!(back.right, s.right, epsilon = 1e-12);
    }

    #[test]
    fn test_db_floor() {
        assert_eq!(linear_to_db(0.0), -120.0);
    }
}
