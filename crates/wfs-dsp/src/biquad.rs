//! C2: per-sample biquad / HF shelf with click-free coefficient changes (§4.2).
//!
//! The per-sample `process`/TDF-II state update is reused near-verbatim from
//! `rf_dsp::biquad::BiquadTDF2`. The coefficient-change ramp is new: the
//! teacher's plain biquad snaps coefficients instantly, which is fine for
//! offline use but clicks on a live routing-matrix update. Grounded on the
//! coefficient-smoothing idiom in `rf_dsp::smoothing::SmoothedParam`,
//! generalized from a single scalar to a 5-coefficient set by cross-fading
//! the *outputs* of the old and new coefficient sets rather than the
//! coefficients themselves (cheaper, and avoids transiently invalid filter
//! states partway through an interpolated coefficient).

use wfs_core::Sample;

/// Coefficient ramp length, in samples. §4.2: "ramped over a small number of
/// samples (<= 64)".
const RAMP_SAMPLES: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    pub const IDENTITY: Self = Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 };

    /// High/low shelf design at a fixed corner frequency, Robert
    /// Bristow-Johnson's cookbook shelf formula (same derivation the teacher
    /// uses for `BiquadCoeffs::low_shelf`/`high_shelf`).
    pub fn shelf(sample_rate: f64, frequency_hz: f64, gain_db: f64, is_high_shelf: bool) -> Self {
        let a = 10f64.powf(gain_db / 40.0);
        let omega = 2.0 * std::f64::consts::PI * frequency_hz / sample_rate;
        let cos_omega = omega.cos();
        let sin_omega = omega.sin();
        let s = 1.0; // shelf slope, fixed at 1 (maximally flat)
        let alpha = sin_omega / 2.0 * ((a + 1.0 / a) * (1.0 / s - 1.0) + 2.0).sqrt();
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let (b0, b1, b2, a0, a1, a2) = if is_high_shelf {
            (
                a * ((a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha),
                -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_omega),
                a * ((a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha),
                (a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha,
                2.0 * ((a - 1.0) - (a + 1.0) * cos_omega),
                (a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha,
            )
        } else {
            (
                a * ((a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha),
                2.0 * a * ((a - 1.0) - (a + 1.0) * cos_omega),
                a * ((a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha),
                (a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha,
                -2.0 * ((a - 1.0) + (a + 1.0) * cos_omega),
                (a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha,
            )
        };

        Self { b0: b0 / a0, b1: b1 / a0, b2: b2 / a0, a1: a1 / a0, a2: a2 / a0 }
    }
}

/// One IIR stage, Transposed Direct Form II, with a click-free coefficient
/// ramp (§4.2).
#[derive(Debug, Clone)]
pub struct Biquad {
    active: BiquadCoeffs,
    previous: BiquadCoeffs,
    z1_active: f64,
    z2_active: f64,
    z1_previous: f64,
    z2_previous: f64,
    ramp_position: u32,
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}

impl Biquad {
    pub fn new() -> Self {
        Self {
            active: BiquadCoeffs::IDENTITY,
            previous: BiquadCoeffs::IDENTITY,
            z1_active: 0.0,
            z2_active: 0.0,
            z1_previous: 0.0,
            z2_previous: 0.0,
            ramp_position: RAMP_SAMPLES,
        }
    }

    pub fn reset(&mut self) {
        self.z1_active = 0.0;
        self.z2_active = 0.0;
        self.z1_previous = 0.0;
        self.z2_previous = 0.0;
        self.ramp_position = RAMP_SAMPLES;
    }

    /// Commands new coefficients; the next `RAMP_SAMPLES` calls to
    /// `process` cross-fade between the old and new filtered outputs.
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        if coeffs == self.active {
            return;
        }
        self.previous = self.active;
        self.z1_previous = self.z1_active;
        self.z2_previous = self.z2_active;
        self.active = coeffs;
        self.ramp_position = 0;
    }

    #[inline]
    fn step(coeffs: &BiquadCoeffs, z1: &mut f64, z2: &mut f64, x: Sample) -> Sample {
        let y = coeffs.b0 * x + *z1;
        *z1 = coeffs.b1 * x - coeffs.a1 * y + *z2;
        *z2 = coeffs.b2 * x - coeffs.a2 * y;
        y
    }

    pub fn process(&mut self, x: Sample) -> Sample {
        let active_y = Self::step(&self.active, &mut self.z1_active, &mut self.z2_active, x);
        if self.ramp_position >= RAMP_SAMPLES {
            return active_y;
        }
        let previous_y = Self::step(&self.previous, &mut self.z1_previous, &mut self.z2_previous, x);
        let t = self.ramp_position as f64 / RAMP_SAMPLES as f64;
        self.ramp_position += 1;
        previous_y + t * (active_y - previous_y)
    }

    pub fn process_block(&mut self, block: &mut [Sample]) {
        for sample in block.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}

/// HF shelf convenience wrapper: a single "gain in dB" knob over a fixed
/// ~5 kHz high-shelf design (§4.2).
#[derive(Debug, Clone)]
pub struct HfShelf {
    biquad: Biquad,
    sample_rate: f64,
    frequency_hz: f64,
    gain_db: f64,
}

const HF_SHELF_FREQUENCY_HZ: f64 = 5_000.0;

impl HfShelf {
    pub fn new(sample_rate: f64) -> Self {
        let mut shelf = Self {
            biquad: Biquad::new(),
            sample_rate,
            frequency_hz: HF_SHELF_FREQUENCY_HZ,
            gain_db: 0.0,
        };
        shelf.set_gain_db(0.0);
        shelf
    }

    pub fn set_gain_db(&mut self, gain_db: f64) {
        if gain_db == self.gain_db {
            return;
        }
        self.gain_db = gain_db;
        let coeffs = BiquadCoeffs::shelf(self.sample_rate, self.frequency_hz, gain_db, true);
        self.biquad.set_coeffs(coeffs);
    }

    pub fn reset(&mut self) {
        self.biquad.reset();
    }

    #[inline]
    pub fn process(&mut self, x: Sample) -> Sample {
        self.biquad.process(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_coeffs_pass_signal_through() {
        let mut biquad = Biquad::new();
        // identity ramp is already complete at construction, no cross-fade.
        for &x in &[1.0, -0.5, 0.25, 0.0] {
            assert_relative_eq!(biquad.process(x), x, epsilon = 1e-12);
        }
    }

    #[test]
    fn coefficient_change_ramps_over_64_samples_then_locks_to_new_response() {
        let mut biquad = Biquad::new();
        // a simple scale-by-0.5 "filter" via a1=a2=0, b1=b2=0
        let half = BiquadCoeffs { b0: 0.5, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 };
        biquad.set_coeffs(half);

        let first = biquad.process(1.0);
        // first sample should be strictly between the old (1.0) and new (0.5) outputs.
        assert!(first > 0.5 && first < 1.0);

        for _ in 0..RAMP_SAMPLES {
            biquad.process(1.0);
        }
        let settled = biquad.process(1.0);
        assert_relative_eq!(settled, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn hf_shelf_zero_gain_is_near_transparent() {
        let mut shelf = HfShelf::new(48_000.0);
        let mut energy_in = 0.0;
        let mut energy_out = 0.0;
        for i in 0..256 {
            let x = (i as f64 * 0.1).sin();
            let y = shelf.process(x);
            energy_in += x * x;
            energy_out += y * y;
        }
        assert_relative_eq!(energy_in, energy_out, epsilon = 1.0);
    }

    #[test]
    fn hf_shelf_negative_gain_attenuates_high_frequency_tone() {
        let sample_rate = 48_000.0;
        let mut flat = HfShelf::new(sample_rate);
        let mut cut = HfShelf::new(sample_rate);
        cut.set_gain_db(-12.0);
        for _ in 0..512 {
            // burn in the ramp and filter transients.
            flat.process(0.0);
            cut.process(0.0);
        }

        let mut energy_flat = 0.0;
        let mut energy_cut = 0.0;
        for i in 0..2048 {
            let x = (2.0 * std::f64::consts::PI * 8_000.0 * i as f64 / sample_rate).sin();
            energy_flat += flat.process(x).powi(2);
            energy_cut += cut.process(x).powi(2);
        }
        assert!(energy_cut < energy_flat * 0.5);
    }

    #[test]
    fn reset_clears_state_and_ramp() {
        let mut biquad = Biquad::new();
        biquad.set_coeffs(BiquadCoeffs { b0: 0.5, b1: 0.1, b2: 0.0, a1: 0.2, a2: 0.0 });
        biquad.process(1.0);
        biquad.reset();
        assert_eq!(biquad.z1_active, 0.0);
        assert_eq!(biquad.z2_active, 0.0);
        assert!(biquad.ramp_position >= RAMP_SAMPLES);
    }
}
