//! C4: level detector — peak/RMS envelopes feeding a soft-knee compressor
//! (§4.4).
//!
//! Grounded directly on `original_source::LiveSourceLevelDetector`: the
//! peak/short-peak/RMS envelope structure and the soft-knee gain-reduction
//! formula are carried over bit-for-bit per the spec owner's explicit
//! instruction (see DESIGN.md). The circular-buffer running-sum idiom for
//! the RMS window is the same shape as `rf_dsp::metering::CorrelationMeter`'s
//! windowed accumulator, generalized from a correlation sum to a
//! sum-of-squares.

use std::sync::Arc;

use portable_atomic::{AtomicF64, Ordering};

use wfs_core::Sample;

const PEAK_RELEASE_SECONDS: f64 = 0.100;
const SHORT_PEAK_RELEASE_SECONDS: f64 = 0.005;
const RMS_WINDOW_DIVISOR: f64 = 5.0; // window length = sampleRate / 5 (~200 ms)
const GAIN_ATTACK_SECONDS: f64 = 0.002;
const GAIN_PEAK_RELEASE_SECONDS: f64 = 0.002;
const GAIN_SLOW_RELEASE_SECONDS: f64 = 0.020;

#[inline]
fn release_coeff(time_constant_seconds: f64, sample_rate: f64) -> f64 {
    (-1.0 / (time_constant_seconds * sample_rate)).exp()
}

/// Bit-for-bit port of `LiveSourceLevelDetector::calculateGainReduction`.
/// `ratio <= 1.0` is a no-op (pass-through); the knee is 20 dB wide, centred
/// on `threshold`. See DESIGN.md: flagged by the original author as a
/// candidate for replacement with a standard quadratic-knee formulation, but
/// reproduced verbatim here for calibration parity.
pub fn soft_knee_gain_reduction(level_db: f64, threshold_db: f64, ratio: f64) -> f64 {
    if ratio <= 1.0 {
        return 1.0;
    }
    if level_db > threshold_db + 10.0 {
        let gain_db = (threshold_db - level_db) * (ratio - 1.0) / ratio;
        10f64.powf(gain_db / 20.0)
    } else if level_db > threshold_db - 10.0 {
        let knee_position = level_db - threshold_db + 10.0;
        let knee_gain_db =
            (knee_position * (threshold_db + 10.0 - level_db * 20.0)) / (ratio * 20.0);
        10f64.powf(knee_gain_db / 20.0)
    } else {
        1.0
    }
}

struct RmsWindow {
    squares: Vec<Sample>,
    write_pos: usize,
    sum_of_squares: f64,
}

impl RmsWindow {
    fn new(window_len: usize) -> Self {
        Self { squares: vec![0.0; window_len.max(1)], write_pos: 0, sum_of_squares: 0.0 }
    }

    fn push(&mut self, x: Sample) -> f64 {
        let len = self.squares.len();
        let old = self.squares[self.write_pos];
        let new = x * x;
        self.sum_of_squares += new - old;
        self.squares[self.write_pos] = new;
        self.write_pos = (self.write_pos + 1) % len;
        (self.sum_of_squares.max(0.0) / len as f64).sqrt()
    }

    fn reset(&mut self) {
        self.squares.iter_mut().for_each(|s| *s = 0.0);
        self.write_pos = 0;
        self.sum_of_squares = 0.0;
    }
}

/// Per-sample gain-reduction thresholds and ratios for one input's Live
/// Source compressor (the peak path and slow/RMS path each have their own).
#[derive(Debug, Clone, Copy)]
pub struct CompressorParams {
    pub peak_threshold_db: f64,
    pub peak_ratio: f64,
    pub slow_threshold_db: f64,
    pub slow_ratio: f64,
}

impl Default for CompressorParams {
    /// Matches `LiveSourceParams`'s own defaults (-20 dB, 2:1) rather than
    /// the identity `ratio <= 1.0` early-out, so a freshly started worker
    /// measures real dynamics from its first block.
    fn default() -> Self {
        Self { peak_threshold_db: -20.0, peak_ratio: 2.0, slow_threshold_db: -20.0, slow_ratio: 2.0 }
    }
}

const SILENCE_FLOOR_DB: f64 = -120.0;

#[inline]
fn amplitude_to_db(amplitude: f64) -> f64 {
    if amplitude <= 0.0 {
        SILENCE_FLOOR_DB
    } else {
        20.0 * amplitude.log10()
    }
}

/// The atomic half of a [`LevelDetector`], cloneable and shareable with a
/// poller (C11) independently of the detector's owning worker thread (§4.11).
#[derive(Default)]
struct LevelPublish {
    peak_gr: AtomicF64,
    slow_gr: AtomicF64,
    peak_db: AtomicF64,
    rms_db: AtomicF64,
    short_peak_db: AtomicF64,
}

impl LevelPublish {
    fn new() -> Self {
        Self {
            peak_gr: AtomicF64::new(1.0),
            slow_gr: AtomicF64::new(1.0),
            peak_db: AtomicF64::new(SILENCE_FLOOR_DB),
            rms_db: AtomicF64::new(SILENCE_FLOOR_DB),
            short_peak_db: AtomicF64::new(SILENCE_FLOOR_DB),
        }
    }
}

/// Read-only handle to a [`LevelDetector`]'s published snapshot, retained by
/// C11 across the lifetime of the worker that owns the detector itself.
#[derive(Clone)]
pub struct LevelHandle {
    publish: Arc<LevelPublish>,
}

impl LevelHandle {
    /// Advisory `{peakDb, rmsDb}` pair (§4.11).
    #[inline]
    pub fn level_db(&self) -> (f64, f64) {
        (self.publish.peak_db.load(Ordering::Relaxed), self.publish.rms_db.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn peak_gr(&self) -> f64 {
        self.publish.peak_gr.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn slow_gr(&self) -> f64 {
        self.publish.slow_gr.load(Ordering::Relaxed)
    }

    /// The 5 ms-release peak envelope in dB, published for automotion
    /// trigger evaluation at control rate (§3 `AutomotionTrigger`).
    #[inline]
    pub fn short_peak_db(&self) -> f64 {
        self.publish.short_peak_db.load(Ordering::Relaxed)
    }
}

pub struct LevelDetector {
    peak_envelope: f64,
    short_peak_envelope: f64,
    peak_release_coeff: f64,
    short_peak_release_coeff: f64,
    rms_window: RmsWindow,
    smoothed_peak_gr: f64,
    smoothed_slow_gr: f64,
    gain_attack_coeff: f64,
    gain_peak_release_coeff: f64,
    gain_slow_release_coeff: f64,
    publish: Arc<LevelPublish>,
}

impl LevelDetector {
    pub fn new(sample_rate: f64) -> Self {
        let rms_window_len = (sample_rate / RMS_WINDOW_DIVISOR).round().max(1.0) as usize;
        Self {
            peak_envelope: 0.0,
            short_peak_envelope: 0.0,
            peak_release_coeff: release_coeff(PEAK_RELEASE_SECONDS, sample_rate),
            short_peak_release_coeff: release_coeff(SHORT_PEAK_RELEASE_SECONDS, sample_rate),
            rms_window: RmsWindow::new(rms_window_len),
            smoothed_peak_gr: 1.0,
            smoothed_slow_gr: 1.0,
            gain_attack_coeff: release_coeff(GAIN_ATTACK_SECONDS, sample_rate),
            gain_peak_release_coeff: release_coeff(GAIN_PEAK_RELEASE_SECONDS, sample_rate),
            gain_slow_release_coeff: release_coeff(GAIN_SLOW_RELEASE_SECONDS, sample_rate),
            publish: Arc::new(LevelPublish::new()),
        }
    }

    /// A cloneable, `Send + Sync` read handle onto this detector's published
    /// snapshot, independent of the detector's own lifetime.
    pub fn handle(&self) -> LevelHandle {
        LevelHandle { publish: self.publish.clone() }
    }

    pub fn reset(&mut self) {
        self.peak_envelope = 0.0;
        self.short_peak_envelope = 0.0;
        self.rms_window.reset();
        self.smoothed_peak_gr = 1.0;
        self.smoothed_slow_gr = 1.0;
        self.publish.peak_gr.store(1.0, Ordering::Relaxed);
        self.publish.slow_gr.store(1.0, Ordering::Relaxed);
        self.publish.peak_db.store(SILENCE_FLOOR_DB, Ordering::Relaxed);
        self.publish.rms_db.store(SILENCE_FLOOR_DB, Ordering::Relaxed);
        self.publish.short_peak_db.store(SILENCE_FLOOR_DB, Ordering::Relaxed);
    }

    /// The short-peak envelope (5 ms release), exposed for automotion
    /// trigger evaluation (§3 `AutomotionTrigger`).
    #[inline]
    pub fn short_peak_envelope(&self) -> f64 {
        self.short_peak_envelope
    }

    /// Advances the detector by one sample and returns `(peak_gr, slow_gr)`,
    /// the smoothed linear gain-reduction factors. Also publishes both to
    /// the atomic snapshot readable via [`Self::peak_gr`]/[`Self::slow_gr`].
    pub fn process(&mut self, x: Sample, params: &CompressorParams) -> (f64, f64) {
        let abs_x = x.abs();

        self.peak_envelope = if abs_x > self.peak_envelope {
            abs_x
        } else {
            self.peak_envelope * self.peak_release_coeff
        };
        self.short_peak_envelope = if abs_x > self.short_peak_envelope {
            abs_x
        } else {
            self.short_peak_envelope * self.short_peak_release_coeff
        };

        let rms = self.rms_window.push(x);

        let peak_db = amplitude_to_db(self.peak_envelope);
        let rms_db = amplitude_to_db(rms);

        let target_peak_gr =
            soft_knee_gain_reduction(peak_db, params.peak_threshold_db, params.peak_ratio);
        let target_slow_gr =
            soft_knee_gain_reduction(rms_db, params.slow_threshold_db, params.slow_ratio);

        self.smoothed_peak_gr = smooth_toward(
            self.smoothed_peak_gr,
            target_peak_gr,
            self.gain_attack_coeff,
            self.gain_peak_release_coeff,
        );
        self.smoothed_slow_gr = smooth_toward(
            self.smoothed_slow_gr,
            target_slow_gr,
            self.gain_attack_coeff,
            self.gain_slow_release_coeff,
        );

        self.publish.peak_gr.store(self.smoothed_peak_gr, Ordering::Relaxed);
        self.publish.slow_gr.store(self.smoothed_slow_gr, Ordering::Relaxed);
        self.publish.peak_db.store(peak_db, Ordering::Relaxed);
        self.publish.rms_db.store(rms_db, Ordering::Relaxed);
        self.publish
            .short_peak_db
            .store(amplitude_to_db(self.short_peak_envelope), Ordering::Relaxed);

        (self.smoothed_peak_gr, self.smoothed_slow_gr)
    }

    /// Advisory `{peakDb, rmsDb}` pair, read by C11 at ~20 Hz (§4.11).
    #[inline]
    pub fn level_db(&self) -> (f64, f64) {
        (self.publish.peak_db.load(Ordering::Relaxed), self.publish.rms_db.load(Ordering::Relaxed))
    }

    /// Advisory snapshot of the last published peak gain-reduction; not
    /// synchronised with `process` (§4.4: "advisory hints, not
    /// synchronisation").
    #[inline]
    pub fn peak_gr(&self) -> f64 {
        self.publish.peak_gr.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn slow_gr(&self) -> f64 {
        self.publish.slow_gr.load(Ordering::Relaxed)
    }
}

/// One-pole smoother with separate attack (gain decreasing, i.e. more
/// reduction) and release (gain increasing back toward 1.0) coefficients.
#[inline]
fn smooth_toward(current: f64, target: f64, attack_coeff: f64, release_coeff: f64) -> f64 {
    let coeff = if target < current { attack_coeff } else { release_coeff };
    target + coeff * (current - target)
}
