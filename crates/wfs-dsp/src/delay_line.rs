//! C3: fractional delay line with per-sample delay smoothing (§4.3).
//!
//! Circular-buffer structure and `write_pos` bookkeeping generalized from
//! `rf_dsp::delay_compensation::DelayLine` (integer-sample delay only) to a
//! fractional read position with linear interpolation, plus a one-pole
//! smoother on the *commanded* delay itself (not just the signal) so a
//! block-rate delay change doesn't produce zipper noise.

use wfs_core::Sample;

/// Time constant for commanded-delay smoothing (§4.3 / C3 data model): ~20 ms.
const DELAY_SMOOTHING_TIME_CONSTANT_SECONDS: f64 = 0.02;

#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<Sample>,
    write_pos: usize,
    commanded_delay_samples: f64,
    smoothed_delay_samples: f64,
    smoothing_coeff: f64,
    max_delay_samples: f64,
}

impl DelayLine {
    /// `max_delay_seconds` and `max_block_size` size the circular buffer per
    /// §4.3: `max(1, ceil(maxDelaySeconds * sampleRate)) + maxBlockSize`.
    pub fn new(sample_rate: f64, max_delay_seconds: f64, max_block_size: usize) -> Self {
        let max_delay_samples_capacity =
            (max_delay_seconds * sample_rate).ceil().max(1.0) as usize;
        let capacity = max_delay_samples_capacity + max_block_size;
        let smoothing_coeff =
            (-1.0 / (DELAY_SMOOTHING_TIME_CONSTANT_SECONDS * sample_rate)).exp();
        Self {
            buffer: vec![0.0; capacity],
            write_pos: 0,
            commanded_delay_samples: 0.0,
            smoothed_delay_samples: 0.0,
            smoothing_coeff,
            max_delay_samples: (capacity.max(1) - 1) as f64,
        }
    }

    pub fn reset(&mut self) {
        self.buffer.iter_mut().for_each(|s| *s = 0.0);
        self.write_pos = 0;
        self.smoothed_delay_samples = self.commanded_delay_samples;
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Commands a new target delay, in samples. Clamped to `[0, capacity-1]`
    /// per §4.3; the actual read position moves toward this over time via
    /// the one-pole smoother applied per sample in `process`.
    pub fn set_delay_samples(&mut self, delay_samples: f64) {
        self.commanded_delay_samples = delay_samples.clamp(0.0, self.max_delay_samples);
    }

    /// Writes one input sample and returns the delayed, interpolated output.
    pub fn process(&mut self, x: Sample) -> Sample {
        let capacity = self.buffer.len();
        self.buffer[self.write_pos] = x;

        self.smoothed_delay_samples = self.commanded_delay_samples
            + self.smoothing_coeff * (self.smoothed_delay_samples - self.commanded_delay_samples);

        let read_pos_f = self.write_pos as f64 - self.smoothed_delay_samples;
        let read_pos_wrapped = ((read_pos_f % capacity as f64) + capacity as f64) % capacity as f64;
        let index_a = read_pos_wrapped.floor() as usize % capacity;
        let frac = read_pos_wrapped - read_pos_wrapped.floor();
        let index_b = (index_a + 1) % capacity;

        let output = self.buffer[index_a] * (1.0 - frac) + self.buffer[index_b] * frac;

        self.write_pos = (self.write_pos + 1) % capacity;
        output
    }

    pub fn process_block(&mut self, block: &mut [Sample]) {
        for sample in block.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}
