//! Sample types shared by every DSP stage.

/// A single audio sample. f64 throughout: the calculation engine accumulates
/// sub-sample delay offsets over hundreds of speakers and inputs, and the
/// extra precision keeps the coefficient interpolation in C2/C3 well away
/// from quantization noise.
pub type Sample = f64;

/// Non-interleaved planar audio buffer, one `Vec<Sample>` per channel.
#[derive(Debug, Clone)]
pub struct PlanarBuffer {
    channels: Vec<Vec<Sample>>,
}

impl PlanarBuffer {
    pub fn new(num_channels: usize, num_samples: usize) -> Self {
        Self {
            channels: (0..num_channels).map(|_| vec![0.0; num_samples]).collect(),
        }
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn num_samples(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &[Sample] {
        &self.channels[index]
    }

    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [Sample] {
        &mut self.channels[index]
    }

    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.fill(0.0);
        }
    }

    /// Resize in place (only legal outside the audio callback — see §3 lifecycle rules).
    pub fn resize(&mut self, num_channels: usize, num_samples: usize) {
        self.channels.resize_with(num_channels, || vec![0.0; num_samples]);
        for channel in &mut self.channels {
            channel.resize(num_samples, 0.0);
        }
    }
}

/// Clamp a DSP output to a finite value, containing NaN/Inf per §7.
#[inline]
pub fn contain_nonfinite(x: Sample) -> Sample {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}
