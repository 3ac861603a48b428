//! C7: Live-Source Tamer — per-(input,output) dynamics-driven gain array
//! (§4.7).
//!
//! Grounded directly on `original_source::LiveSourceTamerEngine`: the
//! input-major cell layout, the ramp-in-progress-space (not gain-space)
//! semantics, and the four shape-factor curves are all carried over.

use wfs_core::{InputObject, LsShape, OutputSpeaker, Position};

/// Ramp increment per control tick: 1/25 at 50 Hz = 500 ms full ramp (§4.7,
/// resolved in SPEC_FULL §3).
const RAMP_INCREMENT: f64 = 1.0 / 25.0;

#[inline]
fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

fn shape_factor(shape: LsShape, t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    match shape {
        LsShape::Linear => 1.0 - t,
        LsShape::Log => 1.0 - (1.0 + 9.0 * t).log10(),
        LsShape::Square => 1.0 - t * t,
        LsShape::Sine => (1.0 + (std::f64::consts::PI * t).cos()) / 2.0,
    }
}

/// Dense input-major `N x M` gain-multiplier array, folded into C6's cell
/// gain by multiplication (§4.7).
pub struct LiveSourceTamer {
    num_inputs: usize,
    num_outputs: usize,
    cells: Vec<f64>,
    ramp_progress: Vec<f64>,
}

impl LiveSourceTamer {
    pub fn new(num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            num_inputs,
            num_outputs,
            cells: vec![1.0; num_inputs * num_outputs],
            ramp_progress: vec![0.0; num_inputs],
        }
    }

    #[inline]
    pub fn cell(&self, input: usize, output: usize) -> f64 {
        self.cells[input * self.num_outputs + output]
    }

    /// Recomputes the whole array for one control tick. `peak_gr`/`slow_gr`
    /// are the per-input smoothed compressor outputs from C4.
    #[tracing::instrument(skip_all, fields(num_inputs = self.num_inputs, num_outputs = self.num_outputs))]
    pub fn tick(
        &mut self,
        inputs: &[InputObject],
        input_positions: &[Position],
        outputs: &[OutputSpeaker],
        peak_gr: &[f64],
        slow_gr: &[f64],
    ) {
        for i in 0..self.num_inputs {
            let input = &inputs[i];
            let target_ramp = if input.live_source.active { 1.0 } else { 0.0 };
            let ramp = &mut self.ramp_progress[i];
            if *ramp < target_ramp {
                *ramp = (*ramp + RAMP_INCREMENT).min(target_ramp);
            } else if *ramp > target_ramp {
                *ramp = (*ramp - RAMP_INCREMENT).max(target_ramp);
            }
            let ramp = *ramp;

            let fixed_atten_linear = db_to_linear(input.live_source.fixed_attenuation_db);
            let combined = fixed_atten_linear * peak_gr[i] * slow_gr[i];

            for j in 0..self.num_outputs {
                let idx = i * self.num_outputs + j;
                if !outputs[j].live_source_enable || input.live_source.radius <= 0.0 {
                    self.cells[idx] = 1.0;
                    continue;
                }

                let distance = input_positions[i].distance_to(&outputs[j].position);
                let normalized_distance = distance / input.live_source.radius;
                if normalized_distance >= 1.0 {
                    self.cells[idx] = 1.0;
                    continue;
                }

                let shape = shape_factor(input.live_source.shape, normalized_distance);
                let target_cell = 1.0 - shape * (1.0 - combined);
                self.cells[idx] = 1.0 + ramp * (target_cell - 1.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use wfs_core::LsShape;

    fn setup(live_source_active: bool, radius: f64) -> (Vec<InputObject>, Vec<Position>, Vec<OutputSpeaker>) {
        let mut input = InputObject::new(1);
        input.live_source.active = live_source_active;
        input.live_source.radius = radius;
        input.live_source.shape = LsShape::Linear;
        input.live_source.fixed_attenuation_db = -6.0;
        (vec![input], vec![Position::ORIGIN], vec![OutputSpeaker::default()])
    }

    #[test]
    fn every_shape_curve_runs_from_one_at_zero_to_zero_at_one() {
        for shape in [LsShape::Linear, LsShape::Log, LsShape::Square, LsShape::Sine] {
            assert_relative_eq!(shape_factor(shape, 0.0), 1.0, epsilon = 1e-9);
            assert_relative_eq!(shape_factor(shape, 1.0), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn distance_beyond_radius_is_unity_regardless_of_ramp() {
        let (inputs, positions, mut outputs) = setup(true, 2.0);
        outputs[0].position = Position::new(0.0, 5.0, 0.0);
        let mut tamer = LiveSourceTamer::new(1, 1);
        for _ in 0..30 {
            tamer.tick(&inputs, &positions, &outputs, &[1.0], &[1.0]);
        }
        assert_relative_eq!(tamer.cell(0, 0), 1.0);
    }

    #[test]
    fn ramp_takes_exactly_25_ticks_to_reach_full_effect() {
        let (inputs, positions, mut outputs) = setup(true, 2.0);
        outputs[0].position = Position::new(0.0, 0.0, 0.0);
        let mut tamer = LiveSourceTamer::new(1, 1);
        // distance 0 -> normalized_distance 0 -> shape = 1 -> target = combined
        for tick in 1..=25 {
            tamer.tick(&inputs, &positions, &outputs, &[0.5], &[0.5]);
            let expected_ramp = (tick as f64 / 25.0).min(1.0);
            let fixed = db_to_linear(-6.0);
            let combined = fixed * 0.5 * 0.5;
            let expected_cell = 1.0 + expected_ramp * (combined - 1.0);
            assert_relative_eq!(tamer.cell(0, 0), expected_cell, epsilon = 1e-9);
        }
    }

    #[test]
    fn matches_the_closed_form_multiplier_with_dynamics_bypassed() {
        let (inputs, positions, mut outputs) = setup(true, 2.0);
        outputs[0].position = Position::new(1.0, 0.0, 0.0);
        let mut tamer = LiveSourceTamer::new(1, 1);
        for _ in 0..25 {
            tamer.tick(&inputs, &positions, &outputs, &[1.0], &[1.0]);
        }
        let expected = 1.0 - 0.5 * (1.0 - 10f64.powf(-0.3));
        assert_relative_eq!(tamer.cell(0, 0), expected, epsilon = 1e-6);
        assert_relative_eq!(tamer.cell(0, 0), 0.7506, epsilon = 1e-4);
    }

    #[test]
    fn disabling_output_live_source_forces_unity() {
        let (inputs, positions, mut outputs) = setup(true, 2.0);
        outputs[0].live_source_enable = false;
        let mut tamer = LiveSourceTamer::new(1, 1);
        tamer.tick(&inputs, &positions, &outputs, &[0.1], &[0.1]);
        assert_relative_eq!(tamer.cell(0, 0), 1.0);
    }

    #[test]
    fn ramp_releases_back_toward_unity_when_deactivated() {
        let (mut inputs, positions, outputs) = setup(true, 2.0);
        let mut tamer = LiveSourceTamer::new(1, 1);
        for _ in 0..25 {
            tamer.tick(&inputs, &positions, &outputs, &[0.2], &[0.2]);
        }
        let engaged = tamer.cell(0, 0);
        assert!(engaged < 1.0);

        inputs[0].live_source.active = false;
        for _ in 0..25 {
            tamer.tick(&inputs, &positions, &outputs, &[0.2], &[0.2]);
        }
        assert_relative_eq!(tamer.cell(0, 0), 1.0, epsilon = 1e-9);
    }
}
