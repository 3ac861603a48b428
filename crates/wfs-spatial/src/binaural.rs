//! C8: binaural virtual-speaker stereo preview engine (§4.8).
//!
//! Grounded directly on `original_source::BinauralCalculationEngine`: the
//! 0.20 m virtual-speaker spacing, the +-45 deg speaker angle, the 135/30
//! degree keystone coverage, the -0.3 dB/m HF shelf, and the
//! distance-proportional (not WFS-compensated) delay are all carried over
//! as constants. The keystone math reuses [`crate::calculation_engine::keystone_attenuation`].

use wfs_core::{InputObject, Position, SPEED_OF_SOUND_MPS};

use crate::calculation_engine::keystone_attenuation;

/// Half the 0.20 m virtual-speaker spacing (§4.8, resolved in SPEC_FULL §3).
const VIRTUAL_SPEAKER_HALF_SPACING_METERS: f64 = 0.10;
/// Virtual speaker angle off listener-forward.
const VIRTUAL_SPEAKER_ANGLE_DEG: f64 = 45.0;
const BINAURAL_ON_ANGLE_DEG: f64 = 135.0;
const BINAURAL_OFF_ANGLE_DEG: f64 = 30.0;
const BINAURAL_HF_SHELF_PER_METER: f64 = -0.3;
/// Distance law reference: attenuation only applies beyond 1 m.
const BINAURAL_DISTANCE_REFERENCE_METERS: f64 = 1.0;
/// dB per doubling of distance past the reference.
const BINAURAL_DB_PER_DOUBLING: f64 = -6.0;
pub const LISTENER_EAR_HEIGHT_METERS: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ear {
    Left,
    Right,
}

/// Listener pose in the stage frame: polar position (distance, angle from
/// stage-forward) plus a facing direction back toward stage origin.
#[derive(Debug, Clone, Copy)]
pub struct Listener {
    pub distance: f64,
    pub angle_deg: f64,
}

impl Listener {
    /// World-space listener head position, at ear height, `distance` metres
    /// from stage origin along `angle_deg`.
    pub fn head_position(&self) -> Position {
        let angle = self.angle_deg.to_radians();
        Position::new(
            self.distance * angle.sin(),
            -self.distance * angle.cos(),
            LISTENER_EAR_HEIGHT_METERS,
        )
    }

    /// Unit vector from the listener toward stage origin.
    fn forward(&self) -> Position {
        self.head_position()
            .direction_to(&Position::new(0.0, 0.0, LISTENER_EAR_HEIGHT_METERS))
            .unwrap_or(Position::new(0.0, 1.0, 0.0))
    }

    /// Unit "right" vector, perpendicular to forward in the horizontal plane.
    fn right(&self) -> Position {
        let f = self.forward();
        Position::new(f.y, -f.x, 0.0)
    }

    /// Position of the virtual speaker representing one ear.
    pub fn virtual_speaker_position(&self, ear: Ear) -> Position {
        let sign = match ear {
            Ear::Left => -1.0,
            Ear::Right => 1.0,
        };
        let right = self.right();
        self.head_position().add(&right.scale(sign * VIRTUAL_SPEAKER_HALF_SPACING_METERS))
    }

    /// Facing axis of the virtual speaker: the listener's forward direction
    /// rotated +-45 deg (about the vertical axis) toward the matching ear.
    fn virtual_speaker_facing(&self, ear: Ear) -> Position {
        let sign = match ear {
            Ear::Left => -1.0,
            Ear::Right => 1.0,
        };
        let forward = self.forward();
        let right = self.right();
        let angle = (sign * VIRTUAL_SPEAKER_ANGLE_DEG).to_radians();
        forward.scale(angle.cos()).add(&right.scale(angle.sin()))
    }
}

/// Per-virtual-speaker render parameters for one input (§4.8).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinauralGeometry {
    pub delay_seconds: f64,
    pub level_linear: f64,
    pub hf_shelf_db: f64,
}

/// Computes both virtual-speaker geometries for one input position.
pub fn calculate_binaural_geometry(
    listener: &Listener,
    input_position: Position,
) -> [BinauralGeometry; 2] {
    [Ear::Left, Ear::Right].map(|ear| {
        let speaker_position = listener.virtual_speaker_position(ear);
        let facing = listener.virtual_speaker_facing(ear);
        let distance = speaker_position.distance_to(&input_position).max(0.01);

        let delay_seconds = distance / SPEED_OF_SOUND_MPS;

        let angle = facing
            .dot(&speaker_position.direction_to(&input_position).unwrap_or(facing))
            .clamp(-1.0, 1.0)
            .acos();
        let keystone = keystone_attenuation(angle, BINAURAL_ON_ANGLE_DEG, BINAURAL_OFF_ANGLE_DEG);

        let distance_atten_db = if distance > BINAURAL_DISTANCE_REFERENCE_METERS {
            BINAURAL_DB_PER_DOUBLING * (distance / BINAURAL_DISTANCE_REFERENCE_METERS).log2()
        } else {
            0.0
        };
        let distance_atten_linear = 10f64.powf(distance_atten_db / 20.0);

        let hf_shelf_db = distance * BINAURAL_HF_SHELF_PER_METER;

        BinauralGeometry {
            delay_seconds,
            level_linear: keystone * distance_atten_linear,
            hf_shelf_db,
        }
    })
}

/// Solo semantics (§4.8): if any input is soloed, only soloed inputs
/// contribute; otherwise all inputs contribute (full-mix preview).
pub fn active_input_indices(inputs: &[InputObject]) -> Vec<usize> {
    let soloed: Vec<usize> = inputs
        .iter()
        .enumerate()
        .filter(|(_, input)| input.solo)
        .map(|(index, _)| index)
        .collect();
    if soloed.is_empty() {
        (0..inputs.len()).collect()
    } else {
        soloed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn virtual_speakers_are_half_spacing_apart() {
        let listener = Listener { distance: 2.0, angle_deg: 0.0 };
        let left = listener.virtual_speaker_position(Ear::Left);
        let right = listener.virtual_speaker_position(Ear::Right);
        let separation = left.distance_to(&right);
        assert_relative_eq!(separation, VIRTUAL_SPEAKER_HALF_SPACING_METERS * 2.0, epsilon = 1e-9);
    }

    #[test]
    fn distance_within_reference_has_no_attenuation() {
        let listener = Listener { distance: 0.0, angle_deg: 0.0 };
        let geometry = calculate_binaural_geometry(&listener, Position::new(0.0, 0.5, LISTENER_EAR_HEIGHT_METERS));
        for ear_geometry in geometry {
            assert!(ear_geometry.level_linear <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn doubling_distance_past_reference_attenuates_six_db() {
        let listener = Listener { distance: 0.0, angle_deg: 0.0 };
        let near = calculate_binaural_geometry(&listener, Position::new(0.0, 2.0, LISTENER_EAR_HEIGHT_METERS));
        let far = calculate_binaural_geometry(&listener, Position::new(0.0, 4.0, LISTENER_EAR_HEIGHT_METERS));
        let ratio = far[0].level_linear / near[0].level_linear;
        let expected_ratio = 10f64.powf(BINAURAL_DB_PER_DOUBLING / 20.0);
        assert_relative_eq!(ratio, expected_ratio, epsilon = 0.05);
    }

    #[test]
    fn keystone_coverage_is_full_on_axis_and_mute_directly_ahead() {
        let angular_factor = |angle_rad: f64| {
            keystone_attenuation(angle_rad, BINAURAL_ON_ANGLE_DEG, BINAURAL_OFF_ANGLE_DEG)
        };
        assert_relative_eq!(angular_factor(0.0), 1.0);
        assert_relative_eq!(angular_factor(std::f64::consts::PI), 0.0);
    }

    #[test]
    fn solo_restricts_to_soloed_inputs_only() {
        let mut inputs = vec![InputObject::new(1), InputObject::new(1), InputObject::new(1)];
        inputs[1].solo = true;
        assert_eq!(active_input_indices(&inputs), vec![1]);
    }

    #[test]
    fn no_solo_includes_all_inputs() {
        let inputs = vec![InputObject::new(1), InputObject::new(1)];
        assert_eq!(active_input_indices(&inputs), vec![0, 1]);
    }
}
