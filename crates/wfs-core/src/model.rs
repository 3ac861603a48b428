//! Input-object and output-speaker attribute structs (§3).
//!
//! These are plain data — the control thread reads them out of a
//! [`crate::params::ParameterStore`] each tick and hands them to C5/C6/C7/C8.
//! They intentionally hold no behaviour.

use crate::position::Position;

/// Distance attenuation law (§3, §4.6 step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttenuationLaw {
    Log,
    OneOverD,
}

/// Live-Source Tamer shape curve (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LsShape {
    Linear,
    Log,
    Square,
    Sine,
}

/// LFO waveform per axis (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfoWaveform {
    Sine,
    Triangle,
    Square,
    SawUp,
    SawDown,
}

/// Automotion trigger condition (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomotionTrigger {
    None,
    LevelAbove,
    LevelBelow,
}

#[derive(Debug, Clone, Copy)]
pub struct DirectivityParams {
    /// Full-coverage cone half-angle, degrees, 1-180.
    pub on_angle_deg: f64,
    /// Mute-zone half-angle, degrees, 0-179.
    pub off_angle_deg: f64,
    /// Yaw, degrees, -179..180.
    pub rotation_deg: f64,
    /// Pitch, degrees, -90..90.
    pub tilt_deg: f64,
    /// HF roll-off, dB per metre of travel (<= 0).
    pub hf_shelf_per_meter: f64,
}

impl Default for DirectivityParams {
    fn default() -> Self {
        Self { on_angle_deg: 180.0, off_angle_deg: 0.0, rotation_deg: 0.0, tilt_deg: 0.0, hf_shelf_per_meter: 0.0 }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LiveSourceParams {
    pub active: bool,
    /// Metres, 0-50.
    pub radius: f64,
    pub shape: LsShape,
    /// dB, applied at full attenuation (radius centre).
    pub fixed_attenuation_db: f64,
    pub peak_threshold_db: f64,
    pub peak_ratio: f64,
    pub slow_threshold_db: f64,
    pub slow_ratio: f64,
}

impl Default for LiveSourceParams {
    fn default() -> Self {
        Self {
            active: false,
            radius: 2.0,
            shape: LsShape::Linear,
            fixed_attenuation_db: -6.0,
            peak_threshold_db: -20.0,
            peak_ratio: 2.0,
            slow_threshold_db: -20.0,
            slow_ratio: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FloorReflectionParams {
    pub active: bool,
    pub attenuation_db: f64,
    pub diffusion: f64,
    pub low_cut_hz: f64,
    pub high_shelf_db: f64,
}

impl Default for FloorReflectionParams {
    fn default() -> Self {
        Self { active: false, attenuation_db: -6.0, diffusion: 0.0, low_cut_hz: 80.0, high_shelf_db: -3.0 }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AxisLfoParams {
    pub waveform: LfoWaveform,
    /// Hz.
    pub rate: f64,
    /// Metres.
    pub amplitude: f64,
    /// Radians.
    pub phase: f64,
}

impl Default for AxisLfoParams {
    fn default() -> Self {
        Self { waveform: LfoWaveform::Sine, rate: 0.0, amplitude: 0.0, phase: 0.0 }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LfoParams {
    pub active: bool,
    /// Seconds, 0.01-100.
    pub period: f64,
    pub global_phase: f64,
    pub x: AxisLfoParams,
    pub y: AxisLfoParams,
    pub z: AxisLfoParams,
    /// Gyrophone rotation direction, +1 or -1.
    pub gyrophone_direction: f64,
}

impl Default for LfoParams {
    fn default() -> Self {
        Self {
            active: false,
            period: 10.0,
            global_phase: 0.0,
            x: AxisLfoParams::default(),
            y: AxisLfoParams::default(),
            z: AxisLfoParams::default(),
            gyrophone_direction: 1.0,
        }
    }
}

/// Scripted point-to-point motion of an input, manually started/stopped or
/// armed by an audio-level trigger (§3).
#[derive(Debug, Clone, Copy)]
pub struct AutomotionParams {
    /// World position (absolute) or offset from the position at trigger time
    /// (relative).
    pub destination: Position,
    pub absolute: bool,
    /// If true, the input returns to its start position after reaching
    /// `destination` instead of stopping there.
    pub return_to_start: bool,
    /// Metres/second.
    pub speed: f64,
    pub trigger: AutomotionTrigger,
    /// dB level that arms the move (`LevelAbove`: crossed upward;
    /// `LevelBelow`: crossed downward).
    pub trigger_threshold_db: f64,
    /// dB level the input level must cross back past before a new trigger
    /// edge is accepted again (hysteresis, avoids re-triggering on the same
    /// sustained signal).
    pub reset_threshold_db: f64,
    /// If true, a fresh trigger edge while already under way restarts the
    /// move from the current position instead of being ignored until it
    /// finishes.
    pub reset_on_retrigger: bool,
}

impl Default for AutomotionParams {
    fn default() -> Self {
        Self {
            destination: Position::ORIGIN,
            absolute: true,
            return_to_start: false,
            speed: 1.0,
            trigger: AutomotionTrigger::None,
            trigger_threshold_db: -20.0,
            reset_threshold_db: -26.0,
            reset_on_retrigger: false,
        }
    }
}

/// A logical mono input object (§3).
#[derive(Debug, Clone)]
pub struct InputObject {
    pub target_position: Position,
    /// Tracking/user-nudge offset, added after flips and before LFO in the
    /// composite-position formula (§4.5).
    pub offset: Position,
    pub flip_x: bool,
    pub flip_y: bool,
    pub flip_z: bool,
    /// 0 (flat) to 1 (full 3-D).
    pub height_factor: f64,
    /// 0 = single, 1-10 = named cluster.
    pub cluster_id: u8,
    /// When set on a clustered input, this input's target follows the
    /// cluster's resolved reference position rather than its own
    /// `target_position` (§3, §9 cluster reference resolution).
    pub tracking_active: bool,
    /// Metres/second, 0.01-20.
    pub max_speed: f64,
    pub attenuation_law: AttenuationLaw,
    /// dB/m for Log law, or ratio for OneOverD.
    pub distance_coefficient: f64,
    pub common_attenuation_db: f64,
    pub directivity: DirectivityParams,
    pub live_source: LiveSourceParams,
    pub floor_reflection: FloorReflectionParams,
    pub lfo: LfoParams,
    pub automotion: AutomotionParams,
    /// Length M, one bit per output.
    pub mute_mask: Vec<bool>,
    /// Binaural preview solo (§4.8): if any input is soloed, only soloed
    /// inputs contribute to the binaural bus.
    pub solo: bool,
}

impl InputObject {
    pub fn new(num_outputs: usize) -> Self {
        Self {
            target_position: Position::ORIGIN,
            offset: Position::ORIGIN,
            flip_x: false,
            flip_y: false,
            flip_z: false,
            height_factor: 1.0,
            cluster_id: 0,
            tracking_active: false,
            max_speed: 1.0,
            attenuation_law: AttenuationLaw::Log,
            distance_coefficient: 3.0,
            common_attenuation_db: 0.0,
            directivity: DirectivityParams::default(),
            live_source: LiveSourceParams::default(),
            floor_reflection: FloorReflectionParams::default(),
            lfo: LfoParams::default(),
            automotion: AutomotionParams::default(),
            mute_mask: vec![false; num_outputs],
            solo: false,
        }
    }
}

/// A fixed physical loudspeaker (§3).
#[derive(Debug, Clone)]
pub struct OutputSpeaker {
    pub position: Position,
    /// Degrees, 0 = facing audience.
    pub orientation_deg: f64,
    pub on_angle_deg: f64,
    pub off_angle_deg: f64,
    /// Degrees, -90..90.
    pub pitch_deg: f64,
    /// dB per metre, <= 0.
    pub hf_damping_per_meter: f64,
    /// 0 = single, 1-10.
    pub array_id: u8,
    pub attenuation_db: f64,
    /// Seconds, +-0.1.
    pub delay_seconds: f64,
    pub min_latency_enable: bool,
    pub live_source_enable: bool,
    /// Percent, 0-200, 100 = nominal.
    pub distance_atten_percent: f64,
    pub horizontal_parallax: f64,
    pub vertical_parallax: f64,
}

impl Default for OutputSpeaker {
    fn default() -> Self {
        Self {
            position: Position::ORIGIN,
            orientation_deg: 0.0,
            on_angle_deg: 180.0,
            off_angle_deg: 0.0,
            pitch_deg: 0.0,
            hf_damping_per_meter: 0.0,
            array_id: 0,
            attenuation_db: 0.0,
            delay_seconds: 0.0,
            min_latency_enable: false,
            live_source_enable: true,
            distance_atten_percent: 100.0,
            horizontal_parallax: 1.0,
            vertical_parallax: 1.0,
        }
    }
}
