//! C6: geometry-to-coefficient calculation engine (§4.6).
//!
//! The vector math (distance, direction, dot product) is grounded on
//! `rf_spatial::position::Position3D`'s operation surface, widened from the
//! binaural special case to the general per-(input,output) matrix. The
//! keystone angular-attenuation shape — full inside the on-angle cone, zero
//! past `pi - off_angle`, linear between — is grounded directly on
//! `original_source::BinauralCalculationEngine::calculateAngularAttenuation`.
//! The matrix publish handle wraps `arc_swap::ArcSwap`, the same registry
//! crate `sova_org_doux::sampling::registry` uses to publish a whole
//! replacement value to concurrent readers without a reader ever observing a
//! freed allocation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use wfs_core::{AttenuationLaw, InputObject, OutputSpeaker, Position, RoutingCell, RoutingMatrix};

use crate::live_source_tamer::LiveSourceTamer;

/// Minimum distance used in gain/delay math to avoid division by zero (§4.6
/// tie-breaks).
const MIN_DISTANCE_METERS: f64 = 0.01;
/// Directivity snaps to full coverage when closer than this (§4.6 tie-breaks).
const DIRECTIVITY_UNITY_DISTANCE_METERS: f64 = 0.001;
/// Reference distance for the `OneOverD` attenuation law (§4.6 tie-breaks).
const ONE_OVER_D_REFERENCE_METERS: f64 = 1.0;

/// Full inside the on-angle cone, zero past the mute angle (`pi -
/// off_angle`), linear in between. Shared by C6's directivity/receive
/// factors and C8's keystone coverage.
pub fn keystone_attenuation(angle_rad: f64, on_angle_deg: f64, off_angle_deg: f64) -> f64 {
    let on_angle_rad = on_angle_deg.to_radians();
    let mute_angle_rad = std::f64::consts::PI - off_angle_deg.to_radians();
    if angle_rad <= on_angle_rad {
        1.0
    } else if angle_rad >= mute_angle_rad {
        0.0
    } else if mute_angle_rad > on_angle_rad {
        1.0 - (angle_rad - on_angle_rad) / (mute_angle_rad - on_angle_rad)
    } else {
        0.0
    }
}

/// Unit "facing" axis from a yaw (rotation) / pitch (tilt) pair. Rotation 0
/// faces `+Y` (away from the audience, world-frame convention per
/// `wfs_core::Position`); increasing rotation sweeps toward `+X`.
fn facing_axis(rotation_deg: f64, tilt_deg: f64) -> Position {
    let az = rotation_deg.to_radians();
    let el = tilt_deg.to_radians();
    Position::new(az.sin() * el.cos(), az.cos() * el.cos(), el.sin())
}

/// Angle between a facing axis and the direction toward a point, in
/// `[0, pi]`. `None` (treated as unity coverage, §4.6 tie-break) when the two
/// points coincide.
fn angle_to(facing: Position, from: Position, toward: Position) -> Option<f64> {
    let direction = from.direction_to(&toward)?;
    Some(facing.dot(&direction).clamp(-1.0, 1.0).acos())
}

fn distance_attenuation(law: AttenuationLaw, distance: f64, coefficient: f64, percent: f64) -> f64 {
    let base = match law {
        AttenuationLaw::Log => 10f64.powf(distance * coefficient / 20.0),
        AttenuationLaw::OneOverD => {
            (coefficient / distance.max(ONE_OVER_D_REFERENCE_METERS)).min(1.0)
        }
    };
    let base = base.clamp(0.0, 1.0);
    let scale = percent / 100.0;
    (1.0 - (1.0 - base) * scale).clamp(0.0, 1.0)
}

/// One `(input, output)` cell's geometry inputs, resolved ahead of time so
/// [`calculate_cell`] stays a pure function (cheap to unit test in
/// isolation).
#[derive(Debug, Clone, Copy)]
pub struct CellContext<'a> {
    pub input: &'a InputObject,
    pub input_position: Position,
    pub output: &'a OutputSpeaker,
    pub sample_rate: f64,
    pub speed_of_sound: f64,
    pub master_level: f64,
    pub system_latency_samples: f64,
    pub muted_by_tamer: bool,
}

/// Computes one primary routing cell per §4.6 steps 1-9.
pub fn calculate_cell(ctx: &CellContext) -> RoutingCell {
    let distance = ctx
        .input_position
        .distance_weighted(&ctx.output.position, ctx.input.height_factor)
        .max(MIN_DISTANCE_METERS);

    let delay_samples = calculate_delay_samples(ctx, distance);

    let directivity = match angle_to(
        facing_axis(ctx.input.directivity.rotation_deg, ctx.input.directivity.tilt_deg),
        ctx.input_position,
        ctx.output.position,
    ) {
        Some(angle) if distance > DIRECTIVITY_UNITY_DISTANCE_METERS => keystone_attenuation(
            angle,
            ctx.input.directivity.on_angle_deg,
            ctx.input.directivity.off_angle_deg,
        ),
        _ => 1.0,
    };

    let receive = match angle_to(
        facing_axis(ctx.output.orientation_deg, ctx.output.pitch_deg),
        ctx.output.position,
        ctx.input_position,
    ) {
        Some(angle) if distance > DIRECTIVITY_UNITY_DISTANCE_METERS => {
            keystone_attenuation(angle, ctx.output.on_angle_deg, ctx.output.off_angle_deg)
        }
        _ => 1.0,
    };

    let distance_atten = distance_attenuation(
        ctx.input.attenuation_law,
        distance,
        ctx.input.distance_coefficient,
        ctx.output.distance_atten_percent,
    );

    let common_atten = db_to_linear(ctx.input.common_attenuation_db);
    let master = ctx.master_level;

    let hf_shelf_db = (distance * ctx.input.directivity.hf_shelf_per_meter
        + distance * ctx.output.hf_damping_per_meter)
        .min(0.0);

    let muted = ctx.muted_by_tamer;

    RoutingCell {
        delay_samples,
        gain_linear: directivity * receive * distance_atten * common_atten * master,
        hf_shelf_db,
        muted,
    }
}

fn calculate_delay_samples(ctx: &CellContext, distance: f64) -> f64 {
    let parallax_ref = ctx.output.horizontal_parallax;
    let user_delay_output_samples = ctx.output.delay_seconds * ctx.sample_rate;
    let raw_samples = (distance - parallax_ref) * ctx.sample_rate / ctx.speed_of_sound
        + user_delay_output_samples;

    if ctx.output.min_latency_enable {
        raw_samples + ctx.system_latency_samples
    } else {
        raw_samples.max(0.0)
    }
}

#[inline]
fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// A floor-reflection image-source cell: same shape as [`RoutingCell`] plus
/// the low-cut corner the HF chain downstream (C9/C10) must additionally
/// apply (§4.6 "Floor-reflection variant").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloorReflectionCell {
    pub base: RoutingCell,
    pub low_cut_hz: f64,
}

pub fn calculate_floor_reflection_cell(ctx: &CellContext) -> FloorReflectionCell {
    let params = ctx.input.floor_reflection;
    if !params.active {
        return FloorReflectionCell {
            base: RoutingCell { muted: true, ..RoutingCell::default() },
            low_cut_hz: params.low_cut_hz,
        };
    }

    let mirrored_input_position = ctx.input_position.mirror_floor();
    let mut mirrored_ctx = *ctx;
    mirrored_ctx.input_position = mirrored_input_position;
    let mut cell = calculate_cell(&mirrored_ctx);

    let fr_attenuation = db_to_linear(params.attenuation_db);
    let diffusion_loss = 1.0 - params.diffusion.clamp(0.0, 1.0) * 0.5;
    cell.gain_linear *= fr_attenuation * diffusion_loss;
    cell.hf_shelf_db = (cell.hf_shelf_db + params.high_shelf_db).min(0.0);

    FloorReflectionCell { base: cell, low_cut_hz: params.low_cut_hz }
}

/// Atomically-swapped `Arc<RoutingMatrix>` handle (§4.6, §5): the control
/// thread is the sole writer; audio-thread/worker readers load a strong
/// reference at block entry and see either the whole old matrix or the whole
/// new one, never a torn mix.
pub struct MatrixHandle {
    current: ArcSwap<RoutingMatrix>,
    version: AtomicU64,
}

impl MatrixHandle {
    pub fn new(initial: RoutingMatrix) -> Self {
        Self { current: ArcSwap::from_pointee(initial), version: AtomicU64::new(0) }
    }

    /// Loads the current matrix.
    pub fn load(&self) -> Arc<RoutingMatrix> {
        self.current.load_full()
    }

    /// Publishes a new matrix, releasing the previous one. Single-writer
    /// only (the control thread).
    pub fn store(&self, matrix: RoutingMatrix) {
        self.current.store(Arc::new(matrix));
        let version = self.version.fetch_add(1, Ordering::Release) + 1;
        log::debug!("routing matrix published, version={version}");
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}

/// Per-tick constants C6 needs that don't live on an individual input or
/// output (§4.6).
#[derive(Debug, Clone, Copy)]
pub struct CalculationContext {
    pub sample_rate: f64,
    pub speed_of_sound: f64,
    pub master_level: f64,
    pub system_latency_samples: f64,
}

/// Composes the full primary [`RoutingMatrix`] for one control tick: C6's
/// per-cell geometry (`calculate_cell`) post-multiplied by C7's Live-Source
/// Tamer gain (§4.7, "C7 post-multiplies by dynamic gains" onto C6's
/// matrix). `input_positions` is indexed the same as `inputs` and holds each
/// input's current composite position (C5's output).
pub fn compose_routing_matrix(
    inputs: &[InputObject],
    input_positions: &[Position],
    outputs: &[OutputSpeaker],
    tamer: &LiveSourceTamer,
    ctx: &CalculationContext,
) -> RoutingMatrix {
    let mut matrix = RoutingMatrix::new(inputs.len(), outputs.len());
    for (i, input) in inputs.iter().enumerate() {
        for (j, output) in outputs.iter().enumerate() {
            let cell_ctx = CellContext {
                input,
                input_position: input_positions[i],
                output,
                sample_rate: ctx.sample_rate,
                speed_of_sound: ctx.speed_of_sound,
                master_level: ctx.master_level,
                system_latency_samples: ctx.system_latency_samples,
                muted_by_tamer: input.mute_mask.get(j).copied().unwrap_or(false),
            };
            let mut cell = calculate_cell(&cell_ctx);
            cell.gain_linear *= tamer.cell(i, j);
            *matrix.cell_mut(i, j) = cell;
        }
    }
    matrix
}
