//! C5: control-rate position pipeline (§4.5).
//!
//! The speed-limiter stage (snap threshold, tanh deceleration, waypoint
//! constant-speed following, rate-limited waypoint capture into a
//! spinlock-guarded 100-entry ring) is grounded directly on
//! `original_source::InputSpeedLimiter`, translated from its single
//! monolithic class into a pipeline stage that feeds the
//! flip/tracking-offset/LFO stages the spec adds beyond the original
//! speed limiter.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use wfs_core::{AxisLfoParams, LfoParams, LfoWaveform, Position};

/// Distance below which `tick` snaps directly to the move target (§4.5 step 2).
const SNAP_THRESHOLD_METERS: f64 = 0.001;

/// Waypoints are captured at <= 50 Hz regardless of caller rate (§4.5, §3).
const WAYPOINT_CAPTURE_INTERVAL: Duration = Duration::from_millis(20);

/// Bounded ring capacity for captured waypoints (§4.5).
const WAYPOINT_QUEUE_CAPACITY: usize = 100;

/// FIFO waypoint ring, oldest dropped on overflow. Guarded by a
/// `parking_lot::Mutex` standing in for the original's spinlock (see
/// DESIGN.md) — the UI/touch thread pushes, the control thread pops; the
/// audio thread never touches this queue.
#[derive(Debug, Default)]
pub struct WaypointQueue {
    inner: Mutex<VecDeque<Position>>,
}

impl WaypointQueue {
    pub fn new() -> Self {
        Self { inner: Mutex::new(VecDeque::with_capacity(WAYPOINT_QUEUE_CAPACITY)) }
    }

    pub fn push(&self, position: Position) {
        let mut queue = self.inner.lock();
        if queue.len() == WAYPOINT_QUEUE_CAPACITY {
            queue.pop_front();
        }
        queue.push_back(position);
    }

    pub fn pop_front(&self) -> Option<Position> {
        self.inner.lock().pop_front()
    }

    pub fn peek_front(&self) -> Option<Position> {
        self.inner.lock().front().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

/// Per-axis LFO phase accumulator. Not grounded in `original_source` (no LFO
/// exists there); derived from the spec's glossary definition alone — see
/// DESIGN.md Open Question on LFO phase-advance semantics.
#[derive(Debug, Clone, Copy, Default)]
struct AxisLfoState {
    phase: f64,
}

impl AxisLfoState {
    fn advance(&mut self, axis: &AxisLfoParams, fallback_period: f64, global_phase: f64, gyrophone_direction: f64, dt: f64) -> f64 {
        let rate_hz = if axis.rate > 0.0 { axis.rate } else if fallback_period > 0.0 { 1.0 / fallback_period } else { 0.0 };
        self.phase += 2.0 * std::f64::consts::PI * rate_hz * dt * gyrophone_direction;
        self.phase = self.phase.rem_euclid(2.0 * std::f64::consts::PI);
        let effective_phase = self.phase + axis.phase + global_phase;
        axis.amplitude * waveform_value(axis.waveform, effective_phase)
    }
}

fn waveform_value(waveform: LfoWaveform, phase: f64) -> f64 {
    let p = phase.rem_euclid(2.0 * std::f64::consts::PI);
    match waveform {
        LfoWaveform::Sine => p.sin(),
        LfoWaveform::Triangle => (2.0 / std::f64::consts::PI) * p.sin().asin(),
        LfoWaveform::Square => {
            if p.sin() >= 0.0 {
                1.0
            } else {
                -1.0
            }
        }
        LfoWaveform::SawUp => p / std::f64::consts::PI - 1.0,
        LfoWaveform::SawDown => 1.0 - p / std::f64::consts::PI,
    }
}

#[derive(Debug, Default)]
struct LfoState {
    x: AxisLfoState,
    y: AxisLfoState,
    z: AxisLfoState,
}

impl LfoState {
    fn advance(&mut self, params: &LfoParams, dt: f64) -> Position {
        if !params.active {
            return Position::ORIGIN;
        }
        Position {
            x: self.x.advance(&params.x, params.period, params.global_phase, params.gyrophone_direction, dt),
            y: self.y.advance(&params.y, params.period, params.global_phase, params.gyrophone_direction, dt),
            z: self.z.advance(&params.z, params.period, params.global_phase, params.gyrophone_direction, dt),
        }
    }
}

/// Per-input control-rate position pipeline (§4.5). Owns the speed-limited
/// current position, the waypoint queue, and LFO phase state; exposes both
/// the speed-limited-only position (for UI) and the full composite position
/// (for C6).
pub struct PositionPipeline {
    current: Position,
    target: Position,
    path_mode: bool,
    max_speed: f64,
    waypoints: WaypointQueue,
    last_waypoint_capture: Option<Instant>,
    lfo_state: LfoState,
}

impl PositionPipeline {
    pub fn new(initial: Position) -> Self {
        Self {
            current: initial,
            target: initial,
            path_mode: false,
            max_speed: 1.0,
            waypoints: WaypointQueue::new(),
            last_waypoint_capture: None,
            lfo_state: LfoState::default(),
        }
    }

    pub fn set_target(&mut self, target: Position) {
        self.target = target;
    }

    pub fn set_path_mode(&mut self, enabled: bool) {
        self.path_mode = enabled;
    }

    /// Clamped to `[0.01, 20.0]` m/s as in `InputSpeedLimiter::setSpeedLimit`.
    pub fn set_max_speed(&mut self, max_speed: f64) {
        self.max_speed = max_speed.clamp(0.01, 20.0);
    }

    /// Rate-limited waypoint capture: pushes at most once per 20 ms
    /// regardless of call frequency.
    pub fn capture_waypoint(&mut self, position: Position, now: Instant) {
        let due = match self.last_waypoint_capture {
            None => true,
            Some(last) => now.duration_since(last) >= WAYPOINT_CAPTURE_INTERVAL,
        };
        if due {
            self.waypoints.push(position);
            self.last_waypoint_capture = Some(now);
            log::trace!("waypoint captured at ({}, {}, {})", position.x, position.y, position.z);
        }
    }

    pub fn waypoint_queue(&self) -> &WaypointQueue {
        &self.waypoints
    }

    /// Advances the speed-limited current position by one control tick
    /// (§4.5 steps 1-4) and returns it.
    pub fn tick_speed_limiter(&mut self, dt: f64) -> Position {
        let move_target = if self.path_mode {
            self.waypoints.peek_front().unwrap_or(self.target)
        } else {
            self.target
        };

        let delta = move_target.sub(self.current);
        let distance = delta.magnitude();

        if distance < SNAP_THRESHOLD_METERS {
            self.current = move_target;
            if self.path_mode && !self.waypoints.is_empty() {
                self.waypoints.pop_front();
            }
            return self.current;
        }

        let max_step = self.max_speed * dt;
        let step = if self.path_mode {
            max_step.min(distance)
        } else {
            max_step * (distance / max_step).tanh()
        };

        let direction = delta.scale(1.0 / distance);
        self.current = self.current.add(direction.scale(step));
        self.current
    }

    /// Speed-limited-only position, for UI visualisation (§4.5).
    pub fn speed_limited_position(&self) -> Position {
        self.current
    }

    /// True once the speed limiter has snapped onto its current move target
    /// (§4.5 step 2), e.g. to let a caller advance an automotion phase.
    ///
    /// Compares against `self.target`, the direct-approach destination, not
    /// the waypoint-following `move_target`. Correct for `path_mode: false`
    /// callers only (automotion never enqueues waypoints); a waypoint
    /// follower would need a different arrival test.
    pub fn has_arrived(&self) -> bool {
        self.current.distance_to(&self.target) < SNAP_THRESHOLD_METERS
    }

    /// Composite position consumed by C6: speed-limited current position ->
    /// axis flips -> tracking offset -> LFO displacement, in that fixed
    /// order (§4.5).
    pub fn composite_position(
        &mut self,
        flip_x: bool,
        flip_y: bool,
        flip_z: bool,
        tracking_offset: Position,
        lfo: &LfoParams,
        dt: f64,
    ) -> Position {
        let mut position = self.current;
        if flip_x {
            position.x = -position.x;
        }
        if flip_y {
            position.y = -position.y;
        }
        if flip_z {
            position.z = -position.z;
        }
        position = position.add(tracking_offset);
        position = position.add(self.lfo_state.advance(lfo, dt));
        position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn snaps_when_within_one_millimeter() {
        let mut pipeline = PositionPipeline::new(Position::new(0.0, 0.0, 0.0));
        pipeline.set_target(Position::new(0.0005, 0.0, 0.0));
        let result = pipeline.tick_speed_limiter(0.02);
        assert_eq!(result, Position::new(0.0005, 0.0, 0.0));
    }

    #[test]
    fn direct_approach_matches_the_closed_form_tanh_step() {
        let mut pipeline = PositionPipeline::new(Position::ORIGIN);
        pipeline.set_target(Position::new(1.0, 0.0, 0.0));
        pipeline.set_max_speed(0.5);
        let result = pipeline.tick_speed_limiter(0.02);
        let expected = 0.5 * 0.02 * (1.0 / 0.01_f64).tanh();
        assert_relative_eq!(result.x, expected, epsilon = 1e-9);
        assert!(result.x <= 0.01 + 1e-9);
    }

    #[test]
    fn direct_approach_decelerates_and_never_overshoots() {
        let mut pipeline = PositionPipeline::new(Position::ORIGIN);
        pipeline.set_target(Position::new(10.0, 0.0, 0.0));
        pipeline.set_max_speed(1.0);
        let mut last_distance = 10.0;
        for _ in 0..2000 {
            let pos = pipeline.tick_speed_limiter(0.02);
            let distance = pos.distance_to(&Position::new(10.0, 0.0, 0.0));
            assert!(distance <= last_distance + 1e-9);
            last_distance = distance;
            if distance < SNAP_THRESHOLD_METERS {
                break;
            }
        }
        assert!(last_distance < SNAP_THRESHOLD_METERS);
    }

    #[test]
    fn per_tick_step_never_exceeds_max_speed_times_dt() {
        let mut pipeline = PositionPipeline::new(Position::ORIGIN);
        pipeline.set_target(Position::new(10.0, 3.0, -2.0));
        pipeline.set_max_speed(0.75);
        let dt = 0.02;
        let mut previous = Position::ORIGIN;
        for _ in 0..50 {
            let current = pipeline.tick_speed_limiter(dt);
            let step = current.distance_to(&previous);
            assert!(step <= 0.75 * dt + 1e-6);
            previous = current;
        }
    }

    #[test]
    fn target_equal_to_current_leaves_position_unchanged() {
        let mut pipeline = PositionPipeline::new(Position::new(2.0, -1.0, 0.5));
        pipeline.set_target(Position::new(2.0, -1.0, 0.5));
        pipeline.set_max_speed(1.0);
        let result = pipeline.tick_speed_limiter(0.02);
        assert_relative_eq!(result.x, 2.0, epsilon = 1e-9);
        assert_relative_eq!(result.y, -1.0, epsilon = 1e-9);
        assert_relative_eq!(result.z, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn waypoint_following_moves_at_constant_speed_until_near_target() {
        let mut pipeline = PositionPipeline::new(Position::ORIGIN);
        pipeline.set_path_mode(true);
        pipeline.set_max_speed(1.0);
        pipeline.waypoint_queue().push(Position::new(5.0, 0.0, 0.0));

        let pos = pipeline.tick_speed_limiter(0.02);
        // max_step = 1.0 * 0.02 = 0.02; far from target so full constant step.
        assert_relative_eq!(pos.x, 0.02, epsilon = 1e-9);
    }

    #[test]
    fn waypoint_queue_drops_oldest_past_capacity() {
        let queue = WaypointQueue::new();
        for i in 0..150 {
            queue.push(Position::new(i as f64, 0.0, 0.0));
        }
        assert_eq!(queue.len(), WAYPOINT_QUEUE_CAPACITY);
        // first 50 pushes (0..49) must have been evicted.
        assert_eq!(queue.peek_front().unwrap().x, 50.0);
    }

    #[test]
    fn waypoint_capture_is_rate_limited_to_20ms() {
        let mut pipeline = PositionPipeline::new(Position::ORIGIN);
        let t0 = Instant::now();
        pipeline.capture_waypoint(Position::new(1.0, 0.0, 0.0), t0);
        pipeline.capture_waypoint(Position::new(2.0, 0.0, 0.0), t0 + Duration::from_millis(5));
        assert_eq!(pipeline.waypoint_queue().len(), 1);
        pipeline.capture_waypoint(Position::new(3.0, 0.0, 0.0), t0 + Duration::from_millis(21));
        assert_eq!(pipeline.waypoint_queue().len(), 2);
    }

    #[test]
    fn max_speed_is_clamped_to_spec_range() {
        let mut pipeline = PositionPipeline::new(Position::ORIGIN);
        pipeline.set_max_speed(0.0);
        assert_relative_eq!(pipeline.max_speed, 0.01);
        pipeline.set_max_speed(1000.0);
        assert_relative_eq!(pipeline.max_speed, 20.0);
    }

    #[test]
    fn has_arrived_flips_once_within_the_snap_threshold() {
        let mut pipeline = PositionPipeline::new(Position::ORIGIN);
        pipeline.set_target(Position::new(0.02, 0.0, 0.0));
        pipeline.set_max_speed(1.0);
        assert!(!pipeline.has_arrived());
        for _ in 0..10 {
            pipeline.tick_speed_limiter(0.02);
        }
        assert!(pipeline.has_arrived());
    }

    #[test]
    fn composite_position_applies_stages_in_fixed_order() {
        let mut pipeline = PositionPipeline::new(Position::new(1.0, 2.0, 3.0));
        let lfo = LfoParams { active: false, ..LfoParams::default() };
        let composite = pipeline.composite_position(
            true,
            false,
            false,
            Position::new(10.0, 0.0, 0.0),
            &lfo,
            0.02,
        );
        // flip x first (-1.0), then add tracking offset (10.0) -> 9.0.
        assert_relative_eq!(composite.x, 9.0);
        assert_relative_eq!(composite.y, 2.0);
        assert_relative_eq!(composite.z, 3.0);
    }
}
