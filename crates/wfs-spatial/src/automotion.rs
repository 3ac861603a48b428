//! Automotion: scripted point-to-point motion of an input, manually started
//! or armed by an audio-level trigger (§3, §9).
//!
//! `original_source::AutomOtionProcessor` (the original processor class) was
//! not available to ground this module directly — it is `#include`d by
//! `MainComponent.h` but absent from the kept source pack. This state machine
//! is instead grounded on the GUI's field semantics in
//! `original_source::InputsTab::setupAutomotionTab` (destination, abs/rel,
//! stay/return, speed profile, trigger mode + threshold + reset, and the
//! start/stop/pause transport) and on the trigger-detection signal
//! `wfs_dsp::LevelDetector::short_peak_db`, which that same original class's
//! sibling `LiveSourceLevelDetector` documents as existing specifically "for
//! AutomOtion triggering".

use wfs_core::{AutomotionParams, AutomotionTrigger, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomotionPhase {
    Idle,
    ToDestination,
    ReturningToStart,
}

/// Per-input automotion state machine. Owns only phase/arming state; the
/// actual motion is carried out by handing [`Self::target_for`]'s result to
/// a [`crate::PositionPipeline`] (speed set to `params.speed` while a move is
/// under way).
#[derive(Debug, Clone, Copy)]
pub struct AutomotionEngine {
    phase: AutomotionPhase,
    /// True when the trigger has released past `reset_threshold_db` and a
    /// fresh edge will be accepted; false while waiting for that release.
    armed: bool,
    paused: bool,
    origin: Position,
}

impl Default for AutomotionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AutomotionEngine {
    pub fn new() -> Self {
        Self { phase: AutomotionPhase::Idle, armed: true, paused: false, origin: Position::ORIGIN }
    }

    pub fn phase(&self) -> AutomotionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase != AutomotionPhase::Idle
    }

    /// Manual transport: the ▶ button. Captures `current_position` as the
    /// return-to-start origin.
    pub fn start(&mut self, current_position: Position) {
        self.origin = current_position;
        self.phase = AutomotionPhase::ToDestination;
        self.paused = false;
    }

    /// Manual transport: the ■ button.
    pub fn stop(&mut self) {
        self.phase = AutomotionPhase::Idle;
        self.paused = false;
    }

    /// Manual transport: the ⏸ toggle. A paused engine keeps its phase but
    /// `target_for` and `advance_on_arrival` become no-ops, freezing motion
    /// in place until unpaused.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Evaluates the configured trigger against the input's short-release
    /// peak level and starts the move on a fresh edge. No-op in Manual mode
    /// (`trigger == AutomotionTrigger::None`); call once per control tick,
    /// before [`Self::target_for`].
    pub fn evaluate_trigger(
        &mut self,
        params: &AutomotionParams,
        trigger_level_db: f64,
        current_position: Position,
    ) {
        let triggered = match params.trigger {
            AutomotionTrigger::None => return,
            AutomotionTrigger::LevelAbove => trigger_level_db > params.trigger_threshold_db,
            AutomotionTrigger::LevelBelow => trigger_level_db < params.trigger_threshold_db,
        };

        if triggered {
            if self.armed {
                self.armed = false;
                self.start(current_position);
            } else if params.reset_on_retrigger && self.is_active() {
                self.start(current_position);
            }
            return;
        }

        let rearmed = match params.trigger {
            AutomotionTrigger::LevelAbove => trigger_level_db < params.reset_threshold_db,
            AutomotionTrigger::LevelBelow => trigger_level_db > params.reset_threshold_db,
            AutomotionTrigger::None => true,
        };
        if rearmed {
            self.armed = true;
        }
    }

    /// The position-pipeline target for the current phase, or `None` while
    /// idle or paused — the caller's ordinary manually-set target applies
    /// instead.
    pub fn target_for(&self, params: &AutomotionParams) -> Option<Position> {
        if self.paused {
            return None;
        }
        match self.phase {
            AutomotionPhase::Idle => None,
            AutomotionPhase::ToDestination => Some(if params.absolute {
                params.destination
            } else {
                self.origin.add(&params.destination)
            }),
            AutomotionPhase::ReturningToStart => Some(self.origin),
        }
    }

    /// Call once per control tick, after the pipeline has advanced, with
    /// whether it has reached the current target. Transitions
    /// `ToDestination` -> `ReturningToStart` (if `return_to_start`) or
    /// `Idle`, and `ReturningToStart` -> `Idle`.
    pub fn advance_on_arrival(&mut self, params: &AutomotionParams, arrived: bool) {
        if self.paused || !arrived {
            return;
        }
        self.phase = match self.phase {
            AutomotionPhase::ToDestination if params.return_to_start => {
                AutomotionPhase::ReturningToStart
            }
            AutomotionPhase::ToDestination | AutomotionPhase::ReturningToStart => {
                AutomotionPhase::Idle
            }
            AutomotionPhase::Idle => AutomotionPhase::Idle,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wfs_core::Position;

    fn manual_params(absolute: bool, return_to_start: bool) -> AutomotionParams {
        AutomotionParams {
            destination: Position::new(5.0, 0.0, 0.0),
            absolute,
            return_to_start,
            speed: 1.0,
            trigger: AutomotionTrigger::None,
            ..AutomotionParams::default()
        }
    }

    #[test]
    fn idle_engine_yields_no_target() {
        let engine = AutomotionEngine::new();
        let params = manual_params(true, false);
        assert_eq!(engine.target_for(&params), None);
    }

    #[test]
    fn manual_start_drives_toward_absolute_destination() {
        let mut engine = AutomotionEngine::new();
        engine.start(Position::new(1.0, 1.0, 0.0));
        let params = manual_params(true, false);
        assert_eq!(engine.target_for(&params), Some(Position::new(5.0, 0.0, 0.0)));
    }

    #[test]
    fn relative_destination_is_offset_from_the_start_position() {
        let mut engine = AutomotionEngine::new();
        engine.start(Position::new(1.0, 1.0, 0.0));
        let params = manual_params(false, false);
        assert_eq!(engine.target_for(&params), Some(Position::new(6.0, 1.0, 0.0)));
    }

    #[test]
    fn arrival_without_return_to_start_goes_idle() {
        let mut engine = AutomotionEngine::new();
        engine.start(Position::ORIGIN);
        let params = manual_params(true, false);
        engine.advance_on_arrival(&params, true);
        assert_eq!(engine.phase(), AutomotionPhase::Idle);
        assert_eq!(engine.target_for(&params), None);
    }

    #[test]
    fn arrival_with_return_to_start_switches_to_returning_then_idle() {
        let mut engine = AutomotionEngine::new();
        engine.start(Position::new(2.0, 0.0, 0.0));
        let params = manual_params(true, true);
        engine.advance_on_arrival(&params, true);
        assert_eq!(engine.phase(), AutomotionPhase::ReturningToStart);
        assert_eq!(engine.target_for(&params), Some(Position::new(2.0, 0.0, 0.0)));

        engine.advance_on_arrival(&params, true);
        assert_eq!(engine.phase(), AutomotionPhase::Idle);
    }

    #[test]
    fn stop_returns_to_idle_regardless_of_phase() {
        let mut engine = AutomotionEngine::new();
        engine.start(Position::ORIGIN);
        engine.stop();
        assert_eq!(engine.phase(), AutomotionPhase::Idle);
    }

    #[test]
    fn pause_freezes_target_and_arrival_without_losing_phase() {
        let mut engine = AutomotionEngine::new();
        engine.start(Position::ORIGIN);
        engine.set_paused(true);
        let params = manual_params(true, false);
        assert_eq!(engine.target_for(&params), None);
        engine.advance_on_arrival(&params, true);
        assert_eq!(engine.phase(), AutomotionPhase::ToDestination);

        engine.set_paused(false);
        assert_eq!(engine.target_for(&params), Some(Position::new(5.0, 0.0, 0.0)));
    }

    #[test]
    fn level_above_trigger_arms_a_single_move_per_crossing() {
        let mut engine = AutomotionEngine::new();
        let params = AutomotionParams {
            trigger: AutomotionTrigger::LevelAbove,
            trigger_threshold_db: -20.0,
            reset_threshold_db: -26.0,
            ..manual_params(true, false)
        };

        engine.evaluate_trigger(&params, -30.0, Position::ORIGIN);
        assert_eq!(engine.phase(), AutomotionPhase::Idle);

        engine.evaluate_trigger(&params, -10.0, Position::ORIGIN);
        assert_eq!(engine.phase(), AutomotionPhase::ToDestination);

        // still above threshold: without reset_on_retrigger, re-evaluating
        // does not restart the move (phase unchanged, origin unchanged).
        engine.evaluate_trigger(&params, -5.0, Position::new(9.0, 9.0, 9.0));
        assert_eq!(engine.phase(), AutomotionPhase::ToDestination);
        assert_eq!(engine.target_for(&params), Some(Position::new(5.0, 0.0, 0.0)));
    }

    #[test]
    fn trigger_does_not_rearm_until_level_crosses_the_reset_threshold() {
        let mut engine = AutomotionEngine::new();
        let params = AutomotionParams {
            trigger: AutomotionTrigger::LevelAbove,
            trigger_threshold_db: -20.0,
            reset_threshold_db: -26.0,
            ..manual_params(true, false)
        };

        engine.evaluate_trigger(&params, -10.0, Position::ORIGIN);
        engine.stop();
        assert!(!engine.armed);

        // between reset and threshold: not yet rearmed.
        engine.evaluate_trigger(&params, -23.0, Position::ORIGIN);
        engine.evaluate_trigger(&params, -10.0, Position::ORIGIN);
        assert_eq!(engine.phase(), AutomotionPhase::Idle);

        // drops below the reset floor: rearmed, next crossing fires.
        engine.evaluate_trigger(&params, -30.0, Position::ORIGIN);
        engine.evaluate_trigger(&params, -10.0, Position::ORIGIN);
        assert_eq!(engine.phase(), AutomotionPhase::ToDestination);
    }

    #[test]
    fn reset_on_retrigger_restarts_the_move_from_the_current_position() {
        let mut engine = AutomotionEngine::new();
        let params = AutomotionParams {
            trigger: AutomotionTrigger::LevelAbove,
            trigger_threshold_db: -20.0,
            reset_threshold_db: -26.0,
            reset_on_retrigger: true,
            ..manual_params(true, false)
        };

        engine.evaluate_trigger(&params, -10.0, Position::ORIGIN);
        assert_eq!(engine.phase(), AutomotionPhase::ToDestination);

        // retrigger while already moving restarts the origin even without rearming.
        engine.evaluate_trigger(&params, -10.0, Position::new(3.0, 0.0, 0.0));
        let params_relative = AutomotionParams { absolute: false, ..params };
        assert_eq!(engine.target_for(&params_relative), Some(Position::new(8.0, 0.0, 0.0)));
    }
}
