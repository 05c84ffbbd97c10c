// ==============================================================================
// drift.rs — DRIFT / MINI-TURBO STATE MACHINE
// ==============================================================================
// States: Idle -> Pending -> Active -> Idle.
//
// - A fresh drift press (edge, not level) moves Idle -> Pending; the hop
//   impulse itself is applied by the simulation step, even when the drift
//   never starts.
// - Pending waits for landing; its expiry window only counts while grounded,
//   so an airborne kart can hold the button indefinitely.
// - Active recomputes control quality every tick from the alignment of the
//   steer input with the locked drift direction, advances the charge timer at
//   the quality's rate, and resolves the current stage from the config table.
// - Releasing with a charged stage awards that stage's boost; every forced
//   cancel (slow, rolling backward, wall hit, brake hold) awards nothing.
//
// update() runs after the physics integration of the tick (it needs this
// tick's grounded flag and speeds), in the ctx-struct style of the solver
// modules: all per-tick signals arrive in one `DriftTick`.
// ==============================================================================

use rapier3d::prelude::Real;
use serde::Serialize;

use crate::kart::config::KartConfig;
use crate::kart::util::{EPS, smooth_toward};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftPhase {
    Idle,
    Pending,
    Active,
}

/// How well the player is committing to the turn while drifting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlQuality {
    Neutral,
    Tight,
    Shallow,
}

#[derive(Debug, Clone)]
pub struct DriftState {
    pub phase: DriftPhase,
    pub direction: Real,      // -1 left, 0 none, +1 right
    pub charge_timer: Real,   // s, rate-scaled
    pub pending_timer: Real,  // s on the ground while Pending
    pub stage_index: i32,     // -1 = no stage charged yet
    pub turn_multiplier: Real,
    pub charge_rate: Real,
    pub quality: ControlQuality,
}

impl Default for DriftState {
    fn default() -> Self {
        Self {
            phase: DriftPhase::Idle,
            direction: 0.0,
            charge_timer: 0.0,
            pending_timer: 0.0,
            stage_index: -1,
            turn_multiplier: 1.0,
            charge_rate: 1.0,
            quality: ControlQuality::Neutral,
        }
    }
}

impl DriftState {
    /// Back to Idle defaults. Used by every transition out of Pending/Active,
    /// including the forced wall-collision cancel in the simulation step.
    pub fn reset(&mut self) {
        *self = DriftState::default();
    }

    /// Fresh drift press: arm the initiation window.
    pub fn begin_pending(&mut self) {
        self.reset();
        self.phase = DriftPhase::Pending;
    }

    pub fn is_active(&self) -> bool {
        self.phase == DriftPhase::Active
    }
}

/// Per-tick signals the state machine consumes, gathered by the simulation
/// after integration.
#[derive(Debug, Clone, Copy)]
pub struct DriftTick {
    pub dt: Real,
    pub grounded: bool,
    pub forward_speed: Real, // m/s along the kart's forward axis
    pub speed: Real,         // m/s, horizontal magnitude
    pub steer: Real,         // -1..1
    pub drift_held: bool,
    pub dual_input_time: Real, // s both throttle inputs have been held
}

/// Boost granted when a charged drift is released.
#[derive(Debug, Clone, Copy)]
pub struct BoostAward {
    pub duration: Real,
    pub strength: Real,
}

pub fn update(state: &mut DriftState, cfg: &KartConfig, tick: &DriftTick) -> Option<BoostAward> {
    match state.phase {
        DriftPhase::Idle => None,
        DriftPhase::Pending => {
            update_pending(state, cfg, tick);
            None
        }
        DriftPhase::Active => update_active(state, cfg, tick),
    }
}

fn update_pending(state: &mut DriftState, cfg: &KartConfig, tick: &DriftTick) {
    if !tick.drift_held {
        state.reset();
        return;
    }
    if !tick.grounded {
        // The window only counts down on the ground.
        return;
    }

    let steer = steer_direction(tick.steer);
    if steer != 0.0 && tick.forward_speed >= cfg.drift_min_speed() {
        state.phase = DriftPhase::Active;
        state.direction = steer;
        state.charge_timer = 0.0;
        state.stage_index = -1;
        state.quality = ControlQuality::Neutral;
        state.turn_multiplier = cfg.neutral.turn_multiplier;
        state.charge_rate = cfg.neutral.charge_rate;
        return;
    }

    state.pending_timer += tick.dt;
    if state.pending_timer > cfg.drift_initiation_window {
        state.reset();
    }
}

fn update_active(state: &mut DriftState, cfg: &KartConfig, tick: &DriftTick) -> Option<BoostAward> {
    // Forced cancels first: none of these award a boost.
    if tick.speed < cfg.drift_cancel_speed
        || tick.forward_speed <= 0.0
        || tick.dual_input_time > cfg.brake_cancel_duration
    {
        state.reset();
        return None;
    }

    if !tick.drift_held {
        let award = if state.stage_index >= 0 {
            cfg.drift_stages.get(state.stage_index as usize).map(|s| BoostAward {
                duration: s.boost_duration,
                strength: s.boost_strength,
            })
        } else {
            None
        };
        state.reset();
        return award;
    }

    // Control quality from steer alignment with the locked direction.
    let alignment = tick.steer * state.direction;
    state.quality = if alignment > EPS {
        ControlQuality::Tight
    } else if alignment < -EPS {
        ControlQuality::Shallow
    } else {
        ControlQuality::Neutral
    };
    let tuning = cfg.quality(state.quality);
    state.turn_multiplier = tuning.turn_multiplier;
    state.charge_rate = tuning.charge_rate;

    state.charge_timer += tick.dt * state.charge_rate;
    state.stage_index = cfg.stage_for_charge(state.charge_timer);

    None
}

#[inline]
fn steer_direction(steer: Real) -> Real {
    if steer > EPS {
        1.0
    } else if steer < -EPS {
        -1.0
    } else {
        0.0
    }
}

// ==============================================================================
// Visual hint: smoothed model yaw offset + lean while drifting. Advisory
// state for a renderer, no gameplay effect.
// ==============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct DriftVisual {
    pub yaw_offset: Real, // rad
    pub lean: Real,       // rad
}

impl DriftVisual {
    pub fn update(&mut self, state: &DriftState, cfg: &KartConfig, dt: Real) {
        let (yaw_target, lean_target) = if state.is_active() && state.direction != 0.0 {
            let k = state.direction * state.turn_multiplier;
            (k * cfg.visual_yaw_max, k * cfg.visual_lean_max)
        } else {
            (0.0, 0.0)
        };
        self.yaw_offset = smooth_toward(self.yaw_offset, yaw_target, cfg.visual_smoothing, dt);
        self.lean = smooth_toward(self.lean, lean_target, cfg.visual_smoothing, dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kart::config::STANDARD_KART;

    const DT: Real = 1.0 / 60.0;

    fn tick(grounded: bool, forward_speed: Real, steer: Real, held: bool) -> DriftTick {
        DriftTick {
            dt: DT,
            grounded,
            forward_speed,
            speed: forward_speed.abs(),
            steer,
            drift_held: held,
            dual_input_time: 0.0,
        }
    }

    fn active_state(cfg: &KartConfig, direction: Real) -> DriftState {
        let mut state = DriftState::default();
        state.begin_pending();
        update(&mut state, cfg, &tick(true, cfg.max_speed, direction, true));
        assert_eq!(state.phase, DriftPhase::Active);
        state
    }

    #[test]
    fn test_pending_expires_on_ground() {
        let cfg = STANDARD_KART;
        let mut state = DriftState::default();
        state.begin_pending();

        // No steer input: the window runs out.
        for _ in 0..10 {
            update(&mut state, &cfg, &tick(true, cfg.max_speed, 0.0, true));
        }
        assert_eq!(state.phase, DriftPhase::Idle);
    }

    #[test]
    fn test_pending_waits_while_airborne() {
        let cfg = STANDARD_KART;
        let mut state = DriftState::default();
        state.begin_pending();

        for _ in 0..120 {
            update(&mut state, &cfg, &tick(false, cfg.max_speed, 0.0, true));
        }
        assert_eq!(state.phase, DriftPhase::Pending);

        // Landing with steer held activates immediately.
        update(&mut state, &cfg, &tick(true, cfg.max_speed, -1.0, true));
        assert_eq!(state.phase, DriftPhase::Active);
        assert_eq!(state.direction, -1.0);
    }

    #[test]
    fn test_pending_needs_minimum_speed() {
        let cfg = STANDARD_KART;
        let mut state = DriftState::default();
        state.begin_pending();

        let slow = cfg.drift_min_speed() * 0.5;
        for _ in 0..10 {
            update(&mut state, &cfg, &tick(true, slow, 1.0, true));
        }
        assert_eq!(state.phase, DriftPhase::Idle);
    }

    #[test]
    fn test_release_on_pending_cancels() {
        let cfg = STANDARD_KART;
        let mut state = DriftState::default();
        state.begin_pending();
        update(&mut state, &cfg, &tick(false, cfg.max_speed, 0.0, false));
        assert_eq!(state.phase, DriftPhase::Idle);
    }

    #[test]
    fn test_stage_index_monotonic_while_active() {
        let cfg = STANDARD_KART;
        let mut state = active_state(&cfg, 1.0);

        let mut last_stage = state.stage_index;
        for _ in 0..400 {
            update(&mut state, &cfg, &tick(true, cfg.max_speed, 1.0, true));
            assert!(state.stage_index >= last_stage);
            last_stage = state.stage_index;
        }
        assert_eq!(state.stage_index, 2);
    }

    #[test]
    fn test_release_before_first_stage_awards_nothing() {
        let cfg = STANDARD_KART;
        let mut state = active_state(&cfg, 1.0);
        assert_eq!(state.stage_index, -1);

        let award = update(&mut state, &cfg, &tick(true, cfg.max_speed, 1.0, false));
        assert!(award.is_none());
        assert_eq!(state.phase, DriftPhase::Idle);
    }

    #[test]
    fn test_release_with_stage_awards_boost() {
        let cfg = STANDARD_KART;
        let mut state = active_state(&cfg, 1.0);

        // Tight steering charges at full rate.
        let ticks = (cfg.drift_stages[0].time / DT) as usize + 2;
        for _ in 0..ticks {
            update(&mut state, &cfg, &tick(true, cfg.max_speed, 1.0, true));
        }
        assert!(state.stage_index >= 0);

        let award = update(&mut state, &cfg, &tick(true, cfg.max_speed, 1.0, false))
            .expect("charged release must award a boost");
        assert_eq!(award.strength, cfg.drift_stages[0].boost_strength);
        assert_eq!(state.stage_index, -1);
        assert_eq!(state.direction, 0.0);
    }

    #[test]
    fn test_slow_speed_force_cancels() {
        let cfg = STANDARD_KART;
        let mut state = active_state(&cfg, 1.0);

        let award = update(
            &mut state,
            &cfg,
            &tick(true, cfg.drift_cancel_speed * 0.5, 1.0, true),
        );
        assert!(award.is_none());
        assert_eq!(state.phase, DriftPhase::Idle);
    }

    #[test]
    fn test_brake_hold_force_cancels() {
        let cfg = STANDARD_KART;
        let mut state = active_state(&cfg, 1.0);

        let mut t = tick(true, cfg.max_speed, 1.0, true);
        t.dual_input_time = cfg.brake_cancel_duration + 0.1;
        let award = update(&mut state, &cfg, &t);
        assert!(award.is_none());
        assert_eq!(state.phase, DriftPhase::Idle);
    }

    #[test]
    fn test_quality_tracks_steer_alignment() {
        let cfg = STANDARD_KART;
        let mut state = active_state(&cfg, 1.0);

        update(&mut state, &cfg, &tick(true, cfg.max_speed, 1.0, true));
        assert_eq!(state.quality, ControlQuality::Tight);

        update(&mut state, &cfg, &tick(true, cfg.max_speed, -1.0, true));
        assert_eq!(state.quality, ControlQuality::Shallow);

        update(&mut state, &cfg, &tick(true, cfg.max_speed, 0.0, true));
        assert_eq!(state.quality, ControlQuality::Neutral);

        // Commitment is rewarded: the rates are ordered.
        assert!(cfg.tight.charge_rate >= cfg.neutral.charge_rate);
        assert!(cfg.neutral.charge_rate >= cfg.shallow.charge_rate);
    }

    #[test]
    fn test_visual_decays_when_idle() {
        let cfg = STANDARD_KART;
        let mut visual = DriftVisual { yaw_offset: 0.4, lean: 0.2 };
        let idle = DriftState::default();
        for _ in 0..300 {
            visual.update(&idle, &cfg, DT);
        }
        assert!(visual.yaw_offset.abs() < 1e-3);
        assert!(visual.lean.abs() < 1e-3);
    }
}
