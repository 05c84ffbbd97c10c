// ==============================================================================
// simulation.rs — PER-TICK KART INTEGRATOR
// ==============================================================================
// One Kart = one vehicle + its own checkpoint tracker. tick() advances the
// whole thing by dt:
//
// 1) fall-off / respawn check
// 2) basis vectors + forward/lateral decomposition
// 3) drift hop + Pending trigger (edge press)
// 4) traction mode selection
// 5) longitudinal acceleration (brake vs accelerate by current motion sign)
// 6) drift lateral force
// 7) drag + coasting friction
// 8) boost force + timer decay
// 9) velocity integration
// 10) forward-speed clamp
// 11) lateral retention (the slide shaping)
// 12) steering (drift overrides manual steer; reverse steering mirrored)
// 13) wall pushback (a hit force-cancels an active drift, no boost)
// 14) vertical / ground resolution with snap gravity
// 15) drift state machine post-update
// 16) checkpoint tracker update, gated by the respawn cooldown
//
// Every branch is total: degenerate configs clamp or skip, nothing divides
// by an unguarded tunable, nothing panics.
// ==============================================================================

use rapier3d::prelude::{Real, Vector};

use crate::kart::checkpoint::CheckpointTracker;
use crate::kart::config::KartConfig;
use crate::kart::drift::{self, DriftPhase, DriftTick};
use crate::kart::respawn;
use crate::kart::util::{EPS, lerp, sign_or_zero};
use crate::kart::vehicle::{Controls, InputSnapshot, Vehicle};
use crate::track::{TrackData, TrackQuery};

/// Below this forward speed the kart counts as stationary for steering and
/// brake-vs-accelerate decisions.
const SPEED_EPS: Real = 0.05;

/// Which lateral-retention coefficient applies this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TractionMode {
    Normal,
    LowTraction, // both throttle inputs held
    Drift,
}

pub struct Kart {
    pub vehicle: Vehicle,
    pub tracker: CheckpointTracker,
    pub controls: Controls,
    prev_drift_held: bool,
}

impl Kart {
    /// Create a kart on the given start slot (falls back to the first slot,
    /// then checkpoint 0, then the origin).
    pub fn new(config: KartConfig, data: &TrackData, start_slot: usize) -> Self {
        let start = data
            .start_positions
            .get(start_slot)
            .or_else(|| data.start_positions.first());
        let (position, heading) = match start {
            Some(s) => (s.position, s.facing),
            None => match data.checkpoints.first() {
                Some(cp) => (cp.anchor, 0.0),
                None => (rapier3d::prelude::Point::origin(), 0.0),
            },
        };

        Self {
            vehicle: Vehicle::new(config, position, heading),
            tracker: CheckpointTracker::new(data, 0.0),
            controls: Controls::default(),
            prev_drift_held: false,
        }
    }

    /// Host-loop entry: convert the latched control levels into a per-tick
    /// snapshot (edges included) and advance the simulation.
    pub fn step(&mut self, dt: Real, track: &dyn TrackQuery, data: &TrackData) {
        let c = self.controls;
        let input = InputSnapshot {
            forward: c.forward,
            backward: c.backward,
            steer_left: c.steer_left,
            steer_right: c.steer_right,
            drift_held: c.drift,
            drift_just_pressed: c.drift && !self.prev_drift_held,
            respawn_requested: c.respawn,
        };
        self.prev_drift_held = c.drift;
        self.controls.respawn = false; // one-shot

        self.tick(dt, &input, track, data);
    }

    pub fn tick(&mut self, dt: Real, input: &InputSnapshot, track: &dyn TrackQuery, data: &TrackData) {
        let cfg = self.vehicle.config.clone();
        self.vehicle.race_time += dt;
        let now = self.vehicle.race_time;

        // Manual respawn request, before anything moves.
        if input.respawn_requested {
            respawn::respawn(&mut self.vehicle, &mut self.tracker, data, track);
        }

        // 1) Fall-off check.
        if self.vehicle.position.y < cfg.fall_off_threshold {
            self.vehicle.fall_off_timer += dt;
            if self.vehicle.fall_off_timer > cfg.fall_grace {
                respawn::respawn(&mut self.vehicle, &mut self.tracker, data, track);
            }
        } else {
            self.vehicle.fall_off_timer = 0.0;
        }

        let v = &mut self.vehicle;

        // 2) Basis vectors + decomposition.
        let was_grounded = v.grounded;
        let forward = v.forward();
        let right = v.right();
        let mut forward_speed = v.velocity.dot(&forward);

        // 3) Drift hop. The hop fires on the press edge even when the drift
        // never starts; the Pending arm happens regardless of grounding.
        if input.drift_just_pressed {
            if v.drift.phase == DriftPhase::Idle {
                v.drift.begin_pending();
            }
            if was_grounded {
                v.vertical_velocity = cfg.hop_velocity;
                v.grounded = false;
            }
        }

        // Brake-cancel bookkeeping for the drift machine.
        if input.forward && input.backward {
            v.dual_input_timer += dt;
        } else {
            v.dual_input_timer = 0.0;
        }

        // 4) Traction mode.
        let mode = if v.drift.is_active() {
            TractionMode::Drift
        } else if input.forward && input.backward {
            TractionMode::LowTraction
        } else {
            TractionMode::Normal
        };

        // 5) Longitudinal acceleration. Brake vs accelerate is decided by the
        // sign of the current forward speed, not by which key is held.
        let mut accel: Vector<Real> = Vector::zeros();
        match (input.forward, input.backward) {
            (true, false) => {
                if forward_speed < -SPEED_EPS {
                    accel += forward * cfg.brake_strength;
                } else {
                    accel += forward * cfg.accel_rate;
                }
            }
            (false, true) => {
                if forward_speed > SPEED_EPS {
                    accel -= forward * cfg.brake_strength;
                } else {
                    accel -= forward * (cfg.accel_rate * cfg.reverse_accel_factor);
                }
            }
            (true, true) => {
                accel += forward * (cfg.accel_rate * cfg.dual_input_creep);
            }
            (false, false) => {}
        }

        // 6) Drift lateral force, toward the outside of the turn.
        if v.drift.is_active() && v.drift.direction != 0.0 {
            accel += right * (-v.drift.direction * cfg.drift_lateral_force * v.drift.turn_multiplier);
        }

        // 7) Drag always; coasting friction only with no throttle and no boost.
        accel -= v.velocity * cfg.drag;
        if !input.forward && !input.backward && !v.boost.is_active() {
            accel -= v.velocity * cfg.natural_decel;
        }

        // 8) Boost.
        if v.boost.is_active() {
            accel += forward * v.boost.strength;
            v.boost.remaining -= dt;
            if v.boost.remaining <= 0.0 {
                v.boost.remaining = 0.0;
                v.boost.strength = 0.0;
            }
        }

        // 9) Integrate (horizontal plane only; vertical is step 14).
        v.velocity += accel * dt;
        v.velocity.y = 0.0;

        // 10) Speed limiting on the forward component; lateral stays unclamped
        // here.
        forward_speed = v
            .velocity
            .dot(&forward)
            .clamp(-cfg.max_speed * cfg.reverse_speed_factor, cfg.max_speed);
        let lateral_speed = v.velocity.dot(&right);
        v.velocity = forward * forward_speed + right * lateral_speed;

        // 11) Lateral retention: how much of the slide survives this tick.
        let retention = match mode {
            TractionMode::Normal => cfg.lateral_retention_normal,
            TractionMode::LowTraction => cfg.lateral_retention_low,
            TractionMode::Drift => cfg.lateral_retention_drift,
        };
        v.velocity = forward * forward_speed + right * (lateral_speed * retention);

        // 12) Steering. Turn rate is boosted at low speed; drifting overrides
        // manual steer entirely; reversing mirrors the steer direction.
        let speed_ratio = (forward_speed.abs() / cfg.max_speed.max(EPS)).clamp(0.0, 1.0);
        let turn_rate = cfg.turn_rate * lerp(cfg.low_speed_turn_boost, 1.0, speed_ratio);
        if v.drift.is_active() && v.drift.direction != 0.0 {
            v.heading +=
                v.drift.direction * turn_rate * cfg.drift_turn_multiplier * v.drift.turn_multiplier * dt;
        } else {
            let sign = sign_or_zero(forward_speed, SPEED_EPS);
            let mirror = if forward_speed < -SPEED_EPS {
                cfg.reverse_turn_multiplier
            } else {
                1.0
            };
            v.heading += input.steer() * turn_rate * sign * mirror * dt;
        }

        // 13) Wall collision on the proposed horizontal move.
        let proposed = v.position + v.velocity * dt;
        match track.wall_collision(&proposed, &cfg.footprint) {
            Some(hit) => {
                v.position = proposed + hit.pushback;
                if v.drift.is_active() {
                    // Forced release: no boost.
                    v.drift.reset();
                }
            }
            None => v.position = proposed,
        }

        // 14) Vertical / ground resolution.
        let ground = track.ground_height(&v.position);
        match &ground {
            Some(g) => {
                let was_above = v.position.y >= g.height - 1e-3;
                v.vertical_velocity += cfg.gravity * dt;
                if v.position.y - g.height < cfg.snap_band && v.vertical_velocity < 0.0 {
                    // Extra pull just above the surface so landings don't float.
                    v.vertical_velocity += cfg.snap_gravity * dt;
                }
                let new_y = v.position.y + v.vertical_velocity * dt;
                if was_above && new_y <= g.height {
                    v.position.y = g.height;
                    v.vertical_velocity = 0.0;
                    v.grounded = true;
                } else {
                    v.position.y = new_y;
                    v.grounded = false;
                }
            }
            None => {
                v.vertical_velocity += cfg.gravity * dt;
                v.position.y += v.vertical_velocity * dt;
                v.grounded = false;
            }
        }
        v.last_ground = ground;

        // 15) Drift post-update (needs this tick's grounded flag and speeds).
        let dtick = DriftTick {
            dt,
            grounded: v.grounded,
            forward_speed: v.velocity.dot(&forward),
            speed: v.velocity.norm(),
            steer: input.steer(),
            drift_held: input.drift_held,
            dual_input_time: v.dual_input_timer,
        };
        if let Some(award) = drift::update(&mut v.drift, &cfg, &dtick) {
            v.boost.remaining = award.duration;
            v.boost.strength = award.strength;
        }
        v.visual.update(&v.drift, &cfg, dt);

        // 16) Checkpoint tracking, gated by the respawn cooldown.
        if self.vehicle.checkpoint_cooldown <= 0.0 {
            self.tracker.update(data, &self.vehicle.position, now);
        }
        self.vehicle.checkpoint_cooldown = (self.vehicle.checkpoint_cooldown - dt).max(0.0);
    }
}
