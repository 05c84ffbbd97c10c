// src/kart/vehicle.rs
//
// Mutable per-kart state + the input snapshot the simulation consumes each
// tick. One Vehicle per player, created at race start and re-used across
// respawns.

use rapier3d::prelude::{Point, Real, Vector};

use crate::kart::config::KartConfig;
use crate::kart::drift::{DriftState, DriftVisual};
use crate::track::GroundHit;

/// Latched control levels, written by the net layer whenever an input
/// message arrives. The world converts these into per-tick snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct Controls {
    pub forward: bool,
    pub backward: bool,
    pub steer_left: bool,
    pub steer_right: bool,
    pub drift: bool,
    pub respawn: bool,
}

/// One tick's worth of input, edges included.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    pub forward: bool,
    pub backward: bool,
    pub steer_left: bool,
    pub steer_right: bool,
    pub drift_held: bool,
    pub drift_just_pressed: bool,
    pub respawn_requested: bool,
}

impl InputSnapshot {
    /// Steer axis: -1 left, +1 right, 0 when neither or both are held.
    pub fn steer(&self) -> Real {
        (self.steer_right as i8 - self.steer_left as i8) as Real
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BoostState {
    pub remaining: Real, // s
    pub strength: Real,  // m/s^2
}

impl BoostState {
    pub fn is_active(&self) -> bool {
        self.remaining > 0.0
    }
}

pub struct Vehicle {
    pub config: KartConfig,
    pub position: Point<Real>,
    pub heading: Real,              // radians, forward = (sin h, 0, cos h)
    pub velocity: Vector<Real>,     // world space, horizontal (y stays 0)
    pub vertical_velocity: Real,    // m/s
    pub grounded: bool,
    pub last_ground: Option<GroundHit>,
    pub drift: DriftState,
    pub visual: DriftVisual,
    pub boost: BoostState,
    pub fall_off_timer: Real,       // s continuously below the fall threshold
    pub checkpoint_cooldown: Real,  // s of tracker suppression after a teleport
    pub dual_input_timer: Real,     // s both throttle inputs have been held
    pub race_time: Real,            // s since this kart's race started
}

impl Vehicle {
    pub fn new(config: KartConfig, position: Point<Real>, heading: Real) -> Self {
        Self {
            config,
            position,
            heading,
            velocity: Vector::zeros(),
            vertical_velocity: 0.0,
            grounded: false,
            last_ground: None,
            drift: DriftState::default(),
            visual: DriftVisual::default(),
            boost: BoostState::default(),
            fall_off_timer: 0.0,
            checkpoint_cooldown: 0.0,
            dual_input_timer: 0.0,
            race_time: 0.0,
        }
    }

    pub fn forward(&self) -> Vector<Real> {
        Vector::new(self.heading.sin(), 0.0, self.heading.cos())
    }

    /// up x forward; unit length since forward is horizontal.
    pub fn right(&self) -> Vector<Real> {
        Vector::new(self.heading.cos(), 0.0, -self.heading.sin())
    }

    pub fn forward_speed(&self) -> Real {
        self.velocity.dot(&self.forward())
    }

    pub fn speed(&self) -> Real {
        self.velocity.norm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kart::config::STANDARD_KART;

    #[test]
    fn test_basis_is_orthonormal() {
        let mut v = Vehicle::new(STANDARD_KART, Point::origin(), 0.0);
        for heading in [0.0, 0.7, -1.3, 2.9] {
            v.heading = heading;
            let f = v.forward();
            let r = v.right();
            assert!((f.norm() - 1.0).abs() < 1e-6);
            assert!((r.norm() - 1.0).abs() < 1e-6);
            assert!(f.dot(&r).abs() < 1e-6);
        }
    }

    #[test]
    fn test_steer_axis() {
        let mut input = InputSnapshot::default();
        assert_eq!(input.steer(), 0.0);
        input.steer_left = true;
        assert_eq!(input.steer(), -1.0);
        input.steer_right = true;
        assert_eq!(input.steer(), 0.0);
    }
}
