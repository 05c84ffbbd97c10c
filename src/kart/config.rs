// ==============================================================================
// config.rs — KART TUNING CONSTANTS
// ==============================================================================
// Every tunable the simulation + drift machine reads lives here, as one
// config struct with named const presets (same scheme as a vehicle config
// table). Tests and gameplay balancing only ever touch this file.
// ==============================================================================

use rapier3d::prelude::Real;

use crate::kart::drift::ControlQuality;
use crate::kart::util::EPS;
use crate::track::Footprint;

/// One mini-turbo charge stage. Stages are configured as an ascending list:
/// `time` thresholds must be strictly increasing.
#[derive(Debug, Clone, Copy)]
pub struct DriftStage {
    pub time: Real,           // s of (rate-scaled) charge to reach this stage
    pub boost_duration: Real, // s of boost awarded on release
    pub boost_strength: Real, // m/s^2 added along forward while boosting
    pub color: [f32; 3],      // spark tint hint for renderers
}

/// Turn multiplier + charge rate for one drift control quality.
#[derive(Debug, Clone, Copy)]
pub struct QualityTuning {
    pub turn_multiplier: Real, // scales drift turn rate + lateral force
    pub charge_rate: Real,     // scales charge timer advance (1.0 = realtime)
}

#[derive(Debug, Clone)]
pub struct KartConfig {
    // --- Longitudinal ---
    pub accel_rate: Real,           // m/s^2
    pub brake_strength: Real,       // m/s^2
    pub reverse_accel_factor: Real, // fraction of accel_rate when reversing
    pub dual_input_creep: Real,     // fraction of accel_rate when both held
    pub drag: Real,                 // 1/s, proportional velocity drag
    pub natural_decel: Real,        // 1/s, extra drag while coasting
    pub max_speed: Real,            // m/s, forward cap
    pub reverse_speed_factor: Real, // reverse cap = max_speed * this

    // --- Steering ---
    pub turn_rate: Real,               // rad/s at full speed
    pub low_speed_turn_boost: Real,    // turn rate multiplier at standstill
    pub drift_turn_multiplier: Real,   // extra turn rate while drifting
    pub reverse_turn_multiplier: Real, // steering scale when reversing

    // --- Traction (per-tick lateral retention; higher keeps more slide) ---
    pub lateral_retention_normal: Real,
    pub lateral_retention_low: Real, // both throttle inputs held
    pub lateral_retention_drift: Real,

    // --- Drift / mini-turbo ---
    pub drift_lateral_force: Real,     // m/s^2 toward the outside of the turn
    pub drift_stages: &'static [DriftStage],
    pub drift_cancel_speed: Real,      // m/s, below this an active drift dies
    pub brake_cancel_duration: Real,   // s of dual-input hold that kills a drift
    pub drift_min_speed_ratio: Real,   // fraction of capped top speed
    pub drift_initiation_window: Real, // s on the ground before Pending expires
    pub tight: QualityTuning,          // steering into the turn
    pub neutral: QualityTuning,        // no steer input
    pub shallow: QualityTuning,        // steering against the turn

    // --- Vertical ---
    pub gravity: Real,      // m/s^2, negative
    pub snap_gravity: Real, // m/s^2 extra pull inside the snap band, negative
    pub snap_band: Real,    // m above the surface where snap gravity applies
    pub hop_velocity: Real, // m/s upward on a fresh drift press

    // --- Fall-off / respawn ---
    pub fall_off_threshold: Real,     // world y below which the fall timer runs
    pub fall_grace: Real,             // s below threshold before a respawn
    pub respawn_cooldown: Real,       // s of checkpoint suppression after teleport
    pub respawn_height_offset: Real,  // m above ground at the respawn anchor

    // --- Footprint (wall collision box) ---
    pub footprint: Footprint,

    // --- Visual hints (no gameplay effect) ---
    pub visual_yaw_max: Real,   // rad of model yaw offset at full drift
    pub visual_lean_max: Real,  // rad of lean at full drift
    pub visual_smoothing: Real, // s, exponential smoothing time constant
}

impl KartConfig {
    /// Theoretical top speed of the drag-limited integrator, `accel / drag`.
    /// Guarded so a degenerate zero drag never divides by zero.
    pub fn top_speed(&self) -> Real {
        self.accel_rate / self.drag.max(EPS)
    }

    /// Minimum forward speed required for Pending -> Active: the theoretical
    /// top speed capped at 90% of itself and at the configured max speed,
    /// scaled by the drift-minimum-speed ratio.
    pub fn drift_min_speed(&self) -> Real {
        let capped = (self.top_speed() * 0.9).min(self.max_speed);
        capped * self.drift_min_speed_ratio
    }

    pub fn quality(&self, quality: ControlQuality) -> QualityTuning {
        match quality {
            ControlQuality::Tight => self.tight,
            ControlQuality::Neutral => self.neutral,
            ControlQuality::Shallow => self.shallow,
        }
    }

    /// Highest stage index whose threshold the charge timer has reached,
    /// or -1 when no stage has been charged yet.
    pub fn stage_for_charge(&self, charge_timer: Real) -> i32 {
        let mut stage = -1;
        for (i, s) in self.drift_stages.iter().enumerate() {
            if s.time <= charge_timer {
                stage = i as i32;
            }
        }
        stage
    }
}

pub const STANDARD_STAGES: [DriftStage; 3] = [
    DriftStage { time: 0.9, boost_duration: 0.8, boost_strength: 18.0, color: [0.3, 0.6, 1.0] },
    DriftStage { time: 1.9, boost_duration: 1.2, boost_strength: 24.0, color: [1.0, 0.6, 0.15] },
    DriftStage { time: 3.0, boost_duration: 1.6, boost_strength: 30.0, color: [0.8, 0.3, 1.0] },
];

pub const STANDARD_KART: KartConfig = KartConfig {
    accel_rate: 26.0,
    brake_strength: 34.0,
    reverse_accel_factor: 0.45,
    dual_input_creep: 0.2,
    drag: 1.15,
    natural_decel: 0.9,
    max_speed: 21.0,
    reverse_speed_factor: 0.5,

    turn_rate: 1.9,
    low_speed_turn_boost: 1.6,
    drift_turn_multiplier: 1.35,
    reverse_turn_multiplier: 0.7,

    lateral_retention_normal: 0.2,
    lateral_retention_low: 0.45,
    lateral_retention_drift: 0.6,

    drift_lateral_force: 16.0,
    drift_stages: &STANDARD_STAGES,
    drift_cancel_speed: 4.0,
    brake_cancel_duration: 0.5,
    drift_min_speed_ratio: 0.55,
    drift_initiation_window: 0.075,
    tight: QualityTuning { turn_multiplier: 1.3, charge_rate: 1.0 },
    neutral: QualityTuning { turn_multiplier: 1.0, charge_rate: 0.75 },
    shallow: QualityTuning { turn_multiplier: 0.55, charge_rate: 0.4 },

    gravity: -30.0,
    snap_gravity: -60.0,
    snap_band: 0.6,
    hop_velocity: 6.5,

    fall_off_threshold: -20.0,
    fall_grace: 0.35,
    respawn_cooldown: 1.0,
    respawn_height_offset: 0.3,

    footprint: Footprint { width: 1.6, height: 1.2, length: 2.2 },

    visual_yaw_max: 0.45,
    visual_lean_max: 0.28,
    visual_smoothing: 0.12,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drift_min_speed_derivation() {
        let cfg = STANDARD_KART;
        let top = cfg.accel_rate / cfg.drag;
        let capped = (top * 0.9).min(cfg.max_speed);
        assert!((cfg.drift_min_speed() - capped * cfg.drift_min_speed_ratio).abs() < 1e-5);
        assert!(cfg.drift_min_speed() < cfg.max_speed);
    }

    #[test]
    fn test_zero_drag_stays_finite() {
        let mut cfg = STANDARD_KART.clone();
        cfg.drag = 0.0;
        assert!(cfg.top_speed().is_finite());
        assert!(cfg.drift_min_speed().is_finite());
    }

    #[test]
    fn test_stage_lookup() {
        let cfg = STANDARD_KART;
        assert_eq!(cfg.stage_for_charge(0.0), -1);
        assert_eq!(cfg.stage_for_charge(0.9), 0);
        assert_eq!(cfg.stage_for_charge(2.5), 1);
        assert_eq!(cfg.stage_for_charge(10.0), 2);
    }

    #[test]
    fn test_stage_thresholds_ascending() {
        for pair in STANDARD_STAGES.windows(2) {
            assert!(pair[0].time < pair[1].time);
        }
    }
}
