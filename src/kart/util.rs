// src/kart/util.rs
//
// Tiny scalar helpers shared by the simulation + drift modules.

use rapier3d::prelude::Real;

/// Guard value for divisions by tunables (drag, max speed, time constants).
pub const EPS: Real = 1e-4;

#[inline]
pub fn lerp(a: Real, b: Real, t: Real) -> Real {
    a + (b - a) * t
}

/// Exponential smoothing step toward `target` with time constant `tau` (seconds).
/// `tau <= 0` snaps to the target.
#[inline]
pub fn smooth_toward(current: Real, target: Real, tau: Real, dt: Real) -> Real {
    if tau <= EPS {
        return target;
    }
    let alpha = 1.0 - (-dt / tau).exp();
    current + (target - current) * alpha
}

/// Sign with a dead zone: 0.0 when |v| <= eps.
#[inline]
pub fn sign_or_zero(v: Real, eps: Real) -> Real {
    if v > eps {
        1.0
    } else if v < -eps {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smooth_toward_converges() {
        let mut v = 0.0;
        for _ in 0..200 {
            v = smooth_toward(v, 1.0, 0.1, 1.0 / 60.0);
        }
        assert!((v - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_smooth_toward_snaps_on_zero_tau() {
        assert_eq!(smooth_toward(0.0, 5.0, 0.0, 0.016), 5.0);
    }

    #[test]
    fn test_sign_or_zero_dead_zone() {
        assert_eq!(sign_or_zero(0.0, 0.01), 0.0);
        assert_eq!(sign_or_zero(0.5, 0.01), 1.0);
        assert_eq!(sign_or_zero(-0.5, 0.01), -1.0);
    }
}
