//! Frame-rate independent smoothing helpers.

use glam::Vec3;

/// Linear interpolation between two scalars.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Blend factor for exponential decay towards a target.
///
/// `decay` is the fraction of the remaining distance left after one second.
/// Two half-frames produce the same result as one full frame, so the motion
/// does not depend on the frame rate.
#[inline]
pub fn damping_factor(decay: f32, dt: f32) -> f32 {
    1.0 - decay.clamp(1e-9, 1.0).powf(dt.max(0.0))
}

/// Move `current` towards `target` by `damping_factor(decay, dt)`.
#[inline]
pub fn damp(current: f32, target: f32, decay: f32, dt: f32) -> f32 {
    lerp(current, target, damping_factor(decay, dt))
}

#[inline]
pub fn damp_vec3(current: Vec3, target: Vec3, decay: f32, dt: f32) -> Vec3 {
    current.lerp(target, damping_factor(decay, dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damping_is_frame_rate_independent() {
        let one_step = damp(0.0, 1.0, 0.1, 0.5);
        let half = damp(0.0, 1.0, 0.1, 0.25);
        let two_steps = damp(half, 1.0, 0.1, 0.25);
        assert!((one_step - two_steps).abs() < 1e-5);
    }

    #[test]
    fn decay_is_clamped() {
        assert_eq!(damping_factor(1.5, 1.0), 0.0);
        assert!(damping_factor(0.0, 1.0) > 0.999_999);
        assert_eq!(damping_factor(0.5, 0.0), 0.0);
    }

    #[test]
    fn damped_vector_converges() {
        let mut v = Vec3::ZERO;
        let target = Vec3::new(3.0, -2.0, 1.0);
        for _ in 0..600 {
            v = damp_vec3(v, target, 0.03, 1.0 / 60.0);
        }
        assert!((v - target).length() < 1e-3);
    }
}
