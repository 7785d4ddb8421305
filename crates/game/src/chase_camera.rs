//! Third-person camera that trails the chassis.

use engine_core::{damp_vec3, Transform, Vec3};
use renderer::Camera;

use crate::config::CameraTuning;

/// Smoothed camera position and look-at target.
#[derive(Debug, Clone)]
pub struct ChaseCamera {
    tuning: CameraTuning,
    position: Vec3,
    target: Vec3,
}

impl ChaseCamera {
    /// Start from an explicit pose; the first updates ease in from there.
    pub fn new(tuning: CameraTuning, position: Vec3, target: Vec3) -> Self {
        Self {
            tuning,
            position,
            target,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Where the camera wants to be for this chassis pose, before smoothing.
    pub fn desired(&self, chassis: &Transform) -> (Vec3, Vec3) {
        let mut position = chassis.transform_point(self.tuning.offset);
        position.y = position.y.max(chassis.position.y + self.tuning.min_height_above_chassis);
        let target = chassis.transform_point(self.tuning.look_ahead);
        (position, target)
    }

    /// Ease toward the desired pose. Non-finite chassis poses are ignored.
    pub fn update(&mut self, chassis: &Transform, dt: f32) {
        if !chassis.is_finite() {
            return;
        }
        let (position, target) = self.desired(chassis);
        self.position = damp_vec3(self.position, position, self.tuning.position_decay, dt);
        self.target = damp_vec3(self.target, target, self.tuning.target_decay, dt);
    }

    /// Render camera with this rig's lens settings.
    pub fn make_camera(&self, aspect: f32) -> Camera {
        Camera {
            position: self.position,
            target: self.target,
            fov_degrees: self.tuning.fov_degrees,
            near: self.tuning.near,
            far: self.tuning.far,
            aspect,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::Quat;

    fn rig() -> ChaseCamera {
        ChaseCamera::new(CameraTuning::default(), Vec3::new(0.0, 8.0, -12.0), Vec3::ZERO)
    }

    #[test]
    fn settles_on_offset_pose_behind_static_chassis() {
        let mut cam = rig();
        let chassis = Transform::from_position(Vec3::new(4.0, 1.0, -3.0));
        for _ in 0..(5 * 60) {
            cam.update(&chassis, 1.0 / 60.0);
        }
        assert!(cam.position().distance(Vec3::new(-6.0, 6.0, -3.0)) < 1e-3);
        assert!(cam.target().distance(Vec3::new(9.0, 2.5, -3.0)) < 1e-3);
    }

    #[test]
    fn offset_follows_chassis_heading() {
        let cam = rig();
        let yaw = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let chassis = Transform::from_position_rotation(Vec3::ZERO, yaw);
        let (position, target) = cam.desired(&chassis);
        // Forward (+X) rotated a quarter turn about Y points along -Z.
        assert!(position.distance(Vec3::new(0.0, 5.0, 10.0)) < 1e-4);
        assert!(target.distance(Vec3::new(0.0, 1.5, -5.0)) < 1e-4);
    }

    #[test]
    fn upside_down_chassis_keeps_camera_above() {
        let cam = rig();
        let upside_down = Quat::from_rotation_x(std::f32::consts::PI);
        let chassis = Transform::from_position_rotation(Vec3::new(0.0, 2.0, 0.0), upside_down);
        let (position, _) = cam.desired(&chassis);
        assert!((position.y - 3.5).abs() < 1e-4);
    }

    #[test]
    fn smoothing_is_frame_rate_independent() {
        let chassis = Transform::from_position(Vec3::new(20.0, 0.0, 0.0));
        let mut coarse = rig();
        let mut fine = rig();
        coarse.update(&chassis, 0.5);
        for _ in 0..50 {
            fine.update(&chassis, 0.01);
        }
        assert!(coarse.position().distance(fine.position()) < 1e-3);
    }

    #[test]
    fn non_finite_chassis_is_ignored() {
        let mut cam = rig();
        let before = cam.position();
        cam.update(&Transform::from_position(Vec3::NAN), 0.1);
        assert_eq!(cam.position(), before);
    }
}
