//! Ray queries against the collision world.

use crate::physics_world::{from_vector, to_point, to_vector};
use crate::PhysicsWorld;
use engine_core::Vec3;
use rapier3d::prelude::*;

/// Result of a raycast query.
#[derive(Debug, Clone, Copy)]
pub struct RaycastHit {
    /// The collider that was hit.
    pub collider: ColliderHandle,
    /// Distance along the ray to the hit point.
    pub distance: f32,
    /// World position of the hit.
    pub point: Vec3,
    /// Surface normal at the hit point.
    pub normal: Vec3,
}

impl PhysicsWorld {
    /// Cast a ray and return the first hit.
    pub fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RaycastHit> {
        self.raycast_filtered(origin, direction, max_distance, QueryFilter::default())
    }

    pub fn raycast_filtered(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        filter: QueryFilter,
    ) -> Option<RaycastHit> {
        let ray = Ray::new(to_point(origin), to_vector(direction));

        self.query_pipeline
            .cast_ray_and_get_normal(
                &self.rigid_body_set,
                &self.collider_set,
                &ray,
                max_distance,
                true,
                filter,
            )
            .map(|(collider, intersection)| {
                let point = ray.point_at(intersection.time_of_impact);
                RaycastHit {
                    collider,
                    distance: intersection.time_of_impact,
                    point: Vec3::new(point.x, point.y, point.z),
                    normal: from_vector(&intersection.normal),
                }
            })
    }

    /// Height of static ground directly below (or above) `(x, z)`, probing from
    /// `probe_height` straight down. Dynamic bodies are ignored.
    pub fn ground_height(&self, x: f32, z: f32, probe_height: f32) -> Option<f32> {
        let origin = Vec3::new(x, probe_height, z);
        self.raycast_filtered(origin, -Vec3::Y, probe_height * 2.0 + 1000.0, QueryFilter::only_fixed())
            .map(|hit| hit.point.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SurfaceMaterial;

    #[test]
    fn ground_probe_hits_sloped_triangle() {
        let mut world = PhysicsWorld::new();
        let positions = [
            [-10.0, 0.0, -10.0],
            [-10.0, 0.0, 10.0],
            [10.0, 4.0, -10.0],
            [10.0, 4.0, 10.0],
        ];
        world
            .add_static_trimesh(&positions, &[[0, 1, 2], [2, 1, 3]], SurfaceMaterial::ground())
            .unwrap();

        let h = world.ground_height(0.0, 0.0, 50.0).unwrap();
        assert!((h - 2.0).abs() < 1e-3);
        assert!(world.ground_height(30.0, 0.0, 50.0).is_none());
    }
}
