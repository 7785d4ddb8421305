//! Physics world management with Rapier3D.

use std::num::NonZeroUsize;

use crate::collision::{CollisionGroup, SurfaceMaterial};
use engine_core::{Quat, Transform, Vec3, Velocity};
use rapier3d::na::{Quaternion, UnitQuaternion};
use rapier3d::prelude::*;
use thiserror::Error;

/// Errors surfaced by the physics adapter.
#[derive(Debug, Error)]
pub enum PhysicsError {
    #[error("rigid body {0:?} has a non-finite pose or velocity, refusing to integrate")]
    NonFiniteBody(RigidBodyHandle),
    #[error("invalid collision mesh: {0}")]
    InvalidMesh(String),
}

/// Integration settings for a [`PhysicsWorld`].
#[derive(Debug, Clone, Copy)]
pub struct WorldSettings {
    pub gravity: Vec3,
    /// Length of one integration step in seconds.
    pub timestep: f32,
    pub solver_iterations: usize,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.82, 0.0),
            timestep: 1.0 / 60.0,
            solver_iterations: 25,
        }
    }
}

pub(crate) fn to_vector(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

pub(crate) fn to_point(v: Vec3) -> Point<Real> {
    point![v.x, v.y, v.z]
}

pub(crate) fn from_vector(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

pub(crate) fn from_point(p: &Point<Real>) -> Vec3 {
    Vec3::new(p.x, p.y, p.z)
}

pub(crate) fn from_rotation(rot: &Rotation<Real>) -> Quat {
    Quat::from_xyzw(rot.i, rot.j, rot.k, rot.w)
}

pub(crate) fn to_rotation(q: Quat) -> Rotation<Real> {
    UnitQuaternion::new_normalize(Quaternion::new(q.w, q.x, q.y, q.z))
}

fn body_is_finite(body: &RigidBody) -> bool {
    body.translation().iter().all(|c| c.is_finite())
        && body.rotation().coords.iter().all(|c| c.is_finite())
        && body.linvel().iter().all(|c| c.is_finite())
        && body.angvel().iter().all(|c| c.is_finite())
}

/// Main physics world containing all simulation state.
pub struct PhysicsWorld {
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub gravity: Vector<Real>,
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    pub query_pipeline: QueryPipeline,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    /// Create a new physics world with default settings.
    pub fn new() -> Self {
        Self::with_settings(WorldSettings::default())
    }

    pub fn with_settings(settings: WorldSettings) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = settings.timestep;
        if let Some(iterations) = NonZeroUsize::new(settings.solver_iterations) {
            integration_parameters.num_solver_iterations = iterations;
        }

        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            gravity: to_vector(settings.gravity),
            integration_parameters,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    /// Length of one step in seconds.
    pub fn timestep(&self) -> f32 {
        self.integration_parameters.dt
    }

    /// Step the physics simulation by one fixed timestep.
    ///
    /// A dynamic body carrying NaN or infinite state would poison every contact
    /// it touches, so the step is refused and the offending body reported.
    pub fn step(&mut self) -> Result<(), PhysicsError> {
        if let Some((handle, _)) = self
            .rigid_body_set
            .iter()
            .find(|(_, body)| body.is_dynamic() && !body_is_finite(body))
        {
            return Err(PhysicsError::NonFiniteBody(handle));
        }

        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
        Ok(())
    }

    /// Update query pipeline for raycasting.
    pub fn update_query_pipeline(&mut self) {
        self.query_pipeline.update(&self.collider_set);
    }

    /// Add a static triangle-mesh collider (terrain).
    ///
    /// `positions` and `indices` are used as-is, so the collision surface matches
    /// the render mesh built from the same buffers vertex for vertex.
    pub fn add_static_trimesh(
        &mut self,
        positions: &[[f32; 3]],
        indices: &[[u32; 3]],
        material: SurfaceMaterial,
    ) -> Result<ColliderHandle, PhysicsError> {
        if positions.is_empty() || indices.is_empty() {
            return Err(PhysicsError::InvalidMesh("mesh has no triangles".into()));
        }
        let vertex_count = positions.len() as u32;
        if let Some(tri) = indices.iter().find(|tri| tri.iter().any(|&i| i >= vertex_count)) {
            return Err(PhysicsError::InvalidMesh(format!(
                "triangle {:?} indexes past {} vertices",
                tri, vertex_count
            )));
        }
        if positions.iter().flatten().any(|c| !c.is_finite()) {
            return Err(PhysicsError::InvalidMesh("non-finite vertex position".into()));
        }

        let vertices: Vec<Point<Real>> = positions.iter().map(|p| point![p[0], p[1], p[2]]).collect();
        let builder = ColliderBuilder::trimesh(vertices, indices.to_vec())
            .collision_groups(CollisionGroup::interaction_groups(CollisionGroup::terrain()));
        let collider = material.apply(builder).build();
        let handle = self.collider_set.insert(collider);
        self.update_query_pipeline();
        Ok(handle)
    }

    /// Remove a collider by its handle.
    pub fn remove_collider(&mut self, handle: ColliderHandle) {
        self.collider_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.rigid_body_set,
            true,
        );
    }

    /// Get the transform of a rigid body.
    pub fn get_body_transform(&self, handle: RigidBodyHandle) -> Option<Transform> {
        self.rigid_body_set.get(handle).map(|body| {
            Transform::from_position_rotation(
                from_vector(body.translation()),
                from_rotation(body.rotation()),
            )
        })
    }

    pub fn get_body_velocity(&self, handle: RigidBodyHandle) -> Option<Velocity> {
        self.rigid_body_set
            .get(handle)
            .map(|body| Velocity::with_angular(from_vector(body.linvel()), from_vector(body.angvel())))
    }

    /// Place a body at `pose` with zero velocity and no pending forces.
    pub fn teleport_body(&mut self, handle: RigidBodyHandle, pose: &Transform) {
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            body.set_translation(to_vector(pose.position), true);
            body.set_rotation(to_rotation(pose.rotation), true);
            body.reset_forces(true);
            body.reset_torques(true);
            body.wake_up(true);
        }
        self.set_body_velocity(handle, Velocity::ZERO);
    }

    /// Overwrite a body's velocity. Mostly useful for setting up test scenarios.
    pub fn set_body_velocity(&mut self, handle: RigidBodyHandle, velocity: Velocity) {
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            body.set_linvel(to_vector(velocity.linear), true);
            body.set_angvel(to_vector(velocity.angular), true);
        }
    }

    /// Remove a rigid body and its colliders.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
    }

    pub fn contains_body(&self, handle: RigidBodyHandle) -> bool {
        self.rigid_body_set.contains(handle)
    }

    /// True when the body exists and its pose and velocity are all finite.
    pub fn is_body_finite(&self, handle: RigidBodyHandle) -> bool {
        self.rigid_body_set.get(handle).is_some_and(body_is_finite)
    }
}
