//! Raycast-wheel vehicle body on top of Rapier's vehicle controller.
//!
//! Chassis-local axes: +X forward, +Y up, +Z right. Wheels cast along -Y and spin
//! around +Z. Every per-wheel command addresses a wheel by the index it was added
//! with; out-of-range indices are ignored.

use crate::collision::{CollisionGroup, SurfaceMaterial};
use crate::physics_world::{from_point, to_point, to_rotation, to_vector};
use crate::PhysicsWorld;
use engine_core::{Quat, Transform, Vec3, Velocity};
use rapier3d::control::{DynamicRayCastVehicleController, WheelTuning};
use rapier3d::prelude::*;

/// Chassis body description: a hull box plus a thin skid plate underneath.
#[derive(Debug, Clone, Copy)]
pub struct ChassisDesc {
    pub half_extents: Vec3,
    pub skid_half_extents: Vec3,
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub material: SurfaceMaterial,
}

impl ChassisDesc {
    /// Local centre of the skid plate: just under the hull, overlapping it by a centimetre.
    pub fn skid_offset(&self) -> Vec3 {
        Vec3::new(0.0, -self.half_extents.y - self.skid_half_extents.y + 0.01, 0.0)
    }

    fn volume(&self) -> f32 {
        let hull = self.half_extents * 2.0;
        let skid = self.skid_half_extents * 2.0;
        hull.x * hull.y * hull.z + skid.x * skid.y * skid.z
    }
}

/// One wheel: where it hangs off the chassis and how its suspension behaves.
#[derive(Debug, Clone, Copy)]
pub struct WheelDesc {
    /// Chassis-local suspension attachment point.
    pub connection: Vec3,
    pub radius: f32,
    /// Visual width only; the wheel itself is a ray.
    pub width: f32,
    pub rest_length: f32,
    pub max_travel: f32,
    pub stiffness: f32,
    pub damping_compression: f32,
    pub damping_relaxation: f32,
    pub friction_slip: f32,
    pub max_suspension_force: f32,
}

impl WheelDesc {
    fn tuning(&self) -> WheelTuning {
        WheelTuning {
            suspension_stiffness: self.stiffness,
            suspension_compression: self.damping_compression,
            suspension_damping: self.damping_relaxation,
            max_suspension_travel: self.max_travel,
            friction_slip: self.friction_slip,
            max_suspension_force: self.max_suspension_force,
            ..WheelTuning::default()
        }
    }
}

/// Commands currently applied to a wheel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelCommand {
    pub engine_force: f32,
    pub brake: f32,
    pub steering: f32,
}

/// World-space pose of a wheel for rendering.
#[derive(Debug, Clone, Copy)]
pub struct WheelPose {
    pub transform: Transform,
    pub radius: f32,
    pub width: f32,
    pub in_contact: bool,
    pub suspension_length: f32,
}

/// A dynamic chassis with raycast wheels.
pub struct RaycastVehicle {
    chassis: RigidBodyHandle,
    controller: DynamicRayCastVehicleController,
    widths: Vec<f32>,
}

impl RaycastVehicle {
    /// Insert the chassis body and its colliders into `world` and attach `wheels`.
    pub fn build(world: &mut PhysicsWorld, spawn: &Transform, chassis: &ChassisDesc, wheels: &[WheelDesc]) -> Self {
        let body = RigidBodyBuilder::dynamic()
            .position(Isometry::from_parts(
                to_vector(spawn.position).into(),
                to_rotation(spawn.rotation),
            ))
            .linear_damping(chassis.linear_damping)
            .angular_damping(chassis.angular_damping)
            .can_sleep(false)
            .build();
        let handle = world.rigid_body_set.insert(body);

        let density = chassis.mass / chassis.volume().max(f32::EPSILON);
        let groups = CollisionGroup::interaction_groups(CollisionGroup::chassis());
        let he = chassis.half_extents;
        let hull = chassis
            .material
            .apply(ColliderBuilder::cuboid(he.x, he.y, he.z))
            .density(density)
            .collision_groups(groups)
            .build();
        world
            .collider_set
            .insert_with_parent(hull, handle, &mut world.rigid_body_set);

        let skid = chassis.skid_half_extents;
        let skid_collider = chassis
            .material
            .apply(ColliderBuilder::cuboid(skid.x, skid.y, skid.z))
            .translation(to_vector(chassis.skid_offset()))
            .density(density)
            .collision_groups(groups)
            .build();
        world
            .collider_set
            .insert_with_parent(skid_collider, handle, &mut world.rigid_body_set);

        let mut controller = DynamicRayCastVehicleController::new(handle);
        for wheel in wheels {
            controller.add_wheel(
                to_point(wheel.connection),
                -Vector::y(),
                Vector::z(),
                wheel.rest_length,
                wheel.radius,
                &wheel.tuning(),
            );
        }

        log::debug!(
            "Built vehicle chassis {:?}: mass {:.1} kg, {} wheels",
            handle,
            chassis.mass,
            wheels.len()
        );

        Self {
            chassis: handle,
            controller,
            widths: wheels.iter().map(|w| w.width).collect(),
        }
    }

    pub fn chassis_handle(&self) -> RigidBodyHandle {
        self.chassis
    }

    pub fn wheel_count(&self) -> usize {
        self.controller.wheels().len()
    }

    pub fn apply_engine_force(&mut self, force: f32, wheel_index: usize) {
        if let Some(wheel) = self.controller.wheels_mut().get_mut(wheel_index) {
            wheel.engine_force = force;
        }
    }

    pub fn set_brake(&mut self, brake: f32, wheel_index: usize) {
        if let Some(wheel) = self.controller.wheels_mut().get_mut(wheel_index) {
            wheel.brake = brake;
        }
    }

    /// Steering angle in radians; positive turns left.
    pub fn set_steering_value(&mut self, angle: f32, wheel_index: usize) {
        if let Some(wheel) = self.controller.wheels_mut().get_mut(wheel_index) {
            wheel.steering = angle;
        }
    }

    pub fn wheel_command(&self, wheel_index: usize) -> Option<WheelCommand> {
        self.controller.wheels().get(wheel_index).map(|wheel| WheelCommand {
            engine_force: wheel.engine_force,
            brake: wheel.brake,
            steering: wheel.steering,
        })
    }

    /// Cast the wheel rays and apply suspension and friction impulses to the
    /// chassis. Call once per physics step, before the world steps. Skipped while
    /// the chassis is missing or its state is non-finite.
    pub fn update(&mut self, world: &mut PhysicsWorld, dt: f32) {
        if !world.is_body_finite(self.chassis) {
            return;
        }
        let filter = QueryFilter::exclude_dynamic().exclude_rigid_body(self.chassis);
        self.controller.update_vehicle(
            dt,
            &mut world.rigid_body_set,
            &world.collider_set,
            &world.query_pipeline,
            filter,
        );
    }

    pub fn chassis_transform(&self, world: &PhysicsWorld) -> Option<Transform> {
        world.get_body_transform(self.chassis)
    }

    pub fn chassis_velocity(&self, world: &PhysicsWorld) -> Option<Velocity> {
        world.get_body_velocity(self.chassis)
    }

    /// World pose of a wheel: chassis orientation, then steering yaw, then spin.
    pub fn wheel_pose(&self, world: &PhysicsWorld, wheel_index: usize) -> Option<WheelPose> {
        let chassis = self.chassis_transform(world)?;
        let wheel = self.controller.wheels().get(wheel_index)?;
        let info = wheel.raycast_info();

        let length = if info.suspension_length > 0.0 {
            info.suspension_length
        } else {
            wheel.suspension_rest_length
        };
        let hard_point = chassis.transform_point(from_point(&wheel.chassis_connection_point_cs));
        let center = hard_point + chassis.transform_vector(-Vec3::Y) * length;

        let rotation = chassis.rotation
            * Quat::from_rotation_y(wheel.steering)
            * Quat::from_rotation_z(-wheel.rotation);

        Some(WheelPose {
            transform: Transform::from_position_rotation(center, rotation),
            radius: wheel.radius,
            width: self.widths.get(wheel_index).copied().unwrap_or(0.0),
            in_contact: info.is_in_contact,
            suspension_length: info.suspension_length,
        })
    }

    /// Remove the chassis body and its colliders from `world`.
    pub fn despawn(self, world: &mut PhysicsWorld) {
        world.remove_body(self.chassis);
        log::debug!("Despawned vehicle chassis {:?}", self.chassis);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_chassis() -> ChassisDesc {
        ChassisDesc {
            half_extents: Vec3::new(1.4, 0.25, 0.85),
            skid_half_extents: Vec3::new(1.26, 0.025, 0.8075),
            mass: 160.0,
            linear_damping: 0.25,
            angular_damping: 0.7,
            material: SurfaceMaterial::chassis(),
        }
    }

    fn test_wheels() -> Vec<WheelDesc> {
        let base = WheelDesc {
            connection: Vec3::ZERO,
            radius: 0.4,
            width: 0.3,
            rest_length: 0.45,
            max_travel: 0.5,
            stiffness: 35.0,
            damping_compression: 5.0,
            damping_relaxation: 5.0,
            friction_slip: 2.2,
            max_suspension_force: 100_000.0,
        };
        [(1.0, -0.85), (1.0, 0.85), (-1.0, -0.85), (-1.0, 0.85)]
            .into_iter()
            .map(|(x, z)| WheelDesc {
                connection: Vec3::new(x, 0.0, z),
                ..base
            })
            .collect()
    }

    fn flat_world() -> PhysicsWorld {
        let mut world = PhysicsWorld::new();
        let positions = [
            [-100.0, 0.0, -100.0],
            [-100.0, 0.0, 100.0],
            [100.0, 0.0, -100.0],
            [100.0, 0.0, 100.0],
        ];
        world
            .add_static_trimesh(&positions, &[[0, 1, 2], [2, 1, 3]], SurfaceMaterial::ground())
            .unwrap();
        world
    }

    #[test]
    fn wheel_commands_address_by_index() {
        let mut world = flat_world();
        let spawn = Transform::from_position(Vec3::new(0.0, 2.0, 0.0));
        let mut vehicle = RaycastVehicle::build(&mut world, &spawn, &test_chassis(), &test_wheels());

        vehicle.apply_engine_force(450.0, 2);
        vehicle.set_brake(80.0, 0);
        vehicle.set_steering_value(0.3, 1);
        vehicle.apply_engine_force(1.0, 9);

        assert_eq!(vehicle.wheel_count(), 4);
        assert_eq!(vehicle.wheel_command(2).unwrap().engine_force, 450.0);
        assert_eq!(vehicle.wheel_command(0).unwrap().brake, 80.0);
        assert_eq!(vehicle.wheel_command(1).unwrap().steering, 0.3);
        assert!(vehicle.wheel_command(9).is_none());
    }

    #[test]
    fn suspension_holds_chassis_off_the_ground() {
        let mut world = flat_world();
        let spawn = Transform::from_position(Vec3::new(0.0, 1.5, 0.0));
        let mut vehicle = RaycastVehicle::build(&mut world, &spawn, &test_chassis(), &test_wheels());

        let dt = world.timestep();
        for _ in 0..240 {
            vehicle.update(&mut world, dt);
            world.step().unwrap();
        }

        let pose = vehicle.chassis_transform(&world).unwrap();
        assert!(pose.position.y > 0.5, "chassis sank to {}", pose.position.y);
        assert!(pose.up().dot(Vec3::Y) > 0.95);
        let wheel = vehicle.wheel_pose(&world, 0).unwrap();
        assert!(wheel.in_contact);
    }

    #[test]
    fn despawn_removes_chassis() {
        let mut world = flat_world();
        let vehicle = RaycastVehicle::build(
            &mut world,
            &Transform::from_position(Vec3::Y * 2.0),
            &test_chassis(),
            &test_wheels(),
        );
        let handle = vehicle.chassis_handle();
        vehicle.despawn(&mut world);
        assert!(!world.contains_body(handle));
        assert_eq!(world.collider_set.len(), 1);
    }
}
