//! Frame orchestration: fixed-step physics, deferred tasks, vehicle logic,
//! camera and HUD, in that order.
//!
//! Physics and smoothing run on the clamped frame delta. Deferred tasks run on
//! real elapsed time, so a stalled frame does not stretch their delays.

use anyhow::Result;
use engine_core::{FixedTimestep, Scheduler, Vec3};
use input::ActionProvider;
use physics::PhysicsWorld;

use crate::chase_camera::ChaseCamera;
use crate::config::GameConfig;
use crate::hud::{self, DistanceUnit, HudSink};
use crate::vehicle::{ResetEvent, Vehicle, VehicleTask};
use crate::world::Ground;

/// Camera pose before the first frame: up and behind the origin, looking at it.
const INITIAL_CAMERA_POSITION: Vec3 = Vec3::new(0.0, 8.0, -12.0);

/// What happened during one call to [`Simulation::frame`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReport {
    /// Physics steps actually run.
    pub substeps: u32,
    /// Set when the vehicle went back to spawn this frame.
    pub reset: Option<ResetEvent>,
}

pub struct Simulation {
    physics: PhysicsWorld,
    ground: Ground,
    vehicle: Vehicle,
    camera: ChaseCamera,
    scheduler: Scheduler<VehicleTask>,
    timestep: FixedTimestep,
    max_frame_delta: f32,
    distance_unit: Option<DistanceUnit>,
}

impl Simulation {
    /// Build the world: terrain collider, vehicle at spawn, camera at its start pose.
    pub fn new(config: &GameConfig) -> Result<Self> {
        let mut physics = PhysicsWorld::with_settings(config.physics.world_settings());
        let ground = Ground::build(config.terrain.clone(), &mut physics)?;
        let vehicle = Vehicle::spawn(&mut physics, config.vehicle.clone());
        let camera = ChaseCamera::new(config.camera.clone(), INITIAL_CAMERA_POSITION, Vec3::ZERO);

        Ok(Self {
            physics,
            ground,
            vehicle,
            camera,
            scheduler: Scheduler::new(),
            timestep: FixedTimestep::new(config.physics.fixed_step, config.physics.max_substeps),
            max_frame_delta: config.physics.max_frame_delta,
            distance_unit: config.distance_unit,
        })
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn ground(&self) -> &Ground {
        &self.ground
    }

    pub fn vehicle(&self) -> &Vehicle {
        &self.vehicle
    }

    pub fn camera(&self) -> &ChaseCamera {
        &self.camera
    }

    pub fn pending_tasks(&self) -> usize {
        self.scheduler.pending()
    }

    pub fn timestep(&self) -> &FixedTimestep {
        &self.timestep
    }

    /// Advance everything by one rendered frame. `dt` drives physics, vehicle
    /// and camera and is clamped to `max_frame_delta`; `real_dt` is the wall
    /// time since the previous frame and drives deferred tasks.
    pub fn frame(
        &mut self,
        dt: f32,
        real_dt: f32,
        input: &dyn ActionProvider,
        hud: &mut dyn HudSink,
    ) -> FrameReport {
        let dt = if dt.is_finite() { dt.clamp(0.0, self.max_frame_delta) } else { 0.0 };

        let substeps = self.timestep.advance(dt);
        let step = self.timestep.step_seconds();
        let mut completed = 0;
        for _ in 0..substeps {
            self.vehicle.integrate(&mut self.physics, step);
            if let Err(e) = self.physics.step() {
                log::error!("Physics step failed: {}", e);
                break;
            }
            completed += 1;
        }

        // Before the vehicle update, so a task queued by this frame's reset
        // starts counting down on the next frame.
        for task in self.scheduler.advance(real_dt) {
            self.vehicle.handle_task(task);
        }

        let reset = self
            .vehicle
            .update(&mut self.physics, input, &mut self.scheduler, dt);

        if let Some(chassis) = self.vehicle.chassis_transform(&self.physics) {
            self.camera.update(&chassis, dt);
        }

        let speed = self
            .vehicle
            .chassis_velocity(&self.physics)
            .map(|v| v.speed())
            .unwrap_or(0.0);
        hud::publish(hud, speed, self.vehicle.distance(), self.distance_unit);

        FrameReport {
            substeps: completed,
            reset,
        }
    }

    /// Remove the vehicle from the world; pending tasks are dropped with it.
    pub fn despawn_vehicle(&mut self) {
        self.vehicle.despawn(&mut self.physics);
    }

    /// Release every physics handle this simulation owns.
    pub fn shutdown(mut self) {
        self.despawn_vehicle();
        self.scheduler.clear();
        self.ground.despawn(&mut self.physics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hud::HudText;
    use crate::vehicle::{ResetCause, FRONT_LEFT};
    use engine_core::Velocity;
    use input::{Action, ActionState};
    use procgen::TerrainConfig;

    const DT: f32 = 1.0 / 60.0;

    fn flat_sim() -> Simulation {
        let config = GameConfig {
            terrain: TerrainConfig::flat(400.0, 8),
            ..Default::default()
        };
        Simulation::new(&config).unwrap()
    }

    fn run(sim: &mut Simulation, input: &ActionState, hud: &mut HudText, seconds: f32) {
        let frames = (seconds / DT).round() as usize;
        for _ in 0..frames {
            sim.frame(DT, DT, input, hud);
        }
    }

    fn chassis_position(sim: &Simulation) -> Vec3 {
        sim.vehicle().chassis_transform(sim.physics()).unwrap().position
    }

    #[test]
    fn vehicle_settles_on_flat_ground() {
        let mut sim = flat_sim();
        let mut hud = HudText::default();
        run(&mut sim, &ActionState::new(), &mut hud, 3.0);

        let position = chassis_position(&sim);
        assert!(position.y > 0.5 && position.y < 2.0, "chassis at {position}");
        assert!(!sim.vehicle().is_flipped());
        assert!(hud.speed.parse::<i64>().unwrap() < 2);
    }

    #[test]
    fn holding_forward_moves_vehicle_forward() {
        let mut sim = flat_sim();
        let mut hud = HudText::default();
        run(&mut sim, &ActionState::new(), &mut hud, 2.0);
        let start = chassis_position(&sim);

        let mut input = ActionState::new();
        input.set(Action::Forward, true);
        let mut last = 0.0;
        for _ in 0..4 {
            run(&mut sim, &input, &mut hud, 0.5);
            let displacement = chassis_position(&sim).x - start.x;
            assert!(displacement > last, "displacement {displacement} after {last}");
            last = displacement;
        }
        assert!(sim.vehicle().distance() > 0.0);
        assert!(hud.speed.parse::<i64>().unwrap() > 0);
    }

    #[test]
    fn reset_action_returns_to_spawn_within_the_frame() {
        let mut sim = flat_sim();
        let mut hud = HudText::default();
        let mut input = ActionState::new();
        input.set(Action::Forward, true);
        run(&mut sim, &input, &mut hud, 2.0);
        input.set(Action::Left, true);
        run(&mut sim, &input, &mut hud, 0.2);
        assert!(sim.vehicle().distance() > 0.0);
        assert!(sim.vehicle().steering() > 0.0);

        let mut input = ActionState::new();
        input.set(Action::Reset, true);
        let report = sim.frame(DT, DT, &input, &mut hud);

        let event = report.reset.unwrap();
        assert_eq!(event.cause, ResetCause::Manual);
        assert!(event.distance > 0.0);

        let velocity = sim.vehicle().chassis_velocity(sim.physics()).unwrap();
        assert_eq!(chassis_position(&sim), Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(velocity.linear, Vec3::ZERO);
        assert_eq!(velocity.angular, Vec3::ZERO);
        assert_eq!(sim.vehicle().distance(), 0.0);
        assert_eq!(sim.vehicle().steering(), 0.0);
        assert_eq!(hud.distance, "0 m");
    }

    #[test]
    fn reset_brakes_release_after_delay() {
        let mut sim = flat_sim();
        let mut hud = HudText::default();
        let mut input = ActionState::new();
        input.set(Action::Reset, true);
        sim.frame(DT, DT, &input, &mut hud);
        assert_eq!(sim.pending_tasks(), 1);

        let idle = ActionState::new();
        sim.frame(DT, DT, &idle, &mut hud);
        assert_eq!(sim.vehicle().wheel_command(FRONT_LEFT).unwrap().brake, 160.0);

        run(&mut sim, &idle, &mut hud, 0.2);
        assert_eq!(sim.pending_tasks(), 0);
        assert_eq!(sim.vehicle().wheel_command(FRONT_LEFT).unwrap().brake, 0.0);
    }

    #[test]
    fn camera_settles_behind_parked_vehicle() {
        let mut sim = flat_sim();
        let mut hud = HudText::default();
        let idle = ActionState::new();
        run(&mut sim, &idle, &mut hud, 3.0);
        run(&mut sim, &idle, &mut hud, 5.0);

        let chassis = sim.vehicle().chassis_transform(sim.physics()).unwrap();
        let (position, target) = sim.camera().desired(&chassis);
        assert!(sim.camera().position().distance(position) < 0.05);
        assert!(sim.camera().target().distance(target) < 0.05);
    }

    #[test]
    fn long_frames_are_clamped_and_substeps_capped() {
        let mut sim = flat_sim();
        let mut hud = HudText::default();
        let report = sim.frame(5.0, 5.0, &ActionState::new(), &mut hud);
        assert!(report.substeps >= 5 && report.substeps <= 6, "{} substeps", report.substeps);

        let config = GameConfig {
            terrain: TerrainConfig::flat(400.0, 8),
            physics: crate::config::PhysicsSettings {
                max_frame_delta: 1.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut sim = Simulation::new(&config).unwrap();
        let report = sim.frame(1.0, 1.0, &ActionState::new(), &mut hud);
        assert_eq!(report.substeps, 8);
    }

    #[test]
    fn non_finite_chassis_is_recovered() {
        let mut sim = flat_sim();
        let mut hud = HudText::default();
        let chassis = sim.physics.rigid_body_set.iter().map(|(h, _)| h).next().unwrap();
        sim.physics
            .set_body_velocity(chassis, Velocity::new(Vec3::new(f32::NAN, 0.0, 0.0)));

        let report = sim.frame(DT, DT, &ActionState::new(), &mut hud);
        assert_eq!(report.substeps, 0);
        assert_eq!(report.reset.unwrap().cause, ResetCause::InvalidState);

        let report = sim.frame(DT, DT, &ActionState::new(), &mut hud);
        assert!(report.reset.is_none());
        assert!(sim.vehicle().chassis_velocity(sim.physics()).unwrap().is_finite());
    }

    #[test]
    fn despawned_vehicle_leaves_a_quiet_world() {
        let mut sim = flat_sim();
        let mut hud = HudText::default();
        let mut input = ActionState::new();
        input.set(Action::Reset, true);
        sim.frame(DT, DT, &input, &mut hud);
        sim.despawn_vehicle();

        assert_eq!(sim.pending_tasks(), 0);
        let report = sim.frame(DT, DT, &input, &mut hud);
        assert!(report.reset.is_none());
        assert_eq!(hud.speed, "0");
        assert_eq!(sim.physics().rigid_body_set.len(), 0);
    }

    #[test]
    fn stalled_frame_still_releases_reset_brakes() {
        let mut sim = flat_sim();
        let mut hud = HudText::default();
        let mut input = ActionState::new();
        input.set(Action::Reset, true);
        sim.frame(DT, DT, &input, &mut hud);

        // 0.3 s of wall time, clamped to 0.1 s for physics.
        let idle = ActionState::new();
        sim.frame(0.3, 0.3, &idle, &mut hud);
        assert_eq!(sim.pending_tasks(), 0);
        assert_eq!(sim.vehicle().wheel_command(FRONT_LEFT).unwrap().brake, 0.0);
    }

    #[test]
    fn brake_delay_starts_after_the_reset_frame() {
        let mut sim = flat_sim();
        let mut hud = HudText::default();
        let mut input = ActionState::new();
        input.set(Action::Reset, true);
        sim.frame(DT, 0.1, &input, &mut hud);

        let idle = ActionState::new();
        sim.frame(DT, 0.1, &idle, &mut hud);
        assert_eq!(sim.pending_tasks(), 1);
        assert_eq!(sim.vehicle().wheel_command(FRONT_LEFT).unwrap().brake, 160.0);

        sim.frame(DT, 0.1, &idle, &mut hud);
        assert_eq!(sim.pending_tasks(), 0);
        assert_eq!(sim.vehicle().wheel_command(FRONT_LEFT).unwrap().brake, 0.0);
    }

    #[test]
    fn steering_left_turns_towards_negative_z() {
        let mut sim = flat_sim();
        let mut hud = HudText::default();
        run(&mut sim, &ActionState::new(), &mut hud, 2.0);
        let mut input = ActionState::new();
        input.set(Action::Forward, true);
        run(&mut sim, &input, &mut hud, 1.5);
        let start = sim.vehicle().chassis_transform(sim.physics()).unwrap();
        let heading_before = start.transform_vector(Vec3::X);

        input.set(Action::Left, true);
        run(&mut sim, &input, &mut hud, 1.0);
        let end = sim.vehicle().chassis_transform(sim.physics()).unwrap();
        let heading_after = end.transform_vector(Vec3::X);

        // Counter-clockwise seen from above.
        assert!(heading_before.cross(heading_after).y > 0.1, "{heading_before} -> {heading_after}");
        assert!(heading_after.z < 0.0);
        assert!(end.position.z < start.position.z);
    }
}
