//! Drivable vehicle: maps actions to wheel commands and recovers the chassis
//! from flips, falls and corrupted state.
//!
//! Wheel indices are fixed: 0 front-left, 1 front-right, 2 rear-left, 3 rear-right.
//! Front wheels steer, rear wheels drive, all four brake.

use engine_core::{damp, LifetimeToken, Scheduler, Transform, Vec3, Velocity};
use input::{Action, ActionProvider};
use physics::{PhysicsWorld, RaycastVehicle, WheelCommand, WheelPose};

use crate::config::VehicleTuning;

pub const FRONT_LEFT: usize = 0;
pub const FRONT_RIGHT: usize = 1;
pub const REAR_LEFT: usize = 2;
pub const REAR_RIGHT: usize = 3;

const STEERED: [usize; 2] = [FRONT_LEFT, FRONT_RIGHT];
const DRIVEN: [usize; 2] = [REAR_LEFT, REAR_RIGHT];
const ALL_WHEELS: [usize; 4] = [FRONT_LEFT, FRONT_RIGHT, REAR_LEFT, REAR_RIGHT];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VehicleState {
    Driving,
    /// Tilted past the flip threshold for `time_flipped` seconds.
    Flipped { time_flipped: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetCause {
    /// The player asked for it.
    Manual,
    /// Stayed on its side or roof too long.
    Flipped,
    /// Fell below the world.
    OutOfBounds,
    /// Chassis pose or velocity went NaN or infinite.
    InvalidState,
}

/// Emitted when the vehicle returns to spawn. `distance` is what the run covered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResetEvent {
    pub cause: ResetCause,
    pub distance: f32,
}

/// Deferred work the vehicle schedules on itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleTask {
    ReleaseBrakes,
}

pub struct Vehicle {
    body: Option<RaycastVehicle>,
    tuning: VehicleTuning,
    state: VehicleState,
    steering: f32,
    distance: f32,
    last_position: Option<Vec3>,
    /// Minimum brake held on every wheel until the release task fires.
    brake_hold: f32,
    brake_release: Option<LifetimeToken>,
}

impl Vehicle {
    /// Build the chassis at the spawn point.
    pub fn spawn(world: &mut PhysicsWorld, tuning: VehicleTuning) -> Self {
        let spawn = Transform::from_position(tuning.spawn);
        let body =
            RaycastVehicle::build(world, &spawn, &tuning.chassis_desc(), &tuning.wheel_descs());
        log::info!("Vehicle spawned at {:?}", tuning.spawn);
        Self {
            body: Some(body),
            state: VehicleState::Driving,
            steering: 0.0,
            distance: 0.0,
            last_position: Some(tuning.spawn),
            brake_hold: 0.0,
            brake_release: None,
            tuning,
        }
    }

    pub fn exists(&self) -> bool {
        self.body.is_some()
    }

    pub fn tuning(&self) -> &VehicleTuning {
        &self.tuning
    }

    pub fn state(&self) -> VehicleState {
        self.state
    }

    pub fn is_flipped(&self) -> bool {
        matches!(self.state, VehicleState::Flipped { .. })
    }

    pub fn time_flipped(&self) -> f32 {
        match self.state {
            VehicleState::Flipped { time_flipped } => time_flipped,
            VehicleState::Driving => 0.0,
        }
    }

    /// Meters covered on the ground plane since the last reset.
    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Smoothed steering angle applied to the front wheels.
    pub fn steering(&self) -> f32 {
        self.steering
    }

    pub fn chassis_transform(&self, world: &PhysicsWorld) -> Option<Transform> {
        self.body.as_ref()?.chassis_transform(world)
    }

    pub fn chassis_velocity(&self, world: &PhysicsWorld) -> Option<Velocity> {
        self.body.as_ref()?.chassis_velocity(world)
    }

    pub fn wheel_command(&self, wheel_index: usize) -> Option<WheelCommand> {
        self.body.as_ref()?.wheel_command(wheel_index)
    }

    /// World poses of all wheels, in index order.
    pub fn wheel_poses(&self, world: &PhysicsWorld) -> Vec<WheelPose> {
        let Some(body) = &self.body else {
            return Vec::new();
        };
        (0..body.wheel_count())
            .filter_map(|i| body.wheel_pose(world, i))
            .collect()
    }

    /// Cast the wheel rays and push suspension forces into the chassis. Runs once
    /// per physics substep, right before the world steps.
    pub fn integrate(&mut self, world: &mut PhysicsWorld, dt: f32) {
        if let Some(body) = &mut self.body {
            body.update(world, dt);
        }
    }

    /// Per-frame update after physics: recovery checks, distance, then controls.
    pub fn update(
        &mut self,
        world: &mut PhysicsWorld,
        input: &dyn ActionProvider,
        scheduler: &mut Scheduler<VehicleTask>,
        dt: f32,
    ) -> Option<ResetEvent> {
        let body = self.body.as_ref()?;
        let transform = body.chassis_transform(world)?;
        let velocity = body.chassis_velocity(world)?;

        if input.is_pressed(Action::Reset) {
            return Some(self.reset(world, scheduler, ResetCause::Manual));
        }

        if !transform.is_finite() || !velocity.is_finite() {
            log::warn!("Vehicle state is not finite, resetting");
            return Some(self.reset(world, scheduler, ResetCause::InvalidState));
        }

        if self.update_flip(&transform, dt) {
            log::info!("Vehicle flipped for {:.1}s, resetting", self.tuning.flip_delay);
            return Some(self.reset(world, scheduler, ResetCause::Flipped));
        }

        if transform.position.y < self.tuning.fall_limit_y {
            log::info!("Vehicle fell below {:.1}, resetting", self.tuning.fall_limit_y);
            return Some(self.reset(world, scheduler, ResetCause::OutOfBounds));
        }

        if let Some(last) = self.last_position {
            let step = transform.position - last;
            self.distance += Vec3::new(step.x, 0.0, step.z).length();
        }
        self.last_position = Some(transform.position);

        self.apply_controls(input, &transform, &velocity, dt);
        None
    }

    /// Track the flip timer. Returns true once the vehicle has been flipped long enough.
    fn update_flip(&mut self, transform: &Transform, dt: f32) -> bool {
        let tilted = transform.up().dot(Vec3::Y) < self.tuning.flip_dot;
        match (self.state, tilted) {
            (VehicleState::Driving, true) => {
                log::info!("Vehicle flipped");
                self.state = VehicleState::Flipped { time_flipped: 0.0 };
                false
            }
            (VehicleState::Flipped { time_flipped }, true) => {
                let time_flipped = time_flipped + dt;
                self.state = VehicleState::Flipped { time_flipped };
                time_flipped >= self.tuning.flip_delay
            }
            (VehicleState::Flipped { .. }, false) => {
                log::info!("Vehicle recovered from flip");
                self.state = VehicleState::Driving;
                false
            }
            (VehicleState::Driving, false) => false,
        }
    }

    fn apply_controls(
        &mut self,
        input: &dyn ActionProvider,
        transform: &Transform,
        velocity: &Velocity,
        dt: f32,
    ) {
        let Some(body) = self.body.as_mut() else {
            return;
        };
        let tuning = &self.tuning;

        let mut engine = 0.0;
        let mut brake = 0.0;
        let mut target_steer = 0.0;

        if self.state == VehicleState::Driving {
            if input.is_pressed(Action::Forward) {
                engine = tuning.forward_force;
            } else if input.is_pressed(Action::Backward) {
                let speed = velocity.speed();
                let forward = transform.transform_vector(Vec3::X);
                let rolling_forward = speed > tuning.brake_speed_threshold
                    && forward.dot(velocity.linear / speed) > tuning.brake_dot_threshold;
                if rolling_forward {
                    brake = tuning.brake_force;
                } else {
                    engine = -tuning.reverse_force;
                }
            }

            match (input.is_pressed(Action::Left), input.is_pressed(Action::Right)) {
                (true, false) => target_steer = tuning.max_steer,
                (false, true) => target_steer = -tuning.max_steer,
                _ => {}
            }
        }

        self.steering = damp(self.steering, target_steer, tuning.steering_decay, dt)
            .clamp(-tuning.max_steer, tuning.max_steer);

        for i in DRIVEN {
            body.apply_engine_force(engine, i);
        }
        for i in STEERED {
            body.set_steering_value(self.steering, i);
        }
        let brake = brake.max(self.brake_hold);
        for i in ALL_WHEELS {
            body.set_brake(brake, i);
        }
    }

    /// Put the chassis back at spawn: zero velocity, straight wheels, no engine, and
    /// a brake pulse released shortly after by a scheduled task.
    pub fn reset(
        &mut self,
        world: &mut PhysicsWorld,
        scheduler: &mut Scheduler<VehicleTask>,
        cause: ResetCause,
    ) -> ResetEvent {
        let event = ResetEvent {
            cause,
            distance: self.distance,
        };
        let Some(body) = self.body.as_mut() else {
            return event;
        };

        world.teleport_body(body.chassis_handle(), &Transform::from_position(self.tuning.spawn));

        self.brake_hold = self.tuning.brake_force * self.tuning.reset_brake_multiplier;
        for i in ALL_WHEELS {
            body.apply_engine_force(0.0, i);
            body.set_steering_value(0.0, i);
            body.set_brake(self.brake_hold, i);
        }

        // Replacing the token cancels a release still pending from an earlier reset.
        let token = LifetimeToken::new();
        scheduler.schedule(self.tuning.brake_release_delay, &token, VehicleTask::ReleaseBrakes);
        self.brake_release = Some(token);

        self.state = VehicleState::Driving;
        self.steering = 0.0;
        self.distance = 0.0;
        self.last_position = Some(self.tuning.spawn);

        log::info!("Vehicle reset ({:?}) after {:.0} m", cause, event.distance);
        event
    }

    pub fn handle_task(&mut self, task: VehicleTask) {
        match task {
            VehicleTask::ReleaseBrakes => self.release_brakes(),
        }
    }

    fn release_brakes(&mut self) {
        self.brake_hold = 0.0;
        self.brake_release = None;
        if let Some(body) = &mut self.body {
            for i in ALL_WHEELS {
                body.set_brake(0.0, i);
            }
        }
        log::debug!("Reset brakes released");
    }

    /// Remove the chassis from the world. Pending brake releases are cancelled and
    /// every later call becomes a no-op.
    pub fn despawn(&mut self, world: &mut PhysicsWorld) {
        self.brake_release = None;
        if let Some(body) = self.body.take() {
            body.despawn(world);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsSettings;
    use crate::world::Ground;
    use engine_core::Quat;
    use input::ActionState;
    use procgen::TerrainConfig;

    fn setup() -> (PhysicsWorld, Ground, Vehicle, Scheduler<VehicleTask>) {
        let mut world = PhysicsWorld::with_settings(PhysicsSettings::default().world_settings());
        let ground = Ground::build(TerrainConfig::flat(200.0, 8), &mut world).unwrap();
        let vehicle = Vehicle::spawn(&mut world, VehicleTuning::default());
        (world, ground, vehicle, Scheduler::new())
    }

    fn place(world: &mut PhysicsWorld, vehicle: &Vehicle, position: Vec3, rotation: Quat) {
        let handle = vehicle.body.as_ref().unwrap().chassis_handle();
        world.teleport_body(handle, &Transform::from_position_rotation(position, rotation));
    }

    fn set_velocity(world: &mut PhysicsWorld, vehicle: &Vehicle, linear: Vec3) {
        let handle = vehicle.body.as_ref().unwrap().chassis_handle();
        world.set_body_velocity(handle, Velocity::new(linear));
    }

    #[test]
    fn forward_drives_rear_wheels_only() {
        let (mut world, _ground, mut vehicle, mut scheduler) = setup();
        let mut input = ActionState::new();
        input.set(Action::Forward, true);
        vehicle.update(&mut world, &input, &mut scheduler, 1.0 / 60.0);

        assert_eq!(vehicle.wheel_command(FRONT_LEFT).unwrap().engine_force, 0.0);
        assert_eq!(vehicle.wheel_command(FRONT_RIGHT).unwrap().engine_force, 0.0);
        assert_eq!(vehicle.wheel_command(REAR_LEFT).unwrap().engine_force, 450.0);
        assert_eq!(vehicle.wheel_command(REAR_RIGHT).unwrap().engine_force, 450.0);
    }

    #[test]
    fn backward_while_rolling_forward_brakes() {
        let (mut world, _ground, mut vehicle, mut scheduler) = setup();
        set_velocity(&mut world, &vehicle, Vec3::new(5.0, 0.0, 0.0));
        let mut input = ActionState::new();
        input.set(Action::Backward, true);
        vehicle.update(&mut world, &input, &mut scheduler, 1.0 / 60.0);

        for i in ALL_WHEELS {
            let command = vehicle.wheel_command(i).unwrap();
            assert_eq!(command.brake, 80.0);
            assert_eq!(command.engine_force, 0.0);
        }
    }

    #[test]
    fn backward_from_rest_reverses() {
        let (mut world, _ground, mut vehicle, mut scheduler) = setup();
        set_velocity(&mut world, &vehicle, Vec3::new(0.2, 0.0, 0.0));
        let mut input = ActionState::new();
        input.set(Action::Backward, true);
        vehicle.update(&mut world, &input, &mut scheduler, 1.0 / 60.0);

        let rear = vehicle.wheel_command(REAR_LEFT).unwrap();
        assert_eq!(rear.engine_force, -100.0);
        assert_eq!(rear.brake, 0.0);
    }

    #[test]
    fn forward_wins_over_backward() {
        let (mut world, _ground, mut vehicle, mut scheduler) = setup();
        set_velocity(&mut world, &vehicle, Vec3::new(5.0, 0.0, 0.0));
        let mut input = ActionState::new();
        input.set(Action::Forward, true);
        input.set(Action::Backward, true);
        vehicle.update(&mut world, &input, &mut scheduler, 1.0 / 60.0);

        let rear = vehicle.wheel_command(REAR_RIGHT).unwrap();
        assert_eq!(rear.engine_force, 450.0);
        assert_eq!(rear.brake, 0.0);
    }

    #[test]
    fn steering_eases_toward_lock_and_stays_in_range() {
        let (mut world, _ground, mut vehicle, mut scheduler) = setup();
        let max = vehicle.tuning().max_steer;
        let mut input = ActionState::new();
        input.set(Action::Left, true);

        let mut previous = 0.0;
        for _ in 0..120 {
            vehicle.update(&mut world, &input, &mut scheduler, 1.0 / 30.0);
            let steer = vehicle.steering();
            assert!(steer >= previous && steer <= max);
            assert_eq!(vehicle.wheel_command(FRONT_LEFT).unwrap().steering, steer);
            assert_eq!(vehicle.wheel_command(REAR_LEFT).unwrap().steering, 0.0);
            previous = steer;
        }
        assert!((vehicle.steering() - max).abs() < 1e-3);

        input.set(Action::Left, false);
        input.set(Action::Right, true);
        for _ in 0..240 {
            vehicle.update(&mut world, &input, &mut scheduler, 1.0 / 30.0);
            assert!(vehicle.steering().abs() <= max);
        }
        assert!((vehicle.steering() + max).abs() < 1e-3);
    }

    #[test]
    fn both_steer_keys_cancel() {
        let (mut world, _ground, mut vehicle, mut scheduler) = setup();
        let mut input = ActionState::new();
        input.set(Action::Left, true);
        input.set(Action::Right, true);
        vehicle.update(&mut world, &input, &mut scheduler, 0.5);
        assert_eq!(vehicle.steering(), 0.0);
    }

    #[test]
    fn flip_resets_only_after_delay() {
        let (mut world, _ground, mut vehicle, mut scheduler) = setup();
        let input = ActionState::new();
        let upside_down = Quat::from_rotation_x(std::f32::consts::PI);
        place(&mut world, &vehicle, Vec3::new(0.0, 5.0, 0.0), upside_down);

        assert!(vehicle.update(&mut world, &input, &mut scheduler, 0.5).is_none());
        assert_eq!(vehicle.state(), VehicleState::Flipped { time_flipped: 0.0 });

        // 0.5, 1.0, 1.5, 2.0 s flipped: still waiting.
        for _ in 0..4 {
            assert!(vehicle.update(&mut world, &input, &mut scheduler, 0.5).is_none());
            assert!(vehicle.time_flipped() < 2.5);
        }
        let event = vehicle.update(&mut world, &input, &mut scheduler, 0.5).unwrap();
        assert_eq!(event.cause, ResetCause::Flipped);
        assert_eq!(vehicle.state(), VehicleState::Driving);
    }

    #[test]
    fn flip_threshold_is_at_cos_point_three() {
        let (mut world, _ground, mut vehicle, mut scheduler) = setup();
        let input = ActionState::new();
        let threshold = 0.3f32.acos();
        let at = Vec3::new(0.0, 5.0, 0.0);

        place(&mut world, &vehicle, at, Quat::from_rotation_x(threshold - 0.01));
        vehicle.update(&mut world, &input, &mut scheduler, 0.1);
        assert_eq!(vehicle.state(), VehicleState::Driving);

        place(&mut world, &vehicle, at, Quat::from_rotation_x(threshold + 0.01));
        vehicle.update(&mut world, &input, &mut scheduler, 0.1);
        assert!(vehicle.is_flipped());

        // Same boundary when rolled about the length axis.
        place(&mut world, &vehicle, at, Quat::from_rotation_z(threshold - 0.01));
        vehicle.update(&mut world, &input, &mut scheduler, 0.1);
        assert_eq!(vehicle.state(), VehicleState::Driving);
    }

    #[test]
    fn flipped_vehicle_gets_no_engine() {
        let (mut world, _ground, mut vehicle, mut scheduler) = setup();
        let mut input = ActionState::new();
        input.set(Action::Forward, true);
        place(&mut world, &vehicle, Vec3::new(0.0, 5.0, 0.0), Quat::from_rotation_z(1.4));
        vehicle.update(&mut world, &input, &mut scheduler, 0.1);
        assert!(vehicle.is_flipped());
        assert_eq!(vehicle.wheel_command(REAR_LEFT).unwrap().engine_force, 0.0);
    }

    #[test]
    fn recovering_orientation_clears_flip_timer() {
        let (mut world, _ground, mut vehicle, mut scheduler) = setup();
        let input = ActionState::new();
        place(&mut world, &vehicle, Vec3::new(0.0, 5.0, 0.0), Quat::from_rotation_x(2.0));
        vehicle.update(&mut world, &input, &mut scheduler, 1.0);
        vehicle.update(&mut world, &input, &mut scheduler, 1.0);
        assert!(vehicle.time_flipped() > 0.0);

        place(&mut world, &vehicle, Vec3::new(0.0, 5.0, 0.0), Quat::IDENTITY);
        vehicle.update(&mut world, &input, &mut scheduler, 1.0);
        assert_eq!(vehicle.state(), VehicleState::Driving);
        assert_eq!(vehicle.time_flipped(), 0.0);
    }

    #[test]
    fn distance_counts_ground_plane_travel_only() {
        let (mut world, _ground, mut vehicle, mut scheduler) = setup();
        let input = ActionState::new();
        place(&mut world, &vehicle, Vec3::new(3.0, 5.0, 4.0), Quat::IDENTITY);
        vehicle.update(&mut world, &input, &mut scheduler, 0.1);
        assert!((vehicle.distance() - 5.0).abs() < 1e-4);

        place(&mut world, &vehicle, Vec3::new(3.0, 9.0, 4.0), Quat::IDENTITY);
        vehicle.update(&mut world, &input, &mut scheduler, 0.1);
        assert!((vehicle.distance() - 5.0).abs() < 1e-4);
    }

    #[test]
    fn manual_reset_restores_spawn_in_the_same_frame() {
        let (mut world, _ground, mut vehicle, mut scheduler) = setup();
        let mut input = ActionState::new();
        input.set(Action::Left, true);
        place(&mut world, &vehicle, Vec3::new(30.0, 2.0, 40.0), Quat::from_rotation_y(1.0));
        set_velocity(&mut world, &vehicle, Vec3::new(3.0, 0.0, 1.0));
        vehicle.update(&mut world, &input, &mut scheduler, 0.1);
        assert!(vehicle.distance() > 0.0);
        assert!(vehicle.steering() > 0.0);

        input.set(Action::Reset, true);
        let event = vehicle.update(&mut world, &input, &mut scheduler, 0.1).unwrap();
        assert_eq!(event.cause, ResetCause::Manual);
        assert!(event.distance > 49.0);

        let transform = vehicle.chassis_transform(&world).unwrap();
        let velocity = vehicle.chassis_velocity(&world).unwrap();
        assert_eq!(transform.position, Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(velocity.linear, Vec3::ZERO);
        assert_eq!(velocity.angular, Vec3::ZERO);
        assert_eq!(vehicle.distance(), 0.0);
        assert_eq!(vehicle.steering(), 0.0);
        for i in ALL_WHEELS {
            let command = vehicle.wheel_command(i).unwrap();
            assert_eq!(command.steering, 0.0);
            assert_eq!(command.engine_force, 0.0);
            assert_eq!(command.brake, 160.0);
        }
    }

    #[test]
    fn reset_brake_pulse_is_released_by_scheduled_task() {
        let (mut world, _ground, mut vehicle, mut scheduler) = setup();
        let input = ActionState::new();
        vehicle.reset(&mut world, &mut scheduler, ResetCause::Manual);

        assert!(scheduler.advance(0.1).is_empty());
        vehicle.update(&mut world, &input, &mut scheduler, 0.1);
        assert_eq!(vehicle.wheel_command(FRONT_LEFT).unwrap().brake, 160.0);

        let due = scheduler.advance(0.1);
        assert_eq!(due, vec![VehicleTask::ReleaseBrakes]);
        for task in due {
            vehicle.handle_task(task);
        }
        assert_eq!(vehicle.wheel_command(FRONT_LEFT).unwrap().brake, 0.0);
    }

    #[test]
    fn second_reset_supersedes_pending_release() {
        let (mut world, _ground, mut vehicle, mut scheduler) = setup();
        vehicle.reset(&mut world, &mut scheduler, ResetCause::Manual);
        scheduler.advance(0.1);
        vehicle.reset(&mut world, &mut scheduler, ResetCause::Manual);

        // The first release would have been due now.
        assert!(scheduler.advance(0.1).is_empty());
        assert_eq!(scheduler.advance(0.1), vec![VehicleTask::ReleaseBrakes]);
    }

    #[test]
    fn falling_below_world_resets() {
        let (mut world, _ground, mut vehicle, mut scheduler) = setup();
        let input = ActionState::new();
        place(&mut world, &vehicle, Vec3::new(10.0, -20.0, 0.0), Quat::IDENTITY);
        let event = vehicle.update(&mut world, &input, &mut scheduler, 0.1).unwrap();
        assert_eq!(event.cause, ResetCause::OutOfBounds);
        assert_eq!(vehicle.chassis_transform(&world).unwrap().position, Vec3::new(0.0, 5.0, 0.0));
    }

    #[test]
    fn non_finite_state_resets() {
        let (mut world, _ground, mut vehicle, mut scheduler) = setup();
        let input = ActionState::new();
        set_velocity(&mut world, &vehicle, Vec3::new(f32::NAN, 0.0, 0.0));
        let event = vehicle.update(&mut world, &input, &mut scheduler, 0.1).unwrap();
        assert_eq!(event.cause, ResetCause::InvalidState);
        assert!(vehicle.chassis_velocity(&world).unwrap().is_finite());
    }

    #[test]
    fn despawned_vehicle_ignores_everything() {
        let (mut world, _ground, mut vehicle, mut scheduler) = setup();
        vehicle.reset(&mut world, &mut scheduler, ResetCause::Manual);
        vehicle.despawn(&mut world);

        let mut input = ActionState::new();
        input.set(Action::Reset, true);
        assert!(!vehicle.exists());
        assert!(vehicle.update(&mut world, &input, &mut scheduler, 0.1).is_none());
        assert!(vehicle.wheel_command(0).is_none());
        assert!(vehicle.wheel_poses(&world).is_empty());
        assert!(scheduler.advance(1.0).is_empty());
    }
}
