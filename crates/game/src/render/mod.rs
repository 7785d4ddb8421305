//! Rendering: terrain, vehicle parts and the HUD overlay.

mod overlay;

use anyhow::Result;
use engine_core::{Transform, Vec3};
use renderer::InstanceData;

use crate::GameState;

const BODY_COLOR: u32 = 0xcc0000;
const CABIN_COLOR: u32 = 0x444444;
const WHEEL_COLOR: u32 = 0x222222;

/// Body shell: full length and width, a little lower than the collision hull.
const BODY_HEIGHT: f32 = 0.4;
const BODY_OFFSET_Y: f32 = 0.1;
const CABIN_HEIGHT: f32 = 0.5;

/// Body and cabin boxes for a chassis pose.
pub fn chassis_instances(chassis: &Transform, size: Vec3) -> [InstanceData; 2] {
    let part = |offset: Vec3, scale: Vec3, color: u32| {
        let position = chassis.transform_point(offset);
        let transform =
            Transform::from_position_rotation(position, chassis.rotation).with_scale(scale);
        InstanceData::from_transform(&transform, color)
    };
    [
        part(
            Vec3::new(0.0, BODY_OFFSET_Y, 0.0),
            Vec3::new(size.x, BODY_HEIGHT, size.z),
            BODY_COLOR,
        ),
        part(
            Vec3::new(-size.x * 0.15, BODY_OFFSET_Y + BODY_HEIGHT * 0.5 + CABIN_HEIGHT * 0.5, 0.0),
            Vec3::new(size.x * 0.45, CABIN_HEIGHT, size.z * 0.8),
            CABIN_COLOR,
        ),
    ]
}

/// Run all render passes. Called from `GameState::render()`.
pub fn run(state: &mut GameState) -> Result<()> {
    let Some(mut frame) = state.renderer.begin_frame()? else {
        return Ok(());
    };

    let rig = state.sim.camera();
    state.camera.look_at(rig.position(), rig.target());
    state.renderer.update_camera(&state.camera);

    state.renderer.render_terrain(&mut frame, &state.terrain_mesh);

    let physics = state.sim.physics();
    let vehicle = state.sim.vehicle();
    if let Some(chassis) = vehicle.chassis_transform(physics) {
        let boxes = chassis_instances(&chassis, vehicle.tuning().chassis_size);
        state.renderer.render_instanced(&mut frame, &state.cube_mesh, &boxes);
    }

    let wheels: Vec<InstanceData> = vehicle
        .wheel_poses(physics)
        .iter()
        .map(|wheel| {
            let transform = wheel
                .transform
                .with_scale(Vec3::new(wheel.radius, wheel.radius, wheel.width));
            InstanceData::from_transform(&transform, WHEEL_COLOR)
        })
        .collect();
    state.renderer.render_instanced(&mut frame, &state.wheel_mesh, &wheels);

    let (sw, sh) = state.renderer.dimensions();
    let tb = overlay::build(state, sw as f32, sh as f32);
    state.renderer.render_overlay(&mut frame, &tb.vertices, &tb.indices);

    state.renderer.end_frame(frame);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::Quat;

    #[test]
    fn cabin_sits_on_top_of_body_towards_the_rear() {
        let chassis = Transform::from_position(Vec3::new(0.0, 1.0, 0.0));
        let [body, cabin] = chassis_instances(&chassis, Vec3::new(2.8, 0.5, 1.7));
        let body_y = body.model[3][1];
        let cabin = cabin.model[3];
        assert!((body_y - 1.1).abs() < 1e-5);
        assert!(cabin[1] > body_y);
        assert!(cabin[0] < 0.0);
    }

    #[test]
    fn parts_follow_chassis_rotation() {
        let upside_down = Quat::from_rotation_x(std::f32::consts::PI);
        let chassis = Transform::from_position_rotation(Vec3::ZERO, upside_down);
        let [body, _] = chassis_instances(&chassis, Vec3::new(2.8, 0.5, 1.7));
        assert!(body.model[3][1] < 0.0);
    }
}
