//! Overlay rendering: speed, distance and best run.

use renderer::OverlayTextBuilder;

use crate::vehicle::FRONT_LEFT;

use crate::GameState;

/// Build the screen-space HUD.
pub fn build(state: &GameState, sw: f32, sh: f32) -> OverlayTextBuilder {
    let mut tb = OverlayTextBuilder::new(sw, sh);
    let scale = 2.0; // 2x scale for readability
    let margin = 16.0;
    let gap = 6.0;
    let bg = [0.0, 0.0, 0.0, 0.55]; // semi-transparent dark bg
    let white = [1.0, 1.0, 1.0, 1.0];
    let gray = [0.7, 0.7, 0.7, 1.0];
    let amber = [1.0, 0.67, 0.0, 1.0];

    let speed = format!("SPEED {} km/h", state.hud.speed);
    let mut y = margin;
    y += tb.add_label(margin, y, &speed, scale, white, bg) + gap;
    y += tb.add_label(margin, y, &format!("DIST  {}", state.hud.distance), scale, white, bg) + gap;
    tb.add_label(margin, y, &format!("BEST  {} m", state.high_score.best()), scale, gray, bg);

    let vehicle = state.sim.vehicle();
    if vehicle.is_flipped() {
        let left = (vehicle.tuning().flip_delay - vehicle.time_flipped()).max(0.0);
        let text = format!("FLIPPED - reset in {:.1}s (R now)", left);
        let (w, _) = OverlayTextBuilder::measure(&text, scale);
        tb.add_label(sw * 0.5 - w * 0.5, sh * 0.3, &text, scale, amber, bg);
    }

    if state.show_debug {
        debug_lines(state, &mut tb, sw, scale * 0.75, bg);
    }

    let help = "W/S drive  A/D steer  R reset  Esc quit";
    let (_, h) = OverlayTextBuilder::measure(help, 1.5);
    tb.add_text(margin, sh - margin - h, help, 1.5, gray);

    tb
}

/// Right-aligned diagnostics (F3).
fn debug_lines(state: &GameState, tb: &mut OverlayTextBuilder, sw: f32, scale: f32, bg: [f32; 4]) {
    let green = [0.0, 1.0, 0.0, 1.0];
    let sim = &state.sim;
    let vehicle = sim.vehicle();

    let mut lines = vec![
        format!("FPS {:.0}", state.time.fps()),
        format!(
            "substeps {}/{} (+{:.1} ms)",
            state.last_report.substeps,
            sim.timestep().max_substeps(),
            sim.timestep().accumulated() * 1000.0
        ),
        format!("state {:?}", vehicle.state()),
        format!("steer {:+.3} rad", vehicle.steering()),
        format!("tasks {}", sim.pending_tasks()),
    ];
    if let Some(chassis) = vehicle.chassis_transform(sim.physics()) {
        let p = chassis.position;
        let ground = sim.ground().height_at(p.x, p.z);
        lines.push(format!("pos {:.1} {:.1} {:.1}", p.x, p.y, p.z));
        lines.push(format!("clearance {:.2} m", p.y - ground));
    }
    if let Some(command) = vehicle.wheel_command(FRONT_LEFT) {
        lines.push(format!("brake {:.0}", command.brake));
    }
    let contacts = vehicle
        .wheel_poses(sim.physics())
        .iter()
        .filter(|wheel| wheel.in_contact)
        .count();
    lines.push(format!("wheels down {}", contacts));

    let mut y = 16.0;
    for line in &lines {
        let (w, _) = OverlayTextBuilder::measure(line, scale);
        y += tb.add_label(sw - w - 24.0, y, line, scale, green, bg) + 4.0;
    }
}
