//! Terrain Drive - a raycast-wheel vehicle on procedurally generated terrain.

mod chase_camera;
mod config;
mod events;
mod high_score;
mod hud;
mod render;
mod simulation;
mod vehicle;
mod world;

use anyhow::{Context, Result};
use engine_core::Time;
use input::ActionState;
use renderer::{Camera, Mesh, MeshData, Renderer, SceneLighting};
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use config::GameConfig;
use high_score::HighScoreStore;
use hud::HudText;
use simulation::{FrameReport, Simulation};

/// Everything alive while the window is open.
pub(crate) struct GameState {
    pub(crate) window: Arc<Window>,
    pub(crate) renderer: Renderer,
    pub(crate) camera: Camera,
    pub(crate) input: ActionState,
    pub(crate) time: Time,
    pub(crate) sim: Simulation,
    pub(crate) hud: HudText,
    pub(crate) high_score: HighScoreStore,
    pub(crate) terrain_mesh: Mesh,
    pub(crate) cube_mesh: Mesh,
    pub(crate) wheel_mesh: Mesh,
    pub(crate) last_report: FrameReport,
    pub(crate) show_debug: bool,
    pub(crate) running: bool,
}

impl GameState {
    async fn new(window: Arc<Window>, config: &GameConfig) -> Result<Self> {
        let lighting = SceneLighting::default();
        let renderer = Renderer::new(window.clone(), config.window.vsync, &lighting).await?;

        let sim = Simulation::new(config).context("Failed to build the world")?;

        let surface = sim.ground().surface();
        let terrain_mesh = MeshData::from_streams(
            surface.positions(),
            surface.normals(),
            surface.colors(),
            surface.indices(),
        )
        .upload(renderer.device(), "Terrain");
        let cube_mesh = MeshData::cube().upload(renderer.device(), "Cube");
        let wheel_mesh = MeshData::cylinder(24).upload(renderer.device(), "Wheel");

        let (width, height) = renderer.dimensions();
        let camera = sim.camera().make_camera(width as f32 / height.max(1) as f32);

        let mut time = Time::new();
        time.set_max_delta(config.physics.max_frame_delta);

        let high_score = HighScoreStore::open(config.high_score_path.clone());
        log::info!("Best distance so far: {} m ({:?})", high_score.best(), high_score.path());

        Ok(Self {
            window,
            renderer,
            camera,
            input: ActionState::new(),
            time,
            sim,
            hud: HudText::default(),
            high_score,
            terrain_mesh,
            cube_mesh,
            wheel_mesh,
            last_report: FrameReport::default(),
            show_debug: false,
            running: true,
        })
    }

    fn update(&mut self) {
        self.time.update();
        let report = self.sim.frame(
            self.time.delta_seconds(),
            self.time.raw_delta_seconds(),
            &self.input,
            &mut self.hud,
        );
        if let Some(reset) = report.reset {
            self.high_score.submit(reset.distance);
        }
        self.last_report = report;
    }

    fn render(&mut self) -> Result<()> {
        render::run(self)
    }

    /// Close out the current run and release the world.
    fn shutdown(mut self) {
        if self.sim.vehicle().exists() {
            self.high_score.submit(self.sim.vehicle().distance());
        }
        log::info!(
            "Shutting down after {} frames ({:.1}s)",
            self.time.frame_count(),
            self.time.elapsed_seconds()
        );
        self.sim.shutdown();
    }
}

/// Window title shown when start-up fails, with the full context chain.
fn failure_title(error: &anyhow::Error) -> String {
    format!("Terrain Drive - failed to start: {:#}", error)
}

/// Application handler for winit.
struct App {
    config: GameConfig,
    state: Option<GameState>,
    /// Window kept open after a failed start so the error stays on screen.
    failed_window: Option<Arc<Window>>,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: GameConfig) -> Self {
        Self {
            config,
            state: None,
            failed_window: None,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.error = Some(error);
        event_loop.exit();
    }

    /// Report a start-up failure in the window title and wait for the user to close it.
    fn fail_in_window(
        &mut self,
        event_loop: &ActiveEventLoop,
        window: Arc<Window>,
        error: anyhow::Error,
    ) {
        log::error!("{:#}", error);
        event_loop.set_control_flow(ControlFlow::Wait);
        window.set_title(&failure_title(&error));
        self.failed_window = Some(window);
        self.error = Some(error);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_none() && self.failed_window.is_none() {
            let window_attrs = Window::default_attributes()
                .with_title("Terrain Drive")
                .with_inner_size(winit::dpi::LogicalSize::new(
                    self.config.window.width,
                    self.config.window.height,
                ));

            let window = match event_loop.create_window(window_attrs) {
                Ok(w) => Arc::new(w),
                Err(e) => {
                    self.fail(event_loop, anyhow::Error::new(e).context("Failed to create window"));
                    return;
                }
            };

            match pollster::block_on(GameState::new(window.clone(), &self.config)) {
                Ok(s) => {
                    self.state = Some(s);
                    window.request_redraw();
                }
                Err(e) => {
                    let error = e.context("Failed to initialize game");
                    self.fail_in_window(event_loop, window, error);
                }
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Some(state) = &mut self.state {
            if state.handle_window_event(event) || !state.running {
                event_loop.exit();
            }
        } else if self.failed_window.is_some() {
            let dismissed = match event {
                WindowEvent::CloseRequested => true,
                WindowEvent::KeyboardInput { event, .. } => {
                    event.state.is_pressed()
                        && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                }
                _ => false,
            };
            if dismissed {
                event_loop.exit();
            }
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.take() {
            state.shutdown();
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("Terrain Drive");
    println!("  W / Up     - Accelerate");
    println!("  S / Down   - Brake, then reverse");
    println!("  A D / Left Right - Steer");
    println!("  R          - Reset vehicle");
    println!("  F3         - Toggle debug info");
    println!("  Esc        - Quit");

    let config = GameConfig::load();
    log::info!("Starting Terrain Drive");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        // Returning the error prints it to stderr.
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_title_carries_the_whole_error_chain() {
        let error =
            anyhow::anyhow!("no suitable GPU adapter found").context("Failed to initialize game");
        let title = failure_title(&error);
        assert!(title.starts_with("Terrain Drive - failed to start"));
        assert!(title.contains("Failed to initialize game: no suitable GPU adapter found"));
    }
}
