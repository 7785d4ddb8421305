//! Game configuration (window, physics, vehicle, camera, terrain).
//! Loaded from config.ron at startup.

use crate::hud::DistanceUnit;
use glam::Vec3;
use procgen::TerrainConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persistent game settings. Loaded from `config.ron` in the current directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub window: WindowSettings,
    #[serde(default)]
    pub physics: PhysicsSettings,
    #[serde(default)]
    pub vehicle: VehicleTuning,
    #[serde(default)]
    pub camera: CameraTuning,
    #[serde(default)]
    pub terrain: TerrainConfig,
    /// Fixed unit for the distance readout; unset switches m to km at 1000 m.
    #[serde(default)]
    pub distance_unit: Option<DistanceUnit>,
    /// Where the best distance is kept.
    #[serde(default = "default_high_score_path")]
    pub high_score_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowSettings {
    /// Window width in logical pixels.
    #[serde(default = "default_window_width")]
    pub width: u32,
    /// Window height in logical pixels.
    #[serde(default = "default_window_height")]
    pub height: u32,
    /// Enable vsync (recommended to avoid tearing).
    #[serde(default = "default_true")]
    pub vsync: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
            vsync: default_true(),
        }
    }
}

/// World and frame-loop timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsSettings {
    #[serde(default = "default_gravity")]
    pub gravity: f32,
    /// Fixed physics step in seconds.
    #[serde(default = "default_fixed_step")]
    pub fixed_step: f32,
    #[serde(default = "default_max_substeps")]
    pub max_substeps: u32,
    /// Frame deltas above this are clamped before being fed to the accumulator.
    #[serde(default = "default_max_frame_delta")]
    pub max_frame_delta: f32,
    #[serde(default = "default_solver_iterations")]
    pub solver_iterations: usize,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            gravity: default_gravity(),
            fixed_step: default_fixed_step(),
            max_substeps: default_max_substeps(),
            max_frame_delta: default_max_frame_delta(),
            solver_iterations: default_solver_iterations(),
        }
    }
}

impl PhysicsSettings {
    pub fn world_settings(&self) -> physics::WorldSettings {
        physics::WorldSettings {
            gravity: Vec3::new(0.0, self.gravity, 0.0),
            timestep: self.fixed_step,
            solver_iterations: self.solver_iterations,
        }
    }
}

/// Every tunable of the drivable vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleTuning {
    /// Rear-wheel engine force while accelerating.
    pub forward_force: f32,
    /// Rear-wheel engine force while reversing (applied negated).
    pub reverse_force: f32,
    /// Brake force on all wheels when backing off while rolling forward.
    pub brake_force: f32,
    /// Reset brake pulse as a multiple of `brake_force`.
    pub reset_brake_multiplier: f32,
    /// Seconds the reset brake pulse is held.
    pub brake_release_delay: f32,
    /// Steering lock in radians.
    pub max_steer: f32,
    /// Fraction of the steering error left after one second.
    pub steering_decay: f32,
    /// Forward alignment of the velocity above which backward means brake.
    pub brake_dot_threshold: f32,
    /// Speed in m/s above which backward means brake.
    pub brake_speed_threshold: f32,

    pub suspension_stiffness: f32,
    pub damping_relaxation: f32,
    pub damping_compression: f32,
    pub suspension_rest_length: f32,
    pub suspension_travel: f32,
    pub friction_slip: f32,
    pub max_suspension_force: f32,
    pub wheel_radius: f32,
    pub wheel_width: f32,

    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    /// Hull length, height, width.
    pub chassis_size: Vec3,
    /// Skid plate length and width as fractions of the hull; height in meters.
    pub skid_length_ratio: f32,
    pub skid_height: f32,
    pub skid_width_ratio: f32,

    /// Chassis up · world up below this counts as flipped.
    pub flip_dot: f32,
    /// Seconds spent flipped before an automatic reset.
    pub flip_delay: f32,
    /// Chassis height below which the vehicle is considered lost.
    pub fall_limit_y: f32,
    pub spawn: Vec3,
}

impl Default for VehicleTuning {
    fn default() -> Self {
        Self {
            forward_force: 450.0,
            reverse_force: 100.0,
            brake_force: 80.0,
            reset_brake_multiplier: 2.0,
            brake_release_delay: 0.15,
            max_steer: std::f32::consts::FRAC_PI_6,
            steering_decay: 0.1,
            brake_dot_threshold: 0.1,
            brake_speed_threshold: 0.5,

            suspension_stiffness: 35.0,
            damping_relaxation: 5.0,
            damping_compression: 5.0,
            suspension_rest_length: 0.45,
            suspension_travel: 0.5,
            friction_slip: 2.2,
            max_suspension_force: 100_000.0,
            wheel_radius: 0.4,
            wheel_width: 0.3,

            mass: 160.0,
            linear_damping: 0.25,
            angular_damping: 0.7,
            chassis_size: Vec3::new(2.8, 0.5, 1.7),
            skid_length_ratio: 0.9,
            skid_height: 0.05,
            skid_width_ratio: 0.95,

            flip_dot: 0.3,
            flip_delay: 2.5,
            fall_limit_y: -10.0,
            spawn: Vec3::new(0.0, 5.0, 0.0),
        }
    }
}

impl VehicleTuning {
    pub fn chassis_desc(&self) -> physics::ChassisDesc {
        let half = self.chassis_size * 0.5;
        physics::ChassisDesc {
            half_extents: half,
            skid_half_extents: Vec3::new(
                half.x * self.skid_length_ratio,
                self.skid_height * 0.5,
                half.z * self.skid_width_ratio,
            ),
            mass: self.mass,
            linear_damping: self.linear_damping,
            angular_damping: self.angular_damping,
            material: physics::SurfaceMaterial::chassis(),
        }
    }

    /// Wheels in index order FL, FR, RL, RR. Axles sit at 40% of the length from
    /// the centre, 45% of the width out, hanging from 40% of the height down.
    pub fn wheel_descs(&self) -> [physics::WheelDesc; 4] {
        let size = self.chassis_size;
        let front = size.x * 0.4;
        let side = size.z * 0.45;
        let height = -size.y * 0.4;
        let wheel = |x: f32, z: f32| physics::WheelDesc {
            connection: Vec3::new(x, height, z),
            radius: self.wheel_radius,
            width: self.wheel_width,
            rest_length: self.suspension_rest_length,
            max_travel: self.suspension_travel,
            stiffness: self.suspension_stiffness,
            damping_compression: self.damping_compression,
            damping_relaxation: self.damping_relaxation,
            friction_slip: self.friction_slip,
            max_suspension_force: self.max_suspension_force,
        };
        [
            wheel(front, -side),
            wheel(front, side),
            wheel(-front, -side),
            wheel(-front, side),
        ]
    }
}

/// Chase camera placement and smoothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraTuning {
    /// Chassis-local camera position (+X forward).
    pub offset: Vec3,
    /// Chassis-local look-at point.
    pub look_ahead: Vec3,
    pub position_decay: f32,
    pub target_decay: f32,
    /// Minimum camera height above the chassis.
    pub min_height_above_chassis: f32,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraTuning {
    fn default() -> Self {
        Self {
            offset: Vec3::new(-10.0, 5.0, 0.0),
            look_ahead: Vec3::new(5.0, 1.5, 0.0),
            position_decay: 0.03,
            target_decay: 0.05,
            min_height_above_chassis: 1.5,
            fov_degrees: 60.0,
            near: 0.2,
            far: 1000.0,
        }
    }
}

fn default_window_width() -> u32 {
    1280
}
fn default_window_height() -> u32 {
    720
}
fn default_true() -> bool {
    true
}
fn default_gravity() -> f32 {
    -9.82
}
fn default_fixed_step() -> f32 {
    1.0 / 60.0
}
fn default_max_substeps() -> u32 {
    8
}
fn default_max_frame_delta() -> f32 {
    0.1
}
fn default_solver_iterations() -> usize {
    25
}
fn default_high_score_path() -> PathBuf {
    PathBuf::from("high_score.ron")
}

impl GameConfig {
    /// Load config from `config.ron`. A missing file is created with defaults;
    /// an invalid one is left alone and defaults are used.
    pub fn load() -> Self {
        let path = config_path();
        if !path.exists() {
            let config = Self::default();
            config.save_to(&path);
            log::info!("Wrote default config to {:?}", path);
            return config;
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        if let Ok(data) = std::fs::read_to_string(path) {
            match ron::from_str(&data) {
                Ok(c) => return c,
                Err(e) => log::warn!("Invalid config at {:?}: {}, using defaults", path, e),
            }
        }
        Self::default()
    }

    /// Save config as pretty RON. Logs on error.
    pub fn save_to(&self, path: &Path) {
        match ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default()) {
            Ok(s) => {
                if let Err(e) = std::fs::write(path, s) {
                    log::warn!("Could not write config to {:?}: {}", path, e);
                }
            }
            Err(e) => log::warn!("Could not serialize config: {}", e),
        }
    }
}

fn config_path() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join("config.ron")
}
