//! Static heightfield terrain built from layered simplex noise.
//!
//! The whole surface is generated once: a square grid of `(N+1)²` samples centred
//! on the origin, two triangles per cell. Positions and triangle indices live in a
//! single pair of buffers that feeds both the render mesh and the collision
//! trimesh, so what you see is exactly what the wheels hit.
//!
//! **Seed-based determinism:** noise is derived from the configured seed, so the
//! same seed always yields the same height at every `(x, z)`.

use std::time::Instant;

use glam::Vec3;
use noise::{NoiseFn, Simplex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Derive a deterministic u32 noise seed from a world seed and an offset.
#[inline]
fn deterministic_noise_seed(seed: u64, offset: u64) -> u32 {
    ((seed.wrapping_add(offset))
        .wrapping_mul(0x9e3779b97f4a7c15_u64)
        .wrapping_add(offset.wrapping_mul(0x6c078965_u64))
        >> 32) as u32
}

/// Largest grid resolution accepted. Keeps `(resolution + 1)²` vertex indices
/// well inside `u32`.
pub const MAX_RESOLUTION: u32 = 4096;

/// Why a terrain could not be built.
#[derive(Debug, Error, PartialEq)]
pub enum TerrainError {
    #[error("terrain resolution must be 1 to 4096 cells per side, got {0}")]
    InvalidResolution(u32),
    #[error("terrain size must be positive and finite, got {0}")]
    InvalidSize(f32),
    #[error("noise band {index} has a non-finite amplitude or frequency")]
    InvalidNoiseBand { index: usize },
    #[error("flatten factor must be finite and non-negative, got {0}")]
    InvalidFlattenFactor(f64),
    #[error("colour gradient needs at least one stop with strictly increasing, finite heights")]
    InvalidColorStops,
}

/// One octave of the height function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseBand {
    /// Peak height contribution in world units.
    pub amplitude: f64,
    /// Spatial frequency (noise units per world unit).
    pub frequency: f64,
}

/// A colour keyed at a terrain height. `color` is `0xRRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub height: f32,
    pub color: u32,
}

/// Configuration for terrain generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Side length of the square domain in world units.
    pub size: f32,
    /// Number of grid cells per side.
    pub resolution: u32,
    /// Octaves summed into the raw height ("large", "medium", "small").
    pub bands: Vec<NoiseBand>,
    /// `k` in `h * exp(-h² k)`. Larger values carve wider flat roads around zero height.
    pub flatten_factor: f64,
    /// Noise seed. `None` picks a random seed at generation time.
    pub seed: Option<u64>,
    /// Height → colour gradient, ordered by height.
    pub color_stops: Vec<ColorStop>,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            size: 800.0,
            resolution: 128,
            bands: vec![
                NoiseBand { amplitude: 5.0, frequency: 0.015 },
                NoiseBand { amplitude: 0.4, frequency: 0.06 },
                NoiseBand { amplitude: 0.1, frequency: 0.2 },
            ],
            flatten_factor: 0.1,
            seed: None,
            color_stops: vec![
                ColorStop { height: -5.0, color: 0x4466aa },
                ColorStop { height: -0.5, color: 0x6699cc },
                ColorStop { height: 0.0, color: 0xdec070 },
                ColorStop { height: 1.0, color: 0x558844 },
                ColorStop { height: 4.0, color: 0x776655 },
                ColorStop { height: 7.0, color: 0xaaaaaa },
                ColorStop { height: 10.0, color: 0xffffff },
            ],
        }
    }
}

impl TerrainConfig {
    /// A perfectly flat plane of the given extent, handy for tests and tuning.
    pub fn flat(size: f32, resolution: u32) -> Self {
        Self {
            size,
            resolution,
            bands: Vec::new(),
            seed: Some(0),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), TerrainError> {
        if self.resolution == 0 || self.resolution > MAX_RESOLUTION {
            return Err(TerrainError::InvalidResolution(self.resolution));
        }
        if !(self.size.is_finite() && self.size > 0.0) {
            return Err(TerrainError::InvalidSize(self.size));
        }
        if let Some(index) = self
            .bands
            .iter()
            .position(|b| !(b.amplitude.is_finite() && b.frequency.is_finite()))
        {
            return Err(TerrainError::InvalidNoiseBand { index });
        }
        if !(self.flatten_factor.is_finite() && self.flatten_factor >= 0.0) {
            return Err(TerrainError::InvalidFlattenFactor(self.flatten_factor));
        }
        ColorGradient::from_stops(&self.color_stops).map(|_| ())
    }
}

fn hex_to_rgb(hex: u32) -> Vec3 {
    Vec3::new(
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    )
}

/// Deterministic height function: summed noise octaves, then road flattening.
pub struct HeightField {
    noise: Simplex,
    bands: Vec<NoiseBand>,
    flatten_factor: f64,
}

impl HeightField {
    pub fn new(seed: u64, bands: &[NoiseBand], flatten_factor: f64) -> Self {
        Self {
            noise: Simplex::new(deterministic_noise_seed(seed, 0)),
            bands: bands.to_vec(),
            flatten_factor,
        }
    }

    /// Height at world `(x, z)`. Pure: the same inputs always give the same bits.
    pub fn height(&self, x: f32, z: f32) -> f32 {
        let (x, z) = (x as f64, z as f64);
        let raw: f64 = self
            .bands
            .iter()
            .map(|band| self.noise.get([x * band.frequency, z * band.frequency]) * band.amplitude)
            .sum();
        let flatten = (-raw * raw * self.flatten_factor).exp();
        (raw * flatten) as f32
    }
}

/// Piecewise-linear colour ramp over ascending height stops.
#[derive(Debug, Clone)]
pub struct ColorGradient {
    stops: Vec<(f32, Vec3)>,
}

impl ColorGradient {
    pub fn from_stops(stops: &[ColorStop]) -> Result<Self, TerrainError> {
        let ordered = stops.windows(2).all(|pair| pair[0].height < pair[1].height);
        let finite = stops.iter().all(|s| s.height.is_finite());
        if stops.is_empty() || !ordered || !finite {
            return Err(TerrainError::InvalidColorStops);
        }
        Ok(Self {
            stops: stops.iter().map(|s| (s.height, hex_to_rgb(s.color))).collect(),
        })
    }

    /// Colour at `height`, clamped to the end colours outside the stop range.
    pub fn color(&self, height: f32) -> Vec3 {
        let (first_h, first_c) = self.stops[0];
        let (last_h, last_c) = self.stops[self.stops.len() - 1];
        if height.is_nan() || height <= first_h {
            return first_c;
        }
        if height >= last_h {
            return last_c;
        }

        for pair in self.stops.windows(2) {
            let (h0, c0) = pair[0];
            let (h1, c1) = pair[1];
            if height >= h0 && height < h1 {
                let t = ((height - h0) / (h1 - h0)).clamp(0.0, 1.0);
                return c0.lerp(c1, t);
            }
        }
        last_c
    }
}

/// The generated terrain: one grid pass, shared by rendering and collision.
#[derive(Debug)]
pub struct TerrainSurface {
    config: TerrainConfig,
    seed: u64,
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    colors: Vec<[f32; 3]>,
    triangles: Vec<[u32; 3]>,
}

impl TerrainSurface {
    /// Generate terrain from configuration.
    pub fn generate(config: TerrainConfig) -> Result<Self, TerrainError> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(rand::random);
        let field = HeightField::new(seed, &config.bands, config.flatten_factor);
        let gradient = ColorGradient::from_stops(&config.color_stops)?;

        let started = Instant::now();
        let cells = config.resolution as usize;
        let side = cells + 1;
        let step = config.size / cells as f32;
        let half_size = config.size / 2.0;

        let mut positions = Vec::with_capacity(side * side);
        let mut colors = Vec::with_capacity(side * side);
        let mut triangles = Vec::with_capacity(cells * cells * 2);

        for z in 0..side {
            for x in 0..side {
                let world_x = -half_size + x as f32 * step;
                let world_z = -half_size + z as f32 * step;
                let height = field.height(world_x, world_z);
                positions.push([world_x, height, world_z]);
                colors.push(gradient.color(height).to_array());

                if x < cells && z < cells {
                    let tl = (z * side + x) as u32;
                    let tr = tl + 1;
                    let bl = ((z + 1) * side + x) as u32;
                    let br = bl + 1;
                    triangles.push([tl, bl, tr]);
                    triangles.push([tr, bl, br]);
                }
            }
        }

        let normals = Self::calculate_normals(&positions, &triangles);

        log::info!(
            "Generated terrain {}x{} cells over {:.0} m (seed {}) in {:.1} ms",
            cells,
            cells,
            config.size,
            seed,
            started.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Self {
            config,
            seed,
            positions,
            normals,
            colors,
            triangles,
        })
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// The seed actually used, including a randomly chosen one.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Vertices per side.
    pub fn side(&self) -> usize {
        self.config.resolution as usize + 1
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn normals(&self) -> &[[f32; 3]] {
        &self.normals
    }

    pub fn colors(&self) -> &[[f32; 3]] {
        &self.colors
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// Triangle indices as a flat index buffer.
    pub fn indices(&self) -> &[u32] {
        bytemuck::cast_slice(&self.triangles)
    }

    /// Check if a world position lies inside the terrain's square domain.
    pub fn contains(&self, x: f32, z: f32) -> bool {
        let half = self.config.size / 2.0;
        x.abs() <= half && z.abs() <= half
    }

    /// Height of the mesh surface at `(x, z)`, clamped to the domain edge.
    pub fn sample_height(&self, x: f32, z: f32) -> f32 {
        let side = self.side();
        let cells = side - 1;
        let half_size = self.config.size / 2.0;
        let step = self.config.size / cells as f32;

        let gx = ((x + half_size) / step).clamp(0.0, cells as f32);
        let gz = ((z + half_size) / step).clamp(0.0, cells as f32);

        let x0 = (gx.floor() as usize).min(cells - 1);
        let z0 = (gz.floor() as usize).min(cells - 1);

        let fx = (gx - x0 as f32).clamp(0.0, 1.0);
        let fz = (gz - z0 as f32).clamp(0.0, 1.0);

        let h = |x: usize, z: usize| self.positions[z * side + x][1];
        let h00 = h(x0, z0); // top-left
        let h10 = h(x0 + 1, z0); // top-right
        let h01 = h(x0, z0 + 1); // bottom-left
        let h11 = h(x0 + 1, z0 + 1); // bottom-right

        // Split along the bottom-left to top-right diagonal, same as the mesh.
        if fx + fz <= 1.0 {
            h00 + fx * (h10 - h00) + fz * (h01 - h00)
        } else {
            h11 + (1.0 - fx) * (h01 - h11) + (1.0 - fz) * (h10 - h11)
        }
    }

    fn calculate_normals(positions: &[[f32; 3]], triangles: &[[u32; 3]]) -> Vec<[f32; 3]> {
        // Accumulate face normals per vertex
        let mut normals = vec![Vec3::ZERO; positions.len()];

        for tri in triangles {
            let [a, b, c] = tri.map(|i| i as usize);
            let v0 = Vec3::from(positions[a]);
            let v1 = Vec3::from(positions[b]);
            let v2 = Vec3::from(positions[c]);
            let n = (v1 - v0).cross(v2 - v0).normalize_or_zero();
            normals[a] += n;
            normals[b] += n;
            normals[c] += n;
        }

        normals
            .into_iter()
            .map(|n| {
                let n = n.try_normalize().unwrap_or(Vec3::Y);
                [n.x, n.y, n.z]
            })
            .collect()
    }
}
