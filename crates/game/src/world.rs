//! The drivable ground: generated terrain plus its static collision mesh.

use anyhow::{Context, Result};
use physics::{ColliderHandle, PhysicsWorld, SurfaceMaterial};
use procgen::{TerrainConfig, TerrainSurface};

/// Terrain surface registered with the physics world.
pub struct Ground {
    surface: TerrainSurface,
    collider: ColliderHandle,
}

impl Ground {
    /// Generate the terrain and add its trimesh to `world`. The collider uses the
    /// very buffers the render mesh is built from.
    pub fn build(config: TerrainConfig, world: &mut PhysicsWorld) -> Result<Self> {
        let surface = TerrainSurface::generate(config).context("Failed to generate terrain")?;
        let collider = world
            .add_static_trimesh(surface.positions(), surface.triangles(), SurfaceMaterial::ground())
            .context("Failed to build terrain collider")?;
        log::info!(
            "Ground ready: {}x{} samples, seed {}",
            surface.side(),
            surface.side(),
            surface.seed()
        );
        Ok(Self { surface, collider })
    }

    pub fn surface(&self) -> &TerrainSurface {
        &self.surface
    }

    /// Height of the mesh surface under `(x, z)`.
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        self.surface.sample_height(x, z)
    }

    pub fn despawn(self, world: &mut PhysicsWorld) {
        world.remove_collider(self.collider);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collider_matches_sampled_height() {
        let mut world = PhysicsWorld::new();
        let config = TerrainConfig {
            size: 64.0,
            resolution: 16,
            seed: Some(11),
            ..Default::default()
        };
        let ground = Ground::build(config, &mut world).unwrap();
        for (x, z) in [(0.0, 0.0), (7.3, -12.9), (-20.0, 15.5)] {
            let hit = world.ground_height(x, z, 50.0).unwrap();
            let sampled = ground.height_at(x, z);
            assert!((hit - sampled).abs() < 1e-3, "{hit} vs {sampled}");
        }
    }

    #[test]
    fn invalid_terrain_is_an_error() {
        let mut world = PhysicsWorld::new();
        let config = TerrainConfig {
            resolution: 0,
            ..TerrainConfig::flat(10.0, 1)
        };
        assert!(Ground::build(config, &mut world).is_err());
    }
}
