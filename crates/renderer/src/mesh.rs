//! Mesh data structures and primitive generation.

use crate::vertex::{srgb_to_linear, Vertex};
use glam::Vec3;
use wgpu::util::DeviceExt;

/// A GPU mesh with vertex and index buffers.
pub struct Mesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_indices: u32,
}

impl Mesh {
    /// Create a mesh from vertex and index data.
    pub fn new(device: &wgpu::Device, label: &str, vertices: &[Vertex], indices: &[u32]) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Vertex Buffer")),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Index Buffer")),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            num_indices: indices.len() as u32,
        }
    }
}

/// Mesh data before GPU upload (for procedural generation).
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interleave separate attribute streams into one vertex buffer.
    ///
    /// `positions` and `indices` are copied unchanged so the drawn surface is the
    /// one the physics collides with. `srgb_colors` are converted to linear.
    pub fn from_streams(
        positions: &[[f32; 3]],
        normals: &[[f32; 3]],
        srgb_colors: &[[f32; 3]],
        indices: &[u32],
    ) -> Self {
        let vertices = positions
            .iter()
            .enumerate()
            .map(|(i, &position)| {
                let normal = normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]);
                let [r, g, b] = srgb_colors.get(i).copied().unwrap_or([1.0; 3]);
                Vertex::with_color(
                    position,
                    normal,
                    [srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b), 1.0],
                )
            })
            .collect();

        Self {
            vertices,
            indices: indices.to_vec(),
        }
    }

    /// Unit cube centred at the origin. Scale it per instance.
    pub fn cube() -> Self {
        let faces: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::Z, Vec3::X, Vec3::Y),
            (-Vec3::Z, -Vec3::X, Vec3::Y),
            (Vec3::Y, Vec3::X, -Vec3::Z),
            (-Vec3::Y, Vec3::X, Vec3::Z),
            (Vec3::X, -Vec3::Z, Vec3::Y),
            (-Vec3::X, Vec3::Z, Vec3::Y),
        ];

        let mut mesh = Self::new();
        for (normal, u, v) in faces {
            let base = mesh.vertices.len() as u32;
            for (su, sv) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
                let p = normal * 0.5 + u * su + v * sv;
                mesh.vertices.push(Vertex::new(p.into(), normal.into()));
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        mesh
    }

    /// Unit cylinder (radius 1, width 1) with its axis along Z, the wheel axle.
    pub fn cylinder(segments: u32) -> Self {
        let segments = segments.max(3);
        let mut mesh = Self::new();
        let step = std::f32::consts::TAU / segments as f32;

        // Side wall
        for i in 0..=segments {
            let (sin, cos) = (i as f32 * step).sin_cos();
            let normal = [cos, sin, 0.0];
            mesh.vertices.push(Vertex::new([cos, sin, -0.5], normal));
            mesh.vertices.push(Vertex::new([cos, sin, 0.5], normal));
        }
        for i in 0..segments {
            let a = i * 2;
            mesh.indices
                .extend_from_slice(&[a, a + 2, a + 1, a + 1, a + 2, a + 3]);
        }

        // Caps, slightly darker so the spin reads
        for (z, nz) in [(0.5_f32, 1.0_f32), (-0.5, -1.0)] {
            let center = mesh.vertices.len() as u32;
            let shade = [0.6, 0.6, 0.6, 1.0];
            mesh.vertices.push(Vertex::with_color([0.0, 0.0, z], [0.0, 0.0, nz], shade));
            for i in 0..=segments {
                let (sin, cos) = (i as f32 * step).sin_cos();
                // Alternate spokes light and dark.
                let c = if i % 2 == 0 { [0.9, 0.9, 0.9, 1.0] } else { shade };
                mesh.vertices.push(Vertex::with_color([cos, sin, z], [0.0, 0.0, nz], c));
            }
            for i in 0..segments {
                let (a, b) = (center + 1 + i, center + 2 + i);
                if nz > 0.0 {
                    mesh.indices.extend_from_slice(&[center, a, b]);
                } else {
                    mesh.indices.extend_from_slice(&[center, b, a]);
                }
            }
        }
        mesh
    }

    pub fn upload(&self, device: &wgpu::Device, label: &str) -> Mesh {
        Mesh::new(device, label, &self.vertices, &self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face_normal(mesh: &MeshData, tri: &[u32]) -> Vec3 {
        let p = |i: u32| Vec3::from(mesh.vertices[i as usize].position);
        (p(tri[1]) - p(tri[0])).cross(p(tri[2]) - p(tri[0]))
    }

    #[test]
    fn streams_keep_positions_and_indices_verbatim() {
        let positions = [[0.0, 1.5, 0.0], [1.0, -0.25, 0.0], [0.0, 0.0, 1.0]];
        let normals = [[0.0, 1.0, 0.0]; 3];
        let colors = [[1.0, 0.5, 0.0]; 3];
        let indices = [0, 2, 1];
        let mesh = MeshData::from_streams(&positions, &normals, &colors, &indices);

        let copied: Vec<[f32; 3]> = mesh.vertices.iter().map(|v| v.position).collect();
        assert_eq!(copied, positions);
        assert_eq!(mesh.indices, indices);
        assert_eq!(mesh.vertices[0].color[0], 1.0);
        assert!(mesh.vertices[0].color[1] < 0.5);
    }

    #[test]
    fn cube_faces_wind_outward() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        for tri in cube.indices.chunks(3) {
            let n = face_normal(&cube, tri);
            let stored = Vec3::from(cube.vertices[tri[0] as usize].normal);
            assert!(n.dot(stored) > 0.0);
        }
    }

    #[test]
    fn cylinder_faces_wind_outward() {
        let wheel = MeshData::cylinder(12);
        for tri in wheel.indices.chunks(3) {
            let n = face_normal(&wheel, tri);
            let stored = Vec3::from(wheel.vertices[tri[0] as usize].normal);
            assert!(n.dot(stored) > 0.0);
        }
    }
}
