//! Main renderer managing wgpu state and rendering.

use crate::{
    camera::{Camera, CameraUniform},
    mesh::Mesh,
    overlay::generate_font_atlas,
    pipeline::{
        create_instanced_pipeline, create_overlay_bind_group_layout, create_overlay_pipeline,
        create_scene_bind_group_layout, create_terrain_pipeline,
    },
    texture::Texture,
    vertex::{hex_to_linear, InstanceData, OverlayVertex},
};
use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::window::Window;

/// Instances the shared instance buffer can hold per frame.
const MAX_INSTANCES: u32 = 256;

/// Scene lighting and atmosphere. Colours are `0xRRGGBB` (sRGB).
#[derive(Debug, Clone, Copy)]
pub struct SceneLighting {
    /// Direction the sunlight travels.
    pub sun_direction: Vec3,
    pub sun_color: u32,
    pub sun_intensity: f32,
    /// Background, fog and upper hemisphere colour.
    pub sky_color: u32,
    /// Lower hemisphere colour.
    pub ground_color: u32,
    pub hemisphere_intensity: f32,
    pub fog_near: f32,
    pub fog_far: f32,
}

impl Default for SceneLighting {
    fn default() -> Self {
        Self {
            sun_direction: -Vec3::new(40.0, 50.0, 20.0).normalize(),
            sun_color: 0xffffff,
            sun_intensity: 1.0,
            sky_color: 0x0a0a32,
            ground_color: 0xb8860b,
            hemisphere_intensity: 0.6,
            fog_near: 50.0,
            fog_far: 300.0,
        }
    }
}

/// Lighting uniform (must match scene.wgsl Lighting).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightingUniform {
    pub sun_direction: [f32; 4],
    pub sun_color: [f32; 4],
    pub sky_color: [f32; 4],
    pub ground_color: [f32; 4],
    pub fog: [f32; 4],
}

impl From<&SceneLighting> for LightingUniform {
    fn from(l: &SceneLighting) -> Self {
        let dir = l.sun_direction.normalize_or(-Vec3::Y);
        let mut sky = hex_to_linear(l.sky_color);
        sky[3] = l.hemisphere_intensity;
        Self {
            sun_direction: [dir.x, dir.y, dir.z, l.sun_intensity],
            sun_color: hex_to_linear(l.sun_color),
            sky_color: sky,
            ground_color: hex_to_linear(l.ground_color),
            fog: [l.fog_near, l.fog_far, 0.0, 0.0],
        }
    }
}

/// An acquired swap-chain image plus the encoder recording into it.
pub struct Frame {
    output: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
}

/// Forward renderer: terrain, instanced meshes, then a text overlay.
pub struct Renderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_texture: Texture,

    camera_uniform: CameraUniform,
    camera_buffer: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
    clear_color: wgpu::Color,

    terrain_pipeline: wgpu::RenderPipeline,
    instanced_pipeline: wgpu::RenderPipeline,
    instance_buffer: wgpu::Buffer,
    frame_instance_offset: u32,

    // Text overlay
    overlay_pipeline: wgpu::RenderPipeline,
    overlay_bind_group: wgpu::BindGroup,
}

impl Renderer {
    /// Create a new renderer for the given window.
    pub async fn new(window: Arc<Window>, vsync: bool, lighting: &SceneLighting) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("Failed to find suitable GPU adapter"))?;

        log::info!("Using GPU: {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Main Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .context("Failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Surface reports no supported formats"))?;

        let present_mode = if vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture = Texture::create_depth_texture(&device, config.width, config.height, "Depth Texture");

        // Scene uniforms
        let camera_uniform = CameraUniform::new();
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        // Fixed for the session; the bind group keeps the buffer alive.
        let lighting_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Lighting Buffer"),
            contents: bytemuck::cast_slice(&[LightingUniform::from(lighting)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let scene_layout = create_scene_bind_group_layout(&device);
        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Bind Group"),
            layout: &scene_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lighting_buffer.as_entire_binding(),
                },
            ],
        });

        let terrain_pipeline = create_terrain_pipeline(&device, config.format, &scene_layout);
        let instanced_pipeline = create_instanced_pipeline(&device, config.format, &scene_layout);

        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Instance Buffer"),
            size: (MAX_INSTANCES as usize * std::mem::size_of::<InstanceData>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // --- Overlay (text) pipeline ---
        let overlay_layout = create_overlay_bind_group_layout(&device);
        let overlay_pipeline = create_overlay_pipeline(&device, config.format, &overlay_layout);

        let (font_pixels, font_w, font_h) = generate_font_atlas();
        let font = Texture::from_r8(&device, &queue, &font_pixels, font_w, font_h, "Font Atlas");
        let font_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let overlay_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Overlay Bind Group"),
            layout: &overlay_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&font.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&font_sampler),
                },
            ],
        });

        let [r, g, b, _] = hex_to_linear(lighting.sky_color);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth_texture,
            camera_uniform,
            camera_buffer,
            scene_bind_group,
            clear_color: wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: 1.0,
            },
            terrain_pipeline,
            instanced_pipeline,
            instance_buffer,
            frame_instance_offset: 0,
            overlay_pipeline,
            overlay_bind_group,
        })
    }

    /// Handle window resize.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.depth_texture = Texture::create_depth_texture(&self.device, width, height, "Depth Texture");
        }
    }

    /// Update camera uniform.
    pub fn update_camera(&mut self, camera: &Camera) {
        self.camera_uniform.update(camera);
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[self.camera_uniform]));
    }

    /// Acquire the next swap-chain image.
    ///
    /// Returns `Ok(None)` when the frame should be skipped: a lost or outdated
    /// surface is reconfigured and a timeout is simply retried next frame.
    pub fn begin_frame(&mut self) -> Result<Option<Frame>> {
        self.frame_instance_offset = 0;
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(None);
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timed out acquiring surface texture");
                return Ok(None);
            }
            Err(err) => return Err(err).context("Failed to acquire surface texture"),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });
        Ok(Some(Frame { output, view, encoder }))
    }

    fn scene_pass<'a>(&'a self, frame: &'a mut Frame, label: &str, clear: bool) -> wgpu::RenderPass<'a> {
        let (color_load, depth_load) = if clear {
            (wgpu::LoadOp::Clear(self.clear_color), wgpu::LoadOp::Clear(1.0))
        } else {
            (wgpu::LoadOp::Load, wgpu::LoadOp::Load)
        };
        frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_texture.view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }

    /// Clear to the sky colour and draw the terrain. First pass of every frame.
    pub fn render_terrain(&self, frame: &mut Frame, mesh: &Mesh) {
        let mut render_pass = self.scene_pass(frame, "Terrain Render Pass", true);
        render_pass.set_pipeline(&self.terrain_pipeline);
        render_pass.set_bind_group(0, &self.scene_bind_group, &[]);
        render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(0..mesh.num_indices, 0, 0..1);
    }

    /// Render meshes with instancing over what is already in the frame.
    pub fn render_instanced(&mut self, frame: &mut Frame, mesh: &Mesh, instances: &[InstanceData]) {
        if instances.is_empty() {
            return;
        }

        // Allocate a unique region in the instance buffer for this draw call
        let offset = self.frame_instance_offset;
        let instance_count = instances.len().min(MAX_INSTANCES.saturating_sub(offset) as usize);
        if instance_count == 0 {
            log::warn!("Instance buffer full, dropping {} instances", instances.len());
            return;
        }

        let byte_offset = (offset as usize * std::mem::size_of::<InstanceData>()) as u64;
        self.queue.write_buffer(
            &self.instance_buffer,
            byte_offset,
            bytemuck::cast_slice(&instances[..instance_count]),
        );
        self.frame_instance_offset = offset + instance_count as u32;

        let mut render_pass = self.scene_pass(frame, "Instanced Render Pass", false);
        render_pass.set_pipeline(&self.instanced_pipeline);
        render_pass.set_bind_group(0, &self.scene_bind_group, &[]);
        render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(0..mesh.num_indices, 0, offset..(offset + instance_count as u32));
    }

    /// Render screen-space text overlay. Call as the very last pass before end_frame.
    pub fn render_overlay(&self, frame: &mut Frame, vertices: &[OverlayVertex], indices: &[u32]) {
        if vertices.is_empty() || indices.is_empty() {
            return;
        }

        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Overlay Vertex Buffer"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Overlay Index Buffer"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let mut render_pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Overlay Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(&self.overlay_pipeline);
        render_pass.set_bind_group(0, &self.overlay_bind_group, &[]);
        render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));
        render_pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(0..indices.len() as u32, 0, 0..1);
    }

    /// End frame and present.
    pub fn end_frame(&self, frame: Frame) {
        self.queue.submit(std::iter::once(frame.encoder.finish()));
        frame.output.present();
    }

    /// Get surface dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Access the device for mesh creation.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lighting_uniform_packs_intensities_and_fog() {
        let uniform = LightingUniform::from(&SceneLighting::default());
        assert_eq!(uniform.fog[0], 50.0);
        assert_eq!(uniform.fog[1], 300.0);
        assert_eq!(uniform.sky_color[3], 0.6);
        assert!(uniform.sun_direction[1] < 0.0);
        assert_eq!(std::mem::size_of::<LightingUniform>() % 16, 0);
    }
}
