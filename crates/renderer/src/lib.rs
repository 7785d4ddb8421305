//! Rendering system using wgpu: lit terrain, instanced vehicle parts and a text overlay.

pub mod camera;
pub mod mesh;
pub mod overlay;
pub mod pipeline;
pub mod renderer;
pub mod texture;
pub mod vertex;

pub use camera::*;
pub use mesh::*;
pub use overlay::*;
pub use pipeline::*;
pub use renderer::*;
pub use texture::*;
pub use vertex::*;
