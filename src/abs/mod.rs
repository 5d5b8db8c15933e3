//! This module contains the core GPU components of the renderer,
//! including the binding context, window setup, shaders, textures, meshes and framebuffers.

pub mod app;
pub mod framebuffer;
pub mod gpu;
pub mod mesh;
pub mod shader;
pub mod texture;

pub use app::*;
pub use framebuffer::*;
pub use gpu::{Binding, Bound, Gpu};
pub use mesh::*;
pub use shader::*;
pub use texture::*;
