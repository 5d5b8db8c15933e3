//! Mesh management module.
//!
//! This module defines the [`VertexArray`] struct for managing vertex data on the GPU side, and
//! [`Mesh`], which pairs uploaded geometry with the textures it is drawn with.
//! Vertices should implement the [`VertexLayout`] trait.

use std::mem::{offset_of, size_of};
use std::rc::Rc;

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::abs::{Bound, Gpu, ShaderProgram, TextureSet};
use crate::error::{MeshError, TextureError};

/// Trait that defines the attribute layout of a vertex type.
pub trait VertexLayout: Pod {
    /// Sets up the vertex attribute pointers for the vertex.
    ///
    /// Called with the vertex array and the vertex buffer bound.
    fn vertex_attribs(gl: &dyn Gpu);
}

/// The interleaved vertex every mesh is built from.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    pub const fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

impl VertexLayout for Vertex {
    fn vertex_attribs(gl: &dyn Gpu) {
        let stride = size_of::<Vertex>() as i32;
        let position = offset_of!(Vertex, position) as i32;
        let normal = offset_of!(Vertex, normal) as i32;
        let uv = offset_of!(Vertex, uv) as i32;
        gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, stride, position);
        gl.enable_vertex_attrib_array(0);
        gl.vertex_attrib_pointer_f32(1, 3, glow::FLOAT, false, stride, normal);
        gl.enable_vertex_attrib_array(1);
        gl.vertex_attrib_pointer_f32(2, 2, glow::FLOAT, false, stride, uv);
        gl.enable_vertex_attrib_array(2);
    }
}

/// A vertex of the full-screen quad used to composite framebuffers.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: Vec2,
    pub uv: Vec2,
}

impl VertexLayout for QuadVertex {
    fn vertex_attribs(gl: &dyn Gpu) {
        let stride = size_of::<QuadVertex>() as i32;
        let position = offset_of!(QuadVertex, position) as i32;
        let uv = offset_of!(QuadVertex, uv) as i32;
        gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, stride, position);
        gl.enable_vertex_attrib_array(0);
        gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, stride, uv);
        gl.enable_vertex_attrib_array(1);
    }
}

/// Represents vertex (and optionally index) data stored on the GPU side.
///
/// The handles are released on drop, including when construction fails halfway.
pub struct VertexArray {
    gl: Rc<dyn Gpu>,
    vao: Option<glow::VertexArray>,
    vbo: Option<glow::Buffer>,
    ebo: Option<glow::Buffer>,
    count: i32,
}

impl VertexArray {
    /// Uploads the given vertices, and indices if any, once with `STATIC_DRAW`.
    ///
    /// Every index must name one of `vertices`, so a draw never reads past the vertex buffer.
    pub fn new<V: VertexLayout>(
        gl: &Rc<dyn Gpu>,
        vertices: &[V],
        indices: Option<&[u32]>,
    ) -> Result<Self, MeshError> {
        if let Some(index) = indices
            .into_iter()
            .flatten()
            .copied()
            .find(|&index| index as usize >= vertices.len())
        {
            return Err(MeshError::IndexOutOfRange {
                index,
                vertices: vertices.len(),
            });
        }
        let elements = indices.map_or(vertices.len(), <[u32]>::len);
        let count = i32::try_from(elements).map_err(|_| MeshError::TooManyElements(elements))?;

        let mut array = Self {
            gl: Rc::clone(gl),
            vao: None,
            vbo: None,
            ebo: None,
            count,
        };

        let vao = gl.create_vertex_array().map_err(MeshError::Create)?;
        array.vao = Some(vao);
        let vbo = gl.create_buffer().map_err(MeshError::Create)?;
        array.vbo = Some(vbo);
        let ebo = indices
            .map(|_| gl.create_buffer().map_err(MeshError::Create))
            .transpose()?;
        array.ebo = ebo;

        let _vao = Bound::vertex_array(&**gl, vao);
        let _vbo = Bound::array_buffer(&**gl, vbo);
        gl.buffer_data_u8_slice(
            glow::ARRAY_BUFFER,
            bytemuck::cast_slice(vertices),
            glow::STATIC_DRAW,
        );
        if let (Some(ebo), Some(indices)) = (ebo, indices) {
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ebo));
            gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(indices),
                glow::STATIC_DRAW,
            );
        }
        V::vertex_attribs(&**gl);

        log::debug!(
            "uploaded {} vertices ({} bytes each), {} indices",
            vertices.len(),
            size_of::<V>(),
            indices.map_or(0, <[u32]>::len)
        );
        Ok(array)
    }

    /// Issues one draw over the whole array with the given primitive mode.
    pub fn draw(&self, mode: u32) {
        let Some(vao) = self.vao else {
            return;
        };
        let _vao = Bound::vertex_array(&*self.gl, vao);
        // SAFETY: `new` uploaded `count` elements and checked every index against the vertex
        // buffer, and the array holding both is bound for the call.
        unsafe {
            if self.ebo.is_some() {
                self.gl.draw_elements(mode, self.count, glow::UNSIGNED_INT, 0);
            } else {
                self.gl.draw_arrays(mode, 0, self.count);
            }
        }
    }

    /// Number of indices, or of vertices when there is no index buffer.
    pub fn count(&self) -> usize {
        self.count as usize
    }
}

impl Drop for VertexArray {
    fn drop(&mut self) {
        if let Some(ebo) = self.ebo.take() {
            self.gl.delete_buffer(ebo);
        }
        if let Some(vbo) = self.vbo.take() {
            self.gl.delete_buffer(vbo);
        }
        if let Some(vao) = self.vao.take() {
            self.gl.delete_vertex_array(vao);
        }
    }
}

/// Indexed triangle geometry plus the textures it is shaded with.
///
/// A mesh is move-only: it owns its buffers, which are uploaded once on construction.
pub struct Mesh {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    textures: TextureSet,
    geometry: VertexArray,
}

impl Mesh {
    pub fn new(
        gl: &Rc<dyn Gpu>,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
        textures: TextureSet,
    ) -> Result<Self, MeshError> {
        let geometry = VertexArray::new(gl, &vertices, Some(indices.as_slice()))?;
        Ok(Self {
            vertices,
            indices,
            textures,
            geometry,
        })
    }

    /// Binds the textures against `shader` and draws every index as triangles.
    ///
    /// The shader is left in use, so per-draw uniforms may be set before calling this.
    pub fn draw(&self, shader: &ShaderProgram) -> Result<(), TextureError> {
        shader.use_program();
        self.textures.bind_for_shader(shader)?;
        self.geometry.draw(glow::TRIANGLES);
        Ok(())
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn textures(&self) -> &TextureSet {
        &self.textures
    }
}
