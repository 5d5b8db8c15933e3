//! Module to work with OpenGL framebuffers.
//!
//! This module provides functionality to create, bind, and manage an off-screen render target
//! and to composite it back onto the window with a full-screen quad.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::abs::{Bound, Gpu, GpuTexture, QuadVertex, ShaderProgram, VertexArray};
use crate::error::{ConfigError, FrameBufferError};

/// Numeric type of the color attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorType {
    UnsignedByte,
    Float,
}

impl fmt::Display for ColorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColorType::UnsignedByte => "unsigned_byte",
            ColorType::Float => "float",
        })
    }
}

impl FromStr for ColorType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unsigned_byte" => Ok(ColorType::UnsignedByte),
            "float" => Ok(ColorType::Float),
            other => Err(ConfigError::ColorType(other.to_string())),
        }
    }
}

/// A validated color attachment format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorFormat {
    internal_format: u32,
    ty: u32,
}

impl ColorFormat {
    /// Accepts unsigned bytes at 8 or 16 bits and floats at 16 or 32 bits per channel.
    pub fn new(bits: u32, ty: ColorType) -> Result<Self, FrameBufferError> {
        let (internal_format, gl_type) = match (ty, bits) {
            (ColorType::UnsignedByte, 8) => (glow::RGBA8, glow::UNSIGNED_BYTE),
            (ColorType::UnsignedByte, 16) => (glow::RGBA16, glow::UNSIGNED_BYTE),
            (ColorType::Float, 16) => (glow::RGBA16F, glow::FLOAT),
            (ColorType::Float, 32) => (glow::RGBA32F, glow::FLOAT),
            _ => {
                return Err(FrameBufferError::Format {
                    bits,
                    ty: ty.to_string(),
                });
            }
        };
        Ok(Self {
            internal_format,
            ty: gl_type,
        })
    }

    pub fn internal_format(&self) -> u32 {
        self.internal_format
    }
}

/// Deletes the framebuffer object on drop.
struct FramebufferHandle {
    gl: Rc<dyn Gpu>,
    id: glow::Framebuffer,
}

impl Drop for FramebufferHandle {
    fn drop(&mut self) {
        self.gl.delete_framebuffer(self.id);
    }
}

/// Deletes the renderbuffer object on drop.
struct RenderbufferHandle {
    gl: Rc<dyn Gpu>,
    id: glow::Renderbuffer,
}

impl Drop for RenderbufferHandle {
    fn drop(&mut self) {
        self.gl.delete_renderbuffer(self.id);
    }
}

const QUAD: [QuadVertex; 4] = [
    QuadVertex {
        position: Vec2::new(-1.0, 1.0),
        uv: Vec2::new(0.0, 1.0),
    },
    QuadVertex {
        position: Vec2::new(-1.0, -1.0),
        uv: Vec2::new(0.0, 0.0),
    },
    QuadVertex {
        position: Vec2::new(1.0, 1.0),
        uv: Vec2::new(1.0, 1.0),
    },
    QuadVertex {
        position: Vec2::new(1.0, -1.0),
        uv: Vec2::new(1.0, 0.0),
    },
];

/// The size-dependent attachments of a [`FrameBuffer`].
struct RenderTarget {
    // Field order is drop order: the framebuffer goes before its attachments.
    fbo: FramebufferHandle,
    color: GpuTexture,
    depth: RenderbufferHandle,
}

impl RenderTarget {
    /// Allocates and attaches color and depth storage of the given size, then checks
    /// completeness. Nothing stays allocated or bound on failure.
    fn new(
        gl: &Rc<dyn Gpu>,
        width: i32,
        height: i32,
        format: ColorFormat,
        stencil: bool,
    ) -> Result<Self, FrameBufferError> {
        let fbo = FramebufferHandle {
            gl: Rc::clone(gl),
            id: gl.create_framebuffer().map_err(FrameBufferError::Create)?,
        };
        let depth = RenderbufferHandle {
            gl: Rc::clone(gl),
            id: gl.create_renderbuffer().map_err(FrameBufferError::Create)?,
        };
        let color = GpuTexture::new(gl, glow::TEXTURE_2D)
            .map_err(|e| FrameBufferError::Create(e.to_string()))?;

        let gl = &**gl;
        let _fbo = Bound::framebuffer(gl, fbo.id);

        {
            let _texture = Bound::texture(gl, glow::TEXTURE_2D, color.id());
            // SAFETY: no pixel data is passed, the driver only allocates storage.
            unsafe {
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    format.internal_format as i32,
                    width,
                    height,
                    glow::RGBA,
                    format.ty,
                    None,
                );
            }
            let linear = glow::LINEAR as i32;
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, linear);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, linear);
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(color.id()),
                0,
            );
        }

        {
            let (storage, attachment) = if stencil {
                (glow::DEPTH24_STENCIL8, glow::DEPTH_STENCIL_ATTACHMENT)
            } else {
                (glow::DEPTH_COMPONENT24, glow::DEPTH_ATTACHMENT)
            };
            let _renderbuffer = Bound::renderbuffer(gl, depth.id);
            gl.renderbuffer_storage(glow::RENDERBUFFER, storage, width, height);
            gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                attachment,
                glow::RENDERBUFFER,
                Some(depth.id),
            );
        }

        let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
        if status != glow::FRAMEBUFFER_COMPLETE {
            log::error!("framebuffer {width}x{height} incomplete: status {status:#06x}");
            return Err(FrameBufferError::Incomplete(status));
        }
        Ok(Self { fbo, color, depth })
    }
}

/// Represents an off-screen color + depth render target.
pub struct FrameBuffer {
    gl: Rc<dyn Gpu>,
    target: RenderTarget,
    shader: ShaderProgram,
    quad: VertexArray,
    format: ColorFormat,
    stencil: bool,
    width: i32,
    height: i32,
    clear_color: [f32; 4],
}

impl FrameBuffer {
    /// Creates a framebuffer of the given size and color format.
    ///
    /// With `stencil` the renderbuffer holds 24-bit depth and 8-bit stencil, otherwise depth
    /// only. Fails if the format is not supported or the driver reports the framebuffer
    /// incomplete; nothing is left allocated or bound in either case.
    pub fn new(
        gl: &Rc<dyn Gpu>,
        width: i32,
        height: i32,
        bits: u32,
        ty: ColorType,
        stencil: bool,
    ) -> Result<Self, FrameBufferError> {
        let format = ColorFormat::new(bits, ty)?;
        let shader = ShaderProgram::embedded(gl, "passthrough")?;
        let quad = VertexArray::new(gl, &QUAD[..], None)?;
        let target = RenderTarget::new(gl, width, height, format, stencil)?;

        log::info!(
            "created {width}x{height} framebuffer ({bits}-bit {ty}{})",
            if stencil { ", stencil" } else { "" }
        );
        Ok(Self {
            gl: Rc::clone(gl),
            target,
            shader,
            quad,
            format,
            stencil,
            width,
            height,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        })
    }

    /// Reallocates the attachments at a new size, keeping the format, shader and quad.
    ///
    /// On failure the framebuffer keeps its previous attachments and size.
    pub fn resize(&mut self, width: i32, height: i32) -> Result<(), FrameBufferError> {
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        self.target = RenderTarget::new(&self.gl, width, height, self.format, self.stencil)?;
        log::info!(
            "resized framebuffer from {}x{} to {width}x{height}",
            self.width,
            self.height
        );
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Sets the color the default surface is cleared to before compositing.
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Redirects subsequent draws into this framebuffer and clears it.
    pub fn bind_for_render(&self) {
        self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.target.fbo.id));
        self.gl.viewport(0, 0, self.width, self.height);
        self.gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        self.gl.enable(glow::DEPTH_TEST);
    }

    /// Draws the color attachment over the whole default surface.
    pub fn present(&self) {
        let [r, g, b, a] = self.clear_color;
        self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        self.gl.clear_color(r, g, b, a);
        self.gl.clear(glow::COLOR_BUFFER_BIT);
        self.shader.use_program();
        self.gl.disable(glow::DEPTH_TEST);
        self.shader.set_uniform("screen_texture", 0);
        self.target.color.bind(0);
        self.quad.draw(glow::TRIANGLE_STRIP);
    }

    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    /// Returns the color texture of the framebuffer.
    pub fn texture(&self) -> &GpuTexture {
        &self.target.color
    }

    pub fn renderbuffer(&self) -> glow::Renderbuffer {
        self.target.depth.id
    }
}
