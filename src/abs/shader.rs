//! OpenGL Shaders
//!
//! This module defines the [`Shader`] and [`ShaderProgram`] structs for managing OpenGL shaders.
//! This module also provides the [`Uniform`] trait for setting uniform variables in shader
//! programs.

use std::path::Path;
use std::rc::Rc;

use glam::{Mat4, Vec3, Vec4};
use include_dir::{Dir, include_dir};

use crate::abs::Gpu;
use crate::error::ShaderError;

/// GLSL sources shipped with the crate, laid out as `<name>/vert.glsl` and `<name>/frag.glsl`.
static EMBEDDED_SHADERS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/shaders");

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
}

impl ShaderStage {
    fn gl_type(self) -> u32 {
        match self {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
            ShaderStage::Geometry => glow::GEOMETRY_SHADER,
        }
    }
}

/// Source text for one stage plus a label used in diagnostics (usually its path).
#[derive(Debug, Clone, Copy)]
pub struct StageSource<'a> {
    pub stage: ShaderStage,
    pub label: &'a str,
    pub source: &'a str,
}

/// Represents an individual OpenGL shader.
pub struct Shader {
    gl: Rc<dyn Gpu>,
    id: glow::Shader,
}

impl Shader {
    /// Compiles a new shader from the given source code.
    ///
    /// On failure the shader object is deleted and the compiler log is returned.
    pub fn new(gl: &Rc<dyn Gpu>, source: StageSource<'_>) -> Result<Self, ShaderError> {
        let id = gl
            .create_shader(source.stage.gl_type())
            .map_err(ShaderError::Create)?;
        let shader = Self {
            gl: Rc::clone(gl),
            id,
        };
        gl.shader_source(id, source.source);
        gl.compile_shader(id);

        if !gl.get_shader_compile_status(id) {
            let log = gl.get_shader_info_log(id);
            log::error!("{} failed to compile:\n{}", source.label, log.trim_end());
            return Err(ShaderError::Compile {
                path: source.label.to_string(),
                log,
            });
        }

        Ok(shader)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        self.gl.delete_shader(self.id);
    }
}

/// Represents a uniform variable in a shader program.
pub trait Uniform {
    /// Uploads the value to the given location of the currently used program.
    fn set_uniform(&self, gl: &dyn Gpu, location: &glow::UniformLocation);
}

impl Uniform for bool {
    fn set_uniform(&self, gl: &dyn Gpu, location: &glow::UniformLocation) {
        gl.uniform_1_i32(Some(location), *self as i32);
    }
}

impl Uniform for i32 {
    fn set_uniform(&self, gl: &dyn Gpu, location: &glow::UniformLocation) {
        gl.uniform_1_i32(Some(location), *self);
    }
}

impl Uniform for f32 {
    fn set_uniform(&self, gl: &dyn Gpu, location: &glow::UniformLocation) {
        gl.uniform_1_f32(Some(location), *self);
    }
}

impl Uniform for Vec3 {
    fn set_uniform(&self, gl: &dyn Gpu, location: &glow::UniformLocation) {
        gl.uniform_3_f32(Some(location), self.x, self.y, self.z);
    }
}

impl Uniform for Vec4 {
    fn set_uniform(&self, gl: &dyn Gpu, location: &glow::UniformLocation) {
        gl.uniform_4_f32(Some(location), self.x, self.y, self.z, self.w);
    }
}

impl Uniform for Mat4 {
    fn set_uniform(&self, gl: &dyn Gpu, location: &glow::UniformLocation) {
        gl.uniform_matrix_4_f32_slice(Some(location), false, self.as_ref());
    }
}

impl<T: Uniform> Uniform for &T {
    fn set_uniform(&self, gl: &dyn Gpu, location: &glow::UniformLocation) {
        (*self).set_uniform(gl, location);
    }
}

/// A linked OpenGL program together with the stages it was linked from.
///
/// Construction is all-or-nothing: either every stage compiles and the program links, or every
/// handle created so far is released and an error is returned.
pub struct ShaderProgram {
    gl: Rc<dyn Gpu>,
    id: glow::Program,
    stages: Vec<Shader>,
}

impl ShaderProgram {
    /// Reads the stage sources from disk, then compiles and links them.
    ///
    /// Every file is read before the first GPU call, so a missing file never touches the driver.
    pub fn from_files(
        gl: &Rc<dyn Gpu>,
        vertex: &Path,
        fragment: &Path,
        geometry: Option<&Path>,
    ) -> Result<Self, ShaderError> {
        let vertex_source = read_source(vertex)?;
        let fragment_source = read_source(fragment)?;
        let geometry_source = geometry.map(read_source).transpose()?;

        let vertex_label = vertex.display().to_string();
        let fragment_label = fragment.display().to_string();
        let geometry_label = geometry.map(|p| p.display().to_string());

        let mut sources = vec![
            StageSource {
                stage: ShaderStage::Vertex,
                label: &vertex_label,
                source: &vertex_source,
            },
            StageSource {
                stage: ShaderStage::Fragment,
                label: &fragment_label,
                source: &fragment_source,
            },
        ];
        if let (Some(label), Some(source)) = (&geometry_label, &geometry_source) {
            sources.push(StageSource {
                stage: ShaderStage::Geometry,
                label,
                source,
            });
        }

        Self::from_sources(gl, &sources)
    }

    /// Builds one of the programs embedded in the binary (`shaders/<name>/`).
    pub fn embedded(gl: &Rc<dyn Gpu>, name: &str) -> Result<Self, ShaderError> {
        let vertex_path = format!("{name}/vert.glsl");
        let fragment_path = format!("{name}/frag.glsl");
        let vertex = embedded_source(&vertex_path)?;
        let fragment = embedded_source(&fragment_path)?;

        Self::from_sources(
            gl,
            &[
                StageSource {
                    stage: ShaderStage::Vertex,
                    label: &vertex_path,
                    source: vertex,
                },
                StageSource {
                    stage: ShaderStage::Fragment,
                    label: &fragment_path,
                    source: fragment,
                },
            ],
        )
    }

    /// Compiles every stage in order, then links them into a program.
    pub fn from_sources(
        gl: &Rc<dyn Gpu>,
        sources: &[StageSource<'_>],
    ) -> Result<Self, ShaderError> {
        let stages = sources
            .iter()
            .map(|source| Shader::new(gl, *source))
            .collect::<Result<Vec<_>, _>>()?;

        let id = gl.create_program().map_err(ShaderError::Create)?;
        for shader in &stages {
            gl.attach_shader(id, shader.id);
        }
        gl.link_program(id);

        if !gl.get_program_link_status(id) {
            let log = gl.get_program_info_log(id);
            log::error!("shader program failed to link:\n{}", log.trim_end());
            gl.delete_program(id);
            return Err(ShaderError::Link { log });
        }

        log::info!(
            "linked shader program from {}",
            sources.iter().map(|s| s.label).collect::<Vec<_>>().join(", ")
        );

        Ok(Self {
            gl: Rc::clone(gl),
            id,
            stages,
        })
    }

    /// Binds the shader program for use.
    pub fn use_program(&self) {
        self.gl.use_program(Some(self.id));
    }

    /// Looks up a uniform. `None` means the program has no active uniform of that name.
    pub fn uniform_location(&self, name: &str) -> Option<glow::UniformLocation> {
        self.gl.get_uniform_location(self.id, name)
    }

    /// Sets a uniform on this program, which must be in use. Unknown names are ignored.
    pub fn set_uniform<T: Uniform>(&self, name: &str, value: T) {
        if let Some(location) = self.uniform_location(name) {
            value.set_uniform(&*self.gl, &location);
        }
    }

    pub fn id(&self) -> glow::Program {
        self.id
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        // The attached stages are deleted right after, when `stages` drops.
        self.gl.delete_program(self.id);
    }
}

fn read_source(path: &Path) -> Result<String, ShaderError> {
    std::fs::read_to_string(path).map_err(|e| ShaderError::Compile {
        path: path.display().to_string(),
        log: format!("cannot open {}: {e}", path.display()),
    })
}

fn embedded_source(path: &str) -> Result<&'static str, ShaderError> {
    EMBEDDED_SHADERS
        .get_file(path)
        .and_then(|file| file.contents_utf8())
        .ok_or_else(|| ShaderError::Compile {
            path: path.to_string(),
            log: format!("cannot open {path}"),
        })
}
