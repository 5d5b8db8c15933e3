//! Error types.
//!
//! Every resource-owning component fails its construction as a whole and returns one of the
//! enums below. [`Error`] gathers them for the startup path, which logs the diagnostic and stops.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while building a [`crate::abs::ShaderProgram`].
#[derive(Error, Debug)]
pub enum ShaderError {
    /// A stage failed to compile, or its source could not be read.
    #[error("failed to compile {path}: {log}")]
    Compile { path: String, log: String },

    /// The stages compiled but the program failed to link.
    #[error("failed to link shader program: {log}")]
    Link { log: String },

    /// The driver refused to allocate a shader or program object.
    #[error("failed to create shader object: {0}")]
    Create(String),
}

/// Failures while loading or binding textures.
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("failed to load texture from {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error("invalid image type from {}: {channels} channels", path.display())]
    Channels { path: PathBuf, channels: u8 },

    #[error("a cubemap needs exactly 6 faces, got {0}")]
    CubemapFaces(usize),

    #[error("cannot load {} as a 2D cubemap texture", path.display())]
    CubemapAs2d { path: PathBuf },

    #[error("invalid texture type: {0}")]
    UnknownKind(String),

    #[error("texture set needs {needed} texture units but only {available} are available")]
    TooManyUnits { needed: usize, available: usize },

    #[error("failed to create texture object: {0}")]
    Create(String),
}

/// Failures while uploading geometry.
#[derive(Error, Debug)]
pub enum MeshError {
    #[error("failed to create buffer object: {0}")]
    Create(String),

    #[error("index {index} is out of range for {vertices} vertices")]
    IndexOutOfRange { index: u32, vertices: usize },

    #[error("{0} elements do not fit in one draw call")]
    TooManyElements(usize),
}

/// Failures while building a [`crate::abs::FrameBuffer`].
#[derive(Error, Debug)]
pub enum FrameBufferError {
    #[error("invalid framebuffer format: {bits} bits of {ty}")]
    Format { bits: u32, ty: String },

    #[error("Framebuffer not complete (status {0:#06x})")]
    Incomplete(u32),

    #[error("framebuffer passthrough shader: {0}")]
    Shader(#[from] ShaderError),

    #[error("framebuffer quad: {0}")]
    Mesh(#[from] MeshError),

    #[error("failed to create framebuffer object: {0}")]
    Create(String),
}

/// Window and context creation failures.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("failed to initialise SDL: {0}")]
    Sdl(String),

    #[error("failed to create window: {0}")]
    Window(#[from] sdl2::video::WindowBuildError),

    #[error("failed to create OpenGL context: {0}")]
    Context(String),
}

/// Failures while reading the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("unknown key name: {0}")]
    UnknownKey(String),

    #[error("unknown log level: {0}")]
    LogLevel(String),

    #[error("unknown color type: {0}")]
    ColorType(String),
}

/// Any error that can stop the renderer from starting or running.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error(transparent)]
    Texture(#[from] TextureError),

    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error(transparent)]
    FrameBuffer(#[from] FrameBufferError),

    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to install logger: {0}")]
    Logger(#[from] log::SetLoggerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
