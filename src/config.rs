//! Runtime configuration, read from a JSON file.
//!
//! Every field has a default, so a config file only needs the values it changes.

use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::abs::ColorType;
use crate::error::ConfigError;

/// Directory under the platform config directory the default config file lives in.
const APP_DIR: &str = "glint3d";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub render: RenderConfig,
    pub scene: SceneConfig,
    pub keys: KeysConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Ignores `width` and `height` and covers the desktop.
    pub fullscreen: bool,
    pub vsync: bool,
    /// Multisample anti-aliasing samples. 0 disables it.
    pub msaa_samples: u8,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "glint3d".to_string(),
            width: 800,
            height: 600,
            fullscreen: false,
            vsync: true,
            msaa_samples: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: Vec3,
    pub front: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f32,
    /// Movement speed in units per second.
    pub speed: f32,
    /// Degrees turned per pixel of mouse movement.
    pub sensitivity: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, 4.0),
            front: Vec3::NEG_Z,
            up: Vec3::Y,
            fov: 45.0,
            speed: 2.5,
            sensitivity: 0.05,
            near: 0.1,
            far: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Renders the scene into an off-screen framebuffer, then composites it onto the window.
    pub offscreen: bool,
    pub color_bits: u32,
    pub color_type: ColorType,
    pub stencil: bool,
    pub clear_color: [f32; 4],
    /// Enables sRGB conversion on write to the default framebuffer.
    pub srgb: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            offscreen: false,
            color_bits: 8,
            color_type: ColorType::UnsignedByte,
            stencil: false,
            clear_color: [0.2, 0.3, 0.3, 1.0],
            srgb: true,
        }
    }
}

/// A texture to load for every mesh in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialConfig {
    pub path: PathBuf,
    /// Sampler prefix, e.g. `texture_diffuse`.
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Vertex shader path. `None` uses the embedded scene program.
    pub vertex_shader: Option<PathBuf>,
    pub fragment_shader: Option<PathBuf>,
    pub geometry_shader: Option<PathBuf>,
    pub materials: Vec<MaterialConfig>,
    /// Cubemap faces in +X, -X, +Y, -Y, +Z, -Z order.
    pub skybox: Option<Vec<PathBuf>>,
    /// Where cube instances are placed. `None` uses the reference layout.
    pub positions: Option<Vec<Vec3>>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            vertex_shader: None,
            fragment_shader: None,
            geometry_shader: None,
            materials: vec![
                MaterialConfig {
                    path: PathBuf::from("assets/container.png"),
                    kind: "texture_diffuse".to_string(),
                },
                MaterialConfig {
                    path: PathBuf::from("assets/awesomeface.png"),
                    kind: "texture_diffuse".to_string(),
                },
            ],
            skybox: None,
            positions: None,
        }
    }
}

/// SDL key names for each action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    pub forward: String,
    pub back: String,
    pub left: String,
    pub right: String,
    pub up: String,
    pub down: String,
    pub toggle_fill: String,
    pub quit: String,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            forward: "W".to_string(),
            back: "S".to_string(),
            left: "A".to_string(),
            right: "D".to_string(),
            up: "Space".to_string(),
            down: "X".to_string(),
            toggle_fill: "T".to_string(),
            quit: "Escape".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// One of `off`, `error`, `warn`, `info`, `debug`, `trace`.
    pub level: String,
    /// Also append log lines to this file.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Reads and parses a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The per-user config file, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Loads the config named on the command line, else the per-user file, else defaults.
    ///
    /// An explicit path must exist. A missing per-user file is not an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// The `log` level filter named by `log.level`.
    pub fn log_level(&self) -> Result<log::LevelFilter, ConfigError> {
        self.log
            .level
            .parse()
            .map_err(|_| ConfigError::LogLevel(self.log.level.clone()))
    }
}
