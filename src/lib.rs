//! A small real-time OpenGL renderer: shader programs, texture sets, meshes and an off-screen
//! framebuffer, driven by a first-person camera and a per-frame main loop.

pub mod abs;
pub mod camera;
pub mod config;
pub mod error;
pub mod input;
pub mod logging;
pub mod main_loop;
pub mod scene;

pub use error::{Error, Result};
