//! SDL2 and OpenGL application management.
//!
//! This module defines the [`App`] struct which encapsulates the SDL2
//! and OpenGL context necessary for creating a windowed application.

use std::rc::Rc;

use glam::Vec2;
use sdl2::event::{Event, WindowEvent};

use crate::config::WindowConfig;
use crate::error::AppError;
use crate::input::{InputFrame, KeyboardState};
use crate::main_loop::Surface;

/// The [`App`] struct encapsulates the SDL2 and OpenGL context.
pub struct App {
    pub sdl: sdl2::Sdl,
    pub video_subsystem: sdl2::VideoSubsystem,
    pub window: sdl2::video::Window,
    pub gl_context: sdl2::video::GLContext,
    pub gl: Rc<glow::Context>,
    pub event_pump: sdl2::EventPump,
    keyboard: KeyboardState,
    /// Sum of relative mouse motion, since the cursor is captured.
    cursor: Vec2,
}

impl App {
    /// Creates a window with an OpenGL 3.3 core context made current.
    ///
    /// The width and height options are ignored if `fullscreen` is set to `true`.
    pub fn new(config: &WindowConfig) -> Result<Self, AppError> {
        let sdl = sdl2::init().map_err(AppError::Sdl)?;
        let video_subsystem = sdl.video().map_err(AppError::Sdl)?;

        let gl_attr = video_subsystem.gl_attr();
        gl_attr.set_context_profile(sdl2::video::GLProfile::Core);
        gl_attr.set_context_version(3, 3);
        gl_attr.set_framebuffer_srgb_compatible(true);
        if config.msaa_samples > 0 {
            gl_attr.set_multisample_buffers(1);
            gl_attr.set_multisample_samples(config.msaa_samples);
        }

        let (width, height) = if config.fullscreen {
            let display_mode = video_subsystem
                .current_display_mode(0)
                .map_err(AppError::Sdl)?;
            (display_mode.w as u32, display_mode.h as u32)
        } else {
            (config.width, config.height)
        };
        let mut window = video_subsystem
            .window(&config.title, width, height)
            .opengl()
            .resizable()
            .build()?;
        if config.fullscreen {
            window
                .set_fullscreen(sdl2::video::FullscreenType::Desktop)
                .map_err(AppError::Sdl)?;
        }

        let gl_context = window.gl_create_context().map_err(AppError::Context)?;
        window
            .gl_make_current(&gl_context)
            .map_err(AppError::Context)?;
        let interval = if config.vsync {
            sdl2::video::SwapInterval::VSync
        } else {
            sdl2::video::SwapInterval::Immediate
        };
        if let Err(e) = video_subsystem.gl_set_swap_interval(interval) {
            log::warn!("cannot set swap interval: {e}");
        }

        let gl = unsafe {
            glow::Context::from_loader_function(|s| {
                video_subsystem.gl_get_proc_address(s) as *const _
            })
        };
        sdl.mouse().set_relative_mouse_mode(true);
        let event_pump = sdl.event_pump().map_err(AppError::Sdl)?;

        log::info!("created {width}x{height} window \"{}\"", config.title);
        Ok(Self {
            sdl,
            video_subsystem,
            window,
            gl_context,
            gl: Rc::new(gl),
            event_pump,
            keyboard: KeyboardState::default(),
            cursor: Vec2::ZERO,
        })
    }
}

impl Surface for App {
    fn swap(&mut self) {
        self.window.gl_swap_window();
    }

    fn poll(&mut self) -> InputFrame {
        self.keyboard.end_frame();
        let mut resized = None;
        let mut quit_requested = false;

        for event in self.event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => quit_requested = true,
                Event::KeyDown {
                    keycode: Some(key), ..
                } => self.keyboard.key_down(key),
                Event::KeyUp {
                    keycode: Some(key), ..
                } => self.keyboard.key_up(key),
                Event::MouseMotion { xrel, yrel, .. } => {
                    self.cursor += Vec2::new(xrel as f32, yrel as f32);
                }
                Event::Window {
                    win_event: WindowEvent::SizeChanged(..),
                    ..
                } => resized = Some(self.window.drawable_size()),
                _ => {}
            }
        }

        InputFrame {
            keyboard: self.keyboard.clone(),
            cursor: self.cursor,
            resized,
            quit_requested,
        }
    }

    fn size(&self) -> (u32, u32) {
        self.window.drawable_size()
    }

    fn set_title(&mut self, title: &str) {
        if let Err(e) = self.window.set_title(title) {
            log::warn!("cannot set window title: {e}");
        }
    }
}
