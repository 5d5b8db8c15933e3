//! The per-frame loop: clear, update the camera, draw, present, poll input.

use std::rc::Rc;
use std::time::Instant;

use crate::abs::{FrameBuffer, Gpu};
use crate::camera::{Camera, Direction};
use crate::config::{Config, RenderConfig};
use crate::error::{FrameBufferError, Result};
use crate::input::{InputFrame, KeyBindings, MouseState};
use crate::scene::Scene;

/// The window the loop draws into.
pub trait Surface {
    /// Presents the finished frame. May block for vertical sync.
    fn swap(&mut self);

    /// Collects the input that arrived since the last poll.
    fn poll(&mut self) -> InputFrame;

    /// Drawable size in pixels.
    fn size(&self) -> (u32, u32);

    fn set_title(&mut self, _title: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    /// Terminal. The loop exits once the current iteration finishes.
    Closing,
}

/// How triangles are rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Filled,
    Wireframe,
}

impl RenderMode {
    pub fn toggled(self) -> Self {
        match self {
            RenderMode::Filled => RenderMode::Wireframe,
            RenderMode::Wireframe => RenderMode::Filled,
        }
    }

    fn polygon_mode(self) -> u32 {
        match self {
            RenderMode::Filled => glow::FILL,
            RenderMode::Wireframe => glow::LINE,
        }
    }
}

/// Owns the scene, camera and window and drives them once per frame.
pub struct MainLoop<S: Surface> {
    gl: Rc<dyn Gpu>,
    scene: Scene,
    framebuffer: Option<FrameBuffer>,
    camera: Camera,
    render: RenderConfig,
    bindings: KeyBindings,
    mouse: MouseState,
    state: LoopState,
    mode: RenderMode,

    started: Instant,
    last_frame: Instant,
    frames: u32,
    fps_since: Instant,
    title: String,

    // Dropped last: GPU resources above must go while the context is alive.
    surface: S,
}

impl<S: Surface> MainLoop<S> {
    /// Sets up render state for `surface` and, when configured, the off-screen framebuffer.
    pub fn new(gl: Rc<dyn Gpu>, surface: S, scene: Scene, config: &Config) -> Result<Self> {
        let bindings = KeyBindings::try_from(&config.keys)?;
        let (width, height) = surface.size();
        let mut camera = Camera::new(&config.camera, 1.0);
        camera.set_aspect(width, height);

        gl.enable(glow::DEPTH_TEST);
        if config.window.msaa_samples > 0 {
            gl.enable(glow::MULTISAMPLE);
        }
        if config.render.srgb {
            gl.enable(glow::FRAMEBUFFER_SRGB);
        }
        gl.viewport(0, 0, width as i32, height as i32);

        let framebuffer = if config.render.offscreen {
            Some(create_framebuffer(&gl, &config.render, width, height)?)
        } else {
            None
        };

        let now = Instant::now();
        Ok(Self {
            gl,
            scene,
            framebuffer,
            camera,
            render: config.render.clone(),
            bindings,
            mouse: MouseState::default(),
            state: LoopState::Running,
            mode: RenderMode::default(),
            started: now,
            last_frame: now,
            frames: 0,
            fps_since: now,
            title: config.window.title.clone(),
            surface,
        })
    }

    /// Runs frames until the loop is closing.
    pub fn run(&mut self) -> Result<()> {
        log::info!("entering main loop");
        while self.state == LoopState::Running {
            self.step()?;
        }
        log::info!("main loop closed");
        Ok(())
    }

    /// Runs one full iteration and returns the state after it.
    pub fn step(&mut self) -> Result<LoopState> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        let [r, g, b, a] = self.render.clear_color;
        self.gl.clear_color(r, g, b, a);
        self.gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);

        self.camera.update(dt);

        if let Some(framebuffer) = &self.framebuffer {
            framebuffer.bind_for_render();
        }
        self.gl
            .polygon_mode(glow::FRONT_AND_BACK, self.mode.polygon_mode());
        let time = now.duration_since(self.started).as_secs_f32();
        self.scene
            .draw_all(self.camera.view(), self.camera.projection(), time)?;
        self.gl.polygon_mode(glow::FRONT_AND_BACK, glow::FILL);
        if let Some(framebuffer) = &self.framebuffer {
            framebuffer.present();
        }

        self.surface.swap();
        let input = self.surface.poll();
        self.handle_input(&input)?;

        self.count_frame(now);
        Ok(self.state)
    }

    fn handle_input(&mut self, input: &InputFrame) -> Result<(), FrameBufferError> {
        let keyboard = &input.keyboard;
        if input.quit_requested || keyboard.is_down(self.bindings.quit) {
            if self.state == LoopState::Running {
                log::info!("closing");
            }
            self.state = LoopState::Closing;
        }

        if keyboard.was_pressed(self.bindings.toggle_fill) {
            self.mode = self.mode.toggled();
            log::debug!("render mode: {:?}", self.mode);
        }

        if let Some((width, height)) = input.resized {
            self.on_resize(width, height)?;
        }

        let movement = [
            (self.bindings.forward, Direction::Forward),
            (self.bindings.back, Direction::Back),
            (self.bindings.left, Direction::Left),
            (self.bindings.right, Direction::Right),
            (self.bindings.up, Direction::Up),
            (self.bindings.down, Direction::Down),
        ];
        for (key, direction) in movement {
            if keyboard.is_down(key) {
                self.camera.move_in(direction);
            }
        }
        self.camera.look(self.mouse.delta(input.cursor));
        Ok(())
    }

    /// Matches the viewport, projection and off-screen target to a new window size.
    pub fn on_resize(&mut self, width: u32, height: u32) -> Result<(), FrameBufferError> {
        log::debug!("resized to {width}x{height}");
        self.gl.viewport(0, 0, width as i32, height as i32);
        self.camera.set_aspect(width, height);
        // A minimized window reports zero size; keep the old target until it comes back.
        if let Some(framebuffer) = &mut self.framebuffer
            && width > 0
            && height > 0
        {
            framebuffer.resize(width as i32, height as i32)?;
        }
        Ok(())
    }

    fn count_frame(&mut self, now: Instant) {
        self.frames += 1;
        let elapsed = now.duration_since(self.fps_since).as_secs_f32();
        if elapsed >= 1.0 {
            let fps = self.frames as f32 / elapsed;
            self.surface
                .set_title(&format!("{} - {fps:.0} fps", self.title));
            self.frames = 0;
            self.fps_since = now;
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn render_mode(&self) -> RenderMode {
        self.mode
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}

fn create_framebuffer(
    gl: &Rc<dyn Gpu>,
    render: &RenderConfig,
    width: u32,
    height: u32,
) -> Result<FrameBuffer, FrameBufferError> {
    FrameBuffer::new(
        gl,
        width as i32,
        height as i32,
        render.color_bits,
        render.color_type,
        render.stencil,
    )
    .map(|framebuffer| framebuffer.with_clear_color(render.clear_color))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use glam::Vec3;
    use sdl2::keyboard::Keycode;

    use super::*;
    use crate::abs::gpu::recording::{Call, RecordingGpu};
    use crate::abs::texture::tests::MemoryImages;
    use crate::config::SceneConfig;
    use crate::input::KeyboardState;
    use crate::scene::reference_scene;

    /// Replays prepared input frames, then reports nothing.
    struct ScriptedSurface {
        frames: VecDeque<InputFrame>,
        size: (u32, u32),
        swaps: usize,
        polls: usize,
    }

    impl ScriptedSurface {
        fn new(frames: impl IntoIterator<Item = InputFrame>) -> Self {
            Self {
                frames: frames.into_iter().collect(),
                size: (800, 600),
                swaps: 0,
                polls: 0,
            }
        }
    }

    impl Surface for ScriptedSurface {
        fn swap(&mut self) {
            self.swaps += 1;
        }

        fn poll(&mut self) -> InputFrame {
            self.polls += 1;
            self.frames.pop_front().unwrap_or_default()
        }

        fn size(&self) -> (u32, u32) {
            self.size
        }
    }

    fn pressing(keys: &[Keycode]) -> InputFrame {
        let mut keyboard = KeyboardState::default();
        for &key in keys {
            keyboard.key_down(key);
        }
        InputFrame {
            keyboard,
            ..InputFrame::default()
        }
    }

    fn main_loop(
        gpu: &Rc<RecordingGpu>,
        config: &Config,
        frames: Vec<InputFrame>,
    ) -> MainLoop<ScriptedSurface> {
        let gl: Rc<dyn Gpu> = gpu.clone();
        let images = MemoryImages::default()
            .with("assets/container.png", 3)
            .with("assets/awesomeface.png", 4);
        let scene = reference_scene(&gl, &SceneConfig::default(), &images).unwrap();
        MainLoop::new(gl, ScriptedSurface::new(frames), scene, config).unwrap()
    }

    #[test]
    fn escape_on_first_frame_closes_after_one_iteration() {
        let gpu = RecordingGpu::new();
        let mut main_loop = main_loop(&gpu, &Config::default(), vec![pressing(&[Keycode::Escape])]);
        gpu.clear_calls();

        main_loop.run().unwrap();

        assert_eq!(main_loop.state(), LoopState::Closing);
        assert_eq!(main_loop.surface().swaps, 1);
        assert_eq!(main_loop.surface().polls, 1);
        assert_eq!(gpu.count_calls(|c| matches!(c, Call::Clear(_))), 1);
        assert_eq!(
            gpu.count_calls(|c| matches!(c, Call::DrawElements { .. })),
            10
        );
    }

    #[test]
    fn closing_request_from_window_also_closes() {
        let gpu = RecordingGpu::new();
        let quit = InputFrame {
            quit_requested: true,
            ..InputFrame::default()
        };
        let mut main_loop = main_loop(&gpu, &Config::default(), vec![quit]);
        assert_eq!(main_loop.step().unwrap(), LoopState::Closing);
    }

    #[test]
    fn two_toggles_restore_the_render_mode() {
        let gpu = RecordingGpu::new();
        let frames = vec![pressing(&[Keycode::T]), pressing(&[Keycode::T])];
        let mut main_loop = main_loop(&gpu, &Config::default(), frames);
        let initial = main_loop.render_mode();

        main_loop.step().unwrap();
        assert_eq!(main_loop.render_mode(), RenderMode::Wireframe);

        gpu.clear_calls();
        main_loop.step().unwrap();
        // The frame after a toggle is drawn in the new mode.
        assert!(gpu.calls().contains(&Call::PolygonMode(glow::LINE)));
        assert_eq!(main_loop.render_mode(), initial);
        assert_eq!(main_loop.state(), LoopState::Running);
    }

    #[test]
    fn movement_keys_reach_the_camera() {
        let gpu = RecordingGpu::new();
        let mut main_loop = main_loop(&gpu, &Config::default(), vec![pressing(&[Keycode::W])]);
        let start = main_loop.camera().position();
        main_loop.step().unwrap();
        // The queued move is applied on the next frame's update.
        std::thread::sleep(std::time::Duration::from_millis(5));
        main_loop.step().unwrap();
        assert!(main_loop.camera().position().z < start.z);
        assert_eq!(main_loop.state(), LoopState::Running);
        assert_eq!(main_loop.render_mode(), RenderMode::Filled);
    }

    #[test]
    fn offscreen_rendering_composites_each_frame() {
        let gpu = RecordingGpu::new();
        let mut config = Config::default();
        config.render.offscreen = true;
        let mut main_loop = main_loop(&gpu, &config, vec![pressing(&[Keycode::Escape])]);
        gpu.clear_calls();

        main_loop.run().unwrap();

        // Window, off-screen target, window again before compositing.
        assert_eq!(gpu.count_calls(|c| matches!(c, Call::Clear(_))), 3);
        assert_eq!(
            gpu.count_calls(|c| matches!(c, Call::DrawArrays { count: 4, .. })),
            1
        );
        assert_eq!(gpu.current_framebuffer(), None);
    }

    #[test]
    fn resize_updates_viewport_and_reallocates_the_target() {
        let gpu = RecordingGpu::new();
        let mut config = Config::default();
        config.render.offscreen = true;
        let resize = InputFrame {
            resized: Some((1024, 768)),
            ..InputFrame::default()
        };
        let mut main_loop = main_loop(&gpu, &config, vec![resize]);
        let programs = gpu.programs_created();
        main_loop.step().unwrap();

        assert!(gpu.calls().contains(&Call::Viewport(0, 0, 1024, 768)));
        assert_eq!(gpu.live_framebuffers(), 1);
        assert_eq!(gpu.double_deletes(), 0);
        // Only the attachments are reallocated; no shader is recompiled.
        assert_eq!(gpu.programs_created(), programs);

        // A minimized window keeps the target it has.
        main_loop.on_resize(0, 0).unwrap();
        assert_eq!(gpu.live_framebuffers(), 1);
    }

    #[test]
    fn dropping_the_loop_releases_every_handle() {
        let gpu = RecordingGpu::new();
        let mut config = Config::default();
        config.render.offscreen = true;
        config.camera.position = Vec3::ZERO;
        let main_loop = main_loop(&gpu, &config, Vec::new());
        drop(main_loop);
        assert_eq!(gpu.live_handles(), 0);
        assert_eq!(gpu.double_deletes(), 0);
    }
}
