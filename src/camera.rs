//! A first-person fly camera.

use glam::{Mat4, Vec2, Vec3};

use crate::config::CameraConfig;

/// A movement direction relative to where the camera looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Back,
    Left,
    Right,
    Up,
    Down,
}

/// Looking closer to straight up or down than this makes the view basis degenerate.
const MAX_PITCH: f32 = 89.0;

/// Position and orientation, plus the movement and look input received since the last
/// [`Camera::update`].
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    front: Vec3,
    up: Vec3,
    right: Vec3,
    world_up: Vec3,
    yaw: f32,
    pitch: f32,

    fov: f32,
    aspect: f32,
    near: f32,
    far: f32,
    speed: f32,
    sensitivity: f32,

    /// x along right, y along up, z along front.
    pending_move: Vec3,
    pending_look: Vec2,
}

impl Camera {
    pub fn new(config: &CameraConfig, aspect: f32) -> Self {
        let front = config.front.try_normalize().unwrap_or(Vec3::NEG_Z);
        let world_up = config.up.try_normalize().unwrap_or(Vec3::Y);
        let mut camera = Self {
            position: config.position,
            front,
            up: world_up,
            right: Vec3::X,
            world_up,
            yaw: front.z.atan2(front.x).to_degrees(),
            pitch: front
                .y
                .clamp(-1.0, 1.0)
                .asin()
                .to_degrees()
                .clamp(-MAX_PITCH, MAX_PITCH),
            fov: config.fov,
            aspect,
            near: config.near,
            far: config.far,
            speed: config.speed,
            sensitivity: config.sensitivity,
            pending_move: Vec3::ZERO,
            pending_look: Vec2::ZERO,
        };
        camera.update_vectors();
        camera
    }

    /// Queues one step of movement for the next update.
    pub fn move_in(&mut self, direction: Direction) {
        self.pending_move += match direction {
            Direction::Forward => Vec3::Z,
            Direction::Back => Vec3::NEG_Z,
            Direction::Left => Vec3::NEG_X,
            Direction::Right => Vec3::X,
            Direction::Up => Vec3::Y,
            Direction::Down => Vec3::NEG_Y,
        };
    }

    /// Queues a look delta in cursor pixels, y pointing up.
    pub fn look(&mut self, delta: Vec2) {
        self.pending_look += delta;
    }

    /// Applies the queued look and movement. Movement is scaled by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        if self.pending_look != Vec2::ZERO {
            self.yaw += self.pending_look.x * self.sensitivity;
            self.pitch = (self.pitch + self.pending_look.y * self.sensitivity)
                .clamp(-MAX_PITCH, MAX_PITCH);
            self.update_vectors();
        }

        let step = self.pending_move * self.speed * dt;
        self.position += self.right * step.x + self.up * step.y + self.front * step.z;

        self.pending_move = Vec3::ZERO;
        self.pending_look = Vec2::ZERO;
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos())
            .normalize();
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov.to_radians(), self.aspect, self.near, self.far)
    }

    /// Keeps the projection matching a resized window.
    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }
}
