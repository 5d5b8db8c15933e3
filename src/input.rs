//! Polled keyboard and mouse state handed from the window to the main loop.

use fxhash::FxHashSet;
use glam::Vec2;
use sdl2::keyboard::Keycode;

use crate::config::KeysConfig;
use crate::error::ConfigError;

/// Keys held down, and keys that went down since the last frame.
#[derive(Debug, Clone, Default)]
pub struct KeyboardState {
    down: FxHashSet<Keycode>,
    pressed: FxHashSet<Keycode>,
}

impl KeyboardState {
    /// Records a key press. Auto-repeat of a held key is not a new press.
    pub fn key_down(&mut self, key: Keycode) {
        if self.down.insert(key) {
            self.pressed.insert(key);
        }
    }

    pub fn key_up(&mut self, key: Keycode) {
        self.down.remove(&key);
    }

    pub fn is_down(&self, key: Keycode) -> bool {
        self.down.contains(&key)
    }

    /// Whether the key went down during the frame this state was taken from.
    pub fn was_pressed(&self, key: Keycode) -> bool {
        self.pressed.contains(&key)
    }

    /// Forgets this frame's presses, keeping held keys.
    pub fn end_frame(&mut self) {
        self.pressed.clear();
    }
}

/// Turns absolute cursor samples into look deltas.
#[derive(Debug, Clone, Copy, Default)]
pub struct MouseState {
    last: Option<Vec2>,
}

impl MouseState {
    /// Returns how far the cursor moved since the previous sample, with y pointing up.
    ///
    /// The first sample only primes the state and yields no movement.
    pub fn delta(&mut self, cursor: Vec2) -> Vec2 {
        let delta = match self.last {
            Some(last) => Vec2::new(cursor.x - last.x, last.y - cursor.y),
            None => Vec2::ZERO,
        };
        self.last = Some(cursor);
        delta
    }
}

/// Everything the window reported for one frame.
#[derive(Debug, Clone, Default)]
pub struct InputFrame {
    pub keyboard: KeyboardState,
    /// Cursor position in window pixels, y down.
    pub cursor: Vec2,
    /// The last size the window was resized to during the frame.
    pub resized: Option<(u32, u32)>,
    /// The window's close button was used.
    pub quit_requested: bool,
}

/// The keys the main loop reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBindings {
    pub forward: Keycode,
    pub back: Keycode,
    pub left: Keycode,
    pub right: Keycode,
    pub up: Keycode,
    pub down: Keycode,
    pub toggle_fill: Keycode,
    pub quit: Keycode,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            forward: Keycode::W,
            back: Keycode::S,
            left: Keycode::A,
            right: Keycode::D,
            up: Keycode::Space,
            down: Keycode::X,
            toggle_fill: Keycode::T,
            quit: Keycode::Escape,
        }
    }
}

impl TryFrom<&KeysConfig> for KeyBindings {
    type Error = ConfigError;

    fn try_from(keys: &KeysConfig) -> Result<Self, Self::Error> {
        let key = |name: &str| {
            Keycode::from_name(name).ok_or_else(|| ConfigError::UnknownKey(name.to_string()))
        };
        Ok(Self {
            forward: key(&keys.forward)?,
            back: key(&keys.back)?,
            left: key(&keys.left)?,
            right: key(&keys.right)?,
            up: key(&keys.up)?,
            down: key(&keys.down)?,
            toggle_fill: key(&keys.toggle_fill)?,
            quit: key(&keys.quit)?,
        })
    }
}
