//! Client input polling: held movement keys plus edge-detected toggles

use macroquad::prelude::{is_key_down, KeyCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Movement keys held during one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PressedKeys {
    up: bool,
    down: bool,
    left: bool,
    right: bool,
}

impl PressedKeys {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, direction: Direction) -> Self {
        match direction {
            Direction::Up => self.up = true,
            Direction::Down => self.down = true,
            Direction::Left => self.left = true,
            Direction::Right => self.right = true,
        }
        self
    }

    pub fn is_pressed(&self, direction: Direction) -> bool {
        match direction {
            Direction::Up => self.up,
            Direction::Down => self.down,
            Direction::Left => self.left,
            Direction::Right => self.right,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.up || self.down || self.left || self.right)
    }
}

/// Everything sampled from the keyboard for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputFrame {
    pub keys: PressedKeys,
    pub toggle_hud: bool,
    pub quit: bool,
}

/// Polls keyboard state once per frame
pub struct InputManager {
    // Previous frame key state for edge detection
    prev_key_h: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self { prev_key_h: false }
    }

    pub fn poll(&mut self) -> InputFrame {
        // Both WASD and arrow keys move the cube
        let mut keys = PressedKeys::none();
        if is_key_down(KeyCode::W) || is_key_down(KeyCode::Up) {
            keys = keys.with(Direction::Up);
        }
        if is_key_down(KeyCode::S) || is_key_down(KeyCode::Down) {
            keys = keys.with(Direction::Down);
        }
        if is_key_down(KeyCode::A) || is_key_down(KeyCode::Left) {
            keys = keys.with(Direction::Left);
        }
        if is_key_down(KeyCode::D) || is_key_down(KeyCode::Right) {
            keys = keys.with(Direction::Right);
        }

        let key_h = is_key_down(KeyCode::H);
        let toggle_hud = key_h && !self.prev_key_h;
        self.prev_key_h = key_h;

        InputFrame {
            keys,
            toggle_hud,
            quit: is_key_down(KeyCode::Escape),
        }
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pressed_keys_builder() {
        let keys = PressedKeys::none()
            .with(Direction::Up)
            .with(Direction::Right);

        assert!(keys.is_pressed(Direction::Up));
        assert!(keys.is_pressed(Direction::Right));
        assert!(!keys.is_pressed(Direction::Down));
        assert!(!keys.is_empty());
        assert!(PressedKeys::none().is_empty());
    }

    #[test]
    fn test_input_manager_creation() {
        let input_manager = InputManager::new();
        assert!(!input_manager.prev_key_h);
    }
}
