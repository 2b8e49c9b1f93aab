//! # Input State
//!
//! Raw button and pointer state owned by the orchestrator.
//!
//! Guests never compute edges themselves: each [`InputState::snapshot`]
//! derives the `*Pressed` flags by diffing against the state seen at the
//! previous snapshot, then remembers the current state for the next one.

use game_types::{Button, InputSnapshot};

/// Maps a keyboard key name to a game button
///
/// Arrows and WASD steer, `z` and space are `a`, `x` is `b`.
pub fn key_button(key: &str) -> Option<Button> {
    match key {
        "ArrowUp" | "w" => Some(Button::Up),
        "ArrowDown" | "s" => Some(Button::Down),
        "ArrowLeft" | "a" => Some(Button::Left),
        "ArrowRight" | "d" => Some(Button::Right),
        "z" | " " | "Space" => Some(Button::A),
        "x" => Some(Button::B),
        _ => None,
    }
}

/// Held buttons, pointer, and the previous frame's copy of both
#[derive(Debug, Clone)]
pub struct InputState {
    held: [bool; 6],
    prev_held: [bool; 6],
    pointer_down: bool,
    prev_pointer_down: bool,
    pointer: (f64, f64),
    game_size: (f64, f64),
    view_size: (f64, f64),
}

impl InputState {
    /// View and game space start out identical
    pub fn new(game_width: u32, game_height: u32) -> Self {
        let size = (f64::from(game_width), f64::from(game_height));
        Self {
            held: [false; 6],
            prev_held: [false; 6],
            pointer_down: false,
            prev_pointer_down: false,
            pointer: (0.0, 0.0),
            game_size: size,
            view_size: size,
        }
    }

    /// Size of the surface pointer coordinates are reported in
    ///
    /// Non-positive sizes are ignored.
    pub fn set_view_size(&mut self, width: f64, height: f64) {
        if width > 0.0 && height > 0.0 {
            self.view_size = (width, height);
        }
    }

    pub fn press(&mut self, button: Button) {
        self.held[button.index()] = true;
    }

    pub fn release(&mut self, button: Button) {
        self.held[button.index()] = false;
    }

    pub fn is_held(&self, button: Button) -> bool {
        self.held[button.index()]
    }

    /// Keyboard convenience over [`key_button`]; unmapped keys are ignored
    pub fn key(&mut self, key: &str, down: bool) {
        if let Some(button) = key_button(key) {
            self.held[button.index()] = down;
        }
    }

    /// Moves the pointer to view coordinates `(x, y)`
    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if x.is_finite() && y.is_finite() {
            self.pointer = (
                x * self.game_size.0 / self.view_size.0,
                y * self.game_size.1 / self.view_size.1,
            );
        }
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        self.pointer_down = true;
        self.pointer_move(x, y);
    }

    pub fn pointer_up(&mut self) {
        self.pointer_down = false;
    }

    /// Pointer position in game space
    pub fn pointer(&self) -> (f64, f64) {
        self.pointer
    }

    /// Builds this frame's snapshot and rolls the edge detector forward
    pub fn snapshot(&mut self) -> InputSnapshot {
        let mut snap = InputSnapshot {
            pointer_down: self.pointer_down,
            pointer_pressed: self.pointer_down && !self.prev_pointer_down,
            pointer_x: self.pointer.0,
            pointer_y: self.pointer.1,
            ..InputSnapshot::default()
        };
        for button in Button::ALL {
            let i = button.index();
            snap.set_held(button, self.held[i]);
            snap.set_pressed(button, self.held[i] && !self.prev_held[i]);
        }
        self.prev_held = self.held;
        self.prev_pointer_down = self.pointer_down;
        snap
    }

    /// Releases everything and forgets the previous frame
    pub fn reset(&mut self) {
        self.held = [false; 6];
        self.prev_held = [false; 6];
        self.pointer_down = false;
        self.prev_pointer_down = false;
        self.pointer = (0.0, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pressed_only_on_first_frame() {
        let mut input = InputState::new(400, 400);
        input.press(Button::A);

        let first = input.snapshot();
        assert!(first.a && first.a_pressed);

        let second = input.snapshot();
        assert!(second.a);
        assert!(!second.a_pressed);

        input.release(Button::A);
        let third = input.snapshot();
        assert!(!third.a && !third.a_pressed);

        input.press(Button::A);
        assert!(input.snapshot().a_pressed);
    }

    #[test]
    fn test_press_and_release_between_frames_is_invisible() {
        let mut input = InputState::new(400, 400);
        input.press(Button::Left);
        input.release(Button::Left);
        let snap = input.snapshot();
        assert!(!snap.left && !snap.left_pressed);
    }

    #[test]
    fn test_pointer_edges_and_scaling() {
        let mut input = InputState::new(400, 300);
        input.set_view_size(800.0, 600.0);
        input.pointer_down(100.0, 60.0);

        let snap = input.snapshot();
        assert!(snap.pointer_down && snap.pointer_pressed);
        assert_eq!((snap.pointer_x, snap.pointer_y), (50.0, 30.0));

        input.pointer_move(800.0, 600.0);
        let snap = input.snapshot();
        assert!(snap.pointer_down && !snap.pointer_pressed);
        assert_eq!((snap.pointer_x, snap.pointer_y), (400.0, 300.0));

        input.pointer_up();
        assert!(!input.snapshot().pointer_down);
    }

    #[test]
    fn test_invalid_view_and_pointer_ignored() {
        let mut input = InputState::new(400, 400);
        input.set_view_size(0.0, -1.0);
        input.pointer_move(10.0, 20.0);
        input.pointer_move(f64::NAN, 5.0);
        assert_eq!(input.pointer(), (10.0, 20.0));
    }

    #[test]
    fn test_key_map() {
        assert_eq!(key_button("ArrowUp"), Some(Button::Up));
        assert_eq!(key_button("d"), Some(Button::Right));
        assert_eq!(key_button(" "), Some(Button::A));
        assert_eq!(key_button("x"), Some(Button::B));
        assert_eq!(key_button("Enter"), None);

        let mut input = InputState::new(400, 400);
        input.key("z", true);
        assert!(input.is_held(Button::A));
        input.key("q", true);
        input.key("z", false);
        assert!(!input.is_held(Button::A));
    }

    #[test]
    fn test_reset_forgets_previous_frame() {
        let mut input = InputState::new(400, 400);
        input.press(Button::B);
        input.snapshot();
        input.reset();
        input.press(Button::B);
        assert!(input.snapshot().b_pressed);
    }
}
