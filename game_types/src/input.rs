//! Per-frame input record handed to the guest `update` call.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A logical game button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
}

impl Button {
    pub const ALL: [Button; 6] = [
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::A,
        Button::B,
    ];

    /// Index into fixed-size button arrays
    pub fn index(self) -> usize {
        match self {
            Button::Up => 0,
            Button::Down => 1,
            Button::Left => 2,
            Button::Right => 3,
            Button::A => 4,
            Button::B => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Button::Up => "up",
            Button::Down => "down",
            Button::Left => "left",
            Button::Right => "right",
            Button::A => "a",
            Button::B => "b",
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Button {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Button::ALL
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown button '{s}'"))
    }
}

/// Snapshot of held buttons, edge-triggered presses and pointer state
///
/// Reconstructed fresh every frame; the guest never sees the same table twice.
/// Pointer coordinates are already in game space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSnapshot {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub a: bool,
    pub b: bool,
    pub up_pressed: bool,
    pub down_pressed: bool,
    pub left_pressed: bool,
    pub right_pressed: bool,
    pub a_pressed: bool,
    pub b_pressed: bool,
    pub pointer_down: bool,
    pub pointer_pressed: bool,
    pub pointer_x: f64,
    pub pointer_y: f64,
}

impl InputSnapshot {
    pub fn held(&self, button: Button) -> bool {
        match button {
            Button::Up => self.up,
            Button::Down => self.down,
            Button::Left => self.left,
            Button::Right => self.right,
            Button::A => self.a,
            Button::B => self.b,
        }
    }

    pub fn pressed(&self, button: Button) -> bool {
        match button {
            Button::Up => self.up_pressed,
            Button::Down => self.down_pressed,
            Button::Left => self.left_pressed,
            Button::Right => self.right_pressed,
            Button::A => self.a_pressed,
            Button::B => self.b_pressed,
        }
    }

    pub fn set_held(&mut self, button: Button, value: bool) {
        match button {
            Button::Up => self.up = value,
            Button::Down => self.down = value,
            Button::Left => self.left = value,
            Button::Right => self.right = value,
            Button::A => self.a = value,
            Button::B => self.b = value,
        }
    }

    pub fn set_pressed(&mut self, button: Button, value: bool) {
        match button {
            Button::Up => self.up_pressed = value,
            Button::Down => self.down_pressed = value,
            Button::Left => self.left_pressed = value,
            Button::Right => self.right_pressed = value,
            Button::A => self.a_pressed = value,
            Button::B => self.b_pressed = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_are_camel_case() {
        let mut snap = InputSnapshot::default();
        snap.set_pressed(Button::A, true);
        snap.pointer_x = 12.5;
        let wire = serde_json::to_value(snap).unwrap();
        assert_eq!(wire["aPressed"], true);
        assert_eq!(wire["pointerX"], 12.5);
        assert_eq!(wire["pointerDown"], false);
        assert_eq!(wire.as_object().unwrap().len(), 16);
    }

    #[test]
    fn test_button_parse() {
        assert_eq!("LEFT".parse::<Button>(), Ok(Button::Left));
        assert_eq!("a".parse::<Button>(), Ok(Button::A));
        assert!("start".parse::<Button>().is_err());
    }

    #[test]
    fn test_held_and_pressed_are_independent() {
        let mut snap = InputSnapshot::default();
        snap.set_held(Button::Up, true);
        assert!(snap.held(Button::Up));
        assert!(!snap.pressed(Button::Up));
    }
}
