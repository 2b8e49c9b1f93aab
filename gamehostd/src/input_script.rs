//! # Input Script Parser
//!
//! A line-based input format for deterministic runs without a window.
//!
//! ## Format
//!
//! - `press <button>` / `release <button>`: Hold or let go of a button
//! - `tap <button>`: Held for exactly one frame, released before the next
//! - `pointer down <x> <y>`, `pointer move <x> <y>`, `pointer up`
//! - `frames <n>`: Run `n` frames with the current input
//! - Comments: `# anything`, on their own line or after an action
//!
//! Buttons are `up`, `down`, `left`, `right`, `a` and `b`. Pointer
//! coordinates are in view space.
//!
//! ## Example
//!
//! ```text
//! # Jump, then walk right for half a second
//! tap a
//! press right
//! frames 30
//! release right
//! ```

use game_types::Button;
use std::collections::VecDeque;
use thiserror::Error;

/// Upper bound on a single `frames` line
pub const MAX_FRAMES_PER_LINE: u32 = 1_000_000;

/// Input script error types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputScriptError {
    #[error("Invalid button name: {0}")]
    InvalidButton(String),

    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Empty script")]
    EmptyScript,
}

/// Pointer actions of a script
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerAction {
    Down { x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Up,
}

/// A single scripted input action
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptedInput {
    Press(Button),
    Release(Button),
    Tap(Button),
    Pointer(PointerAction),
    /// Run this many frames
    Frames(u32),
}

/// Parsed input script
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputScript {
    inputs: VecDeque<ScriptedInput>,
}

impl InputScript {
    /// Creates a new empty input script
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a script from text
    pub fn from_text(text: &str) -> Result<Self, InputScriptError> {
        let mut inputs = VecDeque::new();

        for (line_num, line) in text.lines().enumerate() {
            let line = match line.split_once('#') {
                Some((before, _)) => before.trim(),
                None => line.trim(),
            };
            if line.is_empty() {
                continue;
            }
            inputs.push_back(Self::parse_line(line, line_num + 1)?);
        }

        if inputs.is_empty() {
            return Err(InputScriptError::EmptyScript);
        }

        Ok(Self { inputs })
    }

    fn parse_line(line: &str, line_num: usize) -> Result<ScriptedInput, InputScriptError> {
        let error = |message: String| InputScriptError::ParseError {
            line: line_num,
            message,
        };
        let words: Vec<&str> = line.split_whitespace().collect();

        match words.as_slice() {
            ["press", name] => Ok(ScriptedInput::Press(Self::parse_button(name, line_num)?)),
            ["release", name] => Ok(ScriptedInput::Release(Self::parse_button(name, line_num)?)),
            ["tap", name] => Ok(ScriptedInput::Tap(Self::parse_button(name, line_num)?)),
            ["frames", count] => {
                let n: u32 = count
                    .parse()
                    .map_err(|_| error(format!("invalid frame count '{count}'")))?;
                if n == 0 || n > MAX_FRAMES_PER_LINE {
                    return Err(error(format!(
                        "frame count must be 1..={MAX_FRAMES_PER_LINE}"
                    )));
                }
                Ok(ScriptedInput::Frames(n))
            }
            ["pointer", "up"] => Ok(ScriptedInput::Pointer(PointerAction::Up)),
            ["pointer", action @ ("down" | "move"), x, y] => {
                let coord = |s: &str| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .ok_or_else(|| error(format!("invalid coordinate '{s}'")))
                };
                let (x, y) = (coord(x)?, coord(y)?);
                Ok(ScriptedInput::Pointer(if *action == "down" {
                    PointerAction::Down { x, y }
                } else {
                    PointerAction::Move { x, y }
                }))
            }
            _ => Err(error(format!("unrecognized action '{line}'"))),
        }
    }

    fn parse_button(name: &str, line_num: usize) -> Result<Button, InputScriptError> {
        name.parse::<Button>()
            .map_err(|_| InputScriptError::ParseError {
                line: line_num,
                message: InputScriptError::InvalidButton(name.to_string()).to_string(),
            })
    }

    /// Returns the next action, if any
    pub fn next_input(&mut self) -> Option<ScriptedInput> {
        self.inputs.pop_front()
    }

    /// Returns true if the script has more actions
    pub fn has_more(&self) -> bool {
        !self.inputs.is_empty()
    }

    /// Returns the number of remaining actions
    pub fn remaining(&self) -> usize {
        self.inputs.len()
    }

    /// Total frames the script asks for, counting one per `tap`
    pub fn total_frames(&self) -> u64 {
        self.inputs
            .iter()
            .map(|input| match input {
                ScriptedInput::Frames(n) => u64::from(*n),
                ScriptedInput::Tap(_) => 1,
                _ => 0,
            })
            .sum()
    }
}
