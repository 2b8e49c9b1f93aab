//! Save/restore stack of transform, alpha and clip.

use graphics_rasterizer::{Affine, ClipMask, DrawState};
use std::rc::Rc;

/// Saved states kept per session; deeper saves are counted but not stored
pub const MAX_SAVE_DEPTH: usize = 256;

/// Paint state machine driven by `save`, `restore`, `translate`, `rotate`,
/// `scale`, `alpha` and `clip`
///
/// Mutations affect the top of the stack only. Non-finite arguments and
/// alpha values outside `0..=1` are ignored, as a 2D canvas does.
#[derive(Debug, Clone, Default)]
pub struct PaintStack {
    current: DrawState,
    saved: Vec<DrawState>,
    // saves past MAX_SAVE_DEPTH, each matched by a restore that changes nothing
    overflow: usize,
}

impl PaintStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &DrawState {
        &self.current
    }

    /// Number of states pushed by `save` and not yet restored
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    pub fn save(&mut self) {
        if self.saved.len() >= MAX_SAVE_DEPTH {
            self.overflow = self.overflow.saturating_add(1);
            return;
        }
        self.saved.push(self.current.clone());
    }

    /// Pops the last saved state; a no-op on an empty stack
    pub fn restore(&mut self) {
        if self.overflow > 0 {
            self.overflow -= 1;
            return;
        }
        if let Some(state) = self.saved.pop() {
            self.current = state;
        }
    }

    fn compose(&mut self, step: Affine) {
        let next = self.current.transform * step;
        if next.is_finite() {
            self.current.transform = next;
        }
    }

    pub fn translate(&mut self, x: f64, y: f64) {
        if x.is_finite() && y.is_finite() {
            self.compose(Affine::translate((x, y)));
        }
    }

    pub fn rotate(&mut self, angle: f64) {
        if angle.is_finite() {
            self.compose(Affine::rotate(angle));
        }
    }

    pub fn scale(&mut self, x: f64, y: f64) {
        if x.is_finite() && y.is_finite() {
            self.compose(Affine::scale_non_uniform(x, y));
        }
    }

    pub fn set_alpha(&mut self, value: f64) {
        if (0.0..=1.0).contains(&value) {
            self.current.alpha = value;
        }
    }

    /// Replaces the clip with `mask`, which must already include the old clip
    pub fn set_clip(&mut self, mask: ClipMask) {
        self.current.clip = Some(Rc::new(mask));
    }

    /// Back to identity, full alpha, no clip, empty stack
    pub fn reset(&mut self) {
        self.current = DrawState::default();
        self.saved.clear();
        self.overflow = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphics_rasterizer::{rect, rect_path, Canvas, Point};

    #[test]
    fn test_save_restore() {
        let mut stack = PaintStack::new();
        stack.save();
        stack.translate(10.0, 0.0);
        stack.set_alpha(0.5);
        assert_eq!(stack.depth(), 1);
        stack.restore();
        assert_eq!(stack.current().transform, Affine::IDENTITY);
        assert_eq!(stack.current().alpha, 1.0);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_restore_on_empty_is_noop() {
        let mut stack = PaintStack::new();
        stack.translate(3.0, 4.0);
        stack.restore();
        stack.restore();
        let p = stack.current().transform * Point::new(0.0, 0.0);
        assert_eq!(p, Point::new(3.0, 4.0));
    }

    #[test]
    fn test_invalid_arguments_ignored() {
        let mut stack = PaintStack::new();
        stack.translate(f64::NAN, 1.0);
        stack.scale(f64::INFINITY, 1.0);
        stack.rotate(f64::NAN);
        stack.set_alpha(1.5);
        stack.set_alpha(-0.1);
        stack.set_alpha(f64::NAN);
        assert_eq!(stack.current().transform, Affine::IDENTITY);
        assert_eq!(stack.current().alpha, 1.0);
    }

    #[test]
    fn test_overflowing_scale_ignored() {
        let mut stack = PaintStack::new();
        stack.scale(1e300, 1e300);
        stack.scale(1e300, 1e300);
        assert!(stack.current().transform.is_finite());
    }

    #[test]
    fn test_save_depth_is_capped() {
        let mut stack = PaintStack::new();
        for _ in 0..MAX_SAVE_DEPTH + 1000 {
            stack.save();
        }
        assert_eq!(stack.depth(), MAX_SAVE_DEPTH);

        // uncapped saves still pair with restores
        stack.translate(5.0, 0.0);
        for _ in 0..1000 {
            stack.restore();
        }
        assert_eq!(stack.depth(), MAX_SAVE_DEPTH);
        assert_eq!(stack.current().transform, Affine::translate((5.0, 0.0)));
        stack.restore();
        assert_eq!(stack.depth(), MAX_SAVE_DEPTH - 1);
        assert_eq!(stack.current().transform, Affine::IDENTITY);
    }

    #[test]
    fn test_reset_clears_everything() {
        let canvas = Canvas::new(4, 4);
        let mut stack = PaintStack::new();
        stack.save();
        let mask = canvas
            .clip_mask(&rect_path(rect(0.0, 0.0, 4.0, 4.0)), stack.current())
            .unwrap();
        stack.set_clip(mask);
        stack.scale(2.0, 2.0);
        stack.reset();
        assert_eq!(stack.depth(), 0);
        assert!(stack.current().clip.is_none());
        assert_eq!(stack.current().transform, Affine::IDENTITY);
    }
}
