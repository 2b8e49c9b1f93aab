//! The paint target the interpreter draws on.

use graphics_rasterizer::{BezPath, Canvas, ClipMask, Color, DrawState, Rect, Sprite, TextStyle};

/// A 2D paint surface driven by [`CommandInterpreter`](crate::CommandInterpreter)
///
/// Every operation receives the full [`DrawState`] so implementations stay
/// stateless with respect to transforms, alpha and clipping.
pub trait Surface {
    /// `(width, height)` in device pixels
    fn size(&self) -> (u32, u32);

    fn fill_path(&mut self, path: &BezPath, color: Color, state: &DrawState);

    fn stroke_path(&mut self, path: &BezPath, width: f64, color: Color, state: &DrawState);

    fn draw_image(&mut self, sprite: &Sprite, src: Rect, dst: Rect, state: &DrawState);

    fn fill_text(&mut self, text: &str, x: f64, y: f64, style: &TextStyle, color: Color, state: &DrawState);

    fn stroke_text(&mut self, text: &str, x: f64, y: f64, style: &TextStyle, color: Color, state: &DrawState);

    /// Coverage of `path` under `state`, already intersected with its clip;
    /// `None` when the surface has no pixels
    fn clip_mask(&self, path: &BezPath, state: &DrawState) -> Option<ClipMask>;
}

impl Surface for Canvas {
    fn size(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    fn fill_path(&mut self, path: &BezPath, color: Color, state: &DrawState) {
        Canvas::fill_path(self, path, color, state);
    }

    fn stroke_path(&mut self, path: &BezPath, width: f64, color: Color, state: &DrawState) {
        Canvas::stroke_path(self, path, width, color, state);
    }

    fn draw_image(&mut self, sprite: &Sprite, src: Rect, dst: Rect, state: &DrawState) {
        Canvas::draw_image(self, sprite, src, dst, state);
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, style: &TextStyle, color: Color, state: &DrawState) {
        Canvas::fill_text(self, text, x, y, style, color, state);
    }

    fn stroke_text(&mut self, text: &str, x: f64, y: f64, style: &TextStyle, color: Color, state: &DrawState) {
        Canvas::stroke_text(self, text, x, y, style, color, state);
    }

    fn clip_mask(&self, path: &BezPath, state: &DrawState) -> Option<ClipMask> {
        Canvas::clip_mask(self, path, state)
    }
}
