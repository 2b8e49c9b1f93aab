//! RGBA paint surface.

use crate::font::{self, CELL_HEIGHT, CELL_WIDTH, GLYPH_HEIGHT, GLYPH_WIDTH};
use crate::geometry::{to_skia_path, to_transform, TOLERANCE};
use crate::sprite::Sprite;
use image::{Rgba, RgbaImage};
use kurbo::{Affine, BezPath, Point, Rect, Shape};
use std::fmt;
use std::rc::Rc;
use tiny_skia::{
    ColorU8, FillRule, FilterQuality, Mask, Paint, Pattern, PixmapMut, PixmapRef, SpreadMode,
    Stroke,
};

/// Straight (non-premultiplied) 8-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, self.a])
    }

    fn with_opacity(self, alpha: f64) -> Option<tiny_skia::Color> {
        let opacity = alpha.clamp(0.0, 1.0) as f32 * f32::from(self.a) / 255.0;
        if opacity <= 0.0 {
            return None;
        }
        tiny_skia::Color::from_rgba(
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
            opacity.min(1.0),
        )
    }
}

impl From<Rgba<u8>> for Color {
    fn from(px: Rgba<u8>) -> Self {
        Color::rgba(px[0], px[1], px[2], px[3])
    }
}

impl From<ColorU8> for Color {
    fn from(c: ColorU8) -> Self {
        Color::rgba(c.red(), c.green(), c.blue(), c.alpha())
    }
}

/// Device-space coverage produced by a `clip` command
#[derive(Clone)]
pub struct ClipMask {
    mask: Mask,
}

impl ClipMask {
    /// Coverage at a device pixel, 0 outside the canvas
    pub fn coverage(&self, x: u32, y: u32) -> u8 {
        if x >= self.mask.width() || y >= self.mask.height() {
            return 0;
        }
        self.mask.data()[(y * self.mask.width() + x) as usize]
    }
}

impl fmt::Debug for ClipMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClipMask")
            .field("width", &self.mask.width())
            .field("height", &self.mask.height())
            .finish()
    }
}

impl PartialEq for ClipMask {
    fn eq(&self, other: &Self) -> bool {
        self.mask.width() == other.mask.width() && self.mask.data() == other.mask.data()
    }
}

/// Transform, global alpha and clip applied to every paint operation
#[derive(Debug, Clone, PartialEq)]
pub struct DrawState {
    pub transform: Affine,
    pub alpha: f64,
    pub clip: Option<Rc<ClipMask>>,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            alpha: 1.0,
            clip: None,
        }
    }
}

impl DrawState {
    fn mask(&self) -> Option<&Mask> {
        self.clip.as_deref().map(|clip| &clip.mask)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextBaseline {
    #[default]
    Top,
    Middle,
    Alphabetic,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    /// Cell height in user-space pixels
    pub size: f64,
    pub align: TextAlign,
    pub baseline: TextBaseline,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            size: 16.0,
            align: TextAlign::Left,
            baseline: TextBaseline::Top,
        }
    }
}

impl TextStyle {
    fn unit(&self) -> f64 {
        self.size / CELL_HEIGHT as f64
    }

    /// Advance width of `text` without trailing spacing
    pub fn measure(&self, text: &str) -> f64 {
        let count = text.chars().count();
        if count == 0 {
            return 0.0;
        }
        (count * CELL_WIDTH - (CELL_WIDTH - GLYPH_WIDTH)) as f64 * self.unit()
    }

    fn origin(&self, text: &str, x: f64, y: f64) -> Point {
        let dx = match self.align {
            TextAlign::Left => 0.0,
            TextAlign::Center => -self.measure(text) / 2.0,
            TextAlign::Right => -self.measure(text),
        };
        let dy = match self.baseline {
            TextBaseline::Top => 0.0,
            TextBaseline::Middle => -(GLYPH_HEIGHT as f64) * self.unit() / 2.0,
            TextBaseline::Alphabetic => -(GLYPH_HEIGHT as f64) * self.unit(),
            TextBaseline::Bottom => -(CELL_HEIGHT as f64) * self.unit(),
        };
        Point::new(x + dx, y + dy)
    }

    /// Unit squares covering the glyph ink, or the ring around it
    fn cells(&self, text: &str, x: f64, y: f64, outline: bool) -> BezPath {
        let unit = self.unit();
        let origin = self.origin(text, x, y);
        let mut path = BezPath::new();
        for (i, ch) in text.chars().enumerate() {
            let glyph = font::glyph(ch);
            let gx = origin.x + (i * CELL_WIDTH) as f64 * unit;
            let at = |c: i32, r: i32| c >= 0 && r >= 0 && font::ink(glyph, c as usize, r as usize);
            for row in -1..=GLYPH_HEIGHT as i32 {
                for col in -1..=GLYPH_WIDTH as i32 {
                    let hit = if outline {
                        !at(col, row) && (-1..=1).any(|dy| (-1..=1).any(|dx| at(col + dx, row + dy)))
                    } else {
                        at(col, row)
                    };
                    if hit {
                        let cell = Rect::from_origin_size(
                            (gx + f64::from(col) * unit, origin.y + f64::from(row) * unit),
                            (unit, unit),
                        );
                        path.extend(cell.path_elements(TOLERANCE));
                    }
                }
            }
        }
        path
    }
}

/// Software canvas holding premultiplied RGBA bytes
#[derive(Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl fmt::Debug for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canvas")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl Canvas {
    /// A fully transparent canvas; a zero-sized one accepts and ignores paint
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * 4;
        Self {
            width,
            height,
            data: vec![0; len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn pixmap(&mut self) -> Option<PixmapMut<'_>> {
        PixmapMut::from_bytes(&mut self.data, self.width, self.height)
    }

    fn pixmap_ref(&self) -> Option<PixmapRef<'_>> {
        PixmapRef::from_bytes(&self.data, self.width, self.height)
    }

    /// Straight-alpha color at a device pixel; transparent outside the canvas
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        self.pixmap_ref()
            .and_then(|pixmap| pixmap.pixel(x, y))
            .map_or(Color::TRANSPARENT, |px| Color::from(px.demultiply()))
    }

    /// Straight-alpha copy for encoding or inspection
    pub fn to_image(&self) -> RgbaImage {
        let mut image = RgbaImage::new(self.width, self.height);
        if let Some(pixmap) = self.pixmap_ref() {
            for (dst, px) in image.pixels_mut().zip(pixmap.pixels()) {
                *dst = Color::from(px.demultiply()).to_rgba();
            }
        }
        image
    }

    /// Overwrites every pixel, ignoring transform, alpha and clip
    pub fn reset(&mut self, color: Color) {
        let px = ColorU8::from_rgba(color.r, color.g, color.b, color.a).premultiply();
        let bytes = [px.red(), px.green(), px.blue(), px.alpha()];
        for chunk in self.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&bytes);
        }
    }

    /// Coverage of `path` under `state`'s transform, intersected with its clip
    pub fn clip_mask(&self, path: &BezPath, state: &DrawState) -> Option<ClipMask> {
        let mut mask = Mask::new(self.width, self.height)?;
        if let (Some(path), Some(ts)) = (to_skia_path(path), to_transform(state.transform)) {
            mask.fill_path(&path, FillRule::Winding, true, ts);
        }
        if let Some(previous) = state.mask() {
            for (cov, prev) in mask.data_mut().iter_mut().zip(previous.data()) {
                *cov = ((u16::from(*cov) * u16::from(*prev) + 127) / 255) as u8;
            }
        }
        Some(ClipMask { mask })
    }

    pub fn fill_path(&mut self, path: &BezPath, color: Color, state: &DrawState) {
        let Some(color) = color.with_opacity(state.alpha) else {
            return;
        };
        let (Some(path), Some(ts)) = (to_skia_path(path), to_transform(state.transform)) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color(color);
        if let Some(mut pixmap) = self.pixmap() {
            pixmap.fill_path(&path, &paint, FillRule::Winding, ts, state.mask());
        }
    }

    /// Strokes with `width` in user units; the transform scales it
    pub fn stroke_path(&mut self, path: &BezPath, width: f64, color: Color, state: &DrawState) {
        let Some(color) = color.with_opacity(state.alpha) else {
            return;
        };
        let (Some(path), Some(ts)) = (to_skia_path(path), to_transform(state.transform)) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color(color);
        let stroke = Stroke {
            width: width as f32,
            ..Stroke::default()
        };
        if let Some(mut pixmap) = self.pixmap() {
            pixmap.stroke_path(&path, &paint, &stroke, ts, state.mask());
        }
    }

    /// Draws `src` of `sprite` into `dst`, nearest-neighbor sampled
    ///
    /// The part of `src` outside the sprite draws nothing.
    pub fn draw_image(&mut self, sprite: &Sprite, src: Rect, dst: Rect, state: &DrawState) {
        let (src, dst) = (src.abs(), dst.abs());
        let bounds = Rect::new(0.0, 0.0, f64::from(sprite.width()), f64::from(sprite.height()));
        let visible = src.intersect(bounds);
        if !(src.area() > 0.0 && dst.area() > 0.0 && visible.area() > 0.0) {
            return;
        }
        let opacity = state.alpha.clamp(0.0, 1.0) as f32;
        if opacity <= 0.0 {
            return;
        }

        let (sx, sy) = (dst.width() / src.width(), dst.height() / src.height());
        let target = Rect::new(
            dst.x0 + (visible.x0 - src.x0) * sx,
            dst.y0 + (visible.y0 - src.y0) * sy,
            dst.x0 + (visible.x1 - src.x0) * sx,
            dst.y0 + (visible.y1 - src.y0) * sy,
        );
        let placement = Affine::translate((dst.x0, dst.y0))
            * Affine::scale_non_uniform(sx, sy)
            * Affine::translate((-src.x0, -src.y0));

        let (Some(path), Some(ts), Some(pattern_ts)) = (
            to_skia_path(&target.to_path(TOLERANCE)),
            to_transform(state.transform),
            to_transform(placement),
        ) else {
            return;
        };
        let paint = Paint {
            shader: Pattern::new(
                sprite.pixmap().as_ref(),
                SpreadMode::Pad,
                FilterQuality::Nearest,
                opacity,
                pattern_ts,
            ),
            ..Paint::default()
        };
        if let Some(mut pixmap) = self.pixmap() {
            pixmap.fill_path(&path, &paint, FillRule::Winding, ts, state.mask());
        }
    }

    pub fn fill_text(&mut self, text: &str, x: f64, y: f64, style: &TextStyle, color: Color, state: &DrawState) {
        let cells = style.cells(text, x, y, false);
        self.fill_path(&cells, color, state);
    }

    /// Draws a one-cell outline around each glyph
    pub fn stroke_text(&mut self, text: &str, x: f64, y: f64, style: &TextStyle, color: Color, state: &DrawState) {
        let cells = style.cells(text, x, y, true);
        self.fill_path(&cells, color, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{rect, rect_path};

    const RED: Color = Color::rgb(255, 0, 0);

    #[test]
    fn test_fill_rect() {
        let mut canvas = Canvas::new(10, 10);
        canvas.fill_path(&rect_path(rect(2.0, 2.0, 3.0, 3.0)), RED, &DrawState::default());
        assert_eq!(canvas.pixel(3, 3), RED);
        assert_eq!(canvas.pixel(6, 6), Color::TRANSPARENT);
    }

    #[test]
    fn test_translated_fill() {
        let mut canvas = Canvas::new(10, 10);
        let state = DrawState {
            transform: Affine::translate((5.0, 5.0)),
            ..DrawState::default()
        };
        canvas.fill_path(&rect_path(rect(0.0, 0.0, 2.0, 2.0)), RED, &state);
        assert_eq!(canvas.pixel(5, 5), RED);
        assert_eq!(canvas.pixel(1, 1), Color::TRANSPARENT);
    }

    #[test]
    fn test_global_alpha_blends_over_background() {
        let mut canvas = Canvas::new(4, 4);
        canvas.reset(Color::BLACK);
        let state = DrawState {
            alpha: 0.5,
            ..DrawState::default()
        };
        canvas.fill_path(&rect_path(rect(0.0, 0.0, 4.0, 4.0)), Color::WHITE, &state);
        let px = canvas.pixel(1, 1);
        assert!((px.r as i32 - 128).abs() <= 1);
        assert_eq!(px.a, 255);
    }

    #[test]
    fn test_clip_limits_paint() {
        let mut canvas = Canvas::new(10, 10);
        let clip = canvas
            .clip_mask(&rect_path(rect(0.0, 0.0, 5.0, 10.0)), &DrawState::default())
            .unwrap();
        assert_eq!(clip.coverage(2, 2), 255);
        assert_eq!(clip.coverage(7, 2), 0);
        let state = DrawState {
            clip: Some(Rc::new(clip)),
            ..DrawState::default()
        };
        canvas.fill_path(&rect_path(rect(0.0, 0.0, 10.0, 10.0)), RED, &state);
        assert_eq!(canvas.pixel(2, 5), RED);
        assert_eq!(canvas.pixel(7, 5), Color::TRANSPARENT);
    }

    #[test]
    fn test_nested_clip_intersects() {
        let canvas = Canvas::new(10, 10);
        let outer = canvas
            .clip_mask(&rect_path(rect(0.0, 0.0, 5.0, 10.0)), &DrawState::default())
            .unwrap();
        let state = DrawState {
            clip: Some(Rc::new(outer)),
            ..DrawState::default()
        };
        let inner = canvas
            .clip_mask(&rect_path(rect(3.0, 0.0, 7.0, 10.0)), &state)
            .unwrap();
        assert_eq!(inner.coverage(4, 4), 255);
        assert_eq!(inner.coverage(1, 4), 0);
        assert_eq!(inner.coverage(6, 4), 0);
    }

    #[test]
    fn test_draw_image_scaled() {
        let mut source = RgbaImage::new(2, 1);
        source.put_pixel(0, 0, Rgba([0, 255, 0, 255]));
        source.put_pixel(1, 0, Rgba([0, 0, 255, 255]));
        let sprite = Sprite::new(source).unwrap();
        let mut canvas = Canvas::new(8, 8);
        canvas.draw_image(
            &sprite,
            rect(0.0, 0.0, 2.0, 1.0),
            rect(0.0, 0.0, 8.0, 4.0),
            &DrawState::default(),
        );
        assert_eq!(canvas.pixel(1, 1), Color::rgb(0, 255, 0));
        assert_eq!(canvas.pixel(6, 3), Color::rgb(0, 0, 255));
        assert_eq!(canvas.pixel(6, 5), Color::TRANSPARENT);
    }

    #[test]
    fn test_source_outside_sprite_draws_nothing() {
        let mut source = RgbaImage::new(2, 2);
        for px in source.pixels_mut() {
            *px = Rgba([255, 0, 0, 255]);
        }
        let sprite = Sprite::new(source).unwrap();
        let mut canvas = Canvas::new(8, 8);
        // right half of the source lies past the sprite's edge
        canvas.draw_image(
            &sprite,
            rect(0.0, 0.0, 4.0, 2.0),
            rect(0.0, 0.0, 8.0, 4.0),
            &DrawState::default(),
        );
        assert_eq!(canvas.pixel(1, 1), RED);
        assert_eq!(canvas.pixel(6, 1), Color::TRANSPARENT);
    }

    #[test]
    fn test_transparent_texels_leave_background() {
        let sprite = Sprite::new(RgbaImage::new(2, 2)).unwrap();
        let mut canvas = Canvas::new(2, 2);
        canvas.reset(RED);
        canvas.draw_image(
            &sprite,
            rect(0.0, 0.0, 2.0, 2.0),
            rect(0.0, 0.0, 2.0, 2.0),
            &DrawState::default(),
        );
        assert_eq!(canvas.pixel(0, 0), RED);
    }

    #[test]
    fn test_fill_text_inks_glyph() {
        let mut canvas = Canvas::new(40, 20);
        let style = TextStyle {
            size: 8.0,
            ..TextStyle::default()
        };
        canvas.fill_text("I", 0.0, 0.0, &style, Color::WHITE, &DrawState::default());
        // 'I' top bar covers columns 1..=3 of row 0 at 1px per cell
        assert_eq!(canvas.pixel(2, 0), Color::WHITE);
        assert_eq!(canvas.pixel(0, 0), Color::TRANSPARENT);
        assert_eq!(canvas.pixel(2, 3), Color::WHITE);
    }

    #[test]
    fn test_text_alignment() {
        let style = TextStyle {
            size: 8.0,
            align: TextAlign::Right,
            baseline: TextBaseline::Top,
        };
        assert_eq!(style.measure("AB"), 11.0);
        assert_eq!(style.origin("AB", 20.0, 0.0), Point::new(9.0, 0.0));
        let centered = TextStyle {
            align: TextAlign::Center,
            baseline: TextBaseline::Middle,
            ..style
        };
        assert_eq!(centered.origin("AB", 20.0, 10.0), Point::new(14.5, 6.5));
    }

    #[test]
    fn test_stroke_line() {
        let mut canvas = Canvas::new(10, 10);
        let mut path = BezPath::new();
        path.move_to((0.0, 5.0));
        path.line_to((10.0, 5.0));
        canvas.stroke_path(&path, 2.0, RED, &DrawState::default());
        assert_eq!(canvas.pixel(5, 4), RED);
        assert_eq!(canvas.pixel(5, 5), RED);
        assert_eq!(canvas.pixel(5, 7), Color::TRANSPARENT);
    }

    #[test]
    fn test_to_image_is_straight_alpha() {
        let mut canvas = Canvas::new(2, 2);
        canvas.reset(Color::rgba(255, 0, 0, 128));
        let image = canvas.to_image();
        assert_eq!(image.get_pixel(1, 1), &Rgba([255, 0, 0, 128]));
    }

    #[test]
    fn test_zero_sized_canvas_ignores_paint() {
        let mut canvas = Canvas::new(0, 0);
        canvas.fill_path(&rect_path(rect(0.0, 0.0, 4.0, 4.0)), RED, &DrawState::default());
        assert!(canvas.clip_mask(&BezPath::new(), &DrawState::default()).is_none());
        assert_eq!(canvas.pixel(0, 0), Color::TRANSPARENT);
    }
}
