//! # Command Interpreter
//!
//! Executes the draw subsequence of a frame against a [`Surface`].
//!
//! Commands run strictly in order. Audio, meta and unknown commands are
//! skipped. Paints with unparseable colors, `img` commands naming a missing
//! image, and degenerate shapes draw nothing; none of these is an error.

use crate::color::parse_color;
use crate::pool::ImagePool;
use crate::state::PaintStack;
use crate::surface::Surface;
use game_types::{
    ArcCmd, CircleCmd, Command, ImageCmd, LineCmd, PathCmd, PathStep, PolyCmd, RectCmd, TextCmd,
};
use graphics_rasterizer::{
    arc_path, circle_path, polygon_path, rect, rect_path, BezPath, Color, Point, TextAlign,
    TextBaseline, TextStyle,
};
use std::f64::consts::TAU;
use tracing::trace;

pub const DEFAULT_FONT_SIZE: f64 = 16.0;

/// Counters for one `execute` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub executed: usize,
    pub skipped: usize,
}

/// Stateful draw-command executor
///
/// Paint state persists across `execute` calls until [`reset`](Self::reset),
/// matching a canvas context that lives for the whole session.
#[derive(Debug, Default)]
pub struct CommandInterpreter {
    stack: PaintStack,
}

fn line_width(value: Option<f64>) -> f64 {
    match value {
        Some(w) if w > 0.0 && w.is_finite() => w,
        _ => 1.0,
    }
}

/// Parses the pixel size out of a CSS font shorthand like `bold 14px monospace`
pub fn font_size(font: &str) -> f64 {
    font.split_whitespace()
        .filter_map(|token| token.strip_suffix("px"))
        .filter_map(|size| size.parse::<f64>().ok())
        .find(|size| *size > 0.0 && size.is_finite())
        .unwrap_or(DEFAULT_FONT_SIZE)
}

fn text_style(cmd: &TextCmd) -> TextStyle {
    let align = match cmd.align.as_deref() {
        Some("center") => TextAlign::Center,
        Some("right") | Some("end") => TextAlign::Right,
        _ => TextAlign::Left,
    };
    let baseline = match cmd.baseline.as_deref() {
        Some("middle") => TextBaseline::Middle,
        Some("alphabetic") | Some("ideographic") => TextBaseline::Alphabetic,
        Some("bottom") => TextBaseline::Bottom,
        _ => TextBaseline::Top,
    };
    TextStyle {
        size: cmd.font.as_deref().map_or(DEFAULT_FONT_SIZE, font_size),
        align,
        baseline,
    }
}

fn color_of(value: Option<&String>) -> Option<Color> {
    let text = value?;
    let color = parse_color(text);
    if color.is_none() {
        trace!(color = %text, "Unparseable color, paint skipped");
    }
    color
}

impl CommandInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stack(&self) -> &PaintStack {
        &self.stack
    }

    /// Drops saved states, transform, alpha and clip
    pub fn reset(&mut self) {
        self.stack.reset();
    }

    pub fn execute<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        commands: &[Command],
        images: &ImagePool,
    ) -> FrameStats {
        let mut stats = FrameStats::default();
        for command in commands {
            if self.execute_one(surface, command, images) {
                stats.executed += 1;
            } else {
                stats.skipped += 1;
            }
        }
        stats
    }

    /// Returns false when the command was not a draw command
    fn execute_one<S: Surface + ?Sized>(&mut self, surface: &mut S, command: &Command, images: &ImagePool) -> bool {
        match command {
            Command::Clear(c) => {
                let (w, h) = surface.size();
                let color = c.color.clone().unwrap_or_else(|| "#000".to_string());
                if let Some(color) = color_of(Some(&color)) {
                    let area = rect_path(rect(0.0, 0.0, f64::from(w), f64::from(h)));
                    surface.fill_path(&area, color, self.stack.current());
                }
            }
            Command::Rect(c) => self.rect(surface, c),
            Command::Circle(c) => self.circle(surface, c),
            Command::Line(c) => self.line(surface, c),
            Command::Poly(c) => self.poly(surface, c),
            Command::Arc(c) => self.arc(surface, c),
            Command::Text(c) => self.text(surface, c),
            Command::Img(c) => self.image(surface, c, images),
            Command::Path(c) => self.path(surface, c),
            Command::Save => self.stack.save(),
            Command::Restore => self.stack.restore(),
            Command::Translate(c) => self.stack.translate(c.x, c.y),
            Command::Rotate(c) => self.stack.rotate(c.angle),
            Command::Scale(c) => self.stack.scale(c.x, c.y),
            Command::Alpha(c) => self.stack.set_alpha(c.value),
            Command::Clip(c) => {
                let area = rect_path(rect(c.x, c.y, c.w, c.h));
                if let Some(mask) = surface.clip_mask(&area, self.stack.current()) {
                    self.stack.set_clip(mask);
                }
            }
            Command::Tone(_)
            | Command::Noise(_)
            | Command::Sample(_)
            | Command::Stop(_)
            | Command::StopAll
            | Command::Volume(_)
            | Command::Score(_)
            | Command::GameOver
            | Command::Unknown => return false,
        }
        true
    }

    fn paint<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        path: &BezPath,
        fill: Option<&String>,
        stroke: Option<&String>,
        width: Option<f64>,
    ) {
        let state = self.stack.current();
        if let Some(color) = color_of(fill) {
            surface.fill_path(path, color, state);
        }
        if let Some(color) = color_of(stroke) {
            surface.stroke_path(path, line_width(width), color, state);
        }
    }

    fn rect<S: Surface + ?Sized>(&self, surface: &mut S, c: &RectCmd) {
        let path = rect_path(rect(c.x, c.y, c.w, c.h));
        self.paint(surface, &path, c.fill.as_ref(), c.stroke.as_ref(), c.line_width);
    }

    fn circle<S: Surface + ?Sized>(&self, surface: &mut S, c: &CircleCmd) {
        let path = circle_path(c.x, c.y, c.r);
        self.paint(surface, &path, c.fill.as_ref(), c.stroke.as_ref(), c.line_width);
    }

    fn line<S: Surface + ?Sized>(&self, surface: &mut S, c: &LineCmd) {
        let mut path = BezPath::new();
        path.move_to((c.x1, c.y1));
        path.line_to((c.x2, c.y2));
        let color = c.color.clone().unwrap_or_else(|| "#fff".to_string());
        if let Some(color) = color_of(Some(&color)) {
            surface.stroke_path(&path, line_width(c.line_width), color, self.stack.current());
        }
    }

    fn poly<S: Surface + ?Sized>(&self, surface: &mut S, c: &PolyCmd) {
        if c.points.len() < 2 {
            return;
        }
        let points: Vec<Point> = c.points.iter().map(|[x, y]| Point::new(*x, *y)).collect();
        let path = polygon_path(&points, c.close != Some(false));
        self.paint(surface, &path, c.fill.as_ref(), c.stroke.as_ref(), c.line_width);
    }

    fn arc<S: Surface + ?Sized>(&self, surface: &mut S, c: &ArcCmd) {
        let start = c.start.filter(|s| s.is_finite()).unwrap_or(0.0);
        // zero end falls back to a full turn
        let end = c.end.filter(|e| *e != 0.0 && !e.is_nan()).unwrap_or(TAU);
        let path = arc_path(c.x, c.y, c.r, start, end);
        self.paint(surface, &path, c.fill.as_ref(), c.stroke.as_ref(), c.line_width);
    }

    fn text<S: Surface + ?Sized>(&self, surface: &mut S, c: &TextCmd) {
        let style = text_style(c);
        let state = self.stack.current();
        let fill = color_of(c.fill.as_ref());
        let stroke = color_of(c.stroke.as_ref());
        if let Some(color) = fill {
            surface.fill_text(&c.text, c.x, c.y, &style, color, state);
        }
        if let Some(color) = stroke {
            surface.stroke_text(&c.text, c.x, c.y, &style, color, state);
        }
        if c.fill.is_none() && c.stroke.is_none() {
            surface.fill_text(&c.text, c.x, c.y, &style, Color::WHITE, state);
        }
    }

    fn image<S: Surface + ?Sized>(&mut self, surface: &mut S, c: &ImageCmd, images: &ImagePool) {
        let Some(sprite) = images.sprite(&c.id) else {
            trace!(id = %c.id, "Image not in pool, skipped");
            return;
        };
        let (iw, ih) = (f64::from(sprite.width()), f64::from(sprite.height()));
        let nonzero = |v: Option<f64>| v.filter(|v| *v != 0.0 && !v.is_nan());

        let src = match c.sx {
            Some(sx) => {
                let sy = c.sy.unwrap_or(0.0);
                rect(sx, sy, c.sw.unwrap_or(iw - sx), c.sh.unwrap_or(ih - sy))
            }
            None => rect(0.0, 0.0, iw, ih),
        };
        let dst = rect(
            c.x,
            c.y,
            nonzero(c.w).unwrap_or(src.width()),
            nonzero(c.h).unwrap_or(src.height()),
        );

        let rotate = nonzero(c.rotate);
        let isolated = rotate.is_some() || c.alpha.is_some();
        if isolated {
            self.stack.save();
        }
        if let Some(alpha) = c.alpha {
            self.stack.set_alpha(alpha);
        }
        if let Some(angle) = rotate {
            let center = dst.center();
            self.stack.translate(center.x, center.y);
            self.stack.rotate(angle);
            self.stack.translate(-center.x, -center.y);
        }
        surface.draw_image(sprite, src, dst, self.stack.current());
        if isolated {
            self.stack.restore();
        }
    }

    fn path<S: Surface + ?Sized>(&self, surface: &mut S, c: &PathCmd) {
        if c.d.is_empty() {
            return;
        }
        let mut path = BezPath::new();
        let mut open = false;
        for step in &c.d {
            match *step {
                PathStep::MoveTo(x, y) => {
                    path.move_to((x, y));
                    open = true;
                }
                // drawing before any moveTo starts at the first point
                PathStep::LineTo(x, y) if !open => {
                    path.move_to((x, y));
                    open = true;
                }
                PathStep::LineTo(x, y) => path.line_to((x, y)),
                PathStep::BezierTo(c1x, c1y, c2x, c2y, x, y) => {
                    if !open {
                        path.move_to((c1x, c1y));
                        open = true;
                    }
                    path.curve_to((c1x, c1y), (c2x, c2y), (x, y));
                }
                PathStep::QuadTo(cx, cy, x, y) => {
                    if !open {
                        path.move_to((cx, cy));
                        open = true;
                    }
                    path.quad_to((cx, cy), (x, y));
                }
                PathStep::Close if open => path.close_path(),
                PathStep::Close | PathStep::Unknown(_) => {}
            }
        }
        self.paint(surface, &path, c.fill.as_ref(), c.stroke.as_ref(), c.line_width);
    }
}
