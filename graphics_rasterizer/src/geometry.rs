//! Canvas-style shapes built with `kurbo`, handed to `tiny-skia` for
//! rasterization.

use kurbo::{Affine, Arc, BezPath, Circle, PathEl, Point, Rect, Shape, Vec2};
use std::f64::consts::TAU;
use tiny_skia::{PathBuilder, Transform};

/// Curve flattening tolerance in user units
pub const TOLERANCE: f64 = 0.1;

/// Normalizes a clockwise arc sweep the way a 2D canvas does
pub fn arc_sweep(start: f64, end: f64) -> f64 {
    let sweep = end - start;
    if sweep >= TAU {
        TAU
    } else {
        sweep.rem_euclid(TAU)
    }
}

/// Rectangle from an origin and a size; negative sizes extend up or left
pub fn rect(x: f64, y: f64, w: f64, h: f64) -> Rect {
    Rect::from_origin_size((x, y), (w, h))
}

pub fn rect_path(r: Rect) -> BezPath {
    r.to_path(TOLERANCE)
}

pub fn circle_path(cx: f64, cy: f64, radius: f64) -> BezPath {
    Circle::new((cx, cy), radius.abs()).to_path(TOLERANCE)
}

/// Clockwise arc from `start` to `end` radians; a fill closes it with a chord
pub fn arc_path(cx: f64, cy: f64, radius: f64, start: f64, end: f64) -> BezPath {
    let radius = radius.abs();
    let arc = Arc {
        center: Point::new(cx, cy),
        radii: Vec2::new(radius, radius),
        start_angle: start,
        sweep_angle: arc_sweep(start, end),
        x_rotation: 0.0,
    };
    arc.to_path(TOLERANCE)
}

pub fn polygon_path(points: &[Point], close: bool) -> BezPath {
    let mut path = BezPath::new();
    if let Some((first, rest)) = points.split_first() {
        path.move_to(*first);
        for p in rest {
            path.line_to(*p);
        }
        if close {
            path.close_path();
        }
    }
    path
}

fn coords(p: Point) -> Option<(f32, f32)> {
    let (x, y) = (p.x as f32, p.y as f32);
    (x.is_finite() && y.is_finite()).then_some((x, y))
}

/// Converts to a rasterizable path; `None` for empty or non-finite paths
pub fn to_skia_path(path: &BezPath) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                let (x, y) = coords(p)?;
                builder.move_to(x, y);
            }
            PathEl::LineTo(p) => {
                let (x, y) = coords(p)?;
                builder.line_to(x, y);
            }
            PathEl::QuadTo(c, p) => {
                let (cx, cy) = coords(c)?;
                let (x, y) = coords(p)?;
                builder.quad_to(cx, cy, x, y);
            }
            PathEl::CurveTo(c1, c2, p) => {
                let (c1x, c1y) = coords(c1)?;
                let (c2x, c2y) = coords(c2)?;
                let (x, y) = coords(p)?;
                builder.cubic_to(c1x, c1y, c2x, c2y, x, y);
            }
            PathEl::ClosePath => builder.close(),
        }
    }
    builder.finish()
}

/// `None` when any coefficient is not representable
pub fn to_transform(affine: Affine) -> Option<Transform> {
    let [a, b, c, d, e, f] = affine.as_coeffs().map(|v| v as f32);
    [a, b, c, d, e, f]
        .iter()
        .all(|v| v.is_finite())
        .then(|| Transform::from_row(a, b, c, d, e, f))
}
