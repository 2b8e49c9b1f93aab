//! # Graphics Rasterizer
//!
//! This crate provides the software 2D paint surface the renderer draws on:
//! filled and stroked paths, image blits and bitmap text, each under a
//! transform, a global alpha and an optional clip mask.
//!
//! Shapes are built with `kurbo` and rasterized by `tiny-skia`; this crate
//! adds canvas conventions and the built-in font on top.
//!
//! ## Philosophy
//!
//! - **Deterministic**: Same operations, same pixels. No platform fonts, no
//!   GPU, no threads
//! - **Canvas semantics**: Transforms compose and arcs sweep the way a 2D
//!   canvas does, so command streams written for one look right here
//! - **Hostile input is ordinary input**: Non-finite coordinates, singular
//!   transforms and empty rectangles draw nothing rather than fail
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A vector graphics library (no gradients, dashes or even-odd fill)
//! - A text shaper (one built-in 5x7 bitmap font)

pub mod canvas;
pub mod font;
pub mod geometry;
pub mod sprite;

pub use canvas::{Canvas, ClipMask, Color, DrawState, TextAlign, TextBaseline, TextStyle};
pub use geometry::{arc_path, circle_path, polygon_path, rect, rect_path};
pub use kurbo::{Affine, BezPath, Point, Rect};
pub use sprite::Sprite;
