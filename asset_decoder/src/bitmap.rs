//! Decoders for images declared inline in the manifest.

use crate::error::AssetDecodeError;
use command_renderer::{parse_color, CommandInterpreter, ImagePool};
use game_types::{PaletteRows, PixelGrid, ProceduralImage};
use graphics_rasterizer::{Canvas, Color};
use image::{Rgba, RgbaImage};

/// Rejects zero-sized images and sides above `limit`
pub fn check_size(width: u32, height: u32, limit: u32) -> Result<(), AssetDecodeError> {
    if width == 0 || height == 0 || width > limit || height > limit {
        return Err(AssetDecodeError::InvalidSize {
            width,
            height,
            limit,
        });
    }
    Ok(())
}

fn opaque(color: Option<Color>) -> Rgba<u8> {
    let c = color.unwrap_or(Color::BLACK);
    Rgba([c.r, c.g, c.b, 255])
}

/// Row-major explicit colors; missing cells stay transparent
///
/// Unreadable colors decode as opaque black and cells past `w * h` are
/// ignored.
pub fn decode_pixels(grid: &PixelGrid, limit: u32) -> Result<RgbaImage, AssetDecodeError> {
    check_size(grid.w, grid.h, limit)?;
    let mut image = RgbaImage::new(grid.w, grid.h);
    let cells = grid.data.iter().take((grid.w * grid.h) as usize);
    for (i, cell) in cells.enumerate() {
        if let Some(color) = &cell.0 {
            let (x, y) = (i as u32 % grid.w, i as u32 / grid.w);
            image.put_pixel(x, y, opaque(parse_color(color)));
        }
    }
    Ok(image)
}

/// Palette-indexed hex-digit rows
///
/// Digit `0` is transparent. A digit without a palette entry, or a
/// character that is not a hex digit, is opaque black. Rows and columns
/// beyond the declared size are clipped.
pub fn decode_hex(rows: &PaletteRows, limit: u32) -> Result<RgbaImage, AssetDecodeError> {
    check_size(rows.w, rows.h, limit)?;
    let palette: Vec<Rgba<u8>> = rows
        .palette
        .iter()
        .map(|c| opaque(parse_color(c)))
        .collect();
    let black = opaque(None);

    let mut image = RgbaImage::new(rows.w, rows.h);
    for (y, row) in rows.rows.iter().take(rows.h as usize).enumerate() {
        for (x, digit) in row.chars().take(rows.w as usize).enumerate() {
            let pixel = match digit.to_digit(16) {
                Some(0) => continue,
                Some(index) => palette.get(index as usize).copied().unwrap_or(black),
                None => black,
            };
            image.put_pixel(x as u32, y as u32, pixel);
        }
    }
    Ok(image)
}

/// Runs a nested command list once on a transparent offscreen canvas
///
/// Procedural images cannot reference other images.
pub fn render_procedural(
    proc: &ProceduralImage,
    limit: u32,
) -> Result<RgbaImage, AssetDecodeError> {
    check_size(proc.w, proc.h, limit)?;
    let mut canvas = Canvas::new(proc.w, proc.h);
    CommandInterpreter::new().execute(&mut canvas, &proc.draw, &ImagePool::new());
    Ok(canvas.to_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_types::PixelCell;
    use serde_json::json;

    const LIMIT: u32 = 512;

    fn rows(w: u32, h: u32, palette: &[&str], rows: &[&str]) -> PaletteRows {
        PaletteRows {
            w,
            h,
            palette: palette.iter().map(|s| s.to_string()).collect(),
            rows: rows.iter().map(|s| s.to_string()).collect(),
        }
    }

    // ========================================================================
    // Pixels
    // ========================================================================

    #[test]
    fn test_pixels_row_major() {
        let grid = PixelGrid {
            w: 2,
            h: 2,
            data: vec![
                PixelCell(Some("#ff0000".into())),
                PixelCell(None),
                PixelCell(None),
                PixelCell(Some("#0000ff".into())),
            ],
        };
        let image = decode_pixels(&grid, LIMIT).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(image.get_pixel(1, 0)[3], 0);
        assert_eq!(image.get_pixel(1, 1), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_pixels_short_and_long_data() {
        let short = PixelGrid {
            w: 3,
            h: 1,
            data: vec![PixelCell(Some("#ffffff".into()))],
        };
        let image = decode_pixels(&short, LIMIT).unwrap();
        assert_eq!(image.get_pixel(2, 0)[3], 0);

        let long = PixelGrid {
            w: 1,
            h: 1,
            data: vec![PixelCell(Some("#ffffff".into())); 5],
        };
        assert_eq!(decode_pixels(&long, LIMIT).unwrap().dimensions(), (1, 1));
    }

    #[test]
    fn test_pixels_bad_color_is_black() {
        let grid = PixelGrid {
            w: 1,
            h: 1,
            data: vec![PixelCell(Some("chartreuse-ish".into()))],
        };
        let image = decode_pixels(&grid, LIMIT).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
    }

    // ========================================================================
    // Hex rows
    // ========================================================================

    #[test]
    fn test_hex_all_zero_is_transparent() {
        let image = decode_hex(&rows(4, 3, &["#000", "#fff"], &["0000", "0000", "0000"]), LIMIT)
            .unwrap();
        assert_eq!(image.dimensions(), (4, 3));
        assert!(image.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_hex_palette_lookup() {
        let image = decode_hex(
            &rows(3, 1, &["#000000", "#ff0000", "#00ff00"], &["12f"]),
            LIMIT,
        )
        .unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(image.get_pixel(1, 0), &Rgba([0, 255, 0, 255]));
        // index 15 has no palette entry
        assert_eq!(image.get_pixel(2, 0), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_hex_clips_and_tolerates_junk() {
        let image = decode_hex(&rows(2, 1, &["", "#fff"], &["1z11", "11"]), LIMIT).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(image.get_pixel(1, 0), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_size_limits() {
        assert!(matches!(
            decode_hex(&rows(0, 1, &[], &[]), LIMIT),
            Err(AssetDecodeError::InvalidSize { width: 0, .. })
        ));
        assert!(matches!(
            decode_hex(&rows(513, 1, &[], &[]), LIMIT),
            Err(AssetDecodeError::InvalidSize { limit: 512, .. })
        ));
    }

    // ========================================================================
    // Procedural
    // ========================================================================

    #[test]
    fn test_procedural_renders_offscreen() {
        let proc: ProceduralImage = serde_json::from_value(json!({
            "w": 8, "h": 8,
            "draw": [
                {"op": "rect", "x": 0, "y": 0, "w": 4, "h": 8, "fill": "#0f0"},
                {"op": "img", "id": "other", "x": 0, "y": 0}
            ]
        }))
        .unwrap();
        let image = render_procedural(&proc, LIMIT).unwrap();
        assert_eq!(image.get_pixel(1, 4), &Rgba([0, 255, 0, 255]));
        assert_eq!(image.get_pixel(6, 4)[3], 0);
    }
}
