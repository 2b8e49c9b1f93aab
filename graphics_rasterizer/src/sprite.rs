//! Decoded images kept ready for drawing.

use image::RgbaImage;
use std::fmt;
use tiny_skia::{ColorU8, Pixmap};

/// An image plus its premultiplied copy, converted once at insert time
#[derive(Clone)]
pub struct Sprite {
    image: RgbaImage,
    pixmap: Pixmap,
}

impl Sprite {
    /// `None` for zero-sized images
    pub fn new(image: RgbaImage) -> Option<Self> {
        let mut pixmap = Pixmap::new(image.width(), image.height())?;
        for (dst, px) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
            *dst = ColorU8::from_rgba(px[0], px[1], px[2], px[3]).premultiply();
        }
        Some(Self { image, pixmap })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Straight-alpha pixels as decoded
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub(crate) fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }
}

impl fmt::Debug for Sprite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sprite")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_premultiplied_on_insert() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, Rgba([255, 0, 0, 128]));
        let sprite = Sprite::new(image).unwrap();
        let px = sprite.pixmap().pixel(0, 0).unwrap();
        assert_eq!((px.red(), px.alpha()), (128, 128));
        assert_eq!(sprite.image().get_pixel(0, 0), &Rgba([255, 0, 0, 128]));
    }

    #[test]
    fn test_empty_image_rejected() {
        assert!(Sprite::new(RgbaImage::new(0, 4)).is_none());
    }
}
