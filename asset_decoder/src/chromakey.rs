//! Background removal for generated images.
//!
//! The background color is the rounded average of the four corner pixels.
//! Every pixel within CIEDE2000 distance [`DELTA_E_THRESHOLD`] of it
//! becomes fully transparent.

use image::RgbaImage;

pub const DELTA_E_THRESHOLD: f64 = 10.0;

/// Converts 8-bit sRGB to CIELAB under a D65 white point
pub fn rgb_to_lab(rgb: [u8; 3]) -> [f64; 3] {
    let linear = |c: u8| {
        let v = f64::from(c) / 255.0;
        if v > 0.04045 {
            ((v + 0.055) / 1.055).powf(2.4)
        } else {
            v / 12.92
        }
    };
    let (r, g, b) = (linear(rgb[0]), linear(rgb[1]), linear(rgb[2]));

    let x = (r * 0.4124564 + g * 0.3575761 + b * 0.1804375) / 0.95047;
    let y = r * 0.2126729 + g * 0.7151522 + b * 0.0721750;
    let z = (r * 0.0193339 + g * 0.1191920 + b * 0.9503041) / 1.08883;

    let f = |v: f64| {
        if v > 0.008856 {
            v.cbrt()
        } else {
            7.787 * v + 16.0 / 116.0
        }
    };
    let (fx, fy, fz) = (f(x), f(y), f(z));
    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// CIEDE2000 color difference with unit weighting factors
pub fn ciede2000(lab1: [f64; 3], lab2: [f64; 3]) -> f64 {
    let [l1, a1, b1] = lab1;
    let [l2, a2, b2] = lab2;
    let pow25_7 = 25f64.powi(7);

    let avg_l = (l1 + l2) / 2.0;
    let c1 = a1.hypot(b1);
    let c2 = a2.hypot(b2);
    let avg_c7 = ((c1 + c2) / 2.0).powi(7);
    let g = 0.5 * (1.0 - (avg_c7 / (avg_c7 + pow25_7)).sqrt());

    let a1p = a1 * (1.0 + g);
    let a2p = a2 * (1.0 + g);
    let c1p = a1p.hypot(b1);
    let c2p = a2p.hypot(b2);
    let avg_cp = (c1p + c2p) / 2.0;

    let hue = |b: f64, ap: f64| b.atan2(ap).to_degrees().rem_euclid(360.0);
    let h1p = hue(b1, a1p);
    let h2p = hue(b2, a2p);

    let mut dh = h2p - h1p;
    if dh.abs() > 180.0 {
        dh -= 360.0f64.copysign(dh);
    }
    let d_hp = 2.0 * (c1p * c2p).sqrt() * (dh.to_radians() / 2.0).sin();

    let avg_hp = if c1p == 0.0 || c2p == 0.0 {
        h1p + h2p
    } else if (h1p - h2p).abs() <= 180.0 {
        (h1p + h2p) / 2.0
    } else {
        ((h1p + h2p + 360.0) / 2.0).rem_euclid(360.0)
    };

    let t = 1.0 - 0.17 * (avg_hp - 30.0).to_radians().cos()
        + 0.24 * (2.0 * avg_hp).to_radians().cos()
        + 0.32 * (3.0 * avg_hp + 6.0).to_radians().cos()
        - 0.20 * (4.0 * avg_hp - 63.0).to_radians().cos();

    let dl = l2 - l1;
    let dc = c2p - c1p;
    let sl = 1.0 + 0.015 * (avg_l - 50.0).powi(2) / (20.0 + (avg_l - 50.0).powi(2)).sqrt();
    let sc = 1.0 + 0.045 * avg_cp;
    let sh = 1.0 + 0.015 * avg_cp * t;
    let avg_cp7 = avg_cp.powi(7);
    let rt = -2.0
        * (avg_cp7 / (avg_cp7 + pow25_7)).sqrt()
        * (60.0 * (-((avg_hp - 275.0) / 25.0).powi(2)).exp())
            .to_radians()
            .sin();

    ((dl / sl).powi(2) + (dc / sc).powi(2) + (d_hp / sh).powi(2) + rt * (dc / sc) * (d_hp / sh))
        .sqrt()
}

/// Rounded mean RGB of the four corners
pub fn corner_color(image: &RgbaImage) -> [u8; 3] {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return [0, 0, 0];
    }
    let corners = [(0, 0), (w - 1, 0), (0, h - 1), (w - 1, h - 1)];
    let mut sum = [0u32; 3];
    for (x, y) in corners {
        let p = image.get_pixel(x, y);
        for (acc, c) in sum.iter_mut().zip(p.0) {
            *acc += u32::from(c);
        }
    }
    sum.map(|s| (f64::from(s) / 4.0).round() as u8)
}

/// Clears the alpha of background-colored pixels; returns how many
pub fn remove_background(image: &mut RgbaImage) -> usize {
    let background = corner_color(image);
    let reference = rgb_to_lab(background);
    let mut removed = 0;
    for pixel in image.pixels_mut() {
        let lab = rgb_to_lab([pixel[0], pixel[1], pixel[2]]);
        if ciede2000(reference, lab) < DELTA_E_THRESHOLD {
            pixel[3] = 0;
            removed += 1;
        }
    }
    tracing::debug!(?background, removed, total = image.width() * image.height(), "Chromakey applied");
    removed
}
