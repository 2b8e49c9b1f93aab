//! CSS color strings.
//!
//! Accepts `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb()`, `rgba()`,
//! `hsl()`, `hsla()` and a table of common named colors. Anything else is
//! `None`, and the paint that asked for it is skipped.

use graphics_rasterizer::Color;

const NAMED: &[(&str, Color)] = &[
    ("black", Color::rgb(0, 0, 0)),
    ("white", Color::rgb(255, 255, 255)),
    ("red", Color::rgb(255, 0, 0)),
    ("green", Color::rgb(0, 128, 0)),
    ("lime", Color::rgb(0, 255, 0)),
    ("blue", Color::rgb(0, 0, 255)),
    ("yellow", Color::rgb(255, 255, 0)),
    ("cyan", Color::rgb(0, 255, 255)),
    ("aqua", Color::rgb(0, 255, 255)),
    ("magenta", Color::rgb(255, 0, 255)),
    ("fuchsia", Color::rgb(255, 0, 255)),
    ("gray", Color::rgb(128, 128, 128)),
    ("grey", Color::rgb(128, 128, 128)),
    ("darkgray", Color::rgb(169, 169, 169)),
    ("darkgrey", Color::rgb(169, 169, 169)),
    ("lightgray", Color::rgb(211, 211, 211)),
    ("lightgrey", Color::rgb(211, 211, 211)),
    ("silver", Color::rgb(192, 192, 192)),
    ("maroon", Color::rgb(128, 0, 0)),
    ("olive", Color::rgb(128, 128, 0)),
    ("teal", Color::rgb(0, 128, 128)),
    ("navy", Color::rgb(0, 0, 128)),
    ("purple", Color::rgb(128, 0, 128)),
    ("orange", Color::rgb(255, 165, 0)),
    ("pink", Color::rgb(255, 192, 203)),
    ("brown", Color::rgb(165, 42, 42)),
    ("gold", Color::rgb(255, 215, 0)),
    ("skyblue", Color::rgb(135, 206, 235)),
    ("darkblue", Color::rgb(0, 0, 139)),
    ("darkgreen", Color::rgb(0, 100, 0)),
    ("darkred", Color::rgb(139, 0, 0)),
    ("violet", Color::rgb(238, 130, 238)),
    ("indigo", Color::rgb(75, 0, 130)),
    ("coral", Color::rgb(255, 127, 80)),
    ("salmon", Color::rgb(250, 128, 114)),
    ("tomato", Color::rgb(255, 99, 71)),
    ("crimson", Color::rgb(220, 20, 60)),
    ("khaki", Color::rgb(240, 230, 140)),
    ("beige", Color::rgb(245, 245, 220)),
    ("tan", Color::rgb(210, 180, 140)),
    ("chocolate", Color::rgb(210, 105, 30)),
    ("turquoise", Color::rgb(64, 224, 208)),
    ("transparent", Color::rgba(0, 0, 0, 0)),
];

pub fn parse_color(text: &str) -> Option<Color> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = text.to_ascii_lowercase();
    if let Some((name, args)) = lower.split_once('(') {
        let args = args.strip_suffix(')')?;
        let parts: Vec<&str> = args
            .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .collect();
        return match name.trim() {
            "rgb" | "rgba" => parse_rgb(&parts),
            "hsl" | "hsla" => parse_hsl(&parts),
            _ => None,
        };
    }
    NAMED
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, color)| *color)
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => Some(Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
        4 => Some(Color::rgba(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?)),
        6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

fn channel(part: &str) -> Option<u8> {
    let value = match part.strip_suffix('%') {
        Some(pct) => pct.parse::<f64>().ok()? * 2.55,
        None => part.parse::<f64>().ok()?,
    };
    value
        .is_finite()
        .then(|| value.round().clamp(0.0, 255.0) as u8)
}

fn alpha(part: Option<&&str>) -> Option<u8> {
    let Some(part) = part else { return Some(255) };
    let value = match part.strip_suffix('%') {
        Some(pct) => pct.parse::<f64>().ok()? / 100.0,
        None => part.parse::<f64>().ok()?,
    };
    value
        .is_finite()
        .then(|| (value.clamp(0.0, 1.0) * 255.0).round() as u8)
}

fn parse_rgb(parts: &[&str]) -> Option<Color> {
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    Some(Color::rgba(
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
        alpha(parts.get(3))?,
    ))
}

fn parse_hsl(parts: &[&str]) -> Option<Color> {
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let hue = parts[0].trim_end_matches("deg").parse::<f64>().ok()?;
    let sat = parts[1].strip_suffix('%')?.parse::<f64>().ok()? / 100.0;
    let light = parts[2].strip_suffix('%')?.parse::<f64>().ok()? / 100.0;
    if !(hue.is_finite() && sat.is_finite() && light.is_finite()) {
        return None;
    }
    let (s, l) = (sat.clamp(0.0, 1.0), light.clamp(0.0, 1.0));
    let h = hue.rem_euclid(360.0) / 360.0;

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let hue_to = |t: f64| {
        let t = t.rem_euclid(1.0);
        let v = if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        };
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };
    Some(Color::rgba(
        hue_to(h + 1.0 / 3.0),
        hue_to(h),
        hue_to(h - 1.0 / 3.0),
        alpha(parts.get(3))?,
    ))
}
