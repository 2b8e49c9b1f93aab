//! White, pink and brown noise.
//!
//! Pink noise is Paul Kellet's refined filter bank: seven leaky
//! accumulators fed by the same white source. Brown noise is a single
//! leaky integrator.

use crate::envelope::envelope_gain;
use game_types::Adsr;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoiseColor {
    #[default]
    White,
    Pink,
    Brown,
}

impl NoiseColor {
    /// Anything other than `pink` or `brown` is white
    pub fn parse(name: Option<&str>) -> Self {
        match name {
            Some("pink") => NoiseColor::Pink,
            Some("brown") => NoiseColor::Brown,
            _ => NoiseColor::White,
        }
    }
}

/// Stateful filter turning white samples into the requested color
#[derive(Debug, Clone, Default)]
pub struct NoiseFilter {
    color: NoiseColor,
    taps: [f64; 7],
    last: f64,
}

impl NoiseFilter {
    pub fn new(color: NoiseColor) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }

    /// Feeds one white sample in `[-1, 1]` and returns the colored output
    pub fn next(&mut self, white: f64) -> f64 {
        match self.color {
            NoiseColor::White => white,
            NoiseColor::Brown => {
                self.last = (self.last + 0.02 * white) / 1.02;
                self.last * 3.5
            }
            NoiseColor::Pink => {
                let b = &mut self.taps;
                b[0] = 0.99886 * b[0] + white * 0.0555179;
                b[1] = 0.99332 * b[1] + white * 0.0750759;
                b[2] = 0.96900 * b[2] + white * 0.1538520;
                b[3] = 0.86650 * b[3] + white * 0.3104856;
                b[4] = 0.55000 * b[4] + white * 0.5329522;
                b[5] = -0.7616 * b[5] - white * 0.0168980;
                let out = (b.iter().sum::<f64>() + white * 0.5362) * 0.11;
                b[6] = white * 0.115926;
                out
            }
        }
    }
}

/// Number of samples in a buffer of `dur` seconds
pub fn buffer_len(dur: f64, sample_rate: u32) -> usize {
    let len = (dur * f64::from(sample_rate)).round();
    if len.is_finite() && len > 0.0 {
        len as usize
    } else {
        0
    }
}

/// One uniformly distributed white sample in `[-1, 1)`
pub fn white<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen::<f64>() * 2.0 - 1.0
}

/// Renders `dur` seconds of noise shaped by `adsr` and scaled by `vol`
pub fn render_noise<R: Rng + ?Sized>(
    color: NoiseColor,
    dur: f64,
    vol: f64,
    adsr: &Adsr,
    sample_rate: u32,
    rng: &mut R,
) -> Vec<f32> {
    let rate = f64::from(sample_rate);
    let mut filter = NoiseFilter::new(color);
    (0..buffer_len(dur, sample_rate))
        .map(|i| {
            let t = i as f64 / rate;
            let sample = filter.next(white(rng)) * vol * envelope_gain(adsr, t, dur);
            sample as f32
        })
        .collect()
}
