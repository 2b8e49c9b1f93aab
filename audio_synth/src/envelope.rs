//! ADSR amplitude shaping.

use game_types::{Adsr, EnvelopeSpec};

/// Resolves an optional command envelope; absent means `sharp`
pub fn resolve(env: Option<&EnvelopeSpec>) -> Adsr {
    env.map(EnvelopeSpec::resolve).unwrap_or(Adsr::SHARP)
}

/// Normalized gain (peak 1) at time `t` of a sound lasting `dur` seconds
///
/// Attack ramps 0 to 1 over `a`, decay ramps to the sustain level `s` by
/// `a + d`, the level holds at `s` until `dur - r`, then ramps to 0 at `dur`.
/// The release always starts from `s`, even when it begins before the decay
/// has finished. Outside `0..dur` the gain is 0.
pub fn envelope_gain(adsr: &Adsr, t: f64, dur: f64) -> f64 {
    if !(t >= 0.0 && t < dur) {
        return 0.0;
    }
    let a = adsr.a.max(0.0);
    let d = adsr.d.max(0.0);
    let r = adsr.r.max(0.0);
    let s = adsr.s.clamp(0.0, 1.0);

    let release_start = dur - r;
    if t >= release_start {
        return if r > 0.0 { s * (dur - t) / r } else { 0.0 };
    }
    if t < a {
        return t / a;
    }
    if t < a + d {
        return 1.0 - (1.0 - s) * (t - a) / d;
    }
    s
}
