//! Periodic oscillators.

use std::f64::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// Parses a wave name; unknown names are `None`
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "sine" => Some(Waveform::Sine),
            "square" => Some(Waveform::Square),
            "sawtooth" => Some(Waveform::Sawtooth),
            "triangle" => Some(Waveform::Triangle),
            _ => None,
        }
    }

    /// Value in `[-1, 1]` at `phase` cycles (only the fractional part matters)
    pub fn sample(self, phase: f64) -> f64 {
        let p = phase.rem_euclid(1.0);
        match self {
            Waveform::Sine => (TAU * p).sin(),
            Waveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => p * 2.0 - 1.0,
            Waveform::Triangle => (p * 4.0 - 2.0).abs() - 1.0,
        }
    }
}

/// Phase accumulator with an optional linear frequency sweep
#[derive(Debug, Clone)]
pub struct Oscillator {
    wave: Waveform,
    from: f64,
    to: f64,
    dur: f64,
    phase: f64,
}

impl Oscillator {
    pub fn new(wave: Waveform, freq: f64) -> Self {
        Self {
            wave,
            from: freq,
            to: freq,
            dur: 0.0,
            phase: 0.0,
        }
    }

    /// Glides linearly from the start frequency to `to` over `dur` seconds
    pub fn with_sweep(mut self, to: f64, dur: f64) -> Self {
        self.to = to;
        self.dur = dur;
        self
    }

    pub fn wave(&self) -> Waveform {
        self.wave
    }

    /// Frequency at time `t`; holds the target once the sweep is over
    pub fn frequency_at(&self, t: f64) -> f64 {
        if t >= self.dur {
            return self.to;
        }
        self.from + (self.to - self.from) * (t / self.dur)
    }

    /// Current value, then advances one sample of `1 / sample_rate` seconds
    pub fn next(&mut self, t: f64, sample_rate: f64) -> f64 {
        let value = self.wave.sample(self.phase);
        self.phase = (self.phase + self.frequency_at(t) / sample_rate).rem_euclid(1.0);
        value
    }
}
