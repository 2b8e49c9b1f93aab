//! Sample buffers and offline synthesis of manifest sounds.

use crate::envelope::envelope_gain;
use crate::noise::white;
use crate::notes::note_frequency;
use crate::waveform::{Oscillator, Waveform};
use game_types::{Adsr, RawSample, SoundDescriptor, SynthSound};
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;

/// Rate at which `generate` sounds are rendered
pub const SYNTH_RATE: u32 = 44_100;
pub const DEFAULT_PCM_RATE: f64 = 22_050.0;
pub const DEFAULT_SYNTH_SECONDS: f64 = 0.5;
/// Upper bound on any rendered or played duration
pub const MAX_SOUND_SECONDS: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SoundError {
    #[error("unsupported sound type")]
    UnsupportedType,
    #[error("sample {index} is not a finite number")]
    NonFiniteSample { index: usize },
    #[error("sample buffer is empty")]
    Empty,
}

/// Immutable mono PCM shared between the sample table and playing voices
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    data: Arc<[f32]>,
    rate: f64,
}

impl SampleBuffer {
    pub fn new(data: Vec<f32>, rate: f64) -> Self {
        Self {
            data: data.into(),
            rate,
        }
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Length in seconds at the buffer's own rate
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.rate
    }
}

/// Turns one manifest sound into a playable buffer
pub fn decode_sound<R: Rng + ?Sized>(
    descriptor: &SoundDescriptor,
    rng: &mut R,
) -> Result<SampleBuffer, SoundError> {
    match descriptor {
        SoundDescriptor::Generate(sound) => Ok(synthesize(sound, rng)),
        SoundDescriptor::Pcm(raw) => from_pcm(raw),
        SoundDescriptor::Unknown => Err(SoundError::UnsupportedType),
    }
}

pub fn from_pcm(raw: &RawSample) -> Result<SampleBuffer, SoundError> {
    if raw.data.is_empty() {
        return Err(SoundError::Empty);
    }
    if let Some(index) = raw.data.iter().position(|s| !s.is_finite()) {
        return Err(SoundError::NonFiniteSample { index });
    }
    let rate = raw
        .rate
        .filter(|r| r.is_finite() && *r > 0.0)
        .unwrap_or(DEFAULT_PCM_RATE);
    Ok(SampleBuffer::new(raw.data.clone(), rate))
}

/// Renders a `generate` descriptor at [`SYNTH_RATE`]
///
/// `wave = "noise"` is raw white noise. A `notes` list plays each note as a
/// sine for an equal share of the duration. Otherwise one oscillator runs at
/// `sweep.from`, `freq` or `note` (440 Hz when none is usable), gliding to
/// `sweep.to`, shaped by `env` and scaled to half amplitude.
pub fn synthesize<R: Rng + ?Sized>(sound: &SynthSound, rng: &mut R) -> SampleBuffer {
    let dur = sound
        .dur
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(DEFAULT_SYNTH_SECONDS)
        .min(MAX_SOUND_SECONDS);
    let rate = f64::from(SYNTH_RATE);
    let len = (rate * dur).ceil() as usize;

    let data = if sound.wave.as_deref() == Some("noise") {
        (0..len).map(|_| white(rng) as f32).collect()
    } else if !sound.notes.is_empty() {
        render_notes(&sound.notes, dur, len)
    } else {
        render_voice(sound, dur, len)
    };
    SampleBuffer::new(data, rate)
}

fn render_notes(notes: &[String], dur: f64, len: usize) -> Vec<f32> {
    let rate = f64::from(SYNTH_RATE);
    let note_dur = dur / notes.len() as f64;
    let mut data = vec![0.0f32; len];
    for (n, note) in notes.iter().enumerate() {
        let freq = note_frequency(note).unwrap_or(440.0);
        let start = (n as f64 * note_dur * rate).floor() as usize;
        let end = (((n + 1) as f64 * note_dur * rate).floor() as usize).min(len);
        let mut osc = Oscillator::new(Waveform::Sine, freq);
        for sample in data.iter_mut().take(end).skip(start) {
            *sample = (osc.next(0.0, rate) * 0.5) as f32;
        }
    }
    data
}

fn render_voice(sound: &SynthSound, dur: f64, len: usize) -> Vec<f32> {
    let rate = f64::from(SYNTH_RATE);
    let wave = sound
        .wave
        .as_deref()
        .and_then(Waveform::parse)
        .unwrap_or(Waveform::Sine);
    let from = sound
        .sweep
        .map(|s| s.from)
        .or(sound.freq)
        .or_else(|| sound.note.as_deref().and_then(note_frequency))
        .filter(|f| f.is_finite() && *f > 0.0)
        .unwrap_or(440.0);
    let to = sound
        .sweep
        .map(|s| s.to)
        .filter(|f| f.is_finite())
        .unwrap_or(from);
    let adsr = sound
        .env
        .as_ref()
        .map(|e| e.resolve())
        .unwrap_or(Adsr::RESOURCE_DEFAULT);
    // the square wave is generated at half the height of the others
    let height = if wave == Waveform::Square { 0.5 } else { 1.0 };

    let mut osc = Oscillator::new(wave, from).with_sweep(to, dur);
    (0..len)
        .map(|i| {
            let t = i as f64 / rate;
            let value = osc.next(t, rate) * height * envelope_gain(&adsr, t, dur) * 0.5;
            value as f32
        })
        .collect()
}
