//! # Audio Synth
//!
//! This crate realizes the audio commands of a guest frame on eight
//! exclusive channels.
//!
//! ## Philosophy
//!
//! - **One sound per channel**: Starting a sound hard-stops the previous
//!   occupant of its channel; there is no fade and no queue
//! - **Render, don't schedule**: The engine is a pull-based mixer;
//!   [`AudioEngine::render`] produces mono `f32` samples on demand, so tests
//!   can inspect exact output
//! - **Deterministic noise**: Every noise source draws from a seeded RNG
//!   owned by the engine
//!
//! ## Core Concepts
//!
//! - `AudioEngine`: Channel table, sample table and master gain
//! - `Oscillator`: Phase accumulator with an optional linear sweep
//! - `NoiseFilter`: White to pink or brown noise
//! - `SampleBuffer`: Shared PCM decoded from a manifest sound
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - An audio device driver (callers move rendered samples to hardware)
//! - A sequencer (timing comes from the frame loop)
//! - A stereo or effects processor

pub mod engine;
pub mod envelope;
pub mod noise;
pub mod notes;
pub mod sound;
pub mod waveform;

pub use engine::{AudioEngine, Voice, VoiceKind, CHANNELS, DEFAULT_SAMPLE_RATE, SAMPLE_CHANNEL};
pub use envelope::envelope_gain;
pub use noise::{render_noise, NoiseColor, NoiseFilter};
pub use notes::note_frequency;
pub use sound::{decode_sound, from_pcm, synthesize, SampleBuffer, SoundError, SYNTH_RATE};
pub use waveform::{Oscillator, Waveform};
