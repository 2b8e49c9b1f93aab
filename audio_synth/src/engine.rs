//! The eight-channel mixer.

use crate::envelope::{envelope_gain, resolve};
use crate::noise::{render_noise, NoiseColor};
use crate::notes::note_frequency;
use crate::sound::{SampleBuffer, MAX_SOUND_SECONDS};
use crate::waveform::{Oscillator, Waveform};
use game_types::{Adsr, Command, NoiseCmd, SampleCmd, ToneCmd};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use tracing::debug;

pub const CHANNELS: usize = 8;
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Channel used by `sample` when none is given
pub const SAMPLE_CHANNEL: usize = 6;

const TONE_VOLUME: f64 = 0.5;
const TONE_SECONDS: f64 = 0.2;
const TONE_FREQUENCY: f64 = 440.0;
const NOISE_VOLUME: f64 = 0.3;
const NOISE_SECONDS: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceKind {
    Tone,
    Noise,
    Sample,
}

#[derive(Debug, Clone)]
enum Source {
    Tone {
        osc: Oscillator,
        vol: f64,
        adsr: Adsr,
        dur: f64,
    },
    Buffer {
        buffer: SampleBuffer,
        pos: f64,
        step: f64,
        gain: f64,
        looping: bool,
    },
}

/// The sound occupying one channel
#[derive(Debug, Clone)]
pub struct Voice {
    kind: VoiceKind,
    sample_id: Option<String>,
    source: Source,
    elapsed: u64,
}

impl Voice {
    pub fn kind(&self) -> VoiceKind {
        self.kind
    }

    /// Id of the playing sample, for sample voices
    pub fn sample_id(&self) -> Option<&str> {
        self.sample_id.as_deref()
    }

    /// Next output sample, or `None` once the sound has finished
    fn next(&mut self, rate: f64) -> Option<f64> {
        let t = self.elapsed as f64 / rate;
        self.elapsed += 1;
        match &mut self.source {
            Source::Tone { osc, vol, adsr, dur } => {
                if t >= *dur {
                    return None;
                }
                Some(osc.next(t, rate) * *vol * envelope_gain(adsr, t, *dur))
            }
            Source::Buffer {
                buffer,
                pos,
                step,
                gain,
                looping,
            } => {
                if buffer.is_empty() {
                    return None;
                }
                let len = buffer.len() as f64;
                if *pos >= len {
                    if !*looping {
                        return None;
                    }
                    *pos = pos.rem_euclid(len);
                }
                let value = interpolate(buffer.data(), *pos);
                *pos += *step;
                Some(value * *gain)
            }
        }
    }
}

fn interpolate(data: &[f32], pos: f64) -> f64 {
    let i = pos.floor() as usize;
    let frac = pos - pos.floor();
    let a = data.get(i).copied().unwrap_or(0.0) as f64;
    let b = data.get(i + 1).copied().unwrap_or(0.0) as f64;
    a + (b - a) * frac
}

/// Channel table, sample table and master gain of one session
///
/// Starting a sound on a channel replaces whatever was there; nothing of the
/// old voice reaches the next rendered sample. Channel numbers outside
/// `0..8` are ignored.
#[derive(Debug)]
pub struct AudioEngine {
    sample_rate: u32,
    rng: StdRng,
    channels: [Option<Voice>; CHANNELS],
    master: f64,
    samples: HashMap<String, SampleBuffer>,
}

impl Default for AudioEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE, 0)
    }
}

impl AudioEngine {
    /// Creates a silent engine; `seed` drives every noise source
    pub fn new(sample_rate: u32, seed: u64) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            rng: StdRng::seed_from_u64(seed),
            channels: Default::default(),
            master: 1.0,
            samples: HashMap::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn master_volume(&self) -> f64 {
        self.master
    }

    /// Registers a decoded buffer under `id`, replacing any previous one
    pub fn load_sample(&mut self, id: impl Into<String>, buffer: SampleBuffer) {
        self.samples.insert(id.into(), buffer);
    }

    pub fn has_sample(&self, id: &str) -> bool {
        self.samples.contains_key(id)
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Drops every registered sample and silences the channels playing one
    pub fn clear_samples(&mut self) {
        self.samples.clear();
        for channel in &mut self.channels {
            if channel.as_ref().is_some_and(|v| v.kind() == VoiceKind::Sample) {
                *channel = None;
            }
        }
    }

    pub fn voice(&self, ch: usize) -> Option<&Voice> {
        self.channels.get(ch).and_then(Option::as_ref)
    }

    pub fn is_active(&self, ch: usize) -> bool {
        self.voice(ch).is_some()
    }

    pub fn active_channels(&self) -> usize {
        self.channels.iter().filter(|c| c.is_some()).count()
    }

    /// Applies the audio commands of a frame in order; returns how many
    /// were audio commands
    pub fn process(&mut self, commands: &[Command]) -> usize {
        commands.iter().filter(|cmd| self.apply(cmd)).count()
    }

    /// Applies one command; non-audio commands are ignored and return false
    pub fn apply(&mut self, command: &Command) -> bool {
        match command {
            Command::Tone(cmd) => self.play_tone(cmd),
            Command::Noise(cmd) => self.play_noise(cmd),
            Command::Sample(cmd) => self.play_sample(cmd),
            Command::Stop(cmd) => self.stop(cmd.ch),
            Command::StopAll => self.stop_all(),
            Command::Volume(cmd) => self.set_master_volume(cmd.value),
            _ => return false,
        }
        true
    }

    pub fn play_tone(&mut self, cmd: &ToneCmd) {
        let Some(ch) = channel_index(cmd.ch, 0) else {
            return;
        };
        let freq = cmd
            .freq
            .filter(|f| f.is_finite() && *f > 0.0)
            .or_else(|| cmd.note.as_deref().and_then(note_frequency))
            .unwrap_or(TONE_FREQUENCY);
        let wave = match cmd.wave.as_deref() {
            None => Waveform::Square,
            Some(name) => Waveform::parse(name).unwrap_or(Waveform::Sine),
        };
        let dur = duration(cmd.dur, TONE_SECONDS);
        let mut osc = Oscillator::new(wave, freq);
        if let Some(to) = cmd.sweep.filter(|f| f.is_finite() && *f != 0.0) {
            osc = osc.with_sweep(to, dur);
        }

        self.start(
            ch,
            VoiceKind::Tone,
            None,
            Source::Tone {
                osc,
                vol: volume(cmd.vol, TONE_VOLUME),
                adsr: resolve(cmd.env.as_ref()),
                dur,
            },
        );
    }

    pub fn play_noise(&mut self, cmd: &NoiseCmd) {
        let Some(ch) = channel_index(cmd.ch, 0) else {
            return;
        };
        let color = NoiseColor::parse(cmd.color.as_deref());
        let dur = duration(cmd.dur, NOISE_SECONDS);
        let data = render_noise(
            color,
            dur,
            volume(cmd.vol, NOISE_VOLUME),
            &resolve(cmd.env.as_ref()),
            self.sample_rate,
            &mut self.rng,
        );
        let buffer = SampleBuffer::new(data, f64::from(self.sample_rate));
        let source = buffer_source(buffer, 1.0, 1.0, false, self.sample_rate);
        self.start(ch, VoiceKind::Noise, None, source);
    }

    /// Plays a loaded sample; unknown ids are ignored without touching the
    /// channel
    pub fn play_sample(&mut self, cmd: &SampleCmd) {
        let Some(buffer) = self.samples.get(&cmd.id).cloned() else {
            debug!(sample = %cmd.id, "sample not loaded, ignored");
            return;
        };
        let Some(ch) = channel_index(cmd.ch, SAMPLE_CHANNEL) else {
            return;
        };
        let rate = cmd.rate.filter(|r| r.is_finite() && *r > 0.0).unwrap_or(1.0);
        let source = buffer_source(
            buffer,
            rate,
            volume(cmd.vol, 1.0),
            cmd.looping.unwrap_or(false),
            self.sample_rate,
        );
        self.start(ch, VoiceKind::Sample, Some(cmd.id.clone()), source);
    }

    /// Silences one channel; no channel or a silent one is a no-op
    pub fn stop(&mut self, ch: Option<i64>) {
        let Some(ch) = ch else { return };
        if let Some(ch) = channel_index(Some(ch), 0) {
            self.channels[ch] = None;
        }
    }

    pub fn stop_all(&mut self) {
        self.channels.iter_mut().for_each(|c| *c = None);
    }

    /// Sets the master gain; negative values mute and non-finite ones are
    /// ignored
    pub fn set_master_volume(&mut self, value: f64) {
        if value.is_finite() {
            self.master = value.max(0.0);
        }
    }

    /// Mixes all channels into `out`, one mono sample per slot
    ///
    /// Voices that finish during the block free their channel.
    pub fn render(&mut self, out: &mut [f32]) {
        let rate = f64::from(self.sample_rate);
        for slot in out.iter_mut() {
            let mut mix = 0.0;
            for channel in self.channels.iter_mut() {
                if let Some(voice) = channel {
                    match voice.next(rate) {
                        Some(value) => mix += value,
                        None => *channel = None,
                    }
                }
            }
            *slot = (mix * self.master).clamp(-1.0, 1.0) as f32;
        }
    }

    /// Renders `frames` samples into a new buffer
    pub fn render_frames(&mut self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        self.render(&mut out);
        out
    }

    fn start(&mut self, ch: usize, kind: VoiceKind, sample_id: Option<String>, source: Source) {
        self.channels[ch] = Some(Voice {
            kind,
            sample_id,
            source,
            elapsed: 0,
        });
    }
}

fn buffer_source(
    buffer: SampleBuffer,
    rate: f64,
    gain: f64,
    looping: bool,
    output_rate: u32,
) -> Source {
    let step = buffer.rate() * rate / f64::from(output_rate);
    Source::Buffer {
        buffer,
        pos: 0.0,
        step,
        gain,
        looping,
    }
}

fn channel_index(ch: Option<i64>, default: usize) -> Option<usize> {
    let Some(ch) = ch else {
        return Some(default);
    };
    match usize::try_from(ch) {
        Ok(ch) if ch < CHANNELS => Some(ch),
        _ => {
            debug!(channel = ch, "audio channel out of range, ignored");
            None
        }
    }
}

fn duration(dur: Option<f64>, default: f64) -> f64 {
    dur.filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(default)
        .min(MAX_SOUND_SECONDS)
}

fn volume(vol: Option<f64>, default: f64) -> f64 {
    vol.filter(|v| v.is_finite()).unwrap_or(default).max(0.0)
}
