//! Audio Channel Tests
//!
//! Channel discipline and idempotent stops, driven by guest commands.

use audio_synth::{AudioEngine, VoiceKind, CHANNELS};
use game_types::{decode_commands, Command};
use gamehostd::GameSession;
use resources::SandboxLimits;
use serde_json::json;
use tests_resilience::{guest, loaded, step};

fn commands(value: serde_json::Value) -> Vec<Command> {
    decode_commands(value, 100).unwrap()
}

/// Test: a new sound on a busy channel replaces the old one
#[test]
fn test_channel_preemption() {
    let mut engine = AudioEngine::default();
    engine.process(&commands(json!([
        {"op": "tone", "ch": 2, "freq": 440, "dur": 2},
        {"op": "noise", "ch": 2, "dur": 2}
    ])));
    assert_eq!(engine.active_channels(), 1);
    assert_eq!(engine.voice(2).map(|v| v.kind()), Some(VoiceKind::Noise));
}

/// Test: preemption also holds across frames of a live session
#[test]
fn test_preemption_across_frames() {
    let source = guest(
        "n = (n or 0) + 1 \
         if n == 1 then return { { op = 'tone', ch = 0, freq = 220, dur = 3 } } end \
         return { { op = 'noise', ch = 0, dur = 3, color = 'pink' } }",
    );
    let mut session = GameSession::new(source, SandboxLimits::default());
    session.start().unwrap();
    session.frame(0.016).unwrap();
    assert_eq!(session.audio().voice(0).map(|v| v.kind()), Some(VoiceKind::Tone));
    session.frame(0.016).unwrap();
    assert_eq!(session.audio().voice(0).map(|v| v.kind()), Some(VoiceKind::Noise));
    assert_eq!(session.audio().active_channels(), 1);
}

/// Test: stopping silence is a no-op, repeatedly
#[test]
fn test_stops_are_idempotent() {
    let mut engine = AudioEngine::default();
    engine.process(&commands(json!([
        {"op": "stop", "ch": 3},
        {"op": "stopAll"},
        {"op": "stopAll"}
    ])));
    assert_eq!(engine.active_channels(), 0);

    engine.process(&commands(json!([
        {"op": "tone", "ch": 1, "dur": 1},
        {"op": "tone", "ch": 5, "dur": 1},
        {"op": "stop", "ch": 1},
        {"op": "stop", "ch": 1}
    ])));
    assert_eq!(engine.active_channels(), 1);
    assert!(engine.is_active(5));

    engine.stop_all();
    engine.stop_all();
    assert_eq!(engine.active_channels(), 0);
    assert!(engine.render_frames(64).iter().all(|s| *s == 0.0));
}

/// Test: every channel can hold its own sound, and no more than that
#[test]
fn test_all_channels_independent() {
    let mut engine = AudioEngine::default();
    let tones: Vec<_> = (0..CHANNELS as i64 + 2)
        .map(|ch| json!({"op": "tone", "ch": ch, "freq": 100 + ch * 50, "dur": 1}))
        .collect();
    engine.process(&commands(json!(tones)));
    assert_eq!(engine.active_channels(), CHANNELS);
}

/// Test: a finished voice frees its channel
#[test]
fn test_voice_ends_after_duration() {
    let mut engine = AudioEngine::new(1_000, 0);
    engine.process(&commands(json!([{"op": "tone", "ch": 0, "dur": 0.05}])));
    assert!(engine.is_active(0));
    engine.render_frames(100);
    assert!(!engine.is_active(0));
}

/// Test: mixed output never leaves [-1, 1], even when everything plays loud
#[test]
fn test_mix_is_clamped() {
    let mut engine = AudioEngine::default();
    let loud: Vec<_> = (0..CHANNELS as i64)
        .map(|ch| json!({"op": "tone", "ch": ch, "wave": "square", "freq": 110, "vol": 1, "dur": 1}))
        .collect();
    engine.process(&commands(json!(loud)));
    engine.process(&commands(json!([{"op": "volume", "value": 4}])));
    let out = engine.render_frames(2_048);
    assert!(out.iter().all(|s| (-1.0..=1.0).contains(s)));
    assert!(out.iter().any(|s| s.abs() == 1.0));
}

/// Test: disposing a host twice is harmless
#[test]
fn test_dispose_twice() {
    let mut host = loaded(&guest("return { { op = 'stopAll' } }"));
    assert!(step(&mut host).is_ok());
    host.dispose();
    host.dispose();
    assert!(step(&mut host).is_err());
}
