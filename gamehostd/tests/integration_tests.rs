//! End-to-end runs of the orchestrator from files on disk.

use gamehostd::{
    render_preview, GameSession, HostRuntime, HostRuntimeConfig, InputScript, SessionState,
};
use resources::SandboxLimits;
use std::fs;
use tempfile::TempDir;

const PADDLE: &str = r##"
function metadata()
    return { title = "Paddle", width = 200, height = 150, controls = { "left/right: move" } }
end

function resources()
    return {
        images = {
            dot = { type = "pixels", w = 2, h = 2, data = { "#f00", "#f00", "#f00", "#f00" } },
        },
        sounds = {
            hit = { type = "generate", wave = "square", notes = { "E5" }, dur = 0.08 },
        },
    }
end

local x = 90
local score = 0

function update(dt, input)
    if input.left then x = x - 200 * dt end
    if input.right then x = x + 200 * dt end
    local cmds = {
        { op = "clear", color = "#111" },
        { op = "rect", x = x, y = 140, w = 20, h = 5, fill = "#fff" },
        { op = "img", id = "dot", x = 0, y = 0, w = 10, h = 10 },
    }
    if input.pointerPressed then
        score = score + 10
        cmds[#cmds + 1] = { op = "sample", id = "hit" }
    end
    cmds[#cmds + 1] = { op = "score", value = score }
    if score >= 30 then cmds[#cmds + 1] = { op = "gameOver" } end
    return cmds
end
"##;

fn write(dir: &TempDir, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

// ============================================================================
// Scripted runs
// ============================================================================

#[test]
fn test_scripted_run_to_game_over_with_snapshot() {
    let dir = TempDir::new().unwrap();
    let script = write(
        &dir,
        "play.keys",
        "# three clicks end the game\n\
         pointer down 10 10\nframes 1\npointer up\nframes 1\n\
         pointer down 20 20\nframes 1\npointer up\nframes 1\n\
         pointer down 30 30\nframes 1\npointer up\nframes 100\n",
    );
    let snapshot = dir.path().join("last.png");
    let config = HostRuntimeConfig {
        script: Some(script),
        snapshot: Some(snapshot.clone()),
        ..HostRuntimeConfig::default()
    };

    let summary = HostRuntime::new(PADDLE, config).unwrap().run().unwrap();
    assert_eq!(summary.state, SessionState::Ended);
    assert_eq!(summary.frames, 5);
    assert_eq!(summary.score, 30.0);
    assert_eq!(summary.display, "GAME OVER - SCORE: 30");
    assert_eq!(summary.asset_failures, 0);
    assert!(summary.audio_peak > 0.0);

    let image = image::open(&snapshot).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (200, 150));
    assert_eq!(image.get_pixel(5, 5).0, [255, 0, 0, 255]);
    assert_eq!(image.get_pixel(100, 50).0, [0x11, 0x11, 0x11, 255]);
}

#[test]
fn test_held_button_moves_paddle() {
    let script = InputScript::from_text("press right\nframes 30").unwrap();
    let config = HostRuntimeConfig {
        frame_dt: 0.05,
        ..HostRuntimeConfig::default()
    };
    let mut runtime = HostRuntime::new(PADDLE, config).unwrap().with_script(script);
    runtime.run().unwrap();

    // 30 frames at 200 px/s * 0.05 s moves the paddle 300 px, off the right edge
    let canvas = runtime.session().canvas();
    assert_eq!(canvas.pixel(95, 142).r, 0x11);
}

#[test]
fn test_config_file_limits_apply() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "host.json", r#"{ "maxFrames": 4, "frameCap": 0.01 }"#);
    let config = HostRuntimeConfig::from_file(&path).unwrap();
    assert_eq!(config.max_frames, 4);

    let summary = HostRuntime::new(PADDLE, config).unwrap().run().unwrap();
    assert_eq!(summary.frames, 4);
    assert_eq!(summary.state, SessionState::Running);
}

// ============================================================================
// Failure paths
// ============================================================================

#[test]
fn test_failed_load_snapshot_shows_error_screen() {
    let dir = TempDir::new().unwrap();
    let snapshot = dir.path().join("error.png");
    let config = HostRuntimeConfig {
        snapshot: Some(snapshot.clone()),
        ..HostRuntimeConfig::default()
    };
    let source = "function metadata() return { title = 'No update' } end\nfunction resources() return {} end";

    let summary = HostRuntime::new(source, config).unwrap().run().unwrap();
    match &summary.state {
        SessionState::Failed(reason) => assert!(reason.contains("update")),
        other => panic!("expected failure, got {other}"),
    }
    let image = image::open(&snapshot).unwrap().to_rgba8();
    assert_eq!(image.get_pixel(0, 0).0, [0x22, 0, 0, 255]);
}

#[test]
fn test_memory_breach_fails_session_not_process() {
    let source = r#"
        function metadata() return { title = "Hog" } end
        function resources() return {} end
        function update()
            local t = {}
            for i = 1, 1e9 do t[i] = string.rep("x", 1024) .. i end
            return {}
        end
    "#;
    let mut session = GameSession::new(source, SandboxLimits::default());
    session.start().unwrap();
    assert!(session.frame(0.016).is_err());
    assert!(matches!(session.state(), SessionState::Failed(_)));
    assert_eq!(session.audio().active_channels(), 0);
}

#[test]
fn test_bad_resource_is_omitted_not_fatal() {
    let source = r##"
        function metadata() return { title = "Partial" } end
        function resources()
            return { images = { bad = { type = "mystery" }, ok = { type = "hex", w = 1, h = 1, palette = { "#000", "#fff" }, rows = { "1" } } } }
        end
        function update() return { { op = "img", id = "bad", x = 0, y = 0 }, { op = "img", id = "ok", x = 0, y = 0 } } end
    "##;
    let mut session = GameSession::new(source, SandboxLimits::default());
    session.start().unwrap();
    assert_eq!(session.asset_failures(), 1);
    let report = session.frame(0.016).unwrap();
    assert_eq!(report.draw.executed + report.draw.skipped, 2);
    assert_eq!(session.canvas().pixel(0, 0).r, 255);
}

// ============================================================================
// Preview isolation
// ============================================================================

#[test]
fn test_preview_does_not_touch_live_session() {
    let mut live = GameSession::new(PADDLE, SandboxLimits::default());
    live.start().unwrap();
    live.frame(0.016).unwrap();
    let before = live.host().update_calls();

    let preview = render_preview(PADDLE, SandboxLimits::default(), 3).unwrap();
    assert_eq!(preview.dimensions(), (200, 150));
    assert_eq!(live.host().update_calls(), before);
    assert_eq!(live.state(), &SessionState::Running);
}
