//! # Command Protocol
//!
//! The flat, tagged instruction stream a guest returns from `update`.
//!
//! Every command is a table with an `op` discriminant. Draw commands go to the
//! paint interpreter, audio commands to the synthesizer, and meta commands to
//! the frame orchestrator. Tags this host does not know decode to
//! [`Command::Unknown`] and are ignored downstream.

use crate::manifest::EnvelopeSpec;
use crate::plain::{list_or_empty, opt_whole_i64, text_value};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One instruction returned by a guest frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Command {
    // Draw
    Clear(ClearCmd),
    Rect(RectCmd),
    Circle(CircleCmd),
    Line(LineCmd),
    Poly(PolyCmd),
    Arc(ArcCmd),
    Text(TextCmd),
    Img(ImageCmd),
    Path(PathCmd),
    Save,
    Restore,
    Translate(TranslateCmd),
    Rotate(RotateCmd),
    Scale(ScaleCmd),
    Alpha(AlphaCmd),
    Clip(ClipCmd),

    // Audio
    Tone(ToneCmd),
    Noise(NoiseCmd),
    Sample(SampleCmd),
    Stop(StopCmd),
    StopAll,
    Volume(VolumeCmd),

    // Meta
    Score(ScoreCmd),
    GameOver,

    /// Any tag this protocol version does not define
    #[serde(other)]
    Unknown,
}

/// Which consumer a command belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandClass {
    Draw,
    Audio,
    Meta,
    Unknown,
}

impl Command {
    /// Returns the consumer class of this command
    pub fn class(&self) -> CommandClass {
        match self {
            Command::Clear(_)
            | Command::Rect(_)
            | Command::Circle(_)
            | Command::Line(_)
            | Command::Poly(_)
            | Command::Arc(_)
            | Command::Text(_)
            | Command::Img(_)
            | Command::Path(_)
            | Command::Save
            | Command::Restore
            | Command::Translate(_)
            | Command::Rotate(_)
            | Command::Scale(_)
            | Command::Alpha(_)
            | Command::Clip(_) => CommandClass::Draw,
            Command::Tone(_)
            | Command::Noise(_)
            | Command::Sample(_)
            | Command::Stop(_)
            | Command::StopAll
            | Command::Volume(_) => CommandClass::Audio,
            Command::Score(_) | Command::GameOver => CommandClass::Meta,
            Command::Unknown => CommandClass::Unknown,
        }
    }

    /// Builds the in-band diagnostic shown when a frame fails
    pub fn diagnostic(message: impl AsRef<str>) -> Self {
        Command::Text(TextCmd {
            x: 10.0,
            y: 200.0,
            text: format!("ERROR: {}", message.as_ref()),
            fill: Some("#f44".to_string()),
            font: Some("14px monospace".to_string()),
            ..TextCmd::default()
        })
    }

    /// Returns true if this is the diagnostic text produced by [`Command::diagnostic`]
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Command::Text(t) if t.text.starts_with("ERROR: "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearCmd {
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RectCmd {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub line_width: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CircleCmd {
    pub x: f64,
    pub y: f64,
    pub r: f64,
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub line_width: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LineCmd {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub color: Option<String>,
    pub line_width: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolyCmd {
    #[serde(deserialize_with = "list_or_empty")]
    pub points: Vec<[f64; 2]>,
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub close: Option<bool>,
    pub line_width: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArcCmd {
    pub x: f64,
    pub y: f64,
    pub r: f64,
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub line_width: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextCmd {
    pub x: f64,
    pub y: f64,
    #[serde(deserialize_with = "text_value")]
    pub text: String,
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub font: Option<String>,
    pub align: Option<String>,
    pub baseline: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageCmd {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub w: Option<f64>,
    pub h: Option<f64>,
    pub sx: Option<f64>,
    pub sy: Option<f64>,
    pub sw: Option<f64>,
    pub sh: Option<f64>,
    pub rotate: Option<f64>,
    pub alpha: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PathCmd {
    #[serde(deserialize_with = "list_or_empty")]
    pub d: Vec<PathStep>,
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub line_width: Option<f64>,
}

/// One step of a `path` command, written as `["moveTo", x, y]` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Value>", into = "Vec<Value>")]
pub enum PathStep {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    BezierTo(f64, f64, f64, f64, f64, f64),
    QuadTo(f64, f64, f64, f64),
    Close,
    /// A step name this protocol version does not define (skipped)
    Unknown(String),
}

impl TryFrom<Vec<Value>> for PathStep {
    type Error = String;

    fn try_from(step: Vec<Value>) -> Result<Self, Self::Error> {
        let (name, args) = step
            .split_first()
            .ok_or_else(|| "empty path step".to_string())?;
        let name = name
            .as_str()
            .ok_or_else(|| "path step must start with its name".to_string())?;

        let numbers = |count: usize| -> Result<Vec<f64>, String> {
            if args.len() < count {
                return Err(format!("{name} expects {count} numbers"));
            }
            args[..count]
                .iter()
                .map(|v| {
                    v.as_f64()
                        .ok_or_else(|| format!("{name} arguments must be numbers"))
                })
                .collect()
        };

        Ok(match name {
            "moveTo" => {
                let n = numbers(2)?;
                PathStep::MoveTo(n[0], n[1])
            }
            "lineTo" => {
                let n = numbers(2)?;
                PathStep::LineTo(n[0], n[1])
            }
            "bezierTo" => {
                let n = numbers(6)?;
                PathStep::BezierTo(n[0], n[1], n[2], n[3], n[4], n[5])
            }
            "quadTo" => {
                let n = numbers(4)?;
                PathStep::QuadTo(n[0], n[1], n[2], n[3])
            }
            "close" => PathStep::Close,
            other => PathStep::Unknown(other.to_string()),
        })
    }
}

impl From<PathStep> for Vec<Value> {
    fn from(step: PathStep) -> Self {
        let named = |name: &str, args: &[f64]| {
            std::iter::once(Value::from(name))
                .chain(args.iter().map(|&a| Value::from(a)))
                .collect()
        };
        match step {
            PathStep::MoveTo(x, y) => named("moveTo", &[x, y]),
            PathStep::LineTo(x, y) => named("lineTo", &[x, y]),
            PathStep::BezierTo(a, b, c, d, e, f) => named("bezierTo", &[a, b, c, d, e, f]),
            PathStep::QuadTo(a, b, c, d) => named("quadTo", &[a, b, c, d]),
            PathStep::Close => named("close", &[]),
            PathStep::Unknown(name) => named(&name, &[]),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateCmd {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotateCmd {
    pub angle: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleCmd {
    pub x: f64,
    pub y: f64,
}

impl Default for ScaleCmd {
    fn default() -> Self {
        Self { x: 1.0, y: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlphaCmd {
    pub value: f64,
}

impl Default for AlphaCmd {
    fn default() -> Self {
        Self { value: 1.0 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipCmd {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneCmd {
    #[serde(deserialize_with = "opt_whole_i64")]
    pub ch: Option<i64>,
    pub wave: Option<String>,
    pub freq: Option<f64>,
    pub note: Option<String>,
    pub vol: Option<f64>,
    pub dur: Option<f64>,
    /// Target frequency reached linearly at the end of the tone
    pub sweep: Option<f64>,
    pub env: Option<EnvelopeSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseCmd {
    #[serde(deserialize_with = "opt_whole_i64")]
    pub ch: Option<i64>,
    pub vol: Option<f64>,
    pub dur: Option<f64>,
    /// `white`, `pink` or `brown`
    #[serde(rename = "type")]
    pub color: Option<String>,
    pub env: Option<EnvelopeSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleCmd {
    pub id: String,
    #[serde(deserialize_with = "opt_whole_i64")]
    pub ch: Option<i64>,
    pub vol: Option<f64>,
    pub rate: Option<f64>,
    #[serde(rename = "loop")]
    pub looping: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopCmd {
    #[serde(deserialize_with = "opt_whole_i64")]
    pub ch: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeCmd {
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCmd {
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(v: Value) -> Command {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_unit_commands_ignore_extra_fields() {
        assert_eq!(decode(json!({"op": "save", "note": "x"})), Command::Save);
        assert_eq!(decode(json!({"op": "stopAll"})), Command::StopAll);
        assert_eq!(decode(json!({"op": "gameOver"})), Command::GameOver);
    }

    #[test]
    fn test_unknown_op_is_tolerated() {
        assert_eq!(decode(json!({"op": "sparkle", "x": 1})), Command::Unknown);
        assert_eq!(Command::Unknown.class(), CommandClass::Unknown);
    }

    #[test]
    fn test_rect_fields_are_camel_case() {
        let cmd = decode(json!({"op": "rect", "x": 1, "y": 2, "w": 3, "h": 4, "lineWidth": 2, "stroke": "#fff"}));
        match cmd {
            Command::Rect(r) => {
                assert_eq!((r.x, r.y, r.w, r.h), (1.0, 2.0, 3.0, 4.0));
                assert_eq!(r.line_width, Some(2.0));
                assert_eq!(r.stroke.as_deref(), Some("#fff"));
                assert_eq!(r.fill, None);
            }
            other => panic!("expected rect, got {other:?}"),
        }
    }

    #[test]
    fn test_text_accepts_numbers() {
        match decode(json!({"op": "text", "text": 42})) {
            Command::Text(t) => assert_eq!(t.text, "42"),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn test_path_steps() {
        let cmd = decode(json!({
            "op": "path",
            "d": [["moveTo", 0, 0], ["quadTo", 1, 2, 3, 4], ["spiral", 9], ["close"]],
            "fill": "#0f0"
        }));
        match cmd {
            Command::Path(p) => assert_eq!(
                p.d,
                vec![
                    PathStep::MoveTo(0.0, 0.0),
                    PathStep::QuadTo(1.0, 2.0, 3.0, 4.0),
                    PathStep::Unknown("spiral".to_string()),
                    PathStep::Close,
                ]
            ),
            other => panic!("expected path, got {other:?}"),
        }

        let bad: Result<Command, _> =
            serde_json::from_value(json!({"op": "path", "d": [["lineTo", 1]]}));
        assert!(bad.is_err());
    }

    #[test]
    fn test_scale_and_alpha_defaults() {
        assert_eq!(decode(json!({"op": "scale"})), Command::Scale(ScaleCmd { x: 1.0, y: 1.0 }));
        assert_eq!(decode(json!({"op": "alpha"})), Command::Alpha(AlphaCmd { value: 1.0 }));
    }

    #[test]
    fn test_audio_fields() {
        match decode(json!({"op": "noise", "ch": 4.0, "type": "pink", "env": "fade"})) {
            Command::Noise(n) => {
                assert_eq!(n.ch, Some(4));
                assert_eq!(n.color.as_deref(), Some("pink"));
                assert_eq!(n.env, Some(EnvelopeSpec::Preset("fade".to_string())));
            }
            other => panic!("expected noise, got {other:?}"),
        }
        match decode(json!({"op": "sample", "id": "laser", "loop": true})) {
            Command::Sample(s) => assert_eq!(s.looping, Some(true)),
            other => panic!("expected sample, got {other:?}"),
        }
    }

    #[test]
    fn test_meta_requires_value() {
        assert!(serde_json::from_value::<Command>(json!({"op": "score"})).is_err());
        assert_eq!(
            decode(json!({"op": "score", "value": 50})),
            Command::Score(ScoreCmd { value: 50.0 })
        );
    }

    #[test]
    fn test_classes() {
        assert_eq!(decode(json!({"op": "clip"})).class(), CommandClass::Draw);
        assert_eq!(decode(json!({"op": "volume", "value": 0.5})).class(), CommandClass::Audio);
        assert_eq!(Command::GameOver.class(), CommandClass::Meta);
    }

    #[test]
    fn test_diagnostic_shape() {
        let diag = Command::diagnostic("boom");
        assert!(diag.is_diagnostic());
        let wire = serde_json::to_value(&diag).unwrap();
        assert_eq!(wire["op"], "text");
        assert_eq!(wire["text"], "ERROR: boom");
        assert_eq!(wire["fill"], "#f44");
        assert_eq!(wire["x"], 10.0);
        assert_eq!(wire["y"], 200.0);
    }
}
