//! Sensor frames: wire format from the tracking middleware and the
//! normalised model the engine consumes.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub type Vec3 = [f64; 3];

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame line: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerKind {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl FingerKind {
    pub const ALL: [FingerKind; 5] = [
        FingerKind::Thumb,
        FingerKind::Index,
        FingerKind::Middle,
        FingerKind::Ring,
        FingerKind::Pinky,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thumb => "thumb",
            Self::Index => "index",
            Self::Middle => "middle",
            Self::Ring => "ring",
            Self::Pinky => "pinky",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Finger {
    pub kind: FingerKind,
    pub extended: bool,
    pub tip: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hand {
    pub id: i64,
    pub palm_position: Vec3,
    /// mm/s
    pub palm_velocity: Vec3,
    pub pinch: f64,
    pub grab: f64,
    /// Radians.
    pub roll: f64,
    pub pitch: f64,
    /// Always thumb, index, middle, ring, pinky.
    pub fingers: [Finger; 5],
}

impl Hand {
    pub fn finger(&self, kind: FingerKind) -> &Finger {
        &self.fingers[kind as usize]
    }

    pub fn index_finger(&self) -> &Finger {
        self.finger(FingerKind::Index)
    }

    pub fn extended(&self) -> impl Iterator<Item = &Finger> {
        self.fingers.iter().filter(|f| f.extended)
    }

    pub fn extended_count(&self) -> usize {
        self.extended().count()
    }

    pub fn palm_speed(&self) -> f64 {
        let [x, y, z] = self.palm_velocity;
        (x * x + y * y + z * z).sqrt()
    }
}

/// Millimetre box mapped onto the unit cube.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InteractionBox {
    pub x: (f64, f64),
    pub y: (f64, f64),
    pub z: (f64, f64),
}

impl Default for InteractionBox {
    fn default() -> Self {
        Self {
            x: (-120.0, 120.0),
            y: (0.0, 300.0),
            z: (-120.0, 120.0),
        }
    }
}

impl InteractionBox {
    pub fn normalize_point(&self, p: Vec3, clamp: bool) -> Vec3 {
        let axis = |v: f64, (lo, hi): (f64, f64)| {
            let span = if (hi - lo).abs() < f64::EPSILON {
                1.0
            } else {
                hi - lo
            };
            let n = (v - lo) / span;
            if clamp { n.clamp(0.0, 1.0) } else { n }
        };
        [axis(p[0], self.x), axis(p[1], self.y), axis(p[2], self.z)]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub id: Option<i64>,
    pub hands: Vec<Hand>,
    pub interaction_box: InteractionBox,
}

// ---------- wire format ----------

/// Numbers may come through as `null`; those read as zero.
type WireVec = Vec<Option<f64>>;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireFrame {
    frame_id: Option<i64>,
    #[serde(deserialize_with = "null_as_default")]
    hands: Vec<WireHand>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireHand {
    #[serde(deserialize_with = "null_as_default")]
    id: i64,
    #[serde(deserialize_with = "null_as_default")]
    palm_position: WireVec,
    #[serde(deserialize_with = "null_as_default")]
    palm_vel: WireVec,
    #[serde(deserialize_with = "null_as_default")]
    palm_quat: WireVec,
    grab: Option<f64>,
    pinch: Option<f64>,
    roll: Option<f64>,
    pitch: Option<f64>,
    #[serde(deserialize_with = "null_as_default")]
    fingers: HashMap<String, Option<WireVec>>,
    #[serde(deserialize_with = "null_as_default")]
    finger_extended: HashMap<String, Option<bool>>,
}

/// An explicit `null` gets the same treatment as a missing key.
fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

fn finite(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

fn component(v: &[Option<f64>], i: usize) -> f64 {
    v.get(i).copied().flatten().map_or(0.0, finite)
}

fn vec3(v: &[Option<f64>]) -> Option<Vec3> {
    (v.len() >= 3).then(|| [component(v, 0), component(v, 1), component(v, 2)])
}

/// (roll, pitch) from an `[x, y, z, w]` palm quaternion.
fn roll_pitch(q: &[Option<f64>]) -> (f64, f64) {
    if q.len() < 4 {
        return (0.0, 0.0);
    }
    let (x, y, z, w) = (component(q, 0), component(q, 1), component(q, 2), component(q, 3));
    let roll = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));
    let pitch = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));
    (roll, pitch)
}

impl From<WireHand> for Hand {
    fn from(raw: WireHand) -> Self {
        let palm = vec3(&raw.palm_position).unwrap_or_default();
        let fingers = FingerKind::ALL.map(|kind| Finger {
            kind,
            extended: raw
                .finger_extended
                .get(kind.as_str())
                .copied()
                .flatten()
                .unwrap_or(false),
            tip: raw
                .fingers
                .get(kind.as_str())
                .and_then(|v| v.as_deref())
                .and_then(vec3)
                .unwrap_or(palm),
        });
        let (q_roll, q_pitch) = roll_pitch(&raw.palm_quat);
        Hand {
            id: raw.id,
            palm_position: palm,
            palm_velocity: vec3(&raw.palm_vel).unwrap_or_default(),
            pinch: finite(raw.pinch.unwrap_or(0.0)).clamp(0.0, 1.0),
            grab: finite(raw.grab.unwrap_or(0.0)).clamp(0.0, 1.0),
            roll: raw.roll.map(finite).unwrap_or(q_roll),
            pitch: raw.pitch.map(finite).unwrap_or(q_pitch),
            fingers,
        }
    }
}

/// Parses one newline-delimited JSON frame from the middleware.
pub fn parse_line(line: &str, ibox: InteractionBox) -> Result<Frame, FrameError> {
    let wire: WireFrame = serde_json::from_str(line)?;
    Ok(Frame {
        id: wire.frame_id,
        hands: wire.hands.into_iter().map(Hand::from).collect(),
        interaction_box: ibox,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_hand() {
        let line = r#"{"frameId":7,"framerate":110.5,"hands":[{"id":3,"type":"right",
            "palmPosition":[0,150,0],"palmVel":[10,0,0],"pinch":0.9,"grab":0.1,
            "fingers":{"index":[12,200,-4],"thumb":[-30,140,0]},
            "fingerExtended":{"index":true,"thumb":false,"middle":true}}]}"#;
        let f = parse_line(line, InteractionBox::default()).unwrap();
        assert_eq!(f.id, Some(7));
        let h = &f.hands[0];
        assert_eq!(h.extended_count(), 2);
        assert_eq!(h.index_finger().tip, [12.0, 200.0, -4.0]);
        // missing tips fall back to the palm
        assert_eq!(h.finger(FingerKind::Pinky).tip, [0.0, 150.0, 0.0]);
        assert!((h.pinch - 0.9).abs() < 1e-9);
        assert!((h.palm_speed() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn partial_hand_defaults() {
        let f = parse_line(r#"{"hands":[{"pinch":7}]}"#, InteractionBox::default()).unwrap();
        let h = &f.hands[0];
        assert_eq!(h.pinch, 1.0);
        assert_eq!(h.grab, 0.0);
        assert_eq!(h.extended_count(), 0);
        assert_eq!(h.palm_position, [0.0; 3]);
    }

    #[test]
    fn null_fields_fall_back_to_defaults() {
        let b = InteractionBox::default();

        let f = parse_line(r#"{"hands":[{"palmPosition":null,"pinch":0.5}]}"#, b).unwrap();
        assert_eq!(f.hands[0].palm_position, [0.0; 3]);
        assert!((f.hands[0].pinch - 0.5).abs() < 1e-9);

        let line = r#"{"hands":[{"palmPosition":[1,2,3],"fingers":{"index":null,"thumb":[4,5,null]}}]}"#;
        let h = &parse_line(line, b).unwrap().hands[0];
        assert_eq!(h.index_finger().tip, [1.0, 2.0, 3.0]);
        assert_eq!(h.finger(FingerKind::Thumb).tip, [4.0, 5.0, 0.0]);

        let f = parse_line(r#"{"hands":[{"id":null,"fingerExtended":{"index":null}}]}"#, b).unwrap();
        assert_eq!(f.hands[0].id, 0);
        assert_eq!(f.hands[0].extended_count(), 0);

        let f = parse_line(r#"{"frameId":null,"hands":[{"palmVel":null,"palmQuat":null}]}"#, b).unwrap();
        assert_eq!(f.hands[0].palm_speed(), 0.0);
        assert_eq!(f.hands[0].roll, 0.0);
    }

    #[test]
    fn null_hands_is_an_empty_frame() {
        let f = parse_line(r#"{"frameId":3,"hands":null}"#, InteractionBox::default()).unwrap();
        assert_eq!(f.id, Some(3));
        assert!(f.hands.is_empty());
    }

    #[test]
    fn malformed_line_is_an_error() {
        assert!(parse_line("{not json", InteractionBox::default()).is_err());
    }

    #[test]
    fn interaction_box_normalizes_and_clamps() {
        let b = InteractionBox::default();
        assert_eq!(b.normalize_point([0.0, 150.0, 0.0], true), [0.5, 0.5, 0.5]);
        assert_eq!(b.normalize_point([500.0, -10.0, 0.0], true), [1.0, 0.0, 0.5]);
        let raw = b.normalize_point([240.0, 0.0, 0.0], false);
        assert!((raw[0] - 1.5).abs() < 1e-9);
    }

    #[test]
    fn roll_from_quaternion() {
        // 90 degrees about z
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let (roll, pitch) = roll_pitch(&[Some(0.0), Some(0.0), Some(s), Some(s)]);
        assert!((roll - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        assert!(pitch.abs() < 1e-9);
    }
}
