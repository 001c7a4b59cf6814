//! Recording actuators and hand builders for unit tests.

use anyhow::{Result, anyhow};
use std::sync::mpsc::{Receiver, channel};

use crate::actions::{Button, InputSink};
use crate::config::{ProfileSet, Settings};
use crate::engine::{DaemonEvent, Engine, Events};
use crate::frame::{Finger, FingerKind, Frame, Hand, InteractionBox, Vec3};
use crate::keys::Key;
use crate::window::{SnapPosition, WindowActuator};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Move(i32, i32),
    Press(Button),
    Release(Button),
    ScrollV(i32),
    ScrollH(i32),
    KeyDown(Key),
    KeyUp(Key),
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub calls: Vec<Call>,
    pub fail: bool,
    /// Fails only the matching calls.
    pub fail_on: Option<fn(&Call) -> bool>,
}

impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn last_move(&self) -> Option<Call> {
        self.calls
            .iter()
            .rev()
            .find(|c| matches!(c, Call::Move(..)))
            .cloned()
    }

    pub fn presses(&self) -> Vec<Button> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Press(b) => Some(*b),
                _ => None,
            })
            .collect()
    }

    pub fn keys_down(&self) -> Vec<Key> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::KeyDown(k) => Some(*k),
                _ => None,
            })
            .collect()
    }

    pub fn vertical_total(&self) -> i32 {
        self.calls
            .iter()
            .map(|c| match c {
                Call::ScrollV(n) => *n,
                _ => 0,
            })
            .sum()
    }

    fn record(&mut self, c: Call) -> Result<()> {
        if self.fail || self.fail_on.is_some_and(|f| f(&c)) {
            return Err(anyhow!("injected failure"));
        }
        self.calls.push(c);
        Ok(())
    }
}

impl InputSink for RecordingSink {
    fn set_position(&mut self, x: i32, y: i32) -> Result<()> {
        self.record(Call::Move(x, y))
    }
    fn press(&mut self, button: Button) -> Result<()> {
        self.record(Call::Press(button))
    }
    fn release(&mut self, button: Button) -> Result<()> {
        self.record(Call::Release(button))
    }
    fn scroll_vertical(&mut self, steps: i32) -> Result<()> {
        self.record(Call::ScrollV(steps))
    }
    fn scroll_horizontal(&mut self, steps: i32) -> Result<()> {
        self.record(Call::ScrollH(steps))
    }
    fn press_key(&mut self, key: Key) -> Result<()> {
        self.record(Call::KeyDown(key))
    }
    fn release_key(&mut self, key: Key) -> Result<()> {
        self.record(Call::KeyUp(key))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WinCall {
    MoveBy(i32, i32),
    ResizeBy(i32, i32),
    Snap(SnapPosition),
}

#[derive(Debug, Default)]
pub struct RecordingWindow {
    pub calls: Vec<WinCall>,
}

impl RecordingWindow {
    pub fn snaps(&self) -> Vec<SnapPosition> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                WinCall::Snap(p) => Some(*p),
                _ => None,
            })
            .collect()
    }
}

impl WindowActuator for RecordingWindow {
    fn move_by(&mut self, dx: i32, dy: i32) -> Result<()> {
        self.calls.push(WinCall::MoveBy(dx, dy));
        Ok(())
    }
    fn resize_by(&mut self, dw: i32, dh: i32) -> Result<()> {
        self.calls.push(WinCall::ResizeBy(dw, dh));
        Ok(())
    }
    fn snap(&mut self, pos: SnapPosition) -> Result<()> {
        self.calls.push(WinCall::Snap(pos));
        Ok(())
    }
}

pub type TestEngine = Engine<RecordingSink, RecordingWindow>;

pub fn test_engine_with(settings: Settings) -> (TestEngine, Receiver<DaemonEvent>) {
    let (tx, rx) = channel();
    let profiles = ProfileSet::parse(include_str!("../profiles/default.toml"))
        .expect("bundled profiles parse");
    let engine = Engine::new(
        settings,
        profiles,
        RecordingSink::default(),
        RecordingWindow::default(),
        Events::new(tx),
    );
    (engine, rx)
}

pub fn test_engine() -> (TestEngine, Receiver<DaemonEvent>) {
    test_engine_with(Settings::default())
}

const EXT_ORDER: [FingerKind; 5] = [
    FingerKind::Index,
    FingerKind::Middle,
    FingerKind::Ring,
    FingerKind::Pinky,
    FingerKind::Thumb,
];

/// Right hand at rest in the middle of the default interaction box.
pub struct HandBuilder(Hand);

impl HandBuilder {
    pub fn new() -> Self {
        let tip = |kind: FingerKind| -> Vec3 {
            match kind {
                FingerKind::Thumb => [-30.0, 150.0, 0.0],
                FingerKind::Index => [-10.0, 180.0, 0.0],
                FingerKind::Middle => [0.0, 185.0, 0.0],
                FingerKind::Ring => [10.0, 180.0, 0.0],
                FingerKind::Pinky => [20.0, 170.0, 0.0],
            }
        };
        Self(Hand {
            id: 1,
            palm_position: [0.0, 150.0, 0.0],
            palm_velocity: [0.0; 3],
            pinch: 0.0,
            grab: 0.0,
            roll: 0.0,
            pitch: 0.0,
            fingers: FingerKind::ALL.map(|kind| Finger {
                kind,
                extended: false,
                tip: tip(kind),
            }),
        })
    }

    /// Extends the first `n` of index, middle, ring, pinky, thumb.
    pub fn ext(mut self, n: usize) -> Self {
        for f in self.0.fingers.iter_mut() {
            f.extended = EXT_ORDER[..n.min(5)].contains(&f.kind);
        }
        self
    }

    pub fn extended(mut self, kinds: &[FingerKind]) -> Self {
        for f in self.0.fingers.iter_mut() {
            f.extended = kinds.contains(&f.kind);
        }
        self
    }

    pub fn pinch(mut self, v: f64) -> Self {
        self.0.pinch = v;
        self
    }

    pub fn grab(mut self, v: f64) -> Self {
        self.0.grab = v;
        self
    }

    pub fn velocity(mut self, v: Vec3) -> Self {
        self.0.palm_velocity = v;
        self
    }

    pub fn roll_pitch(mut self, roll: f64, pitch: f64) -> Self {
        self.0.roll = roll;
        self.0.pitch = pitch;
        self
    }

    pub fn tip(mut self, kind: FingerKind, p: Vec3) -> Self {
        self.0.fingers[kind as usize].tip = p;
        self
    }

    /// Places the index tip at a normalised point of the default box.
    pub fn index_at(self, nx: f64, ny: f64) -> Self {
        let b = InteractionBox::default();
        let x = b.x.0 + nx * (b.x.1 - b.x.0);
        let y = b.y.0 + ny * (b.y.1 - b.y.0);
        self.tip(FingerKind::Index, [x, y, 0.0])
    }

    /// Moves the whole hand by millimetres.
    pub fn offset(mut self, dx: f64, dy: f64) -> Self {
        self.0.palm_position[0] += dx;
        self.0.palm_position[1] += dy;
        for f in self.0.fingers.iter_mut() {
            f.tip[0] += dx;
            f.tip[1] += dy;
        }
        self
    }

    pub fn build(self) -> Hand {
        self.0
    }
}

impl Default for HandBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn frame(hands: Vec<Hand>) -> Frame {
    Frame {
        id: None,
        hands,
        interaction_box: InteractionBox::default(),
    }
}
