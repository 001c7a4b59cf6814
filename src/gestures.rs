//! Recognizer chain. Each recognizer is a small gated state machine over
//! `EngineState`; the chain runs in a fixed order once per frame.

mod calibrate;
mod drag;
mod dwell;
mod five_finger;
mod os_swipe;
mod pinch_click;
mod scroll;
mod snap_cycle;
mod three_drag;
mod three_swipe;
mod window_mode;
mod zoom;

use log::trace;

use crate::engine::{Ctx, Pose};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Later recognizers do not see this frame.
    Consumed,
}

pub trait Recognizer: Sync {
    fn name(&self) -> &'static str;

    fn on_frame(&self, ctx: &mut Ctx<'_>, pose: &Pose<'_>) -> Flow;

    /// Animation tick, whether or not a frame arrived.
    fn on_tick(&self, _ctx: &mut Ctx<'_>) {}

    /// Tracking lost: drop anything held. Must be idempotent.
    fn on_hand_lost(&self, _ctx: &mut Ctx<'_>) {}
}

static CHAIN: &[&dyn Recognizer] = &[
    &calibrate::Calibration,
    &window_mode::WindowModes,
    &three_swipe::ThreeFingerBinding,
    &drag::Drag,
    &three_drag::ThreeFingerDrag,
    &pinch_click::PinchClick,
    &os_swipe::OsSwipe,
    &snap_cycle::SnapCycle,
    &five_finger::FiveFinger,
    &dwell::DwellClick,
    &zoom::Zoom,
    &scroll::Scroll,
];

pub fn on_frame(ctx: &mut Ctx<'_>, pose: &Pose<'_>) {
    for r in CHAIN {
        if r.on_frame(ctx, pose) == Flow::Consumed {
            trace!("{} consumed frame", r.name());
            break;
        }
    }
}

pub fn on_tick(ctx: &mut Ctx<'_>) {
    for r in CHAIN {
        r.on_tick(ctx);
    }
}

pub fn on_hand_lost(ctx: &mut Ctx<'_>) {
    for r in CHAIN {
        r.on_hand_lost(ctx);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDir {
    Left,
    Right,
    Up,
    Down,
}

impl SwipeDir {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwipeDir::Left => "left",
            SwipeDir::Right => "right",
            SwipeDir::Up => "up",
            SwipeDir::Down => "down",
        }
    }

    /// Dominant-axis palm velocity beyond `min` (mm/s). Sensor Y points up.
    pub fn from_velocity(v: [f64; 3], min: f64) -> Option<Self> {
        let [vx, vy, _] = v;
        if vx.abs() > vy.abs() {
            if vx > min {
                Some(SwipeDir::Right)
            } else if vx < -min {
                Some(SwipeDir::Left)
            } else {
                None
            }
        } else if vy > min {
            Some(SwipeDir::Up)
        } else if vy < -min {
            Some(SwipeDir::Down)
        } else {
            None
        }
    }
}

pub(crate) fn cooled(last: Option<u64>, now: u64, cooldown_ms: u64) -> bool {
    last.is_none_or(|t| now.saturating_sub(t) > cooldown_ms)
}
