use serde::Serialize;

use super::calibration::CalibrationSession;
use super::gcr::Gcr;
use crate::display::{DisplayInfo, Point};
use crate::window::SnapPosition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    #[default]
    None,
    Move,
    Resize,
}

impl WindowMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowMode::None => "none",
            WindowMode::Move => "move",
            WindowMode::Resize => "resize",
        }
    }
}

/// Display-local pointer coordinates.
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    pub pos: Point,
    pub target: Point,
    pub last_pt: Point,
}

#[derive(Debug, Clone, Default)]
pub struct TapState {
    pub is_pinching: bool,
    pub pinch_start_ts: u64,
    pub pinch_start_pos: Point,
    pub tap_count: u32,
    pub last_tap_ts: Option<u64>,
    /// Pending click; replaced by every new tap.
    pub deadline: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct DragState {
    pub dragging: bool,
    pub three: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Attitude {
    pub roll: f64,
    pub pitch: f64,
}

#[derive(Debug, Clone, Default)]
pub struct WindowState {
    pub mode: WindowMode,
    pub ref_pt: Option<Point>,
    pub baseline: Attitude,
    pub last_tick: Option<u64>,
    pub last_enter: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct DwellState {
    pub anchor: Option<Point>,
    pub start_ts: u64,
    pub cooldown_until: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inertia {
    pub vx: f64,
    pub vy: f64,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct SnapState {
    pub index: usize,
    pub order: Vec<SnapPosition>,
    pub last_ts: Option<u64>,
    /// Pinch was inside the tap band on the previous move-mode frame.
    pub in_band: bool,
}

impl Default for SnapState {
    fn default() -> Self {
        Self {
            index: 0,
            order: SnapPosition::default_order(),
            last_ts: None,
            in_band: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScrollTrack {
    pub last_center: Option<Point>,
    pub last_ts: Option<u64>,
    pub ramp: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ZoomTrack {
    pub active: bool,
    pub last_dist: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct SwipeState {
    pub last_os_ts: Option<u64>,
    pub last_three_ts: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct FiveState {
    pub open_since: Option<u64>,
    /// Show-desktop already sent for this hold.
    pub fired: bool,
    pub last_pinch_ts: Option<u64>,
}

/// Everything the recognizers mutate. Owned by the engine thread only.
#[derive(Debug, Clone, Default)]
pub struct EngineState {
    pub display: Option<DisplayInfo>,
    pub cursor: Cursor,
    pub tap: TapState,
    pub drag: DragState,
    pub window: WindowState,
    pub calibration: CalibrationSession,
    pub dwell: DwellState,
    pub inertia: Inertia,
    pub snap: SnapState,
    pub scroll: ScrollTrack,
    pub zoom: ZoomTrack,
    pub swipe: SwipeState,
    pub five: FiveState,
    /// Palm speed of the latest hand, mm/s.
    pub last_palm_vel: f64,
    pub gcr: Gcr,
}

impl EngineState {
    pub fn display_id(&self) -> Option<u32> {
        self.display.as_ref().map(|d| d.id)
    }

    pub fn display_or_default(&self) -> DisplayInfo {
        self.display.clone().unwrap_or_default()
    }
}
