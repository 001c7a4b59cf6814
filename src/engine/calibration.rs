//! Two-point pinch calibration of the usable interaction region.

use serde::Serialize;

use crate::config::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CalStep {
    #[default]
    Idle,
    A,
    B,
    Done,
}

/// What a captured pinch did to the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Capture {
    Ignored,
    PointA,
    Finished(Rect),
}

#[derive(Debug, Clone, Default)]
pub struct CalibrationSession {
    pub step: CalStep,
    a: Option<(f64, f64)>,
    /// Pinch dropped back below the capture threshold since the last capture.
    armed: bool,
    /// Completed rect waiting to be persisted by the engine.
    pub finished: Option<Rect>,
}

impl CalibrationSession {
    pub fn is_active(&self) -> bool {
        matches!(self.step, CalStep::A | CalStep::B)
    }

    pub fn start(&mut self) {
        self.step = CalStep::A;
        self.a = None;
        self.armed = true;
    }

    /// A missing hand counts as a released pinch.
    pub fn rearm(&mut self) {
        self.armed = true;
    }

    /// Returns false when there was nothing to cancel.
    pub fn cancel(&mut self) -> bool {
        let was = self.is_active();
        self.step = CalStep::Idle;
        self.a = None;
        was
    }

    /// Feeds one frame: `point` is the raw normalised index tip, before calibration.
    pub fn feed(&mut self, point: (f64, f64), pinch: f64, threshold: f64, min_span: f64) -> Capture {
        if !self.is_active() {
            return Capture::Ignored;
        }
        if pinch <= threshold {
            self.armed = true;
            return Capture::Ignored;
        }
        if !self.armed {
            return Capture::Ignored;
        }
        self.armed = false;
        match (self.step, self.a) {
            (CalStep::A, _) => {
                self.a = Some(point);
                self.step = CalStep::B;
                Capture::PointA
            }
            (CalStep::B, Some(a)) => {
                self.step = CalStep::Done;
                self.a = None;
                Capture::Finished(bounding_rect(a, point, min_span))
            }
            _ => Capture::Ignored,
        }
    }
}

fn span_axis(p: f64, q: f64, min_span: f64) -> (f64, f64) {
    let lo = p.min(q).clamp(0.0, 1.0);
    let mut hi = p.max(q).clamp(0.0, 1.0);
    if hi - lo < min_span {
        hi = (lo + min_span).min(1.0);
    }
    let lo = lo.min(hi - min_span).max(0.0);
    (lo, hi)
}

/// Bounding box of two points in [0,1], at least `min_span` wide on each axis.
pub fn bounding_rect(a: (f64, f64), b: (f64, f64), min_span: f64) -> Rect {
    let (x0, x1) = span_axis(a.0, b.0, min_span);
    let (y0, y1) = span_axis(a.1, b.1, min_span);
    Rect { x0, y0, x1, y1 }
}
