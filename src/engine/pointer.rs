//! Hand-to-screen mapping and the fixed-cadence pointer filter.

use crate::config::{PointerGain, Rect};
use crate::display::Point;

use super::state::Cursor;

/// Maps a normalised point through the calibration rect to display-local pixels.
/// Sensor Y grows upward, screen Y downward.
pub fn map_to_screen(rect: &Rect, size: (i32, i32), nx: f64, ny: f64) -> Point {
    let span = |lo: f64, hi: f64| (hi - lo).max(f64::EPSILON);
    let tx = ((nx - rect.x0) / span(rect.x0, rect.x1)).clamp(0.0, 1.0);
    let ty = ((ny - rect.y0) / span(rect.y0, rect.y1)).clamp(0.0, 1.0);
    Point::new(tx * size.0 as f64, (1.0 - ty) * size.1 as f64)
}

pub fn adaptive_gain(g: &PointerGain, palm_vel: f64) -> f64 {
    if !g.enabled {
        return 1.0;
    }
    let span = (g.vel_high - g.vel_low).max(f64::EPSILON);
    let t = ((palm_vel - g.vel_low) / span).clamp(0.0, 1.0);
    g.gain_min + (g.gain_max - g.gain_min) * t
}

/// One animation tick. Returns the new display-local pointer position when it
/// moved past the deadzone.
pub fn step(cursor: &mut Cursor, smoothing: f64, deadzone_px: f64, gain: f64) -> Option<Point> {
    cursor.pos.x += (cursor.target.x - cursor.pos.x) * smoothing;
    cursor.pos.y += (cursor.target.y - cursor.pos.y) * smoothing;

    let dx = (cursor.pos.x - cursor.last_pt.x) * gain;
    let dy = (cursor.pos.y - cursor.last_pt.y) * gain;
    if dx.hypot(dy) <= deadzone_px {
        return None;
    }
    cursor.last_pt = Point::new(cursor.last_pt.x + dx, cursor.last_pt.y + dy);
    Some(cursor.last_pt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibrated_corners_map_to_screen_corners() {
        let r = Rect {
            x0: 0.2,
            y0: 0.3,
            x1: 0.8,
            y1: 0.9,
        };
        let bl = map_to_screen(&r, (1920, 1080), 0.2, 0.3);
        assert_eq!((bl.x, bl.y), (0.0, 1080.0));
        let tr = map_to_screen(&r, (1920, 1080), 0.8, 0.9);
        assert!((tr.x - 1920.0).abs() < 1e-9);
        assert!(tr.y.abs() < 1e-9);
        // outside the rect clamps to the edge
        let out = map_to_screen(&r, (1920, 1080), 0.0, 1.0);
        assert_eq!((out.x, out.y), (0.0, 0.0));
    }

    #[test]
    fn gain_ramps_with_palm_speed() {
        let g = PointerGain::default();
        assert_eq!(adaptive_gain(&g, 50.0), 1.0);
        assert!((adaptive_gain(&g, 600.0) - 1.6).abs() < 1e-9);
        assert!((adaptive_gain(&g, 5000.0) - 2.2).abs() < 1e-9);
        let off = PointerGain {
            enabled: false,
            ..g
        };
        assert_eq!(adaptive_gain(&off, 5000.0), 1.0);
    }

    #[test]
    fn deadzone_holds_last_point() {
        let mut c = Cursor {
            target: Point::new(5.0, 0.0),
            ..Default::default()
        };
        // 5 * 0.22 = 1.1px, inside the 2px deadzone
        assert_eq!(step(&mut c, 0.22, 2.0, 1.0), None);
        assert_eq!(c.last_pt, Point::default());
        assert!(c.pos.x > 1.0);

        c.target = Point::new(100.0, 0.0);
        let moved = step(&mut c, 0.22, 2.0, 1.0).unwrap();
        assert!(moved.x > 2.0);
        assert_eq!(c.last_pt, moved);
    }
}
