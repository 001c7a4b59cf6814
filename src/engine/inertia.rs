use crate::config::ScrollInertia;

use super::state::Inertia;

/// Wheel steps to emit for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Steps {
    pub x: i32,
    pub y: i32,
}

impl Inertia {
    pub fn seed(&mut self, x: i32, y: i32, boost: f64) {
        self.vx = (x as f64 * boost).trunc();
        self.vy = (y as f64 * boost).trunc();
        self.active = self.vx.abs() + self.vy.abs() > 0.0;
    }

    pub fn stop(&mut self) {
        *self = Inertia::default();
    }

    /// Decays the tail by one tick; integer parts are scrolled.
    pub fn tick(&mut self, cfg: &ScrollInertia) -> Steps {
        if !cfg.enabled || !self.active {
            return Steps::default();
        }
        self.vx *= cfg.decay;
        self.vy *= cfg.decay;
        let still = self.vx.abs() < cfg.min_step && self.vy.abs() < cfg.min_step;
        self.active = !still;
        Steps {
            x: self.vx.trunc() as i32,
            y: self.vy.trunc() as i32,
        }
    }
}
