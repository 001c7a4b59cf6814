//! Physical display geometry and nearest-display selection.

use log::debug;
use serde::{Deserialize, Serialize};
use std::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dist(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub id: u32,
    pub bounds: Bounds,
    /// Logical size used for pointer mapping; defaults to the bounds size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<(i32, i32)>,
}

impl DisplayInfo {
    pub fn size(&self) -> (i32, i32) {
        self.size.unwrap_or((self.bounds.w, self.bounds.h))
    }

    fn distance_to(&self, p: Point) -> f64 {
        let b = &self.bounds;
        let (x0, y0) = (b.x as f64, b.y as f64);
        let (x1, y1) = (x0 + b.w as f64, y0 + b.h as f64);
        let dx = (x0 - p.x).max(0.0).max(p.x - x1);
        let dy = (y0 - p.y).max(0.0).max(p.y - y1);
        dx.hypot(dy)
    }
}

impl Default for DisplayInfo {
    fn default() -> Self {
        Self {
            id: 0,
            bounds: Bounds {
                x: 0,
                y: 0,
                w: 1920,
                h: 1080,
            },
            size: None,
        }
    }
}

pub trait DisplayProvider: Send {
    fn nearest(&self, p: Point) -> Option<DisplayInfo>;

    /// Size of the box enclosing every display.
    fn extent(&self) -> (i32, i32);
}

#[derive(Debug, Clone)]
pub struct StaticDisplays(pub Vec<DisplayInfo>);

impl StaticDisplays {
    /// Configured displays, else `xrandr --listmonitors`, else a single 1080p screen.
    pub fn detect(configured: &[DisplayInfo]) -> Self {
        if !configured.is_empty() {
            return Self(configured.to_vec());
        }
        match Command::new("xrandr").arg("--listmonitors").output() {
            Ok(out) if out.status.success() => {
                let list = parse_xrandr_monitors(&String::from_utf8_lossy(&out.stdout));
                if !list.is_empty() {
                    return Self(list);
                }
            }
            Ok(out) => debug!("xrandr exited with {}", out.status),
            Err(e) => debug!("xrandr unavailable: {e}"),
        }
        Self(vec![DisplayInfo::default()])
    }
}

impl DisplayProvider for StaticDisplays {
    fn nearest(&self, p: Point) -> Option<DisplayInfo> {
        self.0
            .iter()
            .min_by(|a, b| a.distance_to(p).total_cmp(&b.distance_to(p)))
            .cloned()
    }

    fn extent(&self) -> (i32, i32) {
        let w = self.0.iter().map(|d| d.bounds.x + d.bounds.w).max();
        let h = self.0.iter().map(|d| d.bounds.y + d.bounds.h).max();
        (w.unwrap_or(1920), h.unwrap_or(1080))
    }
}

/// Parses lines like ` 0: +*DP-1 2560/597x1440/336+0+0  DP-1`.
pub fn parse_xrandr_monitors(text: &str) -> Vec<DisplayInfo> {
    let mut out = vec![];
    for line in text.lines().skip_while(|l| l.starts_with("Monitors:")) {
        let mut parts = line.split_whitespace();
        let Some(idx) = parts.next().and_then(|s| s.strip_suffix(':')) else {
            continue;
        };
        let Ok(id) = idx.parse::<u32>() else {
            continue;
        };
        let Some(geom) = parts.nth(1) else {
            continue;
        };
        if let Some(bounds) = parse_geometry(geom) {
            out.push(DisplayInfo {
                id,
                bounds,
                size: None,
            });
        }
    }
    out
}

// "2560/597x1440/336+0+0"
fn parse_geometry(g: &str) -> Option<Bounds> {
    let (w_part, rest) = g.split_once('x')?;
    let mut it = rest.split('+');
    let h_part = it.next()?;
    let x = it.next()?.parse().ok()?;
    let y = it.next()?.parse().ok()?;
    let w = w_part.split('/').next()?.parse().ok()?;
    let h = h_part.split('/').next()?.parse().ok()?;
    Some(Bounds { x, y, w, h })
}
