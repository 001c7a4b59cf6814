//! Window geometry actuator: external helper first, `xdotool` fallback.

use anyhow::{Result, anyhow};
use log::debug;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, process::Command};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapPosition {
    #[serde(rename = "left")]
    Left,
    #[serde(rename = "right")]
    Right,
    #[serde(rename = "top")]
    Top,
    #[serde(rename = "bottom")]
    Bottom,
    #[serde(rename = "tl")]
    TopLeft,
    #[serde(rename = "tr")]
    TopRight,
    #[serde(rename = "bl")]
    BottomLeft,
    #[serde(rename = "br")]
    BottomRight,
    #[serde(rename = "third-left")]
    ThirdLeft,
    #[serde(rename = "third-center")]
    ThirdCenter,
    #[serde(rename = "third-right")]
    ThirdRight,
    #[serde(rename = "center")]
    Center,
    #[serde(rename = "max")]
    Max,
}

impl SnapPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::TopLeft => "tl",
            Self::TopRight => "tr",
            Self::BottomLeft => "bl",
            Self::BottomRight => "br",
            Self::ThirdLeft => "third-left",
            Self::ThirdCenter => "third-center",
            Self::ThirdRight => "third-right",
            Self::Center => "center",
            Self::Max => "max",
        }
    }

    pub fn default_order() -> Vec<SnapPosition> {
        use SnapPosition::*;
        vec![
            Left,
            Right,
            Top,
            Bottom,
            TopLeft,
            TopRight,
            BottomLeft,
            BottomRight,
            ThirdLeft,
            ThirdCenter,
            ThirdRight,
            Center,
            Max,
        ]
    }
}

/// Best-effort: implementations may no-op when the platform cannot comply.
pub trait WindowActuator {
    fn move_by(&mut self, dx: i32, dy: i32) -> Result<()>;
    fn resize_by(&mut self, dw: i32, dh: i32) -> Result<()>;
    fn snap(&mut self, pos: SnapPosition) -> Result<()>;
}

pub struct HelperWindow {
    helper: Option<PathBuf>,
}

impl HelperWindow {
    pub fn new(helper: Option<PathBuf>) -> Self {
        let helper = helper.filter(|p| p.exists());
        Self { helper }
    }

    pub fn has_helper(&self) -> bool {
        self.helper.is_some()
    }

    /// Returns `true` when the helper ran and exited successfully.
    fn run_helper(&self, args: &[String]) -> bool {
        let Some(helper) = &self.helper else {
            return false;
        };
        match Command::new(helper).args(args).status() {
            Ok(st) if st.success() => true,
            Ok(st) => {
                debug!("window helper {:?} exited with {st}", args);
                false
            }
            Err(e) => {
                debug!("window helper failed to spawn: {e}");
                false
            }
        }
    }
}

impl WindowActuator for HelperWindow {
    fn move_by(&mut self, dx: i32, dy: i32) -> Result<()> {
        if self.run_helper(&["moveBy".into(), dx.to_string(), dy.to_string()]) {
            return Ok(());
        }
        let st = Command::new("xdotool")
            .args(["getactivewindow", "windowmove", "--relative", "--"])
            .arg(dx.to_string())
            .arg(dy.to_string())
            .status()?;
        if !st.success() {
            return Err(anyhow!("xdotool windowmove exited with {st}"));
        }
        Ok(())
    }

    fn resize_by(&mut self, dw: i32, dh: i32) -> Result<()> {
        if !self.run_helper(&["resizeBy".into(), dw.to_string(), dh.to_string()]) {
            debug!("resize_by({dw}, {dh}) unsupported without helper");
        }
        Ok(())
    }

    fn snap(&mut self, pos: SnapPosition) -> Result<()> {
        if !self.run_helper(&["snap".into(), pos.as_str().into()]) {
            debug!("snap({}) unsupported without helper", pos.as_str());
        }
        Ok(())
    }
}
