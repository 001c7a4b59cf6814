use log::info;
use serde::Serialize;
use std::sync::mpsc::Sender;

use super::calibration::CalStep;
use super::state::WindowMode;
use crate::config::{Rect, Settings};

/// Per-frame status broadcast.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub hands: usize,
    pub ext: usize,
    pub pinch: f64,
    pub grab: f64,
    pub x: i32,
    pub y: i32,
    pub window_mode: WindowMode,
    pub dragging: bool,
    pub cal_step: CalStep,
    pub display_id: Option<u32>,
    pub gcr_lock: Option<&'static str>,
    pub profile: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CalMode {
    Start,
    Progress,
    Done,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalEvent {
    pub mode: CalMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<CalStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rect: Option<Rect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_id: Option<u32>,
}

impl CalEvent {
    pub fn at(mode: CalMode, step: CalStep) -> Self {
        Self {
            mode,
            step: Some(step),
            rect: None,
            display_id: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DaemonEvent {
    Status(Status),
    Calibration(CalEvent),
    Tutor(String),
    /// Base settings changed and should be written to disk.
    Persist(Box<Settings>),
}

/// Outbound side of the engine. Sends never fail the caller.
#[derive(Debug, Clone, Default)]
pub struct Events {
    tx: Option<Sender<DaemonEvent>>,
}

impl Events {
    pub fn new(tx: Sender<DaemonEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn send(&self, evt: DaemonEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(evt);
        }
    }

    pub fn tutor(&self, msg: impl Into<String>) {
        let msg = msg.into();
        info!("[tutor] {msg}");
        self.send(DaemonEvent::Tutor(msg));
    }
}
