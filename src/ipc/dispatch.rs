//! Control requests: one JSON object per line in, one `{ok, data|error}` line out.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt::Display;

use super::pipeline::Daemon;
use crate::actions::InputSink;
use crate::config::Flag;
use crate::window::WindowActuator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CalAction {
    Start,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Request {
    Status,
    Reload,
    Use { profile: String },
    Focus { app: String },
    List,
    Doctor,
    Calibrate { action: CalAction },
    Gesture { name: String, on: bool },
    Gestures,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(e: impl Display) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(e.to_string()),
        }
    }
}

pub fn parse(line: &str) -> Result<Request> {
    serde_json::from_str(line.trim()).context("bad request")
}

/// Runs on the engine thread.
pub fn handle<S: InputSink, W: WindowActuator>(
    d: &mut Daemon<S, W>,
    req: Request,
    now: u64,
) -> Response {
    match req {
        Request::Status => Response::ok(d.status_json()),
        Request::Reload => match d.reload() {
            Ok(()) => Response::ok(json!({"profile": d.engine.profile().to_json()})),
            Err(e) => Response::err(format!("{e:#}")),
        },
        Request::Use { profile } => match d.engine.use_profile(&profile, now) {
            Ok(()) => Response::ok(json!({"profile": d.engine.profile().to_json()})),
            Err(e) => Response::err(e),
        },
        Request::Focus { app } => {
            d.engine.focus(&app, now);
            Response::ok(json!({"profile": d.engine.profile().to_json()}))
        }
        Request::List => Response::ok(json!({
            "profiles": d.cfg.list_profiles(),
            "active": d.engine.profile().id,
        })),
        Request::Doctor => Response::ok(d.cfg.doctor_report()),
        Request::Calibrate { action } => {
            match action {
                CalAction::Start => d.engine.start_calibration(),
                CalAction::Cancel => d.engine.cancel_calibration(),
            }
            Response::ok(json!({"step": d.engine.state().calibration.step}))
        }
        Request::Gesture { name, on } => match name.parse::<Flag>() {
            Ok(flag) => {
                d.engine.set_gesture(flag, on);
                Response::ok(d.engine.gestures_json())
            }
            Err(e) => Response::err(e),
        },
        Request::Gestures => Response::ok(d.engine.gestures_json()),
        Request::Shutdown => Response::ok(json!("shutting down")),
    }
}
