//! Engine thread. Bridge frames, control requests and the animation tick
//! are all serialized through one channel onto the thread that owns the engine.

use anyhow::Result;
use log::{debug, info, trace, warn};
use serde_json::json;
use std::{
    process::Command,
    sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel},
    time::{Duration, Instant},
};

use super::dispatch::{self, Request, Response};
use crate::actions::InputSink;
use crate::bridge::BridgeEvent;
use crate::config::DaemonConfigState;
use crate::display::{DisplayProvider, StaticDisplays};
use crate::engine::{CalEvent, DaemonEvent, Engine, Events};
use crate::window::WindowActuator;

pub enum EngineInput {
    Bridge(BridgeEvent),
    Request(Request, Sender<Response>),
    /// Config files changed on disk.
    ConfigChanged,
    Shutdown,
}

impl From<BridgeEvent> for EngineInput {
    fn from(ev: BridgeEvent) -> Self {
        EngineInput::Bridge(ev)
    }
}

pub struct Daemon<S: InputSink, W: WindowActuator> {
    pub(super) engine: Engine<S, W>,
    pub(super) cfg: DaemonConfigState,
    displays: Box<dyn DisplayProvider>,
    events: Receiver<DaemonEvent>,
    bridge_up: bool,
    last_tutor: Option<String>,
    last_calibration: Option<CalEvent>,
    focused: Option<String>,
    next_display_poll: u64,
    next_focus_poll: u64,
}

impl<S: InputSink, W: WindowActuator> Daemon<S, W> {
    pub fn new(cfg: DaemonConfigState, sink: S, window: W, displays: Box<dyn DisplayProvider>) -> Self {
        let (tx, rx) = channel();
        let mut engine = Engine::new(
            cfg.settings.clone(),
            cfg.profiles.clone(),
            sink,
            window,
            Events::new(tx),
        );
        if let Some(d) = displays.nearest(engine.cursor_abs()) {
            engine.set_display(d);
        }
        Self {
            engine,
            cfg,
            displays,
            events: rx,
            bridge_up: false,
            last_tutor: None,
            last_calibration: None,
            focused: None,
            next_display_poll: 0,
            next_focus_poll: 0,
        }
    }

    pub fn on_bridge(&mut self, ev: BridgeEvent, now: u64) {
        match ev {
            BridgeEvent::Connected => {
                self.bridge_up = true;
                self.engine.tutor("Connected");
            }
            BridgeEvent::Frame(frame) => self.engine.on_frame(&frame, now),
            BridgeEvent::Error(e) => {
                debug!("bridge error: {e}");
                self.engine.tutor("Controller error");
            }
            BridgeEvent::Disconnected => {
                self.bridge_up = false;
                self.engine.hand_lost(now);
                self.engine.tutor("Disconnected");
            }
        }
    }

    /// Nearest-display and focused-app polling, each on its own period.
    pub fn poll(&mut self, now: u64) {
        let timing = self.engine.settings().timing.clone();
        if now >= self.next_display_poll {
            self.next_display_poll = now + timing.display_poll_ms.max(1);
            if let Some(d) = self.displays.nearest(self.engine.cursor_abs()) {
                self.engine.set_display(d);
            }
        }

        let prof = self.engine.settings().profiles.clone();
        if !prof.auto || now < self.next_focus_poll {
            return;
        }
        self.next_focus_poll = now + prof.focus_poll_ms.max(1);
        let Some(cmd) = prof.focus_command.as_deref() else {
            return;
        };
        if let Some(app) = focused_app(cmd)
            && self.focused.as_deref() != Some(app.as_str())
        {
            debug!("focus: {app}");
            self.engine.focus(&app, now);
            self.focused = Some(app);
        }
    }

    pub fn drain_events(&mut self) {
        while let Ok(ev) = self.events.try_recv() {
            match ev {
                DaemonEvent::Status(st) => trace!("status {st:?}"),
                DaemonEvent::Calibration(ev) => {
                    info!("calibration: {}", json!(ev));
                    self.last_calibration = Some(ev);
                }
                DaemonEvent::Tutor(msg) => self.last_tutor = Some(msg),
                DaemonEvent::Persist(settings) => match self.cfg.save_settings(&settings) {
                    Ok(()) => self.cfg.settings = *settings,
                    Err(e) => warn!("failed to persist settings: {e:#}"),
                },
            }
        }
    }

    /// Re-reads config; on error the engine keeps running on the last good one.
    pub fn reload(&mut self) -> Result<()> {
        self.cfg.reload()?;
        self.engine
            .reload(self.cfg.settings.clone(), self.cfg.profiles.clone());
        if !self.cfg.settings.displays.is_empty() {
            self.displays = Box::new(StaticDisplays(self.cfg.settings.displays.clone()));
            self.next_display_poll = 0;
        }
        // a pinned profile gives way to the next focus change
        self.focused = None;
        Ok(())
    }

    /// Watcher notification. Our own saves and duplicate events leave the
    /// files as last seen and are skipped, so a pinned profile stays pinned.
    pub fn on_config_changed(&mut self) {
        if !self.cfg.changed_on_disk() {
            trace!("config event without content change");
            return;
        }
        match self.reload() {
            Ok(()) => info!("config reloaded"),
            Err(e) => warn!("reload failed, keeping previous config: {e:#}"),
        }
    }

    pub fn status_json(&self) -> serde_json::Value {
        let bridge = &self.engine.settings().bridge;
        json!({
            "status": self.engine.status(),
            "profile": self.engine.profile().to_json(),
            "bridge": {
                "connected": self.bridge_up,
                "address": format!("{}:{}", bridge.host, bridge.port),
            },
            "tutor": self.last_tutor,
            "calibration": self.last_calibration,
            "gestures": self.engine.gestures_json(),
        })
    }
}

/// Runs `cmd` through the shell; the trimmed, lowercased stdout names the app.
fn focused_app(cmd: &str) -> Option<String> {
    match Command::new("sh").arg("-c").arg(cmd).output() {
        Ok(out) if out.status.success() => {
            let app = String::from_utf8_lossy(&out.stdout).trim().to_lowercase();
            (!app.is_empty()).then_some(app)
        }
        Ok(out) => {
            trace!("focus command exited with {}", out.status);
            None
        }
        Err(e) => {
            debug!("focus command failed: {e}");
            None
        }
    }
}

/// Drives the engine until shutdown. Time is milliseconds since the loop started.
pub fn run_engine<S: InputSink, W: WindowActuator>(mut d: Daemon<S, W>, rx: Receiver<EngineInput>) {
    let start = Instant::now();
    let now = || start.elapsed().as_millis() as u64;
    let mut next_tick = now();
    info!("engine: running, profile '{}'", d.engine.profile().id);

    loop {
        let wait = next_tick.saturating_sub(now());
        match rx.recv_timeout(Duration::from_millis(wait)) {
            Ok(EngineInput::Bridge(ev)) => d.on_bridge(ev, now()),
            Ok(EngineInput::Request(Request::Shutdown, reply)) => {
                let _ = reply.send(Response::ok(json!("shutting down")));
                break;
            }
            Ok(EngineInput::Request(req, reply)) => {
                let resp = dispatch::handle(&mut d, req, now());
                let _ = reply.send(resp);
            }
            Ok(EngineInput::ConfigChanged) => d.on_config_changed(),
            Ok(EngineInput::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        let t = now();
        if t >= next_tick {
            d.engine.on_tick(t);
            let period = d.engine.settings().timing.tick_ms.max(1);
            next_tick = (next_tick + period).max(t + 1);
        }
        d.poll(t);
        d.drain_events();
    }

    d.engine.hand_lost(now());
    d.drain_events();
    info!("engine: stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Flag;
    use crate::display::DisplayInfo;
    use crate::testing::{HandBuilder, RecordingSink, RecordingWindow, frame};
    use std::fs;
    use std::thread;

    fn daemon(tag: &str) -> (std::path::PathBuf, Daemon<RecordingSink, RecordingWindow>) {
        let dir = std::env::temp_dir().join(format!("handctl-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let mut cfg = DaemonConfigState::load_from(dir.clone()).unwrap();
        cfg.settings.profiles.focus_command = None;
        let d = Daemon::new(
            cfg,
            RecordingSink::default(),
            RecordingWindow::default(),
            Box::new(StaticDisplays(vec![DisplayInfo::default()])),
        );
        (dir, d)
    }

    #[test]
    fn bridge_events_update_status_and_tutor() {
        let (dir, mut d) = daemon("pipeline-bridge");
        d.on_bridge(BridgeEvent::Connected, 0);
        d.drain_events();
        assert!(d.bridge_up);
        assert_eq!(d.last_tutor.as_deref(), Some("Connected"));

        let hand = HandBuilder::new().ext(1).index_at(0.5, 0.5).build();
        d.on_bridge(BridgeEvent::Frame(frame(vec![hand])), 10);
        assert_eq!(d.engine.status().hands, 1);

        d.on_bridge(BridgeEvent::Disconnected, 20);
        d.drain_events();
        assert!(!d.bridge_up);
        assert_eq!(d.last_tutor.as_deref(), Some("Disconnected"));
        assert_eq!(d.engine.status().hands, 0);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn focus_command_switches_profile_on_change() {
        let (dir, mut d) = daemon("pipeline-focus");
        let mut s = d.engine.settings().clone();
        s.profiles.focus_command = Some("echo Firefox".into());
        d.engine.reload(s, d.cfg.profiles.clone());
        d.poll(0);
        assert_eq!(d.engine.profile().id, "firefox");

        // pinned until the focused app changes
        d.engine.use_profile("gimp", 5).unwrap();
        d.poll(1000);
        assert_eq!(d.engine.profile().id, "gimp");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn own_settings_save_keeps_pinned_profile() {
        let (dir, mut d) = daemon("pipeline-pin");
        let mut s = d.engine.settings().clone();
        s.profiles.focus_command = Some("echo Firefox".into());
        d.engine.reload(s, d.cfg.profiles.clone());
        d.poll(0);
        d.engine.use_profile("gimp", 5).unwrap();

        d.engine.set_gesture(Flag::DwellClick, false);
        d.drain_events();
        d.on_config_changed();
        d.poll(1000);
        assert_eq!(d.engine.profile().id, "gimp");

        // an edit by hand still reloads
        let text = fs::read_to_string(&d.cfg.settings_path).unwrap();
        fs::write(&d.cfg.settings_path, text.replace("ms = 650", "ms = 700")).unwrap();
        d.on_config_changed();
        assert_eq!(d.cfg.settings.dwell.ms, 700);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn engine_loop_answers_and_stops() {
        let (dir, d) = daemon("pipeline-loop");
        let (tx, rx) = channel();
        let handle = thread::spawn(move || run_engine(d, rx));

        let (rtx, rrx) = channel();
        tx.send(EngineInput::Request(Request::Gestures, rtx)).unwrap();
        let resp = rrx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(resp.ok);
        assert_eq!(resp.data.unwrap()["scroll"], json!(true));

        let (rtx, rrx) = channel();
        tx.send(EngineInput::Request(Request::Shutdown, rtx)).unwrap();
        assert!(rrx.recv_timeout(Duration::from_secs(5)).unwrap().ok);
        handle.join().unwrap();
        let _ = fs::remove_dir_all(&dir);
    }
}
