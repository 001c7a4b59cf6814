//! Frame-to-action engine. Owns all gesture state; driven by frames and a
//! fixed-rate animation tick, both on the same thread.

pub mod calibration;
pub mod gcr;
pub mod inertia;
pub mod pointer;
pub mod state;
pub mod status;

use anyhow::{Result, anyhow};
use log::{debug, info, trace, warn};

use crate::actions::InputSink;
use crate::config::{ActiveProfile, Flag, ProfileSet, Rect, Settings, resolve};
use crate::display::{DisplayInfo, Point};
use crate::frame::{FingerKind, Frame, Hand, InteractionBox};
use crate::gestures;
use crate::keys::KeyChord;
use crate::window::WindowActuator;

use calibration::CalStep;
use gcr::Owner;
use state::EngineState;
pub use status::{CalEvent, CalMode, DaemonEvent, Events, Status};

/// Per-frame facts derived from the primary hand.
#[derive(Debug, Clone)]
pub struct Pose<'h> {
    pub hand: &'h Hand,
    pub ibox: InteractionBox,
    pub ext: usize,
    pub non_thumb_ext: usize,
    pub pinch: f64,
    pub grab: f64,
    /// Normalised index tip before calibration.
    pub norm: (f64, f64),
    /// Calibrated, display-local screen point.
    pub local: Point,
    /// Thumb and pinky both extended.
    pub clutch: bool,
}

impl<'h> Pose<'h> {
    pub fn new(hand: &'h Hand, ibox: InteractionBox, rect: &Rect, size: (i32, i32)) -> Self {
        let n = ibox.normalize_point(hand.index_finger().tip, true);
        let non_thumb_ext = hand
            .extended()
            .filter(|f| f.kind != FingerKind::Thumb)
            .count();
        Self {
            hand,
            ibox,
            ext: hand.extended_count(),
            non_thumb_ext,
            pinch: hand.pinch,
            grab: hand.grab,
            norm: (n[0], n[1]),
            local: pointer::map_to_screen(rect, size, n[0], n[1]),
            clutch: hand.finger(FingerKind::Thumb).extended && hand.finger(FingerKind::Pinky).extended,
        }
    }

    pub fn palm_open(&self, grab_max: f64) -> bool {
        self.non_thumb_ext >= 3 && self.grab <= grab_max
    }

    /// Only the index among the non-thumb fingers, with some grip, no clutch.
    pub fn index_only(&self, grip_min: f64) -> bool {
        self.hand.index_finger().extended
            && self.non_thumb_ext == 1
            && self.grab >= grip_min
            && !self.clutch
    }

    pub fn palm_velocity(&self) -> [f64; 3] {
        self.hand.palm_velocity
    }
}

/// What a recognizer sees: engine state plus the injected collaborators.
pub struct Ctx<'a> {
    pub now: u64,
    pub state: &'a mut EngineState,
    pub settings: &'a Settings,
    pub profile: &'a ActiveProfile,
    pub sink: &'a mut dyn InputSink,
    pub window: &'a mut dyn WindowActuator,
    pub events: &'a Events,
}

impl Ctx<'_> {
    pub fn is_on(&self, flag: Flag) -> bool {
        self.settings.gestures.is_on(flag)
    }

    pub fn tutor(&self, msg: impl Into<String>) {
        self.events.tutor(msg);
    }

    /// True when `owner` holds the lock or could take it for this pose.
    pub fn claim(&mut self, owner: Owner, ext: usize) -> bool {
        let gcr = &mut self.state.gcr;
        if gcr.current() == Some(owner) {
            return true;
        }
        gcr.can_switch(ext) && gcr.acquire(owner, ext, self.now)
    }

    pub fn release_if(&mut self, owner: Owner) {
        if self.state.gcr.current() != Some(owner) {
            return;
        }
        if let Some(since) = self.state.gcr.held_since() {
            trace!("gcr: {} released after {}ms", owner.as_str(), self.now.saturating_sub(since));
        }
        self.state.gcr.release();
    }

    pub fn map(&self, nx: f64, ny: f64) -> Point {
        let d = self.state.display_or_default();
        let rect = self.settings.calibration.rect_for(self.state.display_id());
        pointer::map_to_screen(&rect, d.size(), nx, ny)
    }

    /// Runs an input action; failures are logged and dropped.
    pub fn input(&mut self, what: &str, f: impl FnOnce(&mut dyn InputSink) -> Result<()>) -> bool {
        match f(&mut *self.sink) {
            Ok(()) => true,
            Err(e) => {
                warn!("{what} failed: {e}");
                false
            }
        }
    }

    pub fn window_op(
        &mut self,
        what: &str,
        f: impl FnOnce(&mut dyn WindowActuator) -> Result<()>,
    ) -> bool {
        match f(&mut *self.window) {
            Ok(()) => true,
            Err(e) => {
                warn!("window {what} failed: {e}");
                false
            }
        }
    }

    pub fn chord(&mut self, chord: &KeyChord) -> bool {
        self.input("key chord", |s| s.key_chord(chord))
    }
}

pub struct Engine<S: InputSink, W: WindowActuator> {
    state: EngineState,
    /// Settings as loaded/persisted, before profile overrides.
    base: Settings,
    settings: Settings,
    profiles: ProfileSet,
    profile: ActiveProfile,
    sink: S,
    window: W,
    events: Events,
    status: Status,
}

impl<S: InputSink, W: WindowActuator> Engine<S, W> {
    pub fn new(base: Settings, profiles: ProfileSet, sink: S, window: W, events: Events) -> Self {
        let profile = profiles.activate("default");
        let settings = resolve(&base, &profile.profile.overrides, &base.gestures);
        let mut state = EngineState::default();
        state.snap.order = settings.window.snap_order.clone();
        Self {
            status: Status {
                profile: profile.name.clone(),
                ..Default::default()
            },
            state,
            base,
            settings,
            profiles,
            profile,
            sink,
            window,
            events,
        }
    }

    fn ctx(&mut self, now: u64) -> Ctx<'_> {
        Ctx {
            now,
            state: &mut self.state,
            settings: &self.settings,
            profile: &self.profile,
            sink: &mut self.sink,
            window: &mut self.window,
            events: &self.events,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn profile(&self) -> &ActiveProfile {
        &self.profile
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    #[cfg(test)]
    pub fn state_mut(&mut self) -> &mut EngineState {
        &mut self.state
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[cfg(test)]
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    #[cfg(test)]
    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn set_display(&mut self, display: DisplayInfo) {
        if self.state.display.as_ref() != Some(&display) {
            debug!("active display {} {:?}", display.id, display.size());
            self.state.display = Some(display);
        }
    }

    /// Absolute pointer position, for nearest-display polling.
    pub fn cursor_abs(&self) -> Point {
        let b = self.state.display_or_default().bounds;
        let p = self.state.cursor.last_pt;
        Point::new(b.x as f64 + p.x, b.y as f64 + p.y)
    }

    pub fn on_frame(&mut self, frame: &Frame, now: u64) {
        let Some(hand) = frame.hands.first() else {
            self.hand_lost(now);
            return;
        };
        self.state.last_palm_vel = hand.palm_speed();

        let display = self.state.display_or_default();
        let rect = self.settings.calibration.rect_for(self.state.display_id());
        let pose = Pose::new(hand, frame.interaction_box, &rect, display.size());

        let th = &self.settings.thresholds;
        if self.settings.gestures.is_on(Flag::Cursor)
            && pose.palm_open(th.palm_open_grab_max)
            && pose.grab < th.deadman_grab
        {
            self.state.cursor.target = pose.local;
        }

        let mut ctx = self.ctx(now);
        gestures::on_frame(&mut ctx, &pose);

        if let Some(rect) = self.state.calibration.finished.take() {
            self.commit_calibration(rect);
        }
        self.publish(frame.hands.len(), Some(&pose));
    }

    /// Zero-hand frame or bridge loss: every held button, mode and lock is dropped.
    pub fn hand_lost(&mut self, now: u64) {
        let mut ctx = self.ctx(now);
        gestures::on_hand_lost(&mut ctx);
        self.state.gcr.release();
        self.publish(0, None);
    }

    pub fn on_tick(&mut self, now: u64) {
        let gain = pointer::adaptive_gain(&self.settings.pointer_gain, self.state.last_palm_vel);
        let th = &self.settings.thresholds;
        if let Some(p) = pointer::step(&mut self.state.cursor, th.smoothing, th.deadzone_px, gain) {
            let b = self.state.display_or_default().bounds;
            let (x, y) = (
                (b.x as f64 + p.x).round() as i32,
                (b.y as f64 + p.y).round() as i32,
            );
            if let Err(e) = self.sink.set_position(x, y) {
                warn!("pointer move failed: {e}");
            }
        }

        let steps = self.state.inertia.tick(&self.settings.scroll_inertia);
        if steps.y != 0
            && let Err(e) = self.sink.scroll_vertical(steps.y)
        {
            warn!("inertia scroll failed: {e}");
        }
        if steps.x != 0
            && let Err(e) = self.sink.scroll_horizontal(steps.x)
        {
            warn!("inertia scroll failed: {e}");
        }

        let mut ctx = self.ctx(now);
        gestures::on_tick(&mut ctx);
    }

    fn publish(&mut self, hands: usize, pose: Option<&Pose<'_>>) {
        let round2 = |v: f64| (v * 100.0).round() / 100.0;
        let st = &self.state;
        self.status = Status {
            hands,
            ext: pose.map(|p| p.ext).unwrap_or(0),
            pinch: pose.map(|p| round2(p.pinch)).unwrap_or(0.0),
            grab: pose.map(|p| round2(p.grab)).unwrap_or(0.0),
            x: pose.map(|p| p.local.x.round() as i32).unwrap_or(0),
            y: pose.map(|p| p.local.y.round() as i32).unwrap_or(0),
            window_mode: st.window.mode,
            dragging: st.drag.dragging || st.drag.three,
            cal_step: st.calibration.step,
            display_id: st.display_id(),
            gcr_lock: st.gcr.current().map(|o| o.as_str()),
            profile: self.profile.name.clone(),
        };
        self.events.send(DaemonEvent::Status(self.status.clone()));
    }

    // ---------- calibration ----------

    pub fn start_calibration(&mut self) {
        self.state.calibration.start();
        self.events
            .send(DaemonEvent::Calibration(CalEvent::at(CalMode::Start, CalStep::A)));
        self.events.tutor("Calibration: pinch bottom-left");
    }

    pub fn cancel_calibration(&mut self) {
        if self.state.calibration.cancel() {
            self.events.send(DaemonEvent::Calibration(CalEvent {
                mode: CalMode::Cancel,
                step: None,
                rect: None,
                display_id: None,
            }));
            self.events.tutor("Calibration cancelled");
        }
    }

    fn commit_calibration(&mut self, rect: Rect) {
        let did = self.state.display_id();
        for s in [&mut self.base, &mut self.settings] {
            match did {
                Some(id) => {
                    s.calibration.per_display.insert(id.to_string(), rect);
                }
                None => s.calibration.rect = rect,
            }
        }
        info!("calibration saved for display {did:?}: {rect:?}");
        self.events
            .send(DaemonEvent::Persist(Box::new(self.base.clone())));
        self.events.send(DaemonEvent::Calibration(CalEvent {
            mode: CalMode::Done,
            step: Some(CalStep::Done),
            rect: Some(rect),
            display_id: did,
        }));
        self.events.tutor("Calibration saved");
    }

    // ---------- profiles & flags ----------

    /// Focus changed to `app`; switches profile when it resolves differently.
    pub fn focus(&mut self, app: &str, now: u64) {
        let next = self.profiles.activate(app);
        if next.id != self.profile.id {
            self.apply_profile(next, now);
        }
    }

    pub fn use_profile(&mut self, id: &str, now: u64) -> Result<()> {
        if !self.profiles.profiles.contains_key(id) {
            return Err(anyhow!("unknown profile: {id}"));
        }
        let next = self.profiles.activate(id);
        self.apply_profile(next, now);
        Ok(())
    }

    fn apply_profile(&mut self, next: ActiveProfile, now: u64) {
        info!("profile: {} -> {}", self.profile.id, next.id);
        // Gestures in flight belong to the old profile.
        let mut ctx = self.ctx(now);
        gestures::on_hand_lost(&mut ctx);
        self.state.gcr.release();

        self.settings = resolve(&self.base, &next.profile.overrides, &self.settings.gestures);
        self.profile = next;
        self.state.inertia.stop();
        self.state.tap = Default::default();
        self.state.snap = Default::default();
        self.state.snap.order = self.settings.window.snap_order.clone();
        self.status.profile = self.profile.name.clone();
        self.events.tutor(format!("Profile: {}", self.profile.name));
    }

    /// New on-disk config. Flags come from the file this time.
    pub fn reload(&mut self, base: Settings, profiles: ProfileSet) {
        self.base = base;
        self.profiles = profiles;
        let next = self.profiles.activate(&self.profile.id);
        self.settings = resolve(&self.base, &next.profile.overrides, &self.base.gestures);
        self.profile = next;
        self.state.snap.order = self.settings.window.snap_order.clone();
        self.status.profile = self.profile.name.clone();
    }

    pub fn set_gesture(&mut self, flag: Flag, on: bool) {
        self.settings.gestures.set(flag, on);
        self.base.gestures.set(flag, on);
        info!("gesture {} {}", flag.as_str(), if on { "on" } else { "off" });
        self.events
            .send(DaemonEvent::Persist(Box::new(self.base.clone())));
    }

    pub fn gestures_json(&self) -> serde_json::Value {
        self.settings.gestures.to_json()
    }

    /// Tutor line from outside the recognizers (bridge state and the like).
    pub fn tutor(&self, msg: impl Into<String>) {
        self.events.tutor(msg);
    }

    #[cfg(test)]
    pub fn window_mode(&self) -> state::WindowMode {
        self.state.window.mode
    }
}
