use anyhow::{Context, Result, anyhow};
use directories::UserDirs;
use log::{info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::bindings::Binding;
use crate::display::DisplayInfo;
use crate::frame::InteractionBox;
use crate::keys::KeyChord;
use crate::window::SnapPosition;

// ---------------- persisted settings ----------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub smoothing: f64,
    pub deadzone_px: f64,
    pub pinch_on: f64,
    pub pinch_tap_ms: u64,
    pub tap_move_px: f64,
    pub index_grip_min: f64,
    pub grab_on: f64,
    pub grab_off: f64,
    pub still_vel: f64,
    pub palm_open_grab_max: f64,
    pub deadman_grab: f64,
    pub swipe_min_vel: f64,
    pub swipe_max_grab: f64,
    pub swipe_cooldown_ms: u64,
    pub three_swipe_cooldown_ms: u64,
    pub five_hold_ms: u64,
    pub launchpad_pinch: f64,
    pub launchpad_cooldown_ms: u64,
    pub window_tick_ms: u64,
    pub window_enter_guard_ms: u64,
    pub window_pinch_on: f64,
    pub window_pinch_off: f64,
    pub move_jitter_px: f64,
    pub resize_jitter_px: f64,
    pub resize_roll_gain: f64,
    pub resize_pitch_gain: f64,
    pub move_snap_swipe_vel: f64,
    pub snap_tap_max: f64,
    pub snap_cooldown_ms: u64,
    pub calibration_pinch: f64,
    pub calibration_min_span: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            smoothing: 0.22,
            deadzone_px: 2.0,
            pinch_on: 0.80,
            pinch_tap_ms: 220,
            tap_move_px: 10.0,
            index_grip_min: 0.35,
            grab_on: 0.50,
            grab_off: 0.35,
            still_vel: 120.0,
            palm_open_grab_max: 0.2,
            deadman_grab: 0.7,
            swipe_min_vel: 900.0,
            swipe_max_grab: 0.2,
            swipe_cooldown_ms: 900,
            three_swipe_cooldown_ms: 700,
            five_hold_ms: 400,
            launchpad_pinch: 0.9,
            launchpad_cooldown_ms: 1200,
            window_tick_ms: 20,
            window_enter_guard_ms: 120,
            window_pinch_on: 0.8,
            window_pinch_off: 0.6,
            move_jitter_px: 0.5,
            resize_jitter_px: 1.0,
            resize_roll_gain: 800.0,
            resize_pitch_gain: 600.0,
            move_snap_swipe_vel: 800.0,
            snap_tap_max: 0.9,
            snap_cooldown_ms: 400,
            calibration_pinch: 0.85,
            calibration_min_span: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub tick_ms: u64,
    pub display_poll_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            tick_ms: 8,
            display_poll_ms: 150,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Clicks {
    pub double_pinch_ms: u64,
    pub enable_middle_triple: bool,
}

impl Default for Clicks {
    fn default() -> Self {
        Self {
            double_pinch_ms: 350,
            enable_middle_triple: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dwell {
    pub enabled: bool,
    pub ms: u64,
    pub radius_px: f64,
    pub cooldown_ms: u64,
}

impl Default for Dwell {
    fn default() -> Self {
        Self {
            enabled: true,
            ms: 650,
            radius_px: 10.0,
            cooldown_ms: 800,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerGain {
    pub enabled: bool,
    pub gain_min: f64,
    pub gain_max: f64,
    pub vel_low: f64,
    pub vel_high: f64,
}

impl Default for PointerGain {
    fn default() -> Self {
        Self {
            enabled: true,
            gain_min: 1.0,
            gain_max: 2.2,
            vel_low: 200.0,
            vel_high: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollTuning {
    /// Notches per pixel of midpoint travel.
    pub flick_gain: f64,
    /// Share of `flick_gain` applied to the frame-normalised velocity.
    pub velocity_gain: f64,
    pub step_min: i32,
    pub step_max: i32,
    pub expo: f64,
    pub inertia_boost: f64,
    pub ramp_ticks: u32,
    /// Reference frame interval velocities are normalised to.
    pub frame_ms: f64,
}

impl Default for ScrollTuning {
    fn default() -> Self {
        Self {
            flick_gain: 0.22,
            velocity_gain: 0.6,
            step_min: 1,
            step_max: 6,
            expo: 1.0,
            inertia_boost: 1.0,
            ramp_ticks: 6,
            frame_ms: 16.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollInertia {
    pub enabled: bool,
    pub decay: f64,
    pub min_step: f64,
}

impl Default for ScrollInertia {
    fn default() -> Self {
        Self {
            enabled: true,
            decay: 0.90,
            min_step: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomTuning {
    pub pinch_on: f64,
    pub pinch_off: f64,
    pub dist_on: f64,
    pub dist_off: f64,
    pub dist_to_wheel: f64,
}

impl Default for ZoomTuning {
    fn default() -> Self {
        Self {
            pinch_on: 0.75,
            pinch_off: 0.55,
            dist_on: 0.015,
            dist_off: 0.008,
            dist_to_wheel: 300.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowTuning {
    pub move_scale: f64,
    pub resize_scale: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub helper: Option<PathBuf>,
    pub snap_order: Vec<SnapPosition>,
}

impl Default for WindowTuning {
    fn default() -> Self {
        Self {
            move_scale: 1.0,
            resize_scale: 1.0,
            helper: None,
            snap_order: SnapPosition::default_order(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub three_finger_drag: bool,
    pub zoom_with_modifier_scroll: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            three_finger_drag: true,
            zoom_with_modifier_scroll: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Cursor,
    PinchClick,
    Drag,
    ThreeFingerDrag,
    Scroll,
    OsSwipes,
    WindowMove,
    WindowResize,
    SnapCycle,
    ShowDesktop,
    Launchpad,
    DwellClick,
}

impl Flag {
    pub const ALL: [Flag; 12] = [
        Flag::Cursor,
        Flag::PinchClick,
        Flag::Drag,
        Flag::ThreeFingerDrag,
        Flag::Scroll,
        Flag::OsSwipes,
        Flag::WindowMove,
        Flag::WindowResize,
        Flag::SnapCycle,
        Flag::ShowDesktop,
        Flag::Launchpad,
        Flag::DwellClick,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Cursor => "cursor",
            Flag::PinchClick => "pinch_click",
            Flag::Drag => "drag",
            Flag::ThreeFingerDrag => "three_finger_drag",
            Flag::Scroll => "scroll",
            Flag::OsSwipes => "os_swipes",
            Flag::WindowMove => "window_move",
            Flag::WindowResize => "window_resize",
            Flag::SnapCycle => "snap_cycle",
            Flag::ShowDesktop => "show_desktop",
            Flag::Launchpad => "launchpad",
            Flag::DwellClick => "dwell_click",
        }
    }
}

impl FromStr for Flag {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Flag::ALL
            .into_iter()
            .find(|f| f.as_str() == s.trim())
            .ok_or_else(|| anyhow!("unknown gesture: {s}"))
    }
}

/// Per-gesture enable switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureFlags {
    pub cursor: bool,
    pub pinch_click: bool,
    pub drag: bool,
    pub three_finger_drag: bool,
    pub scroll: bool,
    pub os_swipes: bool,
    pub window_move: bool,
    pub window_resize: bool,
    pub snap_cycle: bool,
    pub show_desktop: bool,
    pub launchpad: bool,
    pub dwell_click: bool,
}

impl Default for GestureFlags {
    fn default() -> Self {
        Self {
            cursor: true,
            pinch_click: true,
            drag: true,
            three_finger_drag: true,
            scroll: true,
            os_swipes: true,
            window_move: true,
            window_resize: true,
            snap_cycle: true,
            show_desktop: true,
            launchpad: true,
            dwell_click: true,
        }
    }
}

impl GestureFlags {
    fn slot(&mut self, flag: Flag) -> &mut bool {
        match flag {
            Flag::Cursor => &mut self.cursor,
            Flag::PinchClick => &mut self.pinch_click,
            Flag::Drag => &mut self.drag,
            Flag::ThreeFingerDrag => &mut self.three_finger_drag,
            Flag::Scroll => &mut self.scroll,
            Flag::OsSwipes => &mut self.os_swipes,
            Flag::WindowMove => &mut self.window_move,
            Flag::WindowResize => &mut self.window_resize,
            Flag::SnapCycle => &mut self.snap_cycle,
            Flag::ShowDesktop => &mut self.show_desktop,
            Flag::Launchpad => &mut self.launchpad,
            Flag::DwellClick => &mut self.dwell_click,
        }
    }

    pub fn is_on(&self, flag: Flag) -> bool {
        match flag {
            Flag::Cursor => self.cursor,
            Flag::PinchClick => self.pinch_click,
            Flag::Drag => self.drag,
            Flag::ThreeFingerDrag => self.three_finger_drag,
            Flag::Scroll => self.scroll,
            Flag::OsSwipes => self.os_swipes,
            Flag::WindowMove => self.window_move,
            Flag::WindowResize => self.window_resize,
            Flag::SnapCycle => self.snap_cycle,
            Flag::ShowDesktop => self.show_desktop,
            Flag::Launchpad => self.launchpad,
            Flag::DwellClick => self.dwell_click,
        }
    }

    pub fn set(&mut self, flag: Flag, on: bool) {
        *self.slot(flag) = on;
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = Flag::ALL
            .iter()
            .map(|f| (f.as_str().to_string(), self.is_on(*f).into()))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// Normalised usable sub-region of the interaction box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Default for Rect {
    fn default() -> Self {
        Self {
            x0: 0.0,
            y0: 0.0,
            x1: 1.0,
            y1: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationStore {
    pub rect: Rect,
    /// Keyed by display id.
    pub per_display: BTreeMap<String, Rect>,
}

impl CalibrationStore {
    pub fn rect_for(&self, display_id: Option<u32>) -> Rect {
        display_id
            .and_then(|id| self.per_display.get(&id.to_string()).copied())
            .unwrap_or(self.rect)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsKeys {
    pub prev_desktop: KeyChord,
    pub next_desktop: KeyChord,
    pub overview_up: KeyChord,
    pub overview_down: KeyChord,
    pub show_desktop: KeyChord,
    pub launchpad: KeyChord,
    pub zoom_modifier: KeyChord,
}

impl Default for OsKeys {
    fn default() -> Self {
        let chord = |s: &str| s.parse::<KeyChord>().unwrap_or(KeyChord(vec![]));
        Self {
            prev_desktop: chord("CTRL+ALT+LEFT"),
            next_desktop: chord("CTRL+ALT+RIGHT"),
            overview_up: chord("CTRL+ALT+UP"),
            overview_down: chord("CTRL+ALT+DOWN"),
            show_desktop: chord("SUPER+D"),
            launchpad: chord("SUPER+A"),
            zoom_modifier: chord("CTRL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    pub reconnect_ms: u64,
    pub interaction_box: InteractionBox,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            reconnect_ms: 500,
            interaction_box: InteractionBox::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSettings {
    pub auto: bool,
    /// Prints the focused application id on stdout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_command: Option<String>,
    pub focus_poll_ms: u64,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            auto: true,
            focus_command: Some("xdotool getactivewindow getwindowclassname".into()),
            focus_poll_ms: 800,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub thresholds: Thresholds,
    pub timing: Timing,
    pub clicks: Clicks,
    pub dwell: Dwell,
    pub pointer_gain: PointerGain,
    pub scroll: ScrollTuning,
    pub scroll_inertia: ScrollInertia,
    pub zoom: ZoomTuning,
    pub window: WindowTuning,
    pub options: Options,
    pub gestures: GestureFlags,
    pub calibration: CalibrationStore,
    pub keys: OsKeys,
    pub bridge: BridgeConfig,
    pub profiles: ProfileSettings,
    pub displays: Vec<DisplayInfo>,
}

pub fn validate_settings(s: &Settings) -> Result<()> {
    let t = &s.thresholds;
    if t.pinch_tap_ms == 0 || t.window_tick_ms == 0 || s.timing.tick_ms == 0 {
        return Err(anyhow!("thresholds must be positive durations"));
    }
    if t.grab_off >= t.grab_on {
        return Err(anyhow!("thresholds.grab_off must be below grab_on"));
    }
    if t.window_pinch_off >= t.window_pinch_on {
        return Err(anyhow!(
            "thresholds.window_pinch_off must be below window_pinch_on"
        ));
    }
    if s.zoom.pinch_off >= s.zoom.pinch_on || s.zoom.dist_off >= s.zoom.dist_on {
        return Err(anyhow!("zoom off thresholds must be below on thresholds"));
    }
    if !(0.0..=1.0).contains(&t.smoothing) || !(0.0..1.0).contains(&s.scroll_inertia.decay) {
        return Err(anyhow!("smoothing and scroll_inertia.decay must be in [0,1)"));
    }
    if s.pointer_gain.vel_high <= s.pointer_gain.vel_low {
        return Err(anyhow!("pointer_gain.vel_high must exceed vel_low"));
    }
    if s.scroll.step_min < 0 || s.scroll.step_max < s.scroll.step_min {
        return Err(anyhow!("scroll.step_max must be >= step_min >= 0"));
    }
    if s.window.snap_order.is_empty() {
        return Err(anyhow!("window.snap_order must not be empty"));
    }
    let rects = std::iter::once(("calibration.rect".to_string(), &s.calibration.rect)).chain(
        s.calibration
            .per_display
            .iter()
            .map(|(k, r)| (format!("calibration.per_display.{k}"), r)),
    );
    for (name, r) in rects {
        if !(r.x1 > r.x0 && r.y1 > r.y0) {
            return Err(anyhow!("{name} must satisfy x0 < x1 and y0 < y1"));
        }
    }
    Ok(())
}

// ---------------- profiles ----------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerGainOverride {
    pub enabled: Option<bool>,
    pub gain_min: Option<f64>,
    pub gain_max: Option<f64>,
    pub vel_low: Option<f64>,
    pub vel_high: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollInertiaOverride {
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Overrides {
    pub three_finger_drag: Option<bool>,
    pub zoom_with_modifier_scroll: Option<bool>,
    pub pointer_gain: Option<PointerGainOverride>,
    pub scroll_inertia: Option<ScrollInertiaOverride>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    pub name: Option<String>,
    #[serde(default)]
    pub overrides: Overrides,

    // Accept nested/dotted tables and flatten them into "a.b" -> "value"
    #[serde(default, deserialize_with = "deserialize_bindings_flat")]
    pub bindings: HashMap<String, String>,
}

// --------- custom bindings deserializer (tolerant) ----------
fn deserialize_bindings_flat<'de, D>(
    de: D,
) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = toml::Value::deserialize(de)?;
    let table = match val {
        toml::Value::Table(t) => t,
        other => {
            return Err(serde::de::Error::custom(format!(
                "bindings must be a table, got {:?}",
                other.type_str()
            )));
        }
    };

    let mut out = HashMap::new();
    flatten_table("", &table, &mut out).map_err(serde::de::Error::custom)?;
    Ok(out)
}

fn flatten_table(
    prefix: &str,
    table: &toml::value::Table,
    out: &mut HashMap<String, String>,
) -> std::result::Result<(), String> {
    for (k, v) in table {
        let key = if prefix.is_empty() {
            k.clone()
        } else {
            format!("{prefix}.{k}")
        };
        match v {
            toml::Value::String(s) => {
                out.insert(key, s.clone());
            }
            toml::Value::Table(sub) => {
                flatten_table(&key, sub, out)?;
            }
            other => {
                return Err(format!(
                    "binding '{}' value must be a string, got {}",
                    key,
                    other.type_str()
                ));
            }
        }
    }
    Ok(())
}
// ------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileSet {
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

/// The profile in force for the focused application.
#[derive(Debug, Clone, Default)]
pub struct ActiveProfile {
    pub id: String,
    pub name: String,
    pub profile: Profile,
}

impl ActiveProfile {
    pub fn binding(&self, key: &str) -> Option<Binding> {
        self.profile
            .bindings
            .get(key)
            .and_then(|s| s.parse::<Binding>().ok())
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({"id": self.id, "name": self.name})
    }
}

impl ProfileSet {
    pub fn parse(text: &str) -> Result<Self> {
        let set: ProfileSet = toml::from_str(text)?;
        for (id, p) in &set.profiles {
            validate_profile(id, p)?;
        }
        Ok(set)
    }

    /// Profile for `app`, else `default`, else an empty profile.
    pub fn activate(&self, app: &str) -> ActiveProfile {
        let (id, profile) = match self.profiles.get(app) {
            Some(p) => (app, p.clone()),
            None => (
                "default",
                self.profiles.get("default").cloned().unwrap_or_default(),
            ),
        };
        let id = if app.is_empty() { "default" } else { id };
        ActiveProfile {
            id: id.to_string(),
            name: profile.name.clone().unwrap_or_else(|| id.to_string()),
            profile,
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }
}

fn validate_profile(id: &str, p: &Profile) -> Result<()> {
    for (k, v) in &p.bindings {
        if k.trim().is_empty() {
            return Err(anyhow!("profile '{id}': empty binding key"));
        }
        v.parse::<Binding>()
            .map_err(|e| anyhow!("profile '{id}': binding '{k}': {e}"))?;
    }
    if let Some(pg) = &p.overrides.pointer_gain
        && let (Some(lo), Some(hi)) = (pg.vel_low, pg.vel_high)
        && hi <= lo
    {
        return Err(anyhow!("profile '{id}': pointer_gain.vel_high <= vel_low"));
    }
    Ok(())
}

/// Applies profile overrides on top of `base`; gesture flags always come from `live_flags`.
pub fn resolve(base: &Settings, overrides: &Overrides, live_flags: &GestureFlags) -> Settings {
    let mut out = base.clone();
    out.gestures = live_flags.clone();
    if let Some(v) = overrides.three_finger_drag {
        out.options.three_finger_drag = v;
    }
    if let Some(v) = overrides.zoom_with_modifier_scroll {
        out.options.zoom_with_modifier_scroll = v;
    }
    if let Some(pg) = &overrides.pointer_gain {
        let g = &mut out.pointer_gain;
        g.enabled = pg.enabled.unwrap_or(g.enabled);
        g.gain_min = pg.gain_min.unwrap_or(g.gain_min);
        g.gain_max = pg.gain_max.unwrap_or(g.gain_max);
        g.vel_low = pg.vel_low.unwrap_or(g.vel_low);
        g.vel_high = pg.vel_high.unwrap_or(g.vel_high);
    }
    if let Some(en) = overrides.scroll_inertia.as_ref().and_then(|si| si.enabled) {
        out.scroll_inertia.enabled = en;
    }
    out
}

// ---------------- on-disk state ----------------

#[derive(Debug, Clone)]
pub struct DaemonConfigState {
    pub settings: Settings,
    pub profiles: ProfileSet,
    pub config_dir: PathBuf,
    pub settings_path: PathBuf,
    pub profiles_path: PathBuf,
    /// File contents as last loaded or written by us.
    seen: (String, String),
}

pub fn config_dir() -> PathBuf {
    let home = UserDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(".config").join("handctl")
}

fn default_profiles_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl DaemonConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        Self::load_from(config_dir())
    }

    pub fn load_from(cfgdir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&cfgdir)
            .with_context(|| format!("failed to create {}", cfgdir.display()))?;

        let settings_path = cfgdir.join("config.toml");
        if !settings_path.exists() {
            let text = toml::to_string_pretty(&Settings::default())?;
            fs::write(&settings_path, text)?;
            info!("installed default config at {}", settings_path.display());
        }
        let profiles_path = cfgdir.join("profiles.toml");
        if !profiles_path.exists() {
            fs::write(&profiles_path, default_profiles_text())?;
            info!("installed default profiles at {}", profiles_path.display());
        }

        let settings_txt = read(&settings_path)?;
        let profiles_txt = read(&profiles_path)?;
        let settings = parse_settings(&settings_path, &settings_txt)?;
        let profiles = parse_profiles(&profiles_path, &profiles_txt)?;
        Ok(Self {
            settings,
            profiles,
            config_dir: cfgdir,
            settings_path,
            profiles_path,
            seen: (settings_txt, profiles_txt),
        })
    }

    /// Re-reads both files; on error the previous state is kept.
    pub fn reload(&mut self) -> Result<()> {
        let settings_txt = read(&self.settings_path)?;
        let profiles_txt = read(&self.profiles_path)?;
        self.settings = parse_settings(&self.settings_path, &settings_txt)?;
        self.profiles = parse_profiles(&self.profiles_path, &profiles_txt)?;
        self.seen = (settings_txt, profiles_txt);
        Ok(())
    }

    /// True when either file differs from what was last loaded or saved.
    /// Unreadable files count as changed so the reload reports the error.
    pub fn changed_on_disk(&self) -> bool {
        match (read(&self.settings_path), read(&self.profiles_path)) {
            (Ok(s), Ok(p)) => (s, p) != self.seen,
            _ => true,
        }
    }

    pub fn save_settings(&mut self, settings: &Settings) -> Result<()> {
        let text = toml::to_string_pretty(settings)?;
        let tmp = self.settings_path.with_extension("toml.tmp");
        fs::write(&tmp, &text)?;
        fs::rename(&tmp, &self.settings_path)?;
        self.seen.0 = text;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        self.profiles.names()
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let uinput_ok = Path::new("/dev/uinput").exists();
        let in_input_group = check_in_input_group();
        let helper = self.settings.window.helper.as_ref();
        serde_json::json!({
            "uinput_present": uinput_ok,
            "input_group_member": in_input_group,
            "config": self.settings_path,
            "profiles": self.profiles_path,
            "bridge": format!("{}:{}", self.settings.bridge.host, self.settings.bridge.port),
            "window_helper": helper,
            "window_helper_present": helper.map(|p| p.exists()).unwrap_or(false),
            "displays": self.settings.displays,
            "hints": {
                "udev_rule": "/etc/udev/rules.d/80-uinput.rules",
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
            }
        })
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| anyhow!("failed to read {}: {e}", path.display()))
}

fn parse_settings(path: &Path, txt: &str) -> Result<Settings> {
    let settings: Settings =
        toml::from_str(txt).map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))?;
    validate_settings(&settings).map_err(|e| anyhow!("{}: {e}", path.display()))?;
    Ok(settings)
}

fn parse_profiles(path: &Path, txt: &str) -> Result<ProfileSet> {
    ProfileSet::parse(txt).map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))
}

fn check_in_input_group() -> bool {
    match fs::read_to_string("/etc/group") {
        Ok(s) => {
            let user = whoami::username();
            s.lines().filter(|l| l.starts_with("input:")).any(|line| {
                line.split(':')
                    .nth(3)
                    .unwrap_or("")
                    .split(',')
                    .any(|u| u == user)
            })
        }
        Err(e) => {
            warn!("cannot read /etc/group: {e}");
            false
        }
    }
}
