use anyhow::{Result, anyhow};
use pico_args::Arguments;
use serde_json::json;
use std::{env, process::Command};

use crate::actions::{Button, InputSink, UinputSink};
use crate::config::DaemonConfigState;
use crate::display::{DisplayProvider, StaticDisplays};
use crate::ipc;
use crate::keys::KeyChord;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        return ipc::run_daemon();
    }

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            match topic {
                Some(t) => print_subcmd_help(&t),
                None => print_help(),
            }
            Ok(())
        }

        Some("start") => {
            let exe = env::current_exe()?;
            let child = Command::new(exe).arg("--daemon").spawn()?;
            println!("handctl: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("stop") => request(json!({"op": "shutdown"})),
        Some("status") => request(json!({"op": "status"})),
        Some("reload") => request(json!({"op": "reload"})),
        Some("list") => request(json!({"op": "list"})),
        Some("doctor") => request(json!({"op": "doctor"})),
        Some("gestures") => request(json!({"op": "gestures"})),

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl use <profile>"))?;
            request(json!({"op": "use", "profile": name}))
        }

        Some("focus") => {
            let app: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl focus <app>"))?;
            request(json!({"op": "focus", "app": app}))
        }

        Some("calibrate") => {
            let action: String = pargs.free_from_str().unwrap_or_else(|_| "start".into());
            if !matches!(action.as_str(), "start" | "cancel") {
                return Err(anyhow!("usage: handctl calibrate [start|cancel]"));
            }
            request(json!({"op": "calibrate", "action": action}))
        }

        Some("gesture") => {
            let usage = || anyhow!("usage: handctl gesture <name> <on|off>");
            let name: String = pargs.free_from_str().map_err(|_| usage())?;
            let state: String = pargs.free_from_str().map_err(|_| usage())?;
            let on = match state.as_str() {
                "on" => true,
                "off" => false,
                _ => return Err(usage()),
            };
            request(json!({"op": "gesture", "name": name, "on": on}))
        }

        Some("emit") => emit(&mut pargs),

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn request(req: serde_json::Value) -> Result<()> {
    let r = ipc::client_request(req)?;
    print_response(&r);
    Ok(())
}

/// Drives the virtual device directly, without the daemon.
fn emit(pargs: &mut Arguments) -> Result<()> {
    let what: String = pargs
        .free_from_str()
        .map_err(|_| anyhow!("usage: handctl emit <click|scroll|hscroll|key|move> ..."))?;
    let cfg = DaemonConfigState::load_or_install_default()?;
    let displays = StaticDisplays::detect(&cfg.settings.displays);
    let mut sink = UinputSink::new(displays.extent())?;
    match what.as_str() {
        "click" => {
            let btn: Button = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl emit click <left|right|middle>"))?;
            sink.click(btn)?;
            println!("ok: clicked {btn:?}");
        }
        "scroll" => {
            let steps: i32 = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl emit scroll <steps>"))?;
            sink.scroll_vertical(steps)?;
            println!("ok: scrolled vertical {steps}");
        }
        "hscroll" => {
            let steps: i32 = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl emit hscroll <steps>"))?;
            sink.scroll_horizontal(steps)?;
            println!("ok: scrolled horizontal {steps}");
        }
        "key" => {
            let chord: KeyChord = pargs
                .free_from_str()
                .map_err(|e| anyhow!("usage: handctl emit key CTRL+EQUAL ({e})"))?;
            sink.key_chord(&chord)?;
            println!("ok: sent key chord {chord}");
        }
        "move" => {
            let usage = || anyhow!("usage: handctl emit move <x> <y>");
            let x: i32 = pargs.free_from_str().map_err(|_| usage())?;
            let y: i32 = pargs.free_from_str().map_err(|_| usage())?;
            sink.set_position(x, y)?;
            println!("ok: moved to {x},{y}");
        }
        other => return Err(anyhow!("unknown emit kind: {other}")),
    }
    Ok(())
}

fn print_help() {
    println!(
        r#"handctl: hand-tracking gesture daemon

USAGE:
  handctl help [command]                   Show general or command-specific help
  handctl start                            Start the daemon
  handctl stop                             Stop the daemon
  handctl status                           Show live status, profile and bridge state
  handctl reload                           Reload config and profiles
  handctl use <profile>                    Force a profile until focus changes
  handctl focus <app>                      Report the focused application
  handctl list                             List profiles
  handctl doctor                           Diagnose permissions and setup
  handctl calibrate [start|cancel]         Two-point pinch calibration
  handctl gesture <name> <on|off>          Toggle a gesture
  handctl gestures                         Show gesture switches
  handctl emit click <left|right|middle>   Emit a mouse click
  handctl emit scroll <steps>              Emit vertical scroll (+ is up)
  handctl emit hscroll <steps>             Emit horizontal scroll (+ is right)
  handctl emit key CTRL+EQUAL              Emit a key or chord
  handctl emit move <x> <y>                Move the pointer (absolute)

FILES:
  ~/.config/handctl/config.toml    thresholds, flags, calibration, bridge
  ~/.config/handctl/profiles.toml  per-application profiles
  ~/.local/run/handctl.sock        control socket

Set RUST_LOG=debug for per-frame logging.
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!("usage: handctl start\nStarts the background daemon."),
        "stop" => println!("usage: handctl stop\nStops the daemon; held buttons are released."),
        "status" => println!(
            "usage: handctl status\nShows the latest status broadcast, active profile, bridge connection and last tutor message."
        ),
        "reload" => println!(
            "usage: handctl reload\nRe-reads config.toml and profiles.toml; keeps the last good config on error."
        ),
        "use" => println!(
            "usage: handctl use <profile>\nActivates <profile> until the focused application changes."
        ),
        "focus" => println!(
            "usage: handctl focus <app>\nSelects the profile for <app>, falling back to 'default'."
        ),
        "list" => println!("usage: handctl list\nLists profiles and the active one."),
        "doctor" => println!(
            "usage: handctl doctor\nChecks /dev/uinput, input group membership, config paths, window helper and displays."
        ),
        "calibrate" => println!(
            "usage: handctl calibrate [start|cancel]\nPinch at the bottom-left, release, then pinch at the top-right."
        ),
        "gesture" | "gestures" => println!(
            "usage: handctl gesture <name> <on|off>\n       handctl gestures\nNames: cursor, pinch_click, drag, three_finger_drag, scroll, os_swipes,\n       window_move, window_resize, snap_cycle, show_desktop, launchpad, dwell_click"
        ),
        "emit" => println!(
            "usage:\n  handctl emit click <left|right|middle>\n  handctl emit scroll <steps>\n  handctl emit hscroll <steps>\n  handctl emit key CTRL+EQUAL\n  handctl emit move <x> <y>"
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
