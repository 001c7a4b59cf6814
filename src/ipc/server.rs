use anyhow::{Context, Result, anyhow};
use log::{error, info, warn};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use std::{
    fs,
    io::{self, BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    sync::mpsc::{Sender, channel},
    thread,
    time::Duration,
};

use super::dispatch::{self, Request, Response};
use super::pipeline::{Daemon, EngineInput, run_engine};
use super::runtime::socket_path;
use crate::actions::UinputSink;
use crate::bridge;
use crate::config::DaemonConfigState;
use crate::display::{DisplayProvider, StaticDisplays};
use crate::window::HelperWindow;

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn run_daemon() -> Result<()> {
    // socket
    let sock = socket_path()?;
    if sock.exists() {
        if UnixStream::connect(&sock).is_ok() {
            return Err(anyhow!(
                "handctl daemon already running at {}",
                sock.display()
            ));
        }
        let _ = fs::remove_file(&sock);
    }
    let listener =
        UnixListener::bind(&sock).with_context(|| format!("failed to bind {}", sock.display()))?;
    info!("daemon: listening on {}", sock.display());

    // config
    let cfg = DaemonConfigState::load_or_install_default()?;
    info!("daemon: config {}", cfg.settings_path.display());

    let (tx, rx) = channel::<EngineInput>();
    bridge::spawn(cfg.settings.bridge.clone(), tx.clone())?;
    let _watcher = match watch_config(&cfg, tx.clone()) {
        Ok(w) => Some(w),
        Err(e) => {
            warn!("config watch unavailable, use `handctl reload`: {e}");
            None
        }
    };
    spawn_signal_handler(tx.clone())?;

    // engine thread owns every stateful collaborator
    let engine = thread::Builder::new()
        .name("engine".into())
        .spawn(move || {
            let displays = StaticDisplays::detect(&cfg.settings.displays);
            let sink = UinputSink::new(displays.extent()).unwrap_or_else(|e| {
                warn!("uinput unavailable ({e}); input actions will be dropped");
                UinputSink::noop()
            });
            let window = HelperWindow::new(cfg.settings.window.helper.clone());
            if !window.has_helper() {
                info!("no window helper; only moves are supported (via xdotool)");
            }
            run_engine(Daemon::new(cfg, sink, window, Box::new(displays)), rx);
        })?;

    // accept loop
    listener.set_nonblocking(true)?;
    let mut clients: Vec<thread::JoinHandle<()>> = Vec::new();
    while !engine.is_finished() {
        match listener.accept() {
            Ok((stream, _)) => {
                let tx = tx.clone();
                clients.retain(|h| !h.is_finished());
                clients.push(thread::spawn(move || {
                    if let Err(e) = handle_client(stream, &tx) {
                        error!("ipc client error: {e}");
                    }
                }));
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(20));
            }
            Err(e) => {
                error!("accept failed: {e}");
                thread::sleep(Duration::from_millis(200));
            }
        }
    }

    // let the `stop` caller read its reply
    for h in clients {
        let _ = h.join();
    }
    let _ = fs::remove_file(&sock);
    info!("daemon: stopped");
    Ok(())
}

fn handle_client(mut stream: UnixStream, tx: &Sender<EngineInput>) -> Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(REPLY_TIMEOUT))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }
    let resp = match dispatch::parse(&line) {
        Ok(req) => forward(req, tx),
        Err(e) => Response::err(format!("{e:#}")),
    };
    writeln!(stream, "{}", serde_json::to_string(&resp)?)?;
    Ok(())
}

/// Hands a request to the engine thread and waits for its answer.
fn forward(req: Request, tx: &Sender<EngineInput>) -> Response {
    let (reply_tx, reply_rx) = channel();
    if tx.send(EngineInput::Request(req, reply_tx)).is_err() {
        return Response::err("engine is not running");
    }
    reply_rx
        .recv_timeout(REPLY_TIMEOUT)
        .unwrap_or_else(|_| Response::err("engine did not answer"))
}

fn watch_config(cfg: &DaemonConfigState, tx: Sender<EngineInput>) -> notify::Result<RecommendedWatcher> {
    let files = [cfg.settings_path.clone(), cfg.profiles_path.clone()];
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(ev)
                if (ev.kind.is_modify() || ev.kind.is_create())
                    && ev.paths.iter().any(|p| files.contains(p)) =>
            {
                let _ = tx.send(EngineInput::ConfigChanged);
            }
            Ok(_) => {}
            Err(e) => warn!("config watch error: {e}"),
        }
    })?;
    watcher.watch(&cfg.config_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

fn spawn_signal_handler(tx: Sender<EngineInput>) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("daemon: signal {sig}, shutting down");
                let _ = tx.send(EngineInput::Shutdown);
            }
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_gets_error_line_for_bad_request() {
        let (a, mut b) = UnixStream::pair().unwrap();
        let (tx, _rx) = channel();
        let t = thread::spawn(move || handle_client(a, &tx));
        b.write_all(b"{\"op\":\"fly\"}\n").unwrap();
        let mut line = String::new();
        BufReader::new(&b).read_line(&mut line).unwrap();
        t.join().unwrap().unwrap();
        let resp: Response = serde_json::from_str(&line).unwrap();
        assert!(!resp.ok);
        assert!(resp.error.unwrap().contains("bad request"));
    }

    #[test]
    fn forward_reports_stopped_engine() {
        let (tx, rx) = channel();
        drop(rx);
        let resp = forward(Request::Status, &tx);
        assert_eq!(resp.error.as_deref(), Some("engine is not running"));
    }

    #[test]
    fn forward_relays_engine_reply() {
        let (tx, rx) = channel::<EngineInput>();
        let engine = thread::spawn(move || {
            if let Ok(EngineInput::Request(Request::List, reply)) = rx.recv() {
                let _ = reply.send(Response::ok(serde_json::json!(["default"])));
            }
        });
        let resp = forward(Request::List, &tx);
        engine.join().unwrap();
        assert_eq!(resp.data, Some(serde_json::json!(["default"])));
    }
}
