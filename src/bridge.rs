//! Tracking-bridge client. The middleware streams one JSON frame per line
//! over TCP; the reader thread reconnects forever.

use log::{debug, info, warn};
use std::{
    io::{self, BufRead, BufReader},
    net::TcpStream,
    sync::mpsc::Sender,
    thread,
    time::Duration,
};

use crate::config::BridgeConfig;
use crate::frame::{Frame, InteractionBox, parse_line};

#[derive(Debug, Clone)]
pub enum BridgeEvent {
    Connected,
    Frame(Frame),
    /// Read failure on an established connection.
    Error(String),
    Disconnected,
}

/// Spawns the reader thread. It exits once `tx`'s receiver is gone.
pub fn spawn<T>(cfg: BridgeConfig, tx: Sender<T>) -> io::Result<thread::JoinHandle<()>>
where
    T: From<BridgeEvent> + Send + 'static,
{
    thread::Builder::new()
        .name("bridge".into())
        .spawn(move || run(cfg, tx))
}

fn run<T: From<BridgeEvent>>(cfg: BridgeConfig, tx: Sender<T>) {
    let addr = format!("{}:{}", cfg.host, cfg.port);
    let backoff = Duration::from_millis(cfg.reconnect_ms.max(10));
    let mut warned = false;

    loop {
        match TcpStream::connect(&addr) {
            Ok(stream) => {
                warned = false;
                info!("bridge: connected to {addr}");
                if tx.send(BridgeEvent::Connected.into()).is_err() {
                    return;
                }
                match pump(BufReader::new(stream), cfg.interaction_box, &tx) {
                    Ok(true) => {}
                    Ok(false) => return,
                    Err(e) => {
                        warn!("bridge: read failed: {e}");
                        if tx.send(BridgeEvent::Error(e.to_string()).into()).is_err() {
                            return;
                        }
                    }
                }
                info!("bridge: disconnected from {addr}");
                if tx.send(BridgeEvent::Disconnected.into()).is_err() {
                    return;
                }
            }
            Err(e) if !warned => {
                warn!("bridge: cannot reach {addr}: {e}; retrying every {backoff:?}");
                warned = true;
            }
            Err(e) => debug!("bridge: connect {addr}: {e}"),
        }
        thread::sleep(backoff);
    }
}

/// Forwards every parseable line until EOF. `Ok(false)` when nobody listens anymore.
pub(crate) fn pump<R, T>(reader: R, ibox: InteractionBox, tx: &Sender<T>) -> io::Result<bool>
where
    R: BufRead,
    T: From<BridgeEvent>,
{
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(line, ibox) {
            Ok(frame) => {
                if tx.send(BridgeEvent::Frame(frame).into()).is_err() {
                    return Ok(false);
                }
            }
            Err(e) => debug!("bridge: skipping line: {e}"),
        }
    }
    Ok(true)
}
