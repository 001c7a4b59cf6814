//! Daemon control socket and the engine thread behind it.

mod dispatch;
mod pipeline;
mod runtime;
mod server;

use anyhow::{Result, anyhow};
use std::{
    io::{BufRead, BufReader, Write},
    os::unix::net::UnixStream,
};

pub use runtime::socket_path;
pub use server::run_daemon;

/// One request line to the running daemon, one response line back.
pub fn client_request(req: serde_json::Value) -> Result<serde_json::Value> {
    let sock = socket_path()?;
    if !sock.exists() {
        return Err(anyhow!(
            "handctl daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(&sock)?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    Ok(serde_json::from_str(&resp)?)
}
