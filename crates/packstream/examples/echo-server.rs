//! Minimal echo server: accepts one peer and echoes every message back.
//!
//! Run with:
//!   cargo run -p packstream --example echo-server
//!
//! In another terminal:
//!   cargo run -p packstream --features cli -- send <printed endpoint> \
//!     --data hello --wait --wait-timeout 3s

use std::fs;
use std::sync::mpsc;

use packstream::transport::{Endpoint, Listener};
use packstream::{ChannelBuilder, FrameConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_dir = std::env::temp_dir().join(format!("packstream-echo-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let endpoint = Endpoint::unix(sock_dir.join("echo.sock"));

    let listener = Listener::bind(&endpoint)?;
    eprintln!("Listening on {endpoint}");

    let conn = listener.accept()?;
    eprintln!("Peer connected: {}", conn.peer());
    let (reader, writer) = conn.split()?;

    // The handler needs the write side before the channel exists, so it gets
    // its own handle to the socket.
    let echo = packstream::channel::ChannelWriter::new(writer.try_clone()?, FrameConfig::default());
    let (done_tx, done_rx) = mpsc::channel();

    let _channel = ChannelBuilder::new(FrameConfig::default())
        .on_message(move |message| {
            eprintln!("Received {} bytes", message.len());
            if let Err(err) = echo.write(&message) {
                eprintln!("Echo failed: {err}");
            }
        })
        .on_disconnect(move |reason| {
            let _ = done_tx.send(reason);
        })
        .spawn(reader, writer)?;

    let reason = done_rx.recv()?;
    eprintln!("Peer disconnected: {reason}");

    drop(listener);
    let _ = fs::remove_dir_all(&sock_dir);
    Ok(())
}
