use std::net::Shutdown;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use packstream_channel::{ChannelBuilder, ChannelEvent, FramedChannel};
use packstream_frame::FrameConfig;
use packstream_transport::Connection;

use crate::cmd::ACCEPT_POLL;
use crate::exit::{channel_error, transport_error, CliResult};

/// One accepted or dialled connection wrapped in a framed channel.
///
/// Dropping the session shuts the socket down, which ends the reader thread.
pub struct Session {
    channel: FramedChannel<Connection>,
    events: Receiver<ChannelEvent>,
    control: Connection,
    peer: String,
}

impl Session {
    pub fn open(conn: Connection, config: FrameConfig) -> CliResult<Self> {
        let peer = conn.peer();
        let split_err = |err| transport_error("connection setup failed", err);
        let control = conn.try_clone().map_err(split_err)?;
        let (reader, writer) = conn.split().map_err(split_err)?;

        let (tx, events) = mpsc::channel();
        let channel = ChannelBuilder::new(config)
            .subscribe(move |event| {
                let _ = tx.send(event);
            })
            .spawn(reader, writer)
            .map_err(|err| channel_error("channel setup failed", err))?;

        Ok(Self {
            channel,
            events,
            control,
            peer,
        })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn write(&self, payload: &[u8]) -> packstream_frame::Result<()> {
        self.channel.write(payload)
    }

    /// Next event, or `None` once `running` is cleared.
    pub fn next_event(&self, running: &AtomicBool) -> Option<ChannelEvent> {
        while running.load(Ordering::SeqCst) {
            match self.events.recv_timeout(ACCEPT_POLL) {
                Ok(event) => return Some(event),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
        None
    }

    /// Next event within `timeout`.
    pub fn wait_event(&self, timeout: Duration) -> Result<ChannelEvent, RecvTimeoutError> {
        self.events.recv_timeout(timeout)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.control.shutdown(Shutdown::Both);
    }
}
