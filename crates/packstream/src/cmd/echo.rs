use packstream_channel::ChannelEvent;
use packstream_frame::FrameError;
use packstream_transport::Listener;
use tracing::{info, warn};

use crate::cmd::session::Session;
use crate::cmd::{accept_until_stopped, install_ctrlc_handler, parse_endpoint, Context, EchoArgs};
use crate::exit::{disconnect_error, frame_error, transport_error, CliError, CliResult, SUCCESS};

/// What to do after a failed echo write.
#[derive(Debug)]
enum EchoDisposition {
    /// The peer is gone; wait for the next connection.
    NextPeer,
    Fatal(CliError),
}

pub fn run(args: EchoArgs, ctx: &Context) -> CliResult<i32> {
    let endpoint = parse_endpoint(&args.endpoint)?;
    let listener = Listener::bind(&endpoint).map_err(|err| transport_error("bind failed", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| transport_error("bind failed", err))?;

    let running = install_ctrlc_handler()?;

    while let Some(conn) = accept_until_stopped(&listener, &running)? {
        let session = Session::open(conn, ctx.config)?;
        info!(peer = session.peer(), "peer connected");

        while let Some(event) = session.next_event(&running) {
            match event {
                ChannelEvent::Message(message) => {
                    info!(size = message.len(), "echoing message");
                    if let Err(err) = session.write(&message) {
                        match classify_write_error(err) {
                            EchoDisposition::NextPeer => break,
                            EchoDisposition::Fatal(err) => return Err(err),
                        }
                    }
                }
                ChannelEvent::Disconnected(reason) => {
                    match disconnect_error("peer disconnected", &reason) {
                        Some(err) => warn!(peer = session.peer(), error = %err, "session ended"),
                        None => info!(peer = session.peer(), "peer disconnected"),
                    }
                    break;
                }
            }
        }
    }

    Ok(SUCCESS)
}

fn classify_write_error(err: FrameError) -> EchoDisposition {
    if err.is_disconnect() {
        warn!(error = %err, "peer went away before the echo was written");
        return EchoDisposition::NextPeer;
    }
    EchoDisposition::Fatal(frame_error("echo send failed", err))
}
