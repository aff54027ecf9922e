use std::fs;
use std::io::Read;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use bytes::Bytes;
use packstream_channel::ChannelEvent;
use packstream_frame::FrameWriter;
use packstream_transport::Connection;
use tracing::info;

use crate::cmd::session::Session;
use crate::cmd::{parse_duration, parse_endpoint, Context, SendArgs};
use crate::exit::{
    disconnect_error, frame_error, io_error, transport_error, CliError, CliResult, FAILURE,
    INTERNAL, SUCCESS, TIMEOUT,
};
use crate::output::{print_message, MessageMeta};

pub fn run(args: SendArgs, ctx: &Context) -> CliResult<i32> {
    let endpoint = parse_endpoint(&args.endpoint)?;
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payload = resolve_payload(&args)?;
    ctx.config
        .check_payload_len(payload.len() as u64)
        .map_err(|err| frame_error("send failed", err))?;

    let conn =
        Connection::connect(&endpoint).map_err(|err| transport_error("connect failed", err))?;

    if !args.wait {
        let mut writer = FrameWriter::with_config(conn, ctx.config);
        writer
            .send(&payload)
            .map_err(|err| frame_error("send failed", err))?;
        info!(size = payload.len(), %endpoint, "message sent");
        return Ok(SUCCESS);
    }

    let session = Session::open(conn, ctx.config)?;
    session
        .write(&payload)
        .map_err(|err| frame_error("send failed", err))?;
    info!(size = payload.len(), %endpoint, "message sent, waiting for reply");

    let reply = wait_for_reply(|timeout| session.wait_event(timeout), wait_timeout)?;
    let meta = MessageMeta {
        peer: session.peer(),
        seq: 1,
        width: ctx.config.width.bytes(),
    };
    print_message(&reply, meta, ctx.format);
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    if args.stdin {
        let mut payload = Vec::new();
        std::io::stdin()
            .lock()
            .read_to_end(&mut payload)
            .map_err(|err| io_error("failed reading stdin", err))?;
        return Ok(payload);
    }
    Ok(Vec::new())
}

fn wait_for_reply<F>(mut next: F, timeout: Duration) -> CliResult<Bytes>
where
    F: FnMut(Duration) -> Result<ChannelEvent, RecvTimeoutError>,
{
    match next(timeout) {
        Ok(ChannelEvent::Message(message)) => Ok(message),
        Ok(ChannelEvent::Disconnected(reason)) => {
            Err(disconnect_error("receive failed", &reason).unwrap_or_else(|| {
                CliError::new(FAILURE, "peer closed the connection without replying")
            }))
        }
        Err(RecvTimeoutError::Timeout) => Err(CliError::new(
            TIMEOUT,
            format!("no reply within {}ms", timeout.as_millis()),
        )),
        Err(RecvTimeoutError::Disconnected) => {
            Err(CliError::new(INTERNAL, "channel dispatcher stopped"))
        }
    }
}
