use packstream_channel::ChannelEvent;
use packstream_transport::Listener;
use tracing::{info, warn};

use crate::cmd::session::Session;
use crate::cmd::{accept_until_stopped, install_ctrlc_handler, parse_endpoint, Context, ListenArgs};
use crate::exit::{disconnect_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_message, MessageMeta};

pub fn run(args: ListenArgs, ctx: &Context) -> CliResult<i32> {
    let endpoint = parse_endpoint(&args.endpoint)?;
    let listener = Listener::bind(&endpoint).map_err(|err| transport_error("bind failed", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| transport_error("bind failed", err))?;

    let running = install_ctrlc_handler()?;
    let width = ctx.config.width.bytes();
    let mut printed = 0u64;

    while let Some(conn) = accept_until_stopped(&listener, &running)? {
        let session = Session::open(conn, ctx.config)?;
        info!(peer = session.peer(), "peer connected");

        while let Some(event) = session.next_event(&running) {
            match event {
                ChannelEvent::Message(message) => {
                    printed = printed.saturating_add(1);
                    let meta = MessageMeta {
                        peer: session.peer(),
                        seq: printed,
                        width,
                    };
                    print_message(&message, meta, ctx.format);

                    if args.count.is_some_and(|count| printed >= count) {
                        return Ok(SUCCESS);
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
