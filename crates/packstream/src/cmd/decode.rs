use packstream_frame::{FrameError, FrameReader};
use tracing::debug;

use crate::cmd::{Context, DecodeArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_message, MessageMeta};

pub fn run(args: DecodeArgs, ctx: &Context) -> CliResult<i32> {
    let mut reader = FrameReader::with_config(std::io::stdin().lock(), ctx.config);
    let width = ctx.config.width.bytes();
    let mut seq = 0u64;

    loop {
        let message = match reader.read_message() {
            Ok(message) => message,
            Err(FrameError::ConnectionClosed) => break,
            Err(err) => return Err(frame_error("decode failed", err)),
        };

        seq += 1;
        let meta = MessageMeta {
            peer: "stdin",
            seq,
            width,
        };
        print_message(&message, meta, ctx.format);

        if args.count.is_some_and(|count| seq >= count) {
            break;
        }
    }

    debug!(messages = seq, "stdin decoded");
    Ok(SUCCESS)
}
