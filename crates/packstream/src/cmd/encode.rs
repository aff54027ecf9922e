use std::io::{BufRead, Read};

use packstream_frame::FrameWriter;
use tracing::debug;

use crate::cmd::{Context, EncodeArgs};
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};

pub fn run(args: EncodeArgs, ctx: &Context) -> CliResult<i32> {
    let mut input = std::io::stdin().lock();
    let mut writer = FrameWriter::with_config(std::io::stdout().lock(), ctx.config);
    let mut frames = 0u64;

    if args.lines {
        for line in input.split(b'\n') {
            let mut line = line.map_err(|err| io_error("failed reading stdin", err))?;
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            writer
                .send(&line)
                .map_err(|err| frame_error("encode failed", err))?;
            frames += 1;
        }
    } else {
        let mut payload = Vec::new();
        input
            .read_to_end(&mut payload)
            .map_err(|err| io_error("failed reading stdin", err))?;
        writer
            .send(&payload)
            .map_err(|err| frame_error("encode failed", err))?;
        frames = 1;
    }

    debug!(frames, width = ctx.config.width.bytes(), "stdin encoded");
    Ok(SUCCESS)
}
