mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;
use packstream_frame::{FrameConfig, HeaderWidth};

use crate::cmd::{Command, Context};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "packstream", version, about = "Length-prefixed message framing CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Length-prefix width in bytes (1, 2, 4 or 8).
    #[arg(
        long,
        value_name = "BYTES",
        env = "PACKSTREAM_WIDTH",
        default_value = "4",
        global = true
    )]
    width: HeaderWidth,

    /// Reject frames larger than this many bytes.
    #[arg(long, value_name = "BYTES", env = "PACKSTREAM_MAX_PAYLOAD", global = true)]
    max_payload: Option<u64>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn frame_config(&self) -> FrameConfig {
        let config = FrameConfig::new(self.width);
        match self.max_payload {
            Some(max) => config.with_max_payload(max),
            None => config,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let ctx = Context {
        format: cli.format.unwrap_or_else(OutputFormat::default_for_stdout),
        config: cli.frame_config(),
    };
    let result = cmd::run(cli.command, &ctx);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
