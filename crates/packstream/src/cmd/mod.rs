use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use packstream_frame::FrameConfig;
use packstream_transport::{Connection, Endpoint, Listener, TransportError};

use crate::exit::{transport_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod echo;
pub mod encode;
pub mod listen;
pub mod send;
pub mod session;
pub mod version;

/// Settings shared by every subcommand.
#[derive(Debug, Clone, Copy)]
pub struct Context {
    pub format: OutputFormat,
    pub config: FrameConfig,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a single message.
    Send(SendArgs),
    /// Listen and print received messages.
    Listen(ListenArgs),
    /// Start an echo server.
    Echo(EchoArgs),
    /// Frame stdin and write the frames to stdout.
    Encode(EncodeArgs),
    /// Read frames from stdin and print the messages.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, ctx),
        Command::Listen(args) => listen::run(args, ctx),
        Command::Echo(args) => echo::run(args, ctx),
        Command::Encode(args) => encode::run(args, ctx),
        Command::Decode(args) => decode::run(args, ctx),
        Command::Version(args) => version::run(args, ctx),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Endpoint to connect to (`unix:/path`, `/path`, `tcp://host:port`).
    pub endpoint: String,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["file", "stdin"])]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "stdin"])]
    pub file: Option<PathBuf>,
    /// Read payload from stdin.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub stdin: bool,
    /// Wait for one reply message and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Endpoint to bind.
    pub endpoint: String,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<u64>,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Endpoint to bind.
    pub endpoint: String,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Frame each input line as its own message (newline stripped).
    #[arg(long)]
    pub lines: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Exit after decoding N messages.
    #[arg(long)]
    pub count: Option<u64>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_endpoint(input: &str) -> CliResult<Endpoint> {
    input
        .parse()
        .map_err(|err| transport_error("invalid endpoint", err))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Flag cleared by Ctrl-C.
pub(crate) fn install_ctrlc_handler() -> CliResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(running)
}

pub(crate) const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Wait for the next connection, giving up once `running` is cleared.
pub(crate) fn accept_until_stopped(
    listener: &Listener,
    running: &AtomicBool,
) -> CliResult<Option<Connection>> {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok(conn) => return Ok(Some(conn)),
            Err(TransportError::Accept(err)) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL);
            }
            Err(TransportError::Accept(err)) if err.kind() == std::io::ErrorKind::Interrupted => {}
            Err(err) => return Err(transport_error("accept failed", err)),
        }
    }
    Ok(None)
}
