/// Errors that can occur while setting up a framed channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// A reader or dispatcher thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },

    /// An async channel was requested outside a tokio runtime.
    #[error("no tokio runtime available to drive the channel")]
    NoRuntime,

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] packstream_frame::FrameError),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
