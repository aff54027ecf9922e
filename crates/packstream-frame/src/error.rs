use std::io::ErrorKind;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header width is not one of 1, 2, 4 or 8 bytes.
    #[error("invalid header width {0} (expected 1, 2, 4 or 8)")]
    InvalidWidth(u64),

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: u64, max: u64 },

    /// More bytes were delivered than the current frame phase asked for.
    #[error("protocol violation: expected at most {expected} bytes, received {received}")]
    ProtocolViolation { expected: usize, received: usize },

    /// The stream ended part way through a frame.
    #[error("stream ended mid-frame ({received} of {expected} bytes)")]
    Truncated { expected: u64, received: u64 },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The sink accepted zero bytes, so the connection is gone.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// Returns true if this error reports a closed peer rather than a fault.
    pub fn is_disconnect(&self) -> bool {
        match self {
            FrameError::ConnectionClosed | FrameError::Truncated { .. } => true,
            FrameError::Io(err) => is_transport_closed(err),
            _ => false,
        }
    }
}

/// Returns true for the I/O error kinds a transport raises when its other end
/// has gone away.
///
/// Readers treat these the same as a zero-length read.
pub fn is_transport_closed(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::UnexpectedEof
    )
}

pub type Result<T> = std::result::Result<T, FrameError>;
