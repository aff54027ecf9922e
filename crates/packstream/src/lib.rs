//! Length-prefixed message framing over duplex byte streams.
//!
//! One write on the sending side becomes exactly one message on the receiving
//! side, however the transport fragments or coalesces the bytes.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix domain socket and TCP streams
//! - [`frame`]: header codec, reassembly state machine, blocking and async readers/writers
//! - [`channel`]: the framed channel with message and disconnect notifications

/// Re-export transport types.
pub mod transport {
    pub use packstream_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use packstream_frame::*;
}

/// Re-export channel types.
pub mod channel {
    pub use packstream_channel::*;
}

pub use packstream_channel::{ChannelBuilder, ChannelEvent, DisconnectReason, FramedChannel};
pub use packstream_frame::{FrameConfig, FrameError, HeaderWidth};
