//! Framed channel: message-level reads and writes over a duplex byte stream.
//!
//! A [`FramedChannel`] wraps an input source and an output sink. One call to
//! [`FramedChannel::write`] or [`FramedChannel::write_async`] sends exactly one
//! frame; every complete inbound frame is announced once to subscribers, and
//! the end of the input is announced once as a disconnect.

pub mod channel;
pub mod error;
pub mod event;
pub mod writer;

pub use channel::{ChannelBuilder, FramedChannel, DEFAULT_DISPATCH_DEPTH};
pub use error::{ChannelError, Result};
pub use event::{ChannelEvent, DisconnectReason, EventBus, SubscriptionId};
pub use writer::ChannelWriter;

pub use packstream_frame::{FrameConfig, FrameError, HeaderWidth};
