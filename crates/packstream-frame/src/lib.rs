//! Fixed-width length-prefixed message framing.
//!
//! Every message is framed with a little-endian unsigned length of 1, 2, 4 or
//! 8 bytes followed by the payload. There is no magic, type tag or checksum;
//! both ends agree on the header width out-of-band.
//!
//! No partial reads, no buffer management in user code.

pub mod accumulator;
#[cfg(feature = "async")]
pub mod async_io;
pub mod codec;
pub mod error;
pub mod header;
pub mod reader;
#[cfg(feature = "async")]
pub mod tokio_codec;
pub mod writer;

pub use accumulator::{Accumulator, Phase, Progress};
#[cfg(feature = "async")]
pub use async_io::{write_frame_async, AsyncFrameReader, AsyncFrameWriter};
pub use codec::{decode_frame, encode_frame, FrameConfig, IO_CHUNK_SIZE};
pub use error::{is_transport_closed, FrameError, Result};
pub use header::{Header, HeaderWidth, MAX_HEADER_WIDTH};
pub use reader::{FrameReader, Messages};
#[cfg(feature = "async")]
pub use tokio_codec::PackedCodec;
pub use writer::{write_frame, FrameWriter};
