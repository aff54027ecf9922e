use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::header::HeaderWidth;

/// Upper bound on a single payload read or write call: 512 KiB.
///
/// Bounds per-call memory regardless of the declared message size. It has no
/// effect on the wire format.
pub const IO_CHUNK_SIZE: usize = 512 * 1024;

/// Configuration shared by the encode and decode sides of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameConfig {
    /// Width of the length prefix. Default: 4 bytes.
    pub width: HeaderWidth,
    /// Optional limit below what the width can express.
    pub max_payload_size: Option<u64>,
}

impl FrameConfig {
    /// Configuration for a given header width, with no additional limit.
    pub fn new(width: HeaderWidth) -> Self {
        Self {
            width,
            max_payload_size: None,
        }
    }

    /// Apply an additional payload limit.
    pub fn with_max_payload(mut self, max_payload_size: u64) -> Self {
        self.max_payload_size = Some(max_payload_size);
        self
    }

    /// Effective payload limit: the configured limit clamped to the width.
    pub fn max_payload(&self) -> u64 {
        let width_max = self.width.max_payload();
        self.max_payload_size
            .map_or(width_max, |limit| limit.min(width_max))
    }

    /// Reject payload lengths above [`FrameConfig::max_payload`].
    pub fn check_payload_len(&self, len: u64) -> Result<()> {
        let max = self.max_payload();
        if len > max {
            return Err(FrameError::PayloadTooLarge { size: len, max });
        }
        Ok(())
    }
}

/// Encode one frame into a buffer.
///
/// Wire format:
/// ```text
/// ┌─────────────────────┬─────────────────────┐
/// │ Length (1/2/4/8 B)  │ Payload             │
/// │ little-endian       │ (Length bytes)      │
/// └─────────────────────┴─────────────────────┘
/// ```
pub fn encode_frame(config: &FrameConfig, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = payload.len() as u64;
    config.check_payload_len(len)?;
    let header = config.width.encode(len)?;
    dst.reserve(header.as_bytes().len() + payload.len());
    dst.put_slice(header.as_bytes());
    dst.put_slice(payload);
    Ok(())
}

/// Decode one frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, config: &FrameConfig) -> Result<Option<Bytes>> {
    let width = config.width.bytes();
    if src.len() < width {
        return Ok(None);
    }

    let declared = config.width.decode(&src[..width])?;
    config.check_payload_len(declared)?;
    let payload_len = usize::try_from(declared).map_err(|_| FrameError::PayloadTooLarge {
        size: declared,
        max: usize::MAX as u64,
    })?;

    if src.len() - width < payload_len {
        let missing = width + payload_len - src.len();
        src.reserve(missing.min(IO_CHUNK_SIZE));
        return Ok(None);
    }

    src.advance(width);
    Ok(Some(src.split_to(payload_len).freeze()))
}
