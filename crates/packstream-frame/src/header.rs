use std::fmt;
use std::str::FromStr;

use crate::error::{FrameError, Result};

/// Largest supported header, in bytes.
pub const MAX_HEADER_WIDTH: usize = 8;

/// Byte width of the little-endian length prefix.
///
/// Both ends of a connection must agree on the width out-of-band; it is never
/// negotiated on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HeaderWidth {
    /// `u8` length, payloads up to 255 bytes.
    One,
    /// `u16` length, payloads up to 64 KiB - 1.
    Two,
    /// `u32` length, payloads up to 4 GiB - 1.
    #[default]
    Four,
    /// `u64` length, capped at `i64::MAX`.
    Eight,
}

impl HeaderWidth {
    /// Number of header bytes on the wire.
    pub const fn bytes(self) -> usize {
        match self {
            HeaderWidth::One => 1,
            HeaderWidth::Two => 2,
            HeaderWidth::Four => 4,
            HeaderWidth::Eight => 8,
        }
    }

    /// Largest payload length this width can carry.
    pub const fn max_payload(self) -> u64 {
        match self {
            HeaderWidth::One => u8::MAX as u64,
            HeaderWidth::Two => u16::MAX as u64,
            HeaderWidth::Four => u32::MAX as u64,
            HeaderWidth::Eight => i64::MAX as u64,
        }
    }

    /// Encode a payload length as a header.
    pub fn encode(self, len: u64) -> Result<Header> {
        let max = self.max_payload();
        if len > max {
            return Err(FrameError::PayloadTooLarge { size: len, max });
        }
        let mut bytes = [0u8; MAX_HEADER_WIDTH];
        let width = self.bytes();
        bytes[..width].copy_from_slice(&len.to_le_bytes()[..width]);
        Ok(Header { bytes, width })
    }

    /// Decode a header into the payload length it declares.
    ///
    /// `bytes` must be exactly [`HeaderWidth::bytes`] long. The value is always
    /// read as unsigned; callers enforce the payload limit.
    pub fn decode(self, bytes: &[u8]) -> Result<u64> {
        let width = self.bytes();
        if bytes.len() != width {
            return Err(FrameError::ProtocolViolation {
                expected: width,
                received: bytes.len(),
            });
        }
        let mut raw = [0u8; MAX_HEADER_WIDTH];
        raw[..width].copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }
}

impl TryFrom<u8> for HeaderWidth {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(HeaderWidth::One),
            2 => Ok(HeaderWidth::Two),
            4 => Ok(HeaderWidth::Four),
            8 => Ok(HeaderWidth::Eight),
            other => Err(FrameError::InvalidWidth(u64::from(other))),
        }
    }
}

impl FromStr for HeaderWidth {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self> {
        let value: u64 = s
            .trim()
            .parse()
            .map_err(|_| FrameError::InvalidWidth(0))?;
        u8::try_from(value)
            .map_err(|_| FrameError::InvalidWidth(value))
            .and_then(HeaderWidth::try_from)
    }
}

impl fmt::Display for HeaderWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bytes())
    }
}

/// An encoded length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    bytes: [u8; MAX_HEADER_WIDTH],
    width: usize,
}

impl Header {
    /// The header bytes exactly as they go on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.width]
    }
}

impl AsRef<[u8]> for Header {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_little_endian() {
        assert_eq!(HeaderWidth::One.encode(0xAB).unwrap().as_bytes(), &[0xAB]);
        assert_eq!(
            HeaderWidth::Two.encode(0x0102).unwrap().as_bytes(),
            &[0x02, 0x01]
        );
        assert_eq!(
            HeaderWidth::Four.encode(0x0102_0304).unwrap().as_bytes(),
            &[0x04, 0x03, 0x02, 0x01]
        );
        assert_eq!(
            HeaderWidth::Eight.encode(5).unwrap().as_bytes(),
            &[5, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn decodes_what_it_encodes_at_the_limits() {
        for width in [
            HeaderWidth::One,
            HeaderWidth::Two,
            HeaderWidth::Four,
            HeaderWidth::Eight,
        ] {
            let max = width.max_payload();
            let header = width.encode(max).unwrap();
            assert_eq!(header.as_bytes().len(), width.bytes());
            assert_eq!(width.decode(header.as_bytes()).unwrap(), max);
        }
    }

    #[test]
    fn rejects_lengths_over_the_width() {
        let err = HeaderWidth::One.encode(256).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge {
                size: 256,
                max: 255
            }
        ));
        assert!(HeaderWidth::Two.encode(65_536).is_err());
        assert!(HeaderWidth::Four.encode(u64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn eight_byte_width_is_capped_at_signed_max() {
        assert_eq!(HeaderWidth::Eight.max_payload(), 0x7FFF_FFFF_FFFF_FFFF);
        assert!(HeaderWidth::Eight.encode(1u64 << 63).is_err());
    }

    #[test]
    fn eight_byte_decode_is_unsigned() {
        let raw = [0xFF; 8];
        assert_eq!(HeaderWidth::Eight.decode(&raw).unwrap(), u64::MAX);
    }

    #[test]
    fn decode_requires_exact_width() {
        let err = HeaderWidth::Four.decode(&[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::ProtocolViolation {
                expected: 4,
                received: 3
            }
        ));
    }

    #[test]
    fn parses_widths() {
        assert_eq!(HeaderWidth::try_from(1u8).unwrap(), HeaderWidth::One);
        assert_eq!("8".parse::<HeaderWidth>().unwrap(), HeaderWidth::Eight);
        assert_eq!(" 2 ".parse::<HeaderWidth>().unwrap(), HeaderWidth::Two);
        assert!(matches!(
            HeaderWidth::try_from(3u8),
            Err(FrameError::InvalidWidth(3))
        ));
        assert!(matches!(
            "300".parse::<HeaderWidth>(),
            Err(FrameError::InvalidWidth(300))
        ));
        assert!("four".parse::<HeaderWidth>().is_err());
        assert_eq!(HeaderWidth::default(), HeaderWidth::Four);
        assert_eq!(HeaderWidth::Two.to_string(), "2");
    }
}
