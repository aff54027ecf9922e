use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, FrameConfig};
use crate::error::FrameError;

/// `tokio_util` codec for length-prefixed frames.
///
/// Use with `FramedRead` / `FramedWrite` when a `Stream`/`Sink` of messages is
/// more convenient than a framed channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackedCodec {
    config: FrameConfig,
}

impl PackedCodec {
    pub fn new(config: FrameConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Decoder for PackedCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_frame(src, &self.config)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None => {
                let width = self.config.width.bytes();
                let mut expected = width as u64;
                if src.len() >= width {
                    expected += self.config.width.decode(&src[..width])?;
                }
                Err(FrameError::Truncated {
                    expected,
                    received: src.len() as u64,
                })
            }
        }
    }
}

impl Encoder<Bytes> for PackedCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&self.config, item.as_ref(), dst)
    }
}

impl Encoder<&[u8]> for PackedCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&self.config, item, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::header::HeaderWidth;

    #[tokio::test]
    async fn framed_sink_and_stream() {
        let (client, server) = tokio::io::duplex(1024);
        let codec = PackedCodec::new(FrameConfig::new(HeaderWidth::Two));
        let mut sink = FramedWrite::new(client, codec);
        let mut stream = FramedRead::new(server, codec);

        sink.send(Bytes::from_static(b"alpha")).await.unwrap();
        sink.send(Bytes::from_static(b"")).await.unwrap();
        sink.send(Bytes::from_static(b"omega")).await.unwrap();
        drop(sink);

        let collected: Vec<Bytes> = stream.by_ref().map(|item| item.unwrap()).collect().await;
        assert_eq!(collected.len(), 3);
        assert_eq!(collected[0].as_ref(), b"alpha");
        assert!(collected[1].is_empty());
        assert_eq!(collected[2].as_ref(), b"omega");
    }

    #[tokio::test]
    async fn framed_stream_reports_truncated_tail() {
        let bytes: &[u8] = &[9, 0, 0, 0, b'x'];
        let mut stream = FramedRead::new(bytes, PackedCodec::default());

        let item = stream.next().await.unwrap();
        assert!(matches!(item, Err(FrameError::Truncated { .. })));
    }

    #[test]
    fn decoder_waits_on_huge_header_without_preallocating() {
        let mut codec = PackedCodec::new(FrameConfig::new(HeaderWidth::Eight));
        let mut src = BytesMut::new();
        src.extend_from_slice(&(i64::MAX as u64).to_le_bytes());
        src.extend_from_slice(b"x");

        assert!(codec.decode(&mut src).unwrap().is_none());
        assert!(src.capacity() < 2 * crate::codec::IO_CHUNK_SIZE);
    }

    #[test]
    fn encoder_rejects_oversize() {
        let mut codec = PackedCodec::new(FrameConfig::new(HeaderWidth::One));
        let mut dst = BytesMut::new();
        let err = codec.encode(&[0u8; 300][..], &mut dst).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(dst.is_empty());
        assert_eq!(codec.config().width, HeaderWidth::One);
    }
}
