use std::io::Write;
use std::sync::Arc;

use packstream_frame::{write_frame, write_frame_async, FrameConfig, Result};
use tokio::io::AsyncWrite;
use tokio::sync::Mutex;
use tracing::trace;

/// Cloneable write handle for a framed channel.
///
/// All clones share one lock over the sink, held for the header, the payload
/// and the flush of a single frame. Frames from concurrent writers therefore
/// never interleave; their relative order is whoever takes the lock first.
///
/// The same lock serves blocking and async callers.
pub struct ChannelWriter<W> {
    sink: Arc<Mutex<W>>,
    config: FrameConfig,
}

impl<W> ChannelWriter<W> {
    /// Take ownership of `sink` behind a fresh lock.
    pub fn new(sink: W, config: FrameConfig) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
            config,
        }
    }

    /// Limits applied to every outgoing payload.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<W: Write> ChannelWriter<W> {
    /// Send one payload as one frame, blocking until it is flushed.
    ///
    /// Oversized payloads are rejected before the lock is taken. Must not be
    /// called from inside an async task; use [`ChannelWriter::write_async`]
    /// there.
    pub fn write(&self, payload: &[u8]) -> Result<()> {
        self.config.check_payload_len(payload.len() as u64)?;
        let mut sink = self.sink.blocking_lock();
        write_frame(&mut *sink, &self.config, payload)?;
        trace!(len = payload.len(), "frame written");
        Ok(())
    }
}

impl<W: AsyncWrite + Unpin> ChannelWriter<W> {
    /// Send one payload as one frame, suspending on the lock and the sink.
    pub async fn write_async(&self, payload: &[u8]) -> Result<()> {
        self.config.check_payload_len(payload.len() as u64)?;
        let mut sink = self.sink.lock().await;
        write_frame_async(&mut *sink, &self.config, payload).await?;
        trace!(len = payload.len(), "frame written");
        Ok(())
    }
}

impl<W> Clone for ChannelWriter<W> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            config: self.config,
        }
    }
}

impl<W> std::fmt::Debug for ChannelWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelWriter")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::pin::Pin;
    use std::sync::Mutex as StdMutex;
    use std::task::{Context, Poll};

    use bytes::BytesMut;
    use packstream_frame::{decode_frame, FrameError, HeaderWidth};

    use super::*;

    /// Sink that accepts both blocking and async writes into one buffer.
    #[derive(Clone, Default)]
    struct SharedSink(Arc<StdMutex<Vec<u8>>>);

    impl SharedSink {
        fn bytes(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl AsyncWrite for SharedSink {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn blocking_write_frames_payload() {
        let sink = SharedSink::default();
        let writer = ChannelWriter::new(sink.clone(), FrameConfig::new(HeaderWidth::Two));

        writer.write(b"abc").unwrap();
        assert_eq!(sink.bytes(), vec![3, 0, b'a', b'b', b'c']);
    }

    #[test]
    fn oversize_is_rejected_and_nothing_written() {
        let sink = SharedSink::default();
        let writer = ChannelWriter::new(sink.clone(), FrameConfig::new(HeaderWidth::One));

        writer.write(&[1u8; 255]).unwrap();
        let err = writer.write(&[1u8; 256]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge {
                size: 256,
                max: 255
            }
        ));
        assert_eq!(sink.bytes().len(), 1 + 255);
    }

    #[tokio::test]
    async fn async_and_blocking_writes_share_wire_format() {
        let sink = SharedSink::default();
        let writer = ChannelWriter::new(sink.clone(), FrameConfig::default());

        writer.write_async(b"frame").await.unwrap();
        let async_bytes = sink.bytes();

        let blocking_sink = SharedSink::default();
        let blocking = ChannelWriter::new(blocking_sink.clone(), FrameConfig::default());
        let handle = std::thread::spawn(move || blocking.write(b"frame").unwrap());
        handle.join().unwrap();

        assert_eq!(async_bytes, blocking_sink.bytes());
    }

    #[test]
    fn concurrent_writers_never_interleave() {
        let sink = SharedSink::default();
        let config = FrameConfig::new(HeaderWidth::Four);
        let writer = ChannelWriter::new(sink.clone(), config);

        let threads: Vec<_> = (0..8u8)
            .map(|t| {
                let writer = writer.clone();
                std::thread::spawn(move || {
                    for i in 0..50usize {
                        let payload = vec![t; 1 + (i * 37) % 700];
                        writer.write(&payload).unwrap();
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let mut wire = BytesMut::from(sink.bytes().as_slice());
        let mut count = 0;
        while let Some(message) = decode_frame(&mut wire, &config).unwrap() {
            let first = message[0];
            assert!(message.iter().all(|byte| *byte == first));
            count += 1;
        }
        assert_eq!(count, 8 * 50);
        assert!(wire.is_empty());
    }

    #[test]
    fn clones_share_config() {
        let writer = ChannelWriter::new(
            Cursor::new(Vec::<u8>::new()),
            FrameConfig::new(HeaderWidth::Eight),
        );
        let clone = writer.clone();
        assert_eq!(clone.config().width, HeaderWidth::Eight);
        assert!(format!("{clone:?}").contains("ChannelWriter"));
    }
}
