//! Async counterparts of [`FrameReader`](crate::FrameReader) and
//! [`FrameWriter`](crate::FrameWriter) over tokio's I/O traits.
//!
//! Wire output and validation are identical to the blocking forms.

use std::io::ErrorKind;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::accumulator::{Accumulator, Progress};
use crate::codec::{FrameConfig, IO_CHUNK_SIZE};
use crate::error::{is_transport_closed, FrameError, Result};

/// Write one frame to an async sink and flush it.
///
/// The payload goes out in slices of at most [`IO_CHUNK_SIZE`].
pub async fn write_frame_async<W: AsyncWrite + Unpin + ?Sized>(
    sink: &mut W,
    config: &FrameConfig,
    payload: &[u8],
) -> Result<()> {
    let len = payload.len() as u64;
    config.check_payload_len(len)?;
    let header = config.width.encode(len)?;

    sink.write_all(header.as_bytes()).await.map_err(write_error)?;
    for chunk in payload.chunks(IO_CHUNK_SIZE) {
        sink.write_all(chunk).await.map_err(write_error)?;
    }
    sink.flush().await.map_err(write_error)
}

fn write_error(err: std::io::Error) -> FrameError {
    if err.kind() == ErrorKind::WriteZero {
        FrameError::ConnectionClosed
    } else {
        FrameError::Io(err)
    }
}

/// Reads complete messages from any `AsyncRead` stream.
pub struct AsyncFrameReader<T> {
    inner: T,
    acc: Accumulator,
    scratch: Vec<u8>,
}

impl<T: AsyncRead + Unpin> AsyncFrameReader<T> {
    /// Create a new async frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new async frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            acc: Accumulator::new(config),
            scratch: Vec::new(),
        }
    }

    /// Read the next complete message.
    ///
    /// Same close semantics as [`FrameReader::read_message`](crate::FrameReader::read_message).
    pub async fn read_message(&mut self) -> Result<Bytes> {
        loop {
            let want = self.acc.next_read_len();
            if want == 0 {
                return Err(FrameError::ConnectionClosed);
            }
            if self.scratch.len() < want {
                self.scratch.resize(want, 0);
            }

            let read = match self.inner.read(&mut self.scratch[..want]).await {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_transport_closed(&err) => 0,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                self.acc.close()?;
                return Err(FrameError::ConnectionClosed);
            }

            if let Progress::Message(message) = self.acc.feed(&self.scratch[..read])? {
                return Ok(message);
            }
        }
    }

    /// Returns true once the stream has ended or failed fatally.
    pub fn is_closed(&self) -> bool {
        self.acc.is_closed()
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        self.acc.config()
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

/// Writes complete frames to any `AsyncWrite` stream.
pub struct AsyncFrameWriter<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: AsyncWrite + Unpin> AsyncFrameWriter<T> {
    /// Create a new async frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new async frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Frame and send one payload.
    pub async fn send(&mut self, payload: &[u8]) -> Result<()> {
        write_frame_async(&mut self.inner, &self.config, payload).await
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::header::HeaderWidth;
    use crate::writer::FrameWriter;

    #[tokio::test]
    async fn async_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(64);
        let config = FrameConfig::new(HeaderWidth::Two);
        let mut writer = AsyncFrameWriter::with_config(client, config);
        let mut reader = AsyncFrameReader::with_config(server, config);

        let payload = vec![0x5A; 1000];
        let send = async {
            writer.send(b"first").await.unwrap();
            writer.send(&payload).await.unwrap();
        };
        let recv = async {
            let first = reader.read_message().await.unwrap();
            let second = reader.read_message().await.unwrap();
            (first, second)
        };
        let ((), (first, second)) = tokio::join!(send, recv);

        assert_eq!(first.as_ref(), b"first");
        assert_eq!(second.as_ref(), payload.as_slice());
    }

    #[tokio::test]
    async fn async_and_blocking_writers_match_on_the_wire() {
        let config = FrameConfig::new(HeaderWidth::Eight);

        let mut blocking = FrameWriter::with_config(Cursor::new(Vec::new()), config);
        blocking.send(b"same bytes").unwrap();

        let mut asynchronous = AsyncFrameWriter::with_config(Vec::new(), config);
        asynchronous.send(b"same bytes").await.unwrap();

        assert_eq!(
            blocking.into_inner().into_inner(),
            asynchronous.into_inner()
        );
    }

    #[tokio::test]
    async fn async_clean_close_and_truncation() {
        let mut reader = AsyncFrameReader::new(&b""[..]);
        assert!(matches!(
            reader.read_message().await,
            Err(FrameError::ConnectionClosed)
        ));
        assert!(reader.is_closed());

        let mut reader =
            AsyncFrameReader::with_config(&[3u8, b'a'][..], FrameConfig::new(HeaderWidth::One));
        assert!(matches!(
            reader.read_message().await,
            Err(FrameError::Truncated {
                expected: 4,
                received: 2
            })
        ));
    }

    #[tokio::test]
    async fn async_write_rejects_oversize_without_writing() {
        let mut writer =
            AsyncFrameWriter::with_config(Vec::new(), FrameConfig::new(HeaderWidth::One));
        let err = writer.send(&[0u8; 256]).await.unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(writer.into_inner().is_empty());
    }

    #[tokio::test]
    async fn async_large_payload_is_chunked_but_whole() {
        let (client, server) = tokio::io::duplex(16 * 1024);
        let mut writer = AsyncFrameWriter::new(client);
        let mut reader = AsyncFrameReader::new(server);
        let payload: Vec<u8> = (0..IO_CHUNK_SIZE * 2 + 17).map(|i| i as u8).collect();

        let (sent, received) = tokio::join!(writer.send(&payload), reader.read_message());
        sent.unwrap();
        assert_eq!(received.unwrap().as_ref(), payload.as_slice());
        assert_eq!(writer.config().width, HeaderWidth::Four);
    }
}
