use std::io::{ErrorKind, Write};

use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};

/// Write one frame to a sink and flush it.
///
/// The payload length is validated and the header encoded before any byte is
/// written, so a rejected payload leaves the sink untouched.
///
/// An expired write timeout surfaces as `FrameError::Io` (`WouldBlock` or
/// `TimedOut`). Part of the frame may already be on the wire by then, so the
/// stream is no longer usable for framing.
pub fn write_frame<W: Write + ?Sized>(
    sink: &mut W,
    config: &FrameConfig,
    payload: &[u8],
) -> Result<()> {
    let len = payload.len() as u64;
    config.check_payload_len(len)?;
    let header = config.width.encode(len)?;

    write_fully(sink, header.as_bytes())?;
    write_fully(sink, payload)?;
    flush_fully(sink)
}

fn write_fully<W: Write + ?Sized>(sink: &mut W, mut bytes: &[u8]) -> Result<()> {
    while !bytes.is_empty() {
        match sink.write(bytes) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => bytes = &bytes[n..],
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}

fn flush_fully<W: Write + ?Sized>(sink: &mut W) -> Result<()> {
    loop {
        match sink.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
}

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Frame and send one payload (blocking).
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        write_frame(&mut self.inner, &self.config, payload)
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        flush_fully(&mut self.inner)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::decode_frame;
    use crate::header::HeaderWidth;

    fn written(writer: FrameWriter<Cursor<Vec<u8>>>) -> BytesMut {
        BytesMut::from(writer.into_inner().into_inner().as_slice())
    }

    #[test]
    fn write_single_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(b"hello").unwrap();

        let mut wire = written(writer);
        assert_eq!(&wire[..4], &[5, 0, 0, 0]);
        let message = decode_frame(&mut wire, &FrameConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(message.as_ref(), b"hello");
    }

    #[test]
    fn write_multiple_frames() {
        let config = FrameConfig::new(HeaderWidth::Two);
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), config);

        writer.send(b"one").unwrap();
        writer.send(b"two").unwrap();
        writer.send(b"three").unwrap();

        let mut wire = written(writer);
        for expected in [b"one".as_ref(), b"two", b"three"] {
            let message = decode_frame(&mut wire, &config).unwrap().unwrap();
            assert_eq!(message.as_ref(), expected);
        }
        assert!(wire.is_empty());
    }

    #[test]
    fn one_byte_width_boundary() {
        let config = FrameConfig::new(HeaderWidth::One);
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), config);

        writer.send(&[0x11; 255]).unwrap();
        let err = writer.send(&[0x22; 256]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge {
                size: 256,
                max: 255
            }
        ));

        let wire = written(writer);
        assert_eq!(wire.len(), 1 + 255);
        assert_eq!(wire[0], 255);
    }

    #[test]
    fn payload_over_configured_limit_writes_nothing() {
        let config = FrameConfig::default().with_max_payload(4);
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), config);

        let err = writer.send(b"oversized").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(written(writer).is_empty());
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.send(b"x").unwrap();

        assert!(flag.load(Ordering::SeqCst));
        assert_eq!(writer.get_ref().data, vec![1, 0, 0, 0, b'x']);
    }

    #[test]
    fn empty_payload_writes_header_only() {
        let mut writer = FrameWriter::with_config(
            Cursor::new(Vec::<u8>::new()),
            FrameConfig::new(HeaderWidth::Eight),
        );
        writer.send(b"").unwrap();
        assert_eq!(written(writer).as_ref(), &[0u8; 8]);
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        let _ = writer.get_ref();
        let _ = writer.get_mut();
        writer.flush().unwrap();
        assert_eq!(writer.config().width, HeaderWidth::Four);
        let _inner = writer.into_inner();
    }

    #[test]
    fn interrupted_write_and_flush_are_retried() {
        let mut writer = FrameWriter::new(Hiccup::new(ErrorKind::Interrupted));
        writer.send(b"retry").unwrap();

        let sink = writer.into_inner();
        assert_eq!(sink.data.len(), 4 + 5);
        assert!(sink.write_failed && sink.flush_failed);
    }

    #[test]
    fn write_timeout_is_reported() {
        let mut writer = FrameWriter::new(Hiccup::new(ErrorKind::WouldBlock));
        let err = writer.send(b"late").unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
        assert!(writer.get_ref().data.is_empty());
    }

    #[test]
    fn short_writes_are_completed() {
        let mut writer = FrameWriter::new(OneByteWriter(Vec::new()));
        writer.send(b"drip").unwrap();
        assert_eq!(writer.into_inner().0, vec![4, 0, 0, 0, b'd', b'r', b'i', b'p']);
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn other_write_errors_propagate() {
        let mut writer = FrameWriter::new(FailingWriter);
        let err = writer.send(b"x").unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn written_bytes_decode() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(b"z").unwrap();

        let wire = writer.into_inner().into_inner();
        let mut framed = crate::reader::FrameReader::new(Cursor::new(wire));
        assert_eq!(framed.read_message().unwrap().as_ref(), b"z");
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Fails the first write and the first flush with `kind`, then behaves.
    struct Hiccup {
        kind: ErrorKind,
        write_failed: bool,
        flush_failed: bool,
        data: Vec<u8>,
    }

    impl Hiccup {
        fn new(kind: ErrorKind) -> Self {
            Self {
                kind,
                write_failed: false,
                flush_failed: false,
                data: Vec::new(),
            }
        }
    }

    impl Write for Hiccup {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !std::mem::replace(&mut self.write_failed, true) {
                return Err(self.kind.into());
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !std::mem::replace(&mut self.flush_failed, true) {
                return Err(self.kind.into());
            }
            Ok(())
        }
    }

    struct OneByteWriter(Vec<u8>);

    impl Write for OneByteWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            match buf.first() {
                Some(byte) => {
                    self.0.push(*byte);
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
