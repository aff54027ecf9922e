use std::io::{ErrorKind, Read};

use bytes::Bytes;

use crate::accumulator::{Accumulator, Progress};
use crate::codec::FrameConfig;
use crate::error::{is_transport_closed, FrameError, Result};

/// Reads complete messages from any `Read` stream.
///
/// Handles partial reads internally — callers always get complete messages.
pub struct FrameReader<T> {
    inner: T,
    acc: Accumulator,
    scratch: Vec<u8>,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            acc: Accumulator::new(config),
            scratch: Vec::new(),
        }
    }

    /// Read the next complete message (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when the stream ends on a
    /// frame boundary and `Err(FrameError::Truncated { .. })` when it ends
    /// inside one. After either, no further reads are issued.
    ///
    /// Other I/O errors (including `WouldBlock` from a read timeout) leave the
    /// partial frame in place, so the call can be retried.
    pub fn read_message(&mut self) -> Result<Bytes> {
        loop {
            let want = self.acc.next_read_len();
            if want == 0 {
                return Err(FrameError::ConnectionClosed);
            }
            if self.scratch.len() < want {
                self.scratch.resize(want, 0);
            }

            let read = match self.inner.read(&mut self.scratch[..want]) {
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

    /// Iterate over messages until the stream closes cleanly.
    ///
    /// A clean close ends the iteration; any other error is yielded once and
    /// then the iteration ends.
    pub fn messages(&mut self) -> Messages<'_, T> {
        Messages {
            reader: self,
            done: false,
        }
    }

    /// Returns true once the stream has ended or failed fatally.
    pub fn is_closed(&self) -> bool {
        self.acc.is_closed()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        self.acc.config()
    }
}

/// Iterator returned by [`FrameReader::messages`].
pub struct Messages<'a, T> {
    reader: &'a mut FrameReader<T>,
    done: bool,
}

impl<T: Read> Iterator for Messages<'_, T> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_message() {
            Ok(message) => Some(Ok(message)),
            Err(FrameError::ConnectionClosed) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
