//! Incremental frame reassembly.
//!
//! [`Accumulator`] owns no I/O. A driver asks it how many bytes to read next,
//! reads at most that many from its source, and feeds them back. This keeps a
//! single state machine behind both the blocking and the async readers.

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::codec::{FrameConfig, IO_CHUNK_SIZE};
use crate::error::{FrameError, Result};
use crate::header::MAX_HEADER_WIDTH;

/// Outcome of feeding bytes to an [`Accumulator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// The current frame is still incomplete.
    NeedMore,
    /// A frame completed. The accumulator is already waiting on the next header.
    Message(Bytes),
}

/// Which part of a frame the accumulator is collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Header,
    Payload,
    Closed,
}

#[derive(Debug)]
enum State {
    AwaitingHeader {
        buf: [u8; MAX_HEADER_WIDTH],
        filled: usize,
    },
    AwaitingPayload {
        declared: u64,
        payload: BytesMut,
    },
    Closed,
}

impl State {
    fn awaiting_header() -> Self {
        State::AwaitingHeader {
            buf: [0u8; MAX_HEADER_WIDTH],
            filled: 0,
        }
    }
}

enum Completed {
    Header(u64),
    Payload(Bytes),
}

/// Read-side reassembly state for one stream.
///
/// Header bytes are collected until exactly `width` are present, then payload
/// bytes until exactly the declared length is present. No byte is ever read
/// as a header before the previous payload has drained.
#[derive(Debug)]
pub struct Accumulator {
    config: FrameConfig,
    state: State,
}

impl Accumulator {
    /// Create an accumulator waiting on the first header.
    pub fn new(config: FrameConfig) -> Self {
        Self {
            config,
            state: State::awaiting_header(),
        }
    }

    /// Configuration this accumulator decodes with.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        match self.state {
            State::AwaitingHeader { .. } => Phase::Header,
            State::AwaitingPayload { .. } => Phase::Payload,
            State::Closed => Phase::Closed,
        }
    }

    /// Returns true once the stream has been closed or has failed.
    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Bytes still missing from the current phase.
    pub fn remaining(&self) -> u64 {
        match &self.state {
            State::AwaitingHeader { filled, .. } => (self.config.width.bytes() - filled) as u64,
            State::AwaitingPayload { declared, payload } => declared - payload.len() as u64,
            State::Closed => 0,
        }
    }

    /// How many bytes the driver should request from its source next.
    ///
    /// Header reads ask for exactly the missing header bytes; payload reads are
    /// bounded by [`IO_CHUNK_SIZE`]. Zero once closed.
    pub fn next_read_len(&self) -> usize {
        match self.state {
            State::AwaitingHeader { .. } => self.remaining() as usize,
            State::AwaitingPayload { .. } => self.remaining().min(IO_CHUNK_SIZE as u64) as usize,
            State::Closed => 0,
        }
    }

    /// Feed bytes read from the source.
    ///
    /// A chunk longer than [`Accumulator::remaining`] is a protocol violation:
    /// the accumulator closes and nothing is trimmed. Feeding a closed
    /// accumulator does nothing.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Progress> {
        if self.is_closed() {
            return Ok(Progress::NeedMore);
        }

        let remaining = self.remaining();
        if chunk.len() as u64 > remaining {
            self.state = State::Closed;
            return Err(FrameError::ProtocolViolation {
                expected: usize::try_from(remaining).unwrap_or(usize::MAX),
                received: chunk.len(),
            });
        }

        let width = self.config.width;
        let completed = match &mut self.state {
            State::AwaitingHeader { buf, filled } => {
                buf[*filled..*filled + chunk.len()].copy_from_slice(chunk);
                *filled += chunk.len();
                if *filled < width.bytes() {
                    return Ok(Progress::NeedMore);
                }
                Completed::Header(width.decode(&buf[..width.bytes()])?)
            }
            State::AwaitingPayload { declared, payload } => {
                payload.extend_from_slice(chunk);
                if (payload.len() as u64) < *declared {
                    return Ok(Progress::NeedMore);
                }
                Completed::Payload(std::mem::take(payload).freeze())
            }
            State::Closed => return Ok(Progress::NeedMore),
        };

        match completed {
            Completed::Header(declared) => self.begin_payload(declared),
            Completed::Payload(message) => {
                self.state = State::awaiting_header();
                Ok(Progress::Message(message))
            }
        }
    }

    /// Record end-of-stream.
    ///
    /// At a frame boundary this is a clean close. Inside a frame it reports
    /// how much of the frame arrived. The accumulator is closed either way.
    pub fn close(&mut self) -> Result<()> {
        let width = self.config.width.bytes() as u64;
        let outcome = match &self.state {
            State::AwaitingHeader { filled: 0, .. } | State::Closed => Ok(()),
            State::AwaitingHeader { filled, .. } => Err(FrameError::Truncated {
                expected: width,
                received: *filled as u64,
            }),
            State::AwaitingPayload { declared, payload } => Err(FrameError::Truncated {
                expected: width.saturating_add(*declared),
                received: width + payload.len() as u64,
            }),
        };
        self.state = State::Closed;
        outcome
    }

    fn begin_payload(&mut self, declared: u64) -> Result<Progress> {
        if let Err(err) = self.config.check_payload_len(declared) {
            self.state = State::Closed;
            return Err(err);
        }
        trace!(declared, width = self.config.width.bytes(), "frame header decoded");

        if declared == 0 {
            self.state = State::awaiting_header();
            return Ok(Progress::Message(Bytes::new()));
        }

        let initial = declared.min(IO_CHUNK_SIZE as u64) as usize;
        self.state = State::AwaitingPayload {
            declared,
            payload: BytesMut::with_capacity(initial),
        };
        Ok(Progress::NeedMore)
    }
}
