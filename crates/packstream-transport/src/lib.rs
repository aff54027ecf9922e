//! Duplex byte streams for framed channels.
//!
//! Provides the concrete streams a framed channel runs over:
//! - Unix domain sockets (Unix only)
//! - TCP
//!
//! Everything here is plain blocking `Read + Write`; framing lives one layer up.

pub mod endpoint;
pub mod error;
pub mod listener;
pub mod stream;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use listener::Listener;
pub use stream::{ConnectOptions, Connection};
