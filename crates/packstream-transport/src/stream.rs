use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};

/// Socket options applied after connecting or accepting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Blocking reads give up after this long. `None` waits forever.
    pub read_timeout: Option<Duration>,
    /// Blocking writes give up after this long. `None` waits forever.
    pub write_timeout: Option<Duration>,
}

impl ConnectOptions {
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }
}

/// A connected duplex byte stream.
pub struct Connection {
    inner: ConnectionInner,
}

enum ConnectionInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Tcp(TcpStream),
}

impl Connection {
    /// Connect to a listening endpoint (blocking).
    pub fn connect(endpoint: &Endpoint) -> Result<Self> {
        let connect_err = |source| TransportError::Connect {
            endpoint: endpoint.to_string(),
            source,
        };

        let connection = match endpoint {
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                let stream = std::os::unix::net::UnixStream::connect(path).map_err(connect_err)?;
                Self::from_unix(stream)
            }
            #[cfg(not(unix))]
            Endpoint::Unix(_) => return Err(TransportError::Unsupported),
            Endpoint::Tcp(addr) => {
                let stream = TcpStream::connect(addr.as_str()).map_err(connect_err)?;
                Self::from_tcp(stream)
            }
        };
        debug!(%endpoint, "connected");
        Ok(connection)
    }

    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: ConnectionInner::Unix(stream),
        }
    }

    pub fn from_tcp(stream: TcpStream) -> Self {
        // Frames are written header then payload; don't let Nagle hold the header back.
        let _ = stream.set_nodelay(true);
        Self {
            inner: ConnectionInner::Tcp(stream),
        }
    }

    /// A connected pair of in-process streams.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (a, b) = std::os::unix::net::UnixStream::pair()?;
        Ok((Self::from_unix(a), Self::from_unix(b)))
    }

    /// Apply timeouts to the underlying socket.
    pub fn apply(&self, options: &ConnectOptions) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => {
                stream.set_read_timeout(options.read_timeout)?;
                stream.set_write_timeout(options.write_timeout)?;
            }
            ConnectionInner::Tcp(stream) => {
                stream.set_read_timeout(options.read_timeout)?;
                stream.set_write_timeout(options.write_timeout)?;
            }
        }
        Ok(())
    }

    /// Clone the handle (a new descriptor for the same socket).
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => ConnectionInner::Unix(stream.try_clone()?),
            ConnectionInner::Tcp(stream) => ConnectionInner::Tcp(stream.try_clone()?),
        };
        Ok(Self { inner })
    }

    /// Split into a read half and a write half.
    pub fn split(self) -> Result<(Self, Self)> {
        let reader = self.try_clone()?;
        Ok((reader, self))
    }

    /// Shut down one or both directions. Affects every clone.
    pub fn shutdown(&self, how: Shutdown) -> Result<()> {
        let result = match &self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.shutdown(how),
            ConnectionInner::Tcp(stream) => stream.shutdown(how),
        };
        match result {
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            other => other.map_err(Into::into),
        }
    }

    /// Description of the remote side for diagnostics.
    pub fn peer(&self) -> String {
        match &self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream
                .peer_addr()
                .ok()
                .and_then(|addr| addr.as_pathname().map(|p| format!("unix:{}", p.display())))
                .unwrap_or_else(|| "unix:(unnamed)".to_string()),
            ConnectionInner::Tcp(stream) => stream
                .peer_addr()
                .map(|addr| format!("tcp://{addr}"))
                .unwrap_or_else(|_| "tcp://(unknown)".to_string()),
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.read(buf),
            ConnectionInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.write(buf),
            ConnectionInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.flush(),
            ConnectionInner::Tcp(stream) => stream.flush(),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(_) => "unix",
            ConnectionInner::Tcp(_) => "tcp",
        };
        f.debug_struct("Connection").field("type", &kind).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn split_halves_share_socket() {
        let (left, mut right) = Connection::pair().unwrap();
        let (mut reader, mut writer) = left.split().unwrap();

        writer.write_all(b"out").unwrap();
        let mut buf = [0u8; 3];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"out");

        right.write_all(b"in").unwrap();
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"in");
    }

    #[cfg(unix)]
    #[test]
    fn read_timeout_applies() {
        let (mut left, _right) = Connection::pair().unwrap();
        left.apply(&ConnectOptions::default().with_read_timeout(Duration::from_millis(20)))
            .unwrap();

        let mut buf = [0u8; 1];
        let err = left.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        ));
    }

    #[cfg(unix)]
    #[test]
    fn shutdown_reaches_peer_as_eof() {
        let (left, mut right) = Connection::pair().unwrap();
        left.shutdown(Shutdown::Write).unwrap();

        let mut buf = [0u8; 1];
        assert_eq!(right.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn connect_refused_names_endpoint() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = Connection::connect(&Endpoint::tcp(addr.to_string())).unwrap_err();
        match err {
            TransportError::Connect { endpoint, .. } => assert!(endpoint.starts_with("tcp://")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
