use std::net::TcpListener;

use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::stream::Connection;

/// A bound endpoint accepting connections one at a time.
pub struct Listener {
    inner: ListenerInner,
}

enum ListenerInner {
    #[cfg(unix)]
    Unix(unix::SocketFile),
    Tcp(TcpListener),
}

impl Listener {
    /// Permission mode for created socket files.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;

    /// Bind and listen.
    ///
    /// For Unix sockets a stale socket file at the path is removed first; any
    /// other kind of file is left alone and the bind fails.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        let inner = match endpoint {
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                ListenerInner::Unix(unix::SocketFile::bind(path, Self::DEFAULT_SOCKET_MODE)?)
            }
            #[cfg(not(unix))]
            Endpoint::Unix(_) => return Err(TransportError::Unsupported),
            Endpoint::Tcp(addr) => {
                let listener =
                    TcpListener::bind(addr.as_str()).map_err(|source| TransportError::Bind {
                        endpoint: endpoint.to_string(),
                        source,
                    })?;
                ListenerInner::Tcp(listener)
            }
        };
        let listener = Self { inner };
        info!(endpoint = %listener.local_endpoint(), "listening");
        Ok(listener)
    }

    /// Accept the next connection.
    ///
    /// Blocks unless [`Listener::set_nonblocking`] is on, in which case an
    /// empty backlog is `TransportError::Accept` with `ErrorKind::WouldBlock`.
    /// Accepted connections are always blocking.
    pub fn accept(&self) -> Result<Connection> {
        let connection = match &self.inner {
            #[cfg(unix)]
            ListenerInner::Unix(socket) => {
                let (stream, _) = socket.listener.accept().map_err(TransportError::Accept)?;
                stream.set_nonblocking(false)?;
                Connection::from_unix(stream)
            }
            ListenerInner::Tcp(listener) => {
                let (stream, _) = listener.accept().map_err(TransportError::Accept)?;
                stream.set_nonblocking(false)?;
                Connection::from_tcp(stream)
            }
        };
        debug!(peer = %connection.peer(), "accepted connection");
        Ok(connection)
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            ListenerInner::Unix(socket) => socket.listener.set_nonblocking(nonblocking)?,
            ListenerInner::Tcp(listener) => listener.set_nonblocking(nonblocking)?,
        }
        Ok(())
    }

    /// The endpoint actually bound. For TCP this carries the resolved port.
    pub fn local_endpoint(&self) -> Endpoint {
        match &self.inner {
            #[cfg(unix)]
            ListenerInner::Unix(socket) => Endpoint::Unix(socket.path.clone()),
            ListenerInner::Tcp(listener) => match listener.local_addr() {
                Ok(addr) => Endpoint::Tcp(addr.to_string()),
                Err(_) => Endpoint::Tcp("(unknown)".to_string()),
            },
        }
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("endpoint", &self.local_endpoint())
            .finish()
    }
}

#[cfg(unix)]
mod unix {
    use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
    use std::os::unix::net::UnixListener;
    use std::path::{Path, PathBuf};

    use tracing::debug;

    use crate::error::{Result, TransportError};

    /// `sockaddr_un.sun_path` capacity.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// A listening socket that owns its filesystem entry.
    pub(super) struct SocketFile {
        pub(super) listener: UnixListener,
        pub(super) path: PathBuf,
        /// `(dev, ino)` of the file we created; only that file is removed on drop.
        identity: (u64, u64),
    }

    impl SocketFile {
        pub(super) fn bind(path: &Path, mode: u32) -> Result<Self> {
            let bind_err = |source| TransportError::Bind {
                endpoint: format!("unix:{}", path.display()),
                source,
            };

            let len = path.as_os_str().len();
            if len >= MAX_PATH_LEN {
                return Err(TransportError::PathTooLong {
                    path: path.to_path_buf(),
                    len,
                    max: MAX_PATH_LEN,
                });
            }

            clear_stale(path).map_err(bind_err)?;
            let listener = UnixListener::bind(path).map_err(bind_err)?;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
                .map_err(bind_err)?;
            let metadata = std::fs::symlink_metadata(path).map_err(bind_err)?;

            Ok(Self {
                listener,
                path: path.to_path_buf(),
                identity: (metadata.dev(), metadata.ino()),
            })
        }
    }

    /// Remove a leftover socket file. Anything that is not a socket is an error.
    fn clear_stale(path: &Path) -> std::io::Result<()> {
        let metadata = match std::fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err),
        };
        if !metadata.file_type().is_socket() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "existing path is not a unix socket",
            ));
        }
        debug!(?path, "removing stale socket");
        std::fs::remove_file(path)
    }

    impl Drop for SocketFile {
        fn drop(&mut self) {
            let Ok(metadata) = std::fs::symlink_metadata(&self.path) else {
                return;
            };
            if metadata.file_type().is_socket() && (metadata.dev(), metadata.ino()) == self.identity
            {
                debug!(path = ?self.path, "removing socket file");
                let _ = std::fs::remove_file(&self.path);
            } else {
                debug!(path = ?self.path, "socket path was replaced; leaving it");
            }
        }
    }
}
