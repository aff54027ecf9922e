use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::TransportError;

/// Where to bind or connect.
///
/// Parsed from `unix:/path`, a bare filesystem path, `tcp://host:port` or
/// `tcp:host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl Endpoint {
    pub fn unix(path: impl AsRef<Path>) -> Self {
        Endpoint::Unix(path.as_ref().to_path_buf())
    }

    pub fn tcp(addr: impl Into<String>) -> Self {
        Endpoint::Tcp(addr.into())
    }

    /// Short transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match self {
            Endpoint::Unix(_) => "unix",
            Endpoint::Tcp(_) => "tcp",
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| TransportError::InvalidEndpoint {
            input: input.to_string(),
            reason,
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty endpoint"));
        }

        if let Some(rest) = trimmed
            .strip_prefix("tcp://")
            .or_else(|| trimmed.strip_prefix("tcp:"))
        {
            return parse_tcp(rest).map(Endpoint::Tcp).map_err(invalid);
        }

        let path = trimmed.strip_prefix("unix:").unwrap_or(trimmed);
        if path.is_empty() {
            return Err(invalid("missing socket path"));
        }
        Ok(Endpoint::Unix(PathBuf::from(path)))
    }
}

fn parse_tcp(rest: &str) -> Result<String, &'static str> {
    let (host, port) = rest.rsplit_once(':').ok_or("expected host:port")?;
    if host.is_empty() {
        return Err("missing host");
    }
    port.parse::<u16>().map_err(|_| "port must be 0-65535")?;
    Ok(rest.to_string())
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
            Endpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}
