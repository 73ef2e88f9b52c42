//! Endpoint resolution.
//!
//! Turns `unix://<path>`, `tcp://<host:port>`, or a bare filesystem path into
//! a transport and an address. Prefix matching ignores ASCII case; anything
//! without a recognised prefix is a Unix socket path taken verbatim.

use std::fmt;
use std::str::FromStr;

/// Errors from endpoint resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid endpoint: {0:?}")]
    InvalidEndpoint(String),
}

/// How a listener is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// Filesystem socket.
    Unix,
    /// Network stream.
    Tcp,
}

impl Transport {
    const ALL: [Transport; 2] = [Transport::Unix, Transport::Tcp];

    fn prefix(self) -> &'static str {
        match self {
            Transport::Unix => "unix://",
            Transport::Tcp => "tcp://",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Unix => f.write_str("unix"),
            Transport::Tcp => f.write_str("tcp"),
        }
    }
}

/// A resolved endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub transport: Transport,
    /// Socket path or `host:port`, with the transport prefix removed.
    pub address: String,
}

impl Endpoint {
    /// Resolve an endpoint string.
    pub fn parse(ep: &str) -> Result<Self, EndpointError> {
        for transport in Transport::ALL {
            let prefix = transport.prefix();
            let matches = ep
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
            if matches {
                let address = &ep[prefix.len()..];
                if address.is_empty() {
                    return Err(EndpointError::InvalidEndpoint(ep.to_string()));
                }
                return Ok(Self {
                    transport,
                    address: address.to_string(),
                });
            }
        }

        if ep.is_empty() {
            return Err(EndpointError::InvalidEndpoint(ep.to_string()));
        }
        Ok(Self {
            transport: Transport::Unix,
            address: ep.to_string(),
        })
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.transport, self.address)
    }
}
