//! Error types for agent transport operations.
//!
//! Resolution, connection, socket tuning, transmit and receive failures each
//! map to their own [`CommError`] variant so callers can decide whether to
//! retry at a higher level. Recoverable receive outcomes (a pending
//! attachment or a header that did not fit the buffer) are not errors; see
//! [`Received`].

use std::{io, net::SocketAddr};

use thiserror::Error;

use crate::connection::Received;

/// Failure to resolve an agent address to an IPv4 endpoint.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The resolver does not know the host name.
    #[error("agent host is unreachable: name not known")]
    HostUnreachable,
    /// The host exists but has no address in the IPv4 family.
    #[error("agent host has no IPv4 address")]
    AddressFamilyUnsupported,
    /// The host name is valid but carries no address records.
    #[error("agent host has no address records")]
    NoData,
    /// The name server returned a temporary failure.
    #[error("temporary failure in name resolution")]
    Temporary,
    /// The resolver failed with an operating system error.
    #[error("name resolution failed: {0}")]
    System(#[source] io::Error),
    /// Any other resolver failure.
    #[error("name resolution failed ({code}): {message}")]
    Failed {
        /// Resolver status code.
        code: i32,
        /// Resolver description of the status code.
        message: String,
    },
}

impl ResolveError {
    /// Returns true if repeating the lookup later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool { matches!(self, Self::Temporary) }
}

/// Errors emitted by [`crate::Connection`] operations.
#[derive(Debug, Error)]
pub enum CommError {
    /// The agent address could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// Every connect attempt failed; carries the error of the last attempt.
    #[error("failed to connect to {addr} after {attempts} attempt(s): {source}")]
    Connect {
        /// Resolved agent endpoint.
        addr: SocketAddr,
        /// Number of attempts made.
        attempts: u32,
        /// Error reported by the final attempt.
        #[source]
        source: io::Error,
    },
    /// Tuning the connected socket failed.
    #[error("failed to set {option}: {source}")]
    SocketOption {
        /// Name of the socket option.
        option: &'static str,
        /// Error reported by the operating system.
        #[source]
        source: io::Error,
    },
    /// The transmit retry budget ran out with bytes still unsent.
    #[error("transmit stalled with {remaining} of {total} bytes unsent: {source}")]
    TransmitExhausted {
        /// Length of the buffer handed to `send`.
        total: usize,
        /// Bytes that never reached the socket.
        remaining: usize,
        /// Error returned by the last failed write.
        #[source]
        source: io::Error,
    },
    /// Transport error on an established connection.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// The peer closed the connection while a read was outstanding.
    #[error("connection closed by peer")]
    PeerClosed,
    /// An agent's first message did not arrive whole in the caller's buffer.
    #[error("agent greeting was not a complete message: {0}")]
    IncompleteGreeting(Received),
    /// A caller-supplied argument was malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

impl CommError {
    /// Returns true if the peer closed the connection mid-read.
    #[must_use]
    pub const fn is_peer_closed(&self) -> bool { matches!(self, Self::PeerClosed) }

    /// Operating system error code underlying this error, if any.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Connect { source, .. }
            | Self::SocketOption { source, .. }
            | Self::TransmitExhausted { source, .. }
            | Self::Io(source)
            | Self::Resolve(ResolveError::System(source)) => source.raw_os_error(),
            Self::PeerClosed => Some(libc::EPIPE),
            Self::Resolve(_) | Self::IncompleteGreeting(_) | Self::InvalidArgument(_) => None,
        }
    }
}

/// Result alias used throughout `agentwire`.
pub type Result<T, E = CommError> = std::result::Result<T, E>;
