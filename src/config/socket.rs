//! Socket tuning applied to freshly connected agent sockets.

use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;

use crate::error::CommError;

/// TCP keepalive timing.
///
/// `interval` and `count` are only applied on platforms that expose
/// `TCP_KEEPINTVL` and `TCP_KEEPCNT`; elsewhere only `idle` takes effect.
///
/// # Default Values
/// - `idle`: 60 seconds
/// - `interval`: 10 seconds
/// - `count`: 5 keepalive packets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeepaliveConfig {
    /// Idle time before the first keepalive packet (`TCP_KEEPIDLE`).
    pub idle: Duration,
    /// Time between keepalive packets (`TCP_KEEPINTVL`).
    pub interval: Duration,
    /// Unanswered keepalive packets before the connection is dropped (`TCP_KEEPCNT`).
    pub count: u32,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            idle: Duration::from_secs(60),
            interval: Duration::from_secs(10),
            count: 5,
        }
    }
}

impl KeepaliveConfig {
    fn to_tcp_keepalive(self) -> TcpKeepalive {
        let keepalive = TcpKeepalive::new().with_time(self.idle);
        #[cfg(any(
            target_os = "linux",
            target_os = "android",
            target_os = "freebsd",
            target_os = "netbsd",
            target_os = "macos",
            target_os = "ios",
        ))]
        let keepalive = keepalive
            .with_interval(self.interval)
            .with_retries(self.count);
        keepalive
    }
}

/// Socket options applied once the connection is established.
///
/// A failure to apply any option aborts the connect call and closes the
/// socket.
///
/// # Examples
///
/// ```
/// use agentwire::config::{KeepaliveConfig, SocketOptions};
///
/// let options = SocketOptions::default().keepalive(None);
/// assert!(options.nodelay_enabled());
/// assert_eq!(options.keepalive_config(), None);
///
/// let tuned = SocketOptions::default().keepalive(Some(KeepaliveConfig::default()));
/// assert_eq!(tuned, SocketOptions::default());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SocketOptions {
    nodelay: bool,
    keepalive: Option<KeepaliveConfig>,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            nodelay: true,
            keepalive: Some(KeepaliveConfig::default()),
        }
    }
}

impl SocketOptions {
    /// Configure `TCP_NODELAY` on the socket.
    #[must_use]
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = enabled;
        self
    }

    /// Configure `SO_KEEPALIVE` and its timing. `None` disables it.
    #[must_use]
    pub fn keepalive(mut self, config: Option<KeepaliveConfig>) -> Self {
        self.keepalive = config;
        self
    }

    /// Whether `TCP_NODELAY` will be enabled.
    #[must_use]
    pub fn nodelay_enabled(&self) -> bool { self.nodelay }

    /// Keepalive timing, if keepalive will be enabled.
    #[must_use]
    pub fn keepalive_config(&self) -> Option<KeepaliveConfig> { self.keepalive }

    pub(crate) fn apply(&self, stream: &TcpStream) -> Result<(), CommError> {
        self.apply_nodelay(stream)?;
        self.apply_keepalive(stream)?;
        Ok(())
    }

    fn apply_nodelay(&self, stream: &TcpStream) -> Result<(), CommError> {
        stream
            .set_nodelay(self.nodelay)
            .map_err(|source| CommError::SocketOption {
                option: "TCP_NODELAY",
                source,
            })
    }

    fn apply_keepalive(&self, stream: &TcpStream) -> Result<(), CommError> {
        let sock_ref = SockRef::from(stream);
        match self.keepalive {
            Some(config) => {
                sock_ref
                    .set_tcp_keepalive(&config.to_tcp_keepalive())
                    .map_err(|source| CommError::SocketOption {
                        option: "TCP keepalive timing",
                        source,
                    })?;
                sock_ref
                    .set_keepalive(true)
                    .map_err(|source| CommError::SocketOption {
                        option: "SO_KEEPALIVE",
                        source,
                    })
            }
            None => sock_ref
                .set_keepalive(false)
                .map_err(|source| CommError::SocketOption {
                    option: "SO_KEEPALIVE",
                    source,
                }),
        }
    }
}
