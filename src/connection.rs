//! Engine-side connection to a test agent.
//!
//! A [`Connection`] owns one TCP socket and the count of attachment bytes
//! the agent still owes from the last announced message. All operations on
//! one connection are sequential; independent connections share nothing.

mod receive;
mod spans;
mod transmit;
mod transport;

use std::{fmt, net::SocketAddr};

use log::warn;
use tokio::net::{TcpSocket, TcpStream};
use tracing::Instrument;

pub use self::{receive::Received, transport::Transport};
use self::spans::{close_span, connect_span, emit_timing_event, send_span, start_timer};
use crate::{
    config::EngineConfig,
    error::{CommError, Result},
    resolve::resolve_ipv4,
};

/// An open connection to a test agent.
///
/// The handle must be released with [`close`](Self::close) to observe
/// close errors; dropping it closes the socket silently.
///
/// # Examples
///
/// ```no_run
/// use agentwire::{Connection, Received};
///
/// # #[tokio::main]
/// # async fn main() -> agentwire::Result<()> {
/// let mut conn = Connection::connect("agent.lab", "5000").await?;
/// conn.send(b"get /agent/status\0").await?;
/// let mut buf = vec![0; 4096];
/// let reply = conn.receive(&mut buf).await?;
/// assert!(matches!(reply, Received::Complete { .. }));
/// conn.close()
/// # }
/// ```
pub struct Connection<T = TcpStream> {
    transport: T,
    pending_attachment_bytes: usize,
    config: EngineConfig,
}

impl<T> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("pending_attachment_bytes", &self.pending_attachment_bytes)
            .finish_non_exhaustive()
    }
}

impl Connection<TcpStream> {
    /// Connect to the agent at `host:port` with the default configuration.
    ///
    /// # Errors
    ///
    /// See [`connect_with`](Self::connect_with).
    pub async fn connect(host: &str, port: &str) -> Result<Self> {
        Self::connect_with(host, port, &EngineConfig::default()).await
    }

    /// Connect to the agent at `host:port`.
    ///
    /// The address is resolved once to an IPv4 endpoint. A refused or
    /// failed `connect()` is retried on a fresh socket according to
    /// `config.connect`. Once connected, `config.socket` is applied.
    ///
    /// # Errors
    ///
    /// Returns [`CommError::InvalidArgument`] for a malformed port,
    /// [`CommError::Resolve`] if resolution fails, [`CommError::Connect`]
    /// with the last attempt's error once the retry budget is spent, and
    /// [`CommError::SocketOption`] if tuning the socket fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::time::Duration;
    ///
    /// use agentwire::{
    ///     Connection,
    ///     config::{ConnectRetry, EngineConfig},
    /// };
    ///
    /// # #[tokio::main]
    /// # async fn main() -> agentwire::Result<()> {
    /// let config = EngineConfig::default().with_connect_retry(ConnectRetry {
    ///     attempts: 3,
    ///     delay: Duration::from_millis(200),
    /// });
    /// let conn = Connection::connect_with("10.0.0.7", "5000", &config).await?;
    /// conn.close()
    /// # }
    /// ```
    pub async fn connect_with(host: &str, port: &str, config: &EngineConfig) -> Result<Self> {
        let span = connect_span(&config.tracing, host, port);
        let start = start_timer(config.tracing.connect_timing);
        let result = Self::establish(host, port, config)
            .instrument(span.clone())
            .await;
        span.in_scope(|| emit_timing_event(start));
        result
    }

    async fn establish(host: &str, port: &str, config: &EngineConfig) -> Result<Self> {
        let addr = SocketAddr::V4(resolve_ipv4(host, port).await?);
        tracing::Span::current().record("peer.addr", tracing::field::display(addr));

        let retry = config.connect.normalized();
        let mut attempt = 1;
        let stream = loop {
            let socket = TcpSocket::new_v4()?;
            match socket.connect(addr).await {
                Ok(stream) => break stream,
                Err(source) if attempt >= retry.attempts => {
                    return Err(CommError::Connect {
                        addr,
                        attempts: attempt,
                        source,
                    });
                }
                Err(err) => {
                    warn!(
                        "connect to {addr} failed (attempt {attempt} of {}): {err}",
                        retry.attempts
                    );
                    tokio::time::sleep(retry.delay).await;
                    attempt += 1;
                }
            }
        };

        config.socket.apply(&stream)?;
        tracing::debug!(attempts = attempt, "connected");
        Ok(Self::from_transport(stream, config.clone()))
    }

    /// Address of the connected agent.
    ///
    /// # Errors
    ///
    /// Propagates the error from the socket.
    pub fn peer_addr(&self) -> Result<SocketAddr> { Ok(self.transport.peer_addr()?) }
}

#[cfg(unix)]
impl std::os::fd::AsRawFd for Connection<TcpStream> {
    fn as_raw_fd(&self) -> std::os::fd::RawFd { self.transport.as_raw_fd() }
}

impl<T: Transport> Connection<T> {
    /// Wrap an already-established transport.
    ///
    /// No socket options are applied and the pending attachment count
    /// starts at zero.
    #[must_use]
    pub fn from_transport(transport: T, config: EngineConfig) -> Self {
        Self {
            transport,
            pending_attachment_bytes: 0,
            config,
        }
    }

    /// Attachment bytes still owed by the agent from the last message.
    #[must_use]
    pub fn pending_attachment_bytes(&self) -> usize { self.pending_attachment_bytes }

    /// Borrow the underlying transport.
    #[must_use]
    pub fn get_ref(&self) -> &T { &self.transport }

    /// Configuration this connection was created with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig { &self.config }

    /// Write all of `data` to the agent.
    ///
    /// No framing is added; build messages with
    /// [`encode_message`](crate::frame::encode_message). Bytes already
    /// written stay written if the call fails.
    ///
    /// # Errors
    ///
    /// Returns [`CommError::TransmitExhausted`] if the socket stays full for
    /// the whole retry budget and [`CommError::Io`] for any other write
    /// failure.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        let span = send_span(&self.config.tracing, data.len());
        let start = start_timer(self.config.tracing.send_timing);
        let retry = self.config.transmit.normalized();
        let result = transmit::transmit(&mut self.transport, data, retry)
            .instrument(span.clone())
            .await;
        span.in_scope(|| emit_timing_event(start));
        result
    }

    /// Return `true` if a [`receive`](Self::receive) would find data
    /// without waiting.
    ///
    /// A pending attachment always counts as ready. Never blocks.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.pending_attachment_bytes > 0 || self.transport.poll_readable()
    }

    /// Close the connection.
    ///
    /// The handle is consumed whether or not the close succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`CommError::Io`] if the operating system reports an error
    /// while closing the socket.
    pub fn close(self) -> Result<()> {
        let span = close_span(&self.config.tracing);
        let _guard = span.enter();
        let start = start_timer(self.config.tracing.close_timing);
        if self.pending_attachment_bytes > 0 {
            tracing::debug!(
                pending = self.pending_attachment_bytes,
                "closing with attachment bytes unread"
            );
        }
        let result = self.transport.close().map_err(CommError::Io);
        emit_timing_event(start);
        result
    }
}
