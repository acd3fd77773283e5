//! Connection configuration types.
//!
//! [`EngineConfig`] bundles the retry budgets, socket tuning and tracing
//! levels used by [`crate::Connection`]. The defaults are the fixed values
//! the engine transport has always used: ten connect attempts one second
//! apart, up to a thousand consecutive would-block retries ten milliseconds
//! apart, `TCP_NODELAY` and keepalive enabled.

mod retry;
mod socket;
mod tracing_config;

pub use retry::{ConnectRetry, TransmitRetry};
pub use socket::{KeepaliveConfig, SocketOptions};
pub use tracing_config::TracingConfig;

/// Settings applied when connecting to an agent and driving the connection.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use agentwire::config::{ConnectRetry, EngineConfig};
///
/// let config = EngineConfig::default().with_connect_retry(ConnectRetry {
///     attempts: 3,
///     delay: Duration::from_millis(100),
/// });
/// assert_eq!(config.connect.attempts, 3);
/// ```
#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
    /// Budget for `connect()` attempts.
    pub connect: ConnectRetry,
    /// Budget for would-block retries while transmitting.
    pub transmit: TransmitRetry,
    /// Socket tuning applied after the connection is established.
    pub socket: SocketOptions,
    /// Span levels and timing events for connection operations.
    pub tracing: TracingConfig,
}

impl EngineConfig {
    /// Replace the connect retry budget.
    #[must_use]
    pub fn with_connect_retry(mut self, retry: ConnectRetry) -> Self {
        self.connect = retry.normalized();
        self
    }

    /// Replace the transmit retry budget.
    #[must_use]
    pub fn with_transmit_retry(mut self, retry: TransmitRetry) -> Self {
        self.transmit = retry.normalized();
        self
    }

    /// Replace the socket options.
    #[must_use]
    pub fn with_socket_options(mut self, options: SocketOptions) -> Self {
        self.socket = options;
        self
    }

    /// Replace the tracing configuration.
    #[must_use]
    pub fn with_tracing(mut self, tracing: TracingConfig) -> Self {
        self.tracing = tracing;
        self
    }
}
