//! Shared utilities for integration tests.
//!
//! Provides a mutex-guarded `log` capture fixture, loopback listener
//! helpers and a fast-retrying engine configuration.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    sync::{Mutex, MutexGuard, OnceLock},
    time::Duration,
};

use agentwire::{
    EngineConfig,
    config::{ConnectRetry, TransmitRetry},
};
use logtest::Logger;
use rstest::fixture;
use tokio::net::{TcpListener, TcpStream};

/// Handle to the global logger with exclusive access.
///
/// Serialises access to a [`logtest::Logger`] so tests in one binary do not
/// read each other's records.
pub struct LoggerHandle {
    guard: MutexGuard<'static, Logger>,
}

impl LoggerHandle {
    /// Acquire the global [`Logger`] instance.
    #[expect(
        clippy::expect_used,
        reason = "a poisoned logger mutex means an earlier test already failed"
    )]
    pub fn new() -> Self {
        static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

        let logger = LOGGER.get_or_init(|| Mutex::new(Logger::start()));
        let guard = logger.lock().expect("logger poisoned");

        Self { guard }
    }

    /// Discard every captured record.
    pub fn clear(&mut self) { while self.guard.pop().is_some() {} }

    /// Drain captured records, returning the messages at `level`.
    pub fn messages_at(&mut self, level: log::Level) -> Vec<String> {
        let mut messages = Vec::new();
        while let Some(record) = self.guard.pop() {
            if record.level() == level {
                messages.push(record.args().to_owned());
            }
        }
        messages
    }
}

impl std::ops::Deref for LoggerHandle {
    type Target = Logger;

    fn deref(&self) -> &Self::Target { &self.guard }
}

impl std::ops::DerefMut for LoggerHandle {
    fn deref_mut(&mut self) -> &mut Self::Target { &mut self.guard }
}

#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
#[fixture]
pub fn logger() -> LoggerHandle { LoggerHandle::new() }

/// Engine configuration with short retry delays.
#[fixture]
pub fn fast_config() -> EngineConfig {
    EngineConfig::default()
        .with_connect_retry(ConnectRetry {
            attempts: 3,
            delay: Duration::from_millis(10),
        })
        .with_transmit_retry(TransmitRetry {
            max_tries: 50,
            delay: Duration::from_millis(1),
        })
}

/// Bind a loopback listener and accept exactly one agent connection.
#[expect(
    clippy::expect_used,
    reason = "loopback setup failures must abort the test immediately"
)]
pub async fn spawn_agent() -> (SocketAddr, tokio::task::JoinHandle<TcpStream>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("listener addr");
    let accept = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept engine");
        stream
    });
    (addr, accept)
}

/// Find a loopback port with nothing listening on it.
#[expect(
    clippy::expect_used,
    reason = "binding to an ephemeral localhost port must abort the test immediately"
)]
pub fn closed_port() -> u16 {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    let listener = StdTcpListener::bind(addr).expect("failed to bind port");
    listener.local_addr().expect("listener addr").port()
}
