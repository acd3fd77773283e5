//! Connecting to a freshly started agent.
//!
//! A newly launched agent may not be listening yet, or may accept and then
//! drop the connection while it finishes starting. [`connect_agent`] keeps
//! reconnecting with exponential back-off until the agent sends its
//! greeting, the `PID <n>` line every agent opens with.

use std::time::Duration;

use log::{info, warn};

use crate::{
    config::EngineConfig,
    connection::{Connection, Received},
    error::{CommError, Result},
};

/// Back-off settings for [`connect_agent`].
///
/// The delay starts at `initial_delay` and doubles after each failure,
/// capped at `max_delay`.
///
/// # Default Values
/// - `initial_delay`: 1 second
/// - `max_delay`: 5 seconds
/// - `max_attempts`: 3
///
/// # Invariants
/// - `initial_delay` must not exceed `max_delay`
/// - `max_attempts` is at least 1
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound for the doubled delay.
    pub max_delay: Duration,
    /// Total number of connect-and-greet attempts.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            max_attempts: 3,
        }
    }
}

impl ReconnectConfig {
    /// Ensure `initial_delay <= max_delay` and at least one attempt.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use agentwire::reconnect::ReconnectConfig;
    ///
    /// let cfg = ReconnectConfig {
    ///     initial_delay: Duration::from_secs(8),
    ///     max_delay: Duration::from_secs(2),
    ///     max_attempts: 0,
    /// }
    /// .normalized();
    /// assert_eq!(cfg.initial_delay, Duration::from_secs(2));
    /// assert_eq!(cfg.max_delay, Duration::from_secs(8));
    /// assert_eq!(cfg.max_attempts, 1);
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.initial_delay > self.max_delay {
            std::mem::swap(&mut self.initial_delay, &mut self.max_delay);
        }
        self.max_attempts = self.max_attempts.max(1);
        self
    }
}

/// A connection whose agent has sent its greeting.
#[derive(Debug)]
pub struct AgentSession {
    /// The open connection, positioned after the greeting.
    pub connection: Connection,
    /// How the greeting was received into the caller's buffer.
    pub greeting: Received,
}

/// Connect to a starting agent and read its greeting into `buf`.
///
/// A failed connect, or a connection the agent closes before greeting, is
/// retried after a doubling delay. Only a greeting received whole counts. Any other failure to read the greeting
/// ends the loop at once.
///
/// # Errors
///
/// Returns the error of the last attempt once `reconnect.max_attempts` is
/// spent. A malformed port, or a greeting read error other than
/// [`CommError::PeerClosed`], is returned at once. A greeting that does not
/// fit `buf` is [`CommError::IncompleteGreeting`] and is not retried, since
/// its bytes are already consumed.
///
/// # Examples
///
/// ```no_run
/// use agentwire::{
///     EngineConfig,
///     reconnect::{ReconnectConfig, connect_agent, parse_agent_pid},
/// };
///
/// # #[tokio::main]
/// # async fn main() -> agentwire::Result<()> {
/// let mut buf = [0u8; 16];
/// let session = connect_agent(
///     "agent.lab",
///     "5000",
///     &ReconnectConfig::default(),
///     &EngineConfig::default(),
///     &mut buf,
/// )
/// .await?;
/// let pid = parse_agent_pid(&buf)?;
/// println!("agent pid {pid}");
/// session.connection.close()
/// # }
/// ```
pub async fn connect_agent(
    host: &str,
    port: &str,
    reconnect: &ReconnectConfig,
    config: &EngineConfig,
    buf: &mut [u8],
) -> Result<AgentSession> {
    let reconnect = reconnect.normalized();
    let mut delay = reconnect.initial_delay;
    let mut attempt = 1;

    loop {
        let err = match try_connect(host, port, config, buf).await {
            Ok(session) => {
                info!("agent at {host}:{port} greeted after {attempt} attempt(s)");
                return Ok(session);
            }
            Err(Attempt::Fatal(err)) => return Err(err),
            Err(Attempt::Retry(err)) => err,
        };
        if attempt >= reconnect.max_attempts {
            return Err(err);
        }
        warn!("connecting to agent {host}:{port} failed ({err}); connect again after {delay:?}");
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(reconnect.max_delay);
        attempt += 1;
    }
}

/// Why a single attempt failed.
enum Attempt {
    Retry(CommError),
    Fatal(CommError),
}

async fn try_connect(
    host: &str,
    port: &str,
    config: &EngineConfig,
    buf: &mut [u8],
) -> Result<AgentSession, Attempt> {
    let mut connection = match Connection::connect_with(host, port, config).await {
        Ok(connection) => connection,
        Err(err @ CommError::InvalidArgument(_)) => return Err(Attempt::Fatal(err)),
        Err(err) => return Err(Attempt::Retry(err)),
    };
    let err = match connection.receive(buf).await {
        Ok(greeting @ Received::Complete { .. }) => {
            return Ok(AgentSession {
                connection,
                greeting,
            });
        }
        Ok(partial) => CommError::IncompleteGreeting(partial),
        Err(err) => err,
    };
    if let Err(close_err) = connection.close() {
        warn!("closing agent connection failed: {close_err}");
    }
    if err.is_peer_closed() {
        Err(Attempt::Retry(err))
    } else {
        Err(Attempt::Fatal(err))
    }
}

/// Extract the process ID from an agent greeting of the form `PID <n>`.
///
/// `greeting` is the received header; it ends at the first NUL byte.
///
/// # Errors
///
/// Returns [`CommError::InvalidArgument`] if the greeting is not a
/// `PID` line followed by a decimal number.
///
/// # Examples
///
/// ```
/// use agentwire::reconnect::parse_agent_pid;
///
/// assert_eq!(parse_agent_pid(b"PID 4242\0").ok(), Some(4242));
/// assert!(parse_agent_pid(b"HELLO\0").is_err());
/// ```
pub fn parse_agent_pid(greeting: &[u8]) -> Result<u32> {
    let end = greeting
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(greeting.len());
    greeting[..end]
        .strip_prefix(b"PID ")
        .and_then(|digits| std::str::from_utf8(digits).ok())
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
        .ok_or(CommError::InvalidArgument("agent greeting is not a PID line"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(&b"PID 1\0"[..], Some(1))]
    #[case(&b"PID 31337"[..], Some(31337))]
    #[case(&b"PID 12\0garbage"[..], Some(12))]
    #[case(&b"PID \0"[..], None)]
    #[case(&b"PID -4\0"[..], None)]
    #[case(&b"PID 12 \0"[..], None)]
    #[case(&b"pid 12\0"[..], None)]
    #[case(&b"\0"[..], None)]
    fn pid_greetings_are_parsed_strictly(#[case] greeting: &[u8], #[case] expected: Option<u32>) {
        assert_eq!(parse_agent_pid(greeting).ok(), expected);
    }

    #[test]
    fn default_backoff_matches_agent_start_timing() {
        let cfg = ReconnectConfig::default();
        assert_eq!(cfg.initial_delay, Duration::from_secs(1));
        assert_eq!(cfg.max_delay, Duration::from_secs(5));
        assert_eq!(cfg.max_attempts, 3);
    }
}
