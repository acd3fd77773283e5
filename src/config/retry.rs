//! Retry budgets for connecting and transmitting.

use std::time::Duration;

/// Retry budget for establishing the TCP connection.
///
/// A failed `connect()` is retried on a fresh socket after `delay`, up to
/// `attempts` attempts in total. Name resolution failures are never retried
/// here.
///
/// # Default Values
/// - `attempts`: 10
/// - `delay`: 1 second
///
/// # Invariants
/// - `attempts` is at least 1
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectRetry {
    /// Total number of `connect()` attempts.
    pub attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

impl Default for ConnectRetry {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_secs(1),
        }
    }
}

impl ConnectRetry {
    /// Clamp the budget so that at least one attempt is made.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use agentwire::config::ConnectRetry;
    ///
    /// let retry = ConnectRetry {
    ///     attempts: 0,
    ///     delay: Duration::from_millis(5),
    /// };
    /// assert_eq!(retry.normalized().attempts, 1);
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.attempts = self.attempts.max(1);
        self
    }
}

/// Retry budget for non-blocking writes.
///
/// Each would-block result costs one try and a pause of `delay`. The budget
/// is restored to `max_tries` whenever a write makes progress, so a slow
/// reader is tolerated while a stalled one is not.
///
/// # Default Values
/// - `max_tries`: 1000
/// - `delay`: 10 milliseconds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransmitRetry {
    /// Consecutive would-block results tolerated before giving up.
    pub max_tries: u32,
    /// Pause after each would-block result.
    pub delay: Duration,
}

impl Default for TransmitRetry {
    fn default() -> Self {
        Self {
            max_tries: 1000,
            delay: Duration::from_millis(10),
        }
    }
}

impl TransmitRetry {
    /// Clamp the budget so that at least one would-block retry is allowed.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.max_tries = self.max_tries.max(1);
        self
    }
}
