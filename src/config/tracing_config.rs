//! Tracing configuration for connection operations.
//!
//! [`TracingConfig`] controls the level of the span each connection
//! operation opens and whether per-operation elapsed-time events are
//! recorded.

use tracing::Level;

/// Controls tracing span levels and per-operation timing.
///
/// By default the lifecycle operations (`connect`, `close`) emit spans at
/// `INFO` level and the per-message operations (`send`, `receive`) at
/// `DEBUG` level. Timing is disabled for every operation by default; when
/// enabled, an event recording `elapsed_us` is emitted inside the span once
/// the operation completes.
///
/// # Examples
///
/// ```
/// use tracing::Level;
/// use agentwire::config::TracingConfig;
///
/// let verbose = TracingConfig::default()
///     .with_all_levels(Level::TRACE)
///     .with_all_timing(true);
/// let _ = verbose;
/// ```
#[expect(
    clippy::struct_excessive_bools,
    reason = "four independent on/off timing flags, one per operation"
)]
#[derive(Clone, Debug)]
pub struct TracingConfig {
    pub(crate) connect_level: Level,
    pub(crate) send_level: Level,
    pub(crate) receive_level: Level,
    pub(crate) close_level: Level,
    pub(crate) connect_timing: bool,
    pub(crate) send_timing: bool,
    pub(crate) receive_timing: bool,
    pub(crate) close_timing: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            connect_level: Level::INFO,
            send_level: Level::DEBUG,
            receive_level: Level::DEBUG,
            close_level: Level::INFO,
            connect_timing: false,
            send_timing: false,
            receive_timing: false,
            close_timing: false,
        }
    }
}

impl TracingConfig {
    /// Set the tracing level for the `connect` operation.
    ///
    /// # Examples
    ///
    /// ```
    /// use tracing::Level;
    /// use agentwire::config::TracingConfig;
    ///
    /// let config = TracingConfig::default().with_connect_level(Level::TRACE);
    /// let _ = config;
    /// ```
    #[must_use]
    pub fn with_connect_level(mut self, level: Level) -> Self {
        self.connect_level = level;
        self
    }

    /// Enable or disable timing for the `connect` operation.
    #[must_use]
    pub fn with_connect_timing(mut self, enabled: bool) -> Self {
        self.connect_timing = enabled;
        self
    }

    /// Set the tracing level for the `send` operation.
    #[must_use]
    pub fn with_send_level(mut self, level: Level) -> Self {
        self.send_level = level;
        self
    }

    /// Enable or disable timing for the `send` operation.
    #[must_use]
    pub fn with_send_timing(mut self, enabled: bool) -> Self {
        self.send_timing = enabled;
        self
    }

    /// Set the tracing level for the `receive` operation.
    #[must_use]
    pub fn with_receive_level(mut self, level: Level) -> Self {
        self.receive_level = level;
        self
    }

    /// Enable or disable timing for the `receive` operation.
    #[must_use]
    pub fn with_receive_timing(mut self, enabled: bool) -> Self {
        self.receive_timing = enabled;
        self
    }

    /// Set the tracing level for the `close` operation.
    #[must_use]
    pub fn with_close_level(mut self, level: Level) -> Self {
        self.close_level = level;
        self
    }

    /// Enable or disable timing for the `close` operation.
    #[must_use]
    pub fn with_close_timing(mut self, enabled: bool) -> Self {
        self.close_timing = enabled;
        self
    }

    /// Set every operation to the same tracing level.
    #[must_use]
    pub fn with_all_levels(mut self, level: Level) -> Self {
        self.connect_level = level;
        self.send_level = level;
        self.receive_level = level;
        self.close_level = level;
        self
    }

    /// Enable or disable timing for every operation.
    #[must_use]
    pub fn with_all_timing(mut self, enabled: bool) -> Self {
        self.connect_timing = enabled;
        self.send_timing = enabled;
        self.receive_timing = enabled;
        self.close_timing = enabled;
        self
    }
}
