//! Tracing span and event helpers for agent connection operations.
//!
//! Span levels come from [`TracingConfig`] so per-message operations can be
//! silenced without losing the connection lifecycle.

use std::time::Instant;

use tracing::{Level, Span};

use crate::config::TracingConfig;

/// Create a tracing span at a dynamically selected level.
///
/// Each branch calls the matching `tracing::<level>_span!` macro so span
/// metadata stays static while the level is chosen at runtime.
macro_rules! dynamic_span {
    ($level:expr, $name:expr $(, $($field:tt)*)?) => {
        match $level {
            Level::ERROR => tracing::error_span!($name $(, $($field)*)?),
            Level::WARN  => tracing::warn_span!($name $(, $($field)*)?),
            Level::INFO  => tracing::info_span!($name $(, $($field)*)?),
            Level::DEBUG => tracing::debug_span!($name $(, $($field)*)?),
            Level::TRACE => tracing::trace_span!($name $(, $($field)*)?),
        }
    };
}

#[expect(
    clippy::cognitive_complexity,
    reason = "complexity from dynamic_span! macro expansion"
)]
pub(crate) fn connect_span(config: &TracingConfig, host: &str, port: &str) -> Span {
    dynamic_span!(
        config.connect_level,
        "agentwire.connect",
        agent.host = host,
        agent.port = port,
        peer.addr = tracing::field::Empty
    )
}

#[expect(
    clippy::cognitive_complexity,
    reason = "complexity from dynamic_span! macro expansion"
)]
pub(crate) fn send_span(config: &TracingConfig, message_bytes: usize) -> Span {
    dynamic_span!(
        config.send_level,
        "agentwire.send",
        message.bytes = message_bytes
    )
}

/// Create a span for the `receive` operation.
///
/// `pending` is the attachment backlog when the call starts; `result` is
/// recorded once the call completes.
#[expect(
    clippy::cognitive_complexity,
    reason = "complexity from dynamic_span! macro expansion"
)]
pub(crate) fn receive_span(config: &TracingConfig, capacity: usize, pending: usize) -> Span {
    dynamic_span!(
        config.receive_level,
        "agentwire.receive",
        buffer.capacity = capacity,
        attachment.pending = pending,
        result = tracing::field::Empty
    )
}

#[expect(
    clippy::cognitive_complexity,
    reason = "complexity from dynamic_span! macro expansion"
)]
pub(crate) fn close_span(config: &TracingConfig) -> Span {
    dynamic_span!(config.close_level, "agentwire.close")
}

/// Start a timer when timing is enabled for an operation.
pub(crate) fn start_timer(enabled: bool) -> Option<Instant> { enabled.then(Instant::now) }

/// Emit `elapsed_us` at `DEBUG` level when `start` is `Some`.
pub(crate) fn emit_timing_event(start: Option<Instant>) {
    if let Some(start) = start {
        let elapsed_us = start.elapsed().as_micros();
        tracing::debug!(elapsed_us = elapsed_us, "operation.timing");
    }
}
