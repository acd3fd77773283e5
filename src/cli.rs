//! Command line interface for the `agentwire` diagnostic binary.

use std::path::PathBuf;

use clap::Parser;

/// Talk to a test agent once: connect, optionally send a command, print the
/// reply.
#[derive(Debug, Parser)]
#[command(
    name = "agentwire",
    version,
    about = "Send one command to a test agent and print its reply"
)]
pub struct Cli {
    /// Agent host name or IPv4 address.
    #[arg(long)]
    pub host: String,
    /// Agent TCP port.
    #[arg(short, long)]
    pub port: String,
    /// Command header to send before reading the reply.
    #[arg(short, long)]
    pub command: Option<String>,
    /// File whose contents are sent as the command's attachment.
    #[arg(short, long, value_name = "FILE", requires = "command")]
    pub attach: Option<PathBuf>,
    /// Receive buffer size in bytes; the reply header must fit.
    #[arg(short, long, default_value_t = 4096)]
    pub buffer: usize,
    /// Number of connect attempts, one second apart.
    #[arg(long, default_value_t = 10)]
    pub connect_attempts: u32,
    /// Treat the agent as just started: retry until it sends its `PID`
    /// greeting, and print that instead of sending a command.
    #[arg(long, conflicts_with = "command")]
    pub wait_greeting: bool,
}
