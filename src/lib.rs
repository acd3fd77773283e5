//! Engine-side TCP transport for driving remote test agents.
//!
//! The engine opens one [`Connection`] per agent, sends NUL-terminated
//! command headers, and receives replies whose headers may announce a raw
//! attachment with a trailing `attach <count>` marker. Attachments larger
//! than the caller's buffer are delivered across several
//! [`Connection::receive`] calls.

pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod reconnect;
pub mod resolve;

pub use config::EngineConfig;
pub use connection::{Connection, Received, Transport};
pub use error::{CommError, ResolveError, Result};
pub use frame::{AttachmentMarker, encode_message, find_marker};
