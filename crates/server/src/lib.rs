//! The peershare TCP file server.
//!
//! Accepts connections, enforces a connection ceiling, and answers one
//! request per connection: `LIST`, `GET` (with offset/compression), or
//! `CHECKSUM`. The shared catalog is locked only long enough to copy
//! entries out, so transfers never serialize behind each other.

mod config;
mod handler;
mod server;

pub use config::ServerConfig;
pub use server::FileServer;

use std::time::Duration;

/// Deadline for a fresh connection to deliver its request line.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}
