//! Wire protocol for peershare file transfers.
//!
//! Defines the request/response text grammar shared by server and client,
//! plus the transfer constants both ends must agree on. Pure
//! parsing/formatting — no I/O lives here.
//!
//! # Wire format
//!
//! ```text
//! Request (one per connection, newline-terminated):
//!   LIST
//!   GET <name> [OFFSET <n>] [COMPRESS]
//!   CHECKSUM <name>
//!
//! Response:
//!   LIST      ->  (<name>:<size>:<sha256>\n)*  |  "No files available\n"
//!   GET       ->  "OK:<remaining>:<RAW|COMPRESSED>\n" <payload>
//!             |   "ERROR: <reason>\n"
//!   CHECKSUM  ->  "CHECKSUM:<sha256>\n"  |  "ERROR: File not found\n"
//!
//! Compressed payload: repeated [4 bytes LE: chunk_len][chunk_len bytes],
//! each chunk one independently deflate-compressed 64 KiB block. The final
//! block may decompress to fewer bytes.
//! ```

pub mod request;
pub mod response;

pub use request::Request;
pub use response::{ChecksumReply, ListingEntry, ResponseHead, TransferMode};

/// Fixed uncompressed block size for file streaming (64 KiB).
///
/// Both ends derive their buffers and framing from this constant; it is
/// never transmitted on the wire.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Upper bound on one framed compressed chunk.
///
/// Deflate can expand incompressible input by a few bytes per block; any
/// frame length beyond this bound is a protocol violation.
pub const MAX_COMPRESSED_CHUNK: usize = CHUNK_SIZE + 1024;

/// Default TCP port for the file server.
pub const DEFAULT_PORT: u16 = 8080;

/// Longest request line the server reads before rejecting the request.
pub const MAX_REQUEST_LINE: usize = 1024;

/// Errors from parsing wire text.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("empty request")]
    Empty,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("missing file name")]
    MissingName,

    #[error("invalid offset: {0}")]
    BadOffset(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}
