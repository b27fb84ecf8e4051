//! Server response grammar.
//!
//! Every response begins with one text line. For `GET` the header line is
//! followed by the payload bytes; for `LIST` the server writes one line per
//! catalog entry and closes the connection to mark the end.

use std::fmt;

use crate::ParseError;

/// `LIST` reply when the catalog is empty (no trailing newline).
pub const NO_FILES_LINE: &str = "No files available";

/// Refusal reason: the connection ceiling was reached.
pub const ERR_BUSY: &str = "Server busy";
/// Refusal reason: the requested name is not in the catalog.
pub const ERR_NOT_FOUND: &str = "File not found";
/// Refusal reason: the requested offset is at or past end of file.
pub const ERR_INVALID_OFFSET: &str = "Invalid offset";
/// Refusal reason: the catalog entry's backing file could not be opened.
pub const ERR_CANNOT_OPEN: &str = "Cannot open file";
/// Refusal reason: the request line did not parse.
pub const ERR_UNKNOWN_REQUEST: &str = "Unknown request";

/// How `GET` payload bytes are encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// File bytes verbatim.
    Raw,
    /// Length-prefixed, per-chunk deflate frames.
    Compressed,
}

impl TransferMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferMode::Raw => "RAW",
            TransferMode::Compressed => "COMPRESSED",
        }
    }

    fn parse(s: &str) -> Result<Self, ParseError> {
        match s {
            "RAW" => Ok(TransferMode::Raw),
            "COMPRESSED" => Ok(TransferMode::Compressed),
            other => Err(ParseError::MalformedResponse(format!(
                "unknown transfer mode: {other}"
            ))),
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The header line answering a `GET` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseHead {
    /// Payload follows: `remaining` logical (uncompressed) bytes in `mode`.
    Ok { remaining: u64, mode: TransferMode },
    /// Request refused; no payload follows.
    Error { reason: String },
}

impl ResponseHead {
    /// Parses a `GET` header line. Trailing CR/LF is tolerated.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(reason) = line.strip_prefix("ERROR:") {
            return Ok(ResponseHead::Error {
                reason: reason.trim_start().to_string(),
            });
        }

        let rest = line.strip_prefix("OK:").ok_or_else(|| {
            ParseError::MalformedResponse(format!("expected OK or ERROR header, got: {line}"))
        })?;

        let (size, mode) = rest.split_once(':').ok_or_else(|| {
            ParseError::MalformedResponse(format!("missing mode in header: {line}"))
        })?;

        let remaining = size
            .parse()
            .map_err(|_| ParseError::MalformedResponse(format!("bad size in header: {size}")))?;

        Ok(ResponseHead::Ok {
            remaining,
            mode: TransferMode::parse(mode)?,
        })
    }

    /// Encodes the header as a wire line, trailing newline included.
    pub fn to_line(&self) -> String {
        match self {
            ResponseHead::Ok { remaining, mode } => format!("OK:{remaining}:{mode}\n"),
            ResponseHead::Error { reason } => format!("ERROR: {reason}\n"),
        }
    }

    /// Shorthand for a refusal header.
    pub fn error(reason: impl Into<String>) -> Self {
        ResponseHead::Error {
            reason: reason.into(),
        }
    }
}

/// The line answering a `CHECKSUM` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumReply {
    Digest(String),
    Error(String),
}

impl ChecksumReply {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(digest) = line.strip_prefix("CHECKSUM:") {
            return Ok(ChecksumReply::Digest(digest.to_string()));
        }
        if let Some(reason) = line.strip_prefix("ERROR:") {
            return Ok(ChecksumReply::Error(reason.trim_start().to_string()));
        }

        Err(ParseError::MalformedResponse(format!(
            "expected CHECKSUM or ERROR line, got: {line}"
        )))
    }

    pub fn to_line(&self) -> String {
        match self {
            ChecksumReply::Digest(digest) => format!("CHECKSUM:{digest}\n"),
            ChecksumReply::Error(reason) => format!("ERROR: {reason}\n"),
        }
    }
}

/// One `LIST` line: a file the server is sharing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub size: u64,
    pub digest: String,
}

impl ListingEntry {
    /// Parses a `name:size:digest` listing line.
    ///
    /// The name cannot contain `:`; the digest is taken verbatim.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut fields = line.splitn(3, ':');

        let name = fields
            .next()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ParseError::MalformedResponse(format!("bad listing line: {line}")))?;
        let size = fields
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ParseError::MalformedResponse(format!("bad listing size: {line}")))?;
        let digest = fields
            .next()
            .ok_or_else(|| ParseError::MalformedResponse(format!("bad listing line: {line}")))?;

        Ok(ListingEntry {
            name: name.to_string(),
            size,
            digest: digest.to_string(),
        })
    }

    pub fn to_line(&self) -> String {
        format!("{}:{}:{}\n", self.name, self.size, self.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_ok_roundtrip() {
        let head = ResponseHead::Ok {
            remaining: 60000,
            mode: TransferMode::Raw,
        };
        let line = head.to_line();
        assert_eq!(line, "OK:60000:RAW\n");
        assert_eq!(ResponseHead::parse(&line).unwrap(), head);
    }

    #[test]
    fn head_compressed_roundtrip() {
        let head = ResponseHead::Ok {
            remaining: 1,
            mode: TransferMode::Compressed,
        };
        assert_eq!(ResponseHead::parse(&head.to_line()).unwrap(), head);
    }

    #[test]
    fn head_error_roundtrip() {
        let head = ResponseHead::error("Invalid offset");
        let line = head.to_line();
        assert_eq!(line, "ERROR: Invalid offset\n");
        assert_eq!(ResponseHead::parse(&line).unwrap(), head);
    }

    #[test]
    fn head_error_without_space() {
        let head = ResponseHead::parse("ERROR:Server busy\n").unwrap();
        assert_eq!(head, ResponseHead::error(ERR_BUSY));
    }

    #[test]
    fn head_rejects_garbage() {
        assert!(ResponseHead::parse("HELLO\n").is_err());
        assert!(ResponseHead::parse("OK:abc:RAW\n").is_err());
        assert!(ResponseHead::parse("OK:123\n").is_err());
        assert!(ResponseHead::parse("OK:123:TURBO\n").is_err());
    }

    #[test]
    fn checksum_reply_roundtrip() {
        let digest = "a".repeat(64);
        let reply = ChecksumReply::Digest(digest.clone());
        let line = reply.to_line();
        assert_eq!(line, format!("CHECKSUM:{digest}\n"));
        assert_eq!(ChecksumReply::parse(&line).unwrap(), reply);

        let err = ChecksumReply::Error(ERR_NOT_FOUND.into());
        assert_eq!(ChecksumReply::parse(&err.to_line()).unwrap(), err);
    }

    #[test]
    fn listing_entry_roundtrip() {
        let entry = ListingEntry {
            name: "save.dat".into(),
            size: 100_000,
            digest: "deadbeef".into(),
        };
        let line = entry.to_line();
        assert_eq!(line, "save.dat:100000:deadbeef\n");
        assert_eq!(ListingEntry::parse(&line).unwrap(), entry);
    }

    #[test]
    fn listing_entry_rejects_malformed() {
        assert!(ListingEntry::parse("No files available\n").is_err());
        assert!(ListingEntry::parse("name-only\n").is_err());
        assert!(ListingEntry::parse("name:notasize:digest\n").is_err());
        assert!(ListingEntry::parse(":100:digest\n").is_err());
    }

    #[test]
    fn mode_display_matches_wire() {
        assert_eq!(TransferMode::Raw.to_string(), "RAW");
        assert_eq!(TransferMode::Compressed.to_string(), "COMPRESSED");
    }
}
