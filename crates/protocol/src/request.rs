//! Client request grammar.
//!
//! A request is a single whitespace-tokenized text line. `GET` takes the
//! file name first; the `OFFSET <n>` and `COMPRESS` modifiers may follow in
//! any order. Unrecognized trailing tokens are ignored so older clients
//! remain compatible with newer modifiers.

use crate::ParseError;

/// A parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Enumerate the shared catalog.
    List,
    /// Download `name`, starting at `offset`, optionally compressed.
    Get {
        name: String,
        offset: u64,
        compress: bool,
    },
    /// Look up the advertised digest for `name`.
    Checksum { name: String },
}

impl Request {
    /// Parses one request line. Trailing CR/LF is tolerated.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);

        // LIST takes no arguments; anything after it is a different request.
        if line == "LIST" {
            return Ok(Request::List);
        }

        let mut tokens = line.split_whitespace();
        match tokens.next() {
            None => Err(ParseError::Empty),

            Some("GET") => {
                let name = tokens.next().ok_or(ParseError::MissingName)?.to_string();
                let mut offset = 0u64;
                let mut compress = false;

                while let Some(token) = tokens.next() {
                    match token {
                        "OFFSET" => {
                            let value = tokens
                                .next()
                                .ok_or_else(|| ParseError::BadOffset("missing value".into()))?;
                            offset = value
                                .parse()
                                .map_err(|_| ParseError::BadOffset(value.to_string()))?;
                        }
                        "COMPRESS" => compress = true,
                        _ => {}
                    }
                }

                Ok(Request::Get {
                    name,
                    offset,
                    compress,
                })
            }

            Some("CHECKSUM") => {
                let name = tokens.next().ok_or(ParseError::MissingName)?.to_string();
                Ok(Request::Checksum { name })
            }

            Some(other) => Err(ParseError::UnknownCommand(other.to_string())),
        }
    }

    /// Encodes the request as a wire line, trailing newline included.
    ///
    /// `OFFSET` is only emitted when non-zero, so a fresh download and an
    /// explicit offset-0 request produce the same bytes.
    pub fn to_line(&self) -> String {
        match self {
            Request::List => "LIST\n".into(),
            Request::Get {
                name,
                offset,
                compress,
            } => {
                let mut line = format!("GET {name}");
                if *offset > 0 {
                    line.push_str(&format!(" OFFSET {offset}"));
                }
                if *compress {
                    line.push_str(" COMPRESS");
                }
                line.push('\n');
                line
            }
            Request::Checksum { name } => format!("CHECKSUM {name}\n"),
        }
    }
}
