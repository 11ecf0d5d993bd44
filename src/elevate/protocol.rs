//! Line protocol spoken by the elevated helper on its stdout.
//!
//! ```text
//! PROGRESS <bytes_copied> <bytes_total>
//! VERIFY <bytes_hashed> <bytes_total>
//! WARN <kind> <free text>
//! OK <bytes_copied> [sha256:<hex>]
//! ERR <kind> <free text>
//! ```
//!
//! `OK` and `ERR` are terminal: exactly one of them ends the stream.
//! `VERIFY` counts both hashing passes (source, then destination) against a
//! total of twice the file size, and only follows the last `PROGRESS`.

use crate::digest::Digest;
use crate::error::ErrorKind;
use std::fmt;
use std::str::FromStr;

/// Control line the parent writes to the helper's stdin to cancel it.
pub const CANCEL_LINE: &str = "CANCEL";

/// One parsed line of helper output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperLine {
    Progress { bytes_copied: u64, bytes_total: u64 },
    Verify { bytes_hashed: u64, bytes_total: u64 },
    Warn { kind: ErrorKind, message: String },
    Ok { bytes_copied: u64, digest: Option<Digest> },
    Err { kind: ErrorKind, message: String },
}

/// Why a line was rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed helper line {line:?}: {reason}")]
pub struct MalformedLine {
    pub line: String,
    pub reason: &'static str,
}

impl FromStr for HelperLine {
    type Err = MalformedLine;

    fn from_str(line: &str) -> Result<Self, MalformedLine> {
        let bad = |reason| MalformedLine {
            line: line.to_owned(),
            reason,
        };
        let (tag, rest) = line.split_once(' ').unwrap_or((line, ""));

        match tag {
            "PROGRESS" | "VERIFY" => {
                let mut fields = rest.split(' ');
                let (Some(done), Some(total), None) = (fields.next(), fields.next(), fields.next())
                else {
                    return Err(bad("progress lines take exactly two fields"));
                };
                let done: u64 = done.parse().map_err(|_| bad("byte count is not a u64"))?;
                let bytes_total: u64 = total.parse().map_err(|_| bad("byte total is not a u64"))?;
                if done > bytes_total {
                    return Err(bad("byte count exceeds total"));
                }
                Ok(if tag == "PROGRESS" {
                    Self::Progress {
                        bytes_copied: done,
                        bytes_total,
                    }
                } else {
                    Self::Verify {
                        bytes_hashed: done,
                        bytes_total,
                    }
                })
            }
            "OK" => {
                let mut fields = rest.split(' ');
                let bytes_copied = fields
                    .next()
                    .and_then(|f| f.parse().ok())
                    .ok_or_else(|| bad("byte count is not a u64"))?;
                let digest = match fields.next() {
                    Some(text) => Some(text.parse().map_err(|_| bad("invalid digest"))?),
                    None => None,
                };
                if fields.next().is_some() {
                    return Err(bad("trailing fields after OK"));
                }
                Ok(Self::Ok {
                    bytes_copied,
                    digest,
                })
            }
            "ERR" | "WARN" => {
                let (token, message) = rest.split_once(' ').unwrap_or((rest, ""));
                let kind = token.parse().map_err(|_| bad("unknown error kind"))?;
                let message = message.to_owned();
                Ok(if tag == "ERR" {
                    Self::Err { kind, message }
                } else {
                    Self::Warn { kind, message }
                })
            }
            _ => Err(bad("unknown line tag")),
        }
    }
}

impl fmt::Display for HelperLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Progress {
                bytes_copied,
                bytes_total,
            } => write!(f, "PROGRESS {bytes_copied} {bytes_total}"),
            Self::Verify {
                bytes_hashed,
                bytes_total,
            } => write!(f, "VERIFY {bytes_hashed} {bytes_total}"),
            Self::Warn { kind, message } => write!(f, "WARN {kind} {}", single_line(message)),
            Self::Ok {
                bytes_copied,
                digest: Some(digest),
            } => write!(f, "OK {bytes_copied} {digest}"),
            Self::Ok {
                bytes_copied,
                digest: None,
            } => write!(f, "OK {bytes_copied}"),
            Self::Err { kind, message } => write!(f, "ERR {kind} {}", single_line(message)),
        }
    }
}

/// Free text must not break the one-line-per-message framing.
fn single_line(message: &str) -> String {
    message.replace(['\n', '\r'], " ")
}
