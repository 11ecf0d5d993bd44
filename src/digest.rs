//! Streaming SHA-256 digests for copy verification.
//!
//! Files are hashed in the same chunk size used for copying, and progress is
//! reported with [`Phase::Verifying`] so a caller can drive one progress bar
//! for the whole run.

use crate::cancel::CancelToken;
use crate::copy::read_chunk;
use crate::error::{Error, Result};
use crate::event::{CopyProgress, Phase};
use crate::options::clamp_chunk_size;
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

/// Hash algorithm tag carried by every [`Digest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Sha256,
}

impl DigestAlgorithm {
    /// Prefix used in the textual form, e.g. `sha256`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

/// A 256-bit content digest plus its algorithm tag.
///
/// Equality is byte-wise. The textual form is `sha256:<64 lowercase hex>`,
/// which is also what the elevated helper prints after `OK`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: DigestAlgorithm,
    bytes: [u8; 32],
}

impl Digest {
    /// Wrap raw SHA-256 output.
    pub fn sha256(bytes: [u8; 32]) -> Self {
        Self {
            algorithm: DigestAlgorithm::Sha256,
            bytes,
        }
    }

    /// Digest of an in-memory buffer.
    pub fn of_bytes(data: &[u8]) -> Self {
        Self::sha256(Sha256::digest(data).into())
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Lowercase hex of the digest bytes, without the algorithm prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.as_str(), self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}

/// Error returned when parsing a textual digest fails.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseDigestError {
    #[error("missing or unsupported algorithm prefix")]
    Algorithm,
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl FromStr for Digest {
    type Err = ParseDigestError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let hex_part = s
            .strip_prefix("sha256:")
            .ok_or(ParseDigestError::Algorithm)?;
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(hex_part, &mut bytes)?;
        Ok(Self::sha256(bytes))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Digest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Digest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Hash a file in `chunk_size` blocks.
///
/// Emits a [`Phase::Verifying`] progress event after every chunk. The total
/// is sampled once when the file is opened; if the file grows while it is
/// hashed the extra bytes are still hashed but progress stays clamped.
///
/// # Errors
///
/// - [`Error::Io`] if the file cannot be opened or read
/// - [`Error::Cancelled`] if `cancel` is set between chunks
pub fn digest_file(
    path: &Path,
    chunk_size: usize,
    cancel: &CancelToken,
    on_progress: &mut dyn FnMut(CopyProgress),
) -> Result<Digest> {
    let mut file = File::open(path).map_err(|e| Error::io("opening", path, e))?;
    let total = file
        .metadata()
        .map_err(|e| Error::io("reading metadata of", path, e))?
        .len();

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; clamp_chunk_size(chunk_size)];
    let mut hashed: u64 = 0;
    let mut reported: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            tracing::debug!(path = %path.display(), hashed, "digest cancelled");
            return Err(Error::Cancelled { bytes_copied: 0 });
        }

        let n = read_chunk(&mut file, &mut buffer).map_err(|e| Error::io("reading", path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        hashed += n as u64;

        let shown = hashed.min(total);
        if shown > reported {
            reported = shown;
            on_progress(CopyProgress::new(shown, total, Phase::Verifying));
        }
    }

    let digest = Digest::sha256(hasher.finalize().into());
    tracing::debug!(path = %path.display(), bytes = hashed, %digest, "digest computed");
    Ok(digest)
}

/// Hash `source`, then `destination`, and compare.
///
/// Both passes report as a single [`Phase::Verifying`] run whose total is
/// `2 * size`, so the progress count keeps increasing across the switch.
/// Returns the destination digest when the two agree.
///
/// # Errors
///
/// - [`Error::VerificationMismatch`] if the digests differ
/// - anything [`digest_file`] reports for either file
pub(crate) fn verify_copy(
    source: &Path,
    destination: &Path,
    size: u64,
    chunk_size: usize,
    cancel: &CancelToken,
    on_progress: &mut dyn FnMut(CopyProgress),
) -> Result<Digest> {
    let total = size.saturating_mul(2);
    let mut reported = 0;
    let mut relay = |base: u64, progress: CopyProgress| {
        let at = base.saturating_add(progress.bytes_copied.min(size)).min(total);
        if at > reported {
            reported = at;
            on_progress(CopyProgress::new(at, total, Phase::Verifying));
        }
    };

    let source_digest = digest_file(source, chunk_size, cancel, &mut |p| relay(0, p))?;
    let destination_digest = digest_file(destination, chunk_size, cancel, &mut |p| relay(size, p))?;

    if source_digest != destination_digest {
        return Err(Error::VerificationMismatch {
            source_digest,
            destination_digest,
        });
    }
    Ok(destination_digest)
}
