//! Error types for onecopy.
//!
//! This module provides the [`Error`] enum containing every failure a copy
//! run can end in, the [`ErrorKind`] classification used in results and on
//! the helper wire protocol, and the [`Result`] type alias.
//!
//! # Error Categories
//!
//! | Category | Errors |
//! |----------|--------|
//! | Validation | [`Error::NotFound`], [`Error::InvalidTarget`], [`Error::AlreadyExists`] |
//! | IO | [`Error::Io`], [`Error::PermissionApply`] |
//! | Integrity | [`Error::VerificationMismatch`] |
//! | Elevation | [`Error::ElevationDenied`], [`Error::ElevationUnavailable`], [`Error::HelperProtocol`] |
//! | Control | [`Error::Busy`], [`Error::Cancelled`] |

use crate::digest::Digest;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Result type for onecopy operations.
///
/// This is a type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Check if an IO error indicates "no space left on device".
///
/// This helper function detects storage-full conditions across platforms.
///
/// # Platform Support
///
/// | Platform | Error Detection |
/// |----------|-----------------|
/// | Unix | `ENOSPC` (errno 28) |
/// | Windows | `ERROR_DISK_FULL` (0x70) |
pub fn is_no_space_error(error: &io::Error) -> bool {
    if error.kind() == io::ErrorKind::StorageFull {
        return true;
    }

    #[cfg(unix)]
    {
        if let Some(raw_error) = error.raw_os_error() {
            return raw_error == libc::ENOSPC;
        }
    }

    #[cfg(windows)]
    {
        if let Some(raw_error) = error.raw_os_error() {
            const ERROR_DISK_FULL: i32 = 112;
            return raw_error == ERROR_DISK_FULL;
        }
    }

    false
}

/// Coarse classification of an [`Error`].
///
/// This is what a [`CopyResult`](crate::CopyResult) reports in its outcome,
/// and what the elevated helper writes after `ERR`/`WARN` on its stdout.
/// The string tokens are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum ErrorKind {
    NotFound,
    InvalidTarget,
    AlreadyExists,
    Io,
    PermissionApply,
    VerificationMismatch,
    ElevationDenied,
    ElevationUnavailable,
    HelperProtocol,
    Busy,
    Cancelled,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 11] = [
        Self::NotFound,
        Self::InvalidTarget,
        Self::AlreadyExists,
        Self::Io,
        Self::PermissionApply,
        Self::VerificationMismatch,
        Self::ElevationDenied,
        Self::ElevationUnavailable,
        Self::HelperProtocol,
        Self::Busy,
        Self::Cancelled,
    ];

    /// Stable wire token for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidTarget => "invalid_target",
            Self::AlreadyExists => "already_exists",
            Self::Io => "io_error",
            Self::PermissionApply => "permission_apply",
            Self::VerificationMismatch => "verification_mismatch",
            Self::ElevationDenied => "elevation_denied",
            Self::ElevationUnavailable => "elevation_unavailable",
            Self::HelperProtocol => "helper_protocol",
            Self::Busy => "busy",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = UnknownErrorKind;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownErrorKind(s.to_owned()))
    }
}

/// Returned when parsing an unrecognised [`ErrorKind`] token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown error kind: {0:?}")]
pub struct UnknownErrorKind(pub String);

/// Errors that can occur during a copy run.
///
/// All filesystem errors include the path involved. Use
/// [`Error::kind`] for the coarse classification reported in results.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Source does not exist or is not a regular file
    #[error("Source does not exist or is not a regular file: {0}")]
    NotFound(PathBuf),

    /// Destination cannot be written as a file
    #[error("Invalid destination {path}: {reason}")]
    InvalidTarget {
        /// Destination path as requested
        path: PathBuf,
        /// Why the destination was rejected
        reason: &'static str,
    },

    /// Destination already exists and overwrite was not requested
    #[error("Destination already exists: {0}")]
    AlreadyExists(PathBuf),

    /// IO error during open, read, write, or sync
    #[error("IO error while {action} {path}: {source}")]
    Io {
        /// What was being done, e.g. "reading"
        action: &'static str,
        /// Path involved
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Data was copied but the permission bits could not be applied.
    ///
    /// This is the only error that can accompany a successful result.
    #[error("Failed to apply permissions to {path}: {message}")]
    PermissionApply {
        /// Destination path
        path: PathBuf,
        /// Underlying cause
        message: String,
    },

    /// Source and destination digests differ after the copy
    #[error("Verification failed: source {source_digest} != destination {destination_digest}")]
    VerificationMismatch {
        /// Digest of the source file
        source_digest: Digest,
        /// Digest of the destination file
        destination_digest: Digest,
    },

    /// The user refused or failed authentication
    #[error("Elevation denied: {0}")]
    ElevationDenied(String),

    /// The elevation program could not be started
    #[error("Elevation unavailable: {0}")]
    ElevationUnavailable(String),

    /// The elevated helper spoke something other than the line protocol
    #[error("Helper protocol error: {0}")]
    HelperProtocol(String),

    /// Another run is already active on this engine
    #[error("A copy is already running on this engine")]
    Busy,

    /// Operation was cancelled via its cancellation token
    #[error("Operation cancelled ({bytes_copied} bytes copied)")]
    Cancelled {
        /// Bytes written before cancellation was observed
        bytes_copied: u64,
    },

    /// Error reported by the elevated helper with a kind that has no
    /// local detail (the helper only sends a token and a message).
    #[error("{kind}: {message}")]
    Remote {
        /// Kind sent by the helper
        kind: ErrorKind,
        /// Free text sent by the helper
        message: String,
    },
}

impl Error {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_target(path: impl Into<PathBuf>, reason: &'static str) -> Self {
        Self::InvalidTarget {
            path: path.into(),
            reason,
        }
    }

    /// The coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidTarget { .. } => ErrorKind::InvalidTarget,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::Io { .. } => ErrorKind::Io,
            Self::PermissionApply { .. } => ErrorKind::PermissionApply,
            Self::VerificationMismatch { .. } => ErrorKind::VerificationMismatch,
            Self::ElevationDenied(_) => ErrorKind::ElevationDenied,
            Self::ElevationUnavailable(_) => ErrorKind::ElevationUnavailable,
            Self::HelperProtocol(_) => ErrorKind::HelperProtocol,
            Self::Busy => ErrorKind::Busy,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Remote { kind, .. } => *kind,
        }
    }

    /// The underlying IO error, if any.
    pub fn io_source(&self) -> Option<&io::Error> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
