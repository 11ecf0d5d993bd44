//! Progress events and terminal results delivered to the caller.

use crate::digest::Digest;
use crate::error::{Error, ErrorKind};
use std::time::Duration;

/// Which part of a run a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Phase {
    /// Bytes are being transferred
    Copying,
    /// Source or destination is being hashed
    Verifying,
    /// Waiting for the elevated helper (authentication, start-up)
    Elevating,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Copying => "copying",
            Self::Verifying => "verifying",
            Self::Elevating => "elevating",
        }
    }
}

/// A single progress update.
///
/// Within one phase `bytes_copied` strictly increases and never exceeds
/// `bytes_total`. A new phase (e.g. the start of verification) starts
/// counting from zero again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CopyProgress {
    pub bytes_copied: u64,
    pub bytes_total: u64,
    pub phase: Phase,
}

impl CopyProgress {
    pub fn new(bytes_copied: u64, bytes_total: u64, phase: Phase) -> Self {
        Self {
            bytes_copied,
            bytes_total,
            phase,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Outcome {
    Success,
    Cancelled,
    Failed(ErrorKind),
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Cancelled => "cancelled",
            Self::Failed(_) => "failed",
        }
    }
}

/// Terminal value of a run, produced exactly once per accepted request.
#[derive(Debug)]
pub struct CopyResult {
    pub outcome: Outcome,
    /// Bytes written to the destination
    pub bytes_copied: u64,
    /// Digest of the copied content when verification ran. On a
    /// verification mismatch this is the destination's digest.
    pub digest: Option<Digest>,
    pub elapsed: Duration,
    /// Failure detail for [`Outcome::Failed`], or the non-fatal
    /// [`Error::PermissionApply`] on an otherwise successful run.
    pub error: Option<Error>,
}

impl CopyResult {
    pub(crate) fn from_error(error: Error, bytes_copied: u64, elapsed: Duration) -> Self {
        let outcome = match error {
            Error::Cancelled { .. } => Outcome::Cancelled,
            ref e => Outcome::Failed(e.kind()),
        };
        let error = match outcome {
            Outcome::Cancelled => None,
            _ => Some(error),
        };
        Self {
            outcome,
            bytes_copied,
            digest: None,
            elapsed,
            error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// The non-fatal permission warning on a successful run, if any.
    pub fn warning(&self) -> Option<&Error> {
        match (&self.outcome, &self.error) {
            (Outcome::Success, Some(e)) => Some(e),
            _ => None,
        }
    }
}

/// An item on a [`CopyHandle`](crate::CopyHandle)'s event stream.
#[derive(Debug)]
pub enum CopyEvent {
    Progress(CopyProgress),
    /// Always the last event of a run
    Finished(CopyResult),
}
