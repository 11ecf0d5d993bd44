//! Utility functions for file copy operations.
//!
//! This module contains helpers used by the chunked copy: filling a chunk
//! from a reader, cleaning up partial destinations, and applying
//! permissions after a transfer.

use crate::error::Error;
use std::fs::{self, Permissions};
use std::io::{self, Read};
use std::path::Path;

// =============================================================================
// Chunk reading
// =============================================================================

/// Read until `buf` is full or the reader hits EOF.
///
/// Returns the number of bytes read; `0` means EOF. Interrupted reads are
/// retried, every other error is returned as-is.
pub(crate) fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// =============================================================================
// Cleanup and metadata
// =============================================================================

/// Remove a destination file this run created.
///
/// Never touches a file that existed before the run: truncation already
/// destroyed its content and there is nothing safer to put back.
pub(crate) fn remove_partial(path: &Path, preexisting: bool) {
    if preexisting {
        tracing::debug!(path = %path.display(), "keeping pre-existing destination");
        return;
    }
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove partial destination");
        }
    }
}

/// Apply the source's permission bits to the finished destination.
pub(crate) fn apply_permissions(path: &Path, permissions: Permissions) -> Result<(), Error> {
    fs::set_permissions(path, permissions).map_err(|e| Error::PermissionApply {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
