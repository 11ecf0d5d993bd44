//! Chunked single-file copy.
//!
//! Data moves in fixed-size chunks so that progress can be reported and
//! cancellation observed between chunks. The same code runs in-process and
//! inside the elevated helper.

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::event::{CopyProgress, Phase};
use crate::options::{CopyRequest, EngineOptions, clamp_chunk_size};
use crate::policy::PolicyDecision;
use std::fs::{File, OpenOptions, Permissions};
use std::io::{self, Read, Write};
use std::path::Path;

use super::utils::{apply_permissions, read_chunk, remove_partial};

/// Everything the executor needs to know about one transfer.
///
/// Built from a validated request; the executor does not re-check policy.
#[derive(Debug, Clone)]
pub struct TransferPlan {
    /// Bytes to copy, as sampled by the policy check
    pub size: u64,
    pub overwrite: bool,
    /// Destination existed before the run
    pub preexisting: bool,
    /// Permission bits to apply after a successful transfer
    pub permissions: Option<Permissions>,
    pub chunk_size: usize,
    pub fsync: bool,
}

impl TransferPlan {
    pub fn new(request: &CopyRequest, decision: &PolicyDecision, options: &EngineOptions) -> Self {
        Self {
            size: decision.source_size,
            overwrite: request.overwrite,
            preexisting: decision.destination_exists,
            permissions: request
                .preserve_mode
                .then(|| decision.source_permissions.clone()),
            chunk_size: clamp_chunk_size(options.chunk_size),
            fsync: options.fsync,
        }
    }
}

/// Result of a completed transfer.
#[derive(Debug)]
pub struct Transfer {
    pub bytes_copied: u64,
    /// Set when the data copied fine but permissions could not be applied
    pub permission_error: Option<Error>,
}

/// Copy `source` to `destination` in chunks.
///
/// Emits a [`Phase::Copying`] progress event after every chunk. At most
/// `plan.size` bytes are copied even if the source grows meanwhile.
///
/// # Cleanup
///
/// On cancellation the partial destination is removed unless it existed
/// before the run. On an IO error it is removed only if nothing was
/// transferred yet; a larger partial file is left as evidence.
///
/// # Errors
///
/// - [`Error::AlreadyExists`] if the destination appeared after the policy
///   check and `overwrite` is false
/// - [`Error::Io`] on any open, read, write, or sync failure
/// - [`Error::Cancelled`] if `cancel` is set between chunks
pub fn copy_file(
    source: &Path,
    destination: &Path,
    plan: &TransferPlan,
    cancel: &CancelToken,
    on_progress: &mut dyn FnMut(CopyProgress),
) -> Result<Transfer> {
    tracing::info!(
        source = %source.display(),
        destination = %destination.display(),
        size = plan.size,
        chunk_size = plan.chunk_size,
        "starting chunked copy"
    );

    let src_file = File::open(source).map_err(|e| Error::io("opening", source, e))?;
    let dst_file = open_destination(destination, plan.overwrite)?;

    let bytes_copied = match transfer(src_file, &dst_file, source, destination, plan, cancel, on_progress) {
        Ok(n) => n,
        Err((error, copied)) => {
            drop(dst_file);
            match error {
                Error::Cancelled { .. } => {
                    tracing::info!(destination = %destination.display(), copied, "copy cancelled, cleaning up");
                    remove_partial(destination, plan.preexisting);
                }
                _ if copied == 0 => remove_partial(destination, plan.preexisting),
                _ => tracing::warn!(
                    destination = %destination.display(),
                    copied,
                    "copy failed, leaving partial destination"
                ),
            }
            return Err(error);
        }
    };
    drop(dst_file);

    let permission_error = match plan.permissions.clone() {
        Some(perms) => apply_permissions(destination, perms).err(),
        None => None,
    };
    if let Some(ref e) = permission_error {
        tracing::warn!(error = %e, "copied data but could not preserve mode");
    }

    tracing::info!(destination = %destination.display(), bytes = bytes_copied, "copy complete");
    Ok(Transfer {
        bytes_copied,
        permission_error,
    })
}

fn open_destination(destination: &Path, overwrite: bool) -> Result<File> {
    let mut opts = OpenOptions::new();
    opts.write(true);
    if overwrite {
        opts.create(true).truncate(true);
    } else {
        opts.create_new(true);
    }
    opts.open(destination).map_err(|e| {
        if e.kind() == io::ErrorKind::AlreadyExists {
            Error::AlreadyExists(destination.to_path_buf())
        } else {
            Error::io("creating", destination, e)
        }
    })
}

/// The chunk loop. On failure returns the error plus the bytes already
/// written so the caller can decide on cleanup.
fn transfer(
    src_file: File,
    mut dst_file: &File,
    source: &Path,
    destination: &Path,
    plan: &TransferPlan,
    cancel: &CancelToken,
    on_progress: &mut dyn FnMut(CopyProgress),
) -> std::result::Result<u64, (Error, u64)> {
    let mut reader = src_file.take(plan.size);
    let mut buffer = vec![0u8; clamp_chunk_size(plan.chunk_size)];
    let mut copied: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err((Error::Cancelled { bytes_copied: copied }, copied));
        }

        let n = read_chunk(&mut reader, &mut buffer)
            .map_err(|e| (Error::io("reading", source, e), copied))?;
        if n == 0 {
            break;
        }

        dst_file
            .write_all(&buffer[..n])
            .map_err(|e| (Error::io("writing", destination, e), copied))?;

        copied += n as u64;
        tracing::trace!(copied, total = plan.size, "chunk written");
        on_progress(CopyProgress::new(copied, plan.size, Phase::Copying));
    }

    if plan.fsync {
        dst_file
            .sync_all()
            .map_err(|e| (Error::io("syncing", destination, e), copied))?;
    }

    Ok(copied)
}

// =============================================================================
// Tests
// =============================================================================
