//! Source/destination validation.
//!
//! [`check`] is read-only: it only stats paths and probes access rights.
//! Its [`PolicyDecision`] tells the engine how many bytes to expect and
//! whether the copy must go through the elevated helper.

use crate::error::{Error, Result};
use std::fs::{self, Metadata, Permissions};
use std::io;
use std::path::{Path, PathBuf};

/// Outcome of a successful [`check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    /// The current user cannot write the destination
    pub requires_elevation: bool,
    /// Source length sampled at check time; the copy never exceeds it
    pub source_size: u64,
    pub source_permissions: Permissions,
    /// Destination exists and will be truncated (overwrite was requested)
    pub destination_exists: bool,
}

/// Resolve the file the copy will actually write.
///
/// If `destination` is an existing directory, or ends with a path
/// separator, the source's file name is appended to it. Otherwise
/// `destination` is returned unchanged.
pub fn resolve_destination(source: &Path, destination: &Path) -> Result<PathBuf> {
    if !destination.is_dir() && !has_trailing_separator(destination) {
        return Ok(destination.to_path_buf());
    }
    let name = source
        .file_name()
        .ok_or_else(|| Error::invalid_target(destination, "source has no file name"))?;
    Ok(destination.join(name))
}

fn has_trailing_separator(path: &Path) -> bool {
    path.as_os_str()
        .to_string_lossy()
        .ends_with(std::path::is_separator)
}

/// Validate a `(source, destination)` pair.
///
/// # Errors
///
/// - [`Error::NotFound`] if the source is missing or not a regular file
/// - [`Error::InvalidTarget`] if the destination's parent is missing, the
///   destination is a directory, or it is the source itself
/// - [`Error::AlreadyExists`] if the destination exists and `overwrite` is false
/// - [`Error::Io`] if a path cannot be inspected for another reason
pub fn check(source: &Path, destination: &Path, overwrite: bool) -> Result<PolicyDecision> {
    let src_meta = match fs::metadata(source) {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => return Err(Error::NotFound(source.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::NotFound(source.to_path_buf()));
        }
        Err(e) => return Err(Error::io("inspecting", source, e)),
    };

    let parent = parent_dir(destination);
    match fs::metadata(parent) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(Error::invalid_target(destination, "parent is not a directory")),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::invalid_target(
                destination,
                "parent directory does not exist",
            ));
        }
        Err(e) => return Err(Error::io("inspecting", parent, e)),
    }

    let dst_meta = match fs::metadata(destination) {
        Ok(meta) => Some(meta),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(Error::io("inspecting", destination, e)),
    };

    if let Some(ref dst_meta) = dst_meta {
        if dst_meta.is_dir() {
            return Err(Error::invalid_target(destination, "destination is a directory"));
        }
        if is_same_file(&src_meta, dst_meta) {
            return Err(Error::invalid_target(destination, "destination is the source file"));
        }
        if !overwrite {
            return Err(Error::AlreadyExists(destination.to_path_buf()));
        }
    }

    let destination_exists = dst_meta.is_some();
    let requires_elevation = if destination_exists {
        !is_writable(parent) || !is_writable(destination)
    } else {
        !is_writable(parent)
    };

    tracing::debug!(
        source = %source.display(),
        destination = %destination.display(),
        size = src_meta.len(),
        destination_exists,
        requires_elevation,
        "policy check passed"
    );

    Ok(PolicyDecision {
        requires_elevation,
        source_size: src_meta.len(),
        source_permissions: src_meta.permissions(),
        destination_exists,
    })
}

pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

#[cfg(unix)]
fn is_same_file(a: &Metadata, b: &Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn is_same_file(_a: &Metadata, _b: &Metadata) -> bool {
    false
}

/// Whether the current user may write `path`, probed with `access(2)`.
#[cfg(unix)]
pub fn is_writable(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: c_path is a valid NUL-terminated string that outlives the call
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}

/// Whether the current user may write `path`.
#[cfg(not(unix))]
pub fn is_writable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}
