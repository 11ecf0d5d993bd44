//! Configuration for copy runs.
//!
//! This module provides [`CopyRequest`], which describes one copy, and
//! [`EngineOptions`], which configures how a [`CopyEngine`](crate::CopyEngine)
//! performs every copy it runs.
//!
//! # Example
//!
//! ```
//! use onecopy::{CopyRequest, EngineOptions};
//!
//! let request = CopyRequest::new("report.pdf", "/srv/share/report.pdf")
//!     .with_overwrite(true)
//!     .with_verify(true);
//!
//! let options = EngineOptions::default()
//!     .with_chunk_size(4 * 1024 * 1024)
//!     .without_fsync();
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Default transfer chunk: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Smallest accepted chunk size.
pub const MIN_CHUNK_SIZE: usize = 4 * 1024;

/// Largest accepted chunk size.
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Bring a chunk size into [`MIN_CHUNK_SIZE`]..=[`MAX_CHUNK_SIZE`].
///
/// Applied wherever a stored chunk size is turned into a buffer.
pub(crate) fn clamp_chunk_size(bytes: usize) -> usize {
    bytes.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE)
}

/// Default program used to run the helper with elevated rights.
pub const DEFAULT_ELEVATOR: &str = "pkexec";

/// One file copy, as submitted by the caller.
///
/// Immutable once submitted: the engine takes it by value on
/// [`submit`](crate::CopyEngine::submit) and borrows it on
/// [`run`](crate::CopyEngine::run).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CopyRequest {
    pub source: PathBuf,
    /// Target file, or an existing directory to copy into
    pub destination: PathBuf,
    /// Replace an existing destination file (default: false)
    pub overwrite: bool,
    /// Apply the source permission bits after the copy (default: false)
    pub preserve_mode: bool,
    /// Compare SHA-256 digests of source and destination (default: false)
    pub verify: bool,
}

impl CopyRequest {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(source: P, destination: Q) -> Self {
        Self {
            source: source.as_ref().to_path_buf(),
            destination: destination.as_ref().to_path_buf(),
            overwrite: false,
            preserve_mode: false,
            verify: false,
        }
    }

    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    #[must_use]
    pub fn with_preserve_mode(mut self, preserve_mode: bool) -> Self {
        self.preserve_mode = preserve_mode;
        self
    }

    #[must_use]
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }
}

/// How the elevated helper is launched.
///
/// The spawned command line is
/// `program [program_args...] helper_command... SOURCE DEST [flags]`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElevationOptions {
    /// Privilege-elevation program (default: `pkexec`)
    pub program: PathBuf,

    /// Arguments placed before the helper command
    pub program_args: Vec<OsString>,

    /// Command that runs the helper, e.g. `["/usr/bin/onecopy", "helper"]`.
    ///
    /// When `None`, the current executable followed by `helper` is used,
    /// which is right for the `onecopy` binary itself.
    pub helper_command: Option<Vec<OsString>>,
}

impl Default for ElevationOptions {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_ELEVATOR),
            program_args: Vec::new(),
            helper_command: None,
        }
    }
}

/// Options shared by every run of an engine.
///
/// # Default Values
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `chunk_size` | 1 MiB | Transfer and hashing block size |
/// | `fsync` | `true` | Sync destination before reporting success |
/// | `force_elevation` | `false` | Always copy through the elevated helper |
/// | `elevation` | `pkexec` | How the helper is launched |
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineOptions {
    /// Transfer block size in bytes. Values outside
    /// [`MIN_CHUNK_SIZE`]..=[`MAX_CHUNK_SIZE`] are clamped when used.
    pub chunk_size: usize,

    /// Whether to sync the destination to disk after writing (default: true)
    pub fsync: bool,

    /// Route every copy through the elevated helper, even when the
    /// destination is writable (default: false)
    pub force_elevation: bool,

    pub elevation: ElevationOptions,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            fsync: true,
            force_elevation: false,
            elevation: ElevationOptions::default(),
        }
    }
}

impl EngineOptions {
    /// Set the transfer chunk size.
    ///
    /// Value is clamped to [`MIN_CHUNK_SIZE`]..=[`MAX_CHUNK_SIZE`].
    #[must_use]
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = clamp_chunk_size(bytes);
        self
    }

    /// Disable fsync for faster (but less durable) copies
    #[must_use]
    pub fn without_fsync(mut self) -> Self {
        self.fsync = false;
        self
    }

    /// Always use the elevated helper
    #[must_use]
    pub fn with_force_elevation(mut self) -> Self {
        self.force_elevation = true;
        self
    }

    /// Set the privilege-elevation program
    #[must_use]
    pub fn with_elevator<P: AsRef<Path>>(mut self, program: P) -> Self {
        self.elevation.program = program.as_ref().to_path_buf();
        self
    }

    /// Set arguments passed to the elevation program before the helper
    #[must_use]
    pub fn with_elevator_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.elevation.program_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the command that starts the helper
    #[must_use]
    pub fn with_helper_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.elevation.helper_command = Some(command.into_iter().map(Into::into).collect());
        self
    }
}
