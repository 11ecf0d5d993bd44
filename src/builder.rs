//! Builder API for one-call copies.
//!
//! The builder pattern provides a fluent interface for configuring and
//! executing a single copy on the calling thread. This is often more
//! convenient than setting up a [`CopyEngine`] when there is only one file
//! to copy and no need for an event stream.
//!
//! # Examples
//!
//! ## Basic Usage
//!
//! ```no_run
//! use onecopy::CopyBuilder;
//!
//! let result = CopyBuilder::new("report.pdf", "/srv/share/").run()?;
//! println!("Copied {} bytes in {:?}", result.bytes_copied, result.elapsed);
//! # Ok::<(), onecopy::Error>(())
//! ```
//!
//! ## Verified Overwrite
//!
//! ```no_run
//! use onecopy::CopyBuilder;
//!
//! let result = CopyBuilder::new("disk.img", "/mnt/usb/disk.img")
//!     .overwrite()
//!     .verify()
//!     .chunk_size(8 * 1024 * 1024)
//!     .run()?;
//!
//! if let Some(digest) = result.digest {
//!     println!("{digest}");
//! }
//! # Ok::<(), onecopy::Error>(())
//! ```

use crate::cancel::CancelToken;
use crate::engine::CopyEngine;
use crate::error::{Error, Result};
use crate::event::{CopyProgress, CopyResult, Outcome};
use crate::options::{CopyRequest, EngineOptions};
use std::ffi::OsString;
use std::path::Path;

/// A builder for configuring and executing a single copy.
///
/// # Example
///
/// ```no_run
/// use onecopy::CopyBuilder;
///
/// let result = CopyBuilder::new("/etc/hosts", "/tmp/hosts.bak")
///     .preserve_mode()
///     .no_fsync()
///     .run()?;
/// # Ok::<(), onecopy::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct CopyBuilder {
    request: CopyRequest,
    options: EngineOptions,
    cancel: CancelToken,
}

impl CopyBuilder {
    /// Create a new `CopyBuilder` with the given source and destination paths.
    ///
    /// Uses default options: no overwrite, no verification, 1 MiB chunks,
    /// fsync enabled, `pkexec` for elevation.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dst: Q) -> Self {
        Self {
            request: CopyRequest::new(src, dst),
            options: EngineOptions::default(),
            cancel: CancelToken::new(),
        }
    }

    /// Replace an existing destination file.
    #[must_use]
    pub fn overwrite(mut self) -> Self {
        self.request.overwrite = true;
        self
    }

    /// Apply the source's permission bits to the copy.
    #[must_use]
    pub fn preserve_mode(mut self) -> Self {
        self.request.preserve_mode = true;
        self
    }

    /// Compare SHA-256 digests of source and destination after copying.
    #[must_use]
    pub fn verify(mut self) -> Self {
        self.request.verify = true;
        self
    }

    /// Transfer block size; clamped like [`EngineOptions::with_chunk_size`].
    #[must_use]
    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.options = self.options.with_chunk_size(bytes);
        self
    }

    #[must_use]
    pub fn no_fsync(mut self) -> Self {
        self.options = self.options.without_fsync();
        self
    }

    /// Use `program` instead of `pkexec` when elevation is needed.
    #[must_use]
    pub fn elevator<P: AsRef<Path>>(mut self, program: P) -> Self {
        self.options = self.options.with_elevator(program);
        self
    }

    /// Arguments passed to the elevation program before the helper command.
    #[must_use]
    pub fn elevator_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.options = self.options.with_elevator_args(args);
        self
    }

    /// Copy through the elevated helper even if the destination is writable.
    #[must_use]
    pub fn force_elevation(mut self) -> Self {
        self.options = self.options.with_force_elevation();
        self
    }

    /// Use an external token to cancel the copy from another thread.
    #[must_use]
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn request(&self) -> &CopyRequest {
        &self.request
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Execute the copy.
    ///
    /// A successful result may still carry a
    /// [`warning`](CopyResult::warning) if permissions could not be applied.
    ///
    /// # Errors
    ///
    /// The run's error for a failed copy, or [`Error::Cancelled`] if the
    /// cancel token was set.
    pub fn run(self) -> Result<CopyResult> {
        self.run_with_progress(|_| {})
    }

    /// Execute the copy, calling `on_progress` on this thread for every
    /// progress event.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub fn run_with_progress<F>(self, mut on_progress: F) -> Result<CopyResult>
    where
        F: FnMut(CopyProgress),
    {
        let engine = CopyEngine::new(self.options);
        let mut result = engine.run(&self.request, &self.cancel, &mut on_progress)?;
        match result.outcome {
            Outcome::Success => Ok(result),
            Outcome::Cancelled => Err(Error::Cancelled {
                bytes_copied: result.bytes_copied,
            }),
            Outcome::Failed(kind) => Err(result.error.take().unwrap_or_else(|| Error::Remote {
                kind,
                message: "copy failed".into(),
            })),
        }
    }
}
