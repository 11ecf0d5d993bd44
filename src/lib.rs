//! # onecopy
//!
//! Copy one file, with progress, cancellation, SHA-256 verification, and
//! privilege elevation when the destination is not writable.
//!
//! ## Core Features
//!
//! - **Chunked copy**: Fixed-size blocks (1 MiB by default) so progress is
//!   reported and cancellation observed between chunks
//! - **Ordered events**: Progress and the final result arrive on a channel
//!   from a dedicated worker thread
//! - **Cooperative cancellation**: A shared [`CancelToken`]; cancelled runs
//!   never leave a complete copy behind
//! - **Verification**: Optional SHA-256 comparison of source and destination
//! - **Privilege elevation**: Unwritable destinations are copied by a helper
//!   process started through `pkexec` (or another program)
//! - **Safe defaults**: Existing destinations are never replaced unless
//!   overwrite is requested
//!
//! ## Quick Start with Builder API
//!
//! ```no_run
//! use onecopy::CopyBuilder;
//!
//! let result = CopyBuilder::new("disk.img", "/mnt/usb/")
//!     .verify()
//!     .run()?;
//! println!("Copied {} bytes, {}", result.bytes_copied, result.digest.unwrap());
//! # Ok::<(), onecopy::Error>(())
//! ```
//!
//! ## Engine API
//!
//! For a UI or anything else that must stay responsive, submit the request to
//! a [`CopyEngine`] and consume its events:
//!
//! ```no_run
//! use onecopy::{CopyEngine, CopyEvent, CopyRequest, EngineOptions};
//!
//! let engine = CopyEngine::new(EngineOptions::default());
//! let handle = engine.submit(CopyRequest::new("a.iso", "/opt/images/a.iso"))?;
//!
//! while let Some(event) = handle.recv() {
//!     match event {
//!         CopyEvent::Progress(p) => eprintln!("{}/{}", p.bytes_copied, p.bytes_total),
//!         CopyEvent::Finished(result) => eprintln!("{}", result.outcome.as_str()),
//!     }
//! }
//! # Ok::<(), onecopy::Error>(())
//! ```
//!
//! Only one run is active per engine; a second submit fails with
//! [`Error::Busy`].
//!
//! ## Elevation
//!
//! When the destination (or its directory) is not writable by the current
//! user, the engine runs `pkexec <current exe> helper SRC DST ...` and reads
//! the helper's line protocol from its stdout (see [`elevate::protocol`]).
//! Binaries embedding the engine host the helper with
//! [`elevate::helper::run_helper`], or point
//! [`ElevationOptions::helper_command`] at the `onecopy` binary.
//!
//! ## Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `progress` | Progress bar support with indicatif |
//! | `serde` | Serialize/Deserialize for requests, options, and progress |
//! | `full` | Enable all optional features |

#![cfg_attr(docsrs, feature(doc_cfg))]

mod builder;
mod cancel;
mod copy;
mod digest;
mod engine;
mod error;
mod event;
mod options;

pub mod elevate;
pub mod policy;

#[cfg(feature = "progress")]
mod progress;

pub use builder::CopyBuilder;
pub use cancel::CancelToken;
pub use copy::{Transfer, TransferPlan, copy_file};
pub use digest::{Digest, DigestAlgorithm, ParseDigestError, digest_file};
pub use engine::{CopyEngine, CopyHandle, EngineState};
pub use error::{Error, ErrorKind, Result, UnknownErrorKind, is_no_space_error};
pub use event::{CopyEvent, CopyProgress, CopyResult, Outcome, Phase};
pub use options::{
    CopyRequest, DEFAULT_CHUNK_SIZE, DEFAULT_ELEVATOR, ElevationOptions, EngineOptions,
    MAX_CHUNK_SIZE, MIN_CHUNK_SIZE,
};
pub use policy::PolicyDecision;

#[cfg(feature = "progress")]
#[cfg_attr(docsrs, doc(cfg(feature = "progress")))]
pub use progress::{ProgressCallback, create_progress_bar, progress_bar_callback};
