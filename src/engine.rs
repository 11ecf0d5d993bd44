//! The copy engine: one run at a time, on a worker thread, with an ordered
//! event stream.
//!
//! ```text
//! Idle -> Checking -> Copying | Elevating -> [Verifying] -> Succeeded | Cancelled | Failed -> Idle
//! ```
//!
//! # Example
//!
//! ```no_run
//! use onecopy::{CopyEngine, CopyEvent, CopyRequest, EngineOptions};
//!
//! let engine = CopyEngine::new(EngineOptions::default());
//! let handle = engine.submit(CopyRequest::new("disk.img", "/mnt/usb/").with_verify(true))?;
//!
//! for event in handle.iter() {
//!     match event {
//!         CopyEvent::Progress(p) => println!("{} {}/{}", p.phase.as_str(), p.bytes_copied, p.bytes_total),
//!         CopyEvent::Finished(result) => println!("{}", result.outcome.as_str()),
//!     }
//! }
//! # Ok::<(), onecopy::Error>(())
//! ```

use crate::cancel::CancelToken;
use crate::copy::{TransferPlan, copy_file, remove_partial};
use crate::digest::{Digest, verify_copy};
use crate::elevate::{ElevatedTransfer, Escalator};
use crate::elevate::helper::HelperArgs;
use crate::error::{Error, Result};
use crate::event::{CopyEvent, CopyProgress, CopyResult, Outcome, Phase};
use crate::options::{CopyRequest, EngineOptions, clamp_chunk_size};
use crate::policy;
use std::io;
use std::path::{self, Path};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Where the engine is in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    Idle,
    Checking,
    Copying,
    Elevating,
    Verifying,
    Succeeded,
    Cancelled,
    Failed,
}

impl EngineState {
    fn after(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => Self::Succeeded,
            Outcome::Cancelled => Self::Cancelled,
            Outcome::Failed(_) => Self::Failed,
        }
    }
}

/// Runs single-file copies, one at a time.
///
/// The engine can be reused for any number of sequential runs. Between runs
/// it holds nothing but its options.
#[derive(Debug)]
pub struct CopyEngine {
    options: Arc<EngineOptions>,
    state: Arc<Mutex<EngineState>>,
    next_id: AtomicU64,
}

impl Default for CopyEngine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl CopyEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options: Arc::new(options),
            state: Arc::new(Mutex::new(EngineState::Idle)),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Current state.
    pub fn state(&self) -> EngineState {
        *lock(&self.state)
    }

    /// Start a copy on a worker thread.
    ///
    /// Progress and the final result arrive on the returned handle.
    ///
    /// # Errors
    ///
    /// - [`Error::Busy`] if a run is already active; no result is produced
    ///   for the rejected request
    /// - [`Error::Io`] if the worker thread cannot be started
    pub fn submit(&self, request: CopyRequest) -> Result<CopyHandle> {
        let guard = RunGuard::acquire(&self.state)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancelToken::new();
        let (tx, events) = mpsc::channel();

        let options = Arc::clone(&self.options);
        let token = cancel.clone();
        let source = request.source.clone();
        let worker = thread::Builder::new()
            .name(format!("onecopy-run-{id}"))
            .spawn(move || {
                let result = execute(&options, &request, &token, &guard, &mut |progress| {
                    // a dropped handle only means nobody is watching
                    let _ = tx.send(CopyEvent::Progress(progress));
                });
                guard.finish(result.outcome);
                let _ = tx.send(CopyEvent::Finished(result));
            })
            .map_err(|e| Error::io("starting copy worker for", source, e))?;

        tracing::debug!(id, "copy run submitted");
        Ok(CopyHandle {
            id,
            cancel,
            events,
            worker: Some(worker),
        })
    }

    /// Run a copy on the calling thread.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`] if a run is already active. Every other failure is
    /// reported through the returned [`CopyResult`].
    pub fn run(
        &self,
        request: &CopyRequest,
        cancel: &CancelToken,
        on_progress: &mut dyn FnMut(CopyProgress),
    ) -> Result<CopyResult> {
        let guard = RunGuard::acquire(&self.state)?;
        let result = execute(&self.options, request, cancel, &guard, on_progress);
        guard.finish(result.outcome);
        Ok(result)
    }

    /// Request cancellation of a submitted run.
    pub fn cancel(&self, handle: &CopyHandle) {
        handle.cancel();
    }
}

/// A submitted run.
///
/// Events arrive in order: zero or more [`CopyEvent::Progress`], then
/// exactly one [`CopyEvent::Finished`]. Dropping the handle does not
/// cancel the run.
#[derive(Debug)]
pub struct CopyHandle {
    id: u64,
    cancel: CancelToken,
    events: Receiver<CopyEvent>,
    worker: Option<JoinHandle<()>>,
}

impl CopyHandle {
    /// Identifier unique within the engine that produced this handle.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(&self) {
        tracing::debug!(id = self.id, "cancellation requested");
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Next event; `None` once the run has finished and every event was taken.
    pub fn recv(&self) -> Option<CopyEvent> {
        self.events.recv().ok()
    }

    /// Next event, waiting at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> std::result::Result<CopyEvent, RecvTimeoutError> {
        self.events.recv_timeout(timeout)
    }

    /// Blocking iterator over the remaining events.
    pub fn iter(&self) -> impl Iterator<Item = CopyEvent> + '_ {
        self.events.iter()
    }

    /// Discard progress and block until the result arrives.
    pub fn wait(mut self) -> CopyResult {
        let result = self.events.iter().find_map(|event| match event {
            CopyEvent::Finished(result) => Some(result),
            CopyEvent::Progress(_) => None,
        });
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!(id = self.id, "copy worker panicked");
            }
        }
        result.unwrap_or_else(|| {
            CopyResult::from_error(
                Error::io(
                    "running",
                    "copy worker",
                    io::Error::other("worker exited without a result"),
                ),
                0,
                Duration::ZERO,
            )
        })
    }
}

/// Holds the engine's single active-run slot.
///
/// Dropping the guard returns the engine to [`EngineState::Idle`], also
/// when a worker panics.
struct RunGuard {
    state: Arc<Mutex<EngineState>>,
}

impl RunGuard {
    fn acquire(state: &Arc<Mutex<EngineState>>) -> Result<Self> {
        let mut current = lock(state);
        if *current != EngineState::Idle {
            tracing::debug!(state = ?*current, "rejecting request, engine busy");
            return Err(Error::Busy);
        }
        *current = EngineState::Checking;
        Ok(Self {
            state: Arc::clone(state),
        })
    }

    fn set(&self, next: EngineState) {
        *lock(&self.state) = next;
        tracing::debug!(state = ?next, "engine state");
    }

    fn finish(self, outcome: Outcome) {
        self.set(EngineState::after(outcome));
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        *lock(&self.state) = EngineState::Idle;
    }
}

fn lock(state: &Mutex<EngineState>) -> MutexGuard<'_, EngineState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What a successful transfer (plus optional verification) produced.
struct Completed {
    bytes_copied: u64,
    digest: Option<Digest>,
    warning: Option<Error>,
}

fn execute(
    options: &EngineOptions,
    request: &CopyRequest,
    cancel: &CancelToken,
    guard: &RunGuard,
    on_progress: &mut dyn FnMut(CopyProgress),
) -> CopyResult {
    let started = Instant::now();
    tracing::info!(
        source = %request.source.display(),
        destination = %request.destination.display(),
        overwrite = request.overwrite,
        verify = request.verify,
        "copy run started"
    );

    let mut copied = 0;
    let result = match perform(options, request, cancel, guard, &mut copied, on_progress) {
        Ok(done) => CopyResult {
            outcome: Outcome::Success,
            bytes_copied: done.bytes_copied,
            digest: done.digest,
            elapsed: started.elapsed(),
            error: done.warning,
        },
        Err(error) => {
            let mismatch = match &error {
                Error::VerificationMismatch {
                    destination_digest, ..
                } => Some(*destination_digest),
                _ => None,
            };
            let mut result = CopyResult::from_error(error, copied, started.elapsed());
            result.digest = mismatch;
            result
        }
    };

    match &result.error {
        Some(error) if !result.is_success() => tracing::warn!(
            outcome = result.outcome.as_str(),
            kind = %error.kind(),
            %error,
            "copy run failed"
        ),
        _ => tracing::info!(
            outcome = result.outcome.as_str(),
            bytes = result.bytes_copied,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "copy run finished"
        ),
    }
    result
}

fn perform(
    options: &EngineOptions,
    request: &CopyRequest,
    cancel: &CancelToken,
    guard: &RunGuard,
    copied: &mut u64,
    on_progress: &mut dyn FnMut(CopyProgress),
) -> Result<Completed> {
    let destination = policy::resolve_destination(&request.source, &request.destination)?;
    let decision = policy::check(&request.source, &destination, request.overwrite)?;
    if cancel.is_cancelled() {
        return Err(Error::Cancelled { bytes_copied: 0 });
    }

    let elevated = decision.requires_elevation || options.force_elevation;
    if elevated {
        guard.set(EngineState::Elevating);
        let args = helper_args(options, request, &destination)?;
        let transfer = elevate(options, &args, decision.source_size, cancel, guard, copied, on_progress)?;
        return Ok(Completed {
            bytes_copied: transfer.bytes_copied,
            digest: transfer.digest,
            warning: transfer.permission_error,
        });
    }

    guard.set(EngineState::Copying);
    let plan = TransferPlan::new(request, &decision, options);
    let transfer = copy_file(&request.source, &destination, &plan, cancel, &mut |progress| {
        *copied = progress.bytes_copied;
        on_progress(progress);
    })?;
    let bytes_copied = transfer.bytes_copied;
    let warning = transfer.permission_error;
    *copied = bytes_copied;

    let digest = if request.verify {
        guard.set(EngineState::Verifying);
        let verified = verify_copy(
            &request.source,
            &destination,
            decision.source_size,
            plan.chunk_size,
            cancel,
            on_progress,
        );
        if matches!(verified, Err(Error::Cancelled { .. })) {
            // the copy is complete on disk; a cancelled run must not leave it
            remove_partial(&destination, decision.destination_exists);
        }
        Some(verified?)
    } else {
        None
    };

    Ok(Completed {
        bytes_copied,
        digest,
        warning,
    })
}

/// Helper arguments for a request, with both paths made absolute since the
/// elevator may start the helper in another working directory.
fn helper_args(
    options: &EngineOptions,
    request: &CopyRequest,
    destination: &Path,
) -> Result<HelperArgs> {
    let source =
        path::absolute(&request.source).map_err(|e| Error::io("resolving", &request.source, e))?;
    let destination =
        path::absolute(destination).map_err(|e| Error::io("resolving", destination, e))?;
    Ok(HelperArgs {
        overwrite: request.overwrite,
        preserve_mode: request.preserve_mode,
        verify: request.verify,
        chunk_size: clamp_chunk_size(options.chunk_size),
        ..HelperArgs::new(source, destination)
    })
}

/// Run the copy through the elevated helper.
///
/// The helper verifies on its own side, so once it has exited there is
/// nothing left for a cancel to interrupt.
fn elevate(
    options: &EngineOptions,
    args: &HelperArgs,
    size: u64,
    cancel: &CancelToken,
    guard: &RunGuard,
    copied: &mut u64,
    on_progress: &mut dyn FnMut(CopyProgress),
) -> Result<ElevatedTransfer> {
    let mut verifying = false;
    Escalator::new(&options.elevation).run(args, size, cancel, &mut |progress| {
        match progress.phase {
            Phase::Copying => *copied = progress.bytes_copied,
            Phase::Verifying if !verifying => {
                verifying = true;
                guard.set(EngineState::Verifying);
            }
            _ => {}
        }
        on_progress(progress);
    })
}
