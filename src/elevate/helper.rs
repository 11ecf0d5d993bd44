//! The elevated side of the helper protocol.
//!
//! A binary hosts this by parsing [`HelperArgs`] from its command line,
//! starting [`watch_control_channel`] on stdin, and calling [`run_helper`]
//! with stdout. The `onecopy` CLI does exactly that in its hidden `helper`
//! subcommand.

use super::protocol::{CANCEL_LINE, HelperLine};
use crate::cancel::CancelToken;
use crate::copy::{TransferPlan, copy_file, remove_partial};
use crate::digest::verify_copy;
use crate::error::{Error, ErrorKind};
use crate::options::{DEFAULT_CHUNK_SIZE, clamp_chunk_size};
use crate::policy;
use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

/// Exit status after an `OK` line.
pub const EXIT_OK: i32 = 0;
/// Exit status after an `ERR` line.
pub const EXIT_FAILED: i32 = 1;
/// Exit status for a malformed invocation.
pub const EXIT_USAGE: i32 = 2;

/// Arguments of one helper invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperArgs {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub overwrite: bool,
    pub preserve_mode: bool,
    /// Compare source and destination digests and report the digest after `OK`
    pub verify: bool,
    pub chunk_size: usize,
}

impl HelperArgs {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            overwrite: false,
            preserve_mode: false,
            verify: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Command-line form, as appended after the helper command.
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args = vec![
            self.source.clone().into_os_string(),
            self.destination.clone().into_os_string(),
        ];
        if self.overwrite {
            args.push("--overwrite".into());
        }
        if self.preserve_mode {
            args.push("--preserve-mode".into());
        }
        if self.verify {
            args.push("--verify".into());
        }
        args.push("--chunk-size".into());
        args.push(self.chunk_size.to_string().into());
        args
    }
}

/// Cancel `cancel` when the parent writes `CANCEL` on our stdin.
///
/// EOF ends the watch without cancelling; a vanished parent is noticed by
/// the next failed write to stdout instead.
pub fn watch_control_channel<R>(reader: R, cancel: CancelToken) -> JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || {
        for line in reader.lines().map_while(|l| l.ok()) {
            if line.trim() == CANCEL_LINE {
                tracing::debug!("cancel requested on control channel");
                cancel.cancel();
                return;
            }
        }
        tracing::debug!("control channel closed");
    })
}

/// Perform one copy and report it on `out` using the helper protocol.
///
/// Returns the process exit status: [`EXIT_OK`] after `OK`,
/// [`EXIT_FAILED`] after `ERR`.
pub fn run_helper<W: Write>(args: &HelperArgs, cancel: &CancelToken, out: &mut W) -> i32 {
    let terminal = match copy_and_report(args, cancel, out) {
        Ok(line) => line,
        Err(error) => HelperLine::Err {
            kind: error.kind(),
            message: error.to_string(),
        },
    };
    let code = match terminal {
        HelperLine::Ok { .. } => EXIT_OK,
        _ => EXIT_FAILED,
    };
    if let Err(e) = emit(out, &terminal) {
        tracing::warn!(error = %e, "could not write terminal line");
    }
    code
}

fn copy_and_report<W: Write>(
    args: &HelperArgs,
    cancel: &CancelToken,
    out: &mut W,
) -> Result<HelperLine, Error> {
    let decision = policy::check(&args.source, &args.destination, args.overwrite)?;
    let plan = TransferPlan {
        size: decision.source_size,
        overwrite: args.overwrite,
        preexisting: decision.destination_exists,
        permissions: args
            .preserve_mode
            .then(|| decision.source_permissions.clone()),
        chunk_size: clamp_chunk_size(args.chunk_size),
        fsync: true,
    };

    let transfer = copy_file(&args.source, &args.destination, &plan, cancel, &mut |p| {
        let line = HelperLine::Progress {
            bytes_copied: p.bytes_copied,
            bytes_total: p.bytes_total,
        };
        // nobody is listening any more
        if emit(out, &line).is_err() {
            cancel.cancel();
        }
    })?;

    if let Some(warning) = transfer.permission_error {
        let line = HelperLine::Warn {
            kind: ErrorKind::PermissionApply,
            message: warning.to_string(),
        };
        if let Err(e) = emit(out, &line) {
            tracing::warn!(error = %e, "could not write warning line");
        }
    }

    // a cancelled verification must not leave the finished copy behind
    let digest = if args.verify {
        let verified = verify_copy(
            &args.source,
            &args.destination,
            decision.source_size,
            plan.chunk_size,
            cancel,
            &mut |p| {
                let line = HelperLine::Verify {
                    bytes_hashed: p.bytes_copied,
                    bytes_total: p.bytes_total,
                };
                if emit(out, &line).is_err() {
                    cancel.cancel();
                }
            },
        );
        if matches!(verified, Err(Error::Cancelled { .. })) {
            tracing::info!(destination = %args.destination.display(), "verification cancelled, cleaning up");
            remove_partial(&args.destination, decision.destination_exists);
        }
        Some(verified?)
    } else {
        None
    };

    Ok(HelperLine::Ok {
        bytes_copied: transfer.bytes_copied,
        digest,
    })
}

fn emit<W: Write>(out: &mut W, line: &HelperLine) -> std::io::Result<()> {
    writeln!(out, "{line}")?;
    out.flush()
}
