//! Privilege escalation through an out-of-process helper.
//!
//! When the destination is not writable by the current user, the copy is
//! re-executed as a separate helper process under an elevation program
//! (`pkexec` by default). The helper performs the same chunked copy and
//! reports over a line protocol (see [`protocol`]) which is translated back
//! into progress events and a result here.
//!
//! The parent never touches the destination file itself; it only owns the
//! helper's pipes and exit status.

pub mod helper;
pub mod protocol;

use crate::cancel::CancelToken;
use crate::digest::Digest;
use crate::error::{Error, ErrorKind, Result};
use crate::event::{CopyProgress, Phase};
use crate::options::ElevationOptions;
use helper::HelperArgs;
use protocol::{CANCEL_LINE, HelperLine};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// How often the output channel is polled for cancellation while the helper
/// is silent (e.g. during the authentication prompt).
const CANCELLATION_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Number of helper stderr lines kept for error messages.
const STDERR_TAIL: usize = 5;

/// pkexec: authorization could not be obtained because the dialog was dismissed.
const EXIT_AUTH_DISMISSED: i32 = 126;
/// pkexec: not authorized, or authentication failed.
const EXIT_NOT_AUTHORIZED: i32 = 127;

/// What an elevated run produced.
#[derive(Debug)]
pub struct ElevatedTransfer {
    pub bytes_copied: u64,
    /// Digest the helper computed after comparing source and destination,
    /// when verification was asked
    pub digest: Option<Digest>,
    /// Non-fatal permission warning forwarded from the helper
    pub permission_error: Option<Error>,
}

/// Launches the helper and relays its protocol.
#[derive(Debug, Clone)]
pub struct Escalator<'a> {
    options: &'a ElevationOptions,
}

impl<'a> Escalator<'a> {
    pub fn new(options: &'a ElevationOptions) -> Self {
        Self { options }
    }

    /// The full command line for one helper invocation.
    ///
    /// # Errors
    ///
    /// [`Error::ElevationUnavailable`] if no helper command is configured and
    /// the current executable cannot be located.
    pub fn command(&self, args: &HelperArgs) -> Result<Command> {
        let helper: Vec<OsString> = match &self.options.helper_command {
            Some(command) => command.clone(),
            None => {
                let exe = std::env::current_exe().map_err(|e| {
                    Error::ElevationUnavailable(format!("cannot locate helper executable: {e}"))
                })?;
                vec![exe.into_os_string(), "helper".into()]
            }
        };

        let mut command = Command::new(&self.options.program);
        command
            .args(&self.options.program_args)
            .args(helper)
            .args(args.to_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        Ok(command)
    }

    /// Run one copy through the elevated helper.
    ///
    /// `expected_size` is the source size sampled by the policy check;
    /// progress is reported against it and the helper may never claim more.
    /// With `args.verify` the helper hashes both files itself and its
    /// `VERIFY` lines become [`Phase::Verifying`] events, so nothing is left
    /// for the caller to do once the helper has exited.
    ///
    /// # Errors
    ///
    /// - [`Error::ElevationUnavailable`] if the elevation program cannot be started
    /// - [`Error::ElevationDenied`] if authentication was refused
    /// - [`Error::HelperProtocol`] if the helper's output breaks the protocol
    /// - [`Error::Cancelled`] if `cancel` was set
    /// - whatever the helper reported on its `ERR` line
    pub fn run(
        &self,
        args: &HelperArgs,
        expected_size: u64,
        cancel: &CancelToken,
        on_progress: &mut dyn FnMut(CopyProgress),
    ) -> Result<ElevatedTransfer> {
        on_progress(CopyProgress::new(0, expected_size, Phase::Elevating));

        let mut command = self.command(args)?;
        tracing::info!(
            program = %self.options.program.display(),
            source = %args.source.display(),
            destination = %args.destination.display(),
            "starting elevated helper"
        );
        let mut session = ElevationSession::spawn(&mut command, &self.options.program)?;

        let mut copied: u64 = 0;
        let mut hashed: u64 = 0;
        let mut verifying = false;
        let verify_total = expected_size.saturating_mul(2);
        let mut terminal: Option<HelperLine> = None;
        let mut permission_error = None;
        let mut exited = false;

        let protocol_error = loop {
            if cancel.is_cancelled() {
                session.request_termination();
            }

            let text = match session.lines.recv_timeout(CANCELLATION_POLL_INTERVAL) {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => break Some(format!("unreadable helper output: {e}")),
                Err(RecvTimeoutError::Timeout) => {
                    // give trailing output one poll interval after exit
                    if exited {
                        break None;
                    }
                    exited = session.has_exited();
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break None,
            };

            tracing::trace!(line = %text, "helper output");
            let line = match text.parse::<HelperLine>() {
                Ok(line) => line,
                Err(e) => break Some(e.to_string()),
            };
            if terminal.is_some() {
                break Some(format!("output after terminal line: {text:?}"));
            }

            match line {
                HelperLine::Progress { bytes_copied, bytes_total } => {
                    if verifying {
                        break Some("copy progress after verification started".into());
                    }
                    if bytes_copied > expected_size {
                        break Some(format!(
                            "helper reported {bytes_copied} bytes of a {expected_size}-byte source"
                        ));
                    }
                    if bytes_copied < copied {
                        break Some(format!("progress went backwards: {copied} -> {bytes_copied}"));
                    }
                    if bytes_total != expected_size {
                        tracing::debug!(bytes_total, expected_size, "helper sampled a different size");
                    }
                    if bytes_copied > copied {
                        copied = bytes_copied;
                        on_progress(CopyProgress::new(copied, expected_size, Phase::Copying));
                    }
                }
                HelperLine::Verify { bytes_hashed, bytes_total } => {
                    if !args.verify {
                        break Some("helper verified a copy that was not asked to".into());
                    }
                    if bytes_hashed > verify_total {
                        break Some(format!(
                            "helper hashed {bytes_hashed} bytes of at most {verify_total}"
                        ));
                    }
                    if bytes_hashed < hashed {
                        break Some(format!(
                            "verification went backwards: {hashed} -> {bytes_hashed}"
                        ));
                    }
                    if bytes_total != verify_total {
                        tracing::debug!(bytes_total, verify_total, "helper sampled a different size");
                    }
                    verifying = true;
                    if bytes_hashed > hashed {
                        hashed = bytes_hashed;
                        on_progress(CopyProgress::new(hashed, verify_total, Phase::Verifying));
                    }
                }
                HelperLine::Warn { kind, message } => {
                    if kind == ErrorKind::PermissionApply {
                        permission_error = Some(Error::PermissionApply {
                            path: args.destination.clone(),
                            message,
                        });
                    } else {
                        tracing::warn!(%kind, %message, "helper warning");
                    }
                }
                line @ (HelperLine::Ok { .. } | HelperLine::Err { .. }) => terminal = Some(line),
            }
        };

        if let Some(reason) = protocol_error {
            tracing::warn!(%reason, "helper protocol violation, terminating helper");
            session.request_termination();
            let _ = session.wait();
            return Err(Error::HelperProtocol(reason));
        }

        let status = session.wait()?;
        tracing::debug!(%status, "elevated helper exited");

        match terminal {
            Some(HelperLine::Ok { bytes_copied, digest }) => {
                if !status.success() {
                    return Err(Error::HelperProtocol(format!(
                        "helper printed OK but exited with {status}"
                    )));
                }
                if bytes_copied > expected_size {
                    return Err(Error::HelperProtocol(format!(
                        "helper reported {bytes_copied} bytes of a {expected_size}-byte source"
                    )));
                }
                if args.verify && digest.is_none() {
                    return Err(Error::HelperProtocol("helper did not report a digest".into()));
                }
                Ok(ElevatedTransfer {
                    bytes_copied,
                    digest,
                    permission_error,
                })
            }
            Some(HelperLine::Err { kind, message }) => {
                if status.success() {
                    return Err(Error::HelperProtocol(format!(
                        "helper printed ERR but exited successfully: {message}"
                    )));
                }
                Err(remote_error(kind, message, args, copied))
            }
            Some(_) => Err(Error::HelperProtocol("unexpected terminal line".into())),
            None if cancel.is_cancelled() => Err(Error::Cancelled { bytes_copied: copied }),
            None => match status.code() {
                Some(EXIT_AUTH_DISMISSED) | Some(EXIT_NOT_AUTHORIZED) => {
                    let detail = session.stderr_tail();
                    Err(Error::ElevationDenied(if detail.is_empty() {
                        format!("authentication failed or was dismissed ({status})")
                    } else {
                        detail
                    }))
                }
                _ => Err(Error::HelperProtocol(format!(
                    "helper exited with {status} without a result"
                ))),
            },
        }
    }
}

/// Map a helper `ERR` line back to a local error, restoring paths where the
/// kind has them.
fn remote_error(kind: ErrorKind, message: String, args: &HelperArgs, copied: u64) -> Error {
    match kind {
        ErrorKind::NotFound => Error::NotFound(args.source.clone()),
        ErrorKind::AlreadyExists => Error::AlreadyExists(args.destination.clone()),
        ErrorKind::InvalidTarget => {
            Error::invalid_target(args.destination.clone(), "rejected by elevated helper")
        }
        ErrorKind::Cancelled => Error::Cancelled { bytes_copied: copied },
        ErrorKind::VerificationMismatch => {
            let mut digests = message
                .split_whitespace()
                .filter_map(|word| word.parse::<Digest>().ok());
            match (digests.next(), digests.next()) {
                (Some(source_digest), Some(destination_digest)) => Error::VerificationMismatch {
                    source_digest,
                    destination_digest,
                },
                _ => Error::Remote { kind, message },
            }
        }
        ErrorKind::ElevationDenied => Error::ElevationDenied(message),
        ErrorKind::ElevationUnavailable => Error::ElevationUnavailable(message),
        ErrorKind::HelperProtocol => Error::HelperProtocol(message),
        kind => Error::Remote { kind, message },
    }
}

/// A running helper: child process, control pipe, and output readers.
///
/// Dropping the session closes the control pipe and reaps the child.
struct ElevationSession {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<io::Result<String>>,
    stderr: Arc<Mutex<VecDeque<String>>>,
    reaped: bool,
}

impl ElevationSession {
    fn spawn(command: &mut Command, program: &std::path::Path) -> Result<Self> {
        let mut child = command.spawn().map_err(|e| {
            Error::ElevationUnavailable(format!("cannot run {}: {e}", program.display()))
        })?;

        let (tx, lines) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            thread::spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    let failed = line.is_err();
                    if tx.send(line).is_err() || failed {
                        break;
                    }
                }
            });
        }

        let stderr = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL)));
        if let Some(pipe) = child.stderr.take() {
            let tail = Arc::clone(&stderr);
            thread::spawn(move || {
                for line in BufReader::new(pipe).lines().map_while(|l| l.ok()) {
                    tracing::debug!(target: "onecopy::helper", "{line}");
                    let mut tail = tail.lock().unwrap_or_else(PoisonError::into_inner);
                    if tail.len() == STDERR_TAIL {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            });
        }

        Ok(Self {
            stdin: child.stdin.take(),
            child,
            lines,
            stderr,
            reaped: false,
        })
    }

    /// Ask the helper to stop: `CANCEL` on its control pipe, then EOF, and
    /// `SIGTERM` where the OS lets us signal it. Idempotent.
    fn request_termination(&mut self) {
        let Some(mut stdin) = self.stdin.take() else {
            return;
        };
        tracing::info!(pid = self.child.id(), "requesting helper termination");
        let _ = writeln!(stdin, "{CANCEL_LINE}");
        drop(stdin);

        #[cfg(unix)]
        if let Ok(pid) = libc::pid_t::try_from(self.child.id()) {
            // SAFETY: plain kill(2); EPERM is expected for a root helper
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }

    fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    fn wait(&mut self) -> Result<ExitStatus> {
        self.stdin.take();
        let status = self
            .child
            .wait()
            .map_err(|e| Error::io("waiting for", "elevated helper", e))?;
        self.reaped = true;
        Ok(status)
    }

    fn stderr_tail(&self) -> String {
        let tail = self.stderr.lock().unwrap_or_else(PoisonError::into_inner);
        tail.iter().cloned().collect::<Vec<_>>().join("; ")
    }
}

impl Drop for ElevationSession {
    fn drop(&mut self) {
        if !self.reaped {
            self.request_termination();
            let _ = self.child.wait();
        }
    }
}
