//! onecopy - copy one file
//!
//! Copies a single file with progress, optional SHA-256 verification, and
//! privilege elevation through pkexec when the destination is not writable.

use clap::{Parser, Subcommand, ValueEnum};
use onecopy::elevate::helper::{EXIT_USAGE, HelperArgs, run_helper, watch_control_channel};
use onecopy::{
    CancelToken, CopyEngine, CopyEvent, CopyRequest, CopyResult, DEFAULT_CHUNK_SIZE,
    DEFAULT_ELEVATOR, EngineOptions, Error as CopyError, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE, Outcome,
    create_progress_bar, is_no_space_error, policy, progress_bar_callback,
};
use serde_json::{Value, json};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// onecopy - copy one file, elevating privileges when needed
///
/// DEST may be a file path or an existing directory to copy into.
///
/// Usage:
///   onecopy SOURCE DEST
///   onecopy --verify SOURCE /mnt/usb/
#[derive(Parser, Debug)]
#[command(
    name = "onecopy",
    version,
    about,
    long_about = None,
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    copy: CopyArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Elevated helper entry point (started by the elevation program)
    #[command(hide = true)]
    Helper(HelperCommand),
}

#[derive(clap::Args, Debug)]
struct CopyArgs {
    /// Source file
    #[arg(required = true)]
    source: Option<PathBuf>,

    /// Destination file or directory
    #[arg(required = true)]
    destination: Option<PathBuf>,

    /// Replace an existing destination file
    #[arg(short = 'f', long)]
    overwrite: bool,

    /// Apply the source's permission bits to the copy
    #[arg(short = 'p', long)]
    preserve_mode: bool,

    /// Compare SHA-256 digests of source and destination after copying
    #[arg(long)]
    verify: bool,

    /// Always copy through the elevated helper
    #[arg(long)]
    elevate: bool,

    /// Program used to run the helper with elevated rights
    #[arg(long, env = "ONECOPY_ELEVATOR", default_value = DEFAULT_ELEVATOR, value_name = "PROGRAM")]
    elevator: PathBuf,

    /// Transfer block size in bytes
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, value_parser = parse_chunk_size, value_name = "BYTES")]
    chunk_size: usize,

    /// Do not call fsync after copying (faster but less safe)
    #[arg(long)]
    no_sync: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "human")]
    output: OutputMode,

    /// Disable progress bar and summary
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Verbose output (debug logging unless ONECOPY_LOG is set)
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[derive(clap::Args, Debug)]
struct HelperCommand {
    source: PathBuf,
    destination: PathBuf,
    #[arg(long)]
    overwrite: bool,
    #[arg(long)]
    preserve_mode: bool,
    #[arg(long)]
    verify: bool,
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

fn parse_chunk_size(value: &str) -> Result<usize, String> {
    let bytes: usize = value
        .parse()
        .map_err(|_| format!("`{value}` is not a byte count"))?;
    if (MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&bytes) {
        Ok(bytes)
    } else {
        Err(format!(
            "chunk size must be between {MIN_CHUNK_SIZE} and {MAX_CHUNK_SIZE} bytes"
        ))
    }
}

type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
enum CliError {
    #[error("{source}")]
    Copy { source: CopyError },

    #[error("Cancelled after copying {}", format_bytes(*bytes_copied))]
    Cancelled { bytes_copied: u64 },

    #[error("Missing source or destination operand")]
    MissingOperand,

    #[error("Copy worker exited without a result")]
    NoResult,

    #[error("Failed to serialize JSON output: {source}")]
    JsonSerialize { source: serde_json::Error },
}

impl CliError {
    fn code(&self) -> &'static str {
        match self {
            Self::Copy { source } => source.kind().as_str(),
            Self::Cancelled { .. } => "cancelled",
            Self::MissingOperand => "invalid_input",
            Self::NoResult | Self::JsonSerialize { .. } => "internal",
        }
    }

    fn exit_code(&self) -> i32 {
        match self {
            Self::Cancelled { .. } => 130,
            Self::MissingOperand => 2,
            _ => 1,
        }
    }
}

fn main() {
    let args = Args::parse();

    let code = match args.command {
        Some(Command::Helper(helper)) => {
            init_tracing(false);
            helper_main(&helper)
        }
        None => {
            init_tracing(args.copy.verbose);
            match run(&args.copy) {
                Ok(()) => 0,
                Err(error) => {
                    eprintln!("error[{}]: {}", error.code(), error);
                    if let CliError::Copy { source } = &error {
                        if source.io_source().is_some_and(is_no_space_error) {
                            eprintln!("hint: the destination filesystem is full");
                        }
                    }
                    error.exit_code()
                }
            }
        }
    };
    std::process::exit(code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("ONECOPY_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// The elevated side: protocol lines on stdout, control lines on stdin.
fn helper_main(command: &HelperCommand) -> i32 {
    if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&command.chunk_size) {
        eprintln!("onecopy helper: invalid chunk size {}", command.chunk_size);
        return EXIT_USAGE;
    }

    let args = HelperArgs {
        overwrite: command.overwrite,
        preserve_mode: command.preserve_mode,
        verify: command.verify,
        chunk_size: command.chunk_size,
        ..HelperArgs::new(&command.source, &command.destination)
    };

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        install_interrupt_handler(move || cancel.cancel());
    }
    watch_control_channel(BufReader::new(io::stdin()), cancel.clone());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_helper(&args, &cancel, &mut out)
}

/// Returns false, after logging why, if the handler could not be installed;
/// the run then continues without Ctrl+C cancellation.
fn install_interrupt_handler<F>(handler: F) -> bool
where
    F: FnMut() + Send + 'static,
{
    match ctrlc::set_handler(handler) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "could not install interrupt handler, Ctrl+C will not cancel");
            false
        }
    }
}

fn run(args: &CopyArgs) -> CliResult<()> {
    let (Some(source), Some(destination)) = (&args.source, &args.destination) else {
        return Err(CliError::MissingOperand);
    };

    let request = CopyRequest::new(source, destination)
        .with_overwrite(args.overwrite)
        .with_preserve_mode(args.preserve_mode)
        .with_verify(args.verify);

    let mut options = EngineOptions::default()
        .with_chunk_size(args.chunk_size)
        .with_elevator(&args.elevator);
    if args.no_sync {
        options = options.without_fsync();
    }
    if args.elevate {
        options = options.with_force_elevation();
    }

    let engine = CopyEngine::new(options);
    let handle = engine
        .submit(request)
        .map_err(|source| CliError::Copy { source })?;

    {
        let cancel = handle.cancel_token();
        install_interrupt_handler(move || {
            if cancel.is_cancelled() {
                eprintln!("\nForce quit.");
                std::process::exit(130);
            }
            cancel.cancel();
            eprintln!("\nCancelling... Press Ctrl+C again to abort immediately.");
        });
    }

    let show_progress = args.output == OutputMode::Human && !args.quiet;
    let pb = show_progress.then(|| {
        let pb = create_progress_bar(0);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });
    let mut on_progress = pb.clone().map(progress_bar_callback);

    let mut result = None;
    for event in handle.iter() {
        match event {
            CopyEvent::Progress(progress) => {
                if let Some(callback) = on_progress.as_mut() {
                    callback(progress);
                }
            }
            CopyEvent::Finished(finished) => result = Some(finished),
        }
    }
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let mut result = result.ok_or(CliError::NoResult)?;

    let resolved = policy::resolve_destination(source, destination)
        .unwrap_or_else(|_| destination.clone());

    match args.output {
        OutputMode::Json => {
            let report = result_json(source, &resolved, &result);
            let text = serde_json::to_string_pretty(&report)
                .map_err(|source| CliError::JsonSerialize { source })?;
            println!("{text}");
        }
        OutputMode::Human => {
            if let Some(warning) = result.warning() {
                eprintln!("warning: {warning}");
            }
            if result.is_success() && !args.quiet {
                print_summary(&resolved, &result);
            }
        }
    }

    match result.outcome {
        Outcome::Success => Ok(()),
        Outcome::Cancelled => Err(CliError::Cancelled {
            bytes_copied: result.bytes_copied,
        }),
        Outcome::Failed(_) => match result.error.take() {
            Some(source) => Err(CliError::Copy { source }),
            None => Err(CliError::NoResult),
        },
    }
}

fn result_json(source: &Path, destination: &Path, result: &CopyResult) -> Value {
    let error = result.error.as_ref();
    json!({
        "schema_version": "1.0",
        "source": display_path(source),
        "destination": display_path(destination),
        "outcome": result.outcome.as_str(),
        "bytes_copied": result.bytes_copied,
        "elapsed_ms": result.elapsed.as_millis() as u64,
        "digest": result.digest.map(|d| d.to_string()),
        "error_code": error.map(|e| e.kind().as_str()),
        "error_message": error.map(ToString::to_string),
    })
}

fn print_summary(destination: &Path, result: &CopyResult) {
    let secs = result.elapsed.as_secs_f64();
    let throughput = if secs > 0.0 {
        format!(", {}/s", format_bytes((result.bytes_copied as f64 / secs) as u64))
    } else {
        String::new()
    };
    println!(
        "Copied {} to {} in {:.2}s{}",
        format_bytes(result.bytes_copied),
        destination.display(),
        secs,
        throughput
    );
    if let Some(digest) = result.digest {
        println!("Verified {digest}");
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
