//! Progress reporting support (requires `progress` feature)

use crate::event::CopyProgress;
use indicatif::{ProgressBar, ProgressStyle};

/// Callback for progress updates
pub type ProgressCallback = Box<dyn FnMut(CopyProgress) + Send>;

/// Create a default byte progress bar for a single file copy
#[must_use]
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg:>9} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {binary_bytes_per_sec} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb
}

/// Wrap a progress bar as a [`ProgressCallback`].
///
/// The bar's message shows the current phase; its length follows the
/// event's total, which changes between copying and verification.
#[must_use]
pub fn progress_bar_callback(pb: ProgressBar) -> ProgressCallback {
    Box::new(move |progress: CopyProgress| {
        if pb.length() != Some(progress.bytes_total) {
            pb.set_length(progress.bytes_total);
        }
        pb.set_message(progress.phase.as_str());
        pb.set_position(progress.bytes_copied);
    })
}
