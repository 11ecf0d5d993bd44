//! Core copy operations.
//!
//! This module provides the in-process chunked file copy used both by the
//! engine directly and by the elevated helper.

mod file;
mod utils;

pub use file::{Transfer, TransferPlan, copy_file};
pub(crate) use utils::{read_chunk, remove_partial};
