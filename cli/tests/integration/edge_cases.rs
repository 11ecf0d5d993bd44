//! Edge case integration tests for the onecopy CLI.
//!
//! These tests cover boundary conditions and less common inputs:
//! - Empty, multi-chunk, and binary files
//! - Destination type conflicts and overwrite semantics
//! - Symlinked sources and destinations
//! - Permission preservation

#[path = "../common/mod.rs"]
mod common;

#[path = "edge_cases/boundary_cases.rs"]
mod boundary_cases;

#[path = "edge_cases/file_type_conflict.rs"]
mod file_type_conflict;

#[path = "edge_cases/symlink_handling.rs"]
mod symlink_handling;

#[path = "edge_cases/permission_preservation.rs"]
mod permission_preservation;
