//! Boundary cases integration tests for the onecopy CLI.
//!
//! These tests verify behavior at edge cases and boundary conditions:
//! - Empty files
//! - Files spanning many chunks, and sizes just around a chunk
//! - Binary content
//! - Special characters in names

use crate::common::{TestFixture, pattern};
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use rstest::rstest;

// sha256 of the empty string
const EMPTY_SHA256: &str =
    "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

// =============================================================================
// Empty File Tests
// =============================================================================

/// Test copying an empty file (0 bytes) with verification.
#[test]
fn test_copy_empty_file() {
    let fx = TestFixture::new();
    let src = fx.write("empty.txt", "");
    let dst = fx.path("copy.txt");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg("--verify")
        .arg(&src)
        .arg(&dst)
        .assert()
        .success()
        .stdout(predicate::str::contains("Copied 0 B"))
        .stdout(predicate::str::contains(EMPTY_SHA256));

    fx.assert_file_content(&dst, b"");
}

// =============================================================================
// Chunk Boundary Tests
// =============================================================================

/// Sizes around the 4 KiB chunk used below.
#[rstest]
#[case(1)]
#[case(4095)]
#[case(4096)]
#[case(4097)]
#[case(3 * 4096)]
fn test_chunk_boundaries(#[case] size: usize) {
    let fx = TestFixture::new();
    let data = pattern(size);
    let src = fx.write("src.bin", &data);
    let dst = fx.path("dst.bin");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.args(["--chunk-size", "4096", "--verify", "--no-sync"])
        .arg(&src)
        .arg(&dst)
        .assert()
        .success();

    fx.assert_file_content(&dst, &data);
}

/// Test a file larger than the default 1 MiB chunk.
#[test]
fn test_copy_file_larger_than_buffer() {
    let fx = TestFixture::new();
    let data = pattern(10 * 1024 * 1024 + 123);
    let src = fx.write("big.bin", &data);
    let dst = fx.path("big-copy.bin");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg("--verify")
        .arg(&src)
        .arg(&dst)
        .assert()
        .success()
        .stdout(predicate::str::contains("10.00 MB"));

    fx.assert_file_content(&dst, &data);
}

// =============================================================================
// Content Tests
// =============================================================================

#[test]
fn test_binary_content_all_bytes() {
    let fx = TestFixture::new();
    let data: Vec<u8> = (0..=255u8).cycle().take(256 * 16).collect();
    let src = fx.write("bytes.bin", &data);
    let dst = fx.path("bytes-copy.bin");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg(&src).arg(&dst).assert().success();

    fx.assert_file_content(&dst, &data);
}

// =============================================================================
// Filename Tests
// =============================================================================

#[rstest]
#[case("with spaces.txt")]
#[case("ünïcödé-文件.txt")]
#[case(".hidden")]
#[case("semi;colon&amp'quote.txt")]
fn test_special_filenames_into_directory(#[case] name: &str) {
    let fx = TestFixture::new();
    let src = fx.write(name, "special");
    let target = fx.mkdir("target");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg(&src).arg(&target).assert().success();

    fx.assert_file_content(&target.join(name), b"special");
}
