//! Error handling integration tests for the onecopy CLI.
//!
//! These tests verify proper error handling behaviors:
//! - Existing destinations are never replaced without -f
//! - Source and destination validation
//! - Error tokens and exit codes

#[path = "../common/mod.rs"]
mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use common::TestFixture;
use predicates::prelude::*;
use serde_json::Value;

/// Test that an existing destination is left untouched without --overwrite.
#[test]
fn test_existing_destination_is_kept() {
    let fx = TestFixture::new();
    let src = fx.write("src.txt", "new content");
    let dst = fx.write("dst.txt", "old content");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg(&src)
        .arg(&dst)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[already_exists]"));

    fx.assert_file_content(&dst, b"old content");
}

#[test]
fn test_missing_source() {
    let fx = TestFixture::new();

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg(fx.path("nope.txt"))
        .arg(fx.path("dst.txt"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[not_found]"));

    assert!(!fx.path("dst.txt").exists());
}

#[test]
fn test_directory_source_is_rejected() {
    let fx = TestFixture::new();
    let dir = fx.mkdir("a_directory");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg(&dir)
        .arg(fx.path("dst"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[not_found]"));
}

#[test]
fn test_missing_destination_parent() {
    let fx = TestFixture::new();
    let src = fx.write("src.txt", "content");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg(&src)
        .arg(fx.path("no/such/dir/dst.txt"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[invalid_target]"));
}

#[test]
fn test_copy_onto_itself_is_rejected() {
    let fx = TestFixture::new();
    let src = fx.write("same.txt", "keep me");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg("--overwrite")
        .arg(&src)
        .arg(&src)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[invalid_target]"));

    fx.assert_file_content(&src, b"keep me");
}

#[test]
fn test_missing_operand_is_usage_error() {
    let fx = TestFixture::new();
    let src = fx.write("src.txt", "content");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg(&src).assert().code(2);
}

#[test]
fn test_chunk_size_out_of_range_is_usage_error() {
    let fx = TestFixture::new();
    let src = fx.write("src.txt", "content");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.args(["--chunk-size", "16"])
        .arg(&src)
        .arg(fx.path("dst.txt"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("chunk size"));

    assert!(!fx.path("dst.txt").exists());
}

#[test]
fn test_json_output_failure() {
    let fx = TestFixture::new();
    let src = fx.write("src.txt", "new");
    let dst = fx.write("dst.txt", "old");

    let mut cmd = cargo_bin_cmd!("onecopy");
    let output = cmd
        .args(["--output", "json"])
        .arg(&src)
        .arg(&dst)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["outcome"], "failed");
    assert_eq!(report["error_code"], "already_exists");
    assert!(
        report["error_message"]
            .as_str()
            .unwrap()
            .contains("already exists")
    );
}
