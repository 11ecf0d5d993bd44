//! File type conflict integration tests for the onecopy CLI.
//!
//! These tests verify what happens when the destination is not a plain new
//! file: existing files, directories, and paths that resolve back to the
//! source.

use crate::common::TestFixture;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;

/// An existing directory is a target to copy into, not a file to replace.
#[test]
fn test_file_to_existing_directory() {
    let fx = TestFixture::new();
    let src = fx.write("report.txt", "report");
    let target = fx.mkdir("archive");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg(&src).arg(&target).assert().success();

    fx.assert_file_content(&target.join("report.txt"), b"report");
}

/// A directory where the resolved file should go is never replaced.
#[test]
fn test_file_cannot_overwrite_directory() {
    let fx = TestFixture::new();
    let src = fx.write("testdir", "file content");
    let target = fx.mkdir("target");
    fx.write("target/testdir/inside.txt", "inside content");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg("--overwrite")
        .arg(&src)
        .arg(&target)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[invalid_target]"))
        .stderr(predicate::str::contains("is a directory"));

    assert!(target.join("testdir").is_dir());
    fx.assert_file_content(&target.join("testdir/inside.txt"), b"inside content");
}

/// Overwrite truncates: a longer old file leaves no tail behind.
#[test]
fn test_overwrite_longer_file() {
    let fx = TestFixture::new();
    let src = fx.write("short.txt", "short");
    let dst = fx.write("long.txt", "a much longer original file");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg("-f").arg(&src).arg(&dst).assert().success();

    fx.assert_file_content(&dst, b"short");
}

/// Existing file inside a target directory still needs --overwrite.
#[test]
fn test_existing_file_inside_directory() {
    let fx = TestFixture::new();
    let src = fx.write("data.txt", "new");
    let target = fx.mkdir("target");
    fx.write("target/data.txt", "old");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg(&src)
        .arg(&target)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[already_exists]"));

    fx.assert_file_content(&target.join("data.txt"), b"old");
}

/// Copying a file into its own directory resolves to itself.
#[test]
fn test_copy_into_own_directory() {
    let fx = TestFixture::new();
    let src = fx.write("self.txt", "self");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg("-f")
        .arg(&src)
        .arg(fx.dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[invalid_target]"));

    assert_eq!(fs::read_to_string(&src).unwrap(), "self");
}

/// A trailing separator means "into this directory", which must exist.
#[test]
fn test_trailing_separator_needs_directory() {
    let fx = TestFixture::new();
    let src = fx.write("f.txt", "content");
    let mut missing = fx.path("not-yet").into_os_string();
    missing.push("/");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg(&src)
        .arg(&missing)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[invalid_target]"));

    assert!(!fx.path("not-yet").exists());
}
