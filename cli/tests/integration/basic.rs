//! Basic functionality integration tests for the onecopy CLI.

#[path = "../common/mod.rs"]
mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use common::{TestFixture, pattern};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;

#[test]
fn test_basic_file_copy() {
    let fx = TestFixture::new();
    let src = fx.write("test.txt", "hello world");
    let dst = fx.path("copy.txt");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg(&src)
        .arg(&dst)
        .assert()
        .success()
        .stdout(predicate::str::contains("Copied 11 B"));

    fx.assert_file_content(&dst, b"hello world");
}

#[test]
fn test_copy_into_existing_directory() {
    let fx = TestFixture::new();
    let src = fx.write("notes.txt", "into the directory");
    let target = fx.mkdir("target");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg(&src).arg(&target).assert().success();

    fx.assert_file_content(&target.join("notes.txt"), b"into the directory");
}

#[test]
fn test_verify_prints_digest() {
    let fx = TestFixture::new();
    // sha256("abc")
    let src = fx.write("abc.txt", "abc");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg("--verify")
        .arg(&src)
        .arg(fx.path("out.txt"))
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Verified sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
        ));
}

#[test]
fn test_quiet_prints_nothing() {
    let fx = TestFixture::new();
    let src = fx.write("a.txt", "quiet");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg("-q")
        .arg(&src)
        .arg(fx.path("b.txt"))
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::is_empty());

    fx.assert_file_content(&fx.path("b.txt"), b"quiet");
}

#[test]
fn test_json_output_success() {
    let fx = TestFixture::new();
    let data = pattern(50_000);
    let src = fx.write("data.bin", &data);
    let target = fx.mkdir("out");

    let mut cmd = cargo_bin_cmd!("onecopy");
    let output = cmd
        .args(["--output", "json", "--verify", "--chunk-size", "8192"])
        .arg(&src)
        .arg(&target)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["schema_version"], "1.0");
    assert_eq!(report["outcome"], "success");
    assert_eq!(report["bytes_copied"], 50_000);
    assert!(report["digest"].as_str().unwrap().starts_with("sha256:"));
    assert!(report["error_code"].is_null());
    assert!(
        report["destination"]
            .as_str()
            .unwrap()
            .ends_with("data.bin")
    );

    assert_eq!(fs::read(target.join("data.bin")).unwrap(), data);
}

#[test]
fn test_no_sync_still_copies() {
    let fx = TestFixture::new();
    let src = fx.write("a.txt", "unsynced");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg("--no-sync")
        .arg(&src)
        .arg(fx.path("b.txt"))
        .assert()
        .success();

    fx.assert_file_content(&fx.path("b.txt"), b"unsynced");
}

#[test]
fn test_verbose_logs_to_stderr() {
    let fx = TestFixture::new();
    let src = fx.write("a.txt", "logged");

    let mut cmd = cargo_bin_cmd!("onecopy");
    cmd.arg("-v")
        .arg("-q")
        .arg(&src)
        .arg(fx.path("b.txt"))
        .env_remove("ONECOPY_LOG")
        .assert()
        .success()
        .stderr(predicate::str::contains("starting chunked copy"));
}
