//! Symlink handling integration tests for the onecopy CLI.
//!
//! These tests verify proper handling of symbolic links:
//! - A symlinked source copies the target's content
//! - A symlinked destination directory is copied into
//! - A dangling destination symlink is never followed without --overwrite

#[cfg(unix)]
mod unix_tests {
    use crate::common::TestFixture;
    use assert_cmd::cargo::cargo_bin_cmd;
    use predicates::prelude::*;
    use std::fs;
    use std::os::unix::fs::symlink;

    #[test]
    fn test_symlink_source_copies_target_content() {
        let fx = TestFixture::new();
        fx.write("target.txt", "target content");
        symlink("target.txt", fx.path("link")).unwrap();

        let mut cmd = cargo_bin_cmd!("onecopy");
        cmd.arg(fx.path("link"))
            .arg(fx.path("copy.txt"))
            .assert()
            .success();

        let copy = fx.path("copy.txt");
        assert!(!fs::symlink_metadata(&copy).unwrap().file_type().is_symlink());
        fx.assert_file_content(&copy, b"target content");
    }

    #[test]
    fn test_dangling_symlink_source() {
        let fx = TestFixture::new();
        symlink("missing.txt", fx.path("dangling")).unwrap();

        let mut cmd = cargo_bin_cmd!("onecopy");
        cmd.arg(fx.path("dangling"))
            .arg(fx.path("copy.txt"))
            .assert()
            .code(1)
            .stderr(predicate::str::contains("error[not_found]"));
    }

    #[test]
    fn test_symlink_to_directory_destination() {
        let fx = TestFixture::new();
        let src = fx.write("file.txt", "content");
        let real = fx.mkdir("real");
        symlink(&real, fx.path("alias")).unwrap();

        let mut cmd = cargo_bin_cmd!("onecopy");
        cmd.arg(&src).arg(fx.path("alias")).assert().success();

        fx.assert_file_content(&real.join("file.txt"), b"content");
    }

    #[test]
    fn test_dangling_destination_symlink_is_not_followed() {
        let fx = TestFixture::new();
        let src = fx.write("file.txt", "content");
        symlink(fx.path("elsewhere.txt"), fx.path("trap")).unwrap();

        let mut cmd = cargo_bin_cmd!("onecopy");
        cmd.arg(&src)
            .arg(fx.path("trap"))
            .assert()
            .code(1)
            .stderr(predicate::str::contains("error[already_exists]"));

        assert!(!fx.path("elsewhere.txt").exists());
    }
}
