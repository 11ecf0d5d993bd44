//! Permission preservation integration tests for the onecopy CLI.
//!
//! Mode bits are only copied with -p/--preserve-mode, and only after the
//! data transfer succeeded.

#[cfg(unix)]
mod unix_tests {
    use crate::common::TestFixture;
    use assert_cmd::cargo::cargo_bin_cmd;
    use rstest::rstest;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn mode(path: &std::path::Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[rstest]
    #[case(0o755)]
    #[case(0o640)]
    #[case(0o400)]
    fn test_preserve_mode(#[case] bits: u32) {
        let fx = TestFixture::new();
        let src = fx.write("src", "mode bits");
        fs::set_permissions(&src, fs::Permissions::from_mode(bits)).unwrap();
        let dst = fx.path("dst");

        let mut cmd = cargo_bin_cmd!("onecopy");
        cmd.arg("-p").arg(&src).arg(&dst).assert().success();

        assert_eq!(mode(&dst), bits);
        fx.assert_file_content(&dst, b"mode bits");
    }

    #[test]
    fn test_mode_not_copied_by_default() {
        let fx = TestFixture::new();
        let src = fx.write("src", "plain");
        fs::set_permissions(&src, fs::Permissions::from_mode(0o711)).unwrap();
        let dst = fx.path("dst");

        let mut cmd = cargo_bin_cmd!("onecopy");
        cmd.arg(&src).arg(&dst).assert().success();

        // new files never get the execute bits from the umask-based default
        assert_eq!(mode(&dst) & 0o111, 0);
    }

    #[test]
    fn test_preserve_mode_on_overwrite() {
        let fx = TestFixture::new();
        let src = fx.write("src", "new");
        fs::set_permissions(&src, fs::Permissions::from_mode(0o700)).unwrap();
        let dst = fx.write("dst", "old");
        fs::set_permissions(&dst, fs::Permissions::from_mode(0o644)).unwrap();

        let mut cmd = cargo_bin_cmd!("onecopy");
        cmd.args(["-f", "-p"]).arg(&src).arg(&dst).assert().success();

        assert_eq!(mode(&dst), 0o700);
        fx.assert_file_content(&dst, b"new");
    }
}
