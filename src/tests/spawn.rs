use std::fs;

use crate::tests::common::{init_tracing, read_all_string};
use crate::{Command, Error, ProcessGroup, Stdio};

#[test]
fn good_cmd() {
    init_tracing();
    let status = Command::new("true").spawn().unwrap().wait().unwrap();
    assert!(status.success());
}

#[test]
fn bad_cmd() {
    let err = Command::new("nosuchcommand-proctl").spawn().unwrap_err();
    assert!(
        matches!(err, Error::ChildStartup(_) | Error::Resource { .. }),
        "{err:?}"
    );
    assert!(err.raw_os_error().is_some());
}

#[test]
fn reject_empty_program() {
    let err = Command::new("").spawn().unwrap_err();
    assert!(err.is_usage(), "{err:?}");
    let err = Command::from_argv(Vec::<&str>::new()).spawn().unwrap_err();
    assert!(err.is_usage(), "{err:?}");
}

#[test]
fn null_byte_in_arg() {
    let err = Command::new("echo").arg("a\0b").spawn().unwrap_err();
    assert!(err.is_usage(), "{err:?}");
    let err = Command::new("true").env("K", "v\0").spawn().unwrap_err();
    assert!(err.is_usage(), "{err:?}");
}

#[test]
fn err_exit() {
    let p = Command::new("sh").args(["-c", "exit 13"]).spawn().unwrap();
    let status = p.wait().unwrap();
    assert_eq!(status.code(), Some(13));
    assert_eq!(status.signal(), None);
    assert!(!status.success());
}

#[test]
fn from_argv() {
    let p = Command::from_argv(["sh", "-c", "exit 4"]).spawn().unwrap();
    assert_eq!(p.wait().unwrap().code(), Some(4));
}

#[test]
fn cat_round_trip() {
    let p = Command::new("cat").spawn().unwrap();
    let mut stdin = p.stdin().unwrap().unwrap();
    let mut stdout = p.stdout().unwrap().unwrap();
    stdin.write(b"hello\n").unwrap();
    assert_eq!(stdout.read_line(true).unwrap(), b"hello\n");
    stdin.write(b"world\n").unwrap();
    assert_eq!(stdout.read_line(false).unwrap(), b"world");
    drop(stdin);
    p.close_stdin();
    assert_eq!(stdout.read_all().unwrap(), b"");
    assert!(p.wait().unwrap().success());
}

#[test]
fn env_set_and_clear() {
    let p = Command::new("sh")
        .args(["-c", "echo \"$PROCTL_FOO:${HOME-nohome}\""])
        .env_clear()
        .env("PROCTL_FOO", "bar")
        .spawn()
        .unwrap();
    assert_eq!(read_all_string(p.stdout().unwrap()), "bar:nohome\n");
    p.wait().unwrap();
}

#[test]
fn env_last_value_wins() {
    let p = Command::new("sh")
        .args(["-c", "echo $PROCTL_X"])
        .env("PROCTL_X", "1")
        .env_extend([("PROCTL_X", "2"), ("PROCTL_Y", "3")])
        .spawn()
        .unwrap();
    assert_eq!(read_all_string(p.stdout().unwrap()), "2\n");
    p.wait().unwrap();
}

#[test]
fn env_remove() {
    let p = Command::new("sh")
        .args(["-c", "echo ${PROCTL_GONE-unset}"])
        .env("PROCTL_GONE", "1")
        .env_remove("PROCTL_GONE")
        .spawn()
        .unwrap();
    assert_eq!(read_all_string(p.stdout().unwrap()), "unset\n");
    p.wait().unwrap();
}

#[test]
fn cwd() {
    let dir = tempfile::tempdir().unwrap();
    let p = Command::new("pwd").cwd(dir.path()).spawn().unwrap();
    let out = read_all_string(p.stdout().unwrap());
    assert_eq!(
        fs::canonicalize(out.trim_end()).unwrap(),
        fs::canonicalize(dir.path()).unwrap()
    );
    assert!(p.wait().unwrap().success());
}

#[test]
fn missing_cwd_fails_to_start() {
    let dir = tempfile::tempdir().unwrap();
    let err = Command::new("true")
        .cwd(dir.path().join("missing"))
        .spawn()
        .unwrap_err();
    assert!(!err.is_usage(), "{err:?}");
    assert!(err.raw_os_error().is_some());
}

#[test]
fn group_options_conflict() {
    let group = ProcessGroup::new().unwrap();
    let err = Command::new("true")
        .new_process_group()
        .process_group(&group)
        .spawn()
        .unwrap_err();
    assert!(err.is_usage(), "{err:?}");
}

#[test]
fn spawn_into_closed_group() {
    let group = ProcessGroup::new().unwrap();
    group.close();
    let err = Command::new("true")
        .process_group(&group)
        .spawn()
        .unwrap_err();
    assert!(err.is_usage(), "{err:?}");
}

#[test]
fn failed_spawn_releases_channels() {
    // stdin is resolved first; the failure on stdout must not leave it behind.
    let dir = tempfile::tempdir().unwrap();
    let err = Command::new("true")
        .stdin(Stdio::Pipe)
        .stdout(Stdio::path(dir.path().join("no/such/dir")))
        .spawn()
        .unwrap_err();
    assert!(matches!(err, Error::Resource { .. }), "{err:?}");
}

#[test]
fn cmdline_display() {
    let cmd = Command::new("echo").arg("plain").arg("two words").arg("it's");
    assert_eq!(cmd.to_cmdline_lossy(), r#"echo plain 'two words' 'it'\''s'"#);
    assert_eq!(
        format!("{cmd:?}"),
        r#"Command { echo plain 'two words' 'it'\''s' }"#
    );
}

#[test]
fn error_converts_to_io_error() {
    let err = Command::new("").spawn().unwrap_err();
    let io_err: std::io::Error = err.into();
    assert_eq!(io_err.kind(), std::io::ErrorKind::InvalidInput);
}
