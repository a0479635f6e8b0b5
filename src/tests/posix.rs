use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::time::{Duration, Instant};

use crate::posix;
use crate::process::ExitStatus;
use crate::signal::SIGKILL;
use crate::tests::common::read_all_string;
use crate::unix::CommandExt;
use crate::{Command, Error, Stdio};

#[test]
fn exit_status_from_wait_status() {
    let exited = ExitStatus::from_raw(3 << 8);
    assert_eq!(exited.code(), Some(3));
    assert_eq!(exited.signal(), None);
    assert_eq!(exited.to_string(), "exit code 3");

    let signalled = ExitStatus::from_raw(libc::SIGTERM);
    assert_eq!(signalled.code(), Some(255 + libc::SIGTERM as u32));
    assert_eq!(signalled.signal(), Some(libc::SIGTERM));
    assert!(!signalled.success());

    assert_eq!(ExitStatus::undetermined().code(), None);
    assert_eq!(ExitStatus::undetermined().signal(), None);
}

#[test]
fn nonexistent_program_reports_enoent() {
    let err = Command::new("nosuchcommand-proctl").spawn().unwrap_err();
    assert!(matches!(err, Error::ChildStartup(_)), "{err:?}");
    assert_eq!(err.raw_os_error(), Some(libc::ENOENT));

    let err = Command::new("/nonexistent/dir/prog").spawn().unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
}

#[test]
fn non_executable_reports_eacces() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("script");
    fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o644)).unwrap();
    let err = Command::new(&script).spawn().unwrap_err();
    assert!(matches!(err, Error::ChildStartup(_)), "{err:?}");
    assert_eq!(err.raw_os_error(), Some(libc::EACCES));
}

#[test]
fn overlong_program_name() {
    let err = Command::new("x".repeat(300)).spawn().unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::ENAMETOOLONG));
}

#[test]
fn drop_does_not_wait() {
    let p = Command::new("sleep")
        .arg("30")
        .stdout(Stdio::Ignore)
        .spawn()
        .unwrap();
    let pid = p.pid();
    let start = Instant::now();
    drop(p);
    assert!(start.elapsed() < Duration::from_secs(5));
    posix::kill(pid, SIGKILL).unwrap();
    posix::waitpid(pid, 0).unwrap();
}

#[test]
fn output_file_mode() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let p = Command::new("true")
        .stdout(Stdio::path(&out))
        .spawn()
        .unwrap();
    p.wait().unwrap();
    let mode = fs::metadata(&out).unwrap().permissions().mode() & 0o777;
    // Created 0644, reduced by the umask.
    assert_eq!(mode & !0o644, 0);
}

#[test]
fn lookup_users() {
    let root = posix::lookup_user("root".as_ref()).unwrap().unwrap();
    assert_eq!(root.uid, 0);
    assert!(
        posix::lookup_user("no-such-user-proctl".as_ref())
            .unwrap()
            .is_none()
    );
}

#[test]
fn unknown_user_is_usage_error() {
    let err = Command::new("true")
        .user("no-such-user-proctl")
        .spawn()
        .unwrap_err();
    assert!(err.is_usage(), "{err:?}");
}

#[test]
fn setuid_to_self() {
    let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
    let p = Command::new("id")
        .arg("-u")
        .setuid(uid)
        .setgid(gid)
        .spawn()
        .unwrap();
    assert_eq!(read_all_string(p.stdout().unwrap()).trim(), uid.to_string());
    assert!(p.wait().unwrap().success());
}

#[test]
fn run_as_root_user() {
    if unsafe { libc::getuid() } != 0 {
        return;
    }
    let p = Command::new("id")
        .arg("-u")
        .user("root")
        .spawn()
        .unwrap();
    assert_eq!(read_all_string(p.stdout().unwrap()).trim(), "0");
    assert!(p.wait().unwrap().success());
}

#[test]
fn sigpipe_is_reset_in_child() {
    // yes would run forever if it ignored SIGPIPE the way the parent does.
    let p = Command::new("yes").stdout(Stdio::Pipe).spawn().unwrap();
    let mut out = p.stdout().unwrap().unwrap();
    assert_eq!(out.read_bytes(2).unwrap(), b"y\n");
    drop(out);
    p.close_stdout();
    let status = p.wait().unwrap();
    assert!(status.is_killed_by(libc::SIGPIPE), "{status:?}");
}

#[test]
fn pid_exists() {
    assert!(posix::pid_exists(std::process::id()).unwrap());
    assert!(!posix::pid_exists(999_999_999).unwrap());
}
