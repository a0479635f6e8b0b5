use std::ffi::OsString;
use std::time::Duration;

use crate::ctrl_event::event_for;
use crate::signal::{SIGBREAK, SIGINT, SIGKILL, SIGTERM};
use crate::win32::CTRL_BREAK_EVENT;
use crate::spawn::assemble_cmdline;
use crate::tests::common::read_all_string;
use crate::{Command, Process, ProcessGroup, Stdio};

fn cmdline(args: &[&str]) -> String {
    let argv: Vec<OsString> = args.iter().map(OsString::from).collect();
    assemble_cmdline(&argv).into_string().unwrap()
}

fn pinger() -> Command<'static> {
    Command::new("ping")
        .args(["-n", "30", "127.0.0.1"])
        .stdin(Stdio::Ignore)
        .stdout(Stdio::Ignore)
        .stderr(Stdio::Ignore)
}

#[test]
fn quote_arguments() {
    assert_eq!(cmdline(&["prog", "plain"]), "prog plain");
    assert_eq!(cmdline(&["prog", ""]), r#"prog """#);
    assert_eq!(cmdline(&["prog", "two words"]), r#"prog "two words""#);
    assert_eq!(cmdline(&["prog", r#"a"b"#]), r#"prog "a\"b""#);
    assert_eq!(cmdline(&["prog", r"dir\ x\"]), r#"prog "dir\ x\\""#);
    assert_eq!(cmdline(&["prog", r"no\space"]), r"prog no\space");
}

#[test]
fn exit_code() {
    let p = Command::new("cmd.exe")
        .args(["/c", "exit 7"])
        .spawn()
        .unwrap();
    let status = p.wait().unwrap();
    assert_eq!(status.code(), Some(7));
    assert_eq!(status.signal(), None);
}

#[test]
fn read_output() {
    let p = Command::new("cmd.exe")
        .args(["/c", "echo foo"])
        .spawn()
        .unwrap();
    assert_eq!(read_all_string(p.stdout().unwrap()).trim(), "foo");
    assert!(p.wait().unwrap().success());
}

#[test]
fn terminate_process() {
    let p = pinger().spawn().unwrap();
    assert_eq!(p.poll().unwrap(), None);
    p.kill(SIGTERM).unwrap();
    assert_eq!(p.wait().unwrap().code(), Some(1));
}

#[test]
fn unsupported_signal_is_usage_error() {
    let p = pinger().spawn().unwrap();
    assert!(p.kill(1).unwrap_err().is_usage());
    p.kill(SIGKILL).unwrap();
    p.wait().unwrap();
}

#[test]
fn break_to_attached_process_is_usage_error() {
    let p = pinger().spawn().unwrap();
    let attached = Process::attach(p.pid()).unwrap();
    assert!(attached.kill(SIGBREAK).unwrap_err().is_usage());
    attached.kill(SIGKILL).unwrap();
    assert!(p.wait_timeout(Duration::from_secs(10)).unwrap().is_some());
}

#[test]
fn job_kill_reaches_every_member() {
    let group = ProcessGroup::new().unwrap();
    let members: Vec<_> = (0..3)
        .map(|_| pinger().process_group(&group).spawn().unwrap())
        .collect();
    assert_eq!(group.members().len(), 3);
    group.kill(SIGKILL).unwrap();
    for p in &members {
        assert_eq!(p.wait().unwrap().code(), Some(1));
    }
}

#[test]
fn group_rejects_other_signals() {
    let group = ProcessGroup::new().unwrap();
    assert!(group.kill(1).unwrap_err().is_usage());
}

#[test]
fn user_without_password_is_usage_error() {
    let err = Command::new("cmd.exe")
        .user("someone")
        .spawn()
        .unwrap_err();
    assert!(err.is_usage(), "{err:?}");
}

#[test]
fn soft_signals_become_break_events() {
    assert_eq!(event_for(SIGINT), Some(CTRL_BREAK_EVENT));
    assert_eq!(event_for(SIGBREAK), Some(CTRL_BREAK_EVENT));
    assert_eq!(event_for(SIGTERM), None);
    assert_eq!(event_for(1), None);
}
