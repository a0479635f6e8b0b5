use std::time::{Duration, Instant};

use crate::signal::{SIGKILL, SIGTERM};
use crate::tests::common::{init_tracing, read_all_string};
use crate::{Command, Error, Process, Stdio, StdioKind};

fn sleeper(secs: u32) -> Process {
    Command::new("sleep")
        .arg(secs.to_string())
        .stdin(Stdio::Ignore)
        .stdout(Stdio::Ignore)
        .stderr(Stdio::Ignore)
        .spawn()
        .unwrap()
}

#[test]
fn wait_is_idempotent() {
    let p = Command::new("sh").args(["-c", "exit 3"]).spawn().unwrap();
    let first = p.wait().unwrap();
    let second = p.wait().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.code(), Some(3));
    assert_eq!(first.signal(), None);
    assert_eq!(p.exit_status(), Some(first));
    assert!(p.exited().unwrap());
    assert_eq!(p.poll().unwrap(), Some(first));
}

#[test]
fn clones_share_state() {
    let p = Command::new("true").spawn().unwrap();
    let q = p.clone();
    let status = p.wait().unwrap();
    assert_eq!(q.exit_status(), Some(status));
    assert_eq!(q.pid(), p.pid());
}

#[test]
fn poll_running_then_killed() {
    init_tracing();
    let p = sleeper(30);
    assert_eq!(p.poll().unwrap(), None);
    assert!(!p.exited().unwrap());
    p.kill(SIGKILL).unwrap();
    let status = p.wait().unwrap();
    assert_eq!(status.signal(), Some(SIGKILL));
    assert_eq!(status.code(), Some(255 + SIGKILL as u32));
    assert!(status.is_killed_by(SIGKILL));
}

#[test]
fn terminate_reports_signal_code() {
    let p = sleeper(30);
    p.terminate().unwrap();
    let status = p.wait().unwrap();
    assert!(status.is_killed_by(SIGTERM));
    assert_eq!(status.code(), Some(270));
}

#[test]
fn kill_after_exit_is_noop() {
    let p = Command::new("true").spawn().unwrap();
    p.wait().unwrap();
    p.kill(SIGKILL).unwrap();
    p.terminate().unwrap();
}

#[test]
fn wait_timeout_expires() {
    let p = sleeper(30);
    let start = Instant::now();
    assert_eq!(p.wait_timeout(Duration::from_millis(200)).unwrap(), None);
    assert!(start.elapsed() >= Duration::from_millis(200));
    p.kill(SIGKILL).unwrap();
    let status = p.wait_timeout(Duration::from_secs(10)).unwrap();
    assert!(status.is_some_and(|s| s.is_killed_by(SIGKILL)));
}

#[test]
fn wait_timeout_zero_polls_once() {
    let p = sleeper(30);
    let start = Instant::now();
    assert_eq!(p.wait_timeout(Duration::ZERO).unwrap(), None);
    assert!(start.elapsed() < Duration::from_secs(1));
    p.kill(SIGKILL).unwrap();
    p.wait().unwrap();
}

#[test]
fn wait_timeout_returns_early() {
    let p = Command::new("true").spawn().unwrap();
    let start = Instant::now();
    let status = p.wait_timeout(Duration::from_secs(10)).unwrap();
    assert!(status.unwrap().success());
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn display() {
    let p = sleeper(30);
    assert_eq!(p.to_string(), format!("process ({}, running)", p.pid()));
    p.kill(SIGKILL).unwrap();
    p.wait().unwrap();
    assert_eq!(p.to_string(), format!("process ({}, terminated)", p.pid()));
}

#[test]
fn close_is_idempotent() {
    let p = Command::new("cat").spawn().unwrap();
    p.close();
    p.close();
    let info = p.stdio_info();
    assert_eq!(
        (info.stdin, info.stdout, info.stderr),
        (StdioKind::Closed, StdioKind::Closed, StdioKind::Closed)
    );
    assert!(p.stdin().unwrap().is_none());
    // With its stdin released, cat sees end of input and exits.
    assert!(p.wait().unwrap().success());
}

#[test]
fn closing_stdin_signals_eof() {
    let p = Command::new("cat").spawn().unwrap();
    let mut stdin = p.stdin().unwrap().unwrap();
    stdin.write(b"payload").unwrap();
    drop(stdin);
    p.close_stdin();
    assert_eq!(p.stdio_info().stdin, StdioKind::Closed);
    assert_eq!(read_all_string(p.stdout().unwrap()), "payload");
    assert!(p.wait().unwrap().success());
}

#[test]
fn attach_observes_and_signals() {
    let child = sleeper(30);
    let attached = Process::attach(child.pid()).unwrap();
    assert_eq!(attached.pid(), child.pid());
    assert!(!attached.exited().unwrap());
    let info = attached.stdio_info();
    assert_eq!(
        (info.stdin, info.stdout, info.stderr),
        (StdioKind::Closed, StdioKind::Closed, StdioKind::Closed)
    );
    assert!(attached.stdout().unwrap().is_none());

    attached.kill(SIGTERM).unwrap();
    assert!(child.wait().unwrap().is_killed_by(SIGTERM));
    // Once the child is reaped the attached handle sees it gone, without a code.
    let status = attached.wait_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(status.map(|s| s.code()), Some(None));
}

#[test]
fn attach_to_missing_pid() {
    let err = Process::attach(999_999_999).unwrap_err();
    assert!(matches!(err, Error::Control { .. }), "{err:?}");
    assert!(err.raw_os_error().is_some());
}

#[test]
fn wait_from_many_threads() {
    let p = Command::new("sh").args(["-c", "sleep 0.2; exit 7"]).spawn().unwrap();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let p = p.clone();
            std::thread::spawn(move || p.wait().unwrap())
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap().code(), Some(7));
    }
}

#[test]
fn kill_while_another_thread_waits() {
    let p = sleeper(30);
    let waiter = {
        let p = p.clone();
        std::thread::spawn(move || p.wait().unwrap())
    };
    std::thread::sleep(Duration::from_millis(200));
    let start = Instant::now();
    assert_eq!(p.poll().unwrap(), None);
    p.kill(SIGKILL).unwrap();
    assert!(start.elapsed() < Duration::from_secs(2));
    let status = waiter.join().unwrap();
    assert!(status.is_killed_by(SIGKILL));
    assert_eq!(p.exit_status(), Some(status));
    assert!(start.elapsed() < Duration::from_secs(10));
}
