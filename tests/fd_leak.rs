//! Descriptor accounting across spawns. Kept in its own test binary so that no other
//! test opens or closes descriptors while it counts.

#![cfg(unix)]

use std::fs;
use std::path::Path;

use proctl::{Command, Stdio, Stream};

fn open_fds() -> usize {
    let dir = if Path::new("/proc/self/fd").exists() {
        "/proc/self/fd"
    } else {
        "/dev/fd"
    };
    fs::read_dir(dir).unwrap().count()
}

#[test]
fn spawning_does_not_leak_descriptors() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    // Warm up anything that is opened lazily on first use.
    Command::new("true").spawn().unwrap().wait().unwrap();
    let before = open_fds();

    for _ in 0..20 {
        let p = Command::new("true").spawn().unwrap();
        p.wait().unwrap();
        let _ = p.stdout().unwrap();
    }
    for _ in 0..5 {
        let p = Command::new("true")
            .stdin(Stdio::Ignore)
            .output(Stdio::path(&out))
            .spawn()
            .unwrap();
        p.wait().unwrap();
    }
    {
        let (r, w) = Stream::pipe().unwrap();
        let p = Command::new("true").stdin(&r).stdout(&w).spawn().unwrap();
        p.wait().unwrap();
    }
    // Failures at every stage release what was set up before them.
    for _ in 0..5 {
        assert!(Command::new("nosuchcommand-proctl").spawn().is_err());
        assert!(
            Command::new("true")
                .stdout(Stdio::path(dir.path().join("no/such/dir")))
                .spawn()
                .is_err()
        );
        assert!(
            Command::new("true")
                .output(Stdio::Pipe)
                .stderr(Stdio::Pipe)
                .spawn()
                .is_err()
        );
    }

    assert_eq!(open_fds(), before);
}
