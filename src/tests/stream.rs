use std::io::{Read, Write};

use crate::Stream;

#[test]
fn pipe_write_then_read_all() {
    let (mut r, mut w) = Stream::pipe().unwrap();
    assert_eq!(w.write(b"hello").unwrap(), 5);
    w.close();
    assert_eq!(r.read_all().unwrap(), b"hello");
    // Past the end, reading yields nothing.
    assert_eq!(r.read_all().unwrap(), b"");
}

#[test]
fn read_all_larger_than_chunk() {
    let (mut r, mut w) = Stream::pipe().unwrap();
    let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    let writer = {
        let data = data.clone();
        std::thread::spawn(move || {
            w.write(&data).unwrap();
        })
    };
    assert_eq!(r.read_all().unwrap(), data);
    writer.join().unwrap();
}

#[test]
fn read_line_with_and_without_terminator() {
    let (mut r, mut w) = Stream::pipe().unwrap();
    w.write(b"one\ntwo\nthree").unwrap();
    w.close();
    assert_eq!(r.read_line(true).unwrap(), b"one\n");
    assert_eq!(r.read_line(false).unwrap(), b"two");
    assert_eq!(r.read_line(false).unwrap(), b"three");
    assert_eq!(r.read_line(false).unwrap(), b"");
}

#[test]
fn read_line_empty_line() {
    let (mut r, mut w) = Stream::pipe().unwrap();
    w.write(b"\nx\n").unwrap();
    w.close();
    assert_eq!(r.read_line(false).unwrap(), b"");
    assert_eq!(r.read_line(true).unwrap(), b"x\n");
}

#[test]
fn read_bytes_stops_at_eof() {
    let (mut r, mut w) = Stream::pipe().unwrap();
    w.write(b"abc").unwrap();
    w.close();
    assert_eq!(r.read_bytes(2).unwrap(), b"ab");
    assert_eq!(r.read_bytes(5).unwrap(), b"c");
    assert_eq!(r.read_bytes(5).unwrap(), b"");
}

#[test]
fn closed_stream_rejects_io() {
    let (mut r, mut w) = Stream::pipe().unwrap();
    assert!(!r.is_closed());
    r.close();
    assert!(r.is_closed());
    r.close();
    assert!(r.read_all().unwrap_err().is_usage());
    assert!(r.read_line(false).unwrap_err().is_usage());
    assert!(r.try_clone().unwrap_err().is_usage());
    assert!(r.as_file().is_none());

    w.close();
    assert!(w.write(b"x").unwrap_err().is_usage());
    let err = Write::write(&mut w, b"x").unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
}

#[test]
fn write_to_closed_reader_fails_with_os_error() {
    let (r, mut w) = Stream::pipe().unwrap();
    drop(r);
    let err = w.write(b"data").unwrap_err();
    assert!(!err.is_usage());
    assert!(err.raw_os_error().is_some());
}

#[test]
fn nonblocking_read_returns_what_is_available() {
    let (mut r, mut w) = Stream::pipe().unwrap();
    r.set_nonblocking(true).unwrap();
    assert!(r.is_nonblocking().unwrap());
    assert_eq!(r.read_all().unwrap(), b"");
    w.write(b"partial").unwrap();
    assert_eq!(r.read_all().unwrap(), b"partial");
    assert_eq!(r.read_bytes(10).unwrap(), b"");
    assert_eq!(r.read_line(true).unwrap(), b"");
    r.set_nonblocking(false).unwrap();
    assert!(!r.is_nonblocking().unwrap());
}

#[test]
fn duplicates_share_nonblocking_mode() {
    let (mut r, mut w) = Stream::pipe().unwrap();
    let mut dup = r.try_clone().unwrap();
    r.set_nonblocking(true).unwrap();
    assert!(dup.is_nonblocking().unwrap());
    // The duplicate reports an empty pipe as no data rather than failing.
    assert_eq!(dup.read_all().unwrap(), b"");
    w.write(b"late").unwrap();
    assert_eq!(dup.read_line(false).unwrap(), b"late");
    dup.set_nonblocking(false).unwrap();
    assert!(!r.is_nonblocking().unwrap());
}

#[test]
fn clone_is_independent() {
    let (mut r, mut w) = Stream::pipe().unwrap();
    let mut w2 = w.try_clone().unwrap();
    w.close();
    w2.write(b"still open").unwrap();
    drop(w2);
    assert_eq!(r.read_all().unwrap(), b"still open");
}

#[test]
fn std_io_traits() {
    let (mut r, mut w) = Stream::pipe().unwrap();
    write!(w, "{}-{}", 1, 2).unwrap();
    w.flush().unwrap();
    drop(w);
    let mut s = String::new();
    r.read_to_string(&mut s).unwrap();
    assert_eq!(s, "1-2");
}

#[test]
fn stream_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data");
    std::fs::write(&path, "line 1\nline 2\n").unwrap();
    let mut stream = Stream::from(std::fs::File::open(&path).unwrap());
    assert_eq!(stream.read_line(false).unwrap(), b"line 1");
    assert_eq!(stream.read_all().unwrap(), b"line 2\n");
    assert!(stream.into_file().is_some());
}
