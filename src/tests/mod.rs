mod common;
mod stream;

#[cfg(unix)]
mod process;
#[cfg(unix)]
mod spawn;

#[cfg(unix)]
mod posix;
#[cfg(windows)]
mod win32;

use crate::{
    Command, Error, ExitStatus, Process, ProcessGroup, Stdio, StdioInfo, StdioKind, Stream,
};

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn public_types_are_send_and_sync() {
    assert_send_sync::<Command<'static>>();
    assert_send_sync::<Error>();
    assert_send_sync::<ExitStatus>();
    assert_send_sync::<Process>();
    assert_send_sync::<ProcessGroup>();
    assert_send_sync::<Stdio<'static>>();
    assert_send_sync::<StdioInfo>();
    assert_send_sync::<StdioKind>();
    assert_send_sync::<Stream>();
}
