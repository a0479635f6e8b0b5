use std::cmp::min;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::channel::{Channel, Channels, StandardStream, StdioInfo, StdioKind};
use crate::error::{Error, Result};
use crate::group::ProcessGroup;
use crate::stream::Stream;

pub(crate) use os::ExtProcessState;

/// Interval at which timed and attached waits re-check the process.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Exit status of a process.
///
/// On Unix the raw value is the status from `waitpid()`; on Windows it is the exit code
/// from `GetExitCodeProcess()`. An undetermined status is reported for processes that
/// were reaped elsewhere, or that were attached to rather than spawned.
#[derive(Eq, PartialEq, Hash, Copy, Clone)]
pub struct ExitStatus(pub(crate) Option<os::RawExitStatus>);

impl ExitStatus {
    pub(crate) fn from_raw(raw: os::RawExitStatus) -> ExitStatus {
        ExitStatus(Some(raw))
    }

    pub(crate) fn undetermined() -> ExitStatus {
        ExitStatus(None)
    }

    /// True if the exit code of the process is 0.
    pub fn success(&self) -> bool {
        self.code() == Some(0)
    }

    /// True if the process was killed by the signal with the specified number.
    ///
    /// Always returns `false` on Windows.
    pub fn is_killed_by(&self, signum: i32) -> bool {
        self.signal() == Some(signum)
    }
}

/// A handle to a spawned or attached process.
///
/// `Process` is cheaply cloneable; clones share the process state, so the exit status
/// obtained through one clone is visible to all of them. All methods take `&self`.
///
/// A spawned process owns the parent side of its standard stream channels. They are
/// released with [`close`](Self::close), the `close_*` methods, or when the last clone is
/// dropped. Dropping a process never waits for it; a finished child is reaped if
/// possible.
///
/// On Unix, a child that is still running when its last handle is dropped is never
/// reaped by this library and stays a zombie after it exits. Long-running programs
/// should [`wait`](Self::wait) for their children before letting go of them.
///
/// One thread may block in [`wait`](Self::wait) while others poll or signal the same
/// process.
#[derive(Clone)]
pub struct Process(pub(crate) Arc<InnerProcess>);

pub(crate) struct InnerProcess {
    pid: u32,
    ext: os::ExtProcessState,
    state: Mutex<ProcessState>,
    channels: Mutex<Channels>,
    group: Option<ProcessGroup>,
}

#[derive(Debug, Clone, Copy)]
enum ProcessState {
    Running,
    Finished(ExitStatus),
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Process {
    pub(crate) fn new(
        pid: u32,
        ext: os::ExtProcessState,
        channels: Channels,
        group: Option<ProcessGroup>,
    ) -> Process {
        Process(Arc::new(InnerProcess {
            pid,
            ext,
            state: Mutex::new(ProcessState::Running),
            channels: Mutex::new(channels),
            group,
        }))
    }

    /// Attach to an existing process by PID.
    ///
    /// An attached process can be polled, waited on and signalled, but its exit code is
    /// only available on Windows. On Unix an attached process that has finished reports
    /// an undetermined exit status. Its standard streams are all
    /// [`Closed`](StdioKind::Closed).
    pub fn attach(pid: u32) -> Result<Process> {
        let ext = os::attach(pid).map_err(Error::control("attaching to process"))?;
        debug!(pid, "attached to process");
        Ok(Process::new(pid, ext, [None, None, None], None))
    }

    pub(crate) fn downgrade(&self) -> Weak<InnerProcess> {
        Arc::downgrade(&self.0)
    }

    pub(crate) fn from_inner(inner: Arc<InnerProcess>) -> Process {
        Process(inner)
    }

    /// Returns the PID of the process.
    pub fn pid(&self) -> u32 {
        self.0.pid
    }

    /// Returns the process group the process was spawned into, if any.
    pub fn group(&self) -> Option<&ProcessGroup> {
        self.0.group.as_ref()
    }

    /// Returns the exit status, if the process is known to have finished.
    ///
    /// This does not perform any system calls. To check whether the process has finished,
    /// use [`poll`](Self::poll) or [`wait`](Self::wait).
    pub fn exit_status(&self) -> Option<ExitStatus> {
        match *lock(&self.0.state) {
            ProcessState::Finished(status) => Some(status),
            ProcessState::Running => None,
        }
    }

    /// Check whether the process has finished, without blocking.
    ///
    /// Returns the cached status if the process is already known to have finished, and
    /// otherwise asks the OS once.
    pub fn poll(&self) -> Result<Option<ExitStatus>> {
        self.0.os_poll().map_err(Error::control("polling process"))
    }

    /// True if the process has finished.
    pub fn exited(&self) -> Result<bool> {
        Ok(self.poll()?.is_some())
    }

    /// Wait for the process to finish and return its exit status.
    ///
    /// Waiting again on a finished process returns the same status.
    pub fn wait(&self) -> Result<ExitStatus> {
        if let Some(status) = self.exit_status() {
            return Ok(status);
        }
        let status = self.0.os_wait().map_err(Error::control("waiting for process"))?;
        debug!(pid = self.pid(), %status, "process finished");
        Ok(status)
    }

    /// Wait for the process to finish, giving up after `timeout`.
    ///
    /// Returns `Ok(None)` if the process was still running when the timeout elapsed. A
    /// zero timeout polls exactly once.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<Option<ExitStatus>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.poll()? {
                return Ok(Some(status));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(min(WAIT_POLL_INTERVAL, deadline - now));
        }
    }

    /// Send `signal` to the process.
    ///
    /// Signalling a process known to have finished does nothing. On Windows, `SIGTERM`
    /// and `SIGKILL` terminate the process, while `SIGINT` and `SIGBREAK` deliver a
    /// console break event; the latter is only possible for processes spawned by this
    /// library.
    pub fn kill(&self, signal: i32) -> Result<()> {
        if self.exit_status().is_some() {
            return Ok(());
        }
        trace!(pid = self.pid(), signal, "signalling process");
        self.0.os_kill(signal)
    }

    /// Terminate the process: `SIGTERM` on Unix, `TerminateProcess` on Windows.
    pub fn terminate(&self) -> Result<()> {
        self.kill(crate::signal::SIGTERM)
    }

    /// Returns a stream for writing to the child's stdin.
    ///
    /// This is `None` unless stdin is a pipe, an external stream or a file. The returned
    /// stream is an independent duplicate; the process keeps its own end open until
    /// [`close_stdin`](Self::close_stdin) or [`close`](Self::close).
    pub fn stdin(&self) -> Result<Option<Stream>> {
        self.caller_stream(StandardStream::Input)
    }

    /// Returns a stream for reading the child's stdout.
    ///
    /// For stdout redirected to a path, the file is reopened for reading.
    pub fn stdout(&self) -> Result<Option<Stream>> {
        self.caller_stream(StandardStream::Output)
    }

    /// Returns a stream for reading the child's stderr.
    ///
    /// With combined output this is a stream over the same channel as stdout.
    pub fn stderr(&self) -> Result<Option<Stream>> {
        self.caller_stream(StandardStream::Error)
    }

    fn caller_stream(&self, which: StandardStream) -> Result<Option<Stream>> {
        let channel = lock(&self.0.channels)[which as usize].clone();
        match channel {
            Some(channel) => channel.caller_stream(),
            None => Ok(None),
        }
    }

    /// Returns the kinds of the three standard stream channels.
    pub fn stdio_info(&self) -> StdioInfo {
        let channels = lock(&self.0.channels);
        let kind = |c: &Option<Arc<Channel>>| c.as_ref().map_or(StdioKind::Closed, |c| c.kind());
        StdioInfo {
            stdin: kind(&channels[0]),
            stdout: kind(&channels[1]),
            stderr: kind(&channels[2]),
        }
    }

    /// Release the parent's end of the child's stdin, so the child sees end of input once
    /// every duplicate handed out by [`stdin`](Self::stdin) is closed too.
    pub fn close_stdin(&self) {
        self.close_channel(StandardStream::Input)
    }

    /// Release the parent's end of the child's stdout.
    ///
    /// With combined output this also releases stderr.
    pub fn close_stdout(&self) {
        self.close_channel(StandardStream::Output)
    }

    /// Release the parent's end of the child's stderr.
    ///
    /// With combined output this also releases stdout.
    pub fn close_stderr(&self) {
        self.close_channel(StandardStream::Error)
    }

    fn close_channel(&self, which: StandardStream) {
        let mut channels = lock(&self.0.channels);
        if let Some(closed) = channels[which as usize].take() {
            for slot in channels.iter_mut() {
                if slot.as_ref().is_some_and(|c| Arc::ptr_eq(c, &closed)) {
                    *slot = None;
                }
            }
        }
    }

    /// Release all channels held by the process. Closing twice does nothing.
    ///
    /// The child keeps running; this only gives up the parent's side of its streams.
    pub fn close(&self) {
        let released = std::mem::take(&mut *lock(&self.0.channels));
        if released.iter().any(Option::is_some) {
            trace!(pid = self.pid(), "closing process channels");
        }
    }
}

impl InnerProcess {
    fn os_poll(&self) -> std::io::Result<Option<ExitStatus>> {
        let mut state = lock(&self.state);
        if let ProcessState::Finished(status) = *state {
            return Ok(Some(status));
        }
        let status = self.os_try_wait()?;
        if let Some(status) = status {
            *state = ProcessState::Finished(status);
        }
        Ok(status)
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let running = matches!(self.poll(), Ok(None));
        write!(
            f,
            "process ({}, {})",
            self.pid(),
            if running { "running" } else { "terminated" }
        )
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.0.pid)
            .field("state", &*lock(&self.0.state))
            .field("stdio", &self.stdio_info())
            .finish()
    }
}

#[cfg(unix)]
mod os {
    use std::io;
    use std::thread;

    use super::*;
    use crate::posix;

    pub type RawExitStatus = i32;

    #[derive(Debug)]
    pub enum ExtProcessState {
        /// Our own child, which we can reap.
        Child,
        /// Someone else's process, observed through the null signal.
        Attached,
    }

    pub fn attach(pid: u32) -> io::Result<ExtProcessState> {
        if !posix::pid_exists(pid)? {
            return Err(io::Error::from_raw_os_error(posix::ESRCH));
        }
        Ok(ExtProcessState::Attached)
    }

    impl ExitStatus {
        /// Returns the exit code of the process.
        ///
        /// A process killed by signal `N` reports `255 + N`, so a code is available
        /// whenever the status is determined.
        pub fn code(&self) -> Option<u32> {
            let raw = self.0?;
            if libc::WIFEXITED(raw) {
                Some(libc::WEXITSTATUS(raw) as u32)
            } else if libc::WIFSIGNALED(raw) {
                Some(255 + libc::WTERMSIG(raw) as u32)
            } else {
                None
            }
        }

        /// Returns the signal number if the process was killed by a signal.
        pub fn signal(&self) -> Option<i32> {
            let raw = self.0?;
            libc::WIFSIGNALED(raw).then(|| libc::WTERMSIG(raw))
        }
    }

    impl fmt::Display for ExitStatus {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self.0 {
                Some(raw) if libc::WIFEXITED(raw) => {
                    write!(f, "exit code {}", libc::WEXITSTATUS(raw))
                }
                Some(raw) if libc::WIFSIGNALED(raw) => {
                    write!(f, "signal {}", libc::WTERMSIG(raw))
                }
                Some(raw) => {
                    write!(f, "unrecognized wait status: {} {:#x}", raw, raw)
                }
                None => write!(f, "undetermined exit status"),
            }
        }
    }

    impl fmt::Debug for ExitStatus {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self.0 {
                Some(raw) if libc::WIFEXITED(raw) => {
                    write!(f, "ExitStatus(Exited({}))", libc::WEXITSTATUS(raw))
                }
                Some(raw) if libc::WIFSIGNALED(raw) => {
                    write!(f, "ExitStatus(Signal({}))", libc::WTERMSIG(raw))
                }
                Some(raw) => {
                    write!(f, "ExitStatus(Unknown({} {:#x}))", raw, raw)
                }
                None => write!(f, "ExitStatus(Undetermined)"),
            }
        }
    }

    impl InnerProcess {
        pub(super) fn os_try_wait(&self) -> io::Result<Option<ExitStatus>> {
            match self.ext {
                ExtProcessState::Child => self.try_reap(),
                ExtProcessState::Attached => Ok((!posix::pid_exists(self.pid)?)
                    .then(ExitStatus::undetermined)),
            }
        }

        pub(super) fn os_wait(&self) -> io::Result<ExitStatus> {
            match self.ext {
                ExtProcessState::Child => loop {
                    // Block without the state lock and leave the child unreaped; only
                    // the lock holder reaps.
                    posix::wait_exited(self.pid)?;
                    if let Some(status) = self.os_poll()? {
                        return Ok(status);
                    }
                },
                ExtProcessState::Attached => loop {
                    if let Some(status) = self.os_poll()? {
                        return Ok(status);
                    }
                    thread::sleep(WAIT_POLL_INTERVAL);
                },
            }
        }

        fn try_reap(&self) -> io::Result<Option<ExitStatus>> {
            match posix::waitpid(self.pid, posix::WNOHANG) {
                Ok((pid_out, exit_status)) if pid_out == self.pid => Ok(Some(exit_status)),
                Ok(_) => Ok(None),
                // Someone else waited for the child. The PID no longer exists and we
                // cannot find its exit status.
                Err(e) if e.raw_os_error() == Some(posix::ECHILD) => {
                    Ok(Some(ExitStatus::undetermined()))
                }
                Err(e) => Err(e),
            }
        }

        pub(super) fn os_kill(&self, signal: i32) -> Result<()> {
            posix::kill(self.pid, signal).map_err(Error::control("sending signal"))
        }
    }

    impl Drop for InnerProcess {
        fn drop(&mut self) {
            let state = self
                .state
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner);
            if let (ProcessState::Running, ExtProcessState::Child) = (*state, &self.ext) {
                // Reap a child that already exited, without waiting for one that hasn't.
                let _ = posix::waitpid(self.pid, posix::WNOHANG);
            }
        }
    }
}

#[cfg(windows)]
mod os {
    use std::io;

    use super::*;
    use crate::signal::{SIGKILL, SIGTERM};
    use crate::{ctrl_event, win32};

    pub type RawExitStatus = u32;

    #[derive(Debug)]
    pub struct ExtProcessState {
        pub handle: win32::Handle,
        /// Created by this library, as opposed to attached to by PID.
        pub spawned: bool,
        /// Running in a console of its own, which the parent can't signal directly.
        pub new_console: bool,
    }

    pub fn attach(pid: u32) -> io::Result<ExtProcessState> {
        Ok(ExtProcessState {
            handle: win32::OpenProcess(pid)?,
            spawned: false,
            new_console: false,
        })
    }

    impl ExitStatus {
        /// Returns the exit code of the process.
        pub fn code(&self) -> Option<u32> {
            self.0
        }

        /// Returns the signal number if the process was killed by a signal.
        ///
        /// On Windows, this always returns `None`.
        pub fn signal(&self) -> Option<i32> {
            None
        }
    }

    impl fmt::Display for ExitStatus {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self.0 {
                Some(code) => write!(f, "exit code {}", code),
                None => write!(f, "undetermined exit status"),
            }
        }
    }

    impl fmt::Debug for ExitStatus {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self.0 {
                Some(code) => write!(f, "ExitStatus(Exited({}))", code),
                None => write!(f, "ExitStatus(Undetermined)"),
            }
        }
    }

    impl InnerProcess {
        // The process handle is signalled on exit, which keeps a real exit code of 259
        // from being mistaken for STILL_ACTIVE.
        pub(super) fn os_try_wait(&self) -> io::Result<Option<ExitStatus>> {
            match win32::WaitForSingleObject(&self.ext.handle, Some(Duration::ZERO))? {
                win32::WaitEvent::OBJECT_0 => {
                    let code = win32::GetExitCodeProcess(&self.ext.handle)?;
                    Ok(Some(ExitStatus::from_raw(code)))
                }
                _ => Ok(None),
            }
        }

        pub(super) fn os_wait(&self) -> io::Result<ExitStatus> {
            // Wait without holding the lock; the handle is immutable.
            let event = win32::WaitForSingleObject(&self.ext.handle, None)?;
            if let win32::WaitEvent::OBJECT_0 = event {
                let mut state = lock(&self.state);
                if let ProcessState::Finished(status) = *state {
                    return Ok(status);
                }
                let status = ExitStatus::from_raw(win32::GetExitCodeProcess(&self.ext.handle)?);
                *state = ProcessState::Finished(status);
                Ok(status)
            } else {
                Err(io::Error::other(
                    "process handle was not signalled after an infinite wait",
                ))
            }
        }

        pub(super) fn os_kill(&self, signal: i32) -> Result<()> {
            match signal {
                SIGKILL | SIGTERM => self
                    .terminate_process()
                    .map_err(Error::control("terminating process")),
                other => match ctrl_event::event_for(other) {
                    Some(_) if !self.ext.spawned => Err(Error::usage(
                        "break events can only be sent to processes spawned by this library",
                    )),
                    Some(event) if self.ext.new_console => ctrl_event::send(&[self.pid], event),
                    Some(event) => win32::GenerateConsoleCtrlEvent(event, self.pid)
                        .map_err(Error::control("generating console break event")),
                    None => Err(Error::usage(format!(
                        "signal {other} is not supported on Windows; \
                         use SIGINT, SIGBREAK, SIGTERM or SIGKILL"
                    ))),
                },
            }
        }

        fn terminate_process(&self) -> io::Result<()> {
            let mut state = lock(&self.state);
            if let ProcessState::Running = *state
                && let Err(err) = win32::TerminateProcess(&self.ext.handle, 1)
            {
                if err.raw_os_error() != Some(win32::ERROR_ACCESS_DENIED as i32) {
                    return Err(err);
                }
                // Access is denied when the process is already exiting.
                let rc = win32::GetExitCodeProcess(&self.ext.handle)?;
                if rc == win32::STILL_ACTIVE {
                    return Err(err);
                }
                *state = ProcessState::Finished(ExitStatus::from_raw(rc));
            }
            Ok(())
        }
    }
}
