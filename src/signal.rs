//! Signal numbers accepted by [`Process::kill`] and [`ProcessGroup::kill`].
//!
//! On Unix these are the native signal numbers and any other signal can be passed as
//! well. On Windows only the four constants defined here are meaningful.
//!
//! [`Process::kill`]: crate::Process::kill
//! [`ProcessGroup::kill`]: crate::ProcessGroup::kill

#[cfg(unix)]
pub use libc::{SIGHUP, SIGINT, SIGKILL, SIGQUIT, SIGTERM, SIGUSR1, SIGUSR2};

/// Interrupt: a Ctrl+C console event on Windows.
#[cfg(windows)]
pub const SIGINT: i32 = 2;

/// Forced termination: `TerminateProcess` or `TerminateJobObject` on Windows.
#[cfg(windows)]
pub const SIGKILL: i32 = 9;

/// Termination: same as `SIGKILL` on Windows.
#[cfg(windows)]
pub const SIGTERM: i32 = 15;

/// A Ctrl+Break console event.
#[cfg(windows)]
pub const SIGBREAK: i32 = 21;
