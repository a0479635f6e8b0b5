//! Spawning and controlling child processes.
//!
//! The crate starts programs with full control over their standard streams, lets the
//! parent talk to them through [`Stream`]s, and manages them individually through
//! [`Process`] or together through [`ProcessGroup`]. The same API works on Unix and
//! Windows; where the platforms differ (signals, users), the differences are
//! documented on the affected methods.
//!
//! # Examples
//!
//! Run a program and read its output:
//!
//! ```no_run
//! # use proctl::Command;
//! # fn dummy() -> proctl::Result<()> {
//! let process = Command::new("echo").arg("hello").spawn()?;
//! let line = process.stdout()?.unwrap().read_line(false)?;
//! assert_eq!(line, b"hello");
//! assert!(process.wait()?.success());
//! # Ok(())
//! # }
//! ```
//!
//! Redirect stdout and stderr to a single file and ignore stdin:
//!
//! ```no_run
//! # use proctl::{Command, Stdio};
//! # fn dummy() -> proctl::Result<()> {
//! let process = Command::new("make")
//!     .stdin(Stdio::Ignore)
//!     .output(Stdio::path("build.log"))
//!     .spawn()?;
//! process.wait()?;
//! # Ok(())
//! # }
//! ```
//!
//! Start several workers in one process group and stop them together:
//!
//! ```no_run
//! # use proctl::{Command, ProcessGroup, signal};
//! # fn dummy() -> proctl::Result<()> {
//! let group = ProcessGroup::new()?;
//! let workers = (0..4)
//!     .map(|_| Command::new("worker").process_group(&group).spawn())
//!     .collect::<proctl::Result<Vec<_>>>()?;
//! group.kill(signal::SIGTERM)?;
//! for worker in &workers {
//!     worker.wait()?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Logging goes through the `tracing` facade; the crate never installs a subscriber.

mod channel;
#[cfg(windows)]
mod ctrl_event;
mod error;
mod group;
#[cfg(unix)]
mod posix;
mod process;
pub mod signal;
mod spawn;
mod stream;
#[cfg(windows)]
mod win32;

#[cfg(test)]
mod tests;

pub use channel::{Stdio, StdioInfo, StdioKind};
pub use error::{Error, Result};
pub use group::ProcessGroup;
pub use process::{ExitStatus, Process};
pub use spawn::Command;
pub use stream::Stream;

/// Unix-specific extensions.
#[cfg(unix)]
pub mod unix {
    pub use crate::spawn::unix::*;
}

/// Windows-specific extensions.
#[cfg(windows)]
pub mod windows {
    pub use crate::spawn::windows::*;
}
