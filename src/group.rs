use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::process::{InnerProcess, Process};

/// A set of processes that can be signalled together.
///
/// On Unix a group is a POSIX process group: the first process spawned into it becomes
/// the leader and its PID is the group ID. On Windows a group is a Job Object, and
/// break events are delivered through the members' consoles.
///
/// A group is cheaply cloneable; clones refer to the same group. Processes spawned into
/// a group keep it alive, while the group only weakly refers back to its members.
#[derive(Clone)]
pub struct ProcessGroup(Arc<InnerGroup>);

struct InnerGroup {
    ext: os::ExtGroupState,
    members: Mutex<Vec<Member>>,
    closed: AtomicBool,
}

struct Member {
    pid: u32,
    process: Weak<InnerProcess>,
}

impl ProcessGroup {
    /// Create a new, empty process group.
    pub fn new() -> Result<ProcessGroup> {
        let ext = os::new_group().map_err(Error::resource("creating process group"))?;
        let group = ProcessGroup::from_ext(ext);
        debug!(%group, "created process group");
        Ok(group)
    }

    /// Refer to an existing group by the PID of its leader.
    ///
    /// On Unix this is the process group whose ID is `pid`. On Windows there is no job
    /// object to attach to, so the group signals the processes joined to it one by one.
    pub fn attach(pid: u32) -> Result<ProcessGroup> {
        let group = ProcessGroup::from_ext(os::attach_group(pid));
        debug!(%group, "attached to process group");
        Ok(group)
    }

    fn from_ext(ext: os::ExtGroupState) -> ProcessGroup {
        ProcessGroup(Arc::new(InnerGroup {
            ext,
            members: Mutex::new(vec![]),
            closed: AtomicBool::new(false),
        }))
    }

    /// The OS identifier of the group, if it has one.
    ///
    /// On Unix this is the PGID, known once the first member has been spawned. On
    /// Windows groups have no numeric identifier and this always returns `None`.
    pub fn id(&self) -> Option<u32> {
        self.0.ext.id()
    }

    /// True once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.0.closed.load(Ordering::Acquire)
    }

    /// Register an existing process as a member of the group.
    ///
    /// This does not move the process into the OS-level group; it only makes the group
    /// track it, which is how attached processes are added to an attached group.
    pub fn join(&self, process: &Process) -> Result<()> {
        if self.is_closed() {
            return Err(Error::usage("process group is closed"));
        }
        self.register(process);
        Ok(())
    }

    pub(crate) fn register(&self, process: &Process) {
        self.0.ext.note_member(process.pid());
        let mut members = self.0.members.lock().unwrap_or_else(PoisonError::into_inner);
        members.retain(|m| m.process.strong_count() > 0);
        members.push(Member {
            pid: process.pid(),
            process: process.downgrade(),
        });
        trace!(group = %self, pid = process.pid(), "registered group member");
    }

    /// The member processes still alive in this program.
    pub fn members(&self) -> Vec<Process> {
        self.0
            .members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|m| m.process.upgrade())
            .map(Process::from_inner)
            .collect()
    }

    fn member_pids(&self) -> Vec<u32> {
        self.0
            .members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|m| m.pid)
            .collect()
    }

    /// Send `signal` to every process in the group.
    ///
    /// On Windows `SIGKILL` and `SIGTERM` terminate the whole job, while `SIGINT` and
    /// `SIGBREAK` both deliver a Ctrl+Break event to the members' console, since Ctrl+C
    /// is disabled for spawned processes. Other signals are rejected there.
    pub fn kill(&self, signal: i32) -> Result<()> {
        if self.is_closed() {
            return Err(Error::usage("process group is closed"));
        }
        debug!(group = %self, signal, "signalling process group");
        self.os_kill(signal)
    }

    /// Release the group's OS resources. Members keep running.
    ///
    /// Afterwards the group can no longer be joined or signalled. Closing twice does
    /// nothing.
    pub fn close(&self) {
        if !self.0.closed.swap(true, Ordering::AcqRel) {
            self.0.ext.close();
            debug!(group = %self, "closed process group");
        }
    }
}

impl fmt::Display for ProcessGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => write!(f, "process group ({id})"),
            None => write!(f, "process group ({:p})", Arc::as_ptr(&self.0)),
        }
    }
}

impl fmt::Debug for ProcessGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessGroup")
            .field("id", &self.id())
            .field("members", &self.member_pids())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(unix)]
mod os {
    use std::io;
    use std::sync::OnceLock;

    use super::*;
    use crate::posix;

    pub struct ExtGroupState {
        pgid: OnceLock<u32>,
    }

    pub fn new_group() -> io::Result<ExtGroupState> {
        Ok(ExtGroupState {
            pgid: OnceLock::new(),
        })
    }

    pub fn attach_group(pid: u32) -> ExtGroupState {
        ExtGroupState {
            pgid: OnceLock::from(pid),
        }
    }

    impl ExtGroupState {
        pub fn id(&self) -> Option<u32> {
            self.pgid.get().copied()
        }

        // The first process spawned into a group leads it.
        pub fn note_member(&self, pid: u32) {
            let _ = self.pgid.set(pid);
        }

        pub fn close(&self) {}
    }

    impl ProcessGroup {
        /// The PGID a child spawned into this group should join, with 0 meaning "lead a
        /// new group".
        pub(crate) fn spawn_pgid(&self) -> u32 {
            self.id().unwrap_or(0)
        }

        pub(super) fn os_kill(&self, signal: i32) -> Result<()> {
            match self.id() {
                Some(pgid) => posix::killpg(pgid, signal)
                    .map_err(Error::control("signalling process group")),
                // No member was ever spawned, so there is nobody to signal.
                None => Ok(()),
            }
        }
    }
}

#[cfg(windows)]
mod os {
    use std::io;
    use std::sync::Mutex;

    use super::*;
    use crate::signal::{SIGKILL, SIGTERM};
    use crate::{ctrl_event, win32};

    pub struct ExtGroupState {
        job: Mutex<Option<win32::Handle>>,
    }

    pub fn new_group() -> io::Result<ExtGroupState> {
        Ok(ExtGroupState {
            job: Mutex::new(Some(win32::CreateJobObject()?)),
        })
    }

    pub fn attach_group(_pid: u32) -> ExtGroupState {
        ExtGroupState {
            job: Mutex::new(None),
        }
    }

    impl ExtGroupState {
        pub fn id(&self) -> Option<u32> {
            None
        }

        pub fn note_member(&self, _pid: u32) {}

        pub fn close(&self) {
            self.job.lock().unwrap_or_else(PoisonError::into_inner).take();
        }
    }

    impl ProcessGroup {
        /// True if children spawned into this group must be assigned to a job object.
        pub(crate) fn has_job(&self) -> bool {
            self.0
                .ext
                .job
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some()
        }

        /// Put a freshly created, still suspended process into the group's job object.
        pub(crate) fn assign(&self, process: &win32::Handle) -> io::Result<()> {
            match &*self.0.ext.job.lock().unwrap_or_else(PoisonError::into_inner) {
                Some(job) => win32::AssignProcessToJobObject(job, process),
                None => Ok(()),
            }
        }

        pub(super) fn os_kill(&self, signal: i32) -> Result<()> {
            match signal {
                SIGKILL | SIGTERM => self.terminate(),
                other => match ctrl_event::event_for(other) {
                    Some(event) => ctrl_event::send(&self.member_pids(), event),
                    None => Err(Error::usage(format!(
                        "signal {other} cannot be sent to a process group on Windows; \
                         use SIGINT, SIGBREAK, SIGTERM or SIGKILL"
                    ))),
                },
            }
        }

        fn terminate(&self) -> Result<()> {
            if let Some(job) = &*self.0.ext.job.lock().unwrap_or_else(PoisonError::into_inner) {
                return win32::TerminateJobObject(job, 1)
                    .map_err(Error::control("terminating job object"));
            }
            // Without a job object, terminate the members one at a time, stopping at the
            // first failure.
            for process in self.members() {
                process.kill(SIGKILL)?;
            }
            Ok(())
        }
    }
}
