use std::env;
use std::ffi::{CStr, CString, OsStr, OsString};
use std::fs::File;
use std::io;
use std::mem::MaybeUninit;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{FromRawFd, RawFd};
use std::ptr;

use crate::process::ExitStatus;

pub use libc::{ECHILD, ESRCH};

const DEFAULT_PATH: &str = "/usr/local/bin:/bin:/usr/bin";
const NAME_MAX: usize = 255;

fn check_err<T: Ord + Default>(num: T) -> io::Result<T> {
    if num < T::default() {
        return Err(io::Error::last_os_error());
    }
    Ok(num)
}

/// Create a pipe whose both ends are close-on-exec.
///
/// Child ends become visible to the child only through `dup2` onto 0/1/2, which clears
/// the flag on the new descriptor.
pub fn pipe() -> io::Result<(File, File)> {
    let mut fds = [0 as libc::c_int; 2];
    check_err(unsafe { libc::pipe(fds.as_mut_ptr()) })?;
    let (read, write) = unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) };
    set_cloexec(fds[0], true)?;
    set_cloexec(fds[1], true)?;
    Ok((read, write))
}

/// Returns `Some(child_pid)` in the parent and `None` in the child.
///
/// # Safety
///
/// The child may only call async-signal-safe functions before exec or `_exit`.
pub unsafe fn fork() -> io::Result<Option<u32>> {
    let pid = check_err(unsafe { libc::fork() })?;
    if pid == 0 {
        Ok(None)
    } else {
        Ok(Some(pid as u32))
    }
}

pub fn os_to_cstring(s: &OsStr) -> io::Result<CString> {
    CString::new(s.as_bytes()).map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))
}

struct CVec {
    // Individual C strings; they are not unused as rustc thinks, they are pointed to by
    // elements of self.ptrs.
    #[allow(dead_code)]
    strings: Vec<CString>,

    // nullptr-terminated vector of pointers to data inside self.strings.
    ptrs: Vec<*const libc::c_char>,
}

impl CVec {
    fn new(slice: &[impl AsRef<OsStr>]) -> io::Result<CVec> {
        let strings = slice
            .iter()
            .map(|x| os_to_cstring(x.as_ref()))
            .collect::<io::Result<Vec<CString>>>()?;
        let ptrs = strings
            .iter()
            .map(|s| s.as_ptr())
            .chain(std::iter::once(ptr::null()))
            .collect();
        Ok(CVec { strings, ptrs })
    }

    fn as_c_vec(&self) -> *const *const libc::c_char {
        self.ptrs.as_ptr()
    }
}

/// Prepare everything exec needs, so the child does not allocate after fork.
///
/// A command without a `/` is looked up in the parent's `PATH` the way `execvp` does
/// it: every entry is tried in order, `EACCES` is remembered if seen, and `ENOENT` is
/// reported otherwise. The returned closure only returns if every exec attempt failed.
pub fn prep_exec(
    cmd: &OsStr,
    argv: &[OsString],
    env: Option<&[OsString]>,
) -> io::Result<impl FnOnce() -> io::Error + use<>> {
    let argvec = CVec::new(argv)?;
    let envvec = env.map(CVec::new).transpose()?;

    let bytes = cmd.as_bytes();
    let mut early_errno = None;
    let mut candidates = vec![];
    if bytes.is_empty() {
        early_errno = Some(libc::ENOENT);
    } else if bytes.contains(&b'/') {
        candidates.push(os_to_cstring(cmd)?);
    } else if bytes.len() > NAME_MAX {
        early_errno = Some(libc::ENAMETOOLONG);
    } else {
        let path = env::var_os("PATH").unwrap_or_else(|| DEFAULT_PATH.into());
        for dir in env::split_paths(&path) {
            candidates.push(os_to_cstring(dir.join(cmd).as_os_str())?);
        }
    }

    Ok(move || {
        if let Some(errno) = early_errno {
            return io::Error::from_raw_os_error(errno);
        }
        let mut seen_eacces = false;
        let mut last = io::Error::from_raw_os_error(libc::ENOENT);
        for exe in &candidates {
            unsafe {
                match &envvec {
                    Some(envvec) => {
                        libc::execve(exe.as_ptr(), argvec.as_c_vec(), envvec.as_c_vec())
                    }
                    None => libc::execv(exe.as_ptr(), argvec.as_c_vec()),
                };
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EACCES) => seen_eacces = true,
                Some(libc::ENOENT) | Some(libc::ENOTDIR) => (),
                _ => return err,
            }
            last = err;
        }
        if seen_eacces {
            io::Error::from_raw_os_error(libc::EACCES)
        } else {
            last
        }
    })
}

pub fn _exit(status: u8) -> ! {
    unsafe { libc::_exit(status as libc::c_int) }
}

pub const WNOHANG: i32 = libc::WNOHANG;

pub fn waitpid(pid: u32, flags: i32) -> io::Result<(u32, ExitStatus)> {
    let mut status = 0 as libc::c_int;
    let pid = loop {
        match check_err(unsafe {
            libc::waitpid(pid as libc::pid_t, &mut status as *mut libc::c_int, flags)
        }) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => break other?,
        }
    };
    Ok((pid as u32, ExitStatus::from_raw(status)))
}

/// Block until the child `pid` has exited, without reaping it.
///
/// Returns immediately if the child was already reaped by someone else.
pub fn wait_exited(pid: u32) -> io::Result<()> {
    loop {
        let mut info = MaybeUninit::<libc::siginfo_t>::zeroed();
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                pid as libc::id_t,
                info.as_mut_ptr(),
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        match check_err(rc) {
            Ok(_) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.raw_os_error() == Some(ECHILD) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

pub fn kill(pid: u32, signal: i32) -> io::Result<()> {
    check_err(unsafe { libc::kill(pid as libc::pid_t, signal) })?;
    Ok(())
}

pub fn killpg(pgid: u32, signal: i32) -> io::Result<()> {
    check_err(unsafe { libc::killpg(pgid as libc::pid_t, signal) })?;
    Ok(())
}

/// Check whether a process with the given PID exists, using the null signal.
///
/// A process we may not signal still exists, so `EPERM` counts as alive.
pub fn pid_exists(pid: u32) -> io::Result<bool> {
    match kill(pid, 0) {
        Ok(()) => Ok(true),
        Err(e) if e.raw_os_error() == Some(libc::EPERM) => Ok(true),
        Err(e) if e.raw_os_error() == Some(libc::ESRCH) => Ok(false),
        Err(e) => Err(e),
    }
}

pub fn setpgid(pid: u32, pgid: u32) -> io::Result<()> {
    check_err(unsafe { libc::setpgid(pid as _, pgid as _) })?;
    Ok(())
}

pub fn setuid(uid: u32) -> io::Result<()> {
    check_err(unsafe { libc::setuid(uid as libc::uid_t) })?;
    Ok(())
}

pub fn setgid(gid: u32) -> io::Result<()> {
    check_err(unsafe { libc::setgid(gid as libc::gid_t) })?;
    Ok(())
}

pub fn initgroups(user: &CStr, gid: u32) -> io::Result<()> {
    check_err(unsafe { libc::initgroups(user.as_ptr(), gid as _) })?;
    Ok(())
}

pub fn chdir(dir: &CStr) -> io::Result<()> {
    check_err(unsafe { libc::chdir(dir.as_ptr()) })?;
    Ok(())
}

pub fn dup2(oldfd: RawFd, newfd: RawFd) -> io::Result<()> {
    check_err(unsafe { libc::dup2(oldfd, newfd) })?;
    Ok(())
}

pub fn fcntl(fd: RawFd, cmd: i32, arg1: Option<i32>) -> io::Result<i32> {
    check_err(unsafe {
        match arg1 {
            Some(arg1) => libc::fcntl(fd, cmd, arg1),
            None => libc::fcntl(fd, cmd),
        }
    })
}

pub fn set_cloexec(fd: RawFd, cloexec: bool) -> io::Result<()> {
    let old = fcntl(fd, libc::F_GETFD, None)?;
    let new = if cloexec {
        old | libc::FD_CLOEXEC
    } else {
        old & !libc::FD_CLOEXEC
    };
    if new != old {
        fcntl(fd, libc::F_SETFD, Some(new))?;
    }
    Ok(())
}

pub fn set_nonblocking(fd: RawFd, nonblocking: bool) -> io::Result<()> {
    let old = fcntl(fd, libc::F_GETFL, None)?;
    let new = if nonblocking {
        old | libc::O_NONBLOCK
    } else {
        old & !libc::O_NONBLOCK
    };
    if new != old {
        fcntl(fd, libc::F_SETFL, Some(new))?;
    }
    Ok(())
}

pub fn is_nonblocking(fd: RawFd) -> io::Result<bool> {
    Ok(fcntl(fd, libc::F_GETFL, None)? & libc::O_NONBLOCK != 0)
}

pub fn reset_sigpipe() -> io::Result<()> {
    // This is called after forking to reset SIGPIPE handling to the defaults that Unix
    // programs expect. libstd ignores SIGPIPE, and signal-handling libraries often set a
    // mask. Child processes inherit ignored signals and the signal mask from their
    // parent, but most Unix programs do not reset these things on their own.
    unsafe {
        let mut set = MaybeUninit::<libc::sigset_t>::uninit();
        check_err(libc::sigemptyset(set.as_mut_ptr()))?;
        let rc = libc::pthread_sigmask(libc::SIG_SETMASK, set.as_ptr(), ptr::null_mut());
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        if libc::signal(libc::SIGPIPE, libc::SIG_DFL) == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Account data needed to impersonate a user in the child.
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub name: CString,
    pub uid: u32,
    pub gid: u32,
}

/// Look up a user by name in the password database.
///
/// Returns `Ok(None)` if no such user exists.
pub fn lookup_user(name: &OsStr) -> io::Result<Option<UserInfo>> {
    let cname = os_to_cstring(name)?;
    let mut buf: Vec<libc::c_char> = vec![0; 1024];
    loop {
        let mut pwd = MaybeUninit::<libc::passwd>::uninit();
        let mut result: *mut libc::passwd = ptr::null_mut();
        let rc = unsafe {
            libc::getpwnam_r(
                cname.as_ptr(),
                pwd.as_mut_ptr(),
                buf.as_mut_ptr(),
                buf.len(),
                &mut result,
            )
        };
        match rc {
            0 if result.is_null() => return Ok(None),
            0 => {
                let pwd = unsafe { pwd.assume_init() };
                return Ok(Some(UserInfo {
                    name: cname,
                    uid: pwd.pw_uid as u32,
                    gid: pwd.pw_gid as u32,
                }));
            }
            libc::ERANGE if buf.len() < 1 << 20 => {
                let len = buf.len() * 2;
                buf.resize(len, 0);
            }
            // Some libcs report a missing entry as an error instead of a null result.
            libc::ENOENT | libc::ESRCH | libc::EBADF | libc::EPERM => return Ok(None),
            rc => return Err(io::Error::from_raw_os_error(rc)),
        }
    }
}
