#![allow(non_snake_case, non_camel_case_types)]

use std::ffi::OsStr;
use std::fs::File;
use std::io;
use std::iter;
use std::mem;
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::{AsRawHandle, FromRawHandle, RawHandle};
use std::ptr;
use std::time::Duration;

use winapi::shared::minwindef::{BOOL, DWORD, FALSE, LPVOID, TRUE};
use winapi::um::fileapi;
use winapi::um::handleapi::{self, INVALID_HANDLE_VALUE};
use winapi::um::jobapi2;
use winapi::um::minwinbase::SECURITY_ATTRIBUTES;
use winapi::um::namedpipeapi;
use winapi::um::processenv;
use winapi::um::processthreadsapi::{self, PROCESS_INFORMATION, STARTUPINFOW};
use winapi::um::synchapi;
use winapi::um::winbase;
use winapi::um::wincon;
use winapi::um::winnt::{self, HANDLE};

pub use winapi::shared::winerror::{ERROR_ACCESS_DENIED, ERROR_NO_DATA, ERROR_SHARING_VIOLATION};
pub use winapi::um::winbase::{
    CREATE_NEW_CONSOLE, CREATE_NEW_PROCESS_GROUP, CREATE_NO_WINDOW, CREATE_SUSPENDED,
    CREATE_UNICODE_ENVIRONMENT, STARTF_USESTDHANDLES,
};
pub use winapi::um::wincon::CTRL_BREAK_EVENT;

pub const STILL_ACTIVE: u32 = 259;
pub const HANDLE_FLAG_INHERIT: u32 = 1;

/// An owned kernel handle, closed on drop.
#[derive(Debug)]
pub struct Handle(RawHandle);

// Kernel handles are process-wide and may be used from any thread.
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

impl Drop for Handle {
    fn drop(&mut self) {
        unsafe {
            handleapi::CloseHandle(self.0 as HANDLE);
        }
    }
}

impl AsRawHandle for Handle {
    fn as_raw_handle(&self) -> RawHandle {
        self.0
    }
}

impl FromRawHandle for Handle {
    unsafe fn from_raw_handle(handle: RawHandle) -> Handle {
        Handle(handle)
    }
}

fn check(status: BOOL) -> io::Result<()> {
    if status != 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

fn check_handle(raw_handle: HANDLE) -> io::Result<HANDLE> {
    if raw_handle != INVALID_HANDLE_VALUE && !raw_handle.is_null() {
        Ok(raw_handle)
    } else {
        Err(io::Error::last_os_error())
    }
}

// OsStr to zero-terminated owned vector
fn to_nullterm(s: &OsStr) -> Vec<u16> {
    s.encode_wide().chain(iter::once(0u16)).collect()
}

pub fn CreatePipe(inherit_handle: bool) -> io::Result<(File, File)> {
    let mut attributes = SECURITY_ATTRIBUTES {
        nLength: mem::size_of::<SECURITY_ATTRIBUTES>() as DWORD,
        lpSecurityDescriptor: ptr::null_mut(),
        bInheritHandle: inherit_handle as BOOL,
    };
    let (mut r, mut w) = (ptr::null_mut(), ptr::null_mut());
    check(unsafe { namedpipeapi::CreatePipe(&mut r, &mut w, &mut attributes, 0) })?;
    Ok(unsafe {
        (
            File::from_raw_handle(r as RawHandle),
            File::from_raw_handle(w as RawHandle),
        )
    })
}

pub fn SetHandleInformation(handle: &impl AsRawHandle, dwMask: u32, dwFlags: u32) -> io::Result<()> {
    check(unsafe {
        handleapi::SetHandleInformation(handle.as_raw_handle() as HANDLE, dwMask, dwFlags)
    })
}

/// Switch an anonymous pipe end between `PIPE_WAIT` and `PIPE_NOWAIT`.
pub fn SetPipeNoWait(handle: &impl AsRawHandle, nowait: bool) -> io::Result<()> {
    let mut mode: DWORD = winbase::PIPE_READMODE_BYTE
        | if nowait {
            winbase::PIPE_NOWAIT
        } else {
            winbase::PIPE_WAIT
        };
    check(unsafe {
        namedpipeapi::SetNamedPipeHandleState(
            handle.as_raw_handle() as HANDLE,
            &mut mode,
            ptr::null_mut(),
            ptr::null_mut(),
        )
    })
}

/// Whether an anonymous pipe end is in `PIPE_NOWAIT` mode.
pub fn GetPipeNoWait(handle: &impl AsRawHandle) -> io::Result<bool> {
    let mut state: DWORD = 0;
    check(unsafe {
        namedpipeapi::GetNamedPipeHandleStateW(
            handle.as_raw_handle() as HANDLE,
            &mut state,
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            0,
        )
    })?;
    Ok(state & winbase::PIPE_NOWAIT != 0)
}

pub fn IsPipe(handle: &impl AsRawHandle) -> bool {
    unsafe { fileapi::GetFileType(handle.as_raw_handle() as HANDLE) == winbase::FILE_TYPE_PIPE }
}

fn raw_or_null(handle: Option<RawHandle>) -> HANDLE {
    handle.map(|h| h as HANDLE).unwrap_or(ptr::null_mut())
}

fn startup_info(
    stdin: Option<RawHandle>,
    stdout: Option<RawHandle>,
    stderr: Option<RawHandle>,
    sinfo_flags: u32,
) -> STARTUPINFOW {
    let mut sinfo: STARTUPINFOW = unsafe { mem::zeroed() };
    sinfo.cb = mem::size_of::<STARTUPINFOW>() as DWORD;
    sinfo.hStdInput = raw_or_null(stdin);
    sinfo.hStdOutput = raw_or_null(stdout);
    sinfo.hStdError = raw_or_null(stderr);
    sinfo.dwFlags = sinfo_flags;
    sinfo
}

/// A freshly created process: its handle, its primary thread and its PID.
pub struct CreatedProcess {
    pub process: Handle,
    pub thread: Handle,
    pub pid: u32,
}

fn created(pinfo: PROCESS_INFORMATION) -> CreatedProcess {
    unsafe {
        CreatedProcess {
            process: Handle::from_raw_handle(pinfo.hProcess as RawHandle),
            thread: Handle::from_raw_handle(pinfo.hThread as RawHandle),
            pid: pinfo.dwProcessId,
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn CreateProcess(
    appname: Option<&OsStr>,
    cmdline: &OsStr,
    env_block: Option<&[u16]>,
    cwd: Option<&OsStr>,
    inherit_handles: bool,
    creation_flags: u32,
    stdin: Option<RawHandle>,
    stdout: Option<RawHandle>,
    stderr: Option<RawHandle>,
    sinfo_flags: u32,
) -> io::Result<CreatedProcess> {
    let mut sinfo = startup_info(stdin, stdout, stderr, sinfo_flags);
    let mut pinfo: PROCESS_INFORMATION = unsafe { mem::zeroed() };
    let mut cmdline = to_nullterm(cmdline);
    let wc_appname = appname.map(to_nullterm);
    let wc_cwd = cwd.map(to_nullterm);
    check(unsafe {
        processthreadsapi::CreateProcessW(
            wc_appname.as_ref().map(|v| v.as_ptr()).unwrap_or(ptr::null()),
            cmdline.as_mut_ptr(),
            ptr::null_mut(),                 // lpProcessAttributes
            ptr::null_mut(),                 // lpThreadAttributes
            inherit_handles as BOOL,         // bInheritHandles
            creation_flags,                  // dwCreationFlags
            env_block
                .map(|b| b.as_ptr() as LPVOID)
                .unwrap_or(ptr::null_mut()), // lpEnvironment
            wc_cwd.as_ref().map(|v| v.as_ptr()).unwrap_or(ptr::null()),
            &mut sinfo,
            &mut pinfo,
        )
    })?;
    Ok(created(pinfo))
}

/// Create a process running as another user.
///
/// The standard handles given in the startup info are passed to the child unchanged.
#[allow(clippy::too_many_arguments)]
pub fn CreateProcessWithLogon(
    username: &OsStr,
    password: &OsStr,
    cmdline: &OsStr,
    env_block: Option<&[u16]>,
    cwd: Option<&OsStr>,
    creation_flags: u32,
    stdin: Option<RawHandle>,
    stdout: Option<RawHandle>,
    stderr: Option<RawHandle>,
    sinfo_flags: u32,
) -> io::Result<CreatedProcess> {
    let mut sinfo = startup_info(stdin, stdout, stderr, sinfo_flags);
    let mut pinfo: PROCESS_INFORMATION = unsafe { mem::zeroed() };
    let mut cmdline = to_nullterm(cmdline);
    let wc_user = to_nullterm(username);
    let wc_password = to_nullterm(password);
    let wc_cwd = cwd.map(to_nullterm);
    check(unsafe {
        winbase::CreateProcessWithLogonW(
            wc_user.as_ptr(),
            ptr::null(), // lpDomain
            wc_password.as_ptr(),
            winbase::LOGON_WITH_PROFILE,
            ptr::null(), // lpApplicationName
            cmdline.as_mut_ptr(),
            creation_flags,
            env_block
                .map(|b| b.as_ptr() as LPVOID)
                .unwrap_or(ptr::null_mut()),
            wc_cwd.as_ref().map(|v| v.as_ptr()).unwrap_or(ptr::null()),
            &mut sinfo,
            &mut pinfo,
        )
    })?;
    Ok(created(pinfo))
}

pub fn ResumeThread(thread: &Handle) -> io::Result<()> {
    let rc = unsafe { processthreadsapi::ResumeThread(thread.as_raw_handle() as HANDLE) };
    if rc == DWORD::MAX {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

pub fn OpenProcess(pid: u32) -> io::Result<Handle> {
    let access = winnt::PROCESS_TERMINATE
        | winnt::SYNCHRONIZE
        | winnt::PROCESS_QUERY_LIMITED_INFORMATION;
    let raw = check_handle(unsafe { processthreadsapi::OpenProcess(access, FALSE, pid) })?;
    Ok(unsafe { Handle::from_raw_handle(raw as RawHandle) })
}

pub enum WaitEvent {
    OBJECT_0,
    ABANDONED,
    TIMEOUT,
}

pub fn WaitForSingleObject(handle: &Handle, duration: Option<Duration>) -> io::Result<WaitEvent> {
    const WAIT_ABANDONED: u32 = 0x80;
    const WAIT_OBJECT_0: u32 = 0x0;
    const WAIT_FAILED: u32 = 0xFFFFFFFF;
    const WAIT_TIMEOUT: u32 = 0x102;
    const INFINITE: u32 = 0xFFFFFFFF;

    let millis = duration
        .map(|d| d.as_millis().min(INFINITE as u128 - 1) as u32)
        .unwrap_or(INFINITE);
    let result =
        unsafe { synchapi::WaitForSingleObject(handle.as_raw_handle() as HANDLE, millis) };
    match result {
        WAIT_OBJECT_0 => Ok(WaitEvent::OBJECT_0),
        WAIT_ABANDONED => Ok(WaitEvent::ABANDONED),
        WAIT_TIMEOUT => Ok(WaitEvent::TIMEOUT),
        WAIT_FAILED => Err(io::Error::last_os_error()),
        other => Err(io::Error::other(format!(
            "WaitForSingleObject returned {other}"
        ))),
    }
}

pub fn GetExitCodeProcess(handle: &Handle) -> io::Result<u32> {
    let mut exit_code = 0u32;
    check(unsafe {
        processthreadsapi::GetExitCodeProcess(handle.as_raw_handle() as HANDLE, &mut exit_code)
    })?;
    Ok(exit_code)
}

pub fn TerminateProcess(handle: &Handle, exit_code: u32) -> io::Result<()> {
    check(unsafe {
        processthreadsapi::TerminateProcess(handle.as_raw_handle() as HANDLE, exit_code)
    })
}

pub fn CreateJobObject() -> io::Result<Handle> {
    let raw = check_handle(unsafe { jobapi2::CreateJobObjectW(ptr::null_mut(), ptr::null()) })?;
    Ok(unsafe { Handle::from_raw_handle(raw as RawHandle) })
}

pub fn AssignProcessToJobObject(job: &Handle, process: &Handle) -> io::Result<()> {
    check(unsafe {
        jobapi2::AssignProcessToJobObject(
            job.as_raw_handle() as HANDLE,
            process.as_raw_handle() as HANDLE,
        )
    })
}

pub fn TerminateJobObject(job: &Handle, exit_code: u32) -> io::Result<()> {
    check(unsafe { jobapi2::TerminateJobObject(job.as_raw_handle() as HANDLE, exit_code) })
}

pub fn GenerateConsoleCtrlEvent(event: u32, process_group_id: u32) -> io::Result<()> {
    check(unsafe { wincon::GenerateConsoleCtrlEvent(event, process_group_id) })
}

/// Duplicate one of the current process's standard handles as an inheritable handle.
pub fn clone_standard_stream(which: u32) -> io::Result<File> {
    let id = match which {
        0 => winbase::STD_INPUT_HANDLE,
        1 => winbase::STD_OUTPUT_HANDLE,
        _ => winbase::STD_ERROR_HANDLE,
    };
    unsafe {
        let raw = check_handle(processenv::GetStdHandle(id))?;
        let mut new_raw = ptr::null_mut();
        let cur_proc = processthreadsapi::GetCurrentProcess();
        check(handleapi::DuplicateHandle(
            cur_proc,
            raw,
            cur_proc,
            &mut new_raw,
            0,
            TRUE,
            winnt::DUPLICATE_SAME_ACCESS,
        ))?;
        Ok(File::from_raw_handle(new_raw as RawHandle))
    }
}
