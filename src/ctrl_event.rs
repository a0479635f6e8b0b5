//! Delivery of console control events to processes in other consoles.
//!
//! `GenerateConsoleCtrlEvent` only reaches processes sharing the caller's console, and a
//! process can only be attached to one console at a time. Rather than detaching the
//! calling program from its own console, events are delivered by a small helper
//! executable that attaches to the target's console and raises the event there. The
//! helper is built together with the library, embedded in it, and written to the
//! temporary directory the first time it is needed.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::signal::{SIGBREAK, SIGINT};
use crate::win32;

static HELPER_IMAGE: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/proctl-ctrl-event.exe"));

static HELPER_PATH: OnceLock<PathBuf> = OnceLock::new();
static HELPER_INIT: Mutex<()> = Mutex::new(());

const PLACEMENT_ATTEMPTS: u32 = 5;
const LAUNCH_ATTEMPTS: u32 = 5;
const LAUNCH_RETRY_DELAY: Duration = Duration::from_millis(100);

fn helper_path() -> io::Result<&'static Path> {
    if let Some(path) = HELPER_PATH.get() {
        return Ok(path);
    }
    let _guard = HELPER_INIT.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(path) = HELPER_PATH.get() {
        return Ok(path);
    }
    let mut last_err = None;
    for attempt in 1..=PLACEMENT_ATTEMPTS {
        match place_helper() {
            Ok(path) => {
                debug!(path = %path.display(), "placed console control helper");
                return Ok(HELPER_PATH.get_or_init(|| path));
            }
            Err(e) => {
                warn!(attempt, error = %e, "failed to place console control helper");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::other("console control helper unavailable")))
}

// The helper file is kept for the rest of the program's life; it is reused by every
// later event.
fn place_helper() -> io::Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix("proctl_ctrl_")
        .suffix(".exe")
        .tempfile()?;
    file.write_all(HELPER_IMAGE)?;
    file.flush()?;
    let path = file.into_temp_path().keep().map_err(|e| e.error)?;
    Ok(path)
}

/// The console control event that stands in for `signal`, if there is one.
///
/// Spawned processes lead their own console process group, which disables Ctrl+C for
/// them, so `SIGINT` is delivered as a break event just like `SIGBREAK`.
pub(crate) fn event_for(signal: i32) -> Option<u32> {
    match signal {
        SIGINT | SIGBREAK => Some(win32::CTRL_BREAK_EVENT),
        _ => None,
    }
}

fn helper_cmdline(helper: &Path, pids: &[u32], event: u32) -> OsString {
    let mut cmdline = OsString::from("\"");
    cmdline.push(helper);
    cmdline.push("\"");
    for pid in pids {
        cmdline.push(format!(" {pid}"));
    }
    cmdline.push(format!(" {event}"));
    cmdline
}

/// Raise console control `event` in the console of the first of `pids` the helper can
/// attach to.
pub(crate) fn send(pids: &[u32], event: u32) -> Result<()> {
    if pids.is_empty() {
        return Ok(());
    }
    let helper = helper_path().map_err(Error::resource("placing console control helper"))?;
    let cmdline = helper_cmdline(helper, pids, event);

    let mut attempt = 1;
    let child = loop {
        match win32::CreateProcess(
            Some(helper.as_os_str()),
            &cmdline,
            None,
            None,
            false,
            win32::CREATE_NO_WINDOW,
            None,
            None,
            None,
            0,
        ) {
            Ok(child) => break child,
            // Antivirus scanners briefly lock freshly written executables.
            Err(e)
                if attempt < LAUNCH_ATTEMPTS
                    && matches!(
                        e.raw_os_error(),
                        Some(c) if c == win32::ERROR_ACCESS_DENIED as i32
                            || c == win32::ERROR_SHARING_VIOLATION as i32
                    ) =>
            {
                debug!(attempt, error = %e, "console control helper busy, retrying");
                attempt += 1;
                thread::sleep(LAUNCH_RETRY_DELAY);
            }
            Err(e) => return Err(Error::resource("launching console control helper")(e)),
        }
    };

    win32::WaitForSingleObject(&child.process, None)
        .map_err(Error::control("waiting for console control helper"))?;
    let code = win32::GetExitCodeProcess(&child.process)
        .map_err(Error::control("waiting for console control helper"))?;
    if code != 0 {
        return Err(Error::control("delivering console control event")(io::Error::other(
            format!("helper could not signal any of {pids:?}"),
        )));
    }
    Ok(())
}
