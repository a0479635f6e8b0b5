use std::env;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::channel::{self, Stdio};
use crate::error::{Error, Result};
use crate::group::ProcessGroup;
use crate::process::Process;

/// A builder for spawning a process.
///
/// `Command` collects the program, its arguments, environment and working directory,
/// how each standard stream is connected, and the process group to spawn into.
/// [`spawn`](Self::spawn) validates the whole configuration before touching the OS, so a
/// contradictory configuration never leaves anything half created.
///
/// Standard streams that are not configured are connected to pipes, available through
/// [`Process::stdin`], [`Process::stdout`] and [`Process::stderr`].
///
/// ```no_run
/// # use proctl::{Command, Stdio};
/// # fn dummy() -> proctl::Result<()> {
/// let process = Command::new("sort")
///     .stderr(Stdio::Ignore)
///     .spawn()?;
/// let mut stdin = process.stdin()?.unwrap();
/// stdin.write(b"b\nc\na\n")?;
/// drop(stdin);
/// process.close_stdin();
/// let sorted = process.stdout()?.unwrap().read_all()?;
/// assert_eq!(sorted, b"a\nb\nc\n");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
#[must_use]
pub struct Command<'a> {
    program: OsString,
    args: Vec<OsString>,
    env: Option<Vec<(OsString, OsString)>>,
    cwd: Option<OsString>,
    stdin: Option<Stdio<'a>>,
    stdout: Option<Stdio<'a>>,
    stderr: Option<Stdio<'a>>,
    output: Option<Stdio<'a>>,
    new_process_group: bool,
    process_group: Option<ProcessGroup>,
    user: Option<OsString>,
    password: Option<OsString>,
    #[cfg(unix)]
    setuid: Option<u32>,
    #[cfg(unix)]
    setgid: Option<u32>,
    #[cfg(windows)]
    raw_cmdline: Option<OsString>,
    #[cfg(windows)]
    creation_flags: u32,
}

impl<'a> Command<'a> {
    /// Constructs a new `Command` for running `program`.
    ///
    /// The program is run directly, without an intervening shell. A program name without
    /// a path separator is looked up in `PATH`.
    pub fn new(program: impl AsRef<OsStr>) -> Command<'a> {
        Command {
            program: program.as_ref().to_owned(),
            args: vec![],
            env: None,
            cwd: None,
            stdin: None,
            stdout: None,
            stderr: None,
            output: None,
            new_process_group: false,
            process_group: None,
            user: None,
            password: None,
            #[cfg(unix)]
            setuid: None,
            #[cfg(unix)]
            setgid: None,
            #[cfg(windows)]
            raw_cmdline: None,
            #[cfg(windows)]
            creation_flags: 0,
        }
    }

    /// Constructs a new `Command` from a full argument vector, program first.
    ///
    /// An empty vector yields a command that fails to spawn.
    pub fn from_argv(argv: impl IntoIterator<Item = impl AsRef<OsStr>>) -> Command<'a> {
        let mut argv = argv.into_iter();
        let program = argv
            .next()
            .map(|p| p.as_ref().to_owned())
            .unwrap_or_default();
        Command::new(program).args(argv)
    }

    /// Appends `arg` to argument list.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Command<'a> {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Extends the argument list with `args`.
    pub fn args(mut self, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> Command<'a> {
        self.args
            .extend(args.into_iter().map(|x| x.as_ref().to_owned()));
        self
    }

    fn ensure_env(&mut self) -> &mut Vec<(OsString, OsString)> {
        self.env.get_or_insert_with(|| env::vars_os().collect())
    }

    /// Clears the environment of the child.
    ///
    /// When this is invoked, the child will not inherit the environment of this process.
    pub fn env_clear(mut self) -> Command<'a> {
        self.env = Some(vec![]);
        self
    }

    /// Sets an environment variable in the child.
    ///
    /// If the same variable is set more than once, the last value is used. Other
    /// variables are inherited from the current process unless `env_clear` was called.
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Command<'a> {
        self.ensure_env()
            .push((key.as_ref().to_owned(), value.as_ref().to_owned()));
        self
    }

    /// Sets multiple environment variables in the child.
    pub fn env_extend(
        mut self,
        vars: impl IntoIterator<Item = (impl AsRef<OsStr>, impl AsRef<OsStr>)>,
    ) -> Command<'a> {
        self.ensure_env().extend(
            vars.into_iter()
                .map(|(k, v)| (k.as_ref().to_owned(), v.as_ref().to_owned())),
        );
        self
    }

    /// Removes an environment variable from the child.
    pub fn env_remove(mut self, key: impl AsRef<OsStr>) -> Command<'a> {
        self.ensure_env().retain(|(k, _v)| k != key.as_ref());
        self
    }

    /// Specifies the working directory of the child.
    ///
    /// If unspecified, the working directory is inherited from the parent.
    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Command<'a> {
        self.cwd = Some(dir.as_ref().as_os_str().to_owned());
        self
    }

    /// Specifies how to set up the child's standard input.
    pub fn stdin(mut self, stdin: impl Into<Stdio<'a>>) -> Command<'a> {
        self.stdin = Some(stdin.into());
        self
    }

    /// Specifies how to set up the child's standard output.
    pub fn stdout(mut self, stdout: impl Into<Stdio<'a>>) -> Command<'a> {
        self.stdout = Some(stdout.into());
        self
    }

    /// Specifies how to set up the child's standard error.
    pub fn stderr(mut self, stderr: impl Into<Stdio<'a>>) -> Command<'a> {
        self.stderr = Some(stderr.into());
        self
    }

    /// Connects both stdout and stderr to a single channel.
    ///
    /// Cannot be combined with [`stdout`](Self::stdout) or [`stderr`](Self::stderr).
    pub fn output(mut self, output: impl Into<Stdio<'a>>) -> Command<'a> {
        self.output = Some(output.into());
        self
    }

    /// Spawns the child as the leader of a new process group.
    ///
    /// The group is available through [`Process::group`]. Cannot be combined with
    /// [`process_group`](Self::process_group).
    pub fn new_process_group(mut self) -> Command<'a> {
        self.new_process_group = true;
        self
    }

    /// Spawns the child into an existing process group.
    ///
    /// The first process spawned into an empty group becomes its leader.
    pub fn process_group(mut self, group: &ProcessGroup) -> Command<'a> {
        self.process_group = Some(group.clone());
        self
    }

    /// Runs the child as the named user.
    ///
    /// On Unix this requires the privileges to change user, and also switches to the
    /// user's primary and supplementary groups. On Windows a
    /// [`password`](Self::password) is required as well.
    pub fn user(mut self, user: impl AsRef<OsStr>) -> Command<'a> {
        self.user = Some(user.as_ref().to_owned());
        self
    }

    /// Sets the password used with [`user`](Self::user). Ignored on Unix.
    pub fn password(mut self, password: impl AsRef<OsStr>) -> Command<'a> {
        self.password = Some(password.as_ref().to_owned());
        self
    }

    fn argv(&self) -> Vec<OsString> {
        let mut argv = Vec::with_capacity(1 + self.args.len());
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    fn validate(&self) -> Result<()> {
        fn has_nul(s: &OsStr) -> bool {
            s.as_encoded_bytes().contains(&0)
        }

        if self.program.is_empty() {
            return Err(Error::usage("program name must not be empty"));
        }
        let strings = std::iter::once(&self.program)
            .chain(&self.args)
            .chain(self.env.iter().flatten().flat_map(|(k, v)| [k, v]))
            .chain(&self.cwd)
            .chain(&self.user)
            .chain(&self.password);
        for s in strings {
            if has_nul(s) {
                return Err(Error::usage(format!(
                    "{:?} contains a NUL byte",
                    s.to_string_lossy()
                )));
            }
        }
        if self.new_process_group && self.process_group.is_some() {
            return Err(Error::usage(
                "new_process_group cannot be used together with process_group",
            ));
        }
        if let Some(group) = &self.process_group
            && group.is_closed()
        {
            return Err(Error::usage("cannot spawn into a closed process group"));
        }
        if cfg!(windows) && self.user.is_some() && self.password.is_none() {
            return Err(Error::usage("running as another user requires a password"));
        }
        channel::validate(
            self.stdin.as_ref(),
            self.stdout.as_ref(),
            self.stderr.as_ref(),
            self.output.as_ref(),
        )
    }

    /// Starts the process.
    ///
    /// Configuration errors are reported before any OS resource is allocated. If
    /// anything fails afterwards, every pipe and file opened for the child is closed
    /// again before the error is returned.
    pub fn spawn(self) -> Result<Process> {
        self.validate()?;
        let os_options = self.os_options()?;
        let group = if self.new_process_group {
            Some(ProcessGroup::new()?)
        } else {
            self.process_group.clone()
        };

        let (channels, child_ends) = channel::resolve(
            self.stdin.as_ref(),
            self.stdout.as_ref(),
            self.stderr.as_ref(),
            self.output.as_ref(),
        )?;
        let argv = self.argv();
        let (pid, ext) = os::os_start(
            &argv,
            child_ends,
            self.env.as_deref(),
            self.cwd.as_deref(),
            group.as_ref(),
            &os_options,
        )?;

        let process = Process::new(pid, ext, channels, group.clone());
        if let Some(group) = &group {
            group.register(&process);
        }
        debug!(
            pid,
            program = %self.program.to_string_lossy(),
            group = group.as_ref().map(|g| g.to_string()),
            "spawned process"
        );
        Ok(process)
    }

    // used for Debug impl
    fn display_escape(s: &str) -> std::borrow::Cow<'_, str> {
        fn nice_char(c: char) -> bool {
            match c {
                '-' | '_' | '.' | ',' | '/' => true,
                c if c.is_ascii_alphanumeric() => true,
                _ => false,
            }
        }
        if !s.chars().all(nice_char) {
            std::borrow::Cow::Owned(format!("'{}'", s.replace("'", r#"'\''"#)))
        } else {
            std::borrow::Cow::Borrowed(s)
        }
    }

    /// Show the command as a command-line string quoted in the Unix style.
    pub fn to_cmdline_lossy(&self) -> String {
        let mut out = Command::display_escape(&self.program.to_string_lossy()).into_owned();
        for arg in &self.args {
            out.push(' ');
            out.push_str(&Command::display_escape(&arg.to_string_lossy()));
        }
        out
    }
}

impl fmt::Debug for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command {{ {} }}", self.to_cmdline_lossy())
    }
}

#[cfg(unix)]
mod os {
    use std::collections::HashSet;
    use std::ffi::{CStr, CString, OsStr, OsString};
    use std::fs::File;
    use std::io::{self, Read, Write};
    use std::os::unix::io::AsRawFd;
    use std::sync::Arc;

    use tracing::warn;

    use super::Command;
    use crate::channel::ChildEnds;
    use crate::error::{Error, Result};
    use crate::group::ProcessGroup;
    use crate::posix;
    use crate::process::ExtProcessState;

    /// Identity the child switches to before exec.
    #[derive(Debug, Default)]
    pub struct OsOptions {
        user: Option<CString>,
        uid: Option<u32>,
        gid: Option<u32>,
    }

    impl Command<'_> {
        // Resolving the user happens in the parent: the password database can't be
        // read safely between fork and exec.
        pub(super) fn os_options(&self) -> Result<OsOptions> {
            let mut options = OsOptions {
                user: None,
                uid: self.setuid,
                gid: self.setgid,
            };
            if let Some(name) = &self.user {
                let info = posix::lookup_user(name)
                    .map_err(Error::resource("looking up user"))?
                    .ok_or_else(|| {
                        Error::usage(format!("unknown user {:?}", name.to_string_lossy()))
                    })?;
                options.uid = options.uid.or(Some(info.uid));
                options.gid = options.gid.or(Some(info.gid));
                options.user = Some(info.name);
            }
            Ok(options)
        }
    }

    /// Read exactly N bytes, or return None on immediate EOF. Similar to
    /// read_exact(), but distinguishes between no read and partial read
    /// (which is treated as error).
    fn read_exact_or_eof<const N: usize>(source: &mut File) -> io::Result<Option<[u8; N]>> {
        let mut buf = [0u8; N];
        let mut total_read = 0;
        while total_read < N {
            let n = match source.read(&mut buf[total_read..]) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if n == 0 {
                break;
            }
            total_read += n;
        }
        match total_read {
            0 => Ok(None),
            n if n == N => Ok(Some(buf)),
            _ => Err(io::ErrorKind::UnexpectedEof.into()),
        }
    }

    pub(super) fn os_start(
        argv: &[OsString],
        child_ends: ChildEnds,
        env: Option<&[(OsString, OsString)]>,
        cwd: Option<&OsStr>,
        group: Option<&ProcessGroup>,
        os_options: &OsOptions,
    ) -> Result<(u32, ExtProcessState)> {
        let prepare = Error::resource("preparing to exec");
        let mut exec_fail_pipe = posix::pipe().map_err(Error::resource("creating pipe"))?;
        let child_env = env.map(format_env);
        let just_exec = posix::prep_exec(&argv[0], argv, child_env.as_deref()).map_err(prepare)?;
        let cwd = cwd
            .map(posix::os_to_cstring)
            .transpose()
            .map_err(Error::resource("preparing to exec"))?;
        let pgid = group.map(ProcessGroup::spawn_pgid);

        let pid = match unsafe { posix::fork() }.map_err(Error::resource("creating process"))? {
            Some(child_pid) => child_pid,
            None => {
                drop(exec_fail_pipe.0);
                let err = match prepare_child(&child_ends, cwd.as_deref(), pgid, os_options) {
                    Ok(()) => just_exec(),
                    Err(e) => e,
                };
                let error_code = err.raw_os_error().unwrap_or(-1) as u32;
                exec_fail_pipe.1.write_all(&error_code.to_le_bytes()).ok();
                posix::_exit(127);
            }
        };

        // Close the parent's copies of child-end fds promptly after fork,
        // before blocking on exec_fail_pipe.
        drop(child_ends);

        // Set the group from the parent too, so it exists by the time spawn returns.
        // This fails harmlessly if the child has already exec'd.
        if let Some(pgid) = pgid {
            let _ = posix::setpgid(pid, if pgid == 0 { pid } else { pgid });
        }

        drop(exec_fail_pipe.1);
        let report = read_exact_or_eof::<4>(&mut exec_fail_pipe.0);
        match report {
            Ok(None) => Ok((pid, ExtProcessState::Child)),
            Ok(Some(error_buf)) => {
                let error_code = u32::from_le_bytes(error_buf);
                reap(pid);
                Err(Error::ChildStartup(io::Error::from_raw_os_error(
                    error_code as i32,
                )))
            }
            Err(e) => {
                warn!(pid, error = %e, "lost contact with child during startup");
                let _ = posix::kill(pid, libc::SIGKILL);
                reap(pid);
                Err(Error::resource("reading child startup status")(e))
            }
        }
    }

    fn reap(pid: u32) {
        if let Err(e) = posix::waitpid(pid, 0) {
            warn!(pid, error = %e, "failed to reap child that did not start");
        }
    }

    fn format_env(env: &[(OsString, OsString)]) -> Vec<OsString> {
        let mut seen = HashSet::<&OsStr>::new();
        let mut formatted: Vec<_> = env
            .iter()
            .rev()
            .filter(|&(k, _)| seen.insert(k))
            .map(|(k, v)| {
                let mut fmt = k.clone();
                fmt.push("=");
                fmt.push(v);
                fmt
            })
            .collect();
        formatted.reverse();
        formatted
    }

    fn dup2_if_needed(end: Option<&Arc<File>>, target_fd: i32) -> io::Result<()> {
        if let Some(f) = end {
            if f.as_raw_fd() != target_fd {
                posix::dup2(f.as_raw_fd(), target_fd)?;
            } else {
                posix::set_cloexec(target_fd, false)?;
            }
        }
        Ok(())
    }

    // Runs in the child between fork and exec; must not allocate.
    fn prepare_child(
        child_ends: &ChildEnds,
        cwd: Option<&CStr>,
        pgid: Option<u32>,
        os_options: &OsOptions,
    ) -> io::Result<()> {
        if let Some(cwd) = cwd {
            posix::chdir(cwd)?;
        }

        let (stdin, stdout, stderr) = child_ends;
        dup2_if_needed(stdin.as_ref(), 0)?;
        dup2_if_needed(stdout.as_ref(), 1)?;
        dup2_if_needed(stderr.as_ref(), 2)?;
        posix::reset_sigpipe()?;

        if let Some(pgid) = pgid {
            posix::setpgid(0, pgid)?;
        }
        if let (Some(user), Some(gid)) = (&os_options.user, os_options.gid) {
            posix::initgroups(user, gid)?;
        }
        if let Some(gid) = os_options.gid {
            posix::setgid(gid)?;
        }
        if let Some(uid) = os_options.uid {
            posix::setuid(uid)?;
        }
        Ok(())
    }
}

#[cfg(windows)]
mod os {
    use std::collections::HashSet;
    use std::ffi::{OsStr, OsString};
    use std::os::windows::ffi::{OsStrExt, OsStringExt};
    use std::os::windows::io::{AsRawHandle, RawHandle};
    use std::sync::Arc;

    use std::fs::File;

    use tracing::warn;

    use super::Command;
    use crate::channel::ChildEnds;
    use crate::error::{Error, Result};
    use crate::group::ProcessGroup;
    use crate::process::ExtProcessState;
    use crate::win32;

    #[derive(Debug, Default)]
    pub struct OsOptions {
        credentials: Option<(OsString, OsString)>,
        raw_cmdline: Option<OsString>,
        creation_flags: u32,
    }

    impl Command<'_> {
        pub(super) fn os_options(&self) -> Result<OsOptions> {
            Ok(OsOptions {
                credentials: self.user.clone().zip(self.password.clone()),
                raw_cmdline: self.raw_cmdline.clone(),
                creation_flags: self.creation_flags,
            })
        }
    }

    pub(super) fn os_start(
        argv: &[OsString],
        child_ends: ChildEnds,
        env: Option<&[(OsString, OsString)]>,
        cwd: Option<&OsStr>,
        group: Option<&ProcessGroup>,
        os_options: &OsOptions,
    ) -> Result<(u32, ExtProcessState)> {
        fn raw(end: &Option<Arc<File>>) -> Option<RawHandle> {
            end.as_ref().map(|f| f.as_raw_handle())
        }

        let cmdline = match &os_options.raw_cmdline {
            Some(cmdline) => cmdline.clone(),
            None => assemble_cmdline(argv),
        };
        let env_block = env.map(format_env_block);

        // Every child leads its own console process group, so that break events can be
        // aimed at it. Children in a group also get a console of their own.
        let new_console = group.is_some();
        let suspend = group.is_some_and(ProcessGroup::has_job);
        let mut flags = win32::CREATE_NEW_PROCESS_GROUP
            | win32::CREATE_UNICODE_ENVIRONMENT
            | os_options.creation_flags;
        if new_console {
            flags |= win32::CREATE_NEW_CONSOLE;
        }
        if suspend {
            flags |= win32::CREATE_SUSPENDED;
        }

        let (stdin, stdout, stderr) = &child_ends;
        let created = match &os_options.credentials {
            Some((user, password)) => win32::CreateProcessWithLogon(
                user,
                password,
                &cmdline,
                env_block.as_deref(),
                cwd,
                flags,
                raw(stdin),
                raw(stdout),
                raw(stderr),
                win32::STARTF_USESTDHANDLES,
            ),
            None => win32::CreateProcess(
                None,
                &cmdline,
                env_block.as_deref(),
                cwd,
                true,
                flags,
                raw(stdin),
                raw(stdout),
                raw(stderr),
                win32::STARTF_USESTDHANDLES,
            ),
        }
        .map_err(Error::resource("creating process"))?;
        drop(child_ends);

        // A suspended child can't spawn anything before it is in the job.
        if suspend {
            let placed = group
                .map_or(Ok(()), |g| g.assign(&created.process))
                .map_err(Error::resource("assigning process to job object"))
                .and_then(|()| {
                    win32::ResumeThread(&created.thread)
                        .map_err(Error::resource("resuming process"))
                });
            if let Err(e) = placed {
                warn!(pid = created.pid, error = %e, "terminating partially spawned process");
                let _ = win32::TerminateProcess(&created.process, 1);
                return Err(e);
            }
        }

        Ok((
            created.pid,
            ExtProcessState {
                handle: created.process,
                spawned: true,
                new_console,
            },
        ))
    }

    fn format_env_block(env: &[(OsString, OsString)]) -> Vec<u16> {
        fn to_uppercase(s: &OsStr) -> OsString {
            OsString::from_wide(
                &s.encode_wide()
                    .map(|c| {
                        if c < 128 {
                            (c as u8).to_ascii_uppercase() as u16
                        } else {
                            c
                        }
                    })
                    .collect::<Vec<_>>(),
            )
        }
        let mut pruned: Vec<_> = {
            let mut seen = HashSet::<OsString>::new();
            env.iter()
                .rev()
                .filter(|&(k, _)| seen.insert(to_uppercase(k)))
                .collect()
        };
        pruned.reverse();
        let mut block = vec![];
        for (k, v) in pruned {
            block.extend(k.encode_wide());
            block.push('=' as u16);
            block.extend(v.encode_wide());
            block.push(0);
        }
        // An empty environment still needs its double terminator.
        if block.is_empty() {
            block.push(0);
        }
        block.push(0);
        block
    }

    pub(crate) fn assemble_cmdline(argv: &[OsString]) -> OsString {
        let mut cmdline = vec![];
        for (i, arg) in argv.iter().enumerate() {
            if i > 0 {
                cmdline.push(' ' as u16);
            }
            append_quoted(arg, &mut cmdline);
        }
        OsString::from_wide(&cmdline)
    }

    // Translated from ArgvQuote at
    // https://learn.microsoft.com/en-us/archive/blogs/twistylittlepassagesallalike/everyone-quotes-command-line-arguments-the-wrong-way
    fn append_quoted(arg: &OsStr, cmdline: &mut Vec<u16>) {
        if !arg.is_empty()
            && !arg.encode_wide().any(|c| {
                c == ' ' as u16
                    || c == '\t' as u16
                    || c == '\n' as u16
                    || c == '\x0b' as u16
                    || c == '\"' as u16
            })
        {
            cmdline.extend(arg.encode_wide());
            return;
        }
        cmdline.push('"' as u16);

        let arg: Vec<_> = arg.encode_wide().collect();
        let mut i = 0;
        while i < arg.len() {
            let mut num_backslashes = 0;
            while i < arg.len() && arg[i] == '\\' as u16 {
                i += 1;
                num_backslashes += 1;
            }

            if i == arg.len() {
                for _ in 0..num_backslashes * 2 {
                    cmdline.push('\\' as u16);
                }
                break;
            } else if arg[i] == b'"' as u16 {
                for _ in 0..num_backslashes * 2 + 1 {
                    cmdline.push('\\' as u16);
                }
                cmdline.push(arg[i]);
            } else {
                for _ in 0..num_backslashes {
                    cmdline.push('\\' as u16);
                }
                cmdline.push(arg[i]);
            }
            i += 1;
        }
        cmdline.push('"' as u16);
    }
}

#[cfg(all(windows, test))]
pub(crate) use os::assemble_cmdline;

#[cfg(unix)]
pub mod unix {
    use super::Command;

    /// Unix-specific extension methods for [`Command`].
    pub trait CommandExt {
        /// Set the user ID for the child.
        ///
        /// This calls `setuid(2)` in the child after `fork()` but before `exec()`, and
        /// overrides the user ID derived from [`Command::user`].
        fn setuid(self, uid: u32) -> Self;

        /// Set the group ID for the child.
        ///
        /// This calls `setgid(2)` in the child after `fork()` but before `exec()`, and
        /// overrides the group ID derived from [`Command::user`].
        fn setgid(self, gid: u32) -> Self;
    }

    impl CommandExt for Command<'_> {
        fn setuid(mut self, uid: u32) -> Self {
            self.setuid = Some(uid);
            self
        }

        fn setgid(mut self, gid: u32) -> Self {
            self.setgid = Some(gid);
            self
        }
    }
}

#[cfg(windows)]
pub mod windows {
    use std::ffi::OsStr;

    use super::Command;

    /// Process creation flag: The process does not have a console window.
    pub const CREATE_NO_WINDOW: u32 = 0x08000000;

    /// Process creation flag: The process does not inherit its parent's console.
    pub const DETACHED_PROCESS: u32 = 0x00000008;

    /// Windows-specific extension methods for [`Command`].
    pub trait CommandExt {
        /// Add process creation flags for `CreateProcessW`.
        ///
        /// The flags are combined with the ones the library always sets
        /// (`CREATE_NEW_PROCESS_GROUP` and `CREATE_UNICODE_ENVIRONMENT`).
        fn creation_flags(self, flags: u32) -> Self;

        /// Pass `cmdline` to the child verbatim instead of quoting the arguments.
        ///
        /// The command line must start with the program. This is needed for programs
        /// that parse their command line differently from the Microsoft C runtime,
        /// such as `cmd.exe`.
        fn raw_cmdline(self, cmdline: impl AsRef<OsStr>) -> Self;
    }

    impl CommandExt for Command<'_> {
        fn creation_flags(mut self, flags: u32) -> Self {
            self.creation_flags = flags;
            self
        }

        fn raw_cmdline(mut self, cmdline: impl AsRef<OsStr>) -> Self {
            self.raw_cmdline = Some(cmdline.as_ref().to_owned());
            self
        }
    }
}
