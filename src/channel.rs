use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use tracing::trace;

use crate::error::{Error, Result};
use crate::stream::Stream;

/// How one of the child's standard streams should be set up.
///
/// A `Stdio` is only a request; it is turned into a live channel when the process is
/// spawned. Requests that borrow an external file or stream never take ownership of it:
/// the child receives a duplicate and the caller's descriptor stays open.
///
/// Stdio requests can also be parsed from strings: `"pipe"`, `"inherit"`, `"ignore"`
/// and `"path:<path>"`.
#[derive(Debug, Clone, Default)]
pub enum Stdio<'a> {
    /// Connect the stream to a fresh pipe whose other end is held by the parent.
    #[default]
    Pipe,
    /// Share the parent's corresponding standard stream.
    Inherit,
    /// Connect the stream to the null device.
    Ignore,
    /// Open the named file: read-only for stdin, created and truncated for output.
    Path(PathBuf),
    /// Duplicate a file the caller already has open.
    File(&'a File),
    /// Duplicate a stream the caller already has open.
    Stream(&'a Stream),
}

impl Stdio<'_> {
    /// Redirect to the file at `path`.
    pub fn path(path: impl AsRef<Path>) -> Stdio<'static> {
        Stdio::Path(path.as_ref().to_owned())
    }
}

impl FromStr for Stdio<'static> {
    type Err = Error;

    fn from_str(s: &str) -> Result<Stdio<'static>> {
        match s {
            "pipe" => Ok(Stdio::Pipe),
            "inherit" => Ok(Stdio::Inherit),
            "ignore" => Ok(Stdio::Ignore),
            s => match s.strip_prefix("path:") {
                Some(path) if !path.is_empty() => Ok(Stdio::path(path)),
                _ => Err(Error::usage(format!(
                    "invalid stdio specification {s:?}, expected \
                     \"pipe\", \"inherit\", \"ignore\" or \"path:<path>\""
                ))),
            },
        }
    }
}

impl<'a> From<&'a File> for Stdio<'a> {
    fn from(file: &'a File) -> Stdio<'a> {
        Stdio::File(file)
    }
}

impl<'a> From<&'a Stream> for Stdio<'a> {
    fn from(stream: &'a Stream) -> Stdio<'a> {
        Stdio::Stream(stream)
    }
}

impl From<PathBuf> for Stdio<'_> {
    fn from(path: PathBuf) -> Self {
        Stdio::Path(path)
    }
}

/// The kind of channel a process's standard stream is connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StdioKind {
    Inherit,
    Pipe,
    External,
    File,
    Ignore,
    /// The channel was released with one of the `Process::close_*` methods, or the
    /// process was closed.
    Closed,
}

impl StdioKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StdioKind::Inherit => "inherit",
            StdioKind::Pipe => "pipe",
            StdioKind::External => "external",
            StdioKind::File => "file",
            StdioKind::Ignore => "ignore",
            StdioKind::Closed => "closed",
        }
    }
}

impl fmt::Display for StdioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The channel kinds of a process's three standard streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StdioInfo {
    pub stdin: StdioKind,
    pub stdout: StdioKind,
    pub stderr: StdioKind,
}

/// The parent side of a resolved standard stream.
#[derive(Debug)]
pub(crate) enum Channel {
    Inherit,
    Ignore,
    Pipe(Stream),
    /// A caller-owned file; the parent keeps nothing.
    File,
    /// A caller-owned stream; the parent keeps its own duplicate.
    Stream(Stream),
    /// A file the library opened by path.
    Path {
        path: PathBuf,
        #[allow(dead_code)]
        file: File,
    },
}

impl Channel {
    pub fn kind(&self) -> StdioKind {
        match self {
            Channel::Inherit => StdioKind::Inherit,
            Channel::Ignore => StdioKind::Ignore,
            Channel::Pipe(_) => StdioKind::Pipe,
            Channel::File | Channel::Stream(_) => StdioKind::External,
            Channel::Path { .. } => StdioKind::File,
        }
    }

    /// Produce a stream the caller can use to talk to the child through this channel.
    ///
    /// Pipes and external streams hand out an independent duplicate. A file opened by
    /// path is reopened for reading, so the caller can see what the child wrote.
    pub fn caller_stream(&self) -> Result<Option<Stream>> {
        match self {
            Channel::Pipe(s) | Channel::Stream(s) => Ok(Some(s.try_clone()?)),
            Channel::Path { path, .. } => {
                let file = File::open(path).map_err(Error::resource("reopening redirected file"))?;
                Ok(Some(Stream::from_file(file)))
            }
            Channel::Inherit | Channel::Ignore | Channel::File => Ok(None),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum StandardStream {
    Input = 0,
    Output = 1,
    Error = 2,
}

impl StandardStream {
    fn name(self) -> &'static str {
        match self {
            StandardStream::Input => "stdin",
            StandardStream::Output => "stdout",
            StandardStream::Error => "stderr",
        }
    }
}

/// The child's ends of its standard streams. `None` leaves the stream as the child
/// inherits it.
///
/// Ends are reference counted so that combined output can hand the same descriptor to
/// both stdout and stderr.
pub(crate) type ChildEnds = (Option<Arc<File>>, Option<Arc<File>>, Option<Arc<File>>);

/// The parent-side channels of the three standard streams, indexed by fd number.
pub(crate) type Channels = [Option<Arc<Channel>>; 3];

/// Reject stdio configurations that cannot be resolved, before anything is allocated.
pub(crate) fn validate(
    stdin: Option<&Stdio>,
    stdout: Option<&Stdio>,
    stderr: Option<&Stdio>,
    output: Option<&Stdio>,
) -> Result<()> {
    if output.is_some() && (stdout.is_some() || stderr.is_some()) {
        return Err(Error::usage(
            "combined output cannot be used together with stdout or stderr",
        ));
    }
    for stdio in [stdin, stdout, stderr, output].into_iter().flatten() {
        match stdio {
            Stdio::Stream(s) if s.is_closed() => {
                return Err(Error::usage("cannot redirect to a closed stream"));
            }
            // The child would share the non-blocking mode, which ordinary programs
            // don't expect.
            Stdio::Stream(s) if s.is_nonblocking()? => {
                return Err(Error::usage("cannot redirect to a non-blocking stream"));
            }
            Stdio::Path(p) if p.as_os_str().is_empty() => {
                return Err(Error::usage("redirection path must not be empty"));
            }
            _ => (),
        }
    }
    Ok(())
}

/// Turn stdio requests into live channels and child ends.
///
/// Omitted streams default to a pipe. If `output` is given, stdout and stderr share one
/// channel. Every resource allocated here is owned by the returned values, so a failure
/// part-way through releases whatever was already set up.
pub(crate) fn resolve(
    stdin: Option<&Stdio>,
    stdout: Option<&Stdio>,
    stderr: Option<&Stdio>,
    output: Option<&Stdio>,
) -> Result<(Channels, ChildEnds)> {
    validate(stdin, stdout, stderr, output)?;
    let pipe = Stdio::Pipe;

    let (in_chan, in_end) = resolve_one(stdin.unwrap_or(&pipe), StandardStream::Input)?;
    let ((out_chan, out_end), (err_chan, err_end)) = match output {
        Some(output) => {
            let (chan, end) = resolve_one(output, StandardStream::Output)?;
            let chan = Arc::new(chan);
            let end = end.map(Arc::new);
            ((Some(Arc::clone(&chan)), end.clone()), (Some(chan), end))
        }
        None => {
            let (out_chan, out_end) =
                resolve_one(stdout.unwrap_or(&pipe), StandardStream::Output)?;
            let (err_chan, err_end) =
                resolve_one(stderr.unwrap_or(&pipe), StandardStream::Error)?;
            (
                (Some(Arc::new(out_chan)), out_end.map(Arc::new)),
                (Some(Arc::new(err_chan)), err_end.map(Arc::new)),
            )
        }
    };

    Ok((
        [Some(Arc::new(in_chan)), out_chan, err_chan],
        (in_end.map(Arc::new), out_end, err_end),
    ))
}

fn resolve_one(stdio: &Stdio, which: StandardStream) -> Result<(Channel, Option<File>)> {
    let is_input = which == StandardStream::Input;
    trace!(stream = which.name(), request = ?stdio, "resolving stdio channel");
    let (chan, child) = match stdio {
        Stdio::Pipe => {
            let (read, write) = os::make_pipe().map_err(Error::resource("creating pipe"))?;
            let (parent, child) = if is_input { (write, read) } else { (read, write) };
            (Channel::Pipe(Stream::from_file(parent)), Some(child))
        }
        Stdio::Inherit => {
            let child = os::inherit_standard_stream(which)
                .map_err(Error::resource("duplicating standard stream"))?;
            (Channel::Inherit, child)
        }
        Stdio::Ignore => {
            let null = open_null_device(is_input).map_err(Error::resource("opening null device"))?;
            (Channel::Ignore, Some(null))
        }
        Stdio::Path(path) => {
            let file = open_path(path, is_input).map_err(Error::resource(if is_input {
                "opening stdin file"
            } else {
                "creating output file"
            }))?;
            let child = file
                .try_clone()
                .map_err(Error::resource("duplicating redirected file"))?;
            (
                Channel::Path {
                    path: path.clone(),
                    file,
                },
                Some(child),
            )
        }
        Stdio::File(f) => {
            let child = f
                .try_clone()
                .map_err(Error::resource("duplicating external file"))?;
            (Channel::File, Some(child))
        }
        Stdio::Stream(s) => {
            let kept = s.try_clone()?;
            let child = s.try_clone()?.into_file();
            (Channel::Stream(kept), child)
        }
    };
    if let Some(child) = &child {
        os::set_inheritable(child).map_err(Error::resource("preparing child stream"))?;
    }
    Ok((chan, child))
}

fn open_null_device(for_read: bool) -> io::Result<File> {
    if for_read {
        OpenOptions::new().read(true).open(os::NULL_DEVICE)
    } else {
        OpenOptions::new().write(true).open(os::NULL_DEVICE)
    }
}

fn open_path(path: &Path, for_read: bool) -> io::Result<File> {
    if for_read {
        return File::open(path);
    }
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }
    options.open(path)
}

#[cfg(unix)]
mod os {
    use std::fs::File;
    use std::io;

    use super::StandardStream;
    use crate::posix;

    pub const NULL_DEVICE: &str = "/dev/null";

    pub fn make_pipe() -> io::Result<(File, File)> {
        posix::pipe()
    }

    // The child inherits fds 0, 1 and 2 across fork as they are.
    pub fn inherit_standard_stream(_which: StandardStream) -> io::Result<Option<File>> {
        Ok(None)
    }

    // Descriptors are moved onto 0/1/2 with dup2 in the child, which clears
    // close-on-exec on the target.
    pub fn set_inheritable(_f: &File) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(windows)]
mod os {
    use std::fs::{File, OpenOptions};
    use std::io;

    use tracing::debug;

    use super::StandardStream;
    use crate::win32;

    pub const NULL_DEVICE: &str = "nul";

    pub fn make_pipe() -> io::Result<(File, File)> {
        win32::CreatePipe(false)
    }

    // A parent without a console (or with closed standard handles) has nothing to
    // duplicate; the child gets the null device instead.
    pub fn inherit_standard_stream(which: StandardStream) -> io::Result<Option<File>> {
        match win32::clone_standard_stream(which as u32) {
            Ok(f) => Ok(Some(f)),
            Err(e) => {
                debug!(error = %e, "standard stream unavailable, using null device");
                let null = if which == StandardStream::Input {
                    OpenOptions::new().read(true).open(NULL_DEVICE)?
                } else {
                    OpenOptions::new().write(true).open(NULL_DEVICE)?
                };
                Ok(Some(null))
            }
        }
    }

    pub fn set_inheritable(f: &File) -> io::Result<()> {
        win32::SetHandleInformation(f, win32::HANDLE_FLAG_INHERIT, win32::HANDLE_FLAG_INHERIT)
    }
}
