use std::fmt;
use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};

use crate::error::{Error, Result};

/// Size of the chunks in which [`Stream::read_all`] consumes its source.
const CHUNK_SIZE: usize = 8192;

/// A byte stream over an OS pipe end or file, owned by the caller.
///
/// Streams are what the parent sees of a child's piped standard streams. They can also
/// be created standalone with [`Stream::pipe`] and handed to [`Command`] as an external
/// stream.
///
/// A stream can be put into non-blocking mode, in which case the read operations
/// report "no data yet" as a successful empty (or short) result instead of blocking.
/// The mode belongs to the underlying pipe, so it is shared by every duplicate of the
/// stream, including those returned by the process stdio accessors.
///
/// Dropping a stream closes its descriptor; [`close`](Self::close) does the same
/// explicitly and leaves the stream in a closed state.
///
/// [`Command`]: crate::Command
pub struct Stream {
    file: Option<File>,
}

impl Stream {
    pub(crate) fn from_file(file: File) -> Stream {
        Stream { file: Some(file) }
    }

    /// Create a pipe, returning its `(read, write)` ends.
    ///
    /// Neither end is inherited by children unless it is explicitly redirected.
    pub fn pipe() -> Result<(Stream, Stream)> {
        let (read, write) = os::make_pipe().map_err(Error::resource("creating pipe"))?;
        Ok((Stream::from_file(read), Stream::from_file(write)))
    }

    /// True if the stream has been closed.
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Close the stream. Closing an already closed stream does nothing.
    pub fn close(&mut self) {
        self.file = None;
    }

    /// True if the stream is in non-blocking mode.
    ///
    /// The mode is read from the OS, so a change made through a duplicate is visible
    /// here too.
    pub fn is_nonblocking(&self) -> Result<bool> {
        os::is_nonblocking(self.file()?).map_err(Error::resource("querying blocking mode"))
    }

    /// Switch the stream, and every duplicate of it, between blocking and non-blocking
    /// mode.
    pub fn set_nonblocking(&mut self, nonblocking: bool) -> Result<()> {
        os::set_nonblocking(self.file()?, nonblocking)
            .map_err(Error::resource("changing blocking mode"))
    }

    /// Create an independent duplicate of the stream.
    ///
    /// The duplicate refers to the same pipe or file through a different descriptor,
    /// so closing one does not affect the other.
    pub fn try_clone(&self) -> Result<Stream> {
        let file = self
            .file()?
            .try_clone()
            .map_err(Error::resource("duplicating stream"))?;
        Ok(Stream::from_file(file))
    }

    /// Borrow the underlying file, if the stream is open.
    pub fn as_file(&self) -> Option<&File> {
        self.file.as_ref()
    }

    /// Convert the stream into the underlying file, if the stream is open.
    pub fn into_file(self) -> Option<File> {
        self.file
    }

    fn file(&self) -> Result<&File> {
        self.file
            .as_ref()
            .ok_or_else(|| Error::usage("stream is closed"))
    }

    fn file_mut(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| Error::usage("stream is closed"))
    }

    /// Write all of `data` to the stream.
    ///
    /// Returns the number of bytes written, which is always `data.len()`. Writing only
    /// part of the data is an error carrying the OS error code that stopped it.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let file = self.file_mut()?;
        let mut written = 0;
        while written < data.len() {
            match file.write(&data[written..]) {
                Ok(0) => return Err(io::Error::from(ErrorKind::WriteZero).into()),
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => (),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(written)
    }

    /// Read until end of stream.
    ///
    /// In non-blocking mode, reading stops as soon as no more data is available and
    /// whatever was read so far (possibly nothing) is returned.
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        let file = self.file_mut()?;
        let mut data = vec![];
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            match file.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => data.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => (),
                Err(e) if os::is_would_block(&e) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(data)
    }

    /// Read a single line, byte by byte, up to `'\n'` or end of stream.
    ///
    /// The terminating newline is included in the result only if `keep_terminator` is
    /// true.
    pub fn read_line(&mut self, keep_terminator: bool) -> Result<Vec<u8>> {
        let file = self.file_mut()?;
        let mut line = vec![];
        let mut byte = [0u8; 1];
        loop {
            match file.read(&mut byte) {
                Ok(0) => break,
                Ok(_) if byte[0] == b'\n' => {
                    if keep_terminator {
                        line.push(b'\n');
                    }
                    break;
                }
                Ok(_) => line.push(byte[0]),
                Err(e) if e.kind() == ErrorKind::Interrupted => (),
                Err(e) if os::is_would_block(&e) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(line)
    }

    /// Read exactly `n` bytes, or fewer if the stream ends first.
    ///
    /// In non-blocking mode, fewer bytes are also returned when no more data is
    /// available yet.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let file = self.file_mut()?;
        let mut buf = vec![0u8; n];
        let mut filled = 0;
        while filled < n {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(k) => filled += k,
                Err(e) if e.kind() == ErrorKind::Interrupted => (),
                Err(e) if os::is_would_block(&e) => break,
                Err(e) => return Err(e.into()),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }
}

fn closed_stream() -> io::Error {
    io::Error::new(ErrorKind::BrokenPipe, "stream is closed")
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.as_mut().ok_or_else(closed_stream)?.read(buf)
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.as_mut().ok_or_else(closed_stream)?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(f) => f.flush(),
            None => Ok(()),
        }
    }
}

impl From<File> for Stream {
    fn from(file: File) -> Stream {
        Stream::from_file(file)
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream").field("file", &self.file).finish()
    }
}

#[cfg(unix)]
pub(crate) mod os {
    use std::fs::File;
    use std::io;
    use std::os::unix::io::AsRawFd;

    use crate::posix;

    pub fn make_pipe() -> io::Result<(File, File)> {
        posix::pipe()
    }

    pub fn set_nonblocking(f: &File, nonblocking: bool) -> io::Result<()> {
        posix::set_nonblocking(f.as_raw_fd(), nonblocking)
    }

    pub fn is_nonblocking(f: &File) -> io::Result<bool> {
        posix::is_nonblocking(f.as_raw_fd())
    }

    pub fn is_would_block(e: &io::Error) -> bool {
        e.kind() == io::ErrorKind::WouldBlock
    }
}

#[cfg(windows)]
pub(crate) mod os {
    use std::fs::File;
    use std::io;

    use crate::win32;

    pub fn make_pipe() -> io::Result<(File, File)> {
        let (read, write) = win32::CreatePipe(false)?;
        Ok((read, write))
    }

    pub fn set_nonblocking(f: &File, nonblocking: bool) -> io::Result<()> {
        win32::SetPipeNoWait(f, nonblocking)
    }

    // Only pipes have a non-blocking mode; files always block.
    pub fn is_nonblocking(f: &File) -> io::Result<bool> {
        if !win32::IsPipe(f) {
            return Ok(false);
        }
        win32::GetPipeNoWait(f)
    }

    // A PIPE_NOWAIT pipe with nothing to read fails with ERROR_NO_DATA, which std maps
    // to BrokenPipe rather than WouldBlock.
    pub fn is_would_block(e: &io::Error) -> bool {
        e.kind() == io::ErrorKind::WouldBlock
            || e.raw_os_error() == Some(win32::ERROR_NO_DATA as i32)
    }
}
