use std::io;

use thiserror::Error;

/// Errors returned by process control operations.
///
/// Every OS-level failure carries the underlying `io::Error`, so the platform error
/// code is available through [`raw_os_error`](Self::raw_os_error).
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or contradictory configuration, detected before any OS resource was
    /// touched.
    #[error("{0}")]
    Usage(String),

    /// Creating a pipe, opening a file, duplicating a handle or creating the process
    /// failed.
    #[error("{context}: {source}")]
    Resource {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    /// The child was created but failed before it could exec the program.
    #[error("child failed to start: {0}")]
    ChildStartup(#[source] io::Error),

    /// Signalling or waiting on a process or process group failed.
    #[error("{context}: {source}")]
    Control {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    /// Reading from or writing to a stream failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn usage(msg: impl Into<String>) -> Error {
        Error::Usage(msg.into())
    }

    pub(crate) fn resource(context: &'static str) -> impl FnOnce(io::Error) -> Error {
        move |source| Error::Resource { context, source }
    }

    pub(crate) fn control(context: &'static str) -> impl FnOnce(io::Error) -> Error {
        move |source| Error::Control { context, source }
    }

    /// Returns the OS error code behind this error, if there is one.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Usage(_) => None,
            Error::Resource { source, .. } | Error::Control { source, .. } => {
                source.raw_os_error()
            }
            Error::ChildStartup(source) | Error::Io(source) => source.raw_os_error(),
        }
    }

    /// True if this is a configuration error rather than an OS failure.
    pub fn is_usage(&self) -> bool {
        matches!(self, Error::Usage(_))
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        match err {
            Error::Usage(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            Error::Io(source) => source,
            other => {
                let kind = match &other {
                    Error::Resource { source, .. }
                    | Error::Control { source, .. }
                    | Error::ChildStartup(source) => source.kind(),
                    _ => io::ErrorKind::Other,
                };
                io::Error::new(kind, other)
            }
        }
    }
}
