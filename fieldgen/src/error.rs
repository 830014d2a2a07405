//! Error types.

use std::{
    fmt::{self, Display},
    io,
    path::PathBuf,
};

/// Errors surfaced by the generator.
///
/// Every variant is fatal to a generation run: the driver stops at the
/// first one and leaves files written for earlier fields in place.
#[derive(Debug)]
pub enum Error {
    /// A field's modulus could not be parsed as hexadecimal.
    InvalidModulus {
        /// Name of the field being built.
        field: &'static str,
        /// The offending modulus string.
        hex: &'static str,
    },

    /// A field's limb layout cannot hold its modulus.
    InvalidLayout {
        /// Name of the field being built.
        field: &'static str,
        /// What is inconsistent.
        reason: String,
    },

    /// Reading the header template or writing generated output failed.
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The command line was malformed.
    Usage(String),

    /// Executing an emitted module failed.
    Eval(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn eval(msg: impl Into<String>) -> Self {
        Error::Eval(msg.into())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidModulus { field, hex } => {
                write!(f, "{field}: modulus is not a hex integer: {hex:?}")
            }
            Error::InvalidLayout { field, reason } => write!(f, "{field}: {reason}"),
            Error::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Error::Usage(msg) => write!(f, "usage error: {msg}"),
            Error::Eval(msg) => write!(f, "evaluation error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type.
pub type Result<T> = core::result::Result<T, Error>;
