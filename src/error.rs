//! Error and result types.

use std::io;
use std::path::PathBuf;

use ndarray::ShapeError;
use thiserror::Error;

/// `Result` type alias for operations that can fail.
pub type Result<T> = ::std::result::Result<T, Error>;

/// Errors in reading, writing or querying fastText models.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// A file could not be opened or created.
    #[error("Cannot open {path:?}: {error}")]
    Open {
        path: PathBuf,
        #[source]
        error: io::Error,
    },

    /// I/O error while reading.
    #[error("{desc}: {error}")]
    Read {
        desc: String,
        #[source]
        error: io::Error,
    },

    /// I/O error while writing.
    #[error("{desc}: {error}")]
    Write {
        desc: String,
        #[source]
        error: io::Error,
    },

    /// Invalid file format.
    #[error("Invalid file format: {0}")]
    Format(String),

    /// Vectors do not have the configured dimensionality.
    #[error("Dimension mismatch, expected: {expected}, got: {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// `ndarray` shape error.
    #[error("Matrix has incorrect shape: {0}")]
    Shape(#[from] ShapeError),

    /// A size that cannot be represented by the native word size.
    #[error("Data cannot be represented using native word size")]
    Overflow,

    /// An operation was called with input that it cannot handle.
    #[error("Precondition violated: {0}")]
    Precondition(String),
}

impl Error {
    pub(crate) fn open_error(path: impl Into<PathBuf>, error: io::Error) -> Self {
        Error::Open {
            path: path.into(),
            error,
        }
    }

    pub(crate) fn read_error(desc: impl Into<String>, error: io::Error) -> Self {
        Error::Read {
            desc: desc.into(),
            error,
        }
    }

    pub(crate) fn write_error(desc: impl Into<String>, error: io::Error) -> Self {
        Error::Write {
            desc: desc.into(),
            error,
        }
    }
}
