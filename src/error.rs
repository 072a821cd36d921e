//! Errors returned by the mutation engine.

use std::collections::TryReserveError;
use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Convenient `Result` type for mutation errors.
pub type Result<T> = std::result::Result<T, MutationError>;

/// File operation that failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IoOp {
    OpenInput,
    ReadInput,
    OpenOutput,
    WriteOutput,
}

impl fmt::Display for IoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IoOp::OpenInput => "cannot open input file",
            IoOp::ReadInput => "cannot read input file",
            IoOp::OpenOutput => "cannot open output file",
            IoOp::WriteOutput => "cannot write output file",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum MutationError {
    #[error("{op} {}: {source}", path.display())]
    Io {
        op: IoOp,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot allocate {size} bytes for {}: {source}", path.display())]
    Allocation {
        path: PathBuf,
        size: u64,
        #[source]
        source: TryReserveError,
    },

    #[error("input path {} has no file name", path.display())]
    NoFileName { path: PathBuf },
}

impl MutationError {
    pub(crate) fn io(op: IoOp, path: impl Into<PathBuf>, source: io::Error) -> Self {
        MutationError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}
