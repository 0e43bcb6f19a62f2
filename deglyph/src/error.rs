//! Errors reported by file based operations.

use std::{fmt, io, path::PathBuf};

use crate::extract::ExtractError;

/// An error tied to the file it occurred on.
#[derive(Debug)]
pub enum Error {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    Extract {
        path: PathBuf,
        source: ExtractError,
    },
    /// Some fonts of a batch could not be processed.
    BatchFailed { failed: usize, total: usize },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| Self::Json {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn extract(path: impl Into<PathBuf>) -> impl FnOnce(ExtractError) -> Self {
        move |source| Self::Extract {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Json { path, source } => write!(f, "{}: invalid JSON: {source}", path.display()),
            Self::Extract { path, source } => write!(f, "{}: {source}", path.display()),
            Self::BatchFailed { failed, total } => {
                write!(f, "{failed} of {total} fonts failed")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::Extract { source, .. } => Some(source),
            Self::BatchFailed { .. } => None,
        }
    }
}
