//! # Error taxonomy
//!
//! Every operation exposed to the filesystem binding returns [`FsError`]. The
//! binding translates it with [`FsError::io_kind`] (or the `From` impl into
//! [`std::io::Error`]) to its native not-found / permission / I/O signals.
//!
//! | Variant | Raised when | Binding signal |
//! |---|---|---|
//! | `NotFound` | unknown entity, unresolved search, missing child | not found |
//! | `Unsupported` | mutation on a read-only node, rejected mutation | not permitted |
//! | `RemoteFailure` | catalog or transport call failed | I/O error |
//! | `StreamAborted` | handle closed while a reader was waiting | I/O error |
//!
//! Errors are `Clone` because a failed stream stores its error on the handle
//! and hands the same value to every later reader.

use std::io;

pub type Result<T, E = FsError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("operation not permitted: {0}")]
    Unsupported(String),

    #[error("remote failure: {0}")]
    RemoteFailure(String),

    #[error("stream aborted")]
    StreamAborted,
}

impl FsError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::Unsupported(what.into())
    }

    pub fn remote(err: impl std::fmt::Display) -> Self {
        Self::RemoteFailure(err.to_string())
    }

    pub fn io_kind(&self) -> io::ErrorKind {
        match self {
            Self::NotFound(_) => io::ErrorKind::NotFound,
            Self::Unsupported(_) => io::ErrorKind::PermissionDenied,
            Self::RemoteFailure(_) | Self::StreamAborted => io::ErrorKind::Other,
        }
    }
}

impl From<FsError> for io::Error {
    fn from(err: FsError) -> Self {
        io::Error::new(err.io_kind(), err)
    }
}

impl From<reqwest::Error> for FsError {
    fn from(err: reqwest::Error) -> Self {
        if err.status() == Some(reqwest::StatusCode::NOT_FOUND) {
            Self::NotFound(err.to_string())
        } else {
            Self::RemoteFailure(err.to_string())
        }
    }
}
