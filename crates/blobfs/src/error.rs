// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::backend::ObjectKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Failures reported by a [`crate::BlobBackend`], in backend terms (keys, container names)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported object kind for {key}: {required} required")]
    KindMismatch { key: String, required: ObjectKind },

    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    pub fn not_found<S: AsRef<str>>(what: S) -> Self {
        BackendError::NotFound(what.as_ref().into())
    }

    pub fn invalid_name<S: AsRef<str>, R: AsRef<str>>(name: S, reason: R) -> Self {
        BackendError::InvalidName {
            name: name.as_ref().into(),
            reason: reason.as_ref().into(),
        }
    }

    pub fn unavailable<S: ToString>(cause: S) -> Self {
        BackendError::Unavailable(cause.to_string())
    }
}

/// Errors surfaced to callers of [`crate::BlobClient`]
///
/// Every variant names the logical path the caller asked for.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Missing and forbidden are deliberately indistinguishable
    #[error("'{0}' does not exist or is not accessible")]
    NotFound(String),

    #[error("'{path}': unsupported object kind for operation: {required} required")]
    UnsupportedObjectKind { path: String, required: ObjectKind },

    #[error("'{0}' is not empty")]
    DirectoryNotEmpty(String),

    #[error("'{path}': backend unavailable: {reason}")]
    BackendUnavailable { path: String, reason: String },

    #[error("{0}")]
    Refused(String),

    #[error("attributes of '{0}' are read-only")]
    ReadOnly(String),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn not_found<S: ToString>(path: S) -> Self {
        Error::NotFound(path.to_string())
    }

    pub fn directory_not_empty<S: ToString>(path: S) -> Self {
        Error::DirectoryNotEmpty(path.to_string())
    }

    pub fn refused<S: Into<String>>(message: S) -> Self {
        Error::Refused(message.into())
    }

    pub fn read_only<S: ToString>(path: S) -> Self {
        Error::ReadOnly(path.to_string())
    }

    pub fn io<S: ToString>(path: S, source: std::io::Error) -> Self {
        Error::Io {
            path: path.to_string(),
            source,
        }
    }

    pub fn unavailable<S: ToString, R: ToString>(path: S, reason: R) -> Self {
        Error::BackendUnavailable {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Wrap a backend failure with the logical path it was raised for
    pub fn from_backend<S: ToString>(path: S, err: BackendError) -> Self {
        let path = path.to_string();
        match err {
            BackendError::NotFound(_) => Error::NotFound(path),
            BackendError::KindMismatch { required, .. } => {
                Error::UnsupportedObjectKind { path, required }
            }
            BackendError::InvalidName { name, reason } => Error::InvalidPath {
                path,
                reason: format!("{name}: {reason}"),
            },
            BackendError::Unavailable(reason) => Error::BackendUnavailable { path, reason },
        }
    }

    /// True for the user-visible "does not exist or is not accessible" category
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_backend_carries_logical_path() {
        let err = Error::from_backend("C/a/b", BackendError::not_found("a/b"));
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "'C/a/b' does not exist or is not accessible");

        let err = Error::from_backend(
            "C/log",
            BackendError::KindMismatch {
                key: "log".into(),
                required: ObjectKind::Append,
            },
        );
        assert!(matches!(
            err,
            Error::UnsupportedObjectKind {
                ref path,
                required: ObjectKind::Append
            } if path == "C/log"
        ));

        let err = Error::from_backend("Bad/x", BackendError::invalid_name("Bad", "uppercase"));
        assert!(matches!(err, Error::InvalidPath { .. }));

        let err = Error::from_backend("C/x", BackendError::unavailable("connection reset"));
        assert_eq!(
            err.to_string(),
            "'C/x': backend unavailable: connection reset"
        );
    }
}
