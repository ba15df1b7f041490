// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for fetch requests.

use std::{error::Error as StdError, fmt, sync::Arc};

/// A malformed request. Reported synchronously and never retried.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The `args` option was set to something other than an ordered sequence.
    #[error("args only accepts an ordered sequence of arguments, got {found}")]
    ArgsNotSequence {
        /// The kind of value that was supplied.
        found: &'static str,
    },

    /// No callable operation was supplied.
    #[error("fetch only accepts a callable operation, but none was supplied")]
    MissingOperation,

    /// Both relative and absolute expiration were requested.
    #[error("expire and expire_time cannot be set at the same time")]
    ConflictingExpiry,

    /// A remote request was issued without a URL.
    #[error("a remote request needs a non-empty url")]
    MissingUrl,
}

/// The failure of an operation.
///
/// Cheap to clone: every caller waiting on the same in-flight request observes the same error.
///
/// # Examples
///
/// ```
/// use suspense_fetch::OperationError;
///
/// let error = OperationError::from_message("connection reset");
/// assert_eq!(error.to_string(), "connection reset");
/// ```
#[derive(Clone)]
pub struct OperationError(Arc<dyn StdError + Send + Sync>);

impl OperationError {
    /// Wraps an error returned by an operation.
    pub fn new(error: impl StdError + Send + Sync + 'static) -> Self {
        Self(Arc::new(error))
    }

    /// Creates an error from anything that converts into a boxed error, such as a string.
    pub fn from_message(cause: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self(Arc::from(cause.into()))
    }

    /// Returns `true` if both values are clones of the same failure.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }

    /// Returns the wrapped error.
    #[must_use]
    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.0
    }
}

impl fmt::Debug for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OperationError").field(&self.0).finish()
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for OperationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

/// Either a malformed request or a failed operation.
#[derive(Clone, Debug, thiserror::Error)]
pub enum FetchError {
    /// The request could not be normalized.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The operation rejected.
    #[error("operation failed: {0}")]
    Operation(#[from] OperationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn config_error_messages_are_descriptive() {
        assert!(ConfigError::ArgsNotSequence { found: "number" }.to_string().contains("number"));
        assert!(ConfigError::MissingOperation.to_string().contains("callable"));
        assert!(ConfigError::ConflictingExpiry.to_string().contains("expire_time"));
        assert!(ConfigError::MissingUrl.to_string().contains("url"));
    }

    #[test]
    fn operation_error_clones_share_identity() {
        let error = OperationError::from_message("boom");
        let clone = error.clone();
        assert!(error.ptr_eq(&clone));
        assert!(!error.ptr_eq(&OperationError::from_message("boom")));
    }

    #[test]
    fn operation_error_exposes_source_of_wrapped_error() {
        let error = OperationError::new(Outer(std::io::Error::other("disk")));
        assert_eq!(error.to_string(), "outer");
        assert_eq!(error.source().map(ToString::to_string).as_deref(), Some("disk"));
        assert!(format!("{error:?}").contains("OperationError"));
    }

    #[test]
    fn fetch_error_wraps_both_kinds() {
        let config: FetchError = ConfigError::MissingOperation.into();
        assert_eq!(config.to_string(), ConfigError::MissingOperation.to_string());

        let failed: FetchError = OperationError::from_message("boom").into();
        assert_eq!(failed.to_string(), "operation failed: boom");
    }
}
