// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The three outcomes of a request.

use std::fmt;

use crate::{FetchError, FetchRequest, FetchScope, OperationError, WaitHandle};

/// The outcome of one request attempt.
///
/// A rendering layer maps `Suspended` to its native suspension primitive: wait on the handle, then
/// issue the same request again. `Failed` is surfaced once; the next request for the same key
/// invokes the operation again.
#[derive(Debug)]
#[must_use]
pub enum Suspense<V> {
    /// The value is available.
    Ready(Fetched<V>),
    /// The value is being produced. Retry after the handle completes.
    Suspended(WaitHandle),
    /// The operation rejected.
    Failed(OperationError),
}

impl<V> Suspense<V> {
    /// Returns `true` for [`Suspense::Ready`].
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Returns `true` for [`Suspense::Suspended`].
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended(_))
    }

    /// Returns `true` for [`Suspense::Failed`].
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns the fetched value, if ready.
    #[must_use]
    pub fn ready(self) -> Option<Fetched<V>> {
        match self {
            Self::Ready(fetched) => Some(fetched),
            Self::Suspended(_) | Self::Failed(_) => None,
        }
    }

    /// Returns the wait handle, if suspended.
    #[must_use]
    pub fn wait_handle(&self) -> Option<&WaitHandle> {
        match self {
            Self::Suspended(handle) => Some(handle),
            Self::Ready(_) | Self::Failed(_) => None,
        }
    }
}

/// A value returned by a request, together with the means to re-fetch it.
pub struct Fetched<V> {
    value: V,
    refresh: Refresh<V>,
}

impl<V> Fetched<V> {
    pub(crate) fn new(value: V, refresh: Refresh<V>) -> Self {
        Self { value, refresh }
    }

    /// The fetched value.
    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes `self`, returning the value.
    #[must_use]
    pub fn into_value(self) -> V {
        self.value
    }

    /// The refresh handle for this request.
    #[must_use]
    pub fn refresh(&self) -> &Refresh<V> {
        &self.refresh
    }

    /// Splits into the value and its refresh handle.
    #[must_use]
    pub fn into_parts(self) -> (V, Refresh<V>) {
        (self.value, self.refresh)
    }
}

impl<V: fmt::Debug> fmt::Debug for Fetched<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetched")
            .field("value", &self.value)
            .field("refresh", &self.refresh)
            .finish()
    }
}

/// Forces a request to be fetched again.
///
/// Refreshing removes the cached result for the request's key and issues the request again with
/// the same operation, arguments and expiration. The value cached before the refresh is never
/// returned afterwards.
pub struct Refresh<V> {
    scope: FetchScope<V>,
    request: FetchRequest<V>,
}

impl<V> Refresh<V> {
    pub(crate) fn new(scope: FetchScope<V>, request: FetchRequest<V>) -> Self {
        Self { scope, request }
    }

    /// The request this handle re-issues.
    #[must_use]
    pub fn request(&self) -> &FetchRequest<V> {
        &self.request
    }
}

impl<V: Clone + Send + Sync + 'static> Refresh<V> {
    /// Invalidates the cached result and issues the request again.
    pub fn refresh(&self) -> Suspense<V> {
        self.scope.invalidate(&self.request);
        self.scope.request(&self.request)
    }

    /// Invalidates the cached result and drives the request until it settles.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Operation`] if the operation rejects.
    pub async fn refresh_resolved(&self) -> Result<Fetched<V>, FetchError> {
        self.scope.invalidate(&self.request);
        self.scope.resolve_request(&self.request).await
    }
}

impl<V> Clone for Refresh<V> {
    fn clone(&self) -> Self {
        Self {
            scope: self.scope.clone(),
            request: self.request.clone(),
        }
    }
}

impl<V> fmt::Debug for Refresh<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Refresh")
            .field("scope", &self.scope.name())
            .field("request", &self.request)
            .finish()
    }
}
