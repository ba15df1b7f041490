// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The fetch coordinator.

use std::{fmt, marker::PhantomData, sync::Arc};

use parking_lot::Mutex;
use suspense_cache::{Expiry, KeyStrategy, TieredStore, classify};
use tick::{Clock, runtime::InactiveClock};

use crate::{
    ConfigError, FetchCall, FetchError, FetchRequest, Fetched, Refresh, Suspense,
    in_flight::{InFlight, Settlement},
    telemetry::{FetchActivity, FetchTelemetry},
};

const DEFAULT_NAME: &str = "fetch_scope";

/// Coordinates requests for one boundary: a result cache, an in-flight registry, and the logic
/// that moves values between them.
///
/// Clones share the same state. Results are never shared between separately built scopes.
///
/// # Examples
///
/// ```
/// use futures::executor::block_on;
/// use suspense_fetch::{Arg, FetchScope, Operation, OperationError, Suspense};
///
/// let scope = FetchScope::<String>::new();
/// let greet = Operation::named("greet", |args: Vec<Arg>| async move {
///     Ok::<_, OperationError>(format!("hello {}", args[0]))
/// });
///
/// let first = scope.fetch((greet.clone(), vec![Arg::from("ada")])).unwrap();
/// let Suspense::Suspended(handle) = first else { panic!("nothing cached yet") };
/// block_on(handle);
///
/// let second = scope.fetch((greet, vec![Arg::from("ada")])).unwrap();
/// assert_eq!(second.ready().unwrap().value(), "hello ada");
/// ```
pub struct FetchScope<V> {
    inner: Arc<ScopeInner<V>>,
}

struct ScopeInner<V> {
    name: Arc<str>,
    results: Mutex<TieredStore<V>>,
    in_flight: Mutex<TieredStore<InFlight<V>>>,
    telemetry: FetchTelemetry,
}

impl<V> FetchScope<V> {
    /// Creates a builder for a scope that reads time from `clock`.
    ///
    /// # Examples
    ///
    /// ```
    /// use suspense_fetch::{FetchScope, KeyStrategy};
    /// use tick::Clock;
    ///
    /// let scope = FetchScope::<u32>::builder(Clock::new_frozen())
    ///     .name("profile_page")
    ///     .strategy(KeyStrategy::WholeFunction)
    ///     .build();
    ///
    /// assert_eq!(scope.name(), "profile_page");
    /// ```
    #[must_use]
    pub fn builder(clock: Clock) -> FetchScopeBuilder<V> {
        FetchScopeBuilder::new(clock)
    }

    /// Creates a scope with the system clock, per-argument keys and no logging.
    ///
    /// Expiration only reads wall-clock time, so the clock's timer driver is not needed.
    #[must_use]
    pub fn new() -> Self {
        let (clock, _driver) = InactiveClock::default().activate();
        Self::builder(clock).build()
    }

    /// The name reported in log events.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// How calls are keyed in this scope.
    #[must_use]
    pub fn strategy(&self) -> KeyStrategy {
        self.inner.results.lock().strategy()
    }

    /// Number of cached results, expired ones included.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.inner.results.lock().len()
    }

    /// Number of calls registered as in flight, settled or not.
    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    /// Drops every cached result. Calls in flight are left alone.
    pub fn invalidate_all(&self) {
        self.inner.results.lock().clear_all();
    }

    /// Drops the cached result for `request`. Returns `true` if there was one.
    pub fn invalidate(&self, request: &FetchRequest<V>) -> bool {
        let operation = request.operation().key();
        let removed = self.inner.results.lock().clear(operation, request.args());
        if removed {
            self.inner
                .telemetry
                .record(FetchActivity::Invalidated, operation, classify(request.args()));
        }
        removed
    }
}

impl<V: Clone + Send + Sync + 'static> FetchScope<V> {
    /// Normalizes `call` and issues the resulting request.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the call is malformed. The operation is not invoked in that case.
    pub fn fetch(&self, call: impl Into<FetchCall<V>>) -> Result<Suspense<V>, ConfigError> {
        let request = call.into().normalize()?;
        Ok(self.request(&request))
    }

    /// Issues one attempt of `request`.
    ///
    /// - A cached, unexpired result is returned as [`Suspense::Ready`].
    /// - A call already in flight for the same key yields its [`WaitHandle`](crate::WaitHandle).
    /// - A settled call is consumed: its value is cached and returned, or its failure is returned.
    /// - Otherwise the operation is registered as in flight and its handle is returned.
    ///
    /// The operation is invoked when its [`WaitHandle`](crate::WaitHandle) is first polled, not
    /// when it is registered. A caller that drops every handle of a suspended attempt without
    /// awaiting it leaves the call pending, and the next attempt for the same key joins it.
    pub fn request(&self, request: &FetchRequest<V>) -> Suspense<V> {
        let operation = request.operation().key();
        let args = request.args();
        let kind = classify(args);
        let telemetry = &self.inner.telemetry;

        let cached = self.inner.results.lock().get(operation, args);
        if let Some(value) = cached {
            telemetry.record(FetchActivity::Hit, operation, kind);
            return Suspense::Ready(Fetched::new(value, self.refresh_for(request)));
        }
        telemetry.record(FetchActivity::Miss, operation, kind);

        let entry = {
            let mut in_flight = self.inner.in_flight.lock();
            match in_flight.get(operation, args) {
                Some(entry) => entry,
                None => {
                    // Starting does not run the operation, so registering under the lock is safe.
                    let entry = InFlight::start(request.operation().clone(), args.to_vec());
                    let handle = entry.handle();
                    in_flight.set(operation, entry, args, Expiry::Never);
                    telemetry.record(FetchActivity::Invoked, operation, kind);
                    return Suspense::Suspended(handle);
                }
            }
        };

        match entry.settlement() {
            Settlement::Pending => {
                telemetry.record(FetchActivity::Joined, operation, kind);
                Suspense::Suspended(entry.handle())
            }
            Settlement::Resolved(value) => {
                self.inner
                    .results
                    .lock()
                    .set(operation, value.clone(), args, request.expiry());
                self.retire(request, &entry);
                telemetry.record(FetchActivity::Promoted, operation, kind);
                Suspense::Ready(Fetched::new(value, self.refresh_for(request)))
            }
            Settlement::Rejected(error) => {
                self.retire(request, &entry);
                telemetry.record(FetchActivity::Rejected, operation, kind);
                Suspense::Failed(error)
            }
        }
    }

    /// Normalizes `call` and issues it until it is ready or failed, waiting out every suspension.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Config`] for a malformed call and [`FetchError::Operation`] if the
    /// operation rejects.
    pub async fn resolve(&self, call: impl Into<FetchCall<V>>) -> Result<Fetched<V>, FetchError> {
        let request = call.into().normalize()?;
        self.resolve_request(&request).await
    }

    /// Issues `request` until it is ready or failed, waiting out every suspension.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Operation`] if the operation rejects.
    pub async fn resolve_request(&self, request: &FetchRequest<V>) -> Result<Fetched<V>, FetchError> {
        loop {
            match self.request(request) {
                Suspense::Ready(fetched) => return Ok(fetched),
                Suspense::Suspended(handle) => handle.await,
                Suspense::Failed(error) => return Err(error.into()),
            }
        }
    }

    fn refresh_for(&self, request: &FetchRequest<V>) -> Refresh<V> {
        Refresh::new(self.clone(), request.clone())
    }

    /// Removes `entry` from the in-flight registry unless it was already replaced.
    fn retire(&self, request: &FetchRequest<V>, entry: &InFlight<V>) {
        let operation = request.operation().key();
        let mut in_flight = self.inner.in_flight.lock();
        if in_flight
            .get(operation, request.args())
            .is_some_and(|current| current.same_call(entry))
        {
            in_flight.clear(operation, request.args());
        }
    }
}

impl<V> Clone for FetchScope<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for FetchScope<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for FetchScope<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchScope")
            .field("name", &self.inner.name)
            .field("strategy", &self.strategy())
            .field("cached", &self.cached_len())
            .field("in_flight", &self.in_flight_len())
            .field("logs", &self.inner.telemetry.logs_enabled())
            .finish()
    }
}

/// Builder for [`FetchScope`].
///
/// Created by [`FetchScope::builder`].
#[derive(Debug)]
pub struct FetchScopeBuilder<V> {
    name: Option<Arc<str>>,
    clock: Clock,
    strategy: KeyStrategy,
    logs: bool,
    _phantom: PhantomData<fn() -> V>,
}

impl<V> FetchScopeBuilder<V> {
    fn new(clock: Clock) -> Self {
        Self {
            name: None,
            clock,
            strategy: KeyStrategy::default(),
            logs: false,
            _phantom: PhantomData,
        }
    }

    /// Sets the name reported in log events.
    #[must_use]
    pub fn name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets how calls are keyed. Defaults to [`KeyStrategy::PerArguments`].
    #[must_use]
    pub fn strategy(mut self, strategy: KeyStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Keys results by operation only, ignoring arguments.
    #[must_use]
    pub fn whole_function(self) -> Self {
        self.strategy(KeyStrategy::WholeFunction)
    }

    /// Enables or disables log events. Off by default.
    ///
    /// Has no effect unless the `logs` feature is enabled.
    #[must_use]
    pub fn with_logs(mut self, enabled: bool) -> Self {
        self.logs = enabled;
        self
    }

    /// Builds the scope.
    #[must_use]
    pub fn build(self) -> FetchScope<V> {
        let name = self.name.unwrap_or_else(|| Arc::from(DEFAULT_NAME));
        FetchScope {
            inner: Arc::new(ScopeInner {
                telemetry: FetchTelemetry::new(Arc::clone(&name), self.logs),
                name,
                results: Mutex::new(TieredStore::new(self.strategy, self.clock.clone())),
                in_flight: Mutex::new(TieredStore::new(self.strategy, self.clock)),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::executor::block_on;
    use suspense_cache::Arg;

    use super::*;
    use crate::{Operation, OperationError};

    fn counting(calls: &Arc<AtomicUsize>) -> Operation<usize> {
        let calls = Arc::clone(calls);
        Operation::named("counting", move |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok::<_, OperationError>(n) }
        })
    }

    #[test]
    fn first_request_suspends_then_promotes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scope = FetchScope::new();
        let request = FetchRequest::new(counting(&calls), vec![Arg::from(1)], Expiry::Never);

        let Suspense::Suspended(handle) = scope.request(&request) else {
            panic!("expected suspension");
        };
        assert_eq!(scope.in_flight_len(), 1);
        assert_eq!(scope.cached_len(), 0);

        block_on(handle);
        let fetched = scope.request(&request).ready().expect("value is ready");

        assert_eq!(*fetched.value(), 1);
        assert_eq!(scope.in_flight_len(), 0);
        assert_eq!(scope.cached_len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pending_requests_share_one_handle() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scope = FetchScope::new();
        let request = FetchRequest::new(counting(&calls), Vec::new(), Expiry::Never);

        let first = scope.request(&request);
        let second = scope.request(&request);
        assert!(first.is_suspended());
        assert!(second.is_suspended());

        if let Some(handle) = second.wait_handle() {
            block_on(handle.clone());
        }
        assert!(first.wait_handle().is_some_and(crate::WaitHandle::is_settled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retire_keeps_a_newer_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scope = FetchScope::new();
        let request = FetchRequest::new(counting(&calls), Vec::new(), Expiry::Never);

        let stale = InFlight::start(request.operation().clone(), Vec::new());
        let _ = scope.request(&request);
        scope.retire(&request, &stale);

        assert_eq!(scope.in_flight_len(), 1);
    }

    #[test]
    fn invalidate_reports_whether_anything_was_removed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scope = FetchScope::new();
        let request = FetchRequest::new(counting(&calls), Vec::new(), Expiry::Never);

        assert!(!scope.invalidate(&request));
        block_on(scope.resolve_request(&request)).expect("resolves");
        assert!(scope.invalidate(&request));
        assert_eq!(scope.cached_len(), 0);
    }

    #[test]
    fn builder_defaults() {
        let scope = FetchScope::<u8>::builder(Clock::new_frozen()).build();
        assert_eq!(scope.name(), DEFAULT_NAME);
        assert_eq!(scope.strategy(), KeyStrategy::PerArguments);

        let scope = FetchScope::<u8>::builder(Clock::new_frozen()).whole_function().build();
        assert_eq!(scope.strategy(), KeyStrategy::WholeFunction);
        assert!(format!("{scope:?}").contains("WholeFunction"));
    }

    #[cfg(feature = "logs")]
    #[test]
    fn logs_describe_the_request_lifecycle() {
        use crate::telemetry::testing::LogCapture;

        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        let calls = Arc::new(AtomicUsize::new(0));
        let scope = FetchScope::builder(Clock::new_frozen())
            .name("lifecycle")
            .with_logs(true)
            .build();
        let request = FetchRequest::new(counting(&calls), Vec::new(), Expiry::Never);

        block_on(scope.resolve_request(&request)).expect("resolves");
        let _ = scope.request(&request);

        capture.assert_contains("lifecycle");
        capture.assert_contains("invoked");
        capture.assert_contains("promoted");
        capture.assert_contains("hit");
    }
}
