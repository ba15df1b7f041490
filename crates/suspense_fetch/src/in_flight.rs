// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Bookkeeping for operation calls that have not settled yet.

use std::{
    fmt,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use suspense_cache::Arg;

use crate::{Operation, OperationError};

/// Where an in-flight call stands.
#[derive(Clone, Debug)]
pub(crate) enum Settlement<V> {
    Pending,
    Resolved(V),
    Rejected(OperationError),
}

/// A waitable unit handed out while a request is suspended.
///
/// Awaiting the handle drives the underlying operation to completion and records its outcome.
/// Every request for the same key receives a clone of the same handle, and the operation runs
/// once no matter how many clones are awaited. Once a handle completes, issue the request again
/// to collect the outcome.
#[derive(Clone)]
pub struct WaitHandle(Shared<BoxFuture<'static, ()>>);

impl WaitHandle {
    /// Returns `true` once the operation behind this handle has settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.0.peek().is_some()
    }
}

impl Future for WaitHandle {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.0.poll_unpin(cx)
    }
}

impl fmt::Debug for WaitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitHandle").field("settled", &self.is_settled()).finish()
    }
}

/// An in-flight call: a settlement slot written exactly once, and the handle that writes it.
pub(crate) struct InFlight<V> {
    settlement: Arc<Mutex<Settlement<V>>>,
    handle: WaitHandle,
}

impl<V: Send + 'static> InFlight<V> {
    /// Registers a call to `operation`. The operation is invoked when the handle is first polled.
    pub(crate) fn start(operation: Operation<V>, args: Vec<Arg>) -> Self {
        let settlement = Arc::new(Mutex::new(Settlement::Pending));
        let slot = Arc::clone(&settlement);

        let work = async move {
            let outcome = operation.invoke(args).await;
            let mut slot = slot.lock();
            if matches!(*slot, Settlement::Pending) {
                *slot = match outcome {
                    Ok(value) => Settlement::Resolved(value),
                    Err(error) => Settlement::Rejected(error),
                };
            }
        };

        Self {
            settlement,
            handle: WaitHandle(work.boxed().shared()),
        }
    }
}

impl<V> InFlight<V> {
    pub(crate) fn handle(&self) -> WaitHandle {
        self.handle.clone()
    }

    /// Returns `true` if both values track the same call.
    pub(crate) fn same_call(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.settlement, &other.settlement)
    }
}

impl<V: Clone> InFlight<V> {
    pub(crate) fn settlement(&self) -> Settlement<V> {
        self.settlement.lock().clone()
    }
}

impl<V> Clone for InFlight<V> {
    fn clone(&self) -> Self {
        Self {
            settlement: Arc::clone(&self.settlement),
            handle: self.handle.clone(),
        }
    }
}

impl<V> fmt::Debug for InFlight<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlight").field("handle", &self.handle).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::executor::block_on;

    use super::*;

    #[test]
    fn settles_once_with_resolved_value() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let op = Operation::named("count", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, OperationError>(42) }
        });

        let entry = InFlight::start(op, Vec::new());
        assert!(matches!(entry.settlement(), Settlement::Pending));
        assert!(!entry.handle().is_settled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        block_on(entry.handle());
        block_on(entry.handle());

        assert!(entry.handle().is_settled());
        assert!(matches!(entry.settlement(), Settlement::Resolved(42)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn records_rejection() {
        let op = Operation::named("fail", |_| async { Err::<i32, _>(OperationError::from_message("nope")) });

        let entry = InFlight::start(op, Vec::new());
        block_on(entry.clone().handle());

        match entry.settlement() {
            Settlement::Rejected(error) => assert_eq!(error.to_string(), "nope"),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn passes_arguments_to_the_operation() {
        let op = Operation::named("echo", |args: Vec<Arg>| async move { Ok::<_, OperationError>(args.len()) });

        let entry = InFlight::start(op, vec![Arg::from(1), Arg::from(2)]);
        block_on(entry.handle());

        assert!(matches!(entry.settlement(), Settlement::Resolved(2)));
        assert!(format!("{entry:?}").contains("settled: true"));
    }

    #[test]
    fn clones_track_the_same_call() {
        let op = Operation::named("unit", |_| async { Ok::<_, OperationError>(()) });
        let first = InFlight::start(op.clone(), Vec::new());
        let second = InFlight::start(op, Vec::new());

        assert!(first.same_call(&first.clone()));
        assert!(!first.same_call(&second));
    }
}
