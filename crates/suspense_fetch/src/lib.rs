// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Suspend-and-retry data fetching with per-argument caching and in-flight deduplication.
//!
//! A rendering layer asks a [`FetchScope`] for the result of an [`Operation`] called with some
//! arguments. The answer is a [`Suspense`]:
//!
//! - [`Suspense::Ready`] when a cached, unexpired result exists, together with a [`Refresh`]
//!   handle that forces a re-fetch.
//! - [`Suspense::Suspended`] when the result is being produced. The [`WaitHandle`] completes once
//!   the operation settles, after which the same request should be issued again.
//! - [`Suspense::Failed`] when the operation rejected. Failures are reported once and never
//!   retried automatically.
//!
//! Concurrent requests for the same key share one invocation. Results are cached per operation
//! and argument list with optional expiration, see [`suspense_cache`] for how keys are derived.
//!
//! # Call shapes
//!
//! [`FetchScope::fetch`] accepts anything convertible into a [`FetchCall`]: an operation, an
//! operation with arguments, an operation with [`FetchOptions`], or an options record alone.
//! Malformed calls are rejected synchronously with a [`ConfigError`].
//!
//! # Driving requests
//!
//! Hosts without their own suspend/retry loop can use [`FetchScope::resolve`], which waits out
//! every suspension:
//!
//! ```
//! use std::time::Duration;
//!
//! use futures::executor::block_on;
//! use suspense_fetch::{Arg, FetchOptions, FetchScope, Operation, OperationError};
//!
//! let scope = FetchScope::new();
//! let square = Operation::named("square", |args: Vec<Arg>| async move {
//!     match args.first() {
//!         Some(Arg::Number(n)) => Ok(n * n),
//!         _ => Err(OperationError::from_message("expected a number")),
//!     }
//! });
//!
//! let call = (square, vec![Arg::from(4)], FetchOptions::new().expire(Duration::from_secs(60)));
//! let fetched = block_on(scope.resolve(call)).unwrap();
//! assert_eq!(*fetched.value(), 16.0);
//! ```
//!
//! # Time
//!
//! Expiration is measured with a [`tick::Clock`] passed to [`FetchScope::builder`]. Tests can drive
//! it with `tick::ClockControl` from tick's `test-util` feature.
//!
//! # Remote requests
//!
//! [`RemoteFetcher`] accepts URL-based calls and retrieves them through a [`Transport`].
//! Identical logical requests map to one operation, so they share cache entries.
//!
//! # Logging
//!
//! With the `logs` feature (on by default) a scope built with
//! [`FetchScopeBuilder::with_logs`] emits `tracing` events named `fetch.event` describing each
//! hit, miss, invocation, promotion, rejection and invalidation.

mod error;
mod in_flight;
mod operation;
mod remote;
mod request;
mod scope;
mod suspense;
mod telemetry;

#[doc(inline)]
pub use error::{ConfigError, FetchError, OperationError};
#[doc(inline)]
pub use in_flight::WaitHandle;
#[doc(inline)]
pub use operation::Operation;
#[doc(inline)]
pub use remote::{RemoteCall, RemoteFetcher, RemoteOptions, RemoteRequest, Transport};
#[doc(inline)]
pub use request::{FetchCall, FetchOptions, FetchRequest};
#[doc(inline)]
pub use scope::{FetchScope, FetchScopeBuilder};
#[doc(inline)]
pub use suspense::{Fetched, Refresh, Suspense};
pub use suspense_cache::{Arg, Callable, Expiry, KeyStrategy, OperationId};
