// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Argument-keyed storage with lazy expiration for suspense-style data fetching.
//!
//! This crate holds the storage half of a fetch layer: deciding how a call to an operation is
//! keyed, tagging stored values with expiration metadata, and keeping them in a [`TieredStore`].
//! The same store type backs both the completed-result cache and the in-flight registry of
//! `suspense_fetch`.
//!
//! # Keys
//!
//! A call is identified by an [`OperationKey`] and a list of [`Arg`] values:
//!
//! - With [`KeyStrategy::WholeFunction`] only the operation identity counts.
//! - With [`KeyStrategy::PerArguments`] and primitive-only arguments, the key is a string built by
//!   [`derive_simple_key`].
//! - With [`KeyStrategy::PerArguments`] and at least one array, object or callable, the arguments
//!   are compared against stored argument lists with [`Arg::shallow_eq`].
//!
//! # Expiration
//!
//! Values are stored with an [`Expiry`] and checked against a [`tick::Clock`] when reading.
//! Nothing runs in the background, and an expired value stays in storage until it is overwritten
//! or cleared.
//!
//! ```
//! use std::time::Duration;
//!
//! use suspense_cache::{Expiry, KeyStrategy, OperationKey, TieredStore};
//! use tick::ClockControl;
//!
//! let control = ClockControl::new();
//! let mut store = TieredStore::new(KeyStrategy::PerArguments, control.to_clock());
//! let op = OperationKey::new("load");
//!
//! store.set(&op, serde_json::json!({ "x": 1 }), &[], Expiry::after(Duration::from_millis(1000)));
//!
//! control.advance(Duration::from_millis(500));
//! assert_eq!(store.get(&op, &[]), Some(serde_json::json!({ "x": 1 })));
//!
//! control.advance(Duration::from_millis(1000));
//! assert_eq!(store.get(&op, &[]), None);
//! ```

pub mod arg;
mod entry;
pub mod key;
pub mod store;

#[doc(inline)]
pub use arg::{Arg, Callable, args_match};
#[doc(inline)]
pub use entry::{CacheEntry, Expiry};
#[doc(inline)]
pub use key::{ArgsKind, OperationId, OperationKey, classify, derive_simple_key};
#[doc(inline)]
pub use store::{KeyStrategy, TieredStore};
