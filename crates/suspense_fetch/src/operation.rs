// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Operations: the async functions a scope calls, with the identity used to key their results.

use std::{fmt, sync::Arc};

use futures::future::{BoxFuture, FutureExt};
use suspense_cache::{Arg, OperationId, OperationKey};

use crate::OperationError;

type OperationFn<V> = dyn Fn(Vec<Arg>) -> BoxFuture<'static, Result<V, OperationError>> + Send + Sync;

/// An asynchronous function whose results are fetched and cached.
///
/// Clones share one identity, so they address the same cache entries. Creating a new
/// `Operation`, even from an identical closure, yields a new identity.
///
/// The description is part of simple cache keys. [`Operation::new`] uses the closure's type name,
/// which differs between closures written at different places in the source. Use
/// [`Operation::named`] for an explicit description.
///
/// # Examples
///
/// ```
/// use suspense_fetch::{Arg, Operation, OperationError};
///
/// let load_user = Operation::named("load_user", |args: Vec<Arg>| async move {
///     Ok::<_, OperationError>(format!("user {}", args[0]))
/// });
///
/// assert_eq!(load_user.description(), "load_user");
/// assert_eq!(load_user, load_user.clone());
/// ```
pub struct Operation<V> {
    key: OperationKey,
    func: Arc<OperationFn<V>>,
}

impl<V: 'static> Operation<V> {
    /// Wraps a closure, describing it by its type name.
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: Fn(Vec<Arg>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, OperationError>> + Send + 'static,
    {
        Self::named(std::any::type_name::<F>(), func)
    }

    /// Wraps a closure with an explicit description.
    pub fn named<F, Fut>(description: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(Vec<Arg>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, OperationError>> + Send + 'static,
    {
        Self {
            key: OperationKey::new(description),
            func: Arc::new(move |args: Vec<Arg>| func(args).boxed()),
        }
    }
}

impl<V> Operation<V> {
    /// Returns the key used to address this operation in stores.
    #[must_use]
    pub fn key(&self) -> &OperationKey {
        &self.key
    }

    /// Returns the identity of this operation.
    #[must_use]
    pub fn id(&self) -> OperationId {
        self.key.id()
    }

    /// Returns the textual description of this operation.
    #[must_use]
    pub fn description(&self) -> &str {
        self.key.description()
    }

    pub(crate) fn invoke(&self, args: Vec<Arg>) -> BoxFuture<'static, Result<V, OperationError>> {
        (self.func)(args)
    }
}

impl<V> Clone for Operation<V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            func: Arc::clone(&self.func),
        }
    }
}

impl<V> PartialEq for Operation<V> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<V> Eq for Operation<V> {}

impl<V> fmt::Debug for Operation<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.key.id())
            .field("description", &self.key.description())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    #[test]
    fn invoke_passes_arguments() {
        let op = Operation::named("sum", |args: Vec<Arg>| async move {
            let total: f64 = args
                .iter()
                .map(|arg| match arg {
                    Arg::Number(n) => *n,
                    _ => 0.0,
                })
                .sum();
            Ok(total)
        });

        let result = block_on(op.invoke(vec![Arg::from(1), Arg::from(2)]));
        assert_eq!(result.ok(), Some(3.0));
    }

    #[test]
    fn identical_closures_have_distinct_identities() {
        let a = Operation::named("same", |_| async { Ok(1) });
        let b = Operation::named("same", |_| async { Ok(1) });
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn default_description_is_closure_type_name() {
        let op = Operation::new(|_| async { Ok::<_, OperationError>(()) });
        assert!(op.description().contains("closure"), "unexpected description {}", op.description());
        assert!(format!("{op:?}").contains("Operation"));
    }
}
