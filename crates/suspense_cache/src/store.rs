// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The keyed store shared by the result cache and the in-flight registry.
//!
//! A [`TieredStore`] keeps two maps: one for keys that can be expressed as a single hashable value
//! (the operation identity, or a string derived from primitive arguments), and one for argument
//! lists containing reference values. The latter is bucketed per operation and scanned linearly
//! with shallow comparison.

use std::collections::HashMap;

use tick::Clock;

use crate::{
    Arg, CacheEntry, Expiry,
    arg::args_match,
    key::{ArgsKind, OperationId, OperationKey, classify, derive_simple_key},
};

/// How a store derives keys, chosen once when the store is built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyStrategy {
    /// One entry per operation; arguments are ignored, so calls with different arguments collide.
    WholeFunction,
    /// One entry per operation and argument list.
    #[default]
    PerArguments,
}

impl KeyStrategy {
    /// Returns a short label for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WholeFunction => "whole_function",
            Self::PerArguments => "per_arguments",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum SimpleKey {
    Function(OperationId),
    Text(String),
}

/// Where an (operation, arguments) pair lives.
enum Slot {
    Simple(SimpleKey),
    Complicated(OperationId),
}

type Bucket<V> = Vec<(Vec<Arg>, CacheEntry<V>)>;

/// A keyed store with lazy expiration.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use serde_json::json;
/// use suspense_cache::{Arg, Expiry, KeyStrategy, OperationKey, TieredStore};
/// use tick::ClockControl;
///
/// let control = ClockControl::new();
/// let mut store = TieredStore::new(KeyStrategy::PerArguments, control.to_clock());
/// let op = OperationKey::new("load_user");
///
/// store.set(&op, "ada", &[Arg::from(json!({ "id": 7 }))], Expiry::after(Duration::from_secs(1)));
///
/// // A new object with the same shape finds the entry.
/// assert_eq!(store.get(&op, &[Arg::from(json!({ "id": 7 }))]), Some("ada"));
/// assert_eq!(store.get(&op, &[Arg::from(json!({ "id": 8 }))]), None);
///
/// control.advance(Duration::from_secs(2));
/// assert_eq!(store.get(&op, &[Arg::from(json!({ "id": 7 }))]), None);
/// ```
#[derive(Debug)]
pub struct TieredStore<V> {
    strategy: KeyStrategy,
    clock: Clock,
    simple: HashMap<SimpleKey, CacheEntry<V>>,
    complicated: HashMap<OperationId, Bucket<V>>,
}

impl<V> TieredStore<V> {
    /// Creates an empty store.
    #[must_use]
    pub fn new(strategy: KeyStrategy, clock: Clock) -> Self {
        Self {
            strategy,
            clock,
            simple: HashMap::new(),
            complicated: HashMap::new(),
        }
    }

    /// Returns the key strategy chosen at construction.
    #[must_use]
    pub fn strategy(&self) -> KeyStrategy {
        self.strategy
    }

    /// Returns the clock used for expiration checks.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    fn slot(&self, operation: &OperationKey, args: &[Arg]) -> Slot {
        match (self.strategy, classify(args)) {
            (KeyStrategy::WholeFunction, _) => Slot::Simple(SimpleKey::Function(operation.id())),
            (KeyStrategy::PerArguments, ArgsKind::Simple) => Slot::Simple(SimpleKey::Text(derive_simple_key(operation, args))),
            (KeyStrategy::PerArguments, ArgsKind::Complicated) => Slot::Complicated(operation.id()),
        }
    }

    /// Stores `value` under the key for `operation` and `args`, replacing any previous entry.
    pub fn set(&mut self, operation: &OperationKey, value: V, args: &[Arg], expiry: Expiry) {
        let entry = CacheEntry::wrap(value, expiry, self.clock.system_time());

        match self.slot(operation, args) {
            Slot::Simple(key) => {
                self.simple.insert(key, entry);
            }
            Slot::Complicated(id) => {
                let bucket = self.complicated.entry(id).or_default();
                match bucket.iter_mut().find(|(stored, _)| args_match(stored, args)) {
                    Some((_, existing)) => *existing = entry,
                    None => bucket.push((args.to_vec(), entry)),
                }
            }
        }
    }

    /// Removes the entry for `operation` and `args`, expired or not.
    ///
    /// Returns `false` if there was nothing to remove, including the case where the operation has
    /// never stored complicated arguments.
    pub fn clear(&mut self, operation: &OperationKey, args: &[Arg]) -> bool {
        match self.slot(operation, args) {
            Slot::Simple(key) => self.simple.remove(&key).is_some(),
            Slot::Complicated(id) => {
                let Some(bucket) = self.complicated.get_mut(&id) else {
                    return false;
                };
                let Some(position) = bucket.iter().position(|(stored, _)| args_match(stored, args)) else {
                    return false;
                };
                bucket.remove(position);
                if bucket.is_empty() {
                    self.complicated.remove(&id);
                }
                true
            }
        }
    }

    /// Removes every entry.
    pub fn clear_all(&mut self) {
        self.simple.clear();
        self.complicated.clear();
    }

    /// Number of stored entries, including expired ones that have not been overwritten yet.
    #[must_use]
    pub fn len(&self) -> usize {
        self.simple.len() + self.complicated.values().map(Vec::len).sum::<usize>()
    }

    /// Returns `true` if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> TieredStore<V> {
    /// Returns a copy of the live value for `operation` and `args`.
    ///
    /// Expired entries read as `None` but stay in storage until overwritten or cleared.
    #[must_use]
    pub fn get(&self, operation: &OperationKey, args: &[Arg]) -> Option<V> {
        let entry = match self.slot(operation, args) {
            Slot::Simple(key) => self.simple.get(&key),
            Slot::Complicated(id) => self
                .complicated
                .get(&id)?
                .iter()
                .find(|(stored, _)| args_match(stored, args))
                .map(|(_, entry)| entry),
        }?;

        entry.read_valid(self.clock.system_time())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tick::ClockControl;

    use super::*;
    use crate::arg::Callable;

    fn store(strategy: KeyStrategy) -> TieredStore<String> {
        TieredStore::new(strategy, Clock::new_frozen())
    }

    #[test]
    fn simple_arguments_round_trip() {
        let mut store = store(KeyStrategy::PerArguments);
        let op = OperationKey::new("op");

        store.set(&op, "one".into(), &[Arg::from(1)], Expiry::Never);
        store.set(&op, "two".into(), &[Arg::from(2)], Expiry::Never);

        assert_eq!(store.get(&op, &[Arg::from(1)]).as_deref(), Some("one"));
        assert_eq!(store.get(&op, &[Arg::from(2)]).as_deref(), Some("two"));
        assert_eq!(store.get(&op, &[Arg::from(3)]), None);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn whole_function_mode_ignores_arguments() {
        let mut store = store(KeyStrategy::WholeFunction);
        let op = OperationKey::new("op");

        store.set(&op, "first".into(), &[Arg::from(1)], Expiry::Never);
        assert_eq!(store.get(&op, &[Arg::from(json!({ "any": true }))]).as_deref(), Some("first"));

        store.set(&op, "second".into(), &[Arg::from(2)], Expiry::Never);
        assert_eq!(store.get(&op, &[]).as_deref(), Some("second"));
        assert_eq!(store.len(), 1);

        assert!(store.clear(&op, &[Arg::from(99)]));
        assert!(store.is_empty());
    }

    #[test]
    fn whole_function_mode_separates_operations() {
        let mut store = store(KeyStrategy::WholeFunction);
        let a = OperationKey::new("same");
        let b = OperationKey::new("same");

        store.set(&a, "a".into(), &[], Expiry::Never);
        assert_eq!(store.get(&b, &[]), None);
    }

    #[test]
    fn complicated_arguments_match_by_shape() {
        let mut store = store(KeyStrategy::PerArguments);
        let op = OperationKey::new("op");

        store.set(&op, "seven".into(), &[Arg::from(json!({ "id": 7 }))], Expiry::Never);

        assert_eq!(store.get(&op, &[Arg::from(json!({ "id": 7 }))]).as_deref(), Some("seven"));
        assert_eq!(store.get(&op, &[Arg::from(json!({ "id": 8 }))]), None);
        assert_eq!(store.get(&op, &[Arg::from(json!({ "id": 7 })), Arg::Null]), None);
    }

    #[test]
    fn complicated_set_replaces_first_match() {
        let mut store = store(KeyStrategy::PerArguments);
        let op = OperationKey::new("op");

        store.set(&op, "old".into(), &[Arg::from(json!({ "id": 7 }))], Expiry::Never);
        store.set(&op, "new".into(), &[Arg::from(json!({ "id": 7 }))], Expiry::Never);
        store.set(&op, "other".into(), &[Arg::from(json!({ "id": 8 }))], Expiry::Never);

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&op, &[Arg::from(json!({ "id": 7 }))]).as_deref(), Some("new"));
    }

    #[test]
    fn complicated_buckets_are_per_operation() {
        let mut store = store(KeyStrategy::PerArguments);
        let a = OperationKey::new("op");
        let b = OperationKey::new("op");
        let callback = Arg::from(Callable::new(|_| Arg::Null));

        store.set(&a, "a".into(), &[callback.clone()], Expiry::Never);
        assert_eq!(store.get(&a, &[callback.clone()]).as_deref(), Some("a"));
        assert_eq!(store.get(&b, &[callback]), None);
    }

    #[test]
    fn clear_reports_whether_an_entry_was_removed() {
        let mut store = store(KeyStrategy::PerArguments);
        let op = OperationKey::new("op");
        let never_used = OperationKey::new("never_used");

        assert!(!store.clear(&never_used, &[Arg::from(json!({}))]));
        assert!(!store.clear(&never_used, &[Arg::from(1)]));

        store.set(&op, "x".into(), &[Arg::from(json!({ "id": 1 }))], Expiry::Never);
        assert!(!store.clear(&op, &[Arg::from(json!({ "id": 2 }))]));
        assert!(store.clear(&op, &[Arg::from(json!({ "id": 1 }))]));
        assert!(store.is_empty());

        store.set(&op, "y".into(), &[Arg::from("k")], Expiry::Never);
        assert!(store.clear(&op, &[Arg::from("k")]));
        assert_eq!(store.get(&op, &[Arg::from("k")]), None);
    }

    #[test]
    fn expired_entries_read_absent_but_linger() {
        let control = ClockControl::new();
        let mut store = TieredStore::new(KeyStrategy::PerArguments, control.to_clock());
        let op = OperationKey::new("op");

        store.set(&op, 1, &[], Expiry::after(Duration::from_millis(1000)));
        control.advance(Duration::from_millis(500));
        assert_eq!(store.get(&op, &[]), Some(1));

        control.advance(Duration::from_millis(1000));
        assert_eq!(store.get(&op, &[]), None);
        assert_eq!(store.len(), 1);

        store.set(&op, 2, &[], Expiry::Never);
        assert_eq!(store.get(&op, &[]), Some(2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn clear_all_empties_both_maps() {
        let mut store = store(KeyStrategy::PerArguments);
        let op = OperationKey::new("op");

        store.set(&op, "a".into(), &[Arg::from(1)], Expiry::Never);
        store.set(&op, "b".into(), &[Arg::array([1])], Expiry::Never);
        assert_eq!(store.len(), 2);

        store.clear_all();
        assert!(store.is_empty());
        assert_eq!(store.strategy(), KeyStrategy::PerArguments);
    }
}
