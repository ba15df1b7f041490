// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Operation identity and argument classification.

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::arg::{Arg, write_joined};

static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of an operation. Identifiers are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(u64);

impl OperationId {
    /// Returns the raw identifier.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// The identity of an operation together with its textual description.
///
/// Equality and hashing only consider the identity. The description feeds simple cache keys, so
/// two operations with the same description and the same primitive arguments share a simple key.
///
/// # Examples
///
/// ```
/// use suspense_cache::OperationKey;
///
/// let a = OperationKey::new("load_user");
/// let b = OperationKey::new("load_user");
///
/// assert_ne!(a, b);
/// assert_eq!(a, a.clone());
/// assert_eq!(a.description(), b.description());
/// ```
#[derive(Clone, Debug)]
pub struct OperationKey {
    id: OperationId,
    description: Arc<str>,
}

impl OperationKey {
    /// Allocates a fresh identity with the given description.
    pub fn new(description: impl Into<Arc<str>>) -> Self {
        Self {
            id: OperationId(NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed)),
            description: description.into(),
        }
    }

    /// Returns the identity of the operation.
    #[must_use]
    pub fn id(&self) -> OperationId {
        self.id
    }

    /// Returns the textual description of the operation.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl PartialEq for OperationKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for OperationKey {}

impl Hash for OperationKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Classification of an argument list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgsKind {
    /// Only primitives; keyed by a derived string.
    Simple,
    /// At least one array, object or callable; keyed by shallow comparison.
    Complicated,
}

impl ArgsKind {
    /// Returns a short label for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Complicated => "complicated",
        }
    }
}

/// Classifies an argument list.
///
/// # Examples
///
/// ```
/// use suspense_cache::{Arg, ArgsKind, classify};
///
/// assert_eq!(classify(&[Arg::from(1), Arg::Null]), ArgsKind::Simple);
/// assert_eq!(classify(&[Arg::array([1])]), ArgsKind::Complicated);
/// ```
#[must_use]
pub fn classify(args: &[Arg]) -> ArgsKind {
    if args.iter().any(Arg::is_reference) {
        ArgsKind::Complicated
    } else {
        ArgsKind::Simple
    }
}

/// Derives the string key for a simple argument list: the operation description followed by the
/// arguments joined with `,`.
///
/// # Examples
///
/// ```
/// use suspense_cache::{Arg, OperationKey, derive_simple_key};
///
/// let op = OperationKey::new("search");
/// assert_eq!(derive_simple_key(&op, &[Arg::from("rust"), Arg::from(2)]), "searchrust,2");
/// ```
#[must_use]
pub fn derive_simple_key(operation: &OperationKey, args: &[Arg]) -> String {
    let mut key = String::from(operation.description());
    // Writing into a String cannot fail.
    let _ = write_joined(&mut key, args);
    key
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::arg::Callable;

    #[test]
    fn classify_detects_reference_values() {
        assert_eq!(classify(&[]), ArgsKind::Simple);
        assert_eq!(classify(&[Arg::from("a"), Arg::from(1), Arg::Null, Arg::from(true)]), ArgsKind::Simple);
        assert_eq!(classify(&[Arg::from(1), Arg::from(json!({}))]), ArgsKind::Complicated);
        assert_eq!(classify(&[Arg::from(Callable::new(|_| Arg::Null))]), ArgsKind::Complicated);
    }

    #[test]
    fn simple_key_is_deterministic() {
        let op = OperationKey::new("load");
        let args = [Arg::from(1), Arg::from("x")];
        assert_eq!(derive_simple_key(&op, &args), derive_simple_key(&op, &args));
        assert_eq!(derive_simple_key(&op, &args), "load1,x");
    }

    #[test]
    fn simple_key_distinguishes_argument_values() {
        let op = OperationKey::new("load");
        assert_ne!(derive_simple_key(&op, &[Arg::from(1)]), derive_simple_key(&op, &[Arg::from(2)]));
    }

    #[test]
    fn same_description_shares_simple_key() {
        let a = OperationKey::new("same");
        let b = OperationKey::new("same");
        assert_ne!(a.id(), b.id());
        assert_eq!(derive_simple_key(&a, &[Arg::from(1)]), derive_simple_key(&b, &[Arg::from(1)]));
    }

    #[test]
    fn operation_ids_are_unique_and_displayable() {
        let a = OperationKey::new("a");
        let b = OperationKey::new("a");
        assert!(b.id() > a.id());
        assert_eq!(a.id().to_string(), format!("op#{}", a.id().get()));
    }
}
