// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Dynamically typed argument values passed to fetch operations.
//!
//! Arguments are either *primitives* (`Null`, `Bool`, `Number`, `Str`) or *reference values*
//! (`Array`, `Object`, `Callable`). Reference values live in shared allocations, so cloning an
//! [`Arg`] keeps its identity, while building a new one with the same contents does not.

use std::{collections::BTreeMap, fmt, sync::Arc};

/// A callable argument.
///
/// Two callables are the same value only when they share the same allocation.
///
/// # Examples
///
/// ```
/// use suspense_cache::{Arg, Callable};
///
/// let double = Callable::new(|args| match args.first() {
///     Some(Arg::Number(n)) => Arg::Number(n * 2.0),
///     _ => Arg::Null,
/// });
///
/// assert!(double.ptr_eq(&double.clone()));
/// ```
#[derive(Clone)]
pub struct Callable(Arc<dyn Fn(&[Arg]) -> Arg + Send + Sync>);

impl Callable {
    /// Wraps a closure as a callable argument.
    pub fn new(func: impl Fn(&[Arg]) -> Arg + Send + Sync + 'static) -> Self {
        Self(Arc::new(func))
    }

    /// Invokes the callable.
    #[must_use]
    pub fn call(&self, args: &[Arg]) -> Arg {
        (self.0)(args)
    }

    /// Returns `true` if both callables share the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callable(..)")
    }
}

/// A single argument value.
///
/// # Examples
///
/// ```
/// use suspense_cache::Arg;
/// use serde_json::json;
///
/// let id = Arg::from(7);
/// let filter = Arg::from(json!({ "id": 7 }));
///
/// assert!(!id.is_reference());
/// assert!(filter.is_reference());
/// ```
#[derive(Clone, Debug)]
pub enum Arg {
    /// The absent value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number. All numbers are doubles, mirroring dynamically typed callers.
    Number(f64),
    /// A string.
    Str(Arc<str>),
    /// An ordered list; a reference value.
    Array(Arc<[Self]>),
    /// A string-keyed record; a reference value.
    Object(Arc<BTreeMap<String, Self>>),
    /// A callable; a reference value.
    Callable(Callable),
}

impl Arg {
    /// Builds an array argument from anything convertible into arguments.
    pub fn array<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Self>,
    {
        Self::Array(items.into_iter().map(Into::into).collect())
    }

    /// Builds an object argument from key/value pairs.
    pub fn object<I, K, T>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Self>,
    {
        Self::Object(Arc::new(fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect()))
    }

    /// Returns `true` for arrays, objects and callables.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Object(_) | Self::Callable(_))
    }

    /// Identity comparison.
    ///
    /// Primitives compare by value, except that `NaN` equals `NaN` and `0.0` differs from `-0.0`.
    /// Reference values compare by allocation.
    #[must_use]
    pub fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => Arc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Callable(a), Self::Callable(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Shallow structural comparison.
    ///
    /// Values that are [`same_value`](Self::same_value) are equal. Otherwise two arrays or two
    /// objects are equal when they have the same keys and every member is `same_value` to its
    /// counterpart. Nested reference values are compared by identity.
    #[must_use]
    pub fn shallow_eq(&self, other: &Self) -> bool {
        if self.same_value(other) {
            return true;
        }

        match (self, other) {
            (Self::Array(a), Self::Array(b)) => a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.same_value(y)),
            (Self::Object(a), Self::Object(b)) => {
                a.len() == b.len() && a.iter().all(|(key, x)| b.get(key).is_some_and(|y| x.same_value(y)))
            }
            _ => false,
        }
    }
}

/// Returns `true` when two argument sequences have equal length and are pairwise
/// [`shallow_eq`](Arg::shallow_eq).
#[must_use]
pub fn args_match(left: &[Arg], right: &[Arg]) -> bool {
    left.len() == right.len() && left.iter().zip(right).all(|(a, b)| a.shallow_eq(b))
}

pub(crate) fn write_joined(f: &mut impl fmt::Write, items: &[Arg]) -> fmt::Result {
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            f.write_char(',')?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if (1e-6..1e21).contains(&n.abs()) {
        return write!(f, "{n}");
    }

    let text = format!("{n:e}");
    match text.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => write!(f, "{mantissa}e+{exponent}"),
        _ => f.write_str(&text),
    }
}

/// Textual form used for simple cache keys.
///
/// `Null` renders as the empty string, arrays render their elements joined by `,`, objects render
/// as `[object Object]` and callables as `function`. Numbers use the shortest text that round-trips,
/// in exponent form (`1e+21`, `1.5e-7`) when their magnitude is below `1e-6` or at least `1e21`.
impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) if n.is_nan() => f.write_str("NaN"),
            Self::Number(n) if n.is_infinite() => f.write_str(if n.is_sign_positive() { "Infinity" } else { "-Infinity" }),
            Self::Number(n) if *n == 0.0 => f.write_str("0"),
            Self::Number(n) => write_number(f, *n),
            Self::Str(s) => f.write_str(s),
            Self::Array(items) => write_joined(f, items),
            Self::Object(_) => f.write_str("[object Object]"),
            Self::Callable(_) => f.write_str("function"),
        }
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for Arg {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<i64> for Arg {
    #[expect(clippy::cast_precision_loss, reason = "arguments are doubles, like the callers that produce them")]
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<u64> for Arg {
    #[expect(clippy::cast_precision_loss, reason = "arguments are doubles, like the callers that produce them")]
    fn from(value: u64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Self::Str(Arc::from(value))
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Self::Str(Arc::from(value))
    }
}

impl From<Vec<Self>> for Arg {
    fn from(value: Vec<Self>) -> Self {
        Self::Array(Arc::from(value))
    }
}

impl From<Callable> for Arg {
    fn from(value: Callable) -> Self {
        Self::Callable(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Converts JSON into arguments. Every JSON array or object becomes a fresh reference value.
impl From<serde_json::Value> for Arg {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Self::from(s),
            Value::Array(items) => Self::array(items),
            Value::Object(fields) => Self::object(fields),
        }
    }
}
