// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Normalization of the supported call shapes into a [`FetchRequest`].

use std::{
    fmt,
    time::{Duration, SystemTime},
};

use suspense_cache::{Arg, Expiry};

use crate::{ConfigError, Operation};

/// The options record accepted by [`FetchScope::fetch`](crate::FetchScope::fetch).
///
/// When the operation or the arguments are also passed positionally, the positional values win.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use suspense_fetch::{Arg, FetchOptions, Operation, OperationError};
///
/// let op = Operation::named("load", |_| async { Ok::<_, OperationError>(1) });
/// let options = FetchOptions::new()
///     .fetch(op)
///     .args(vec![Arg::from(7)])
///     .expire(Duration::from_secs(30));
/// ```
pub struct FetchOptions<V> {
    fetch: Option<Operation<V>>,
    args: Option<Arg>,
    expire: Option<Duration>,
    expire_time: Option<SystemTime>,
}

impl<V> FetchOptions<V> {
    /// Creates an empty options record.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fetch: None,
            args: None,
            expire: None,
            expire_time: None,
        }
    }

    /// Sets the operation to call.
    #[must_use]
    pub fn fetch(self, operation: Operation<V>) -> Self {
        Self {
            fetch: Some(operation),
            ..self
        }
    }

    /// Sets the arguments. Anything but an array is rejected when the request is normalized.
    #[must_use]
    pub fn args(self, args: impl Into<Arg>) -> Self {
        Self {
            args: Some(args.into()),
            ..self
        }
    }

    /// Expires the cached result this long after it is stored. Zero means never.
    #[must_use]
    pub fn expire(self, duration: Duration) -> Self {
        Self {
            expire: Some(duration),
            ..self
        }
    }

    /// Expires the cached result at this time. The UNIX epoch means never.
    #[must_use]
    pub fn expire_time(self, time: SystemTime) -> Self {
        Self {
            expire_time: Some(time),
            ..self
        }
    }

    /// Expires the cached result at this many milliseconds after the UNIX epoch. Zero means never.
    #[must_use]
    pub fn expire_time_millis(self, millis: u64) -> Self {
        self.expire_time(SystemTime::UNIX_EPOCH + Duration::from_millis(millis))
    }
}

impl<V> Default for FetchOptions<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for FetchOptions<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("fetch", &self.fetch)
            .field("args", &self.args)
            .field("expire", &self.expire)
            .field("expire_time", &self.expire_time)
            .finish()
    }
}

/// One of the call shapes accepted by [`FetchScope::fetch`](crate::FetchScope::fetch).
///
/// Usually built through `From`:
///
/// | Shape | Converts from |
/// |-------|---------------|
/// | options record | `FetchOptions<V>` |
/// | operation | `Operation<V>` |
/// | operation + arguments | `(Operation<V>, Vec<Arg>)` |
/// | operation + options | `(Operation<V>, FetchOptions<V>)` |
/// | operation + arguments + options | `(Operation<V>, Vec<Arg>, FetchOptions<V>)` |
#[derive(Debug)]
pub enum FetchCall<V> {
    /// A single options record.
    Options(FetchOptions<V>),
    /// An operation called without arguments.
    Operation(Operation<V>),
    /// An operation and its arguments.
    WithArgs(Operation<V>, Vec<Arg>),
    /// An operation and an options record.
    WithOptions(Operation<V>, FetchOptions<V>),
    /// An operation, its arguments and an options record.
    Full(Operation<V>, Vec<Arg>, FetchOptions<V>),
}

impl<V> FetchCall<V> {
    /// Validates the call and produces the canonical request.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `args` is not an array, no operation was given, or both
    /// expiration options are set.
    pub fn normalize(self) -> Result<FetchRequest<V>, ConfigError> {
        let options = match self {
            Self::Options(options) => options,
            Self::Operation(operation) => FetchOptions::new().fetch(operation),
            Self::WithArgs(operation, args) => FetchOptions::new().fetch(operation).args(args),
            Self::WithOptions(operation, options) => options.fetch(operation),
            Self::Full(operation, args, options) => options.fetch(operation).args(args),
        };

        let args = match options.args {
            None => Vec::new(),
            Some(Arg::Array(items)) => items.to_vec(),
            Some(other) => {
                return Err(ConfigError::ArgsNotSequence { found: kind_name(&other) });
            }
        };
        let operation = options.fetch.ok_or(ConfigError::MissingOperation)?;
        let expiry = expiry_from(options.expire, options.expire_time)?;

        Ok(FetchRequest { operation, args, expiry })
    }
}

fn kind_name(arg: &Arg) -> &'static str {
    match arg {
        Arg::Null => "null",
        Arg::Bool(_) => "boolean",
        Arg::Number(_) => "number",
        Arg::Str(_) => "string",
        Arg::Array(_) => "array",
        Arg::Object(_) => "object",
        Arg::Callable(_) => "callable",
    }
}

/// Resolves the two expiration options into one [`Expiry`]. Zero values count as unset.
pub(crate) fn expiry_from(expire: Option<Duration>, expire_time: Option<SystemTime>) -> Result<Expiry, ConfigError> {
    let relative = expire.map_or(Expiry::Never, Expiry::after);
    let absolute = expire_time.map_or(Expiry::Never, Expiry::at);

    match (relative, absolute) {
        (Expiry::Never, expiry) | (expiry, Expiry::Never) => Ok(expiry),
        _ => Err(ConfigError::ConflictingExpiry),
    }
}

impl<V> From<FetchOptions<V>> for FetchCall<V> {
    fn from(options: FetchOptions<V>) -> Self {
        Self::Options(options)
    }
}

impl<V> From<Operation<V>> for FetchCall<V> {
    fn from(operation: Operation<V>) -> Self {
        Self::Operation(operation)
    }
}

impl<V> From<(Operation<V>, Vec<Arg>)> for FetchCall<V> {
    fn from((operation, args): (Operation<V>, Vec<Arg>)) -> Self {
        Self::WithArgs(operation, args)
    }
}

impl<V> From<(Operation<V>, FetchOptions<V>)> for FetchCall<V> {
    fn from((operation, options): (Operation<V>, FetchOptions<V>)) -> Self {
        Self::WithOptions(operation, options)
    }
}

impl<V> From<(Operation<V>, Vec<Arg>, FetchOptions<V>)> for FetchCall<V> {
    fn from((operation, args, options): (Operation<V>, Vec<Arg>, FetchOptions<V>)) -> Self {
        Self::Full(operation, args, options)
    }
}

/// A validated request: operation, arguments and expiration.
pub struct FetchRequest<V> {
    operation: Operation<V>,
    args: Vec<Arg>,
    expiry: Expiry,
}

impl<V> FetchRequest<V> {
    /// Creates a request directly, bypassing call-shape normalization.
    #[must_use]
    pub fn new(operation: Operation<V>, args: Vec<Arg>, expiry: Expiry) -> Self {
        Self { operation, args, expiry }
    }

    /// The operation to call.
    #[must_use]
    pub fn operation(&self) -> &Operation<V> {
        &self.operation
    }

    /// The arguments to pass.
    #[must_use]
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// The expiration applied when the result is cached.
    #[must_use]
    pub fn expiry(&self) -> Expiry {
        self.expiry
    }
}

impl<V> Clone for FetchRequest<V> {
    fn clone(&self) -> Self {
        Self {
            operation: self.operation.clone(),
            args: self.args.clone(),
            expiry: self.expiry,
        }
    }
}

impl<V> fmt::Debug for FetchRequest<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchRequest")
            .field("operation", &self.operation)
            .field("args", &self.args)
            .field("expiry", &self.expiry)
            .finish()
    }
}
