// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Expiration policy for stored values.

use std::time::{Duration, SystemTime};

/// When a cached value stops being served.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use suspense_cache::Expiry;
///
/// let expiry = Expiry::after(Duration::from_secs(5));
/// assert_eq!(expiry, Expiry::After(Duration::from_secs(5)));
/// assert_eq!(Expiry::after(Duration::ZERO), Expiry::Never);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Expiry {
    /// The value never expires.
    #[default]
    Never,
    /// The value expires once this much time has passed since it was stored.
    After(Duration),
    /// The value expires once the clock passes this time.
    At(SystemTime),
}

impl Expiry {
    /// Relative expiry. A zero duration means no expiry.
    #[must_use]
    pub fn after(duration: Duration) -> Self {
        if duration.is_zero() { Self::Never } else { Self::After(duration) }
    }

    /// Absolute expiry. The UNIX epoch itself means no expiry.
    #[must_use]
    pub fn at(time: SystemTime) -> Self {
        if time == SystemTime::UNIX_EPOCH { Self::Never } else { Self::At(time) }
    }
}

/// A stored value with its expiration bookkeeping.
///
/// The bookkeeping lives beside the value, so readers only ever get the bare value back from
/// [`read_valid`](Self::read_valid).
///
/// # Examples
///
/// ```
/// use std::time::{Duration, SystemTime};
///
/// use suspense_cache::{CacheEntry, Expiry};
///
/// let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
/// let entry = CacheEntry::wrap("profile", Expiry::after(Duration::from_millis(1000)), t0);
///
/// assert_eq!(entry.read_valid(t0 + Duration::from_millis(500)), Some("profile"));
/// assert_eq!(entry.read_valid(t0 + Duration::from_millis(1500)), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry<V> {
    value: V,
    expire_after: Option<Duration>,
    created_at: Option<SystemTime>,
    expire_at: Option<SystemTime>,
}

impl<V> CacheEntry<V> {
    /// Creates an entry that never expires.
    pub fn new(value: V) -> Self {
        Self {
            value,
            expire_after: None,
            created_at: None,
            expire_at: None,
        }
    }

    /// Tags a value with the bookkeeping `expiry` needs, using `now` as the creation time.
    pub fn wrap(value: V, expiry: Expiry, now: SystemTime) -> Self {
        match expiry {
            Expiry::Never => Self::new(value),
            Expiry::After(duration) => Self {
                value,
                expire_after: Some(duration),
                created_at: Some(now),
                expire_at: None,
            },
            Expiry::At(time) => Self {
                value,
                expire_after: None,
                created_at: None,
                expire_at: Some(time),
            },
        }
    }

    /// Relative lifetime, if any.
    #[must_use]
    pub fn expire_after(&self) -> Option<Duration> {
        self.expire_after
    }

    /// Creation time recorded for relative lifetimes.
    #[must_use]
    pub fn created_at(&self) -> Option<SystemTime> {
        self.created_at
    }

    /// Absolute expiration time, if any.
    #[must_use]
    pub fn expire_at(&self) -> Option<SystemTime> {
        self.expire_at
    }

    /// Returns `true` if the entry carries no expiration bookkeeping.
    #[must_use]
    pub fn is_untagged(&self) -> bool {
        self.expire_after.is_none() && self.expire_at.is_none()
    }

    /// Returns `true` if the entry must not be served at `now`.
    ///
    /// A relative lifetime expires once `created_at + expire_after < now`; an absolute one once
    /// `now > expire_at`.
    #[must_use]
    pub fn is_expired(&self, now: SystemTime) -> bool {
        if let Some(expire_after) = self.expire_after {
            return match self.created_at.and_then(|created| created.checked_add(expire_after)) {
                Some(deadline) => deadline < now,
                // An unrepresentable deadline lies beyond any clock reading.
                None => self.created_at.is_none(),
            };
        }

        self.expire_at.is_some_and(|deadline| now > deadline)
    }

    /// Consumes the entry and returns the bare value.
    #[must_use]
    pub fn into_value(self) -> V {
        self.value
    }

    /// Returns the bare value regardless of expiry.
    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }
}

impl<V: Clone> CacheEntry<V> {
    /// Returns a copy of the value, or `None` if the entry has expired at `now`.
    #[must_use]
    pub fn read_valid(&self, now: SystemTime) -> Option<V> {
        if self.is_expired(now) { None } else { Some(self.value.clone()) }
    }
}

impl<V> From<V> for CacheEntry<V> {
    fn from(value: V) -> Self {
        Self::new(value)
    }
}
