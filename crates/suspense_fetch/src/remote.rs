// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Fetching by URL through a pluggable [`Transport`].
//!
//! [`RemoteFetcher`] turns URL-based calls into requests on a [`FetchScope`]. Each distinct
//! logical request (URL, data and extra options) is mapped to one [`Operation`], so repeated
//! calls for the same request hit the same cache entry.

use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
    time::{Duration, SystemTime},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    ConfigError, FetchError, FetchRequest, FetchScope, Fetched, Operation, OperationError, Suspense, request::expiry_from,
};

/// Performs the actual retrieval of a remote request.
///
/// # Examples
///
/// ```
/// use suspense_fetch::{OperationError, RemoteRequest, Transport};
///
/// struct Echo;
///
/// impl Transport<String> for Echo {
///     async fn retrieve(&self, request: RemoteRequest) -> Result<String, OperationError> {
///         Ok(request.url().to_owned())
///     }
/// }
/// ```
pub trait Transport<V>: Send + Sync + 'static {
    /// Retrieves the value for `request`.
    fn retrieve(&self, request: RemoteRequest) -> impl Future<Output = Result<V, OperationError>> + Send;
}

/// A request handed to a [`Transport`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RemoteRequest {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    extra: Map<String, Value>,
}

impl RemoteRequest {
    /// The URL to retrieve.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The request payload, if any.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Options not interpreted by the fetcher, passed through unchanged.
    #[must_use]
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// A string that is equal for two requests exactly when their content is equal.
    ///
    /// Object keys are ordered, so field order in the input does not matter.
    fn canonical(&self) -> String {
        let mut map = Map::new();
        map.insert("url".to_owned(), Value::String(self.url.clone()));
        map.insert("data".to_owned(), self.data.clone().unwrap_or(Value::Null));
        map.insert("extra".to_owned(), Value::Object(self.extra.clone()));
        Value::Object(map).to_string()
    }
}

/// The options record for a remote call.
///
/// Deserializes from JSON such as
/// `{ "url": "/api/user", "data": [1], "expire": 60000, "method": "POST" }`. Fields other than
/// `url`, `data`, `expire` and `expireTime` are passed through to the transport.
///
/// # Examples
///
/// ```
/// use suspense_fetch::RemoteOptions;
///
/// let options: RemoteOptions = serde_json::from_value(serde_json::json!({
///     "url": "/api/user",
///     "expire": 60000,
///     "method": "POST",
/// }))
/// .unwrap();
///
/// assert_eq!(options, RemoteOptions::new().url("/api/user").expire_millis(60_000).field("method", "POST"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    /// Milliseconds after caching at which the result expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expire: Option<u64>,
    /// Milliseconds since the UNIX epoch at which the result expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expire_time: Option<u64>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl RemoteOptions {
    /// Creates an empty options record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the URL.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the request payload.
    #[must_use]
    pub fn data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Expires the cached result this many milliseconds after it is stored. Zero means never.
    #[must_use]
    pub fn expire_millis(mut self, millis: u64) -> Self {
        self.expire = Some(millis);
        self
    }

    /// Expires the cached result at this many milliseconds after the UNIX epoch. Zero means never.
    #[must_use]
    pub fn expire_time_millis(mut self, millis: u64) -> Self {
        self.expire_time = Some(millis);
        self
    }

    /// Adds an option passed through to the transport.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// One of the call shapes accepted by [`RemoteFetcher::fetch`].
///
/// | Shape | Converts from |
/// |-------|---------------|
/// | URL | `&str`, `String` |
/// | URL + data | `(&str, Vec<Value>)` |
/// | URL + options | `(&str, RemoteOptions)` |
/// | URL + data + options | `(&str, Vec<Value>, RemoteOptions)` |
/// | options record | `RemoteOptions` |
///
/// Positional URL and data override the options record.
#[derive(Clone, Debug, PartialEq)]
pub enum RemoteCall {
    /// A URL without payload.
    Url(String),
    /// A URL and a positional payload.
    UrlWithData(String, Vec<Value>),
    /// A URL and an options record.
    UrlWithOptions(String, RemoteOptions),
    /// A URL, a positional payload and an options record.
    UrlDataOptions(String, Vec<Value>, RemoteOptions),
    /// A single options record carrying the URL.
    Options(RemoteOptions),
}

impl RemoteCall {
    fn into_options(self) -> RemoteOptions {
        match self {
            Self::Url(url) => RemoteOptions::new().url(url),
            Self::UrlWithData(url, data) => RemoteOptions::new().url(url).data(data),
            Self::UrlWithOptions(url, options) => options.url(url),
            Self::UrlDataOptions(url, data, options) => options.url(url).data(data),
            Self::Options(options) => options,
        }
    }
}

impl From<&str> for RemoteCall {
    fn from(url: &str) -> Self {
        Self::Url(url.to_owned())
    }
}

impl From<String> for RemoteCall {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl From<(&str, Vec<Value>)> for RemoteCall {
    fn from((url, data): (&str, Vec<Value>)) -> Self {
        Self::UrlWithData(url.to_owned(), data)
    }
}

impl From<(&str, RemoteOptions)> for RemoteCall {
    fn from((url, options): (&str, RemoteOptions)) -> Self {
        Self::UrlWithOptions(url.to_owned(), options)
    }
}

impl From<(&str, Vec<Value>, RemoteOptions)> for RemoteCall {
    fn from((url, data, options): (&str, Vec<Value>, RemoteOptions)) -> Self {
        Self::UrlDataOptions(url.to_owned(), data, options)
    }
}

impl From<RemoteOptions> for RemoteCall {
    fn from(options: RemoteOptions) -> Self {
        Self::Options(options)
    }
}

/// Issues URL-based requests on a [`FetchScope`].
///
/// # Examples
///
/// ```
/// use futures::executor::block_on;
/// use serde_json::json;
/// use suspense_fetch::{FetchScope, OperationError, RemoteFetcher, RemoteRequest, Transport};
///
/// struct Echo;
///
/// impl Transport<String> for Echo {
///     async fn retrieve(&self, request: RemoteRequest) -> Result<String, OperationError> {
///         Ok(format!("{} {}", request.url(), request.data().unwrap_or(&json!(null))))
///     }
/// }
///
/// let fetcher = RemoteFetcher::new(FetchScope::new(), Echo);
/// let fetched = block_on(fetcher.resolve(("/api/user", vec![json!(7)]))).unwrap();
/// assert_eq!(fetched.value(), "/api/user [7]");
/// ```
pub struct RemoteFetcher<V, T> {
    scope: FetchScope<V>,
    transport: Arc<T>,
    operations: Mutex<HashMap<String, Operation<V>>>,
}

impl<V, T> RemoteFetcher<V, T> {
    /// Creates a fetcher issuing requests on `scope` and retrieving through `transport`.
    #[must_use]
    pub fn new(scope: FetchScope<V>, transport: T) -> Self {
        Self {
            scope,
            transport: Arc::new(transport),
            operations: Mutex::new(HashMap::new()),
        }
    }

    /// The scope requests are issued on.
    #[must_use]
    pub fn scope(&self) -> &FetchScope<V> {
        &self.scope
    }

    /// Number of distinct logical requests seen so far.
    #[must_use]
    pub fn operations_len(&self) -> usize {
        self.operations.lock().len()
    }
}

impl<V, T> RemoteFetcher<V, T>
where
    V: Clone + Send + Sync + 'static,
    T: Transport<V>,
{
    /// Normalizes `call` into a request without issuing it.
    ///
    /// Identical logical requests yield the same operation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingUrl`] if no non-empty URL was given, and
    /// [`ConfigError::ConflictingExpiry`] if both expiration options are set.
    pub fn prepare(&self, call: impl Into<RemoteCall>) -> Result<FetchRequest<V>, ConfigError> {
        let options = call.into().into_options();
        let url = options.url.filter(|url| !url.is_empty()).ok_or(ConfigError::MissingUrl)?;
        let expiry = expiry_from(
            options.expire.map(Duration::from_millis),
            options
                .expire_time
                .map(|millis| SystemTime::UNIX_EPOCH + Duration::from_millis(millis)),
        )?;

        let request = RemoteRequest {
            url,
            data: options.data,
            extra: options.extra,
        };
        let key = request.canonical();
        let description = format!("remote {key}");

        let operation = self
            .operations
            .lock()
            .entry(key)
            .or_insert_with(|| self.derive(description, request))
            .clone();

        Ok(FetchRequest::new(operation, Vec::new(), expiry))
    }

    /// Normalizes `call` and issues it once.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the call is malformed.
    pub fn fetch(&self, call: impl Into<RemoteCall>) -> Result<Suspense<V>, ConfigError> {
        let request = self.prepare(call)?;
        Ok(self.scope.request(&request))
    }

    /// Normalizes `call` and drives it until it is ready or failed.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Config`] for a malformed call and [`FetchError::Operation`] if the
    /// transport fails.
    pub async fn resolve(&self, call: impl Into<RemoteCall>) -> Result<Fetched<V>, FetchError> {
        let request = self.prepare(call)?;
        self.scope.resolve_request(&request).await
    }

    fn derive(&self, description: String, request: RemoteRequest) -> Operation<V> {
        let transport = Arc::clone(&self.transport);
        Operation::named(description, move |_| {
            let transport = Arc::clone(&transport);
            let request = request.clone();
            async move { transport.retrieve(request).await }
        })
    }
}

impl<V, T> fmt::Debug for RemoteFetcher<V, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFetcher")
            .field("scope", &self.scope)
            .field("operations", &self.operations_len())
            .finish_non_exhaustive()
    }
}
