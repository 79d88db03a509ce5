//! In-memory response cache keyed by request target.
//!
//! Entries are only ever added through [`CacheStore::save`]; nothing expires
//! and nothing is evicted. A save replaces the whole record for its key in a
//! single step, so concurrent readers observe either the previous record or
//! the new one.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;

use crate::http::Headers;

/// A cached response: body bytes plus the headers to replay with them.
///
/// Records have no mutating API. Replacing one means saving a new record
/// under the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    data: Bytes,
    headers: Headers,
}

impl CacheRecord {
    /// Builds a record. Duplicate header names keep the last value.
    pub fn new<I, K, V>(data: impl Into<Bytes>, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            data: data.into(),
            headers: headers.into_iter().collect(),
        }
    }

    /// The response body.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// The headers, in the order they will be set on the response.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }
}

/// A concurrency-safe map from request target to [`CacheRecord`].
///
/// # Examples
///
/// ```
/// use double_facade::cache::CacheStore;
///
/// let cache = CacheStore::new();
/// cache.save(
///     "/missing.html",
///     "Hello, World!",
///     [("Content-Type", "text/plain;charset=utf-8")],
/// );
///
/// let record = cache.lookup("/missing.html").unwrap();
/// assert_eq!(record.data().as_ref(), b"Hello, World!");
/// assert!(cache.lookup("/other").is_none());
/// ```
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: RwLock<HashMap<String, Arc<CacheRecord>>>,
}

impl CacheStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a response for `key`, replacing whatever was there.
    ///
    /// The key is used verbatim: no normalization, no validation.
    pub fn save<I, K, V>(&self, key: impl Into<String>, data: impl Into<Bytes>, headers: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let record = Arc::new(CacheRecord::new(data, headers));
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), record);
    }

    /// Returns the record saved under `key`, if any.
    pub fn lookup(&self, key: &str) -> Option<Arc<CacheRecord>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Returns `true` if a record exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
