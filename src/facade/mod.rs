//! The request handler: cached response on hit, root document on miss.
//!
//! Every request makes exactly one pass:
//!
//! 1. Take the request target (path plus query, as received).
//! 2. Look it up in the [`CacheStore`], if the facade has one.
//!    - Hit: replay the record's headers in order, write its bytes.
//!    - Miss: read the root document from disk, send it as `text/html`.
//! 3. End the response. This happens on every path, including a failed
//!    read or a client that already went away.
//!
//! A failed read answers `500 Internal Server Error` with an empty body.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::cache::{CacheRecord, CacheStore};
use crate::config::FacadeConfig;
use crate::http::{Request, StatusCode};
use crate::sink::{ResponseSink, SinkError};

/// Errors that can occur while answering a single request.
///
/// These never leave [`Facade::handle`]; they are logged and turned into
/// the best response still possible.
#[derive(Debug, Error)]
pub enum FacadeError {
    #[error("failed to read root document {path}: {source}")]
    ReadRootDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Cache-first HTTP handler with a single static fallback document.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use double_facade::{Facade, FacadeConfig, Server};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let facade = Arc::new(Facade::new(FacadeConfig::default()));
///     facade.cache_save(
///         "/missing.html",
///         "Hello, World!",
///         [("Content-Type", "text/plain;charset=utf-8")],
///     );
///
///     Server::bind("127.0.0.1:8080").await?.serve(facade).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Facade {
    config: FacadeConfig,
    cache: Option<Arc<CacheStore>>,
}

impl Facade {
    /// Creates a facade with its own, initially empty, cache.
    pub fn new(config: FacadeConfig) -> Self {
        Self::with_cache(config, Arc::new(CacheStore::new()))
    }

    /// Creates a facade backed by an existing cache, e.g. one shared with a
    /// process that pre-populates it.
    pub fn with_cache(config: FacadeConfig, cache: Arc<CacheStore>) -> Self {
        Self {
            config,
            cache: Some(cache),
        }
    }

    /// Creates a facade without a cache. Every request gets the root document.
    pub fn without_cache(config: FacadeConfig) -> Self {
        Self {
            config,
            cache: None,
        }
    }

    pub fn config(&self) -> &FacadeConfig {
        &self.config
    }

    /// The cache this facade consults, if any.
    pub fn cache(&self) -> Option<&Arc<CacheStore>> {
        self.cache.as_ref()
    }

    /// Stores a response to be served verbatim for requests to `path`.
    ///
    /// Ignored, with a warning, on a facade built with [`without_cache`](Self::without_cache).
    pub fn cache_save<I, K, V>(&self, path: impl Into<String>, data: impl Into<Bytes>, headers: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        match &self.cache {
            Some(cache) => cache.save(path, data, headers),
            None => {
                let path = path.into();
                warn!(path = %path, "cache save ignored: facade has no cache");
            }
        }
    }

    /// Answers one request and ends `response` exactly once.
    ///
    /// Never fails: errors are logged, and a root document that cannot be
    /// read produces an empty `500` response.
    pub async fn handle<S: ResponseSink>(&self, request: &Request, mut response: S) {
        let target = request.target();

        if let Err(e) = self.respond(target, &mut response).await {
            match &e {
                FacadeError::ReadRootDocument { .. } => {
                    error!(path = %target, error = %e, "root document unavailable");
                    if let Err(e) = response.set_status(StatusCode::InternalServerError) {
                        debug!(path = %target, error = %e, "could not report read failure");
                    }
                }
                FacadeError::Sink(_) => {
                    debug!(path = %target, error = %e, "client went away mid-response");
                }
            }
        }

        if let Err(e) = response.end() {
            debug!(path = %target, error = %e, "response ended after client went away");
        }
    }

    async fn respond<S: ResponseSink>(
        &self,
        target: &str,
        response: &mut S,
    ) -> Result<(), FacadeError> {
        if let Some(record) = self.cache.as_ref().and_then(|cache| cache.lookup(target)) {
            debug!(path = %target, "cache hit");
            return replay(&record, response);
        }

        debug!(path = %target, "cache miss, serving root document");
        let path = self.config.root_document_path();
        let document = tokio::fs::read(&path)
            .await
            .map_err(|source| FacadeError::ReadRootDocument { path, source })?;

        response.set_header("Content-Type", &self.config.content_type)?;
        response.write(&document)?;
        Ok(())
    }
}

fn replay<S: ResponseSink>(record: &CacheRecord, response: &mut S) -> Result<(), FacadeError> {
    for (name, value) in record.headers().iter() {
        response.set_header(name, value)?;
    }
    response.write(record.data())?;
    Ok(())
}
