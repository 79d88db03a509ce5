//! Facade configuration — where the root document lives and how it is labelled.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default directory holding static assets, relative to the working directory.
pub const DEFAULT_STATIC_ROOT: &str = "static";

/// Default filename of the root document.
pub const DEFAULT_ROOT_DOCUMENT: &str = "index.html";

/// Content type sent with the root document.
pub const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// Errors produced while loading a [`FacadeConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid facade configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings for the cache-miss fallback.
///
/// Missing fields take their defaults, so `{}` is a valid configuration.
///
/// # Examples
///
/// ```
/// use double_facade::config::FacadeConfig;
///
/// let config = FacadeConfig::from_json(r#"{ "static_root": "/srv/www" }"#).unwrap();
/// assert_eq!(
///     config.root_document_path(),
///     std::path::Path::new("/srv/www/index.html"),
/// );
/// assert_eq!(config.content_type, "text/html");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacadeConfig {
    /// Directory the root document is read from. Relative paths resolve
    /// against the working directory at read time.
    pub static_root: PathBuf,
    /// Filename of the root document inside `static_root`.
    pub root_document: String,
    /// `Content-Type` sent with the root document.
    pub content_type: String,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self {
            static_root: PathBuf::from(DEFAULT_STATIC_ROOT),
            root_document: DEFAULT_ROOT_DOCUMENT.to_owned(),
            content_type: DEFAULT_CONTENT_TYPE.to_owned(),
        }
    }
}

impl FacadeConfig {
    /// Parses a configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the input is not valid JSON or has
    /// fields of the wrong type.
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Uses `static_root` as the static-assets directory.
    #[must_use]
    pub fn with_static_root(mut self, static_root: impl Into<PathBuf>) -> Self {
        self.static_root = static_root.into();
        self
    }

    /// Uses `root_document` as the fallback filename.
    #[must_use]
    pub fn with_root_document(mut self, root_document: impl Into<String>) -> Self {
        self.root_document = root_document.into();
        self
    }

    /// Full path of the root document.
    pub fn root_document_path(&self) -> PathBuf {
        self.static_root.join(&self.root_document)
    }

    pub fn static_root(&self) -> &Path {
        &self.static_root
    }
}
