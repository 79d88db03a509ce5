//! HTTP header map with case-insensitive name lookup.
//!
//! Names compare case-insensitively per [RFC 9110 §5.1] and entries keep
//! their insertion order, which is the order they are replayed onto a
//! response.
//!
//! [RFC 9110 §5.1]: https://www.rfc-editor.org/rfc/rfc9110#section-5.1

/// A case-insensitive, insertion-ordered HTTP header map.
///
/// [`insert`](Self::insert) appends (parsed request headers may repeat a
/// name), while [`set`](Self::set) replaces every existing entry with that
/// name in place. Collecting an iterator of pairs uses `set`, so a header
/// map built from pairs behaves like a plain name → value mapping.
///
/// # Examples
///
/// ```
/// use double_facade::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Set-Cookie", "a=1");
/// headers.insert("Set-Cookie", "b=2");
/// headers.set("Content-Type", "text/plain");
/// headers.set("content-type", "text/html");
///
/// assert_eq!(headers.get("CONTENT-TYPE"), Some("text/html"));
/// let cookies: Vec<_> = headers.get_all("set-cookie").collect();
/// assert_eq!(cookies, vec!["a=1", "b=2"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header map with pre-allocated capacity for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    /// Appends a header entry. Multiple values for the same name are preserved.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Sets a header, replacing all existing values for the name.
    ///
    /// The replacement keeps the position of the first existing entry; a new
    /// name is appended.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let mut seen = false;
        self.inner.retain(|(k, _)| {
            if !k.eq_ignore_ascii_case(&name) {
                return true;
            }
            let first = !seen;
            seen = true;
            first
        });

        match self
            .inner
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some(entry) => *entry = (name, value),
            None => self.inner.push((name, value)),
        }
    }

    /// Returns the first value for the given header name (case-insensitive), or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns an iterator over all values for the given header name (case-insensitive).
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.inner
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Removes all entries with the given header name (case-insensitive).
    ///
    /// Returns `true` if any entries were removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.inner.len();
        self.inner.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.inner.len() < before
    }

    /// Returns `true` if the map contains at least one entry with the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Returns the total number of header entries (not unique names).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no header entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.set(name, value);
        }
        headers
    }
}
