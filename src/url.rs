//! Parsed request target.

use http::Uri;
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;

/// The request target split into a decoded path and query.
#[derive(Clone, Debug, PartialEq)]
pub struct UrlObject {
    path: String,
    raw_path: String,
    query: Query,
}

impl UrlObject {
    pub(crate) fn parse(uri: &Uri) -> Self {
        #[cfg(test)]
        PARSES.with(|n| n.set(n.get() + 1));

        let raw_path = uri.path().to_owned();
        let path = percent_decode_str(&raw_path).decode_utf8_lossy().into_owned();
        let query = Query::parse(uri.query().unwrap_or(""));

        Self { path, raw_path, query }
    }

    /// Percent-decoded path. Invalid UTF-8 is replaced, not rejected.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path exactly as it appeared on the request line.
    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    pub fn query(&self) -> &Query {
        &self.query
    }
}

/// Decoded query-string pairs, in request order. Repeated keys are kept.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    raw: String,
    pairs: Vec<(String, String)>,
}

impl Query {
    fn parse(raw: &str) -> Self {
        let pairs = serde_urlencoded::from_str::<Vec<(String, String)>>(raw).unwrap_or_default();
        Self { raw: raw.to_owned(), pairs }
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The undecoded query string, without the leading `?`.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Deserializes the query into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_urlencoded::de::Error> {
        serde_urlencoded::from_str(&self.raw)
    }
}

#[cfg(test)]
thread_local! {
    static PARSES: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

/// Number of [`UrlObject::parse`] calls made on this thread.
#[cfg(test)]
pub(crate) fn parse_count() -> usize {
    PARSES.with(|n| n.get())
}
