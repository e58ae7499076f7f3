//! The per-request facade handed to handlers.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use bytes::Bytes;
use http::header::RANGE;
use http::request::Parts;
use http::{HeaderMap, Method, Uri, Version};
use http_body_util::BodyExt;
use hyper::body::{Body, Incoming};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::body::{BodyError, BodyFuture, BoxError, DisableReason, RawBody};
use crate::config::{Config, Metric};
use crate::negotiate::Accept;
use crate::range::{self, RangeError, Ranges};
use crate::state::RequestState;
use crate::url::{Query, UrlObject};

/// Environment variable that enables [`Request::reference`].
pub const DEBUG_ENV: &str = "PORTICO_DEBUG";

const REFERENCE: &str = "\
portico::Request
  id()            correlation id; inbound header or generated, memoized
  headers()       header map
  raw_headers()   header name/value pairs in wire order
  method()        request method
  http_version()  protocol version
  url()           request target as received
  url_object()    decoded path and query, memoized
  query()         decoded query pairs
  accept()        Accept* negotiation, memoized
  param(name)     route parameter
  body()          JSON body; one read, shared by every caller
  json::<T>()     body() deserialized into T
  raw()           byte stream; disables body()
  pipe(dst)       copies the byte stream into dst; disables body()
  get_ranges(n)   parsed Range header
  metric(m)       forwards to the configured metrics sink
";

/// An incoming HTTP request.
///
/// Cheap accessors read straight from the request head. Derived views
/// (`id`, `url_object`, `accept`, `body`) are computed on first use and
/// cached until the request is dropped.
///
/// The body can be consumed once, either as parsed JSON through
/// [`body`](Request::body) or as bytes through [`raw`](Request::raw) /
/// [`pipe`](Request::pipe). Touching the raw stream permanently disables
/// `body`, including a collection already in progress.
pub struct Request<B = Incoming> {
    head: Parts,
    params: HashMap<String, String>,
    state: RequestState<B>,
}

impl<B> Request<B> {
    /// Wraps a transport request.
    pub fn new(req: http::Request<B>, config: Arc<Config>) -> Self {
        let (head, body) = req.into_parts();
        let state = RequestState::new(&head.headers, body, config);
        Self { head, params: HashMap::new(), state }
    }

    pub(crate) fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    /// The correlation ID. Generated on first call when no inbound header
    /// supplied one.
    pub fn id(&self) -> &str {
        self.state.id()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// Case-insensitive lookup of a header that is valid visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Header pairs, repeated names included.
    pub fn raw_headers(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.head.headers.iter().map(|(name, value)| (name.as_str(), value.as_bytes()))
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn http_version(&self) -> Version {
        self.head.version
    }

    /// The request target as received.
    pub fn url(&self) -> &Uri {
        &self.head.uri
    }

    pub fn url_object(&self) -> &UrlObject {
        self.state.url(&self.head.uri)
    }

    pub fn query(&self) -> &Query {
        self.url_object().query()
    }

    pub fn accept(&self) -> &Accept {
        self.state.accept(&self.head.headers)
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Parses the `Range` header. `None` when the header is absent or not
    /// visible ASCII.
    pub fn get_ranges(&self, size: Option<u64>) -> Option<Result<Ranges, RangeError>> {
        let header = self.head.headers.get(RANGE)?.to_str().ok()?;
        Some(range::parse(header, size))
    }

    /// Forwards `metric` to the configured sink.
    pub fn metric(&self, metric: Metric) {
        self.state.config().metrics.metric(metric);
    }

    /// A short description of the request API, available only when
    /// `PORTICO_DEBUG` is set. Outside a handler, name the body type:
    /// `<Request>::reference()`.
    pub fn reference() -> Option<&'static str> {
        std::env::var_os(DEBUG_ENV).map(|_| REFERENCE)
    }

    /// The raw byte stream. Disables [`body`](Request::body) for the rest of
    /// the request; a pending `body()` future rejects.
    pub fn raw(&self) -> RawBody<B> {
        self.state.body.disable(DisableReason::Raw);
        debug!(id = %self.id(), "raw body taken");
        RawBody::new(Arc::clone(&self.state.body))
    }
}

impl<B> Request<B>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    /// The body parsed as JSON.
    ///
    /// The first call starts reading; every later call returns a clone of
    /// the same future. Failures are delivered through the future, never
    /// synchronously.
    pub fn body(&self) -> BodyFuture {
        self.state.body.body()
    }

    /// [`body`](Request::body), deserialized into `T`.
    pub async fn json<T: DeserializeOwned>(&self) -> Result<T, BodyError> {
        let value = self.body().await?;
        T::deserialize(&*value).map_err(|err| BodyError::Malformed(err.to_string()))
    }

    /// Copies the raw byte stream into `dst`, returning the bytes written.
    /// Disables [`body`](Request::body) like [`raw`](Request::raw) does.
    pub async fn pipe<W>(&self, dst: &mut W) -> io::Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.state.body.disable(DisableReason::Pipe);
        debug!(id = %self.id(), "piping raw body");

        let mut raw = RawBody::new(Arc::clone(&self.state.body));
        let mut written = 0u64;
        while let Some(frame) = raw.frame().await {
            let frame = frame.map_err(io::Error::other)?;
            if let Ok(data) = frame.into_data() {
                dst.write_all(&data).await?;
                written += data.len() as u64;
            }
        }
        dst.flush().await?;
        Ok(written)
    }
}
