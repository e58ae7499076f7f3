//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body_util::Full;
use mime::Mime;
use tracing::warn;

use crate::body::BodyError;
use crate::range::RangeError;

/// An outgoing HTTP response.
///
/// # Shortcuts (200 OK, no custom headers needed)
///
/// ```rust
/// use portico::{Response, StatusCode};
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use portico::{Response, StatusCode};
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(br#"{"id":42}"#.to_vec());
///
/// Response::builder().bytes(mime::TEXT_XML, b"<ok/>".to_vec());
/// ```
#[derive(Debug)]
pub struct Response {
    inner: http::Response<Full<Bytes>>,
}

impl Response {
    /// `200 OK` with `application/json`.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().json(body)
    }

    /// `200 OK` with `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self::builder().status(code).no_body()
    }

    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: HeaderMap::new(), status: StatusCode::OK }
    }

    pub fn status_code(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        self.inner
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`]. Defaults to `200 OK`; finished by one of
/// the body methods.
pub struct ResponseBuilder {
    headers: HeaderMap,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    /// Appends a header. Names or values that are not valid HTTP are
    /// logged and skipped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => warn!(name, "dropping invalid response header"),
        }
        self
    }

    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.finish(Some(mime::APPLICATION_JSON), body.into())
    }

    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish(Some(mime::TEXT_PLAIN_UTF_8), Bytes::from(body.into()))
    }

    /// Any other media type: XML, HTML, CSV, binary downloads.
    pub fn bytes(self, content_type: Mime, body: impl Into<Bytes>) -> Response {
        self.finish(Some(content_type), body.into())
    }

    pub fn no_body(self) -> Response {
        self.finish(None, Bytes::new())
    }

    fn finish(mut self, content_type: Option<Mime>, body: Bytes) -> Response {
        if let Some(mime) = content_type {
            if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
                self.headers.insert(CONTENT_TYPE, value);
            }
        }

        let mut inner = http::Response::new(Full::new(body));
        *inner.status_mut() = self.status;
        *inner.headers_mut() = self.headers;
        Response { inner }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`]. Implement it to return your own
/// types from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

impl IntoResponse for BodyError {
    fn into_response(self) -> Response {
        Response::builder().status(self.status()).text(self.to_string())
    }
}

impl IntoResponse for RangeError {
    fn into_response(self) -> Response {
        Response::builder().status(self.status()).text(self.to_string())
    }
}

impl<T, E> IntoResponse for Result<T, E>
where
    T: IntoResponse,
    E: IntoResponse,
{
    fn into_response(self) -> Response {
        match self {
            Ok(ok) => ok.into_response(),
            Err(err) => err.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::DisableReason;

    #[test]
    fn builder_sets_status_headers_and_type() {
        let res = Response::builder()
            .status(StatusCode::CREATED)
            .header("location", "/users/7")
            .header("bad header", "x")
            .json(r#"{"id":7}"#);

        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.headers()["location"], "/users/7");
        assert_eq!(res.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(res.headers().len(), 2);
    }

    #[test]
    fn status_only_has_no_content_type() {
        let res = Response::status(StatusCode::NO_CONTENT);
        assert!(res.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn body_errors_carry_their_status() {
        let res = BodyError::PayloadTooLarge { limit: 8 }.into_response();
        assert_eq!(res.status_code(), StatusCode::PAYLOAD_TOO_LARGE);

        let res: Result<Response, BodyError> = Err(BodyError::Disabled(DisableReason::Raw));
        assert_eq!(res.into_response().status_code(), StatusCode::BAD_REQUEST);
    }
}
