//! Per-request memoized state behind [`Request`](crate::Request).
//!
//! Every derived view is computed on first access and cached for the life
//! of the request. Nothing here is shared between requests.

use std::sync::Arc;

use http::header::CONTENT_LENGTH;
use http::{HeaderMap, Uri};
use once_cell::sync::OnceCell;

use crate::body::BodyPipe;
use crate::config::Config;
use crate::id;
use crate::negotiate::Accept;
use crate::url::UrlObject;

pub(crate) struct RequestState<B> {
    config: Arc<Config>,
    id: OnceCell<String>,
    url: OnceCell<UrlObject>,
    accept: OnceCell<Accept>,
    pub(crate) body: Arc<BodyPipe<B>>,
}

impl<B> RequestState<B> {
    pub(crate) fn new(headers: &HeaderMap, body: B, config: Arc<Config>) -> Self {
        let id = id::from_headers(headers, &config.request_id_headers, config.external)
            .map(OnceCell::with_value)
            .unwrap_or_default();

        let declared_len = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        let body = Arc::new(BodyPipe::new(body, config.max_body_size, declared_len));

        Self {
            config,
            id,
            url: OnceCell::new(),
            accept: OnceCell::new(),
            body,
        }
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn id(&self) -> &str {
        self.id.get_or_init(id::generate)
    }

    pub(crate) fn url(&self, uri: &Uri) -> &UrlObject {
        self.url.get_or_init(|| UrlObject::parse(uri))
    }

    pub(crate) fn accept(&self, headers: &HeaderMap) -> &Accept {
        self.accept.get_or_init(|| Accept::from_headers(headers))
    }
}

impl<B> Drop for RequestState<B> {
    fn drop(&mut self) {
        self.body.release();
    }
}
