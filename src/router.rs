//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::handler::{Handler, SharedEndpoint};

/// The application router.
///
/// Build it once at startup and pass it to [`Server::serve`](crate::Server::serve).
///
/// ```rust,no_run
/// # use portico::{Method, Request, Response, Router};
/// # async fn get_order(_: Request) -> Response { Response::text("") }
/// # async fn create_order(_: Request) -> Response { Response::text("") }
/// Router::new()
///     .get("/orders/{id}", get_order)
///     .on(Method::POST, "/orders", create_order);
/// ```
pub struct Router {
    routes: HashMap<Method, MatchitRouter<SharedEndpoint>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Registers a handler for a method and path. Path parameters use
    /// `{name}` syntax.
    ///
    /// # Panics
    ///
    /// Panics if the path is not a valid route or conflicts with one
    /// already registered for the same method.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_endpoint())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    pub(crate) fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(SharedEndpoint, HashMap<String, String>)> {
        let matched = self.routes.get(method)?.at(path).ok()?;
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((Arc::clone(matched.value), params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
