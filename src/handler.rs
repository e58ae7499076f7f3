//! Handlers and the type-erased endpoints the router stores.
//!
//! Every route holds an `Arc<dyn Endpoint>`. An `async fn(Request) -> R`
//! becomes one through [`Handler`]; its output is mapped to a [`Response`]
//! before the future is boxed, so the server never sees `R`.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};

use crate::request::Request;
use crate::response::{IntoResponse, Response};

#[doc(hidden)]
pub trait Endpoint: Send + Sync + 'static {
    fn serve(&self, req: Request) -> BoxFuture<'static, Response>;
}

#[doc(hidden)]
pub type SharedEndpoint = Arc<dyn Endpoint>;

/// An async function that answers a [`Request`].
///
/// Any `Fn(Request) -> impl Future<Output = impl IntoResponse>` qualifies,
/// including handlers returning `Result<Response, BodyError>`. The trait is
/// sealed.
pub trait Handler: sealed::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_endpoint(self) -> SharedEndpoint;
}

mod sealed {
    pub trait Sealed {}
}

struct FnEndpoint<F>(F);

impl<F, Fut> sealed::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoResponse,
{
}

impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoResponse,
{
    fn into_endpoint(self) -> SharedEndpoint {
        Arc::new(FnEndpoint(self))
    }
}

impl<F, Fut> Endpoint for FnEndpoint<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoResponse,
{
    fn serve(&self, req: Request) -> BoxFuture<'static, Response> {
        (self.0)(req).map(IntoResponse::into_response).boxed()
    }
}
