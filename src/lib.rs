//! # portico
//!
//! A minimal HTTP framework built around a lazy, single-use request facade.
//!
//! ## The request
//!
//! Every handler receives a [`Request`]. Cheap things (headers, method,
//! target) are read straight from the wire. Derived things (correlation ID,
//! parsed URL, content negotiation, JSON body) are computed on first use and
//! cached for the life of the request.
//!
//! The body is read once. Either portico collects it as JSON, bounded by
//! [`Config::max_body_size`], or the handler takes the byte stream with
//! [`Request::raw`] / [`Request::pipe`]. Taking the stream permanently
//! disables JSON access, including a read already in progress.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use portico::{BodyError, Config, Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .get("/orders/{id}", get_order)
//!         .post("/orders", create_order);
//!
//!     Server::bind("0.0.0.0:3000")
//!         .config(Config::new().max_body_size(64 * 1024))
//!         .serve(app)
//!         .await
//!         .unwrap();
//! }
//!
//! async fn get_order(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#))
//! }
//!
//! async fn create_order(req: Request) -> Result<Response, BodyError> {
//!     let order = req.body().await?;
//!     tracing::info!(id = %req.id(), %order, "order received");
//!     Ok(Response::builder()
//!         .status(portico::StatusCode::CREATED)
//!         .json(order.to_string()))
//! }
//! ```

mod body;
mod config;
mod error;
mod handler;
mod id;
mod negotiate;
mod range;
mod request;
mod response;
mod router;
mod server;
mod state;
mod url;

pub mod middleware;

pub use body::{BodyError, BodyFuture, BodyResult, BoxError, DisableReason, RawBody};
pub use config::{Config, ConfigError, DEFAULT_MAX_BODY_SIZE, DEFAULT_REQUEST_ID_HEADER, Metric, Metrics, NoopMetrics};
pub use error::Error;
pub use handler::Handler;
pub use http::{Method, StatusCode};
pub use negotiate::Accept;
pub use range::{ByteRange, RangeError, Ranges};
pub use request::{DEBUG_ENV, Request};
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
pub use url::{Query, UrlObject};
