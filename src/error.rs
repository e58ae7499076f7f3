//! Infrastructure errors.

use thiserror::Error;

use crate::config::ConfigError;

/// The error type returned by portico's fallible server operations.
///
/// Request-level failures (a bad body, an unsatisfiable range) never show
/// up here. They travel as [`BodyError`](crate::BodyError) or
/// [`RangeError`](crate::RangeError) and become HTTP responses. This type
/// covers the process-level things: binding a port, accepting a connection,
/// loading configuration.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] ConfigError),
}
