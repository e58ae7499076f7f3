//! Middleware layer.
//!
//! Cross-cutting wrappers applied to a matched route before it runs.
//!
//! - [`transaction`]: runs an action inside a database transaction.

pub mod transaction;

pub use transaction::{Controller, Database, Execute, RouteMatch, Transaction, Transactional};
