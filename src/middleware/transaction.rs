//! Transaction wrapping for matched routes.
//!
//! [`Transactional::wrap`] replaces a route's `execute` with one that
//! begins a transaction, runs the original, then commits on `Ok` or rolls
//! back on `Err` or panic. Controllers opt individual actions out through
//! [`Controller::skips_transaction`].
//!
//! The transaction primitive itself comes from the application's data
//! layer via [`Database`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tracing::{debug, error};

use crate::body::BoxError;
use crate::response::Response;

/// The deferred handler invocation of a matched route.
pub type Execute = Box<dyn FnOnce() -> BoxFuture<'static, Result<Response, BoxError>> + Send>;

/// Owner of a set of actions.
pub trait Controller: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Actions that must not run inside a transaction, e.g. long streams.
    fn skips_transaction(&self, _action: &str) -> bool {
        false
    }
}

/// A route resolved to a controller action, not yet executed.
pub struct RouteMatch {
    pub controller: Arc<dyn Controller>,
    pub action: String,
    pub execute: Execute,
}

impl RouteMatch {
    pub fn new<F, Fut>(controller: Arc<dyn Controller>, action: impl Into<String>, execute: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
    {
        Self {
            controller,
            action: action.into(),
            execute: Box::new(move || execute().boxed()),
        }
    }

    pub async fn run(self) -> Result<Response, BoxError> {
        (self.execute)().await
    }
}

/// An open transaction.
pub trait Transaction: Send + 'static {
    fn commit(self) -> BoxFuture<'static, Result<(), BoxError>>;
    fn rollback(self) -> BoxFuture<'static, Result<(), BoxError>>;
}

/// Source of transactions.
pub trait Database: Send + Sync + 'static {
    type Transaction: Transaction;

    fn begin(&self) -> BoxFuture<'_, Result<Self::Transaction, BoxError>>;
}

/// Wraps matched routes in a transaction from `D`.
pub struct Transactional<D> {
    db: Arc<D>,
}

impl<D: Database> Transactional<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self { db }
    }

    pub fn wrap(&self, mut route: RouteMatch) -> RouteMatch {
        if route.controller.skips_transaction(&route.action) {
            debug!(controller = route.controller.name(), action = %route.action, "running without transaction");
            return route;
        }

        let db = Arc::clone(&self.db);
        let inner = route.execute;
        route.execute = Box::new(move || Box::pin(in_transaction(db, inner)));
        route
    }
}

async fn in_transaction<D: Database>(db: Arc<D>, inner: Execute) -> Result<Response, BoxError> {
    let tx = db.begin().await?;

    match AssertUnwindSafe(async move { inner().await }).catch_unwind().await {
        Ok(Ok(response)) => {
            tx.commit().await?;
            Ok(response)
        }
        Ok(Err(err)) => {
            if let Err(rollback) = tx.rollback().await {
                error!(error = %rollback, "rollback failed");
            }
            Err(err)
        }
        Err(payload) => {
            if let Err(rollback) = tx.rollback().await {
                error!(error = %rollback, "rollback after panic failed");
            }
            panic::resume_unwind(payload)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    struct FakeDb(Log);
    struct FakeTx(Log);

    impl Transaction for FakeTx {
        fn commit(self) -> BoxFuture<'static, Result<(), BoxError>> {
            self.0.lock().push("commit");
            Box::pin(async { Ok(()) })
        }

        fn rollback(self) -> BoxFuture<'static, Result<(), BoxError>> {
            self.0.lock().push("rollback");
            Box::pin(async { Ok(()) })
        }
    }

    impl Database for FakeDb {
        type Transaction = FakeTx;

        fn begin(&self) -> BoxFuture<'_, Result<FakeTx, BoxError>> {
            self.0.lock().push("begin");
            let log = Arc::clone(&self.0);
            Box::pin(async move { Ok(FakeTx(log)) })
        }
    }

    struct Orders;

    impl Controller for Orders {
        fn name(&self) -> &str {
            "orders"
        }

        fn skips_transaction(&self, action: &str) -> bool {
            action == "export"
        }
    }

    fn setup() -> (Transactional<FakeDb>, Log) {
        let log: Log = Arc::default();
        (Transactional::new(Arc::new(FakeDb(Arc::clone(&log)))), log)
    }

    fn route(action: &str, log: &Log, outcome: Result<(), &'static str>) -> RouteMatch {
        let log = Arc::clone(log);
        RouteMatch::new(Arc::new(Orders), action, move || async move {
            log.lock().push("execute");
            match outcome {
                Ok(()) => Ok(Response::status(StatusCode::CREATED)),
                Err(msg) => Err(msg.into()),
            }
        })
    }

    #[tokio::test]
    async fn commits_on_success() {
        let (tx, log) = setup();
        let res = tx.wrap(route("create", &log, Ok(()))).run().await.unwrap();

        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(*log.lock(), ["begin", "execute", "commit"]);
    }

    #[tokio::test]
    async fn rolls_back_on_error() {
        let (tx, log) = setup();
        let err = tx.wrap(route("create", &log, Err("boom"))).run().await.unwrap_err();

        assert_eq!(err.to_string(), "boom");
        assert_eq!(*log.lock(), ["begin", "execute", "rollback"]);
    }

    #[tokio::test]
    async fn skipped_actions_run_bare() {
        let (tx, log) = setup();
        tx.wrap(route("export", &log, Ok(()))).run().await.unwrap();

        assert_eq!(*log.lock(), ["execute"]);
    }

    #[tokio::test]
    async fn rolls_back_and_repanics() {
        let (tx, log) = setup();
        let explode = true;
        let panicking = RouteMatch::new(Arc::new(Orders), "create", move || async move {
            if explode {
                panic!("handler exploded");
            }
            Ok(Response::status(StatusCode::OK))
        });

        let wrapped = tx.wrap(panicking);
        let outcome = tokio::spawn(wrapped.run()).await;

        assert!(outcome.unwrap_err().is_panic());
        assert_eq!(*log.lock(), ["begin", "rollback"]);
    }
}
