//! Body collection and the raw-access gate.
//!
//! A request body can be consumed exactly one way. Either portico collects
//! it and parses JSON ([`Request::body`](crate::Request::body)), or the
//! handler takes the byte stream ([`Request::raw`](crate::Request::raw),
//! [`Request::pipe`](crate::Request::pipe)). Taking the stream closes the
//! gate for good:
//!
//! ```text
//!            body()                 raw() / pipe()
//! Pending ───────────▶ Collecting ─────────────────▶ Disabled
//!    │                                                  ▲
//!    └──────────────────────────────────────────────────┘
//!                        raw() / pipe()
//! ```
//!
//! Every `body()` call made while the gate is open gets a clone of the same
//! [`BodyFuture`]; the source is read once no matter how many callers
//! await it. Closing the gate while collection is in flight wakes the
//! collector, which settles with [`BodyError::Disabled`] and never touches
//! the source again.

use std::fmt;
use std::future::{Future, poll_fn};
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use bytes::{Bytes, BytesMut};
use futures_util::future::{self, BoxFuture, FutureExt, Shared};
use http::StatusCode;
use hyper::body::{Body, Frame, SizeHint};
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Boxed error accepted from transport bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The settled value of a [`BodyFuture`].
pub type BodyResult = Result<Arc<Value>, BodyError>;

// ── Errors ────────────────────────────────────────────────────────────────────

/// What closed the body gate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DisableReason {
    /// [`Request::raw`](crate::Request::raw) was called.
    Raw,
    /// [`Request::pipe`](crate::Request::pipe) was called.
    Pipe,
}

impl fmt::Display for DisableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Raw => "raw stream accessed",
            Self::Pipe => "raw stream piped",
        })
    }
}

/// Why a body could not be produced.
///
/// Each variant carries an HTTP status via [`BodyError::status`], so an outer
/// layer can turn it straight into a response.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum BodyError {
    /// The body reached the configured ceiling. `413`.
    #[error("payload too large: body reached the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    /// The bytes were not UTF-8 JSON. `400`.
    #[error("malformed body: {0}")]
    Malformed(String),

    /// The transport failed mid-stream. `400`.
    #[error("failed to read body: {0}")]
    Read(String),

    /// The raw stream was taken before or during collection. `400`.
    #[error("body access disabled: {0}")]
    Disabled(DisableReason),
}

impl BodyError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Malformed(_) | Self::Read(_) | Self::Disabled(_) => StatusCode::BAD_REQUEST,
        }
    }
}

// ── BodyFuture ────────────────────────────────────────────────────────────────

/// The memoized outcome of body collection.
///
/// Cloning is cheap and every clone resolves to the same value.
#[derive(Clone)]
#[must_use = "futures do nothing unless awaited"]
pub struct BodyFuture(Shared<BoxFuture<'static, BodyResult>>);

impl BodyFuture {
    fn new(fut: BoxFuture<'static, BodyResult>) -> Self {
        Self(fut.shared())
    }

    fn ready(result: BodyResult) -> Self {
        Self::new(future::ready(result).boxed())
    }

    /// Returns the outcome if collection has already settled.
    pub fn peek(&self) -> Option<&BodyResult> {
        self.0.peek()
    }
}

impl Future for BodyFuture {
    type Output = BodyResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.0.poll_unpin(cx)
    }
}

impl fmt::Debug for BodyFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BodyFuture").field(&self.peek()).finish()
    }
}

// ── BodyPipe ──────────────────────────────────────────────────────────────────

enum BodyMode {
    Pending,
    Collecting(BodyFuture),
    Disabled(DisableReason),
}

struct Gate {
    mode: BodyMode,
    /// Waker of a collector blocked on the source.
    parked: Option<Waker>,
}

/// Owns the transport body and decides who may read it.
///
/// Lock order is `gate` then `source`.
pub(crate) struct BodyPipe<B> {
    gate: Mutex<Gate>,
    source: Mutex<Option<Pin<Box<B>>>>,
    limit: usize,
    declared_len: Option<u64>,
}

enum Step<E> {
    Frame(Result<Frame<Bytes>, E>),
    End,
    Disabled(DisableReason),
}

impl<B> BodyPipe<B> {
    pub(crate) fn new(body: B, limit: usize, declared_len: Option<u64>) -> Self {
        Self {
            gate: Mutex::new(Gate { mode: BodyMode::Pending, parked: None }),
            source: Mutex::new(Some(Box::pin(body))),
            limit,
            declared_len,
        }
    }

    /// Closes the gate. An in-flight collector is woken and rejects.
    pub(crate) fn disable(&self, reason: DisableReason) {
        let (previous, parked) = {
            let mut gate = self.gate.lock();
            if let BodyMode::Disabled(_) = gate.mode {
                return;
            }
            if let BodyMode::Collecting(_) = gate.mode {
                debug!(%reason, "interrupting body collection");
            }
            let previous = mem::replace(&mut gate.mode, BodyMode::Disabled(reason));
            (previous, gate.parked.take())
        };

        if let Some(waker) = parked {
            waker.wake();
        }
        // The last clone of the future may own the collector, whose drop
        // takes the gate lock.
        drop(previous);
    }

    /// Forgets the memoized future. Called when the facade is dropped; the
    /// future holds an `Arc` to this pipe.
    pub(crate) fn release(&self) {
        let previous = {
            let mut gate = self.gate.lock();
            match gate.mode {
                BodyMode::Collecting(_) => mem::replace(&mut gate.mode, BodyMode::Pending),
                _ => return,
            }
        };
        drop(previous);
    }

    /// Drops the source. The transport stops delivering once its receiver
    /// is gone.
    fn detach(&self) {
        self.source.lock().take();
    }
}

impl<B> BodyPipe<B>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    /// Returns the shared collection future, starting it on first call.
    pub(crate) fn body(self: &Arc<Self>) -> BodyFuture {
        let mut gate = self.gate.lock();
        match &gate.mode {
            BodyMode::Disabled(reason) => BodyFuture::ready(Err(BodyError::Disabled(*reason))),
            BodyMode::Collecting(fut) => fut.clone(),
            BodyMode::Pending => {
                let fut = BodyFuture::new(collect(Arc::clone(self)).boxed());
                gate.mode = BodyMode::Collecting(fut.clone());
                fut
            }
        }
    }

    fn poll_step(&self, cx: &mut Context<'_>) -> Poll<Step<B::Error>> {
        let mut gate = self.gate.lock();
        if let BodyMode::Disabled(reason) = gate.mode {
            return Poll::Ready(Step::Disabled(reason));
        }

        let mut source = self.source.lock();
        let Some(body) = source.as_mut() else {
            return Poll::Ready(Step::End);
        };

        match body.as_mut().poll_frame(cx) {
            Poll::Pending => {
                gate.parked = Some(cx.waker().clone());
                Poll::Pending
            }
            Poll::Ready(Some(frame)) => Poll::Ready(Step::Frame(frame)),
            Poll::Ready(None) => Poll::Ready(Step::End),
        }
    }

    async fn accumulate(&self) -> Result<Bytes, BodyError> {
        if let Some(len) = self.declared_len {
            if len >= self.limit as u64 {
                self.detach();
                warn!(declared = len, limit = self.limit, "declared body length over limit");
                return Err(BodyError::PayloadTooLarge { limit: self.limit });
            }
        }

        let mut buf = BytesMut::new();
        loop {
            let frame = match poll_fn(|cx| self.poll_step(cx)).await {
                Step::Frame(Ok(frame)) => frame,
                Step::Frame(Err(err)) => {
                    self.detach();
                    return Err(BodyError::Read(err.into().to_string()));
                }
                Step::End => return Ok(buf.freeze()),
                Step::Disabled(reason) => return Err(BodyError::Disabled(reason)),
            };

            // Trailers carry no payload.
            let Ok(data) = frame.into_data() else { continue };
            if self.reaches_limit(buf.len(), data.len()) {
                self.detach();
                warn!(received = buf.len() + data.len(), limit = self.limit, "body over limit");
                return Err(BodyError::PayloadTooLarge { limit: self.limit });
            }
            buf.extend_from_slice(&data);
        }
    }
}

impl<B> BodyPipe<B> {
    /// Whether appending `incoming` bytes to `held` would reach the ceiling.
    /// Checked before the copy so one huge frame is never buffered.
    fn reaches_limit(&self, held: usize, incoming: usize) -> bool {
        held.saturating_add(incoming) >= self.limit
    }
}

/// Clears the parked waker however collection ends, including when every
/// [`BodyFuture`] clone is dropped mid-flight.
struct Subscription<'a, B>(&'a BodyPipe<B>);

impl<B> Drop for Subscription<'_, B> {
    fn drop(&mut self) {
        self.0.gate.lock().parked = None;
    }
}

async fn collect<B>(pipe: Arc<BodyPipe<B>>) -> BodyResult
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let _subscription = Subscription(&pipe);
    debug!(limit = pipe.limit, "collecting body");

    let result = pipe.accumulate().await.and_then(|bytes| parse(&bytes));
    match &result {
        Ok(_) => debug!("body collected"),
        Err(err) => debug!(error = %err, "body rejected"),
    }
    result
}

fn parse(bytes: &[u8]) -> BodyResult {
    let text = std::str::from_utf8(bytes).map_err(|err| BodyError::Malformed(err.to_string()))?;
    serde_json::from_str(text)
        .map(Arc::new)
        .map_err(|err| BodyError::Malformed(err.to_string()))
}

// ── RawBody ───────────────────────────────────────────────────────────────────

/// The request's byte stream, as handed out by
/// [`Request::raw`](crate::Request::raw).
///
/// Reads pick up wherever the source currently is. If collection consumed
/// part of it before being interrupted, those bytes are gone; if a size
/// violation dropped the source, the stream is empty.
pub struct RawBody<B> {
    pipe: Arc<BodyPipe<B>>,
}

impl<B> RawBody<B> {
    pub(crate) fn new(pipe: Arc<BodyPipe<B>>) -> Self {
        Self { pipe }
    }
}

impl<B> Body for RawBody<B>
where
    B: Body<Data = Bytes>,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut source = self.pipe.source.lock();
        match source.as_mut() {
            Some(body) => body.as_mut().poll_frame(cx),
            None => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.pipe.source.lock().as_ref().is_none_or(|body| body.is_end_stream())
    }

    fn size_hint(&self) -> SizeHint {
        match self.pipe.source.lock().as_ref() {
            Some(body) => body.size_hint(),
            None => SizeHint::with_exact(0),
        }
    }
}

impl<B> fmt::Debug for RawBody<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawBody").finish_non_exhaustive()
    }
}
