#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};

use bytes::Bytes;
use hyper::body::{Body, Frame};
use portico::{Config, Request};

/// What a [`Probe`] observed.
#[derive(Default)]
pub struct Stats {
    pub polls: AtomicUsize,
    pub delivered: AtomicUsize,
    pub dropped: AtomicBool,
}

impl Stats {
    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// A scripted request body that records how it is consumed.
pub struct Probe {
    chunks: VecDeque<io::Result<Bytes>>,
    stall: bool,
    stats: Arc<Stats>,
}

impl Probe {
    pub fn new<I, C>(chunks: I) -> (Self, Arc<Stats>)
    where
        I: IntoIterator<Item = C>,
        C: Into<Bytes>,
    {
        let stats = Arc::new(Stats::default());
        let probe = Self {
            chunks: chunks.into_iter().map(|c| Ok(c.into())).collect(),
            stall: false,
            stats: Arc::clone(&stats),
        };
        (probe, stats)
    }

    /// Stays pending forever once the scripted chunks run out, like a
    /// client that stopped sending.
    pub fn stalled(mut self) -> Self {
        self.stall = true;
        self
    }

    pub fn then_fail(mut self, msg: &str) -> Self {
        self.chunks.push_back(Err(io::Error::new(io::ErrorKind::ConnectionReset, msg.to_owned())));
        self
    }
}

impl Body for Probe {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        self.stats.polls.fetch_add(1, Ordering::SeqCst);
        match self.chunks.pop_front() {
            Some(Ok(chunk)) => {
                self.stats.delivered.fetch_add(1, Ordering::SeqCst);
                Poll::Ready(Some(Ok(Frame::data(chunk))))
            }
            Some(Err(err)) => Poll::Ready(Some(Err(err))),
            None if self.stall => Poll::Pending,
            None => Poll::Ready(None),
        }
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        self.stats.dropped.store(true, Ordering::SeqCst);
    }
}

pub fn request<B>(body: B, config: Config) -> Request<B> {
    request_with(http::Request::builder(), body, config)
}

pub fn request_with<B>(builder: http::request::Builder, body: B, config: Config) -> Request<B> {
    Request::new(builder.body(body).unwrap(), Arc::new(config))
}
