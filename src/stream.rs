// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use crate::events::SocketEvent;
use futures::stream::Stream;
use futures::task::AtomicWaker;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

struct Inner {
    /// Buffers only the newest event; a producer that emits faster than the
    /// consumer drains is not a transport guarantee here, only a
    /// diagnostic one.
    latest: Mutex<Option<SocketEvent>>,
    waker: AtomicWaker,
    closed: AtomicBool,
}

/// Producer end, owned by the [`SocketState`](crate::socket::SocketState)
/// that emits lifecycle events on it.
#[derive(Clone)]
pub struct EventSink {
    inner: Arc<Inner>,
}

/// Consumer end, returned to the caller of `SocketManager::add`.
pub struct EventStream {
    inner: Arc<Inner>,
}

/// Builds a connected sink/stream pair for one socket's event channel.
pub fn channel() -> (EventSink, EventStream) {
    let inner = Arc::new(Inner {
        latest: Mutex::new(None),
        waker: AtomicWaker::new(),
        closed: AtomicBool::new(false),
    });
    (
        EventSink {
            inner: inner.clone(),
        },
        EventStream { inner },
    )
}

impl EventSink {
    /// Publishes an event, overwriting whatever the consumer hasn't yet
    /// observed. No-op after `close` has already been published once.
    pub fn emit(&self, event: SocketEvent) {
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }
        let is_close = matches!(event, SocketEvent::Close(_));
        *self.inner.latest.lock() = Some(event);
        if is_close {
            self.inner.closed.store(true, Ordering::Release);
        }
        self.inner.waker.wake();
    }
}

impl Stream for EventStream {
    type Item = SocketEvent;

    fn poll_next(self: Pin<&mut Self>, ctx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(event) = self.inner.latest.lock().take() {
            return Poll::Ready(Some(event));
        }
        if self.inner.closed.load(Ordering::Acquire) {
            return Poll::Ready(None);
        }
        self.inner.waker.register(ctx.waker());
        if let Some(event) = self.inner.latest.lock().take() {
            return Poll::Ready(Some(event));
        }
        Poll::Pending
    }
}
