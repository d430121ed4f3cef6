// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use crate::fail::Fail;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// A socket I/O direction. Each direction gets its own FIFO waiter queue.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Direction {
    Read,
    Write,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Read, Direction::Write];
}

/// Shared state for one suspended caller. Generalizes the single-waker
/// slot idiom (put/take one [`Waker`] around a syscall attempt) into a
/// one-shot, resolved-once-and-only-once cell: `dequeue` resolves it with
/// success, `dequeue_all` resolves it with an error, and at most one of
/// those ever runs.
struct WaiterSlot {
    woken: Mutex<Option<Result<(), Fail>>>,
    waker: Mutex<Option<Waker>>,
}

/// A suspended caller awaiting readiness in one direction on one
/// descriptor. Resolves with `Ok(())` once the manager's poll loop resumes
/// it, or with `Err(Fail)` if cancelled or if the socket is removed while
/// this waiter is still queued.
pub struct Waiter {
    slot: Arc<WaiterSlot>,
}

impl Waiter {
    fn new() -> (Self, Arc<WaiterSlot>) {
        let slot = Arc::new(WaiterSlot {
            woken: Mutex::new(None),
            waker: Mutex::new(None),
        });
        (
            Waiter {
                slot: slot.clone(),
            },
            slot,
        )
    }
}

impl Future for Waiter {
    type Output = Result<(), Fail>;

    fn poll(self: Pin<&mut Self>, ctx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(result) = self.slot.woken.lock().take() {
            return Poll::Ready(result);
        }
        *self.slot.waker.lock() = Some(ctx.waker().clone());
        // A resolution may have raced in between the take() above and
        // stashing the waker; re-check before returning Pending.
        if let Some(result) = self.slot.woken.lock().take() {
            return Poll::Ready(result);
        }
        Poll::Pending
    }
}

/// An external handle that can abort one in-flight [`Waiter`], wherever it
/// currently is in its queue. Checked by the manager's `wait` routine before
/// every suspension, and additionally wakes an already-queued waiter
/// immediately rather than waiting for the next readiness tick — a
/// cancelled waiter must resolve promptly while its sibling waiters stay
/// queued.
#[derive(Default)]
pub struct Cancellation {
    requested: AtomicBool,
    current: Mutex<Option<Arc<WaiterSlot>>>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self {
            requested: AtomicBool::new(false),
            current: Mutex::new(None),
        }
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Requests cancellation. If a waiter is currently queued under this
    /// handle, resolves it with `Fail::Cancelled` right away. The slot
    /// itself is left in its `WaiterQueue` as a tombstone — `dequeue` skips
    /// already-resolved slots without counting them as a dispatch, so a
    /// cancelled waiter never displaces a sibling's turn in the FIFO.
    pub fn cancel(&self) {
        self.requested.store(true, Ordering::Release);
        if let Some(slot) = self.current.lock().take() {
            resolve(&slot, Err(Fail::Cancelled));
        }
    }

    fn track(&self, slot: &Arc<WaiterSlot>) {
        *self.current.lock() = Some(slot.clone());
    }
}

/// Resolves `slot` with `result` unless it was already resolved (e.g. by a
/// racing cancellation). Returns whether this call was the one that
/// actually resolved it.
fn resolve(slot: &Arc<WaiterSlot>, result: Result<(), Fail>) -> bool {
    let mut woken = slot.woken.lock();
    let did_resolve = woken.is_none();
    if did_resolve {
        *woken = Some(result);
    }
    drop(woken);
    if did_resolve {
        if let Some(waker) = slot.waker.lock().take() {
            waker.wake();
        }
    }
    did_resolve
}

/// The FIFO of waiters suspended on one (descriptor, direction) pair.
#[derive(Default)]
pub struct WaiterQueue {
    slots: Mutex<VecDeque<Arc<WaiterSlot>>>,
}

impl WaiterQueue {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(VecDeque::new()),
        }
    }

    /// Appends a fresh waiter to the FIFO and returns the future the caller
    /// suspends on.
    pub fn queue(&self) -> Waiter {
        let (waiter, slot) = Waiter::new();
        self.slots.lock().push_back(slot);
        waiter
    }

    /// Same as `queue`, but associates the waiter with a [`Cancellation`]
    /// handle first. If the handle was already cancelled, the waiter
    /// resolves immediately without ever entering the FIFO.
    pub fn queue_with(&self, cancel: Option<&Cancellation>) -> Waiter {
        let (waiter, slot) = Waiter::new();
        match cancel {
            Some(cancel) if cancel.is_requested() => {
                resolve(&slot, Err(Fail::Cancelled));
            }
            Some(cancel) => {
                cancel.track(&slot);
                self.slots.lock().push_back(slot);
            }
            None => {
                self.slots.lock().push_back(slot);
            }
        }
        waiter
    }

    /// Pops and resolves the oldest *live* waiter with success. A waiter
    /// that was already resolved by a racing cancellation is a tombstone:
    /// it is discarded without counting as a dispatch, and the search
    /// continues to the next queued waiter. Returns whether a waiter was
    /// actually resumed (callers use this to decide whether to also emit a
    /// `PendingRead` event).
    pub fn dequeue(&self) -> bool {
        let mut slots = self.slots.lock();
        while let Some(slot) = slots.pop_front() {
            if resolve(&slot, Ok(())) {
                return true;
            }
        }
        false
    }

    /// Drains every queued waiter, resolving each with `error`.
    pub fn dequeue_all(&self, error: Fail) {
        let drained: Vec<_> = self.slots.lock().drain(..).collect();
        for slot in drained {
            resolve(&slot, Err(error.clone()));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}
