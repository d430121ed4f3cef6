// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Thin wrapper around `poll(2)`. Portable, level-triggered readiness
//! polling — deliberately not epoll/kqueue.

use crate::events::{FileEvents, PollEntry};
use crate::fail::Fail;

fn to_poll_events(events: FileEvents) -> libc::c_short {
    let mut out = 0;
    if events.contains(FileEvents::READABLE) {
        out |= libc::POLLIN;
    }
    if events.contains(FileEvents::WRITABLE) {
        out |= libc::POLLOUT;
    }
    out as libc::c_short
}

fn from_poll_events(raw: libc::c_short) -> FileEvents {
    let raw = raw as i32;
    let mut events = FileEvents::empty();
    if raw & libc::POLLIN != 0 {
        events |= FileEvents::READABLE;
    }
    if raw & libc::POLLOUT != 0 {
        events |= FileEvents::WRITABLE;
    }
    if raw & libc::POLLERR != 0 {
        events |= FileEvents::ERROR;
    }
    if raw & libc::POLLHUP != 0 {
        events |= FileEvents::HANGUP;
    }
    if raw & libc::POLLNVAL != 0 {
        events |= FileEvents::INVALID_REQUEST;
    }
    events
}

/// Polls the entire vector in one syscall, mutating each entry's `returned`
/// field in place. Returns immediately (zero timeout) — the manager
/// re-polls at its own interval rather than blocking inside this call.
pub fn poll_once(entries: &mut [PollEntry]) -> Result<(), Fail> {
    let mut raw: Vec<libc::pollfd> = entries
        .iter()
        .map(|entry| libc::pollfd {
            fd: entry.descriptor.raw(),
            events: to_poll_events(entry.requested),
            revents: 0,
        })
        .collect();

    if raw.is_empty() {
        return Ok(());
    }

    let rc = unsafe { libc::poll(raw.as_mut_ptr(), raw.len() as libc::nfds_t, 0) };
    if rc < 0 {
        return Err(Fail::from_errno("poll"));
    }

    for (entry, polled) in entries.iter_mut().zip(raw.iter()) {
        entry.returned = from_poll_events(polled.revents);
    }
    Ok(())
}
