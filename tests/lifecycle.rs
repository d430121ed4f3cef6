// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod common;

use common::{fast_config, socketpair};
use futures::executor::block_on;
use sockmux::manager::SocketManager;
use std::thread;
use std::time::Duration;

/// Registering a descriptor makes `contains` true; removing it makes
/// `contains` false and closes the descriptor (a second `close(2)` by the
/// test itself would fail with `EBADF`, which is how we confirm it was
/// actually closed rather than merely forgotten).
#[test]
fn add_then_remove_round_trip() {
    let manager = SocketManager::new(fast_config());
    let (fd1, fd2) = socketpair();
    let d1 = sockmux::Descriptor(fd1);
    let d2 = sockmux::Descriptor(fd2);

    manager.add(fd1);
    manager.add(fd2);
    assert!(manager.contains(d1));
    assert!(manager.contains(d2));

    manager.remove(d1, None);
    assert!(!manager.contains(d1));

    let rc = unsafe { libc::close(fd1) };
    assert_eq!(rc, -1, "fd should already be closed by remove()");
    assert_eq!(std::io::Error::last_os_error().raw_os_error(), Some(libc::EBADF));

    manager.remove(d2, None);
}

/// Removing an already-unregistered descriptor is a no-op, not a panic or
/// double-close.
#[test]
fn remove_on_unregistered_descriptor_is_a_no_op() {
    let manager = SocketManager::new(fast_config());
    let (fd1, fd2) = socketpair();
    let d1 = sockmux::Descriptor(fd1);
    let d2 = sockmux::Descriptor(fd2);

    manager.add(fd1);
    manager.remove(d1, None);
    assert!(!manager.contains(d1));

    // Removing it again must not panic or attempt to close fd1 twice.
    manager.remove(d1, None);
    assert!(!manager.contains(d1));

    // A descriptor that was never registered at all is likewise a no-op.
    manager.remove(sockmux::Descriptor(fd2), None);
}

/// Closing the peer end of a socketpair is observed as a hangup, which the
/// manager reports as `close(connection-reset)` and reflects by dropping
/// the descriptor from `contains`.
#[test]
fn peer_close_is_detected_as_connection_reset() {
    let manager = SocketManager::new(fast_config());
    let (fd1, fd2) = socketpair();
    let mut stream2 = manager.add(fd2);
    let d1 = sockmux::Descriptor(fd1);
    let d2 = sockmux::Descriptor(fd2);

    // fd1 was never handed to the manager on this side; close it directly
    // to simulate the peer going away.
    assert_eq!(unsafe { libc::close(fd1) }, 0);
    let _ = d1;

    let mut saw_close = false;
    for _ in 0..200 {
        thread::sleep(Duration::from_millis(5));
        if !manager.contains(d2) {
            saw_close = true;
            break;
        }
    }
    assert!(saw_close, "manager never noticed the peer hangup");

    block_on(async {
        use futures::StreamExt;
        match stream2.next().await {
            Some(sockmux::SocketEvent::Close(Some(_))) => {}
            other => panic!("expected Close(Some(_)), got {:?}", other.is_some()),
        }
    });
}
