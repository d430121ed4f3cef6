// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod common;

use common::{fast_config, socketpair};
use futures::executor::block_on;
use sockmux::manager::SocketManager;
use sockmux::waiter::{Cancellation, Direction};
use sockmux::Fail;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Cancelling one queued waiter resolves it with `Cancelled` without
/// disturbing a sibling waiter queued on the same descriptor and direction,
/// which goes on to receive its data normally. The descriptor itself stays
/// registered throughout.
#[test]
fn cancelling_one_waiter_leaves_its_sibling_pending() {
    let manager = SocketManager::new(fast_config());
    let (fd1, fd2) = socketpair();
    manager.add(fd1);
    manager.add(fd2);
    let d1 = sockmux::Descriptor(fd1);
    let d2 = sockmux::Descriptor(fd2);

    let cancel_a = Arc::new(Cancellation::new());

    let manager_a = Arc::clone(&manager);
    let cancel_a_thread = Arc::clone(&cancel_a);
    let handle_a = thread::spawn(move || {
        block_on(manager_a.wait(Direction::Read, d2, Some(cancel_a_thread.as_ref())))
    });

    let manager_b = Arc::clone(&manager);
    let handle_b = thread::spawn(move || block_on(manager_b.read(d2, 1)));

    // Give both A and B a chance to actually queue before cancelling A.
    thread::sleep(Duration::from_millis(15));
    cancel_a.cancel();

    let result_a = handle_a.join().unwrap();
    assert!(matches!(result_a, Err(Fail::Cancelled)));

    // B is still queued behind A's tombstoned slot; the next dispatch skips
    // straight past it and resumes B with the first byte that arrives.
    block_on(manager.write(d1, &[0xAB])).unwrap();
    let got = handle_b.join().unwrap().unwrap();
    assert_eq!(got, vec![0xAB]);

    assert!(manager.contains(d2));

    manager.remove(d1, None);
    manager.remove(d2, None);
}

/// Cancelling before a waiter is ever queued (the handle was already
/// triggered) resolves the next `wait` call immediately with `Cancelled`,
/// without blocking on readiness at all.
#[test]
fn cancel_requested_before_wait_resolves_immediately() {
    let manager = SocketManager::new(fast_config());
    let (fd1, fd2) = socketpair();
    manager.add(fd1);
    manager.add(fd2);
    let d2 = sockmux::Descriptor(fd2);

    let cancel = Cancellation::new();
    cancel.cancel();

    let result = block_on(manager.wait(Direction::Read, d2, Some(&cancel)));
    assert!(matches!(result, Err(Fail::Cancelled)));

    manager.remove(d2, None);
}
