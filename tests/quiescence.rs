// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod common;

use common::{fast_config, socketpair};
use sockmux::manager::SocketManager;
use std::thread;
use std::time::Duration;

/// Once the last registered descriptor is removed, the background poll loop
/// notices on its next tick and stops running rather than spinning forever
/// on an empty socket set.
#[test]
fn background_loop_quiesces_once_empty() {
    let manager = SocketManager::new(fast_config());
    let (fd1, fd2) = socketpair();
    let d1 = sockmux::Descriptor(fd1);

    manager.add(fd1);
    manager.add(fd2);
    assert!(manager.is_monitoring());

    manager.remove(d1, None);
    assert!(manager.is_monitoring(), "one socket is still registered");

    manager.remove(sockmux::Descriptor(fd2), None);

    let mut quiesced = false;
    for _ in 0..200 {
        thread::sleep(Duration::from_millis(5));
        if !manager.is_monitoring() {
            quiesced = true;
            break;
        }
    }
    assert!(quiesced, "background loop never quiesced after last removal");

    // Re-registering afterwards must start a fresh background loop.
    let (fd3, fd4) = socketpair();
    manager.add(fd3);
    manager.add(fd4);
    assert!(manager.is_monitoring());
    manager.remove(sockmux::Descriptor(fd3), None);
    manager.remove(sockmux::Descriptor(fd4), None);
}
