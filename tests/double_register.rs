// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod common;

use common::{fast_config, socketpair};
use sockmux::manager::SocketManager;

/// Registering a descriptor that is already registered is a fatal
/// programmer error, not a recoverable one.
#[test]
#[should_panic(expected = "already registered")]
fn double_registration_panics() {
    let manager = SocketManager::new(fast_config());
    let (fd1, _fd2) = socketpair();
    manager.add(fd1);
    manager.add(fd1);
}
