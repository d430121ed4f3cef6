// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use std::os::unix::io::RawFd;
use std::sync::Once;
use std::time::Duration;

use sockmux::config::MonitorConfig;

static INIT_LOGGING: Once = Once::new();

/// Starts `flexi_logger` once per test binary so the crate's `log::*!`
/// output is visible when a test is run with `--nocapture`. Safe to call
/// from every test; only the first call in a given process does anything.
fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = flexi_logger::Logger::try_with_env_or_str("warn")
            .expect("invalid RUST_LOG filter")
            .start();
    });
}

/// A fast poll interval so tests don't wait for a multi-millisecond
/// production default.
pub fn fast_config() -> MonitorConfig {
    MonitorConfig {
        interval: Duration::from_millis(2),
        ..Default::default()
    }
}

/// Creates a connected pair of non-blocking `AF_UNIX`/`SOCK_STREAM`
/// descriptors, as a lightweight loopback fixture for exercising the
/// multiplexer without binding a real TCP socket.
pub fn socketpair() -> (RawFd, RawFd) {
    init_logging();
    let mut fds = [0 as RawFd; 2];
    let rc = unsafe {
        libc::socketpair(
            libc::AF_UNIX,
            libc::SOCK_STREAM,
            0,
            fds.as_mut_ptr(),
        )
    };
    assert_eq!(rc, 0, "socketpair() failed: {}", std::io::Error::last_os_error());
    (fds[0], fds[1])
}
