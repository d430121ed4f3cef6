// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use custom_error::custom_error;

custom_error! {
    /// Errors surfaced by the multiplexer.
    pub Fail

    InvalidArgument { details: &'static str } = "invalid argument: {details}",
    ConnectionAborted = "connection aborted",
    ConnectionReset = "connection reset by peer",
    BadFileDescriptor = "bad file descriptor",
    Cancelled = "operation cancelled",
    AlreadyRegistered { fd: i32 } = "descriptor {fd} is already registered",
    Os { errno: i32, details: String } = "os error {errno}: {details}",
}

impl Fail {
    /// Wraps the last OS error (`errno`) with a human-readable tag.
    pub fn from_errno(details: &str) -> Self {
        let err = std::io::Error::last_os_error();
        Fail::Os {
            errno: err.raw_os_error().unwrap_or(-1),
            details: format!("{}: {}", details, err),
        }
    }
}

impl Clone for Fail {
    fn clone(&self) -> Self {
        match self {
            Fail::InvalidArgument { details } => Fail::InvalidArgument { details },
            Fail::ConnectionAborted => Fail::ConnectionAborted,
            Fail::ConnectionReset => Fail::ConnectionReset,
            Fail::BadFileDescriptor => Fail::BadFileDescriptor,
            Fail::Cancelled => Fail::Cancelled,
            Fail::AlreadyRegistered { fd } => Fail::AlreadyRegistered { fd: *fd },
            Fail::Os { errno, details } => Fail::Os {
                errno: *errno,
                details: details.clone(),
            },
        }
    }
}
