// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use crate::descriptor::Descriptor;
use crate::fail::Fail;
use bitflags::bitflags;

bitflags! {
    /// Bit-set over the readiness conditions the manager polls for.
    ///
    /// The manager always requests the union of every bit from the OS; a
    /// [`PollEntry`]'s `returned` field is whichever subset actually fired.
    pub struct FileEvents: u8 {
        const READABLE       = 0b0000_0001;
        const WRITABLE       = 0b0000_0010;
        const ERROR          = 0b0000_0100;
        const HANGUP         = 0b0000_1000;
        const INVALID_REQUEST = 0b0001_0000;
    }
}

impl FileEvents {
    /// The set the manager always requests from the OS.
    pub fn all_requested() -> Self {
        Self::READABLE | Self::WRITABLE | Self::ERROR | Self::HANGUP | Self::INVALID_REQUEST
    }
}

/// One row of the manager's poll vector: a descriptor, the events requested
/// for it, and the events the OS returned on the last poll tick.
#[derive(Clone, Copy, Debug)]
pub struct PollEntry {
    pub descriptor: Descriptor,
    pub requested: FileEvents,
    pub returned: FileEvents,
}

impl PollEntry {
    pub fn new(descriptor: Descriptor) -> Self {
        Self {
            descriptor,
            requested: FileEvents::all_requested(),
            returned: FileEvents::empty(),
        }
    }
}

/// Lifecycle notification emitted on a socket's single-subscriber event
/// stream. `Close` is always the final event; nothing follows it.
#[derive(Clone, Debug)]
pub enum SocketEvent {
    /// The socket became readable; a read waiter (if any) was just resumed.
    PendingRead,
    /// A read syscall completed and returned `count` bytes (`0` means the
    /// peer performed an orderly shutdown on this descriptor).
    Read(usize),
    /// A write/send syscall completed and wrote `count` bytes.
    Write(usize),
    /// Terminal event: the socket was removed. `None` means a clean,
    /// voluntary removal; `Some` carries the reason (readiness error,
    /// explicit error passed to `remove`, etc).
    Close(Option<Fail>),
}
