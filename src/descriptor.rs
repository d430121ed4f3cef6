// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use derive_more::{Display, From};
use std::os::unix::io::RawFd;

/// An opaque handle to an OS socket. Totally ordered by its raw integer
/// value, unique within the process while the descriptor is open.
#[derive(Clone, Copy, Debug, Display, From, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[display(fmt = "fd({})", _0)]
pub struct Descriptor(pub RawFd);

impl Descriptor {
    pub fn raw(self) -> RawFd {
        self.0
    }
}
