// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! `sockmux` is a process-wide asynchronous socket I/O multiplexer: a
//! singleton [`SocketManager`] owns a set of non-blocking socket
//! descriptors, polls them for readiness on an interval via `poll(2)`, and
//! resumes suspended read/write tasks as descriptors become ready.
//!
//! The crate does not open, bind, listen on, or accept sockets — callers
//! hand it already-open non-blocking descriptors via [`SocketManager::add`]
//! and get back an [`events::EventStream`] of lifecycle notifications plus
//! async read/write/send/receive operations keyed by [`descriptor::Descriptor`].

#[macro_use]
extern crate log;

pub mod config;
pub mod descriptor;
pub mod events;
pub mod fail;
pub mod manager;
mod poll;
pub mod socket;
pub mod stream;
pub mod waiter;

pub use config::{MonitorConfig, MonitorPriority};
pub use descriptor::Descriptor;
pub use events::{FileEvents, SocketEvent};
pub use fail::Fail;
pub use manager::SocketManager;
pub use socket::SocketState;
pub use stream::EventStream;
pub use waiter::{Cancellation, Direction};
