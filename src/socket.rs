// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Socket State: owns one open non-blocking descriptor, serializes syscalls
//! on it, and mediates per-direction wakeups through a FIFO waiter queue.
//!
//! Each syscall method polls the raw syscall once, treats `EWOULDBLOCK`/
//! `EAGAIN` as "not ready yet, stash a waker," and surfaces any other errno
//! as a `Fail`. This module keeps that shape but drops the `Future` wrapper
//! per syscall — the manager's `wait` already suspends the caller until
//! readiness is established, so by the time a `SocketState` method runs the
//! syscall is assumed ready and the call is a plain, non-suspending
//! function.

use crate::descriptor::Descriptor;
use crate::events::SocketEvent;
use crate::fail::Fail;
use crate::stream::EventSink;
use crate::waiter::{Cancellation, Direction, Waiter, WaiterQueue};
use std::mem::MaybeUninit;
use std::net::SocketAddr;
use std::os::unix::io::RawFd;

/// One live descriptor's state: the owned handle, its event sink, and its
/// per-direction waiter FIFOs.
pub struct SocketState {
    descriptor: Descriptor,
    event_sink: EventSink,
    read_waiters: WaiterQueue,
    write_waiters: WaiterQueue,
}

impl SocketState {
    pub(crate) fn new(descriptor: Descriptor, event_sink: EventSink) -> Self {
        Self {
            descriptor,
            event_sink,
            read_waiters: WaiterQueue::new(),
            write_waiters: WaiterQueue::new(),
        }
    }

    pub fn descriptor(&self) -> Descriptor {
        self.descriptor
    }

    fn queue_for(&self, direction: Direction) -> &WaiterQueue {
        match direction {
            Direction::Read => &self.read_waiters,
            Direction::Write => &self.write_waiters,
        }
    }

    /// Appends a waiter to `direction`'s FIFO.
    pub fn queue(&self, direction: Direction) -> Waiter {
        self.queue_for(direction).queue()
    }

    /// Same as `queue`, additionally wired up to `cancel` so an external
    /// caller can abort this specific waiter while it is still queued.
    pub fn queue_with(&self, direction: Direction, cancel: Option<&Cancellation>) -> Waiter {
        self.queue_for(direction).queue_with(cancel)
    }

    /// Resumes the oldest waiter in `direction`, if any. Returns whether a
    /// waiter was actually resumed.
    pub fn dequeue(&self, direction: Direction) -> bool {
        self.queue_for(direction).dequeue()
    }

    /// Drains every waiter in every direction, resuming each with `error`.
    pub fn dequeue_all(&self, error: Fail) {
        self.read_waiters.dequeue_all(error.clone());
        self.write_waiters.dequeue_all(error);
    }

    pub fn emit(&self, event: SocketEvent) {
        self.event_sink.emit(event);
    }

    fn fd(&self) -> RawFd {
        self.descriptor.raw()
    }

    /// Writes `bytes` in one syscall. Returns the count actually written,
    /// which may be less than `bytes.len()` (a short write is success, not
    /// an error).
    pub fn write(&self, bytes: &[u8]) -> Result<usize, Fail> {
        let n = unsafe { libc::write(self.fd(), bytes.as_ptr() as *const _, bytes.len()) };
        if n < 0 {
            return Err(Fail::from_errno("write"));
        }
        let n = n as usize;
        self.emit(SocketEvent::Write(n));
        Ok(n)
    }

    /// Datagram equivalent of `write` to the socket's connected peer.
    pub fn send_message(&self, bytes: &[u8]) -> Result<usize, Fail> {
        let n =
            unsafe { libc::send(self.fd(), bytes.as_ptr() as *const _, bytes.len(), 0) };
        if n < 0 {
            return Err(Fail::from_errno("send"));
        }
        let n = n as usize;
        self.emit(SocketEvent::Write(n));
        Ok(n)
    }

    /// Datagram equivalent of `write` to an explicit peer address.
    pub fn send_message_to(&self, bytes: &[u8], to: SocketAddr) -> Result<usize, Fail> {
        let (addr, len) = socket_addr_to_raw(to);
        let n = unsafe {
            libc::sendto(
                self.fd(),
                bytes.as_ptr() as *const _,
                bytes.len(),
                0,
                &addr as *const libc::sockaddr_storage as *const libc::sockaddr,
                len,
            )
        };
        if n < 0 {
            return Err(Fail::from_errno("sendto"));
        }
        let n = n as usize;
        self.emit(SocketEvent::Write(n));
        Ok(n)
    }

    /// Reads up to `max` bytes in one syscall, returning only the bytes
    /// actually read. `0` indicates the peer performed an orderly shutdown
    /// and is returned normally — the manager independently notices the
    /// hangup via the next poll tick.
    pub fn read(&self, max: usize) -> Result<Vec<u8>, Fail> {
        let mut buf = vec![0u8; max];
        let n = unsafe { libc::read(self.fd(), buf.as_mut_ptr() as *mut _, max) };
        if n < 0 {
            return Err(Fail::from_errno("read"));
        }
        buf.truncate(n as usize);
        self.emit(SocketEvent::Read(buf.len()));
        Ok(buf)
    }

    /// Datagram equivalent of `read`, discarding the peer's address.
    pub fn receive_message(&self, max: usize) -> Result<Vec<u8>, Fail> {
        let mut buf = vec![0u8; max];
        let n = unsafe { libc::recv(self.fd(), buf.as_mut_ptr() as *mut _, max, 0) };
        if n < 0 {
            return Err(Fail::from_errno("recv"));
        }
        buf.truncate(n as usize);
        self.emit(SocketEvent::Read(buf.len()));
        Ok(buf)
    }

    /// Datagram equivalent of `read`, also returning the sender's address.
    pub fn receive_message_from(&self, max: usize) -> Result<(Vec<u8>, SocketAddr), Fail> {
        let mut buf = vec![0u8; max];
        let mut raw: MaybeUninit<libc::sockaddr_storage> = MaybeUninit::zeroed();
        let mut raw_len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
        let n = unsafe {
            libc::recvfrom(
                self.fd(),
                buf.as_mut_ptr() as *mut _,
                max,
                0,
                raw.as_mut_ptr() as *mut libc::sockaddr,
                &mut raw_len,
            )
        };
        if n < 0 {
            return Err(Fail::from_errno("recvfrom"));
        }
        buf.truncate(n as usize);
        self.emit(SocketEvent::Read(buf.len()));
        let peer = raw_to_socket_addr(unsafe { raw.assume_init() })?;
        Ok((buf, peer))
    }
}

fn socket_addr_to_raw(addr: SocketAddr) -> (libc::sockaddr_storage, libc::socklen_t) {
    let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
    let len = match addr {
        SocketAddr::V4(v4) => {
            let mut raw: libc::sockaddr_in = unsafe { std::mem::zeroed() };
            raw.sin_family = libc::AF_INET as libc::sa_family_t;
            raw.sin_port = v4.port().to_be();
            raw.sin_addr.s_addr = u32::from_ne_bytes(v4.ip().octets());
            unsafe {
                std::ptr::write(&mut storage as *mut _ as *mut libc::sockaddr_in, raw);
            }
            std::mem::size_of::<libc::sockaddr_in>()
        }
        SocketAddr::V6(v6) => {
            let mut raw: libc::sockaddr_in6 = unsafe { std::mem::zeroed() };
            raw.sin6_family = libc::AF_INET6 as libc::sa_family_t;
            raw.sin6_port = v6.port().to_be();
            raw.sin6_addr.s6_addr = v6.ip().octets();
            unsafe {
                std::ptr::write(&mut storage as *mut _ as *mut libc::sockaddr_in6, raw);
            }
            std::mem::size_of::<libc::sockaddr_in6>()
        }
    };
    (storage, len as libc::socklen_t)
}

fn raw_to_socket_addr(raw: libc::sockaddr_storage) -> Result<SocketAddr, Fail> {
    match raw.ss_family as i32 {
        libc::AF_INET => {
            let v4: libc::sockaddr_in = unsafe {
                std::ptr::read(&raw as *const _ as *const libc::sockaddr_in)
            };
            let ip = std::net::Ipv4Addr::from(v4.sin_addr.s_addr.to_ne_bytes());
            let port = u16::from_be(v4.sin_port);
            Ok(SocketAddr::from((ip, port)))
        }
        libc::AF_INET6 => {
            let v6: libc::sockaddr_in6 = unsafe {
                std::ptr::read(&raw as *const _ as *const libc::sockaddr_in6)
            };
            let ip = std::net::Ipv6Addr::from(v6.sin6_addr.s6_addr);
            let port = u16::from_be(v6.sin6_port);
            Ok(SocketAddr::from((ip, port)))
        }
        family => {
            log::warn!("unexpected sockaddr family {}", family);
            Err(Fail::InvalidArgument {
                details: "unsupported address family returned by recvfrom",
            })
        }
    }
}
