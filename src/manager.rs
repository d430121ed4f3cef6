// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Socket Manager: the singleton coordinator. Owns the descriptor-to-
//! [`SocketState`] map and the poll vector, runs the background poll loop,
//! and is the synchronization point for registration, removal, and
//! readiness waiting.
//!
//! Owns fd-keyed waiter maps plus a spawned background task that wakes
//! ready descriptors; generalized from "wake everything every tick and let
//! each future re-try its syscall" to "poll(2) for real readiness, then
//! resume exactly one FIFO waiter per (descriptor, direction)" — see
//! DESIGN.md.

use crate::config::{MonitorConfig, MonitorPriority};
use crate::descriptor::Descriptor;
use crate::events::{FileEvents, PollEntry, SocketEvent};
use crate::fail::Fail;
use crate::poll;
use crate::socket::SocketState;
use crate::stream::{self, EventStream};
use crate::waiter::{Cancellation, Direction};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::os::unix::io::RawFd;
use std::sync::{Arc, Weak};
use std::thread;

static GLOBAL: OnceCell<Arc<SocketManager>> = OnceCell::new();

struct ManagerInner {
    sockets: HashMap<Descriptor, Arc<SocketState>>,
    poll_vector: Vec<PollEntry>,
    monitoring: bool,
}

impl ManagerInner {
    fn rebuild_poll_vector(&mut self) {
        self.poll_vector = self
            .sockets
            .keys()
            .map(|d| PollEntry::new(*d))
            .collect();
        self.poll_vector.sort_by_key(|entry| entry.descriptor.raw());
    }
}

/// The process-wide asynchronous socket multiplexer.
pub struct SocketManager {
    inner: Mutex<ManagerInner>,
    config: MonitorConfig,
    self_weak: Weak<SocketManager>,
}

impl SocketManager {
    /// Creates a standalone manager with its own background loop, separate
    /// from the process-wide singleton. Mostly useful for tests that want
    /// isolation from the shared global instance.
    pub fn new(config: MonitorConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak| SocketManager {
            inner: Mutex::new(ManagerInner {
                sockets: HashMap::new(),
                poll_vector: Vec::new(),
                monitoring: false,
            }),
            config,
            self_weak: weak.clone(),
        })
    }

    /// The lazily-initialized, process-wide singleton coordinator.
    pub fn global() -> Arc<SocketManager> {
        GLOBAL
            .get_or_init(|| {
                log::trace!(
                    "sockmux: using portable poll(2) readiness polling, not epoll/kqueue"
                );
                SocketManager::new(MonitorConfig::default())
            })
            .clone()
    }

    /// Membership check.
    pub fn contains(&self, descriptor: Descriptor) -> bool {
        self.inner.lock().sockets.contains_key(&descriptor)
    }

    /// Registers an open, already non-blocking-capable descriptor. Forces
    /// non-blocking mode (soft-failure: logged, not fatal — see DESIGN.md's
    /// Open Question decision). Fatal (panics) if `fd` is already
    /// registered, since double-registration is a programmer error, not a
    /// recoverable condition.
    pub fn add(&self, fd: RawFd) -> EventStream {
        let descriptor = Descriptor(fd);
        force_nonblocking(fd);

        let (sink, event_stream) = stream::channel();
        let state = Arc::new(SocketState::new(descriptor, sink));

        let need_start = {
            let mut inner = self.inner.lock();
            if inner.sockets.contains_key(&descriptor) {
                panic!(
                    "{}",
                    Fail::AlreadyRegistered {
                        fd: descriptor.raw()
                    }
                );
            }
            inner.sockets.insert(descriptor, state);
            inner.rebuild_poll_vector();
            let need_start = !inner.monitoring;
            inner.monitoring = true;
            need_start
        };

        if need_start {
            self.spawn_background_loop();
        }
        event_stream
    }

    /// Idempotent: a no-op if `descriptor` is not registered (it may
    /// already have been removed by the poll loop). Closes the descriptor
    /// exactly once, drains every queued waiter, and emits the terminal
    /// `close` event.
    pub fn remove(&self, descriptor: Descriptor, error: Option<Fail>) {
        let socket = {
            let mut inner = self.inner.lock();
            let socket = match inner.sockets.remove(&descriptor) {
                Some(socket) => socket,
                None => return,
            };
            inner.rebuild_poll_vector();
            if inner.sockets.is_empty() {
                inner.monitoring = false;
            }
            socket
        };

        if unsafe { libc::close(descriptor.raw()) } != 0 {
            log::warn!(
                "sockmux: close({}) failed: {}",
                descriptor,
                std::io::Error::last_os_error()
            );
        }

        let waiter_error = error.clone().unwrap_or(Fail::ConnectionAborted);
        socket.dequeue_all(waiter_error);
        socket.emit(SocketEvent::Close(error));
    }

    /// The central coordination routine: suspends the caller until
    /// `descriptor` is ready in `direction`, or fails if the descriptor is
    /// removed or `cancel` is triggered while waiting.
    pub async fn wait(
        &self,
        direction: Direction,
        descriptor: Descriptor,
        cancel: Option<&Cancellation>,
    ) -> Result<(), Fail> {
        loop {
            self.poll_tick();

            let socket = {
                let inner = self.inner.lock();
                if !inner.sockets.contains_key(&descriptor) {
                    return Err(Fail::ConnectionAborted);
                }
                let ready = inner
                    .poll_vector
                    .iter()
                    .find(|entry| entry.descriptor == descriptor)
                    .map(|entry| direction_ready(direction, entry.returned))
                    .unwrap_or(false);
                if ready {
                    return Ok(());
                }
                inner.sockets.get(&descriptor).cloned()
            };
            let socket = match socket {
                Some(socket) => socket,
                None => return Err(Fail::ConnectionAborted),
            };

            if let Some(cancel) = cancel {
                if cancel.is_requested() {
                    return Err(Fail::Cancelled);
                }
            }

            let waiter = socket.queue_with(direction, cancel);
            waiter.await?;
        }
    }

    fn lookup(&self, descriptor: Descriptor) -> Result<Arc<SocketState>, Fail> {
        self.inner
            .lock()
            .sockets
            .get(&descriptor)
            .cloned()
            .ok_or(Fail::InvalidArgument {
                details: "unknown descriptor",
            })
    }

    pub async fn write(&self, descriptor: Descriptor, bytes: &[u8]) -> Result<usize, Fail> {
        let socket = self.lookup(descriptor)?;
        self.wait(Direction::Write, descriptor, None).await?;
        socket.write(bytes)
    }

    pub async fn send_message(&self, descriptor: Descriptor, bytes: &[u8]) -> Result<usize, Fail> {
        let socket = self.lookup(descriptor)?;
        self.wait(Direction::Write, descriptor, None).await?;
        socket.send_message(bytes)
    }

    pub async fn send_message_to(
        &self,
        descriptor: Descriptor,
        bytes: &[u8],
        to: SocketAddr,
    ) -> Result<usize, Fail> {
        let socket = self.lookup(descriptor)?;
        self.wait(Direction::Write, descriptor, None).await?;
        socket.send_message_to(bytes, to)
    }

    pub async fn read(&self, descriptor: Descriptor, max: usize) -> Result<Vec<u8>, Fail> {
        let socket = self.lookup(descriptor)?;
        self.wait(Direction::Read, descriptor, None).await?;
        socket.read(max)
    }

    pub async fn receive_message(&self, descriptor: Descriptor, max: usize) -> Result<Vec<u8>, Fail> {
        let socket = self.lookup(descriptor)?;
        self.wait(Direction::Read, descriptor, None).await?;
        socket.receive_message(max)
    }

    pub async fn receive_message_from(
        &self,
        descriptor: Descriptor,
        max: usize,
    ) -> Result<(Vec<u8>, SocketAddr), Fail> {
        let socket = self.lookup(descriptor)?;
        self.wait(Direction::Read, descriptor, None).await?;
        socket.receive_message_from(max)
    }

    /// One poll-and-dispatch step. Returns whether the background loop
    /// should keep running (i.e. at least one socket remains registered).
    fn poll_tick(&self) -> bool {
        let mut to_remove: Vec<(Descriptor, Fail)> = Vec::new();

        {
            let mut inner = self.inner.lock();
            if inner.sockets.is_empty() {
                inner.monitoring = false;
                return false;
            }

            if let Err(e) = poll::poll_once(&mut inner.poll_vector) {
                log::warn!("sockmux: poll(2) failed: {:?}", e);
                to_remove = inner.sockets.keys().map(|d| (*d, e.clone())).collect();
            } else {
                for entry in inner.poll_vector.iter() {
                    let descriptor = entry.descriptor;
                    let socket = match inner.sockets.get(&descriptor) {
                        Some(socket) => socket,
                        None => continue,
                    };

                    if entry.returned.contains(FileEvents::INVALID_REQUEST) {
                        to_remove.push((descriptor, Fail::BadFileDescriptor));
                        continue;
                    }
                    if entry.returned.contains(FileEvents::HANGUP) {
                        to_remove.push((descriptor, Fail::ConnectionReset));
                        continue;
                    }
                    if entry.returned.contains(FileEvents::ERROR) {
                        to_remove.push((descriptor, Fail::ConnectionAborted));
                        continue;
                    }
                    if entry.returned.contains(FileEvents::WRITABLE) {
                        socket.dequeue(Direction::Write);
                    }
                    if entry.returned.contains(FileEvents::READABLE) && socket.dequeue(Direction::Read) {
                        socket.emit(SocketEvent::PendingRead);
                    }
                }
            }
        }

        for (descriptor, error) in to_remove {
            self.remove(descriptor, Some(error));
        }

        !self.inner.lock().sockets.is_empty()
    }

    fn spawn_background_loop(&self) {
        let weak = self.self_weak.clone();
        let interval = self.config.interval;
        let priority = self.config.priority;
        thread::Builder::new()
            .name("sockmux-poll".into())
            .spawn(move || {
                apply_priority_hint(priority);
                loop {
                    thread::sleep(interval);
                    let manager = match weak.upgrade() {
                        Some(manager) => manager,
                        None => return,
                    };
                    if !manager.poll_tick() {
                        return;
                    }
                }
            })
            .expect("sockmux: failed to spawn background poll thread");
    }

    /// Whether the background poll loop is currently running. Mostly useful
    /// for diagnostics and for tests exercising quiescence.
    pub fn is_monitoring(&self) -> bool {
        self.inner.lock().monitoring
    }
}

fn direction_ready(direction: Direction, returned: FileEvents) -> bool {
    match direction {
        Direction::Read => returned.contains(FileEvents::READABLE),
        Direction::Write => returned.contains(FileEvents::WRITABLE),
    }
}

fn force_nonblocking(fd: RawFd) {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
    if flags < 0 {
        log::warn!(
            "sockmux: fcntl(F_GETFL) failed for fd {}: {}",
            fd,
            std::io::Error::last_os_error()
        );
        return;
    }
    if flags & libc::O_NONBLOCK != 0 {
        return;
    }
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        log::warn!(
            "sockmux: fcntl(F_SETFL) failed for fd {}: {}",
            fd,
            std::io::Error::last_os_error()
        );
    }
}

/// Best-effort scheduling priority hint for the background poll thread.
fn apply_priority_hint(priority: MonitorPriority) {
    let nice_value: i32 = match priority {
        MonitorPriority::Low => 10,
        MonitorPriority::Normal => 0,
        MonitorPriority::High => -10,
    };
    if nice_value == 0 {
        return;
    }
    let tid = unsafe { libc::syscall(libc::SYS_gettid) } as libc::id_t;
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, tid, nice_value) };
    if rc != 0 {
        log::warn!(
            "sockmux: failed to apply monitor priority hint: {}",
            std::io::Error::last_os_error()
        );
    }
}
