#![allow(dead_code)]
//! Test harness utilities for tether-core integration tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use tether_core::{Bridge, ProtectedResource};

/// What happened to the recording resource, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Lock(ThreadId),
    Flush(ThreadId),
    Write(ThreadId, u32),
    Unlock(ThreadId),
}

/// A resource that records every operation and checks writes happen while
/// its internal lock is held.
#[derive(Default)]
pub struct RecordingResource {
    locked: AtomicBool,
    events: Mutex<Vec<Event>>,
}

impl RecordingResource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn write(&self, value: u32) {
        assert!(
            self.locked.load(Ordering::Acquire),
            "write to resource without its internal lock held"
        );
        self.push(Event::Write(thread::current().id(), value));
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, f: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| f(e)).count()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl ProtectedResource for RecordingResource {
    fn lock(&self) {
        assert!(!self.locked.swap(true, Ordering::AcqRel), "resource locked twice");
        self.push(Event::Lock(thread::current().id()));
    }

    fn unlock(&self) {
        assert!(self.locked.swap(false, Ordering::AcqRel), "resource unlocked twice");
        self.push(Event::Unlock(thread::current().id()));
    }

    fn flush(&self) {
        self.push(Event::Flush(thread::current().id()));
    }
}

/// Drive the owner loop until every worker has finished, or panic on timeout.
pub fn drive_until_finished<T>(bridge: &mut Bridge, workers: &[JoinHandle<T>], timeout: Duration) {
    let start = Instant::now();
    while workers.iter().any(|w| !w.is_finished()) {
        if start.elapsed() > timeout {
            panic!(
                "Timed out waiting for {} workers",
                workers.iter().filter(|w| !w.is_finished()).count()
            );
        }
        bridge.pump(Duration::from_millis(5));
    }
}

/// Drive the owner loop until `done` holds, or panic on timeout.
pub fn drive_until(bridge: &mut Bridge, timeout: Duration, done: impl Fn() -> bool) {
    let start = Instant::now();
    while !done() {
        if start.elapsed() > timeout {
            panic!("Timed out driving owner loop");
        }
        bridge.pump(Duration::from_millis(5));
    }
}

pub fn join_all<T>(workers: Vec<JoinHandle<T>>) -> Vec<T> {
    workers.into_iter().map(|w| w.join().unwrap()).collect()
}
