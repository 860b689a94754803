//! Typed message proxy: a thread-safe FIFO layered on a [`Bridge`].
//!
//! Producers on any thread call [`MessageProxy::enqueue`]; the owner thread's
//! bridge handler drains the queue. Since bridge wakes coalesce, one handler
//! run may find several entries, so handlers drain until empty.

use std::collections::VecDeque;
use std::sync::Arc;

use tether_sync::Mutex;

use crate::bridge::{Bridge, BridgeWaker, WakeStatus};

pub struct MessageProxy<T> {
    queue: Arc<Mutex<VecDeque<T>>>,
    waker: BridgeWaker,
}

impl<T> Clone for MessageProxy<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            waker: self.waker.clone(),
        }
    }
}

impl<T: Send + 'static> MessageProxy<T> {
    /// Proxy that wakes `bridge`. The caller registers a handler that drains it.
    pub fn new(bridge: &Bridge) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            waker: bridge.waker(),
        }
    }

    /// Create a proxy and register a bridge handler that passes every entry,
    /// oldest first, to `on_message` on the owner thread.
    pub fn attach<F>(bridge: &mut Bridge, mut on_message: F) -> Self
    where
        F: FnMut(T) + 'static,
    {
        let proxy = Self::new(bridge);
        let drain = proxy.clone();
        bridge.register(move || {
            drain.drain(&mut on_message);
        });
        proxy
    }

    /// Append `value` and wake the owner thread.
    pub fn enqueue(&self, value: T) -> WakeStatus {
        self.queue.lock().push_back(value);
        self.waker.wake()
    }

    /// Pop the oldest entry, or `None` when empty.
    pub fn dequeue(&self) -> Option<T> {
        self.queue.lock().pop_front()
    }

    pub fn count(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Dequeue until empty, feeding each entry to `f`. The queue lock is not
    /// held while `f` runs, so `f` may enqueue. Returns the number handled.
    pub fn drain<F>(&self, mut f: F) -> usize
    where
        F: FnMut(T),
    {
        let mut handled = 0;
        while let Some(value) = self.dequeue() {
            f(value);
            handled += 1;
        }
        if handled > 0 {
            log::trace!(target: "proxy", "drained {} messages", handled);
        }
        handled
    }
}
