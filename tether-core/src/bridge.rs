//! Async/sync bridge: a many-to-one wakeup channel into the owner thread.
//!
//! Any thread may call [`BridgeWaker::wake`]; it never blocks. The [`Bridge`]
//! itself stays on the thread that created it (the owner) and runs the
//! registered handler when that thread's event loop dispatches it, either by
//! calling [`Bridge::pump`] or by selecting on [`Bridge::receiver`] and then
//! calling [`Bridge::dispatch`].
//!
//! The token channel has capacity one, so wakes that arrive while a token is
//! already pending coalesce. A token is consumed before the handler runs,
//! which means a wake issued during a handler run always yields another run.

use std::thread::{self, ThreadId};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};

/// Default cap on handler runs per [`Bridge::pump`].
pub const DEFAULT_DISPATCH_BUDGET: usize = 64;

/// Result of a single [`BridgeWaker::wake`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeStatus {
    /// A new token was written.
    Queued,
    /// A token was already pending; the handler will still run.
    Coalesced,
    /// The owner side is gone; nothing will run.
    Disconnected,
}

/// Sending half, cloneable and usable from any thread.
#[derive(Clone)]
pub struct BridgeWaker {
    tx: Sender<()>,
}

impl BridgeWaker {
    pub fn wake(&self) -> WakeStatus {
        match self.tx.try_send(()) {
            Ok(()) => WakeStatus::Queued,
            Err(TrySendError::Full(())) => WakeStatus::Coalesced,
            Err(TrySendError::Disconnected(())) => {
                log::warn!(target: "bridge", "wake dropped: owner side disconnected");
                WakeStatus::Disconnected
            }
        }
    }
}

type Handler = Box<dyn FnMut()>;
type Listener = Box<dyn FnMut(u64)>;

/// Owner-thread half of the bridge.
pub struct Bridge {
    tx: Sender<()>,
    rx: Receiver<()>,
    owner: ThreadId,
    handler: Option<Handler>,
    listeners: Vec<Listener>,
    activations: u64,
    dispatch_budget: usize,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Bridge {
    /// Create a bridge owned by the calling thread.
    pub fn new() -> Self {
        Self::with_budget(DEFAULT_DISPATCH_BUDGET)
    }

    pub fn with_budget(dispatch_budget: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Self {
            tx,
            rx,
            owner: thread::current().id(),
            handler: None,
            listeners: Vec::new(),
            activations: 0,
            dispatch_budget: dispatch_budget.max(1),
        }
    }

    /// Register the handler run on each activation, replacing any previous one.
    pub fn register<F>(&mut self, handler: F)
    where
        F: FnMut() + 'static,
    {
        self.handler = Some(Box::new(handler));
    }

    /// Called after every handler run with the running activation count.
    pub fn add_listener<F>(&mut self, listener: F)
    where
        F: FnMut(u64) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn waker(&self) -> BridgeWaker {
        BridgeWaker {
            tx: self.tx.clone(),
        }
    }

    /// Token channel, for owner loops built on `crossbeam_channel::select!`.
    /// Call [`dispatch`](Self::dispatch) when it becomes ready.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Number of handler runs so far.
    pub fn activations(&self) -> u64 {
        self.activations
    }

    pub fn dispatch_budget(&self) -> usize {
        self.dispatch_budget
    }

    /// Consume one pending token and run the handler. Returns false if no
    /// token was pending.
    pub fn dispatch(&mut self) -> bool {
        self.assert_owner();
        match self.rx.try_recv() {
            Ok(()) => {
                self.activate();
                true
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
        }
    }

    /// Wait up to `timeout` for a token, then keep dispatching until no token
    /// is pending or the dispatch budget is spent. Returns the number of
    /// handler runs.
    pub fn pump(&mut self, timeout: Duration) -> usize {
        self.assert_owner();
        match self.rx.recv_timeout(timeout) {
            Ok(()) => self.activate(),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return 0,
        }
        let mut runs = 1;
        while runs < self.dispatch_budget && self.dispatch() {
            runs += 1;
        }
        runs
    }

    fn activate(&mut self) {
        match self.handler.as_mut() {
            Some(handler) => handler(),
            None => log::debug!(target: "bridge", "activation with no handler registered"),
        }
        self.activations += 1;
        let n = self.activations;
        for listener in &mut self.listeners {
            listener(n);
        }
    }

    fn assert_owner(&self) {
        assert_eq!(
            thread::current().id(),
            self.owner,
            "bridge dispatched off its owner thread"
        );
    }
}
