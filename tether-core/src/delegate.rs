//! Recursive single-owner delegation.
//!
//! A [`ProtectedResource`] may only be touched natively by its owner thread.
//! A worker thread that needs it constructs a [`DelegationGuard`]: the guard
//! asks the owner thread, through its [`Bridge`], to lock the resource and
//! park inside the bridge handler. The worker then has exclusive access until
//! the outermost guard drops, at which point the owner unlocks and resumes.
//!
//! ```text
//!  worker                               owner (bridge handler)
//!  ------                               ----------------------
//!  handshake.wait()
//!  wake bridge, nudge      ──────────▶  resource.lock(); flush()
//!  locked.wait()           ◀──────────  locked.post()
//!  ... exclusive access ...             release.wait()      (parked)
//!  flush(); release.post() ──────────▶  resource.unlock()
//!  unlocked.wait()         ◀──────────  unlocked.post()
//!  handshake.post()                     back to the event loop
//! ```
//!
//! Nested guards on the holder thread only bump the recursion level. Guards
//! built on the owner thread are no-ops. There is no timeout: if the owner's
//! loop never dispatches the bridge, the worker blocks in the constructor.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use tether_sync::{Mutex, Semaphore};

use crate::bridge::{Bridge, BridgeWaker, WakeStatus};

/// A resource with its own internal lock, owned by one thread.
pub trait ProtectedResource: Send + Sync {
    /// Take the resource's internal lock. Called on the owner thread.
    fn lock(&self);
    /// Release the internal lock. Called on the owner thread.
    fn unlock(&self);
    /// Settle pending activity. Called on the owner thread after locking and
    /// on the holder thread before releasing.
    fn flush(&self) {}
}

type Nudge = Box<dyn Fn() + Send + Sync>;

#[derive(Debug, Default)]
struct DelegationState {
    holder: Option<ThreadId>,
    level: usize,
}

/// Counters for handshake traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelegationStats {
    /// Owner-side handshakes that locked and parked.
    pub acquisitions: u64,
    /// Owner-side handshakes that unlocked and resumed.
    pub releases: u64,
    /// Nested guards taken by the current holder.
    pub reentries: u64,
    /// Guards built directly on the owner thread.
    pub owner_bypasses: u64,
}

/// Process-wide delegation state for one owner thread and one resource.
pub struct Coordinator {
    owner: ThreadId,
    resource: Arc<dyn ProtectedResource>,
    waker: BridgeWaker,
    nudge: Mutex<Option<Nudge>>,
    state: Mutex<DelegationState>,
    /// Binary semaphore serializing whole acquire/release cycles.
    handshake: Semaphore,
    requested: AtomicBool,
    locked: Semaphore,
    release: Semaphore,
    unlocked: Semaphore,
    acquisitions: AtomicU64,
    releases: AtomicU64,
    reentries: AtomicU64,
    owner_bypasses: AtomicU64,
}

impl Coordinator {
    /// Coordinator owned by the calling thread. `waker` must reach a bridge
    /// whose handler calls [`serve`](Self::serve).
    pub fn new(resource: Arc<dyn ProtectedResource>, waker: BridgeWaker) -> Self {
        Self {
            owner: thread::current().id(),
            resource,
            waker,
            nudge: Mutex::new(None),
            state: Mutex::new(DelegationState::default()),
            handshake: Semaphore::new(1),
            requested: AtomicBool::new(false),
            locked: Semaphore::new(0),
            release: Semaphore::new(0),
            unlocked: Semaphore::new(0),
            acquisitions: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            reentries: AtomicU64::new(0),
            owner_bypasses: AtomicU64::new(0),
        }
    }

    /// Build a coordinator for `bridge`'s owner thread and register
    /// [`serve`](Self::serve) as the bridge handler.
    pub fn attach(resource: Arc<dyn ProtectedResource>, bridge: &mut Bridge) -> Arc<Self> {
        assert_eq!(
            thread::current().id(),
            bridge.owner(),
            "coordinator attached off the bridge owner thread"
        );
        let coordinator = Arc::new(Self::new(resource, bridge.waker()));
        let serving = Arc::clone(&coordinator);
        bridge.register(move || serving.serve());
        coordinator
    }

    /// Hook run after each acquisition wake, for owner loops that may be
    /// blocked on something other than the bridge.
    pub fn set_nudge<F>(&self, nudge: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.nudge.lock() = Some(Box::new(nudge));
    }

    /// Take delegated access. Shorthand for [`DelegationGuard::new`].
    pub fn guard(&self) -> DelegationGuard<'_> {
        DelegationGuard::new(self)
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    pub fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Worker currently holding delegated access.
    pub fn holder(&self) -> Option<ThreadId> {
        self.state.lock().holder
    }

    /// Nesting depth of the current holder, 0 when idle.
    pub fn recursion_level(&self) -> usize {
        self.state.lock().level
    }

    pub fn stats(&self) -> DelegationStats {
        DelegationStats {
            acquisitions: self.acquisitions.load(Ordering::Acquire),
            releases: self.releases.load(Ordering::Acquire),
            reentries: self.reentries.load(Ordering::Acquire),
            owner_bypasses: self.owner_bypasses.load(Ordering::Acquire),
        }
    }

    /// Owner side of the handshake. Runs inside the bridge handler: locks the
    /// resource, reports it locked, parks until the holder asks for release,
    /// then unlocks and returns to the event loop.
    pub fn serve(&self) {
        assert!(
            self.is_owner_thread(),
            "delegation handshake served off the owner thread"
        );
        if !self.requested.swap(false, Ordering::AcqRel) {
            log::debug!(target: "delegate", "bridge activation with no pending request");
            return;
        }

        self.resource.lock();
        self.resource.flush();
        self.acquisitions.fetch_add(1, Ordering::AcqRel);
        log::debug!(target: "delegate", "owner locked resource, parking");
        self.locked.post();

        self.release.wait();

        self.resource.unlock();
        self.releases.fetch_add(1, Ordering::AcqRel);
        log::debug!(target: "delegate", "owner unlocked resource, resuming");
        self.unlocked.post();
    }

    fn acquire(&self, me: ThreadId) {
        self.handshake.wait();
        log::debug!(target: "delegate", "{:?} requesting delegated access", me);

        self.requested.store(true, Ordering::Release);
        if self.waker.wake() == WakeStatus::Disconnected {
            log::error!(target: "delegate", "owner bridge is gone; {:?} will block", me);
        }
        if let Some(nudge) = self.nudge.lock().as_ref() {
            nudge();
        }
        self.locked.wait();

        let mut state = self.state.lock();
        assert!(state.holder.is_none(), "resource handed to two holders");
        state.holder = Some(me);
        state.level = 1;
    }

    fn release(&self, me: ThreadId) {
        self.resource.flush();
        self.release.post();
        self.unlocked.wait();

        {
            let mut state = self.state.lock();
            state.holder = None;
            state.level = 0;
        }
        log::debug!(target: "delegate", "{:?} released delegated access", me);
        self.handshake.post();
    }
}

/// Scoped delegated access to a coordinator's resource.
///
/// Not `Send`: it must drop on the thread that built it.
pub struct DelegationGuard<'a> {
    coordinator: &'a Coordinator,
    thread: ThreadId,
    delegated: bool,
    _not_send: PhantomData<*const ()>,
}

impl<'a> DelegationGuard<'a> {
    pub fn new(coordinator: &'a Coordinator) -> Self {
        let me = thread::current().id();
        let guard = |delegated| DelegationGuard {
            coordinator,
            thread: me,
            delegated,
            _not_send: PhantomData,
        };

        if me == coordinator.owner {
            coordinator.owner_bypasses.fetch_add(1, Ordering::AcqRel);
            return guard(false);
        }

        {
            let mut state = coordinator.state.lock();
            if state.holder == Some(me) {
                state.level += 1;
                coordinator.reentries.fetch_add(1, Ordering::AcqRel);
                return guard(true);
            }
        }

        coordinator.acquire(me);
        guard(true)
    }

    /// Whether this guard went through delegation (false on the owner thread).
    pub fn is_delegated(&self) -> bool {
        self.delegated
    }
}

impl Drop for DelegationGuard<'_> {
    fn drop(&mut self) {
        if !self.delegated {
            return;
        }
        assert_eq!(
            thread::current().id(),
            self.thread,
            "delegation guard dropped on a foreign thread"
        );

        {
            let mut state = self.coordinator.state.lock();
            assert_eq!(state.holder, Some(self.thread), "guard dropped by non-holder");
            if state.level > 1 {
                state.level -= 1;
                return;
            }
        }

        self.coordinator.release(self.thread);
    }
}
