//! Cooperative-stop wrapper around one OS thread.
//!
//! The running function receives a [`StopToken`] and is expected to poll
//! [`StopToken::should_stop`]. [`Thread::stop`] escalates for functions that
//! do not poll promptly: wait, then interrupt repeatedly, then give up on the
//! OS thread. Rust has no safe forced cancellation, so the last step detaches
//! the thread and leaves [`Thread::running`] true, which callers can detect.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::mutex::Mutex;
use crate::semaphore::Semaphore;

/// Lifecycle of a [`Thread`]. Tracked as an explicit atomic flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    NotStarted,
    Running,
    StopRequested,
    Stopped,
}

impl ThreadState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ThreadState::Running,
            2 => ThreadState::StopRequested,
            3 => ThreadState::Stopped,
            _ => ThreadState::NotStarted,
        }
    }
}

/// How [`Thread::stop`] escalates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPolicy {
    /// Total cooperative budget; each escalation step waits a tenth of it.
    pub timeout: Duration,
    /// Interrupts sent before giving up on the thread.
    pub interrupt_attempts: u32,
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            interrupt_attempts: 8,
        }
    }
}

/// Which escalation step ended a [`Thread::stop`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was running.
    NotRunning,
    /// The function observed the stop flag within the first wait.
    Cooperative,
    /// The function exited after this many interrupts.
    Interrupted { attempts: u32 },
    /// The function survived every step. The OS thread was detached and
    /// `running()` stays true until it exits on its own.
    Unresponsive,
}

type InterruptHook = Box<dyn Fn() + Send + Sync>;

struct Shared {
    state: AtomicU8,
    stop: AtomicBool,
    exited: Semaphore,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(ThreadState::NotStarted as u8),
            stop: AtomicBool::new(false),
            exited: Semaphore::new(0),
        }
    }

    fn state(&self) -> ThreadState {
        ThreadState::from_u8(self.state.load(Ordering::Acquire))
    }
}

/// Marks the thread stopped when the running function returns or unwinds.
struct ExitSignal(Arc<Shared>);

impl Drop for ExitSignal {
    fn drop(&mut self) {
        self.0
            .state
            .store(ThreadState::Stopped as u8, Ordering::Release);
        self.0.exited.post();
    }
}

/// Handed to the running function to poll for stop requests.
#[derive(Clone)]
pub struct StopToken {
    shared: Arc<Shared>,
}

impl StopToken {
    pub fn should_stop(&self) -> bool {
        self.shared.stop.load(Ordering::Acquire)
    }

    /// Park for up to `timeout`, returning early on stop request or
    /// interrupt. Returns [`should_stop`](Self::should_stop).
    pub fn park(&self, timeout: Duration) -> bool {
        if !self.should_stop() {
            thread::park_timeout(timeout);
        }
        self.should_stop()
    }
}

pub struct Thread {
    name: Option<String>,
    policy: StopPolicy,
    shared: Arc<Shared>,
    interrupt: Arc<Mutex<Option<InterruptHook>>>,
    handle: Option<JoinHandle<()>>,
}

impl Default for Thread {
    fn default() -> Self {
        Self::new()
    }
}

impl Thread {
    pub fn new() -> Self {
        Self {
            name: None,
            policy: StopPolicy::default(),
            shared: Arc::new(Shared::new()),
            interrupt: Arc::new(Mutex::new(None)),
            handle: None,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        let mut thread = Self::new();
        thread.name = Some(name.into());
        thread
    }

    /// Escalation policy used by `Drop`.
    pub fn with_policy(mut self, policy: StopPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> StopPolicy {
        self.policy
    }

    /// Run `hook` on every interrupt, in addition to unparking the thread.
    /// Use it to break whatever blocking call the function sits in.
    pub fn on_interrupt<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.interrupt.lock() = Some(Box::new(hook));
    }

    /// Spawn the OS thread running `f`. Resets the stop flag.
    pub fn start<F>(&mut self, f: F) -> io::Result<()>
    where
        F: FnOnce(StopToken) + Send + 'static,
    {
        if self.running() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "thread already running",
            ));
        }
        self.reap();

        let shared = Arc::new(Shared::new());
        shared
            .state
            .store(ThreadState::Running as u8, Ordering::Release);
        let token = StopToken {
            shared: Arc::clone(&shared),
        };
        let exit = ExitSignal(Arc::clone(&shared));

        let mut builder = thread::Builder::new();
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        let handle = builder.spawn(move || {
            let _exit = exit;
            f(token);
        });
        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                // The closure (and its ExitSignal) was dropped unrun.
                log::error!(target: "thread", "failed to spawn {}: {}", self.label(), e);
                return Err(e);
            }
        };

        log::debug!(target: "thread", "started {}", self.label());
        self.shared = shared;
        self.handle = Some(handle);
        Ok(())
    }

    /// True from `start` until the running function has returned.
    pub fn running(&self) -> bool {
        matches!(
            self.shared.state(),
            ThreadState::Running | ThreadState::StopRequested
        )
    }

    pub fn state(&self) -> ThreadState {
        self.shared.state()
    }

    /// Stop flag as seen by the running function.
    pub fn should_stop(&self) -> bool {
        self.shared.stop.load(Ordering::Acquire)
    }

    /// Request a stop and escalate until the thread exits or every step is
    /// exhausted.
    pub fn stop(&mut self, timeout: Duration) -> StopOutcome {
        if !self.running() {
            self.reap();
            return StopOutcome::NotRunning;
        }

        self.shared.stop.store(true, Ordering::Release);
        let _ = self.shared.state.compare_exchange(
            ThreadState::Running as u8,
            ThreadState::StopRequested as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );

        let step = timeout / 10;
        if self.wait_exit(step) {
            self.reap();
            log::debug!(target: "thread", "{} stopped cooperatively", self.label());
            return StopOutcome::Cooperative;
        }

        for attempt in 1..=self.policy.interrupt_attempts {
            log::warn!(
                target: "thread",
                "{} ignored stop request, interrupt {}/{}",
                self.label(),
                attempt,
                self.policy.interrupt_attempts
            );
            self.interrupt();
            if self.wait_exit(step) {
                self.reap();
                return StopOutcome::Interrupted { attempts: attempt };
            }
        }

        log::warn!(target: "thread", "{} unresponsive to interrupts, abandoning", self.label());
        self.interrupt();
        if self.wait_exit(step) {
            self.reap();
            return StopOutcome::Interrupted {
                attempts: self.policy.interrupt_attempts + 1,
            };
        }

        // No safe forced cancellation exists; detach and keep reporting running.
        self.handle = None;
        log::error!(target: "thread", "{} still running after stop escalation", self.label());
        StopOutcome::Unresponsive
    }

    /// Block until the running function returns, without requesting a stop.
    pub fn wait(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!(target: "thread", "{} panicked", self.label());
            }
        }
    }

    fn interrupt(&self) {
        if let Some(handle) = &self.handle {
            handle.thread().unpark();
        }
        if let Some(hook) = self.interrupt.lock().as_ref() {
            hook();
        }
    }

    fn wait_exit(&self, step: Duration) -> bool {
        if self.shared.state() == ThreadState::Stopped {
            return true;
        }
        self.shared.exited.wait_timeout(step) || self.shared.state() == ThreadState::Stopped
    }

    /// Join a thread that has already exited.
    fn reap(&mut self) {
        if self.shared.state() == ThreadState::Stopped {
            self.wait();
        }
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        if self.running() {
            let outcome = self.stop(self.policy.timeout);
            log::debug!(target: "thread", "{} dropped while running: {:?}", self.label(), outcome);
        } else {
            self.reap();
        }
    }
}
