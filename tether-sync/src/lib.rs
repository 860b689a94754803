//! # tether-sync
//!
//! Leaf synchronization layer for tether: a data-carrying binary mutex with a
//! scope-bound guard, a counting semaphore used as a rendezvous signal, and a
//! cooperative-stop wrapper around one OS thread.
//!
//! None of these types know about owner threads or delegation; that lives in
//! `tether-core`.

pub mod mutex;
pub mod semaphore;
pub mod thread;

pub use mutex::{Mutex, MutexGuard};
pub use semaphore::Semaphore;
pub use thread::{StopOutcome, StopPolicy, StopToken, Thread, ThreadState};
