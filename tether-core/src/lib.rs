//! # tether-core
//!
//! Cross-thread delegation for resources that only one thread (the owner,
//! usually the one running an event loop) may touch natively.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tether_core::{Config, Coordinator};
//!
//! // On the owner thread:
//! let config = Config::load();
//! let mut bridge = config.bridge();
//! let coordinator = Coordinator::attach(resource, &mut bridge);
//!
//! // On a worker thread, with a clone of `coordinator`:
//! // let _guard = coordinator.guard();   // owner is now parked
//! // ... touch the resource ...
//!
//! // The owner loop keeps dispatching the bridge:
//! // loop { bridge.pump(Duration::from_millis(16)); /* other work */ }
//! ```
//!
//! ## Module Overview
//!
//! - [`bridge`] — `Bridge` (owner side) and `BridgeWaker` (any thread)
//! - [`proxy`] — `MessageProxy<T>`, a FIFO delivered through a bridge
//! - [`delegate`] — `Coordinator`, `DelegationGuard`, `ProtectedResource`
//! - [`config`] — TOML configuration (embedded defaults + user override)
//!
//! Lock primitives and the cooperative thread wrapper come from `tether-sync`
//! and are re-exported as [`sync`].

pub mod bridge;
pub mod config;
pub mod delegate;
pub mod proxy;

pub use tether_sync as sync;

pub use bridge::{Bridge, BridgeWaker, WakeStatus};
pub use config::Config;
pub use delegate::{Coordinator, DelegationGuard, DelegationStats, ProtectedResource};
pub use proxy::MessageProxy;
