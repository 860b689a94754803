//! Binary mutex and its scope-bound guard.
//!
//! The guard is the only way to reach the protected value, so an unlock can
//! never be forgotten: it happens when the guard goes out of scope, including
//! on early return or unwinding. A lock left poisoned by a panicking holder is
//! recovered and logged rather than propagated.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{self, PoisonError, TryLockError};

pub struct Mutex<T> {
    inner: sync::Mutex<T>,
}

impl<T> Mutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: sync::Mutex::new(value),
        }
    }

    /// Block until the lock is acquired.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        let inner = self.inner.lock().unwrap_or_else(|poisoned| {
            log::warn!(target: "sync", "recovering poisoned mutex");
            PoisonError::into_inner(poisoned)
        });
        MutexGuard { inner }
    }

    /// Acquire the lock only if no other thread holds it.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        match self.inner.try_lock() {
            Ok(inner) => Some(MutexGuard { inner }),
            Err(TryLockError::Poisoned(poisoned)) => {
                log::warn!(target: "sync", "recovering poisoned mutex");
                Some(MutexGuard {
                    inner: poisoned.into_inner(),
                })
            }
            Err(TryLockError::WouldBlock) => None,
        }
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let locked = matches!(self.inner.try_lock(), Err(TryLockError::WouldBlock));
        f.debug_struct("Mutex").field("locked", &locked).finish()
    }
}

/// Holds the lock for exactly its own lifetime.
pub struct MutexGuard<'a, T> {
    inner: sync::MutexGuard<'a, T>,
}

impl<T> MutexGuard<'_, T> {
    /// Release the lock before the end of the enclosing scope.
    pub fn unlock(self) {
        drop(self);
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}
