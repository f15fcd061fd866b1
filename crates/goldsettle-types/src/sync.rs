//! Lock helpers for services shared as `Arc<RwLock<_>>`.
//!
//! A poisoned lock means a writer panicked mid-operation; the guarded state
//! can no longer be trusted to be atomic, so it surfaces as an internal
//! error instead of being silently recovered.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{GoldSettleError, Result};

pub fn read_lock<'a, T>(lock: &'a RwLock<T>, what: &str) -> Result<RwLockReadGuard<'a, T>> {
    lock.read()
        .map_err(|_| GoldSettleError::Internal(format!("{what} lock poisoned")))
}

pub fn write_lock<'a, T>(lock: &'a RwLock<T>, what: &str) -> Result<RwLockWriteGuard<'a, T>> {
    lock.write()
        .map_err(|_| GoldSettleError::Internal(format!("{what} lock poisoned")))
}
