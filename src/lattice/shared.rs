//! Thread-safe handle on a lattice.
//!
//! One thread (typically the ego state loop) shifts the window while planner
//! threads query it. Writers take the lock exclusively, so readers never see
//! a lattice halfway through a structural update.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::Lattice;
use crate::common::{LatticeError, LatticeResult, Router};

/// Lattice shared between threads
pub struct SharedLattice<R: Router> {
    inner: Arc<RwLock<Lattice<R>>>,
}

impl<R: Router> SharedLattice<R> {
    pub fn new(lattice: Lattice<R>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(lattice)),
        }
    }

    fn read_guard(&self) -> LatticeResult<RwLockReadGuard<'_, Lattice<R>>> {
        self.inner.read().map_err(|_| LatticeError::LockPoisoned)
    }

    fn write_guard(&self) -> LatticeResult<RwLockWriteGuard<'_, Lattice<R>>> {
        self.inner.write().map_err(|_| LatticeError::LockPoisoned)
    }

    /// Run `f` with shared access to the lattice
    pub fn read<T>(&self, f: impl FnOnce(&Lattice<R>) -> T) -> LatticeResult<T> {
        let guard = self.read_guard()?;
        Ok(f(&guard))
    }

    /// Run `f` with exclusive access to the lattice
    pub fn write<T>(&self, f: impl FnOnce(&mut Lattice<R>) -> T) -> LatticeResult<T> {
        let mut guard = self.write_guard()?;
        Ok(f(&mut guard))
    }

    pub fn shift(&self, movement: f64) -> LatticeResult<f64> {
        self.write_guard()?.shift(movement)
    }

    pub fn extend(&self, range: f64) -> LatticeResult<()> {
        self.write_guard()?.extend(range)
    }

    pub fn shorten(&self, range: f64) -> LatticeResult<()> {
        self.write_guard()?.shorten(range)
    }

    /// Copy of the lattice as it is now
    pub fn snapshot(&self) -> LatticeResult<Lattice<R>> {
        self.read(|lattice| lattice.clone())
    }
}

impl<R: Router> Clone for SharedLattice<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
