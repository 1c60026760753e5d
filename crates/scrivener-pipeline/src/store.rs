//! Shared access to the session store

use scrivener_domain::traits::SessionStore;
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard};

/// A session store shared by the service and its running sessions
///
/// Every access is one short synchronous call; the lock is never held across
/// an await.
pub struct SharedStore<St> {
    inner: Arc<Mutex<St>>,
}

impl<St> Clone for SharedStore<St> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<St> SharedStore<St>
where
    St: SessionStore,
    St::Error: Display,
{
    /// Wrap a store
    pub fn new(store: St) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, St> {
        // A panicked writer leaves the connection usable
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `op` against the store, rendering its error as text
    pub fn with<T>(&self, op: impl FnOnce(&mut St) -> Result<T, St::Error>) -> Result<T, String> {
        let mut store = self.lock();
        op(&mut store).map_err(|e| e.to_string())
    }
}
