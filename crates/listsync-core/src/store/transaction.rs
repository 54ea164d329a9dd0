//! Scoped transaction handling.

use super::ListStore;
use crate::error::Result;
use tracing::{debug, warn};

/// Running store transaction that rolls back when dropped uncommitted.
///
/// ```rust,ignore
/// let tx = TransactionGuard::begin(&store)?;
/// store.delete_batch(&ids)?; // an early return here rolls back
/// tx.commit()?;
/// ```
pub struct TransactionGuard<'a, S: ListStore + ?Sized> {
    store: &'a S,
    finished: bool,
}

impl<'a, S: ListStore + ?Sized> TransactionGuard<'a, S> {
    pub fn begin(store: &'a S) -> Result<Self> {
        store.begin()?;
        Ok(Self {
            store,
            finished: false,
        })
    }

    /// Commit the transaction.
    ///
    /// A failed commit still rolls back when the guard is dropped.
    pub fn commit(mut self) -> Result<()> {
        self.store.commit()?;
        self.finished = true;
        Ok(())
    }
}

impl<S: ListStore + ?Sized> Drop for TransactionGuard<'_, S> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.store.rollback() {
            Ok(()) => debug!("Rolled back uncommitted list transaction"),
            Err(e) => warn!("Failed to roll back list transaction: {}", e),
        }
    }
}
