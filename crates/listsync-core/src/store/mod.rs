//! List item persistence.
//!
//! The reconciler and the sequencer only talk to the [`ListStore`] trait.
//! [`SqliteStore`] is the bundled implementation; it also owns the list type
//! and referenced entity registries used to resolve import codes.

mod search;
mod sqlite;
mod transaction;

pub use search::ListSearch;
pub use sqlite::SqliteStore;
pub use transaction::TransactionGuard;

use crate::error::Result;
use crate::models::{ItemId, ListItem};
use std::collections::BTreeMap;

/// Storage backend for the list items of one parent resource.
///
/// All operations are synchronous to match rusqlite's API.
pub trait ListStore {
    /// Create a new, unsaved list item.
    fn create(&self) -> ListItem {
        ListItem::new()
    }

    /// Get a list item by id.
    ///
    /// Fails with `NotFound` if no such item exists.
    fn get(&self, id: ItemId) -> Result<ListItem>;

    /// Insert or update a list item.
    ///
    /// Assigns the id on first save and stamps the audit fields. Saving an
    /// unmodified persisted item does nothing.
    fn save(&self, item: &mut ListItem) -> Result<()>;

    /// Delete the given items, returning how many existed.
    fn delete_batch(&self, ids: &[ItemId]) -> Result<usize>;

    /// List items matching the criteria, ordered by position then id.
    fn search(&self, criteria: &ListSearch) -> Result<Vec<ListItem>>;

    /// Number of items matching the criteria, ignoring any slice.
    fn count(&self, criteria: &ListSearch) -> Result<usize>;

    /// Number of matching items per referenced domain.
    fn aggregate_by_domain(&self, criteria: &ListSearch) -> Result<BTreeMap<String, usize>>;

    /// Start a transaction.
    fn begin(&self) -> Result<()>;

    /// Commit the running transaction.
    fn commit(&self) -> Result<()>;

    /// Roll back the running transaction.
    fn rollback(&self) -> Result<()>;
}
